use std::{fs, path::Path};

use serde_yaml::Value;

use crate::{warn, DEBUG_NAME};

/// Reads and parses a YAML document. Missing files and parse errors yield
/// `None`; parse errors are logged since they usually mean a typo.
pub fn load_yaml(path: &Path) -> Option<Value> {
    let txt = fs::read_to_string(path).ok()?;
    match serde_yaml::from_str::<Value>(&txt) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(
                "[{}][CONFIG] Failed to parse {}: {}",
                DEBUG_NAME,
                path.display(),
                e
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_yaml(&dir.path().join("config.yaml")).is_none());
    }

    #[test]
    fn broken_yaml_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "settings: [unclosed").unwrap();
        assert!(load_yaml(&path).is_none());
    }

    #[test]
    fn parses_mappings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "settings:\n  fill: false\n").unwrap();
        let value = load_yaml(&path).unwrap();
        assert!(value.as_mapping().is_some());
    }
}
