use std::{
    env,
    path::{Path, PathBuf},
};

#[cfg(windows)]
pub fn to_wstring(s: &str) -> Vec<u16> {
    use std::{ffi::OsStr, os::windows::ffi::OsStrExt};

    OsStr::new(s)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

pub fn user_home_dir() -> Option<PathBuf> {
    env::var("USERPROFILE")
        .or_else(|_| env::var("HOME"))
        .map(PathBuf::from)
        .ok()
}

pub fn working_dir() -> PathBuf {
    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Resolves `path` against the working directory unless it is already absolute.
pub fn absolute_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_dir().join(path)
    }
}

/// Directories used when neither the command line nor the config names any.
pub fn default_picture_dirs() -> Vec<PathBuf> {
    user_home_dir()
        .map(|home| vec![home.join("Pictures")])
        .unwrap_or_default()
}

pub fn default_config_path() -> PathBuf {
    working_dir().join("config.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_paths_are_left_alone() {
        let root = if cfg!(windows) { PathBuf::from(r"C:\walls") } else { PathBuf::from("/walls") };
        assert_eq!(absolute_path(&root), root);
    }

    #[test]
    fn relative_paths_land_in_working_dir() {
        let resolved = absolute_path(Path::new("priorWalls.json"));
        assert!(resolved.is_absolute() || resolved.starts_with("."));
        assert!(resolved.ends_with("priorWalls.json"));
    }
}
