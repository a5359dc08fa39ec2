use std::path::PathBuf;

use clap::Parser;

use crate::scheduler::RotationMode;

#[derive(Debug, Parser)]
#[command(name = "multi-wallpaper")]
#[command(about = "Compose one wallpaper across every monitor and rotate it")]
pub struct Cli {
    /// Change wallpaper every N minutes (0 = change once and exit)
    #[arg(short = 't', long = "time", value_name = "MINUTES", default_value_t = 0)]
    pub change_time: u64,

    /// Put this image on every monitor and exit (overrides -d)
    #[arg(short = 'i', long = "image", value_name = "FILE")]
    pub image: Option<PathBuf>,

    /// Add an image directory (repeatable; replaces the config's directories)
    #[arg(short = 'd', long = "directory", value_name = "DIR")]
    pub directories: Vec<PathBuf>,

    /// Alternate config file (default <working dir>/config.yaml)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Working directory for the config, seen-list, bitmap and log
    #[arg(short = 'w', long = "workingdir", value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Log everything, including per-monitor choices
    #[arg(long, env = "MULTI_WALLPAPER_DEBUG")]
    pub debug: bool,
}

impl Cli {
    pub fn rotation_mode(&self) -> RotationMode {
        RotationMode::from_minutes(self.change_time, self.image.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn defaults_to_one_shot() {
        let cli = Cli::try_parse_from(["multi-wallpaper"]).unwrap();
        assert_eq!(cli.rotation_mode(), RotationMode::OneShot);
        assert!(cli.directories.is_empty());
        assert!(cli.config.is_none());
    }

    #[test]
    fn parses_the_full_surface() {
        let cli = Cli::try_parse_from([
            "multi-wallpaper",
            "-t",
            "15",
            "-d",
            "/photos/a",
            "--directory",
            "/photos/b",
            "-c",
            "alt.yaml",
            "-w",
            "/tmp/walls",
        ])
        .unwrap();

        assert_eq!(cli.rotation_mode(), RotationMode::Periodic(Duration::from_secs(900)));
        assert_eq!(cli.directories, vec![PathBuf::from("/photos/a"), PathBuf::from("/photos/b")]);
        assert_eq!(cli.config, Some(PathBuf::from("alt.yaml")));
        assert_eq!(cli.working_dir, Some(PathBuf::from("/tmp/walls")));
    }

    #[test]
    fn single_image_wins_over_interval() {
        let cli = Cli::try_parse_from(["multi-wallpaper", "-t", "5", "-i", "sunset.jpg"]).unwrap();
        assert_eq!(
            cli.rotation_mode(),
            RotationMode::SingleImage(PathBuf::from("sunset.jpg"))
        );
    }

    #[test]
    fn rejects_negative_minutes() {
        assert!(Cli::try_parse_from(["multi-wallpaper", "-t", "-3"]).is_err());
    }
}
