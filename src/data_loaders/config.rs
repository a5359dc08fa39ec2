use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use image::Rgb;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use super::yaml::load_yaml;
use crate::{
    monitor::{RawMonitor, Rect},
    pipeline::RenderOptions,
    utility::default_picture_dirs,
};

#[derive(Debug, Clone)]
pub struct WallpaperConfig {
    pub debug: bool,
    pub log_level: String,
    pub settings: WallpaperSettings,
    pub directories: Vec<PathBuf>,
    pub monitor_directories: BTreeMap<usize, Vec<PathBuf>>,
    pub monitors: Vec<RawMonitor>,
}

#[derive(Debug, Clone)]
pub struct WallpaperSettings {
    pub blending: bool,
    pub blend_ratio: f32,
    pub crop: bool,
    pub fill: bool,
    pub gradient: bool,
    pub pre_rotate: bool,
    pub background_color: Option<Rgb<u8>>,
    pub seen_cache: PathBuf,
    pub output: PathBuf,
}

impl Default for WallpaperSettings {
    fn default() -> Self {
        Self {
            blending: true,
            blend_ratio: 0.40,
            crop: false,
            fill: true,
            gradient: false,
            pre_rotate: true,
            background_color: None,
            seen_cache: PathBuf::from("priorWalls.json"),
            output: PathBuf::from("multi-wallpaper.bmp"),
        }
    }
}

impl Default for WallpaperConfig {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: "warn".to_string(),
            settings: WallpaperSettings::default(),
            directories: Vec::new(),
            monitor_directories: BTreeMap::new(),
            monitors: Vec::new(),
        }
    }
}

impl WallpaperSettings {
    /// Rendering toggles frozen into the value the pipeline consumes.
    pub fn render_options(&self, background: Rgb<u8>) -> RenderOptions {
        RenderOptions {
            pre_rotate: self.pre_rotate,
            crop: self.crop,
            fill: self.fill,
            blend: self.blending,
            blend_ratio: self.blend_ratio,
            background,
        }
    }
}

impl WallpaperConfig {
    pub fn load(path: &Path) -> Option<Self> {
        let value = load_yaml(path)?;
        Self::from_yaml(&value)
    }

    pub fn from_yaml(root: &Value) -> Option<Self> {
        let map = root.as_mapping()?;

        let settings = parse_settings(map);
        let debug = bool_any(map, &["debug", "Debug"])
            .or_else(|| settings_map(map).and_then(|s| bool_any(s, &["debug", "Debug"])))
            .unwrap_or(false);
        let log_level = str_any(map, &["log_level", "logging"])
            .or_else(|| settings_map(map).and_then(|s| str_any(s, &["log_level", "logging"])))
            .unwrap_or("warn")
            .to_lowercase();

        Some(Self {
            debug,
            log_level,
            settings,
            directories: parse_directories(map),
            monitor_directories: parse_monitor_sections(map),
            monitors: parse_monitors(map),
        })
    }
}

/// Where each monitor draws its images from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSources {
    global: Vec<PathBuf>,
    per_monitor: BTreeMap<usize, Vec<PathBuf>>,
}

impl ImageSources {
    pub fn new(global: Vec<PathBuf>, per_monitor: BTreeMap<usize, Vec<PathBuf>>) -> Self {
        Self { global, per_monitor }
    }

    /// Directories named on the command line replace the config's global
    /// list; per-monitor sections still apply. With neither, the user's
    /// picture directory is used.
    pub fn from_config(config: &WallpaperConfig, cli_dirs: &[PathBuf]) -> Self {
        let global = if !cli_dirs.is_empty() {
            cli_dirs.to_vec()
        } else if !config.directories.is_empty() {
            config.directories.clone()
        } else {
            default_picture_dirs()
        };

        Self::new(global, config.monitor_directories.clone())
    }

    pub fn directories_for(&self, monitor_index: usize) -> &[PathBuf] {
        match self.per_monitor.get(&monitor_index) {
            Some(dirs) if !dirs.is_empty() => dirs,
            _ => &self.global,
        }
    }
}

fn settings_map(root: &Mapping) -> Option<&Mapping> {
    mapping_any(root, &["settings", "global"])
}

fn parse_settings(root: &Mapping) -> WallpaperSettings {
    let mut settings = WallpaperSettings::default();
    let Some(map) = settings_map(root) else {
        return settings;
    };

    settings.blending = bool_any(map, &["blending", "Blending", "blend"]).unwrap_or(settings.blending);
    settings.blend_ratio = f32_any(map, &["blend_ratio", "BlendRatio"])
        .unwrap_or(settings.blend_ratio)
        .clamp(0.0, 1.0);
    settings.crop = bool_any(map, &["crop", "Crop"]).unwrap_or(settings.crop);
    settings.fill = bool_any(map, &["fill", "Fill"]).unwrap_or(settings.fill);
    settings.gradient = bool_any(map, &["gradient", "Gradient"]).unwrap_or(settings.gradient);
    settings.pre_rotate = bool_any(map, &["pre_rotate", "PreRotate", "prerotate"]).unwrap_or(settings.pre_rotate);
    settings.background_color = colour_any(map, &["background_color", "background", "BackgroundColor"]);
    settings.seen_cache = str_any(map, &["seen_cache", "prior_walls"])
        .map(PathBuf::from)
        .unwrap_or(settings.seen_cache);
    settings.output = str_any(map, &["output", "bitmap"])
        .map(PathBuf::from)
        .unwrap_or(settings.output);

    settings
}

/// Accepts a plain list, a newline-separated string, or a `paths` key holding
/// either.
fn parse_directories(root: &Mapping) -> Vec<PathBuf> {
    let Some(value) = root.get(Value::String("directories".to_string())) else {
        return Vec::new();
    };
    paths_from_value(value)
}

fn paths_from_value(value: &Value) -> Vec<PathBuf> {
    match value {
        Value::Mapping(map) => map
            .get(Value::String("paths".to_string()))
            .map(paths_from_value)
            .unwrap_or_default(),
        Value::Sequence(list) => list
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect(),
        Value::String(text) => text
            .lines()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_monitor_sections(root: &Mapping) -> BTreeMap<usize, Vec<PathBuf>> {
    let mut sections = BTreeMap::new();

    for (k, v) in root.iter() {
        let Some(section) = k.as_str() else {
            continue;
        };
        let Some(index) = section.strip_prefix("monitor_").and_then(|n| n.parse::<usize>().ok()) else {
            continue;
        };

        let paths = paths_from_value(v);
        if !paths.is_empty() {
            sections.insert(index, paths);
        }
    }

    sections
}

#[derive(Deserialize)]
struct MonitorEntry {
    #[serde(flatten)]
    rect: Rect,
    #[serde(default)]
    primary: bool,
}

fn parse_monitors(root: &Mapping) -> Vec<RawMonitor> {
    let Some(list) = root
        .get(Value::String("monitors".to_string()))
        .and_then(Value::as_sequence)
    else {
        return Vec::new();
    };

    list.iter()
        .filter_map(|v| serde_yaml::from_value::<MonitorEntry>(v.clone()).ok())
        .map(|entry| RawMonitor::new(entry.rect, entry.primary))
        .collect()
}

fn bool_at(map: &Mapping, key: &str) -> Option<bool> {
    map.get(Value::String(key.to_string()))?.as_bool()
}

fn bool_any(map: &Mapping, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|k| bool_at(map, k))
}

fn str_at<'a>(map: &'a Mapping, key: &str) -> Option<&'a str> {
    map.get(Value::String(key.to_string()))?.as_str()
}

fn str_any<'a>(map: &'a Mapping, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| str_at(map, k))
}

fn mapping_at<'a>(map: &'a Mapping, key: &str) -> Option<&'a Mapping> {
    map.get(Value::String(key.to_string()))?.as_mapping()
}

fn mapping_any<'a>(map: &'a Mapping, keys: &[&str]) -> Option<&'a Mapping> {
    keys.iter().find_map(|k| mapping_at(map, k))
}

fn f32_at(map: &Mapping, key: &str) -> Option<f32> {
    map.get(Value::String(key.to_string()))?
        .as_f64()
        .map(|v| v as f32)
}

fn f32_any(map: &Mapping, keys: &[&str]) -> Option<f32> {
    keys.iter().find_map(|k| f32_at(map, k))
}

/// `[r, g, b]` or `"#rrggbb"`.
fn colour_at(map: &Mapping, key: &str) -> Option<Rgb<u8>> {
    match map.get(Value::String(key.to_string()))? {
        Value::Sequence(list) if list.len() == 3 => {
            let mut rgb = [0u8; 3];
            for (slot, v) in rgb.iter_mut().zip(list) {
                *slot = u8::try_from(v.as_u64()?).ok()?;
            }
            Some(Rgb(rgb))
        }
        Value::String(text) => {
            let hex = text.trim().strip_prefix('#')?;
            if hex.len() != 6 {
                return None;
            }
            let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
            Some(Rgb([channel(0)?, channel(2)?, channel(4)?]))
        }
        _ => None,
    }
}

fn colour_any(map: &Mapping, keys: &[&str]) -> Option<Rgb<u8>> {
    keys.iter().find_map(|k| colour_at(map, k))
}
