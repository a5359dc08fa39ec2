//! Collaborators at the edge of the compositor: where monitor rectangles come
//! from and where the finished canvas goes.

use std::{
    io,
    path::{Path, PathBuf},
};

use image::{ImageFormat, Rgb, RgbImage};

use crate::{error::ApplyError, info, monitor::RawMonitor, DEBUG_NAME};

/// How the desktop should lay out the bitmap. A multi-monitor canvas already
/// holds the full layout, so it is tiled from the primary's origin instead of
/// being rescaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TilingMode {
    Single,
    Tiled,
}

pub trait DisplayEnumerator {
    fn enumerate(&self) -> Vec<RawMonitor>;
}

pub trait WallpaperApplier {
    fn apply(&self, canvas: &RgbImage, mode: TilingMode) -> Result<(), ApplyError>;

    /// Colour the desktop shows behind the wallpaper, when the platform has one.
    fn desktop_color(&self) -> Option<Rgb<u8>> {
        None
    }
}

/// Monitor rectangles listed in the config file.
pub struct ConfiguredDisplays {
    monitors: Vec<RawMonitor>,
}

impl ConfiguredDisplays {
    pub fn new(monitors: Vec<RawMonitor>) -> Self {
        Self { monitors }
    }
}

impl DisplayEnumerator for ConfiguredDisplays {
    fn enumerate(&self) -> Vec<RawMonitor> {
        self.monitors.clone()
    }
}

/// Writes the canvas to a BMP file and leaves the desktop alone.
pub struct BitmapFile {
    path: PathBuf,
}

impl BitmapFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl WallpaperApplier for BitmapFile {
    fn apply(&self, canvas: &RgbImage, mode: TilingMode) -> Result<(), ApplyError> {
        save_bitmap(canvas, &self.path)?;
        info!(
            "[{}][APPLY] Wrote {}x{} canvas to {} ({:?})",
            DEBUG_NAME,
            canvas.width(),
            canvas.height(),
            self.path.display(),
            mode
        );
        Ok(())
    }
}

fn save_bitmap(canvas: &RgbImage, path: &Path) -> Result<(), ApplyError> {
    canvas
        .save_with_format(path, ImageFormat::Bmp)
        .map_err(|source| ApplyError::Save {
            path: path.to_path_buf(),
            source,
        })
}

/// Registry values under `HKCU\Control Panel\Desktop` that keep the bitmap
/// unscaled, tiled from the primary's origin when it spans several monitors.
#[cfg_attr(not(windows), allow(dead_code))]
fn desktop_style(mode: TilingMode) -> [(&'static str, &'static str); 2] {
    let tile = match mode {
        TilingMode::Single => "0",
        TilingMode::Tiled => "1",
    };
    [("WallpaperStyle", "0"), ("TileWallpaper", tile)]
}

/// Writes every desktop style value through `set`. A failed write rejects the
/// wallpaper for `path`.
#[cfg_attr(not(windows), allow(dead_code))]
fn write_desktop_style<F>(mode: TilingMode, path: &Path, mut set: F) -> Result<(), ApplyError>
where
    F: FnMut(&str, &str) -> io::Result<()>,
{
    for (name, value) in desktop_style(mode) {
        set(name, value).map_err(|e| ApplyError::Rejected {
            path: path.to_path_buf(),
            reason: format!("cannot set {name}={value}: {e}"),
        })?;
    }
    Ok(())
}

/// Native enumerator when the config lists no monitors.
pub fn display_enumerator(configured: &[RawMonitor]) -> Box<dyn DisplayEnumerator> {
    if !configured.is_empty() {
        return Box::new(ConfiguredDisplays::new(configured.to_vec()));
    }

    #[cfg(windows)]
    {
        Box::new(win32::Win32Displays)
    }

    #[cfg(not(windows))]
    {
        crate::warn!(
            "[{}] No native display enumerator on this platform; list monitors under 'monitors:' in the config",
            DEBUG_NAME
        );
        Box::new(ConfiguredDisplays::new(Vec::new()))
    }
}

pub fn wallpaper_applier(output: &Path) -> Box<dyn WallpaperApplier> {
    #[cfg(windows)]
    {
        Box::new(win32::Win32Wallpaper::new(output))
    }

    #[cfg(not(windows))]
    {
        Box::new(BitmapFile::new(output))
    }
}

#[cfg(windows)]
mod win32 {
    use std::{
        io, mem,
        path::{Path, PathBuf},
    };

    use image::{Rgb, RgbImage};
    use windows::{
        core::BOOL,
        Win32::{
            Foundation::{LPARAM, RECT},
            Graphics::Gdi::{
                EnumDisplayMonitors, GetMonitorInfoW, GetSysColor, COLOR_BACKGROUND, HDC, HMONITOR,
                MONITORINFOEXW,
            },
            UI::WindowsAndMessaging::{
                SystemParametersInfoW, SPIF_SENDWININICHANGE, SPIF_UPDATEINIFILE, SPI_SETDESKWALLPAPER,
            },
        },
    };

    use winreg::{
        enums::{HKEY_CURRENT_USER, KEY_SET_VALUE},
        RegKey,
    };

    use super::{save_bitmap, write_desktop_style, DisplayEnumerator, TilingMode, WallpaperApplier};
    use crate::{
        error::ApplyError,
        info,
        monitor::{RawMonitor, Rect},
        utility::{absolute_path, to_wstring},
        DEBUG_NAME,
    };

    const DESKTOP_KEY: &str = r"Control Panel\Desktop";

    pub struct Win32Displays;

    impl DisplayEnumerator for Win32Displays {
        fn enumerate(&self) -> Vec<RawMonitor> {
            unsafe extern "system" fn enum_monitor_proc(
                monitor: HMONITOR,
                _hdc: HDC,
                _rect: *mut RECT,
                lparam: LPARAM,
            ) -> BOOL {
                let vec = &mut *(lparam.0 as *mut Vec<RawMonitor>);

                let mut info: MONITORINFOEXW = mem::zeroed();
                info.monitorInfo.cbSize = mem::size_of::<MONITORINFOEXW>() as u32;

                if GetMonitorInfoW(monitor, &mut info as *mut MONITORINFOEXW as *mut _).as_bool() {
                    let rc = info.monitorInfo.rcMonitor;
                    vec.push(RawMonitor::new(
                        Rect::new(rc.left, rc.top, rc.right, rc.bottom),
                        info.monitorInfo.dwFlags != 0,
                    ));
                }

                BOOL(1)
            }

            let mut monitors = Vec::<RawMonitor>::new();
            unsafe {
                let _ = EnumDisplayMonitors(
                    None,
                    None,
                    Some(enum_monitor_proc),
                    LPARAM((&mut monitors as *mut Vec<RawMonitor>) as isize),
                );
            }

            monitors
        }
    }

    pub struct Win32Wallpaper {
        path: PathBuf,
    }

    impl Win32Wallpaper {
        pub fn new(path: &Path) -> Self {
            Self {
                path: absolute_path(path),
            }
        }
    }

    impl WallpaperApplier for Win32Wallpaper {
        fn apply(&self, canvas: &RgbImage, mode: TilingMode) -> Result<(), ApplyError> {
            let desktop = RegKey::predef(HKEY_CURRENT_USER)
                .open_subkey_with_flags(DESKTOP_KEY, KEY_SET_VALUE)
                .map_err(|e| ApplyError::Rejected {
                    path: self.path.clone(),
                    reason: format!("cannot open HKCU\\{DESKTOP_KEY}: {e}"),
                })?;
            write_desktop_style(mode, &self.path, |name, value| -> io::Result<()> {
                desktop.set_value(name, &value.to_string())
            })?;

            save_bitmap(canvas, &self.path)?;

            let mut wide = to_wstring(&self.path.to_string_lossy());
            unsafe {
                SystemParametersInfoW(
                    SPI_SETDESKWALLPAPER,
                    0,
                    Some(wide.as_mut_ptr() as *mut _),
                    SPIF_UPDATEINIFILE | SPIF_SENDWININICHANGE,
                )
            }
            .map_err(|e| ApplyError::Rejected {
                path: self.path.clone(),
                reason: format!("{e:?}"),
            })?;

            info!(
                "[{}][APPLY] Desktop wallpaper set to {} ({:?})",
                DEBUG_NAME,
                self.path.display(),
                mode
            );
            Ok(())
        }

        fn desktop_color(&self) -> Option<Rgb<u8>> {
            let dc = unsafe { GetSysColor(COLOR_BACKGROUND) };
            Some(Rgb([
                (dc & 0xFF) as u8,
                ((dc & 0xFF00) >> 8) as u8,
                ((dc & 0xFF0000) >> 16) as u8,
            ]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::Rect;

    #[test]
    fn configured_monitors_take_precedence() {
        let listed = vec![RawMonitor::new(Rect::new(0, 0, 800, 600), true)];
        let enumerator = display_enumerator(&listed);
        assert_eq!(enumerator.enumerate(), listed);
    }

    #[test]
    fn bitmap_file_writes_a_bmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wall.bmp");
        let canvas = RgbImage::from_pixel(6, 4, Rgb([1, 2, 3]));

        BitmapFile::new(&path).apply(&canvas, TilingMode::Tiled).unwrap();

        let written = image::open(&path).unwrap().to_rgb8();
        assert_eq!(written, canvas);
    }

    #[test]
    fn unwritable_output_is_an_apply_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("wall.bmp");
        let canvas = RgbImage::new(2, 2);

        let err = BitmapFile::new(&path).apply(&canvas, TilingMode::Single).unwrap_err();
        assert!(matches!(err, ApplyError::Save { .. }));
    }

    #[test]
    fn tiled_style_sets_tile_flag() {
        let mut written = Vec::new();
        write_desktop_style(TilingMode::Tiled, Path::new("wall.bmp"), |name, value| {
            written.push((name.to_string(), value.to_string()));
            Ok(())
        })
        .unwrap();

        assert_eq!(
            written,
            vec![
                ("WallpaperStyle".to_string(), "0".to_string()),
                ("TileWallpaper".to_string(), "1".to_string()),
            ]
        );
        assert_eq!(desktop_style(TilingMode::Single)[1], ("TileWallpaper", "0"));
    }

    #[test]
    fn failed_style_write_rejects_the_wallpaper() {
        let mut calls = 0;
        let err = write_desktop_style(TilingMode::Tiled, Path::new("wall.bmp"), |_, _| {
            calls += 1;
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "access denied"))
        })
        .unwrap_err();

        assert_eq!(calls, 1);
        match err {
            ApplyError::Rejected { path, reason } => {
                assert_eq!(path, PathBuf::from("wall.bmp"));
                assert!(reason.contains("WallpaperStyle"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
