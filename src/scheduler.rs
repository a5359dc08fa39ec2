use std::{path::PathBuf, thread, time::Duration};

use image::RgbImage;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::{
    canvas::CompositionCanvas,
    data_loaders::config::ImageSources,
    error::RunError,
    error, info,
    layout::{self, VirtualDesktop},
    pipeline::{self, RenderOptions},
    platform::{DisplayEnumerator, WallpaperApplier},
    selection::SelectionCache,
    warn, DEBUG_NAME,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationState {
    Idle,
    Resolving,
    Composing,
    Applying,
    Sleeping,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationMode {
    /// One explicitly supplied image on every monitor, then exit.
    SingleImage(PathBuf),
    /// One composition from the configured directories, then exit.
    OneShot,
    /// Recompose every interval until the process is killed.
    Periodic(Duration),
}

impl RotationMode {
    pub fn from_minutes(minutes: u64, single_image: Option<PathBuf>) -> Self {
        match (single_image, minutes) {
            (Some(image), _) => Self::SingleImage(image),
            (None, 0) => Self::OneShot,
            (None, m) => Self::Periodic(Duration::from_secs(m.saturating_mul(60))),
        }
    }
}

/// Outcome of one composition pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub placed: usize,
    pub skipped: usize,
}

/// Blocks between periodic cycles. Returning `false` ends the run.
pub type Sleeper = Box<dyn FnMut(Duration) -> bool>;

pub struct RotationScheduler {
    state: RotationState,
    mode: RotationMode,
    options: RenderOptions,
    gradient: bool,
    sources: ImageSources,
    cache: SelectionCache,
    enumerator: Box<dyn DisplayEnumerator>,
    applier: Box<dyn WallpaperApplier>,
    rng: StdRng,
    sleeper: Sleeper,
    desktop: Option<VirtualDesktop>,
}

impl RotationScheduler {
    pub fn new(
        mode: RotationMode,
        options: RenderOptions,
        gradient: bool,
        sources: ImageSources,
        cache: SelectionCache,
        enumerator: Box<dyn DisplayEnumerator>,
        applier: Box<dyn WallpaperApplier>,
    ) -> Self {
        Self {
            state: RotationState::Idle,
            mode,
            options,
            gradient,
            sources,
            cache,
            enumerator,
            applier,
            rng: StdRng::from_entropy(),
            sleeper: Box::new(|interval| {
                thread::sleep(interval);
                true
            }),
            desktop: None,
        }
    }

    #[cfg(test)]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    #[cfg(test)]
    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn state(&self) -> RotationState {
        self.state
    }

    /// Resolves the layout once; it stays fixed for the rest of the run.
    pub fn resolve(&mut self) -> Result<&VirtualDesktop, RunError> {
        self.state = RotationState::Resolving;

        let raw = self.enumerator.enumerate();
        let desktop = layout::resolve(&raw).inspect_err(|_| {
            self.state = RotationState::Terminated;
        })?;

        info!(
            "[{}][LAYOUT] Canvas {}x{} for {} monitor(s)",
            DEBUG_NAME,
            desktop.width(),
            desktop.height(),
            desktop.monitors().len()
        );
        info!("[{}][LAYOUT] Primary {}", DEBUG_NAME, desktop.primary());
        for monitor in desktop.monitors() {
            info!("[{}][LAYOUT] {}", DEBUG_NAME, monitor);
        }

        let groups = desktop.neighbours();
        info!(
            "[{}][LAYOUT] Neighbours: left={:?} right={:?} top={:?} bottom={:?}; {} monitor(s) wrap across the origin",
            DEBUG_NAME,
            groups.left,
            groups.right,
            groups.top,
            groups.bottom,
            desktop.monitors().iter().filter(|m| m.needs_split()).count()
        );

        Ok(&*self.desktop.insert(desktop))
    }

    /// Renders every monitor's tile onto a fresh canvas. Selection and decode
    /// failures only cost that monitor its tile.
    pub fn compose(&mut self) -> Result<(CompositionCanvas, CycleReport), RunError> {
        self.state = RotationState::Composing;

        let Self {
            mode,
            options,
            gradient,
            sources,
            cache,
            rng,
            desktop,
            ..
        } = self;
        let desktop = desktop.as_ref().ok_or(RunError::Unresolved)?;

        let mut canvas = CompositionCanvas::new(desktop.size(), options.background, *gradient);
        let mut report = CycleReport::default();

        if let RotationMode::SingleImage(path) = mode {
            let source = pipeline::decode(path)?;
            for monitor in desktop.monitors() {
                let tile = pipeline::render(&source, monitor.size(), options);
                canvas.place(&tile, monitor);
                report.placed += 1;
            }
            return Ok((canvas, report));
        }

        for monitor in desktop.monitors() {
            let Some(dir) = sources.directories_for(monitor.index).choose(rng).cloned() else {
                warn!(
                    "[{}][COMPOSE] No image directories for monitor {}",
                    DEBUG_NAME,
                    monitor.index
                );
                report.skipped += 1;
                continue;
            };

            let rendered = cache.select_with_retry(&dir, rng, |path| {
                let source = pipeline::decode(path)?;
                Ok(pipeline::render(&source, monitor.size(), options))
            });

            match rendered {
                Ok((file, tile)) => {
                    canvas.place(&tile, monitor);
                    report.placed += 1;
                    info!(
                        "[{}][COMPOSE] Monitor {} <- {}",
                        DEBUG_NAME,
                        monitor.index,
                        file.display()
                    );
                }
                Err(e) => {
                    error!("[{}][COMPOSE] Monitor {} skipped: {}", DEBUG_NAME, monitor.index, e);
                    report.skipped += 1;
                }
            }
        }

        Ok((canvas, report))
    }

    pub fn apply(&mut self, canvas: &RgbImage) -> Result<(), RunError> {
        self.state = RotationState::Applying;
        let desktop = self.desktop.as_ref().ok_or(RunError::Unresolved)?;
        self.applier.apply(canvas, desktop.tiling_mode())?;
        Ok(())
    }

    pub fn run_cycle(&mut self) -> Result<CycleReport, RunError> {
        let (canvas, report) = self.compose()?;
        self.apply(canvas.finish())?;
        Ok(report)
    }

    /// Drives the whole run. Layout errors are always fatal. In periodic mode
    /// a failed cycle is logged and retried at the next interval.
    pub fn run(&mut self) -> Result<(), RunError> {
        self.resolve()?;

        loop {
            let outcome = self.run_cycle();

            let RotationMode::Periodic(interval) = self.mode else {
                self.state = RotationState::Terminated;
                return outcome.map(|_| ());
            };

            match outcome {
                Ok(report) => info!(
                    "[{}] Cycle done: {} placed, {} skipped; next in {:?}",
                    DEBUG_NAME,
                    report.placed,
                    report.skipped,
                    interval
                ),
                Err(e) => error!("[{}] Cycle failed, retrying in {:?}: {}", DEBUG_NAME, interval, e),
            }

            self.state = RotationState::Sleeping;
            if !(self.sleeper)(interval) {
                self.state = RotationState::Terminated;
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        collections::BTreeMap,
        fs,
        path::Path,
        rc::Rc,
    };

    use image::Rgb;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        error::{ApplyError, LayoutError},
        monitor::{RawMonitor, Rect},
        platform::{ConfiguredDisplays, TilingMode},
    };

    const RED: Rgb<u8> = Rgb([255, 0, 0]);
    const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
    const BACKGROUND: Rgb<u8> = Rgb([5, 5, 5]);

    type Applied = Rc<RefCell<Vec<(RgbImage, TilingMode)>>>;

    struct Recorder {
        applied: Applied,
        failures: Cell<usize>,
    }

    impl WallpaperApplier for Recorder {
        fn apply(&self, canvas: &RgbImage, mode: TilingMode) -> Result<(), ApplyError> {
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(ApplyError::Rejected {
                    path: PathBuf::from("wall.bmp"),
                    reason: "access denied".to_string(),
                });
            }
            self.applied.borrow_mut().push((canvas.clone(), mode));
            Ok(())
        }
    }

    fn dual_head() -> Vec<RawMonitor> {
        vec![
            RawMonitor::new(Rect::new(-40, 0, 0, 30), false),
            RawMonitor::new(Rect::new(0, 0, 40, 30), true),
        ]
    }

    fn photo(dir: &Path, name: &str, colour: Rgb<u8>) {
        RgbImage::from_pixel(40, 30, colour).save(dir.join(name)).unwrap();
    }

    fn options() -> RenderOptions {
        RenderOptions {
            pre_rotate: false,
            crop: false,
            fill: true,
            blend: false,
            blend_ratio: 1.0,
            background: BACKGROUND,
        }
    }

    fn scheduler(
        mode: RotationMode,
        monitors: Vec<RawMonitor>,
        sources: ImageSources,
        state: &TempDir,
        failures: usize,
    ) -> (RotationScheduler, Applied) {
        let applied = Applied::default();
        let recorder = Recorder {
            applied: applied.clone(),
            failures: Cell::new(failures),
        };
        let scheduler = RotationScheduler::new(
            mode,
            options(),
            false,
            sources,
            SelectionCache::load(state.path().join("seen.json")),
            Box::new(ConfiguredDisplays::new(monitors)),
            Box::new(recorder),
        )
        .with_rng(StdRng::seed_from_u64(17));
        (scheduler, applied)
    }

    fn per_monitor(primary: &Path, secondary: &Path) -> ImageSources {
        let mut dirs = BTreeMap::new();
        dirs.insert(0, vec![primary.to_path_buf()]);
        dirs.insert(1, vec![secondary.to_path_buf()]);
        ImageSources::new(Vec::new(), dirs)
    }

    #[test]
    fn one_shot_composes_every_monitor_and_terminates() {
        let reds = tempfile::tempdir().unwrap();
        let greens = tempfile::tempdir().unwrap();
        photo(reds.path(), "r.png", RED);
        photo(greens.path(), "g.png", GREEN);
        let state = tempfile::tempdir().unwrap();

        let sources = per_monitor(reds.path(), greens.path());
        let (mut scheduler, applied) = scheduler(RotationMode::OneShot, dual_head(), sources, &state, 0);

        scheduler.run().unwrap();
        assert_eq!(scheduler.state(), RotationState::Terminated);

        let applied = applied.borrow();
        assert_eq!(applied.len(), 1);
        let (canvas, mode) = &applied[0];
        assert_eq!(*mode, TilingMode::Tiled);
        assert_eq!(canvas.dimensions(), (80, 30));
        // primary at the origin, the left-hand monitor wrapped to the right
        assert_eq!(*canvas.get_pixel(0, 0), RED);
        assert_eq!(*canvas.get_pixel(39, 29), RED);
        assert_eq!(*canvas.get_pixel(40, 0), GREEN);
        assert_eq!(*canvas.get_pixel(79, 29), GREEN);
    }

    #[test]
    fn undecodable_directory_leaves_background() {
        let reds = tempfile::tempdir().unwrap();
        let junk = tempfile::tempdir().unwrap();
        photo(reds.path(), "r.png", RED);
        for name in ["a.jpg", "b.jpg", "c.jpg", "d.jpg"] {
            fs::write(junk.path().join(name), b"not an image").unwrap();
        }
        let state = tempfile::tempdir().unwrap();

        let sources = per_monitor(reds.path(), junk.path());
        let (mut scheduler, applied) = scheduler(RotationMode::OneShot, dual_head(), sources, &state, 0);
        scheduler.resolve().unwrap();

        let report = scheduler.run_cycle().unwrap();
        assert_eq!(report, CycleReport { placed: 1, skipped: 1 });

        let applied = applied.borrow();
        let canvas = &applied[0].0;
        assert_eq!(*canvas.get_pixel(10, 10), RED);
        assert_eq!(*canvas.get_pixel(60, 10), BACKGROUND);
    }

    #[test]
    fn exhausted_directory_skips_only_that_monitor() {
        let reds = tempfile::tempdir().unwrap();
        let empty = tempfile::tempdir().unwrap();
        photo(reds.path(), "r.png", RED);
        fs::write(empty.path().join("Thumbs.db"), b"cache").unwrap();
        let state = tempfile::tempdir().unwrap();

        let sources = per_monitor(empty.path(), reds.path());
        let (mut scheduler, applied) = scheduler(RotationMode::OneShot, dual_head(), sources, &state, 0);

        scheduler.run().unwrap();
        let canvas = &applied.borrow()[0].0;
        assert_eq!(*canvas.get_pixel(10, 10), BACKGROUND);
        assert_eq!(*canvas.get_pixel(60, 10), RED);
    }

    #[test]
    fn consecutive_cycles_rotate_through_the_pool() {
        let photos = tempfile::tempdir().unwrap();
        photo(photos.path(), "red.png", RED);
        photo(photos.path(), "green.png", GREEN);
        let state = tempfile::tempdir().unwrap();

        let monitors = vec![RawMonitor::new(Rect::new(0, 0, 40, 30), true)];
        let sources = ImageSources::new(vec![photos.path().to_path_buf()], BTreeMap::new());
        let (mut scheduler, applied) = scheduler(
            RotationMode::Periodic(Duration::from_secs(60)),
            monitors,
            sources,
            &state,
            0,
        );
        scheduler.resolve().unwrap();
        scheduler.run_cycle().unwrap();
        scheduler.run_cycle().unwrap();

        let applied = applied.borrow();
        assert_eq!(applied[0].1, TilingMode::Single);
        let first = *applied[0].0.get_pixel(0, 0);
        let second = *applied[1].0.get_pixel(0, 0);
        assert_ne!(first, second);
    }

    #[test]
    fn single_image_goes_on_every_monitor() {
        let photos = tempfile::tempdir().unwrap();
        photo(photos.path(), "only.png", GREEN);
        let state = tempfile::tempdir().unwrap();

        let mode = RotationMode::SingleImage(photos.path().join("only.png"));
        let (mut scheduler, applied) = scheduler(mode, dual_head(), ImageSources::default(), &state, 0);

        scheduler.run().unwrap();
        let canvas = &applied.borrow()[0].0;
        assert!(canvas.pixels().all(|px| *px == GREEN));
        assert!(!state.path().join("seen.json").exists());
    }

    #[test]
    fn unreadable_single_image_is_fatal() {
        let state = tempfile::tempdir().unwrap();
        let mode = RotationMode::SingleImage(state.path().join("missing.png"));
        let (mut scheduler, applied) = scheduler(mode, dual_head(), ImageSources::default(), &state, 0);

        assert!(matches!(scheduler.run(), Err(RunError::Decode(_))));
        assert!(applied.borrow().is_empty());
    }

    #[test]
    fn rejected_wallpaper_fails_one_shot_run() {
        let photos = tempfile::tempdir().unwrap();
        photo(photos.path(), "r.png", RED);
        let state = tempfile::tempdir().unwrap();

        let sources = ImageSources::new(vec![photos.path().to_path_buf()], BTreeMap::new());
        let (mut scheduler, _) = scheduler(RotationMode::OneShot, dual_head(), sources, &state, 1);

        assert!(matches!(scheduler.run(), Err(RunError::Apply(_))));
        assert_eq!(scheduler.state(), RotationState::Terminated);
    }

    #[test]
    fn periodic_run_survives_a_rejected_wallpaper() {
        let photos = tempfile::tempdir().unwrap();
        photo(photos.path(), "red.png", RED);
        photo(photos.path(), "green.png", GREEN);
        let state = tempfile::tempdir().unwrap();

        let interval = Duration::from_secs(90);
        let monitors = vec![RawMonitor::new(Rect::new(0, 0, 40, 30), true)];
        let sources = ImageSources::new(vec![photos.path().to_path_buf()], BTreeMap::new());
        let (scheduler, applied) = scheduler(RotationMode::Periodic(interval), monitors, sources, &state, 1);

        // applied canvases seen at each sleep; the third sleep stops the loop
        let naps = Rc::new(RefCell::new(Vec::new()));
        let (seen_naps, seen_applied) = (naps.clone(), applied.clone());
        let mut scheduler = scheduler.with_sleeper(Box::new(move |slept| {
            assert_eq!(slept, interval);
            let mut naps = seen_naps.borrow_mut();
            naps.push(seen_applied.borrow().len());
            naps.len() < 3
        }));

        scheduler.run().unwrap();

        assert_eq!(*naps.borrow(), vec![0, 1, 2]);
        assert_eq!(applied.borrow().len(), 2);
        assert_eq!(scheduler.state(), RotationState::Terminated);
    }

    #[test]
    fn missing_monitors_abort_before_composing() {
        let state = tempfile::tempdir().unwrap();
        let (mut scheduler, applied) =
            scheduler(RotationMode::OneShot, Vec::new(), ImageSources::default(), &state, 0);

        assert!(matches!(
            scheduler.run(),
            Err(RunError::Layout(LayoutError::NoMonitors))
        ));
        assert_eq!(scheduler.state(), RotationState::Terminated);
        assert!(applied.borrow().is_empty());
    }

    #[test]
    fn compose_requires_a_resolved_layout() {
        let state = tempfile::tempdir().unwrap();
        let (mut scheduler, _) =
            scheduler(RotationMode::OneShot, dual_head(), ImageSources::default(), &state, 0);
        assert!(matches!(scheduler.compose(), Err(RunError::Unresolved)));
    }

    #[test]
    fn minutes_map_to_modes() {
        assert_eq!(RotationMode::from_minutes(0, None), RotationMode::OneShot);
        assert_eq!(
            RotationMode::from_minutes(5, None),
            RotationMode::Periodic(Duration::from_secs(300))
        );
        assert_eq!(
            RotationMode::from_minutes(5, Some(PathBuf::from("a.jpg"))),
            RotationMode::SingleImage(PathBuf::from("a.jpg"))
        );
    }
}
