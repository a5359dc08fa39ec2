mod canvas;
mod cli;
mod data_loaders;
mod error;
mod layout;
mod logging;
mod monitor;
mod pipeline;
mod platform;
mod scheduler;
mod selection;
mod utility;

use std::{env, process::ExitCode};

use clap::Parser;
use image::Rgb;

use crate::{
	cli::Cli,
	data_loaders::config::{ImageSources, WallpaperConfig},
	scheduler::RotationScheduler,
	selection::SelectionCache,
	utility::{absolute_path, default_config_path},
};

pub const DEBUG_NAME: &str = "WALLPAPER";

#[cfg(windows)]
fn enable_per_monitor_dpi_awareness() {
	use windows::Win32::UI::HiDpi::{
		SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
	};

	unsafe {
		if SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2).is_err() {
			warn!(
				"[{}] Failed to set process DPI awareness to PerMonitorV2; monitor sizes may be scaled",
				DEBUG_NAME
			);
		}
	}
}

fn main() -> ExitCode {
	let cli = Cli::parse();

	if let Some(dir) = &cli.working_dir {
		if let Err(e) = env::set_current_dir(dir) {
			eprintln!("Cannot use working directory {}: {}", dir.display(), e);
			return ExitCode::FAILURE;
		}
	}

	logging::init(cli.debug, "warn", true);
	std::panic::set_hook(Box::new(|panic_info| {
		error!("[{}] Panic: {}", DEBUG_NAME, panic_info);
	}));

	#[cfg(windows)]
	enable_per_monitor_dpi_awareness();

	let config_path = cli.config.clone().unwrap_or_else(default_config_path);
	let config = WallpaperConfig::load(&config_path).unwrap_or_else(|| {
		warn!(
			"[{}][CONFIG] No usable config at {}; using defaults",
			DEBUG_NAME,
			config_path.display()
		);
		WallpaperConfig::default()
	});

	logging::set_debug(cli.debug || config.debug);
	logging::set_level(&config.log_level);

	info!("!---------- [{}] Starting Multi-Monitor Wallpaper ----------!", DEBUG_NAME);
	info!("[{}] Config loaded from {}", DEBUG_NAME, config_path.display());

	let settings = &config.settings;
	let applier = platform::wallpaper_applier(&absolute_path(&settings.output));
	let enumerator = platform::display_enumerator(&config.monitors);

	let background = settings
		.background_color
		.or_else(|| settings.blending.then(|| applier.desktop_color()).flatten())
		.unwrap_or(Rgb([0, 0, 0]));

	let sources = ImageSources::from_config(&config, &cli.directories);
	let cache = SelectionCache::load(absolute_path(&settings.seen_cache));

	let mut scheduler = RotationScheduler::new(
		cli.rotation_mode(),
		settings.render_options(background),
		settings.gradient,
		sources,
		cache,
		enumerator,
		applier,
	);

	let outcome = scheduler.run();
	info!("[{}] Scheduler stopped in {:?}", DEBUG_NAME, scheduler.state());

	let code = match outcome {
		Ok(()) => {
			info!("[{}] Wallpaper applied", DEBUG_NAME);
			ExitCode::SUCCESS
		}
		Err(e) => {
			error!("[{}] {}", DEBUG_NAME, e);
			ExitCode::FAILURE
		}
	};

	logging::flush();
	code
}
