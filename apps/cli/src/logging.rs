use std::path::Path;

use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
	filter::LevelFilter,
	fmt::{self, Layer},
	prelude::*,
	EnvFilter,
};

const DEFAULT_DIRECTIVES: &str = "warn,xfp_core=debug,xfp_ffmpeg=debug,xfp_thumbs=debug";

#[cfg(debug_assertions)]
const CONSOLE_LOG_FILTER: LevelFilter = LevelFilter::DEBUG;

#[cfg(not(debug_assertions))]
const CONSOLE_LOG_FILTER: LevelFilter = LevelFilter::INFO;

/// Console logs go to stderr, so stdout stays clean for command output. With a `log_dir`, a
/// daily rolling file receives debug logs too.
///
/// Keep the returned guard alive until exit, it flushes the file writer.
pub fn init(log_dir: Option<&Path>) -> Option<WorkerGuard> {
	let (file_layer, guard) = log_dir
		.map(|log_dir| {
			let (non_blocking, guard) =
				tracing_appender::non_blocking(rolling::daily(log_dir, "xfp-thumbs.log"));

			(
				Layer::default()
					.with_writer(non_blocking)
					.with_ansi(false)
					.with_filter(LevelFilter::DEBUG),
				guard,
			)
		})
		.unzip();

	tracing_subscriber::registry()
		.with(
			EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES)),
		)
		.with(
			fmt::layer()
				.with_writer(std::io::stderr)
				.with_filter(CONSOLE_LOG_FILTER),
		)
		.with(file_layer)
		.init();

	guard
}
