use std::{path::PathBuf, time::Duration};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

/// Subfolder created under the platform's cache and config directories.
pub const APP_DIR_NAME: &str = "xfilepicker";
pub const PREFERENCES_FILE_NAME: &str = "preferences.json";

pub const DEFAULT_MAX_CACHE_SIZE_BYTES: u64 = 500 * 1024 * 1024;
pub const DEFAULT_MAX_CACHE_FILE_COUNT: usize = 10_000;
pub const DEFAULT_EXTERNAL_TOOL: &str = "ffmpeg";
pub const DEFAULT_WORKER_COUNT: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_PREWARM_THROTTLE: Duration = Duration::from_millis(5);

/// Everything a [`crate::Thumbnailer`] needs to know, fixed at construction.
///
/// Missing fields fall back to their defaults when deserializing, so a partial JSON document is
/// a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ThumbnailerConfig {
	/// Persistent cache directory; `None` keeps thumbnails in memory only.
	pub cache_dir: Option<PathBuf>,
	/// Eviction threshold for the summed size of cached thumbnails.
	pub max_cache_size_bytes: u64,
	/// Eviction threshold for the number of cached thumbnails.
	pub max_cache_file_count: usize,
	/// Video frame extractor; a bare name is resolved through the search path. A path saved in
	/// the preferences file takes precedence.
	pub external_tool_path: PathBuf,
	pub worker_count: usize,
	/// Pending requests kept before the oldest one is dropped.
	pub queue_capacity: usize,
	/// Upper bound for each invocation of the external tool.
	pub tool_timeout: Duration,
	/// Pause between persistent cache reads while prewarming.
	pub prewarm_throttle: Duration,
	/// Where user preferences live; `None` disables persisting them.
	pub preferences_file: Option<PathBuf>,
}

impl Default for ThumbnailerConfig {
	fn default() -> Self {
		let base_dirs = BaseDirs::new();

		Self {
			cache_dir: base_dirs
				.as_ref()
				.map(|dirs| dirs.cache_dir().join(APP_DIR_NAME)),
			max_cache_size_bytes: DEFAULT_MAX_CACHE_SIZE_BYTES,
			max_cache_file_count: DEFAULT_MAX_CACHE_FILE_COUNT,
			external_tool_path: PathBuf::from(DEFAULT_EXTERNAL_TOOL),
			worker_count: DEFAULT_WORKER_COUNT,
			queue_capacity: DEFAULT_QUEUE_CAPACITY,
			tool_timeout: DEFAULT_TOOL_TIMEOUT,
			prewarm_throttle: DEFAULT_PREWARM_THROTTLE,
			preferences_file: base_dirs.as_ref().map(|dirs| {
				dirs.config_dir()
					.join(APP_DIR_NAME)
					.join(PREFERENCES_FILE_NAME)
			}),
		}
	}
}

impl ThumbnailerConfig {
	/// A configuration that touches nothing outside `cache_dir`, handy for tests and tools.
	pub fn isolated(cache_dir: impl Into<PathBuf>) -> Self {
		Self {
			cache_dir: Some(cache_dir.into()),
			preferences_file: None,
			..Default::default()
		}
	}
}
