//! Engine configuration for the command line: an optional JSON file, then flag overrides

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use xfp_core::ThumbnailerConfig;

/// Values given on the command line, each one winning over the configuration file
#[derive(Debug, Default, Clone)]
pub struct Overrides {
	pub cache_dir: Option<PathBuf>,
	pub tool: Option<PathBuf>,
	pub max_cache_size: Option<u64>,
	pub max_cache_files: Option<usize>,
}

impl Overrides {
	pub fn apply(self, config: &mut ThumbnailerConfig) {
		if let Some(cache_dir) = self.cache_dir {
			config.cache_dir = Some(cache_dir);
		}
		if let Some(tool) = self.tool {
			config.external_tool_path = tool;
			// An explicit flag must not be shadowed by the saved preference
			config.preferences_file = None;
		}
		if let Some(max_cache_size) = self.max_cache_size {
			config.max_cache_size_bytes = max_cache_size;
		}
		if let Some(max_cache_files) = self.max_cache_files {
			config.max_cache_file_count = max_cache_files;
		}
	}
}

/// Load the configuration file, or the defaults when there's none
pub fn load(config_file: Option<&Path>) -> Result<ThumbnailerConfig> {
	let Some(config_file) = config_file else {
		return Ok(ThumbnailerConfig::default());
	};

	let json = std::fs::read_to_string(config_file)
		.with_context(|| format!("reading config file {}", config_file.display()))?;

	serde_json::from_str(&json)
		.with_context(|| format!("parsing config file {}", config_file.display()))
}
