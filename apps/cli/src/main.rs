use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use directories::BaseDirs;
use std::{
	collections::HashMap,
	path::{Path, PathBuf},
	time::Duration,
};
use tokio::{sync::mpsc, time::timeout_at};
use tracing::{debug, warn};
use xfp_core::{
	config::APP_DIR_NAME, Preferences, SourceKind, SourceReference, Thumbnailer,
	ThumbnailerConfig,
};

mod config;
mod logging;

#[derive(Parser, Debug)]
#[command(
	name = "xfp-thumbs",
	about = "Generate and manage xfilepicker thumbnails"
)]
struct Cli {
	/// JSON file with engine settings, see the `config` command for its shape
	#[arg(long, global = true)]
	config: Option<PathBuf>,

	/// Persistent thumbnail cache directory
	#[arg(long, global = true)]
	cache_dir: Option<PathBuf>,

	/// External tool used to extract video frames, for this run only
	#[arg(long, global = true)]
	tool: Option<PathBuf>,

	/// Eviction threshold for the cache size, in bytes
	#[arg(long, global = true)]
	max_cache_size: Option<u64>,

	/// Eviction threshold for the number of cached thumbnails
	#[arg(long, global = true)]
	max_cache_files: Option<usize>,

	/// Only log to the console
	#[arg(long, global = true, default_value_t = false)]
	no_log_file: bool,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Generate thumbnails, waiting for each one
	Generate {
		#[arg(required = true)]
		paths: Vec<PathBuf>,
		/// Write every thumbnail as `<file name>.png` into this directory
		#[arg(long)]
		out: Option<PathBuf>,
		/// Seconds to wait for all thumbnails before giving up
		#[arg(long, default_value_t = 30)]
		wait: u64,
	},
	/// Load already cached thumbnails into memory
	Prewarm {
		#[arg(required = true)]
		paths: Vec<PathBuf>,
	},
	/// Evict old thumbnails if the cache is over its limits
	Cleanup,
	/// Save the external tool path to the preferences file
	SetTool { path: PathBuf },
	/// Print the effective configuration as JSON
	Config,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	let log_dir = (!cli.no_log_file)
		.then(BaseDirs::new)
		.flatten()
		.map(|dirs| dirs.data_local_dir().join(APP_DIR_NAME).join("logs"));
	let _guard = logging::init(log_dir.as_deref());

	let mut thumbnailer_config = config::load(cli.config.as_deref())?;
	config::Overrides {
		cache_dir: cli.cache_dir,
		tool: cli.tool,
		max_cache_size: cli.max_cache_size,
		max_cache_files: cli.max_cache_files,
	}
	.apply(&mut thumbnailer_config);

	match cli.command {
		Commands::Generate { paths, out, wait } => {
			generate(thumbnailer_config, paths, out, Duration::from_secs(wait)).await
		}
		Commands::Prewarm { paths } => {
			let thumbnailer = Thumbnailer::new(thumbnailer_config).await;
			let hydrated = thumbnailer
				.prewarm_batch(paths.iter().map(SourceReference::from_path))
				.await?;

			println!("Hydrated {hydrated} of {} thumbnails", paths.len());
			Ok(())
		}
		Commands::Cleanup => {
			let thumbnailer = Thumbnailer::new(thumbnailer_config).await;
			let report = thumbnailer.run_cleanup().await?;

			println!("{}", serde_json::to_string_pretty(&report)?);
			Ok(())
		}
		Commands::SetTool { path } => {
			if thumbnailer_config.preferences_file.is_none() {
				bail!("No preferences file available to save the tool path in");
			}

			let thumbnailer = Thumbnailer::new(thumbnailer_config).await;
			thumbnailer.set_external_tool_path(&path).await?;

			println!("External tool set to {}", path.display());
			Ok(())
		}
		Commands::Config => {
			if let Some(preferences_file) = &thumbnailer_config.preferences_file {
				if let Some(tool) = Preferences::load(preferences_file)
					.await?
					.external_tool_path()
				{
					thumbnailer_config.external_tool_path = tool.to_path_buf();
				}
			}

			println!("{}", serde_json::to_string_pretty(&thumbnailer_config)?);
			Ok(())
		}
	}
}

async fn generate(
	config: ThumbnailerConfig,
	paths: Vec<PathBuf>,
	out: Option<PathBuf>,
	wait: Duration,
) -> Result<()> {
	if let Some(out) = &out {
		tokio::fs::create_dir_all(out)
			.await
			.with_context(|| format!("creating output directory {}", out.display()))?;
	}

	let thumbnailer = Thumbnailer::new(config).await;
	let (tx, mut rx) = mpsc::unbounded_channel();

	let mut waiting = HashMap::new();
	for path in paths {
		let source = SourceReference::from_path(&path);
		if SourceKind::classify(source.path()).is_none() {
			warn!("Skipping unsupported file: {}", path.display());
			continue;
		}

		let tx = tx.clone();
		let key = source.path().to_path_buf();
		waiting.insert(key.clone(), path);
		thumbnailer.request_thumbnail(source, move |thumbnail| {
			tx.send((key, thumbnail)).ok();
		});
	}
	drop(tx);

	let deadline = tokio::time::Instant::now() + wait;
	while !waiting.is_empty() {
		let Ok(Some((key, thumbnail))) = timeout_at(deadline, rx.recv()).await else {
			break;
		};

		let Some(path) = waiting.remove(&key) else {
			continue;
		};

		match &out {
			Some(out) => {
				let target = output_path(out, &path);
				tokio::fs::write(&target, thumbnail.to_png()?)
					.await
					.with_context(|| format!("writing {}", target.display()))?;
				println!("{} -> {}", path.display(), target.display());
			}
			None => println!(
				"{}: {}x{}",
				path.display(),
				thumbnail.width(),
				thumbnail.height()
			),
		}
	}

	debug!(
		pending = thumbnailer.pending_requests(),
		cached = thumbnailer.memory_cache_len(),
		"Generation finished"
	);

	if waiting.is_empty() {
		return Ok(());
	}

	for path in waiting.values() {
		eprintln!("No thumbnail for {}", path.display());
	}

	bail!("{} thumbnails could not be generated", waiting.len())
}

fn output_path(out: &Path, source: &Path) -> PathBuf {
	let mut file_name = source
		.file_name()
		.map(|name| name.to_os_string())
		.unwrap_or_else(|| "thumbnail".into());
	file_name.push(".png");

	out.join(file_name)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn output_keeps_the_source_file_name() {
		assert_eq!(
			output_path(Path::new("/tmp/out"), Path::new("/videos/clip.mp4")),
			PathBuf::from("/tmp/out/clip.mp4.png")
		);
	}

	#[test]
	fn parses_global_flags_after_subcommand() {
		let cli = Cli::try_parse_from([
			"xfp-thumbs",
			"generate",
			"a.png",
			"b.mp4",
			"--out",
			"thumbs",
			"--max-cache-files",
			"10",
		])
		.unwrap();

		assert_eq!(cli.max_cache_files, Some(10));
		assert!(matches!(
			cli.command,
			Commands::Generate { ref paths, wait: 30, .. } if paths.len() == 2
		));
	}
}
