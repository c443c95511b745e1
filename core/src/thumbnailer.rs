use crate::{
	config::ThumbnailerConfig,
	error::ThumbnailerError,
	inflight::InFlight,
	memory::MemoryCache,
	preferences::Preferences,
	prewarm::prewarm,
	queue::RequestQueue,
	scheduler::{admit, run_worker, PendingRequest, ThumbnailCallback},
	source::{SourceKind, SourceReference},
	store::{EvictionReport, PersistentStore},
};

use xfp_ffmpeg::{FrameExtractor, FrameExtractorBuilder};
use xfp_images::ThumbnailImage;

use std::{
	path::{Path, PathBuf},
	sync::Arc,
};

use parking_lot::RwLock;
use tokio::{
	runtime::Handle,
	task::{spawn_blocking, JoinHandle},
};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, trace, warn};

/// State shared between the [`Thumbnailer`] handle, its workers and prewarm tasks.
pub(crate) struct Shared {
	pub(crate) config: ThumbnailerConfig,
	pub(crate) memory: MemoryCache,
	pub(crate) store: Option<PersistentStore>,
	pub(crate) queue: RequestQueue<PendingRequest>,
	pub(crate) in_flight: InFlight<ThumbnailCallback>,
	tool_path: RwLock<PathBuf>,
	/// Requests can come from threads outside the runtime, persistent lookups are spawned here.
	runtime: Handle,
}

impl Shared {
	/// Picks up the current tool path, so a change applies to the next video processed.
	pub(crate) fn frame_extractor(&self) -> FrameExtractor {
		FrameExtractorBuilder::new()
			.tool_path(self.tool_path.read().as_os_str())
			.timeout(self.config.tool_timeout)
			.build()
	}

	pub(crate) fn enqueue(&self, request: PendingRequest) {
		if let Some(dropped) = self.queue.push(request) {
			debug!(
				source = %dropped.source,
				"Thumbnail queue is full, dropped its oldest request"
			);
		}
	}
}

/// Thumbnail cache-and-generation engine.
///
/// Requests are answered from memory when possible, then from the persistent cache. Only what
/// neither tier has is queued for a fixed pool of workers that decode images or extract video
/// frames.
/// Workers live on the tokio runtime this was created in and stop when it's dropped.
//
// Cache directory has the following structure:
// <cache_dir>/
// ├── <fingerprint-hex>.jpg
// └── .partial-<random>.tmp # writes in progress
pub struct Thumbnailer {
	shared: Arc<Shared>,
	cancel_token: CancellationToken,
	_cancel_loop: DropGuard,
}

impl Thumbnailer {
	pub async fn new(config: ThumbnailerConfig) -> Self {
		let tool_path = load_tool_path(&config).await;
		let store = init_store(&config).await;

		let shared = Arc::new(Shared {
			memory: MemoryCache::new(),
			queue: RequestQueue::new(config.queue_capacity),
			in_flight: InFlight::new(),
			tool_path: RwLock::new(tool_path),
			runtime: Handle::current(),
			store,
			config,
		});

		let cancel_token = CancellationToken::new();

		let worker_count = shared.config.worker_count.max(1);
		for worker_id in 0..worker_count {
			tokio::spawn(run_worker(
				worker_id,
				Arc::clone(&shared),
				cancel_token.child_token(),
			));
		}

		if let Some(store) = shared.store.clone() {
			tokio::spawn(async move {
				match spawn_blocking(move || store.cleanup()).await {
					Ok(Ok(report)) if report.removed > 0 => info!(
						removed = report.removed,
						bytes_freed = report.bytes_freed,
						"Startup thumbnail cache cleanup finished"
					),
					Ok(Ok(_)) => {}
					Ok(Err(e)) => error!("Startup thumbnail cache cleanup failed: {e:#?}"),
					Err(e) => error!("Startup thumbnail cache cleanup task panicked: {e:#?}"),
				}
			});
		}

		debug!(
			worker_count,
			cache_dir = ?shared.store.as_ref().map(PersistentStore::dir),
			"Thumbnailer started"
		);

		Self {
			shared,
			_cancel_loop: cancel_token.clone().drop_guard(),
			cancel_token,
		}
	}

	/// Asks for the thumbnail of `source`, delivered to `on_complete` on a worker thread.
	///
	/// A thumbnail already in memory is delivered before this returns, on the caller's thread.
	/// A persistent cache hit is delivered from a background task without entering the queue.
	/// Sources with a scheme other than `file` or an unsupported extension are ignored.
	/// `on_complete` is never called when generation fails or when the request is pushed out
	/// of a full queue.
	pub fn request_thumbnail(
		&self,
		source: SourceReference,
		on_complete: impl FnOnce(ThumbnailImage) + Send + 'static,
	) {
		if !source.is_local_file() {
			trace!(source = %source, "Ignoring thumbnail request for a non local source");
			return;
		}

		let Some(kind) = SourceKind::classify(source.path()) else {
			trace!(source = %source, "Ignoring thumbnail request for an unsupported file");
			return;
		};

		if let Some(thumbnail) = self.shared.memory.get(source.path()) {
			on_complete(thumbnail);
			return;
		}

		let on_complete: ThumbnailCallback = Box::new(on_complete);

		if self.shared.store.is_some() {
			self.shared.runtime.spawn(admit(
				Arc::clone(&self.shared),
				source,
				kind,
				on_complete,
			));
		} else {
			self.shared.enqueue(PendingRequest {
				source,
				kind,
				fingerprint: None,
				on_complete,
			});
		}
	}

	/// Never blocks, for painting whatever is ready right away.
	pub fn peek_memory_cache(&self, path: impl AsRef<Path>) -> Option<ThumbnailImage> {
		self.shared.memory.get(path)
	}

	/// Hydrates the memory cache from the persistent one in the background.
	///
	/// The handle resolves to how many thumbnails were hydrated; dropping it doesn't stop the
	/// batch.
	pub fn prewarm_batch(
		&self,
		sources: impl IntoIterator<Item = SourceReference>,
	) -> JoinHandle<usize> {
		tokio::spawn(prewarm(
			Arc::clone(&self.shared),
			sources.into_iter().collect(),
			self.cancel_token.child_token(),
		))
	}

	/// Switches the video frame extractor and saves the choice to the preferences file.
	///
	/// The new path applies right away, even if saving it fails.
	pub async fn set_external_tool_path(
		&self,
		path: impl Into<PathBuf>,
	) -> Result<(), ThumbnailerError> {
		let path = path.into();
		*self.shared.tool_path.write() = path.clone();

		let Some(preferences_file) = &self.shared.config.preferences_file else {
			debug!("No preferences file configured, external tool path not persisted");
			return Ok(());
		};

		let mut preferences = Preferences::load(preferences_file)
			.await
			.unwrap_or_else(|e| {
				warn!("Overwriting unreadable preferences: {e:#?}");
				Preferences::default()
			});

		preferences.set_external_tool_path(path);
		preferences.save(preferences_file).await?;

		Ok(())
	}

	/// Runs an eviction pass now, off the caller's thread.
	pub async fn run_cleanup(&self) -> Result<EvictionReport, ThumbnailerError> {
		let Some(store) = self.shared.store.clone() else {
			return Ok(EvictionReport::default());
		};

		spawn_blocking(move || store.cleanup())
			.await?
			.map_err(ThumbnailerError::CacheScan)
	}

	/// Requests waiting for a worker. Requests still being looked up on disk aren't counted.
	pub fn pending_requests(&self) -> usize {
		self.shared.queue.len()
	}

	pub fn memory_cache_len(&self) -> usize {
		self.shared.memory.len()
	}

	/// `None` when running without a persistent tier.
	pub fn cache_dir(&self) -> Option<&Path> {
		self.shared.store.as_ref().map(PersistentStore::dir)
	}

	pub fn external_tool_path(&self) -> PathBuf {
		self.shared.tool_path.read().clone()
	}

	pub fn config(&self) -> &ThumbnailerConfig {
		&self.shared.config
	}
}

async fn load_tool_path(config: &ThumbnailerConfig) -> PathBuf {
	let Some(preferences_file) = &config.preferences_file else {
		return config.external_tool_path.clone();
	};

	match Preferences::load(preferences_file).await {
		Ok(preferences) => preferences
			.external_tool_path()
			.map_or_else(|| config.external_tool_path.clone(), Path::to_path_buf),
		Err(e) => {
			error!("Failed to load thumbnailer preferences: {e:#?}");
			config.external_tool_path.clone()
		}
	}
}

async fn init_store(config: &ThumbnailerConfig) -> Option<PersistentStore> {
	let store = PersistentStore::new(
		config.cache_dir.clone()?,
		config.max_cache_size_bytes,
		config.max_cache_file_count,
	);

	match spawn_blocking({
		let store = store.clone();
		move || store.init()
	})
	.await
	{
		Ok(Ok(())) => Some(store),
		Ok(Err(e)) => {
			error!(
				"Failed to initialize thumbnail cache directory, \
				keeping thumbnails in memory only: {e:#?}"
			);
			None
		}
		Err(e) => {
			error!("Thumbnail cache directory initialization task panicked: {e:#?}");
			None
		}
	}
}
