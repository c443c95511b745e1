use crate::{
	error::ThumbnailerError,
	fingerprint::{compute_fingerprint, Fingerprint},
	inflight::Joined,
	source::{SourceKind, SourceReference},
	thumbnailer::Shared,
};

use xfp_images::{format_image, render_thumbnail, ThumbnailImage};

use std::{
	any::Any,
	fmt,
	panic::{catch_unwind, AssertUnwindSafe},
	path::Path,
	sync::Arc,
};

use tokio::task::spawn_blocking;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

/// Receives the finished thumbnail; never invoked when generation fails.
pub type ThumbnailCallback = Box<dyn FnOnce(ThumbnailImage) + Send + 'static>;

pub(crate) struct PendingRequest {
	pub(crate) source: SourceReference,
	pub(crate) kind: SourceKind,
	/// Known when the request already went through [`admit`].
	pub(crate) fingerprint: Option<Fingerprint>,
	pub(crate) on_complete: ThumbnailCallback,
}

impl fmt::Debug for PendingRequest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PendingRequest")
			.field("source", &self.source)
			.field("kind", &self.kind)
			.field("fingerprint", &self.fingerprint)
			.finish_non_exhaustive()
	}
}

/// Answers a memory miss from the persistent cache, queueing the request only when the disk
/// doesn't have it.
///
/// Runs before queue admission so a full queue can only push out requests that actually need
/// a worker.
pub(crate) async fn admit(
	shared: Arc<Shared>,
	source: SourceReference,
	kind: SourceKind,
	on_complete: ThumbnailCallback,
) {
	let path = source.path();

	let fingerprint = match spawn_blocking({
		let path = path.to_path_buf();
		move || compute_fingerprint(path)
	})
	.await
	{
		Ok(Ok(fingerprint)) => fingerprint,
		Ok(Err(e)) => {
			debug!(source = %source, "Dropping thumbnail request; {e:#?}");
			return;
		}
		Err(e) => {
			error!("Thumbnail fingerprint task panicked; {e:#?}");
			return;
		}
	};

	if let Some(thumbnail) = shared.memory.get(path) {
		deliver(on_complete, &thumbnail);
		return;
	}

	if let Some(thumbnail) = load_cached(&shared, path, fingerprint).await {
		// A worker publishes to memory before writing to disk, its raster wins over this one
		deliver(on_complete, &shared.memory.get_or_put(path, thumbnail));
		return;
	}

	shared.enqueue(PendingRequest {
		source,
		kind,
		fingerprint: Some(fingerprint),
		on_complete,
	});
}

/// Supervises one worker, restarting it if its task dies, until `cancel_token` fires.
pub(crate) async fn run_worker(
	worker_id: usize,
	shared: Arc<Shared>,
	cancel_token: CancellationToken,
) {
	loop {
		if let Err(e) = tokio::spawn(worker(
			worker_id,
			Arc::clone(&shared),
			cancel_token.clone(),
		))
		.await
		{
			error!(
				"Error on thumbnail worker {worker_id}; \
				Error: {e}; \
				Restarting the worker loop...",
			);
		}

		if cancel_token.is_cancelled() {
			break;
		}
	}
}

async fn worker(worker_id: usize, shared: Arc<Shared>, cancel_token: CancellationToken) {
	trace!(worker_id, "Thumbnail worker started");

	loop {
		let request = tokio::select! {
			() = cancel_token.cancelled() => break,
			request = shared.queue.pop() => request,
		};

		process(&shared, request).await;
	}

	trace!(worker_id, "Thumbnail worker stopped");
}

async fn process(shared: &Arc<Shared>, request: PendingRequest) {
	let PendingRequest {
		source,
		kind,
		fingerprint,
		on_complete,
	} = request;
	let path = source.path();

	// Another worker may have produced it while this request waited in the queue
	if let Some(thumbnail) = shared.memory.get(path) {
		deliver(on_complete, &thumbnail);
		return;
	}

	let Joined::Leader(leadership) = shared.in_flight.join(path, on_complete) else {
		return;
	};

	if let Some(thumbnail) = shared.memory.get(path) {
		fan_out(leadership.finish(), &thumbnail);
		return;
	}

	match generate(shared, path, kind, fingerprint).await {
		Ok(thumbnail) => fan_out(leadership.finish(), &thumbnail),
		Err(e) => {
			debug!(
				source = %source,
				"Dropping thumbnail request; {e:#?}"
			);
			// Dropping the leadership discards this request's callbacks
		}
	}
}

fn fan_out(callbacks: Vec<ThumbnailCallback>, thumbnail: &ThumbnailImage) {
	for callback in callbacks {
		deliver(callback, thumbnail);
	}
}

/// A panicking callback is logged and contained, it can't cost anyone else their thumbnail.
fn deliver(callback: ThumbnailCallback, thumbnail: &ThumbnailImage) {
	let thumbnail = thumbnail.clone();

	if let Err(panic) = catch_unwind(AssertUnwindSafe(move || callback(thumbnail))) {
		error!(
			"Thumbnail callback panicked: {}",
			panic_message(panic.as_ref())
		);
	}
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
	panic
		.downcast_ref::<&str>()
		.copied()
		.or_else(|| panic.downcast_ref::<String>().map(String::as_str))
		.unwrap_or("<non-string panic payload>")
}

/// Persistent cache first, then the decoder or the frame extractor.
///
/// The thumbnail is in the memory cache before its file is written.
async fn generate(
	shared: &Arc<Shared>,
	path: &Path,
	kind: SourceKind,
	fingerprint: Option<Fingerprint>,
) -> Result<ThumbnailImage, ThumbnailerError> {
	let fingerprint = match fingerprint {
		Some(fingerprint) => fingerprint,
		None => spawn_blocking({
			let path = path.to_path_buf();
			move || compute_fingerprint(path)
		})
		.await?
		.map_err(ThumbnailerError::Stat)?,
	};

	if let Some(thumbnail) = load_cached(shared, path, fingerprint).await {
		shared.memory.put(path, thumbnail.clone());
		return Ok(thumbnail);
	}

	let thumbnail = match kind {
		SourceKind::Image => {
			let path = path.to_path_buf();
			spawn_blocking(move || render_thumbnail(&format_image(path)?)).await??
		}
		SourceKind::Video => {
			let frame = shared.frame_extractor().extract(path).await?;
			spawn_blocking(move || render_thumbnail(&frame)).await??
		}
	};

	shared.memory.put(path, thumbnail.clone());

	if let Some(store) = shared.store.clone() {
		let to_store = thumbnail.clone();
		match spawn_blocking(move || store.store(&fingerprint, &to_store)).await {
			Ok(Ok(_)) => {}
			Ok(Err(e)) => warn!(
				path = %path.display(),
				"Failed to cache generated thumbnail; {e:#?}"
			),
			Err(e) => error!("Thumbnail cache write task panicked; {e:#?}"),
		}
	}

	Ok(thumbnail)
}

/// A corrupt cached thumbnail counts as a miss, it gets overwritten by the regenerated one.
async fn load_cached(
	shared: &Arc<Shared>,
	path: &Path,
	fingerprint: Fingerprint,
) -> Option<ThumbnailImage> {
	let store = shared.store.clone()?;

	match spawn_blocking(move || store.load_image(&fingerprint)).await {
		Ok(Ok(Some(thumbnail))) => {
			trace!(path = %path.display(), %fingerprint, "Persistent cache hit");
			Some(thumbnail)
		}
		Ok(Ok(None)) => None,
		Ok(Err(e)) => {
			warn!(
				path = %path.display(),
				%fingerprint,
				"Unusable cached thumbnail, regenerating; {e:#?}"
			);
			None
		}
		Err(e) => {
			error!("Thumbnail cache read task panicked; {e:#?}");
			None
		}
	}
}
