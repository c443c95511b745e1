use crate::{
	fingerprint::compute_fingerprint,
	source::{SourceKind, SourceReference},
	thumbnailer::Shared,
};

use std::sync::Arc;

use tokio::{task::spawn_blocking, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Promotes persistent cache hits for `sources` into the memory cache, returning how many were
/// hydrated.
///
/// Best effort: a source that can't be stat'd, isn't cached or fails to decode is skipped.
/// Nothing is ever generated here.
pub(crate) async fn prewarm(
	shared: Arc<Shared>,
	sources: Vec<SourceReference>,
	cancel_token: CancellationToken,
) -> usize {
	let Some(store) = shared.store.clone() else {
		return 0;
	};

	let mut hydrated = 0;

	for source in sources {
		if cancel_token.is_cancelled() {
			break;
		}

		if !source.is_local_file() || SourceKind::classify(source.path()).is_none() {
			continue;
		}

		if shared.memory.contains(source.path()) {
			continue;
		}

		let store = store.clone();
		let path = source.path().to_path_buf();
		let loaded = spawn_blocking(move || {
			let fingerprint = compute_fingerprint(&path).ok()?;
			store.load_image(&fingerprint).ok().flatten()
		})
		.await;

		match loaded {
			Ok(Some(thumbnail)) => {
				trace!(source = %source, "Prewarmed thumbnail");
				shared.memory.put(source.path(), thumbnail);
				hydrated += 1;
			}
			Ok(None) => {}
			Err(e) => debug!(source = %source, "Prewarm task failed; {e:#?}"),
		}

		sleep(shared.config.prewarm_throttle).await;
	}

	debug!(hydrated, "Prewarm batch finished");

	hydrated
}
