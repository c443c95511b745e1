use xfp_utils::error::FileIOError;

use thiserror::Error;
use tokio::task::JoinError;

/// Why a thumbnail couldn't be produced.
///
/// None of these reach the requester, whose callback is simply never invoked. They're logged by
/// the worker that hit them and returned by the few operations that have an error channel, like
/// [`crate::Thumbnailer::run_cleanup`] and [`crate::Thumbnailer::set_external_tool_path`].
#[derive(Error, Debug)]
pub enum ThumbnailerError {
	#[error("source file is inaccessible: {0}")]
	Stat(#[source] FileIOError),
	#[error("invalid image: {0}")]
	InvalidImage(#[from] xfp_images::Error),
	#[error("frame extraction failed: {0}")]
	FrameExtraction(#[from] xfp_ffmpeg::Error),
	#[error("failed to write cached thumbnail: {0}")]
	CacheWrite(#[source] FileIOError),
	#[error("failed to scan the thumbnail cache: {0}")]
	CacheScan(#[source] FileIOError),
	#[error(transparent)]
	Preferences(#[from] PreferencesError),
	#[error("background task failed: {0}")]
	BackgroundTaskFailed(#[from] JoinError),
}

#[derive(Error, Debug)]
pub enum PreferencesError {
	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error("malformed preferences file: {0}")]
	Serde(#[from] serde_json::Error),
}
