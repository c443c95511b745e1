#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	clippy::expect_used,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::dbg_macro
)]
#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

//! Turns image and video paths into 128x128 letterboxed previews, caching them in memory and
//! on disk under content fingerprints.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod inflight;
pub mod memory;
pub mod preferences;
pub mod queue;
pub mod source;
pub mod store;

mod prewarm;
mod scheduler;
mod thumbnailer;

pub use config::ThumbnailerConfig;
pub use error::{PreferencesError, ThumbnailerError};
pub use fingerprint::{compute_fingerprint, Fingerprint};
pub use memory::MemoryCache;
pub use preferences::Preferences;
pub use scheduler::ThumbnailCallback;
pub use source::{SourceKind, SourceReference, SourceReferenceParseError};
pub use store::{EvictionReport, PersistentStore};
pub use thumbnailer::Thumbnailer;

pub use xfp_images::ThumbnailImage;
