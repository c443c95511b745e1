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

mod error;
mod extractor;
mod probe;

pub use error::{DurationParseError, Error};
pub use extractor::{FrameExtractor, FrameExtractorBuilder};
pub use probe::{format_timestamp, parse_duration};

/// Video extensions the external tool is asked to extract frames from.
pub const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "mkv", "avi", "webm", "mov"];

/// Case-insensitive check against [`VIDEO_EXTENSIONS`].
pub fn is_supported_extension(ext: &std::ffi::OsStr) -> bool {
	VIDEO_EXTENSIONS
		.iter()
		.any(|supported| ext.eq_ignore_ascii_case(supported))
}
