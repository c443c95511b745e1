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

mod consts;
mod error;
mod formatter;
mod generic;
mod render;
mod thumbnail;

pub use consts::{IMAGE_EXTENSIONS, JPEG_QUALITY, THUMBNAIL_SIZE};
pub use error::{Error, Result};
pub use formatter::{format_image, is_supported_extension};
pub use image::DynamicImage;
pub use render::{letterbox_dimensions, render_thumbnail};
pub use thumbnail::ThumbnailImage;

use std::{fs, path::Path};

pub trait ImageHandler {
	fn get_data(&self, path: &Path) -> Result<Vec<u8>> {
		Ok(fs::read(path)?)
	}

	fn handle_image(&self, path: &Path) -> Result<DynamicImage>;
}
