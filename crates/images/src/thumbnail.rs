use crate::{consts::THUMBNAIL_SIZE, render_thumbnail, Error, Result};

use std::{fmt, io::Cursor, sync::Arc};

use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageFormat, Rgba, RgbaImage};

/// A ready to display thumbnail.
///
/// Pixels live behind an [`Arc`], so clones are cheap handles to the same immutable raster.
#[derive(Clone)]
pub struct ThumbnailImage {
	pixels: Arc<RgbaImage>,
}

impl ThumbnailImage {
	pub(crate) fn from_rgba(pixels: RgbaImage) -> Self {
		Self {
			pixels: Arc::new(pixels),
		}
	}

	/// Builds a thumbnail from raw RGBA bytes, as produced by [`ThumbnailImage::as_raw`].
	pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
		RgbaImage::from_raw(width, height, data)
			.map(Self::from_rgba)
			.ok_or(Error::InvalidLength { width, height })
	}

	/// Decodes an encoded thumbnail, re-rendering it if it isn't a proper square thumbnail.
	pub fn from_encoded(bytes: &[u8]) -> Result<Self> {
		let image = image::load_from_memory(bytes)?;

		if image.width() == THUMBNAIL_SIZE && image.height() == THUMBNAIL_SIZE {
			Ok(Self::from_rgba(image.into_rgba8()))
		} else {
			render_thumbnail(&image)
		}
	}

	/// Encodes as JPEG at `quality` (1-100); the alpha channel is dropped.
	pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
		let rgb = DynamicImage::ImageRgba8(self.pixels.as_ref().clone()).into_rgb8();

		let mut bytes = Vec::with_capacity(16 * 1024);
		JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100)).encode_image(&rgb)?;

		Ok(bytes)
	}

	pub fn to_png(&self) -> Result<Vec<u8>> {
		let mut bytes = Cursor::new(Vec::new());
		self.pixels.write_to(&mut bytes, ImageFormat::Png)?;

		Ok(bytes.into_inner())
	}

	pub fn width(&self) -> u32 {
		self.pixels.width()
	}

	pub fn height(&self) -> u32 {
		self.pixels.height()
	}

	pub fn get_pixel(&self, x: u32, y: u32) -> Rgba<u8> {
		*self.pixels.get_pixel(x, y)
	}

	pub fn as_rgba(&self) -> &RgbaImage {
		&self.pixels
	}

	pub fn as_raw(&self) -> &[u8] {
		self.pixels.as_raw()
	}

	/// Whether both handles point to the very same raster.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.pixels, &other.pixels)
	}
}

impl fmt::Debug for ThumbnailImage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ThumbnailImage")
			.field("width", &self.width())
			.field("height", &self.height())
			.finish_non_exhaustive()
	}
}
