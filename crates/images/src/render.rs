use crate::{consts::THUMBNAIL_SIZE, Error, Result, ThumbnailImage};

use image::{
	imageops::{self, FilterType},
	DynamicImage, GenericImageView, Rgba, RgbaImage,
};
use tracing::trace;

const LETTERBOX_COLOR: Rgba<u8> = Rgba([0, 0, 0, u8::MAX]);

/// Size the content takes inside the square thumbnail: the longer side becomes
/// [`THUMBNAIL_SIZE`] and the shorter one is scaled proportionally (floored, never below 1).
pub fn letterbox_dimensions(width: u32, height: u32) -> Result<(u32, u32)> {
	if width == 0 || height == 0 {
		return Err(Error::InvalidDimensions { width, height });
	}

	let proportional = |numerator: u32, denominator: u32| {
		let scaled = u64::from(THUMBNAIL_SIZE) * u64::from(numerator) / u64::from(denominator);
		u32::try_from(scaled).unwrap_or(THUMBNAIL_SIZE).max(1)
	};

	Ok(if width > height {
		(THUMBNAIL_SIZE, proportional(height, width))
	} else {
		(proportional(width, height), THUMBNAIL_SIZE)
	})
}

/// Renders `image` into a [`THUMBNAIL_SIZE`] square, centered over a black background.
pub fn render_thumbnail(image: &DynamicImage) -> Result<ThumbnailImage> {
	let (width, height) = image.dimensions();
	let (scaled_width, scaled_height) = letterbox_dimensions(width, height)?;

	// Triangle is a bilinear filter, cheap enough to run on every request
	let scaled = image
		.resize_exact(scaled_width, scaled_height, FilterType::Triangle)
		.to_rgba8();

	let mut canvas = RgbaImage::from_pixel(THUMBNAIL_SIZE, THUMBNAIL_SIZE, LETTERBOX_COLOR);
	let x = (THUMBNAIL_SIZE - scaled_width) / 2;
	let y = (THUMBNAIL_SIZE - scaled_height) / 2;
	imageops::overlay(&mut canvas, &scaled, i64::from(x), i64::from(y));

	trace!(
		%width,
		%height,
		%scaled_width,
		%scaled_height,
		"Rendered letterboxed thumbnail"
	);

	Ok(ThumbnailImage::from_rgba(canvas))
}
