use crate::{
	consts::IMAGE_EXTENSIONS,
	error::{Error, Result},
	generic::GenericHandler,
	ImageHandler,
};

use std::{ffi::OsStr, path::Path};

use image::DynamicImage;

pub fn format_image(path: impl AsRef<Path>) -> Result<DynamicImage> {
	let ext = path
		.as_ref()
		.extension()
		.map_or_else(|| Err(Error::NoExtension), |e| Ok(e.to_ascii_lowercase()))?;
	match_to_handler(&ext)?.handle_image(path.as_ref())
}

/// Case-insensitive check against [`IMAGE_EXTENSIONS`].
pub fn is_supported_extension(ext: &OsStr) -> bool {
	IMAGE_EXTENSIONS
		.iter()
		.any(|supported| ext.eq_ignore_ascii_case(supported))
}

fn match_to_handler(ext: &OsStr) -> Result<Box<dyn ImageHandler>> {
	if is_supported_extension(ext) {
		Ok(Box::new(GenericHandler {}))
	} else {
		Err(Error::Unsupported)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use image::{Rgb, RgbImage};
	use tempfile::tempdir;

	#[test]
	fn extension_matching_ignores_case() {
		assert!(is_supported_extension(OsStr::new("JPG")));
		assert!(is_supported_extension(OsStr::new("jpeg")));
		assert!(is_supported_extension(OsStr::new("Png")));
		assert!(!is_supported_extension(OsStr::new("gif")));
		assert!(!is_supported_extension(OsStr::new("mp4")));
	}

	#[test]
	fn decodes_png_from_disk() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("still.PNG");
		RgbImage::from_pixel(40, 20, Rgb([0, 255, 0]))
			.save_with_format(&path, image::ImageFormat::Png)
			.unwrap();

		let image = format_image(&path).unwrap();
		assert_eq!((image.width(), image.height()), (40, 20));
	}

	#[test]
	fn rejects_unknown_and_missing_extensions() {
		let dir = tempdir().unwrap();

		assert!(matches!(
			format_image(dir.path().join("clip.gif")),
			Err(Error::Unsupported)
		));
		assert!(matches!(
			format_image(dir.path().join("no_extension")),
			Err(Error::NoExtension)
		));
	}

	#[test]
	fn garbage_bytes_are_an_image_error() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("broken.jpg");
		std::fs::write(&path, b"definitely not a jpeg").unwrap();

		assert!(matches!(format_image(&path), Err(Error::Image(_))));
	}
}
