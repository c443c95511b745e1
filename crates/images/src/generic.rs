use crate::{Error, ImageHandler, Result};

use std::path::Path;

use image::{DynamicImage, GenericImageView};

pub struct GenericHandler {}

impl ImageHandler for GenericHandler {
	fn handle_image(&self, path: &Path) -> Result<DynamicImage> {
		let data = self.get_data(path)?;
		let image = image::load_from_memory(&data)?;

		let (width, height) = image.dimensions();
		if width == 0 || height == 0 {
			return Err(Error::InvalidDimensions { width, height });
		}

		Ok(image)
	}
}
