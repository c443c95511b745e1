pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("error while loading the image (via the `image` crate): {0}")]
	Image(#[from] image::ImageError),
	#[error("there was an i/o error: {0}")]
	Io(#[from] std::io::Error),
	#[error("the image has invalid dimensions: {width}x{height}")]
	InvalidDimensions { width: u32, height: u32 },
	#[error("the image provided is unsupported")]
	Unsupported,
	#[error("invalid path provided (it had no file extension)")]
	NoExtension,
	#[error("the raster has an invalid length for a {width}x{height} RGBA image")]
	InvalidLength { width: u32, height: u32 },
}
