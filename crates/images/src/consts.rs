/// Still image extensions we know how to turn into thumbnails.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Side, in pixels, of every generated thumbnail.
pub const THUMBNAIL_SIZE: u32 = 128;

/// Quality used when encoding thumbnails for the persistent cache.
pub const JPEG_QUALITY: u8 = 85;
