use xfp_images::ThumbnailImage;

use std::path::{Path, PathBuf};

use dashmap::DashMap;

/// Ready to display thumbnails keyed by source path, for the whole process lifetime.
///
/// Entries are never expired, only overwritten. A source modified after being cached keeps
/// its old thumbnail here until something puts a new one.
#[derive(Debug, Default)]
pub struct MemoryCache {
	entries: DashMap<PathBuf, ThumbnailImage>,
}

impl MemoryCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Never blocks on other readers; returns a cheap handle to the cached raster.
	pub fn get(&self, path: impl AsRef<Path>) -> Option<ThumbnailImage> {
		self.entries
			.get(path.as_ref())
			.map(|entry| entry.value().clone())
	}

	/// Last writer wins.
	pub fn put(&self, path: impl Into<PathBuf>, image: ThumbnailImage) {
		self.entries.insert(path.into(), image);
	}

	/// Keeps an entry that's already there, so concurrent readers end up sharing one raster.
	pub fn get_or_put(&self, path: impl Into<PathBuf>, image: ThumbnailImage) -> ThumbnailImage {
		self.entries.entry(path.into()).or_insert(image).value().clone()
	}

	pub fn contains(&self, path: impl AsRef<Path>) -> bool {
		self.entries.contains_key(path.as_ref())
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
