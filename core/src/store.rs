use crate::{error::ThumbnailerError, fingerprint::Fingerprint};

use xfp_images::{ThumbnailImage, JPEG_QUALITY};
use xfp_utils::error::FileIOError;

use std::{
	ffi::OsStr,
	fs,
	io::{self, Write},
	path::{Path, PathBuf},
	time::{Duration, SystemTime},
};

use serde::Serialize;
use tempfile::Builder;
use tracing::{debug, trace, warn};

pub const THUMBNAIL_EXTENSION: &str = "jpg";

const PARTIAL_PREFIX: &str = ".partial-";
const PARTIAL_SUFFIX: &str = ".tmp";

/// Partial writes younger than this may still belong to a live writer.
const STALE_PARTIAL_AGE: Duration = Duration::from_secs(10 * 60);

/// Eviction stops once both totals are at or below this share of their maxima.
const WATERMARK_NUMERATOR: u64 = 4;
const WATERMARK_DENOMINATOR: u64 = 5;

/// On disk tier: one `<fingerprint-hex>.jpg` per thumbnail, in a single flat directory.
///
/// Every method does blocking I/O.
#[derive(Debug, Clone)]
pub struct PersistentStore {
	dir: PathBuf,
	max_size_bytes: u64,
	max_file_count: usize,
}

/// What a [`PersistentStore::cleanup`] pass found and did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EvictionReport {
	/// Cached thumbnails found.
	pub scanned: usize,
	pub removed: usize,
	pub bytes_freed: u64,
	pub remaining_files: usize,
	pub remaining_bytes: u64,
}

#[derive(Debug)]
struct CachedFile {
	path: PathBuf,
	size: u64,
	modified: SystemTime,
}

impl PersistentStore {
	pub fn new(dir: impl Into<PathBuf>, max_size_bytes: u64, max_file_count: usize) -> Self {
		Self {
			dir: dir.into(),
			max_size_bytes,
			max_file_count,
		}
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	pub fn init(&self) -> Result<(), FileIOError> {
		fs::create_dir_all(&self.dir)
			.map_err(|e| FileIOError::from((&self.dir, e, "creating thumbnail cache directory")))
	}

	/// This does not check if a thumbnail exists, it just returns the path that it would exist at
	pub fn path_for(&self, fingerprint: &Fingerprint) -> PathBuf {
		let mut path = self.dir.join(fingerprint.to_hex());
		path.set_extension(THUMBNAIL_EXTENSION);

		path
	}

	/// Encoded bytes of the cached thumbnail, if there's one.
	pub fn try_load(&self, fingerprint: &Fingerprint) -> Result<Option<Vec<u8>>, FileIOError> {
		let path = self.path_for(fingerprint);

		match fs::metadata(&path) {
			Ok(metadata) if metadata.is_file() => {}
			Ok(_) => return Ok(None),
			Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(FileIOError::from((path, e, "reading cached thumbnail"))),
		}

		match fs::read(&path) {
			Ok(bytes) => Ok(Some(bytes)),
			// Evicted between the stat and the read
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(FileIOError::from((path, e, "reading cached thumbnail"))),
		}
	}

	/// Cached thumbnail, decoded.
	pub fn load_image(
		&self,
		fingerprint: &Fingerprint,
	) -> Result<Option<ThumbnailImage>, ThumbnailerError> {
		self.try_load(fingerprint)
			.map_err(ThumbnailerError::CacheScan)?
			.map(|bytes| ThumbnailImage::from_encoded(&bytes).map_err(Into::into))
			.transpose()
	}

	/// Encodes `thumbnail` and moves it into place, so readers never see a partial file.
	///
	/// Concurrent stores for the same fingerprint are harmless, the last rename wins.
	pub fn store(
		&self,
		fingerprint: &Fingerprint,
		thumbnail: &ThumbnailImage,
	) -> Result<PathBuf, ThumbnailerError> {
		let bytes = thumbnail.to_jpeg(JPEG_QUALITY)?;
		let path = self.path_for(fingerprint);

		let mut partial = Builder::new()
			.prefix(PARTIAL_PREFIX)
			.suffix(PARTIAL_SUFFIX)
			.tempfile_in(&self.dir)
			.map_err(|e| {
				ThumbnailerError::CacheWrite(FileIOError::from((
					&self.dir,
					e,
					"creating partial thumbnail",
				)))
			})?;

		partial.write_all(&bytes).map_err(|e| {
			ThumbnailerError::CacheWrite(FileIOError::from((
				partial.path(),
				e,
				"writing partial thumbnail",
			)))
		})?;

		partial.persist(&path).map_err(|e| {
			ThumbnailerError::CacheWrite(FileIOError::from((
				&path,
				e.error,
				"moving thumbnail into place",
			)))
		})?;

		trace!(path = %path.display(), bytes = bytes.len(), "Stored thumbnail");

		Ok(path)
	}

	/// Evicts the least recently modified thumbnails once the cache is over either limit.
	///
	/// Nothing happens while both the total size and the file count are within their maxima.
	/// Past that, files go oldest first until both totals are at or below 80% of their maxima.
	/// Stale partial writes are removed on every pass.
	pub fn cleanup(&self) -> Result<EvictionReport, FileIOError> {
		let read_dir = match fs::read_dir(&self.dir) {
			Ok(read_dir) => read_dir,
			Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(EvictionReport::default()),
			Err(e) => {
				return Err(FileIOError::from((
					&self.dir,
					e,
					"listing thumbnail cache directory",
				)))
			}
		};

		let mut files = Vec::new();
		let mut stale_partials = Vec::new();

		for entry in read_dir {
			let entry = entry.map_err(|e| {
				FileIOError::from((&self.dir, e, "listing thumbnail cache directory"))
			})?;
			let path = entry.path();

			let metadata = match entry.metadata() {
				Ok(metadata) if metadata.is_file() => metadata,
				Ok(_) => continue,
				Err(e) => {
					warn!(
						"Skipping unreadable cache entry: {:#?}",
						FileIOError::from((&path, e))
					);
					continue;
				}
			};

			let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

			if path.extension() == Some(OsStr::new(THUMBNAIL_EXTENSION)) {
				files.push(CachedFile {
					path,
					size: metadata.len(),
					modified,
				});
			} else if is_partial(&path)
				&& modified.elapsed().is_ok_and(|age| age >= STALE_PARTIAL_AGE)
			{
				stale_partials.push(path);
			}
		}

		for path in stale_partials {
			debug!(path = %path.display(), "Removing stale partial thumbnail");
			if let Err(e) = fs::remove_file(&path) {
				if e.kind() != io::ErrorKind::NotFound {
					warn!("{:#?}", FileIOError::from((path, e, "removing partial thumbnail")));
				}
			}
		}

		let scanned = files.len();
		let mut remaining_files = files.len();
		let mut remaining_bytes = files.iter().map(|file| file.size).sum::<u64>();
		let mut report = EvictionReport {
			scanned,
			..Default::default()
		};

		if remaining_bytes <= self.max_size_bytes && remaining_files <= self.max_file_count {
			trace!(
				files = remaining_files,
				bytes = remaining_bytes,
				"Thumbnail cache within limits"
			);
			report.remaining_files = remaining_files;
			report.remaining_bytes = remaining_bytes;
			return Ok(report);
		}

		let size_watermark = watermark(self.max_size_bytes);
		let count_watermark = usize::try_from(watermark(self.max_file_count as u64))
			.unwrap_or(self.max_file_count);

		files.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));

		for file in files {
			if remaining_bytes <= size_watermark && remaining_files <= count_watermark {
				break;
			}

			match fs::remove_file(&file.path) {
				Ok(()) => {}
				// Someone else got to it first, it's gone all the same
				Err(e) if e.kind() == io::ErrorKind::NotFound => {}
				Err(e) => {
					warn!(
						"{:#?}",
						FileIOError::from((&file.path, e, "evicting cached thumbnail"))
					);
					continue;
				}
			}

			remaining_files -= 1;
			remaining_bytes -= file.size;
			report.removed += 1;
			report.bytes_freed += file.size;
		}

		report.remaining_files = remaining_files;
		report.remaining_bytes = remaining_bytes;

		debug!(
			removed = report.removed,
			bytes_freed = report.bytes_freed,
			remaining_files,
			remaining_bytes,
			"Evicted thumbnails"
		);

		Ok(report)
	}
}

fn watermark(max: u64) -> u64 {
	u64::try_from(
		u128::from(max) * u128::from(WATERMARK_NUMERATOR) / u128::from(WATERMARK_DENOMINATOR),
	)
	.unwrap_or(max)
}

fn is_partial(path: &Path) -> bool {
	path.file_name()
		.and_then(OsStr::to_str)
		.is_some_and(|name| name.starts_with(PARTIAL_PREFIX) && name.ends_with(PARTIAL_SUFFIX))
}

#[cfg(test)]
mod tests {
	use super::*;

	use crate::fingerprint::compute_fingerprint;

	use std::fs::OpenOptions;

	use tempfile::tempdir;

	fn write_aged(path: &Path, bytes: &[u8], age: Duration) {
		fs::write(path, bytes).unwrap();
		OpenOptions::new()
			.write(true)
			.open(path)
			.unwrap()
			.set_modified(SystemTime::now() - age)
			.unwrap();
	}

	fn names(dir: &Path) -> Vec<String> {
		let mut names = fs::read_dir(dir)
			.unwrap()
			.map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
			.collect::<Vec<_>>();
		names.sort();
		names
	}

	fn sample_fingerprint(dir: &Path) -> Fingerprint {
		let source = dir.join("source.png");
		fs::write(&source, b"pretend this is a png").unwrap();
		compute_fingerprint(source).unwrap()
	}

	#[test]
	fn watermark_is_eighty_percent() {
		assert_eq!(watermark(5), 4);
		assert_eq!(watermark(100), 80);
		assert_eq!(watermark(10_000), 8_000);
		assert_eq!(watermark(500 * 1024 * 1024), 419_430_400);
		assert_eq!(watermark(0), 0);
	}

	#[test]
	fn evicts_oldest_down_to_count_watermark() {
		let dir = tempdir().unwrap();
		let store = PersistentStore::new(dir.path(), 500 * 1024 * 1024, 5);

		// a.jpg is the oldest, j.jpg the newest
		for (i, name) in ('a'..='j').enumerate() {
			write_aged(
				&dir.path().join(format!("{name}.jpg")),
				b"0123456789",
				Duration::from_secs(1000 - i as u64 * 10),
			);
		}

		let report = store.cleanup().unwrap();

		assert_eq!(names(dir.path()), ["g.jpg", "h.jpg", "i.jpg", "j.jpg"]);
		assert_eq!(
			report,
			EvictionReport {
				scanned: 10,
				removed: 6,
				bytes_freed: 60,
				remaining_files: 4,
				remaining_bytes: 40,
			}
		);
	}

	#[test]
	fn evicts_down_to_size_watermark() {
		let dir = tempdir().unwrap();
		let store = PersistentStore::new(dir.path(), 100, 10_000);

		for (i, name) in ('a'..='e').enumerate() {
			write_aged(
				&dir.path().join(format!("{name}.jpg")),
				&[0; 30],
				Duration::from_secs(1000 - i as u64 * 10),
			);
		}

		let report = store.cleanup().unwrap();

		// 150 bytes against a 100 byte limit, kept until at most 80 remain
		assert_eq!(names(dir.path()), ["d.jpg", "e.jpg"]);
		assert_eq!(report.removed, 3);
		assert_eq!(report.remaining_bytes, 60);
	}

	#[test]
	fn within_limits_removes_nothing() {
		let dir = tempdir().unwrap();
		let store = PersistentStore::new(dir.path(), 1024, 5);

		for name in ['a', 'b', 'c', 'd', 'e'] {
			fs::write(dir.path().join(format!("{name}.jpg")), b"0123456789").unwrap();
		}

		let report = store.cleanup().unwrap();

		assert_eq!(report.removed, 0);
		assert_eq!(report.remaining_files, 5);
		assert_eq!(names(dir.path()).len(), 5);
	}

	#[test]
	fn only_thumbnails_count_and_stale_partials_go() {
		let dir = tempdir().unwrap();
		let store = PersistentStore::new(dir.path(), 1024, 1);

		write_aged(&dir.path().join("a.jpg"), b"old", Duration::from_secs(100));
		write_aged(&dir.path().join("b.jpg"), b"new", Duration::from_secs(10));
		fs::write(dir.path().join("notes.txt"), b"not a thumbnail").unwrap();
		write_aged(
			&dir.path().join(".partial-abc.tmp"),
			b"interrupted",
			Duration::from_secs(3600),
		);
		fs::write(dir.path().join(".partial-live.tmp"), b"in progress").unwrap();

		let report = store.cleanup().unwrap();

		assert_eq!(report.scanned, 2);
		// A watermark of zero files empties the cache
		assert_eq!(
			names(dir.path()),
			[".partial-live.tmp", "notes.txt"]
		);
	}

	#[test]
	fn missing_directory_is_an_empty_cache() {
		let dir = tempdir().unwrap();
		let store = PersistentStore::new(dir.path().join("never-created"), 1024, 5);

		assert_eq!(store.cleanup().unwrap(), EvictionReport::default());
	}

	#[test]
	fn store_then_load() {
		let dir = tempdir().unwrap();
		let store = PersistentStore::new(dir.path().join("cache"), 1024 * 1024, 100);
		store.init().unwrap();
		let fingerprint = sample_fingerprint(dir.path());

		assert!(store.try_load(&fingerprint).unwrap().is_none());

		let thumbnail = ThumbnailImage::from_raw(128, 128, vec![200; 128 * 128 * 4]).unwrap();
		let path = store.store(&fingerprint, &thumbnail).unwrap();

		assert_eq!(path, store.path_for(&fingerprint));
		assert_eq!(
			path.file_name().unwrap().to_string_lossy(),
			format!("{}.jpg", fingerprint.to_hex())
		);
		assert_eq!(names(store.dir()), [format!("{}.jpg", fingerprint.to_hex())]);

		let bytes = store.try_load(&fingerprint).unwrap().unwrap();
		assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

		let loaded = store.load_image(&fingerprint).unwrap().unwrap();
		assert_eq!((loaded.width(), loaded.height()), (128, 128));
	}

	#[test]
	fn corrupt_thumbnail_is_an_invalid_image() {
		let dir = tempdir().unwrap();
		let store = PersistentStore::new(dir.path(), 1024 * 1024, 100);
		let fingerprint = sample_fingerprint(dir.path());
		fs::write(store.path_for(&fingerprint), b"truncated jpeg").unwrap();

		assert!(matches!(
			store.load_image(&fingerprint),
			Err(ThumbnailerError::InvalidImage(_))
		));
	}

	#[test]
	fn store_into_missing_directory_is_a_cache_write_error() {
		let dir = tempdir().unwrap();
		let store = PersistentStore::new(dir.path().join("missing"), 1024, 5);
		let fingerprint = sample_fingerprint(dir.path());
		let thumbnail = ThumbnailImage::from_raw(128, 128, vec![0; 128 * 128 * 4]).unwrap();

		assert!(matches!(
			store.store(&fingerprint, &thumbnail),
			Err(ThumbnailerError::CacheWrite(_))
		));
	}
}
