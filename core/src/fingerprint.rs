use xfp_utils::error::FileIOError;

use std::{
	fmt,
	fs::File,
	io::Read,
	path::{self, Path},
	time::UNIX_EPOCH,
};

use blake3::{Hash, Hasher};
use tracing::trace;

/// How much of the file's head goes into the digest.
pub const SAMPLE_SIZE: u64 = 32 * 1024;

/// Heuristic identity of a source file's content, derived from its absolute path, modification
/// time, size and first [`SAMPLE_SIZE`] bytes.
///
/// Edits past the sampled head that keep both size and modification time go unnoticed.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(Hash);

impl Fingerprint {
	/// 64 lowercase hex characters, used as the cached thumbnail's file stem.
	pub fn to_hex(&self) -> String {
		self.0.to_hex().to_string()
	}

	pub fn as_bytes(&self) -> &[u8; 32] {
		self.0.as_bytes()
	}
}

impl fmt::Display for Fingerprint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0.to_hex())
	}
}

impl fmt::Debug for Fingerprint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Fingerprint({})", self.0.to_hex())
	}
}

/// Blocking, run it off async threads.
///
/// Only the stat can fail; a file that can't be read after a successful stat contributes no
/// content bytes.
pub fn compute_fingerprint(path: impl AsRef<Path>) -> Result<Fingerprint, FileIOError> {
	let path = path.as_ref();
	let absolute = path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

	let metadata = absolute
		.metadata()
		.map_err(|e| FileIOError::from((&absolute, e, "reading source metadata")))?;
	let modified = metadata
		.modified()
		.map_err(|e| FileIOError::from((&absolute, e, "reading source modification time")))?;

	let mut hasher = Hasher::new();
	hasher.update(absolute.as_os_str().as_encoded_bytes());

	match modified.duration_since(UNIX_EPOCH) {
		Ok(since_epoch) => {
			hasher.update(&[0]);
			hasher.update(&since_epoch.as_secs().to_le_bytes());
			hasher.update(&since_epoch.subsec_nanos().to_le_bytes());
		}
		Err(e) => {
			let before_epoch = e.duration();
			hasher.update(&[1]);
			hasher.update(&before_epoch.as_secs().to_le_bytes());
			hasher.update(&before_epoch.subsec_nanos().to_le_bytes());
		}
	}

	hasher.update(&metadata.len().to_le_bytes());

	let mut head = Vec::with_capacity(SAMPLE_SIZE.min(metadata.len()) as usize);
	match File::open(&absolute).and_then(|file| file.take(SAMPLE_SIZE).read_to_end(&mut head)) {
		Ok(_) => {
			hasher.update(&head);
		}
		Err(e) => trace!(
			path = %absolute.display(),
			"Fingerprinting without content bytes; {e:#?}"
		),
	}

	Ok(Fingerprint(hasher.finalize()))
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::{
		fs::{self, OpenOptions},
		io::{Seek, SeekFrom, Write},
		time::{Duration, SystemTime},
	};

	use tempfile::tempdir;

	fn pin_mtime(path: &Path, mtime: SystemTime) {
		OpenOptions::new()
			.write(true)
			.open(path)
			.unwrap()
			.set_modified(mtime)
			.unwrap();
	}

	#[test]
	fn stable_for_unmodified_file() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("clip.mp4");
		fs::write(&path, b"initial content").unwrap();

		let first = compute_fingerprint(&path).unwrap();
		let second = compute_fingerprint(&path).unwrap();

		assert_eq!(first, second);
		assert_eq!(first.to_hex().len(), 64);
		assert!(first
			.to_hex()
			.chars()
			.all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
		assert_eq!(first.to_string(), first.to_hex());
	}

	#[test]
	fn changes_with_modification_time() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("clip.mp4");
		fs::write(&path, b"initial content").unwrap();

		let base = SystemTime::now() - Duration::from_secs(3600);
		pin_mtime(&path, base);
		let before = compute_fingerprint(&path).unwrap();

		pin_mtime(&path, base + Duration::from_secs(10));
		let after = compute_fingerprint(&path).unwrap();

		assert_ne!(before, after);
	}

	#[test]
	fn changes_with_sampled_content() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("clip.mp4");
		fs::write(&path, vec![0u8; 64 * 1024]).unwrap();

		let mtime = SystemTime::now() - Duration::from_secs(3600);
		pin_mtime(&path, mtime);
		let before = compute_fingerprint(&path).unwrap();

		let mut file = OpenOptions::new().write(true).open(&path).unwrap();
		file.seek(SeekFrom::Start(1024)).unwrap();
		file.write_all(b"edited").unwrap();
		drop(file);
		pin_mtime(&path, mtime);

		assert_ne!(before, compute_fingerprint(&path).unwrap());
	}

	#[test]
	fn edits_past_the_sample_are_missed() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("clip.mp4");
		fs::write(&path, vec![0u8; 64 * 1024]).unwrap();

		let mtime = SystemTime::now() - Duration::from_secs(3600);
		pin_mtime(&path, mtime);
		let before = compute_fingerprint(&path).unwrap();

		let mut file = OpenOptions::new().write(true).open(&path).unwrap();
		file.seek(SeekFrom::Start(SAMPLE_SIZE + 1024)).unwrap();
		file.write_all(b"edited").unwrap();
		drop(file);
		pin_mtime(&path, mtime);

		assert_eq!(before, compute_fingerprint(&path).unwrap());
	}

	#[test]
	fn same_content_at_different_paths_differs() {
		let dir = tempdir().unwrap();
		let a = dir.path().join("a.png");
		let b = dir.path().join("b.png");
		fs::write(&a, b"same").unwrap();
		fs::write(&b, b"same").unwrap();
		let mtime = SystemTime::now() - Duration::from_secs(60);
		pin_mtime(&a, mtime);
		pin_mtime(&b, mtime);

		assert_ne!(
			compute_fingerprint(&a).unwrap(),
			compute_fingerprint(&b).unwrap()
		);
	}

	#[test]
	fn missing_file_is_a_stat_error() {
		let dir = tempdir().unwrap();

		let err = compute_fingerprint(dir.path().join("gone.png")).unwrap_err();
		assert!(err.is_not_found());
	}
}
