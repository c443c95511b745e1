use std::{
	fmt,
	path::{self, Path, PathBuf},
	str::FromStr,
};

use thiserror::Error;

/// The only scheme thumbnails are generated for.
pub const FILE_SCHEME: &str = "file";

const SCHEME_SEPARATOR: &str = "://";

/// Identifies a candidate thumbnail source: a scheme plus an absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceReference {
	scheme: String,
	path: PathBuf,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SourceReferenceParseError {
	#[error("source reference has an empty scheme: '{0}'")]
	EmptyScheme(String),
	#[error("source reference has an empty path: '{0}'")]
	EmptyPath(String),
}

impl SourceReference {
	pub fn new(scheme: impl Into<String>, path: impl Into<PathBuf>) -> Self {
		Self {
			scheme: scheme.into(),
			path: path.into(),
		}
	}

	/// A `file` reference, made absolute against the current directory when it's relative.
	pub fn from_path(path: impl AsRef<Path>) -> Self {
		let path = path.as_ref();

		Self::new(
			FILE_SCHEME,
			path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
		)
	}

	/// Parses `scheme://path`; text without a scheme separator is taken as a local path.
	pub fn parse(s: &str) -> Result<Self, SourceReferenceParseError> {
		s.parse()
	}

	pub fn scheme(&self) -> &str {
		&self.scheme
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn is_local_file(&self) -> bool {
		self.scheme.eq_ignore_ascii_case(FILE_SCHEME)
	}
}

impl FromStr for SourceReference {
	type Err = SourceReferenceParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let Some((scheme, path)) = s.split_once(SCHEME_SEPARATOR) else {
			if s.is_empty() {
				return Err(SourceReferenceParseError::EmptyPath(s.to_string()));
			}
			return Ok(Self::from_path(s));
		};

		if scheme.is_empty() {
			return Err(SourceReferenceParseError::EmptyScheme(s.to_string()));
		}

		if path.is_empty() {
			return Err(SourceReferenceParseError::EmptyPath(s.to_string()));
		}

		if scheme.eq_ignore_ascii_case(FILE_SCHEME) {
			Ok(Self::from_path(path))
		} else {
			Ok(Self::new(scheme, path))
		}
	}
}

impl fmt::Display for SourceReference {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}{SCHEME_SEPARATOR}{}", self.scheme, self.path.display())
	}
}

/// How a thumbnail is produced for a source, decided by its file extension alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
	Image,
	Video,
}

impl SourceKind {
	/// `None` for files we don't generate thumbnails for, including ones with no extension.
	pub fn classify(path: impl AsRef<Path>) -> Option<Self> {
		let ext = path.as_ref().extension()?;

		if xfp_images::is_supported_extension(ext) {
			Some(Self::Image)
		} else if xfp_ffmpeg::is_supported_extension(ext) {
			Some(Self::Video)
		} else {
			None
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn classifies_by_extension() {
		assert_eq!(SourceKind::classify("/a/b.jpg"), Some(SourceKind::Image));
		assert_eq!(SourceKind::classify("/a/b.JPEG"), Some(SourceKind::Image));
		assert_eq!(SourceKind::classify("/a/b.png"), Some(SourceKind::Image));
		assert_eq!(SourceKind::classify("/a/b.MKV"), Some(SourceKind::Video));
		assert_eq!(SourceKind::classify("/a/b.webm"), Some(SourceKind::Video));
		assert_eq!(SourceKind::classify("/a/b.mov"), Some(SourceKind::Video));
		assert_eq!(SourceKind::classify("/a/b.gif"), None);
		assert_eq!(SourceKind::classify("/a/Makefile"), None);
	}

	#[test]
	fn relative_paths_are_made_absolute() {
		let source = SourceReference::from_path("photos/cat.png");

		assert!(source.is_local_file());
		assert!(source.path().is_absolute());
		assert!(source.path().ends_with("photos/cat.png"));
	}

	#[test]
	fn parses_schemes() {
		let source = SourceReference::parse("file:///home/me/cat.png").unwrap();
		assert!(source.is_local_file());
		assert_eq!(source.path(), Path::new("/home/me/cat.png"));
		assert_eq!(source.to_string(), "file:///home/me/cat.png");

		let remote = SourceReference::parse("sftp:///srv/cat.png").unwrap();
		assert_eq!(remote.scheme(), "sftp");
		assert!(!remote.is_local_file());

		let bare = SourceReference::parse("/home/me/cat.png").unwrap();
		assert!(bare.is_local_file());

		assert_eq!(
			SourceReference::parse("://nothing"),
			Err(SourceReferenceParseError::EmptyScheme("://nothing".to_string()))
		);
		assert_eq!(
			SourceReference::parse("file://"),
			Err(SourceReferenceParseError::EmptyPath("file://".to_string()))
		);
	}
}
