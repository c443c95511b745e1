use std::{io, num::ParseIntError, path::Path, process::ExitStatus, time::Duration};

use thiserror::Error;

/// Error type for the library.
#[derive(Error, Debug)]
pub enum Error {
	#[error("failed to run external tool <path='{}'>: {source}", .tool.display())]
	Spawn {
		tool: Box<Path>,
		#[source]
		source: io::Error,
	},
	#[error("I/O Error: {0}")]
	Io(#[from] io::Error),
	#[error("external tool exited with {status}; stderr: {stderr}")]
	ExitStatus { status: ExitStatus, stderr: String },
	#[error("external tool wrote no frame to its standard output")]
	EmptyOutput,
	#[error("failed to decode the extracted frame: {0}")]
	Decode(#[from] image::ImageError),
	#[error("external tool didn't finish within {0:?} and was killed")]
	TimedOut(Duration),
	#[error(transparent)]
	DurationParse(#[from] DurationParseError),
}

/// The duration couldn't be read from the probe output.
///
/// Never fatal for an extraction, which falls back to a fixed seek position instead.
#[derive(Error, Debug)]
pub enum DurationParseError {
	#[error("no duration found in the probe output")]
	Missing,
	#[error("invalid duration field: {0}")]
	InvalidField(#[from] ParseIntError),
}
