use crate::{format_timestamp, parse_duration, Error};

use std::{
	ffi::OsStr,
	path::{Path, PathBuf},
	process::{Output, Stdio},
	time::Duration,
};

use image::DynamicImage;
use tokio::{process::Command, time::timeout};
use tracing::{debug, trace};

/// Longest stderr excerpt kept in [`Error::ExitStatus`].
const STDERR_EXCERPT_LEN: usize = 512;

/// `FrameExtractor` struct holds data from a `FrameExtractorBuilder`, exposing methods
/// to grab a representative frame from video files.
#[derive(Debug, Clone)]
pub struct FrameExtractor {
	builder: FrameExtractorBuilder,
}

impl FrameExtractor {
	/// Decodes the frame in the middle of the video, or at the fallback position when its
	/// duration can't be probed.
	pub async fn extract(&self, video_file_path: impl AsRef<Path>) -> Result<DynamicImage, Error> {
		let video_file_path = video_file_path.as_ref();

		let seek = match self.probe_duration(video_file_path).await {
			Ok(duration) => duration / 2,
			Err(Error::DurationParse(e)) => {
				debug!(
					path = %video_file_path.display(),
					"Couldn't read video duration, seeking to the fallback position; {e}"
				);
				self.builder.fallback_seek
			}
			Err(e) => return Err(e),
		};

		self.grab_frame(video_file_path, seek).await
	}

	/// Runs the tool in information-only mode and reads the duration from its diagnostics.
	///
	/// The tool exits with an error status in this mode, as no output is requested, so the
	/// status is ignored. Failing to start it at all is an error.
	pub async fn probe_duration(
		&self,
		video_file_path: impl AsRef<Path>,
	) -> Result<Duration, Error> {
		let mut command = self.command();
		command
			.arg("-hide_banner")
			.arg("-i")
			.arg(video_file_path.as_ref());

		let output = self.run(command).await?;

		Ok(parse_duration(&String::from_utf8_lossy(&output.stderr))?)
	}

	/// Decodes a single frame at `seek`.
	///
	/// `-ss` goes before `-i`, so the tool seeks on the input side: fast, but only as precise
	/// as the nearest keyframe.
	pub async fn grab_frame(
		&self,
		video_file_path: impl AsRef<Path>,
		seek: Duration,
	) -> Result<DynamicImage, Error> {
		let mut command = self.command();
		command
			.args(["-hide_banner", "-loglevel", "error", "-ss"])
			.arg(format_timestamp(seek))
			.arg("-i")
			.arg(video_file_path.as_ref())
			.args(["-frames:v", "1", "-an", "-f", "image2pipe", "-c:v", "png", "-"]);

		let Output {
			status,
			stdout,
			stderr,
		} = self.run(command).await?;

		if !status.success() {
			let mut stderr = String::from_utf8_lossy(&stderr).trim().to_string();
			if stderr.len() > STDERR_EXCERPT_LEN {
				let mut end = STDERR_EXCERPT_LEN;
				while !stderr.is_char_boundary(end) {
					end -= 1;
				}
				stderr.truncate(end);
			}

			return Err(Error::ExitStatus { status, stderr });
		}

		if stdout.is_empty() {
			return Err(Error::EmptyOutput);
		}

		trace!(
			path = %video_file_path.as_ref().display(),
			frame_bytes = stdout.len(),
			"Grabbed video frame"
		);

		Ok(image::load_from_memory(&stdout)?)
	}

	pub fn tool_path(&self) -> &Path {
		&self.builder.tool_path
	}

	fn command(&self) -> Command {
		let mut command = Command::new(&self.builder.tool_path);
		command
			.arg("-nostdin")
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);

		command
	}

	async fn run(&self, mut command: Command) -> Result<Output, Error> {
		let child = command.spawn().map_err(|source| Error::Spawn {
			tool: self.builder.tool_path.as_path().into(),
			source,
		})?;

		// Dropping the `wait_with_output` future on timeout drops the child, which kills it
		timeout(self.builder.timeout, child.wait_with_output())
			.await
			.map_err(|_| Error::TimedOut(self.builder.timeout))?
			.map_err(Into::into)
	}
}

/// `FrameExtractorBuilder` struct holds data to build a `FrameExtractor` struct, exposing
/// methods to configure how the external tool is invoked.
#[derive(Debug, Clone)]
pub struct FrameExtractorBuilder {
	tool_path: PathBuf,
	timeout: Duration,
	fallback_seek: Duration,
}

impl Default for FrameExtractorBuilder {
	fn default() -> Self {
		Self {
			tool_path: PathBuf::from("ffmpeg"),
			timeout: Duration::from_secs(30),
			fallback_seek: Duration::from_secs(1),
		}
	}
}

impl FrameExtractorBuilder {
	/// Creates a new `FrameExtractorBuilder` with default values:
	/// - `tool_path`: `ffmpeg`, resolved through the search path
	/// - `timeout`: 30 seconds per invocation
	/// - `fallback_seek`: 1 second
	pub fn new() -> Self {
		Self::default()
	}

	/// Executable to run, either a bare name or a path
	pub fn tool_path(mut self, tool_path: impl AsRef<OsStr>) -> Self {
		self.tool_path = PathBuf::from(tool_path.as_ref());
		self
	}

	/// Upper bound for each of the two invocations
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	/// Where to grab the frame when the duration can't be probed
	pub fn fallback_seek(mut self, fallback_seek: Duration) -> Self {
		self.fallback_seek = fallback_seek;
		self
	}

	/// Builds a `FrameExtractor` struct
	pub fn build(self) -> FrameExtractor {
		FrameExtractor { builder: self }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use tempfile::tempdir;

	#[tokio::test]
	async fn missing_tool_fails_to_spawn() {
		let extractor = FrameExtractorBuilder::new()
			.tool_path("/definitely/not/a/real/ffmpeg")
			.build();

		assert!(matches!(
			extractor.extract("clip.mp4").await,
			Err(Error::Spawn { .. })
		));
	}

	#[cfg(unix)]
	mod scripted {
		use super::*;

		use std::{fs, os::unix::fs::PermissionsExt};

		use image::{ImageFormat, Rgb, RgbImage};

		fn write_tool(dir: &Path, body: &str) -> PathBuf {
			let path = dir.join("fake-ffmpeg");
			fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
			fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
			path
		}

		#[tokio::test]
		async fn probe_reads_duration_despite_failure_status() {
			let dir = tempdir().unwrap();
			let tool = write_tool(
				dir.path(),
				"echo '  Duration: 00:01:30.50, start: 0.000000, bitrate: 1 kb/s' >&2\nexit 1",
			);

			let extractor = FrameExtractorBuilder::new().tool_path(&tool).build();

			assert_eq!(
				extractor.probe_duration("clip.mp4").await.unwrap(),
				Duration::from_millis(90_500)
			);
		}

		#[tokio::test]
		async fn seeks_to_the_middle_on_the_input_side() {
			let dir = tempdir().unwrap();
			let frame = dir.path().join("frame.png");
			RgbImage::from_pixel(32, 18, Rgb([255, 0, 0]))
				.save_with_format(&frame, ImageFormat::Png)
				.unwrap();
			let args = dir.path().join("args.txt");

			let tool = write_tool(
				dir.path(),
				&format!(
					"case \" $* \" in\n\
					*\" -ss \"*) echo \"$@\" > '{}'; cat '{}' ;;\n\
					*) echo '  Duration: 00:00:10.00, start: 0.000000' >&2; exit 1 ;;\n\
					esac",
					args.display(),
					frame.display()
				),
			);

			let extractor = FrameExtractorBuilder::new().tool_path(&tool).build();
			let image = extractor.extract("clip.mp4").await.unwrap();
			assert_eq!((image.width(), image.height()), (32, 18));

			let recorded = fs::read_to_string(&args).unwrap();
			let ss = recorded.find("-ss 00:00:05.000").unwrap();
			let input = recorded.find("-i clip.mp4").unwrap();
			assert!(ss < input, "seek must precede the input: {recorded}");
		}

		#[tokio::test]
		async fn falls_back_to_one_second_and_reports_failed_grab() {
			let dir = tempdir().unwrap();
			let args = dir.path().join("args.txt");
			let tool = write_tool(
				dir.path(),
				&format!(
					"echo \"$@\" >> '{}'\necho 'clip.mp4: Invalid data found' >&2\nexit 1",
					args.display()
				),
			);

			let extractor = FrameExtractorBuilder::new().tool_path(&tool).build();

			match extractor.extract("clip.mp4").await {
				Err(Error::ExitStatus { status, stderr }) => {
					assert!(!status.success());
					assert!(stderr.contains("Invalid data found"));
				}
				other => panic!("unexpected result: {other:?}"),
			}

			let recorded = fs::read_to_string(&args).unwrap();
			assert!(recorded.contains("-ss 00:00:01.000"), "{recorded}");
		}

		#[tokio::test]
		async fn empty_output_is_an_error() {
			let dir = tempdir().unwrap();
			let tool = write_tool(dir.path(), "exit 0");

			let extractor = FrameExtractorBuilder::new().tool_path(&tool).build();

			assert!(matches!(
				extractor.grab_frame("clip.mp4", Duration::from_secs(1)).await,
				Err(Error::EmptyOutput)
			));
		}

		#[tokio::test]
		async fn undecodable_output_is_an_error() {
			let dir = tempdir().unwrap();
			let tool = write_tool(dir.path(), "echo 'this is not a png'");

			let extractor = FrameExtractorBuilder::new().tool_path(&tool).build();

			assert!(matches!(
				extractor.grab_frame("clip.mp4", Duration::from_secs(1)).await,
				Err(Error::Decode(_))
			));
		}

		#[tokio::test]
		async fn hung_tool_is_killed_on_timeout() {
			let dir = tempdir().unwrap();
			let tool = write_tool(dir.path(), "exec sleep 30");

			let extractor = FrameExtractorBuilder::new()
				.tool_path(&tool)
				.timeout(Duration::from_millis(200))
				.build();

			let started = std::time::Instant::now();
			assert!(matches!(
				extractor.extract("clip.mp4").await,
				Err(Error::TimedOut(_))
			));
			assert!(started.elapsed() < Duration::from_secs(10));
		}
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn real_ffmpeg_grabs_a_frame() {
		if std::process::Command::new("ffmpeg")
			.arg("-version")
			.output()
			.is_err()
		{
			eprintln!("ffmpeg not found, skipping");
			return;
		}

		let dir = tempdir().unwrap();
		let video = dir.path().join("red_16_9.mp4");
		let created = std::process::Command::new("ffmpeg")
			.args(["-f", "lavfi", "-i", "color=c=red:s=320x180:d=1"])
			.args(["-c:v", "libx264", "-pix_fmt", "yuv420p", "-y"])
			.arg(&video)
			.output();
		if !matches!(&created, Ok(output) if output.status.success()) {
			eprintln!("failed to create test video, skipping");
			return;
		}

		let frame = FrameExtractorBuilder::new()
			.build()
			.extract(&video)
			.await
			.unwrap();

		assert_eq!((frame.width(), frame.height()), (320, 180));
	}
}
