use crate::DurationParseError;

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

#[allow(clippy::expect_used)]
static DURATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"Duration: (\d{2}):(\d{2}):(\d{2})\.(\d{2})").expect("Must be a valid regex")
});

/// Finds the `Duration: HH:MM:SS.ff` line ffmpeg prints for its input.
pub fn parse_duration(output: &str) -> Result<Duration, DurationParseError> {
	let captures = DURATION_PATTERN
		.captures(output)
		.ok_or(DurationParseError::Missing)?;

	let field = |idx: usize| -> Result<u64, DurationParseError> {
		Ok(captures
			.get(idx)
			.ok_or(DurationParseError::Missing)?
			.as_str()
			.parse::<u64>()?)
	};

	let (hours, minutes, seconds, centis) = (field(1)?, field(2)?, field(3)?, field(4)?);

	Ok(Duration::from_secs(hours * 3600 + minutes * 60 + seconds)
		+ Duration::from_millis(centis * 10))
}

/// Formats `position` as `HH:MM:SS.mmm`, the form ffmpeg accepts for `-ss`.
pub fn format_timestamp(position: Duration) -> String {
	let total_secs = position.as_secs();

	format!(
		"{:02}:{:02}:{:02}.{:03}",
		total_secs / 3600,
		(total_secs / 60) % 60,
		total_secs % 60,
		position.subsec_millis()
	)
}
