use crate::error::PreferencesError;

use xfp_utils::error::FileIOError;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::{fs, io};
use tracing::trace;

/// User choices that outlive the process, stored as JSON.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preferences {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	external_tool_path: Option<PathBuf>,
}

impl Preferences {
	/// Reads the preferences file, treating a missing file as empty preferences.
	pub async fn load(path: impl AsRef<Path>) -> Result<Self, PreferencesError> {
		let path = path.as_ref();

		match fs::read(path).await {
			Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				trace!(path = %path.display(), "No preferences file found");
				Ok(Self::default())
			}
			Err(e) => Err(FileIOError::from((path, e, "reading preferences")).into()),
		}
	}

	pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), PreferencesError> {
		let path = path.as_ref();

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| FileIOError::from((parent, e, "creating preferences directory")))?;
		}

		fs::write(path, serde_json::to_vec_pretty(self)?)
			.await
			.map_err(|e| FileIOError::from((path, e, "writing preferences")).into())
	}

	pub fn external_tool_path(&self) -> Option<&Path> {
		self.external_tool_path.as_deref()
	}

	pub fn set_external_tool_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
		self.external_tool_path = Some(path.into());

		self
	}
}
