use std::{
	collections::{hash_map::Entry, HashMap},
	path::{Path, PathBuf},
};

use parking_lot::Mutex;
use tracing::trace;

/// Sources currently being generated, each with the callbacks waiting on it.
///
/// The first request for a source becomes its leader and does the work; requests arriving
/// meanwhile only leave their callback behind, to be fanned out when the leader finishes.
#[derive(Debug)]
pub struct InFlight<C> {
	waiting: Mutex<HashMap<PathBuf, Vec<C>>>,
}

impl<C> Default for InFlight<C> {
	fn default() -> Self {
		Self {
			waiting: Mutex::new(HashMap::new()),
		}
	}
}

#[must_use]
pub enum Joined<'a, C> {
	Leader(Leadership<'a, C>),
	Waiter,
}

/// Proof of being the one generating a source's thumbnail.
///
/// Dropping it without [`Leadership::finish`] discards every waiting callback, which is how a
/// failed generation reaches its waiters.
#[must_use]
pub struct Leadership<'a, C> {
	registry: &'a InFlight<C>,
	path: PathBuf,
	finished: bool,
}

impl<C> InFlight<C> {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn join(&self, path: impl AsRef<Path>, callback: C) -> Joined<'_, C> {
		let path = path.as_ref();

		match self.waiting.lock().entry(path.to_path_buf()) {
			Entry::Occupied(mut entry) => {
				entry.get_mut().push(callback);
				trace!(
					path = %path.display(),
					waiters = entry.get().len(),
					"Joined in-flight generation"
				);
				Joined::Waiter
			}
			Entry::Vacant(entry) => {
				entry.insert(vec![callback]);
				Joined::Leader(Leadership {
					registry: self,
					path: path.to_path_buf(),
					finished: false,
				})
			}
		}
	}

	pub fn is_in_flight(&self, path: impl AsRef<Path>) -> bool {
		self.waiting.lock().contains_key(path.as_ref())
	}

	pub fn len(&self) -> usize {
		self.waiting.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.waiting.lock().is_empty()
	}

	fn take(&self, path: &Path) -> Vec<C> {
		self.waiting.lock().remove(path).unwrap_or_default()
	}
}

impl<C> Leadership<'_, C> {
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Every callback registered for this source, the leader's own included, in arrival order.
	pub fn finish(mut self) -> Vec<C> {
		self.finished = true;
		self.registry.take(&self.path)
	}
}

impl<C> Drop for Leadership<'_, C> {
	fn drop(&mut self) {
		if !self.finished {
			let dropped = self.registry.take(&self.path);
			trace!(
				path = %self.path.display(),
				callbacks = dropped.len(),
				"Discarding callbacks of a failed generation"
			);
		}
	}
}
