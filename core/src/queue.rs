use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Bounded last-in-first-out queue shared by the workers.
///
/// Pushing never blocks: once full, the oldest entry is dropped to make room, so the queue
/// always favors whatever was asked for most recently.
#[derive(Debug)]
pub struct RequestQueue<T> {
	items: Mutex<VecDeque<T>>,
	capacity: usize,
	notify: Notify,
}

impl<T> RequestQueue<T> {
	pub fn new(capacity: usize) -> Self {
		let capacity = capacity.max(1);

		Self {
			items: Mutex::new(VecDeque::with_capacity(capacity)),
			capacity,
			notify: Notify::new(),
		}
	}

	/// Appends `item`, handing back the entry evicted to make room for it, if any.
	pub fn push(&self, item: T) -> Option<T> {
		let dropped = {
			let mut items = self.items.lock();
			let dropped = if items.len() >= self.capacity {
				items.pop_front()
			} else {
				None
			};
			items.push_back(item);
			dropped
		};

		self.notify.notify_one();

		dropped
	}

	/// Most recently pushed entry, if any.
	pub fn try_pop(&self) -> Option<T> {
		self.items.lock().pop_back()
	}

	/// Waits for an entry, then takes the most recently pushed one.
	pub async fn pop(&self) -> T {
		loop {
			if let Some(item) = self.try_pop() {
				return item;
			}

			// A push between the check above and this wait leaves a permit behind, so it's
			// never missed
			self.notify.notified().await;
		}
	}

	pub fn len(&self) -> usize {
		self.items.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.lock().is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}
}
