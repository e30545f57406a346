//! In-memory conversation registry.
//!
//! Each entry owns its state behind a tokio mutex, so exactly one turn per
//! conversation is in flight while unrelated conversations stay parallel.
//! Entries idle past the configured TTL are evicted; an entry whose lock is
//! held is skipped and picked up on the next sweep.

use std::{collections::HashMap, sync::Arc, time::Duration};

use plateful_domain::conversation::ConversationState;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct ConversationRegistry {
	entries: std::sync::Mutex<HashMap<Uuid, Arc<ConversationEntry>>>,
}

pub struct ConversationEntry {
	pub state: Mutex<ConversationState>,
}

impl ConversationRegistry {
	/// Look up an existing conversation or create a fresh one. Returns the
	/// effective id alongside the entry.
	pub fn resolve(&self, id: Option<Uuid>) -> (Uuid, Arc<ConversationEntry>) {
		let id = id.unwrap_or_else(Uuid::new_v4);
		let mut entries = self.entries.lock().expect("registry lock poisoned");
		let entry = entries
			.entry(id)
			.or_insert_with(|| {
				Arc::new(ConversationEntry { state: Mutex::new(ConversationState::new(id)) })
			})
			.clone();

		(id, entry)
	}

	pub fn len(&self) -> usize {
		self.entries.lock().expect("registry lock poisoned").len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Drop conversations idle longer than `ttl`. Returns how many were
	/// evicted.
	pub fn evict_idle(&self, ttl: Duration) -> usize {
		let now = time::OffsetDateTime::now_utc();
		let ttl = time::Duration::try_from(ttl).unwrap_or(time::Duration::MAX);
		let mut entries = self.entries.lock().expect("registry lock poisoned");
		let before = entries.len();

		entries.retain(|_, entry| match entry.state.try_lock() {
			Ok(state) => now - state.last_active < ttl,
			// A held lock means a turn is running right now.
			Err(_) => true,
		});

		before - entries.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use plateful_domain::conversation::Role;

	#[test]
	fn resolve_creates_then_reuses() {
		let registry = ConversationRegistry::default();
		let (id, first) = registry.resolve(None);
		let (same_id, second) = registry.resolve(Some(id));

		assert_eq!(id, same_id);
		assert!(Arc::ptr_eq(&first, &second));
		assert_eq!(registry.len(), 1);
	}

	#[tokio::test]
	async fn evicts_only_idle_entries() {
		let registry = ConversationRegistry::default();
		let (_, stale) = registry.resolve(None);
		let (_, fresh) = registry.resolve(None);

		{
			let mut state = stale.state.lock().await;

			state.last_active = time::OffsetDateTime::now_utc() - time::Duration::hours(2);
		}
		{
			let mut state = fresh.state.lock().await;

			state.push_turn(Role::User, "still here");
		}

		let evicted = registry.evict_idle(Duration::from_secs(1800));

		assert_eq!(evicted, 1);
		assert_eq!(registry.len(), 1);
	}

	#[tokio::test]
	async fn locked_entries_survive_eviction() {
		let registry = ConversationRegistry::default();
		let (_, entry) = registry.resolve(None);
		let mut state = entry.state.lock().await;

		state.last_active = time::OffsetDateTime::now_utc() - time::Duration::hours(2);

		assert_eq!(registry.evict_idle(Duration::from_secs(1)), 0);
		assert_eq!(registry.len(), 1);
	}
}
