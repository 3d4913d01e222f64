//! Thread-safe in-memory [`SessionStore`] implementation for single-process deployments and tests.

// self
use crate::{
	_prelude::*,
	auth::SessionKey,
	session::{Session, SessionCookie, SessionRecord, SessionStore, StoreError, StoreFuture},
};

type StoreMap = Arc<RwLock<HashMap<SessionKey, StoredSession>>>;

#[derive(Clone, Debug)]
struct StoredSession {
	record: SessionRecord,
	expires_at: Option<OffsetDateTime>,
}
impl StoredSession {
	fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|at| now >= at)
	}
}

/// Storage backend that keeps session records in-process, expiring them with the cookie.
#[derive(Clone, Debug, Default)]
pub struct MemorySessionStore {
	cookie: SessionCookie,
	map: StoreMap,
}
impl MemorySessionStore {
	/// Creates an empty store issuing cookies with the provided attributes.
	pub fn new(cookie: SessionCookie) -> Self {
		Self { cookie, map: Default::default() }
	}

	/// Cookie attributes used for `commit` and `destroy`.
	pub fn cookie(&self) -> &SessionCookie {
		&self.cookie
	}

	/// Number of live records, including ones that expired but were not yet evicted.
	pub fn len(&self) -> usize {
		self.map.read().len()
	}

	/// Returns `true` when no records are stored.
	pub fn is_empty(&self) -> bool {
		self.map.read().is_empty()
	}

	fn get_now(map: &StoreMap, key: &SessionKey) -> Option<SessionRecord> {
		let now = OffsetDateTime::now_utc();

		{
			let guard = map.read();

			match guard.get(key) {
				Some(stored) if !stored.is_expired_at(now) => return Some(stored.record.clone()),
				Some(_) => {},
				None => return None,
			}
		}

		let mut guard = map.write();

		if guard.get(key).is_some_and(|stored| stored.is_expired_at(now)) {
			guard.remove(key);
		}

		None
	}

	/// Evicts every expired record and returns how many were dropped.
	pub fn purge_expired(&self) -> usize {
		Self::purge_at(&mut self.map.write(), OffsetDateTime::now_utc())
	}

	fn purge_at(map: &mut HashMap<SessionKey, StoredSession>, now: OffsetDateTime) -> usize {
		let before = map.len();

		map.retain(|_, stored| !stored.is_expired_at(now));

		before - map.len()
	}

	fn set_now(&self, key: SessionKey, record: SessionRecord) {
		let now = OffsetDateTime::now_utc();
		// An unrepresentable deadline means the record outlives the process.
		let expires_at = self.cookie.max_age().and_then(|age| now.checked_add(age));
		let mut guard = self.map.write();

		Self::purge_at(&mut guard, now);
		guard.insert(key, StoredSession { record, expires_at });
	}
}
impl SessionStore for MemorySessionStore {
	fn get<'a>(&'a self, key: &'a SessionKey) -> StoreFuture<'a, Option<SessionRecord>> {
		Box::pin(async move { Ok(Self::get_now(&self.map, key)) })
	}

	fn set<'a>(&'a self, key: &'a SessionKey, record: SessionRecord) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.set_now(key.clone(), record);

			Ok(())
		})
	}

	fn commit<'a>(&'a self, session: &'a Session) -> StoreFuture<'a, String> {
		Box::pin(async move {
			self.set_now(session.key().clone(), session.record().clone());

			Ok(self.cookie.render(session.key()))
		})
	}

	fn destroy<'a>(&'a self, key: &'a SessionKey) -> StoreFuture<'a, String> {
		Box::pin(async move {
			self.map.write().remove(key);

			Ok::<_, StoreError>(self.cookie.render_expired())
		})
	}
}
