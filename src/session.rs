//! Session records, the request-scoped session handle, and the persistence contract.

pub mod cookie;
pub mod memory;

pub use self::cookie::{SameSite, SessionCookie};
pub use memory::MemorySessionStore;

// self
use crate::{
	_prelude::*,
	auth::{SessionId, SessionKey, TokenPair},
};

/// Boxed future returned by [`SessionStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistence backend for session records.
///
/// `commit` persists the handle's record and yields the `Set-Cookie` value that keeps the
/// client in sync; `destroy` removes the record and yields an expiring cookie.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Loads the record stored under `key`, if present and not expired.
	fn get<'a>(&'a self, key: &'a SessionKey) -> StoreFuture<'a, Option<SessionRecord>>;

	/// Persists or replaces the record stored under `key`.
	fn set<'a>(&'a self, key: &'a SessionKey, record: SessionRecord) -> StoreFuture<'a, ()>;

	/// Persists the session and returns the `Set-Cookie` header value for the response.
	fn commit<'a>(&'a self, session: &'a Session) -> StoreFuture<'a, String>;

	/// Removes the record stored under `key` and returns an expiring `Set-Cookie` value.
	fn destroy<'a>(&'a self, key: &'a SessionKey) -> StoreFuture<'a, String>;
}

/// Error type produced by [`SessionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Active organization/site the user is working in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
	/// Selected client (organization) identifier.
	pub client_id: Option<String>,
	/// Selected site identifier within the client.
	pub site_id: Option<String>,
}

/// Server-side state kept for one browser session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
	/// Current credentials, absent until the user signs in.
	pub tokens: Option<TokenPair>,
	/// Refresh-coordination scope, generated once and kept for the session's lifetime.
	pub session_id: Option<SessionId>,
	/// Location to return to after signing in.
	pub return_to: Option<String>,
	/// Active organization/site selection.
	#[serde(default)]
	pub selection: Selection,
}

/// Request-scoped handle over a stored session.
///
/// The request currently processing the session owns the handle; changes become visible to
/// other requests once the handle is committed through a [`SessionStore`].
#[derive(Clone, Debug)]
pub struct Session {
	key: SessionKey,
	record: SessionRecord,
	is_new: bool,
}
impl Session {
	/// Starts a brand-new session under a freshly generated key.
	pub fn new() -> Self {
		Self { key: SessionKey::generate(), record: SessionRecord::default(), is_new: true }
	}

	/// Wraps a record loaded from storage.
	pub fn from_record(key: SessionKey, record: SessionRecord) -> Self {
		Self { key, record, is_new: false }
	}

	/// Cookie-presented key of this session.
	pub fn key(&self) -> &SessionKey {
		&self.key
	}

	/// Stored state of this session.
	pub fn record(&self) -> &SessionRecord {
		&self.record
	}

	/// Returns `true` when the session was created during this request.
	pub fn is_new(&self) -> bool {
		self.is_new
	}

	/// Current credentials, if the user is signed in.
	pub fn tokens(&self) -> Option<&TokenPair> {
		self.record.tokens.as_ref()
	}

	/// Replaces the credentials wholesale.
	pub fn set_tokens(&mut self, tokens: TokenPair) {
		self.record.tokens = Some(tokens);
	}

	/// Drops the credentials while keeping ancillary state.
	pub fn clear_tokens(&mut self) {
		self.record.tokens = None;
	}

	/// Refresh-coordination identifier, if one was generated.
	pub fn session_id(&self) -> Option<&SessionId> {
		self.record.session_id.as_ref()
	}

	/// Returns the refresh-coordination identifier, generating it on first use.
	pub fn ensure_session_id(&mut self) -> SessionId {
		self.record.session_id.get_or_insert_with(SessionId::generate).clone()
	}

	/// Location to return to after signing in.
	pub fn return_to(&self) -> Option<&str> {
		self.record.return_to.as_deref()
	}

	/// Remembers where to send the user after signing in.
	pub fn set_return_to(&mut self, location: impl Into<String>) {
		self.record.return_to = Some(location.into());
	}

	/// Consumes the remembered return-to location.
	pub fn take_return_to(&mut self) -> Option<String> {
		self.record.return_to.take()
	}

	/// Active organization/site selection.
	pub fn selection(&self) -> &Selection {
		&self.record.selection
	}

	/// Replaces the active organization/site selection.
	pub fn set_selection(&mut self, selection: Selection) {
		self.record.selection = selection;
	}
}
impl Default for Session {
	fn default() -> Self {
		Self::new()
	}
}
