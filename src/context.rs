//! Request-scoped context threaded explicitly through broker calls.

// self
use crate::session::Session;

/// State owned by one inbound request: its session, where it was headed, and the
/// `Set-Cookie` values that must be attached to its response.
#[derive(Debug)]
pub struct RequestContext {
	session: Session,
	location: String,
	set_cookies: Vec<String>,
}
impl RequestContext {
	/// Creates a context for a request to `location` (path plus query).
	pub fn new(session: Session, location: impl Into<String>) -> Self {
		Self { session, location: location.into(), set_cookies: Vec::new() }
	}

	/// Session attached to the request.
	pub fn session(&self) -> &Session {
		&self.session
	}

	/// Mutable access to the session attached to the request.
	pub fn session_mut(&mut self) -> &mut Session {
		&mut self.session
	}

	/// Location the request was made for; used as the return-to target on redirects.
	pub fn location(&self) -> &str {
		&self.location
	}

	/// Queues a `Set-Cookie` value; a later value for the same cookie replaces the earlier one.
	pub fn push_set_cookie(&mut self, value: String) {
		let name = cookie_name(&value).to_owned();

		self.set_cookies.retain(|existing| cookie_name(existing) != name);
		self.set_cookies.push(value);
	}

	/// Pending `Set-Cookie` values.
	pub fn set_cookies(&self) -> &[String] {
		&self.set_cookies
	}

	/// Drains the pending `Set-Cookie` values for attaching to the response.
	pub fn take_set_cookies(&mut self) -> Vec<String> {
		std::mem::take(&mut self.set_cookies)
	}

	/// Splits the context back into its session and pending cookies.
	pub fn into_parts(self) -> (Session, Vec<String>) {
		(self.session, self.set_cookies)
	}
}

fn cookie_name(value: &str) -> &str {
	value.split_once('=').map_or(value, |(name, _)| name)
}
