//! Login redirects that carry the user's intended destination.

// self
use crate::_prelude::*;

/// Login URL plus the location to come back to after signing in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginRedirect {
	login_url: Url,
	param: String,
	return_to: String,
}
impl LoginRedirect {
	/// Builds a redirect for `login_url`; `return_to` is sanitized with [`sanitize_return_to`].
	pub fn new(login_url: Url, param: impl Into<String>, return_to: &str) -> Self {
		Self { login_url, param: param.into(), return_to: sanitize_return_to(return_to).into() }
	}

	/// Sanitized return-to location.
	pub fn return_to(&self) -> &str {
		&self.return_to
	}

	/// Login URL with the return-to query parameter appended.
	pub fn url(&self) -> Url {
		let mut url = self.login_url.clone();

		url.query_pairs_mut().append_pair(&self.param, &self.return_to);

		url
	}
}

/// Keeps only same-origin relative paths; anything else collapses to `/`.
pub fn sanitize_return_to(location: &str) -> &str {
	let safe = location.starts_with('/')
		&& !location.starts_with("//")
		&& !location.contains('\\')
		&& !location.chars().any(char::is_control);

	if safe { location } else { "/" }
}
