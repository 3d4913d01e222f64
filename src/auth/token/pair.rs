//! Access/refresh token pair issued by the identity provider.

// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, token::claims},
};

/// Immutable pair of credentials; replaced wholesale on every refresh.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
	/// Short-lived bearer credential presented to the upstream API.
	pub access_token: TokenSecret,
	/// Longer-lived credential used only to obtain a new pair.
	pub refresh_token: TokenSecret,
}
impl TokenPair {
	/// Creates a pair from raw token strings.
	pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: TokenSecret::new(refresh_token),
		}
	}

	/// Returns `true` if the access token is unusable at `now` given `buffer`.
	pub fn access_expired_at(&self, buffer: Duration, now: OffsetDateTime) -> bool {
		claims::is_expired_at(&self.access_token, buffer, now)
	}

	/// Returns `true` if the access token is unusable right now given `buffer`.
	pub fn access_expired(&self, buffer: Duration) -> bool {
		claims::is_expired(&self.access_token, buffer)
	}
}
impl Debug for TokenPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenPair")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.finish()
	}
}
