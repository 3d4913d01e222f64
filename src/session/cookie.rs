//! Session cookie attributes, `Set-Cookie` rendering, and `Cookie` header parsing.

// crates.io
use cookie::{Cookie, CookieBuilder};
// self
use crate::{_prelude::*, auth::SessionKey};

/// `SameSite` attribute values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameSite {
	#[default]
	/// Sent on top-level navigations and same-site requests.
	Lax,
	/// Sent on same-site requests only.
	Strict,
	/// Sent on all requests; browsers require `Secure` alongside it.
	None,
}
impl From<SameSite> for cookie::SameSite {
	fn from(value: SameSite) -> Self {
		match value {
			SameSite::Lax => Self::Lax,
			SameSite::Strict => Self::Strict,
			SameSite::None => Self::None,
		}
	}
}

/// Attributes of the cookie that carries the [`SessionKey`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionCookie {
	/// Cookie name.
	pub name: String,
	/// `Path` attribute.
	pub path: String,
	/// Optional `Domain` attribute.
	pub domain: Option<String>,
	/// `Max-Age` in seconds; `None` produces a browser-session cookie.
	pub max_age_secs: Option<u64>,
	/// Adds the `Secure` attribute.
	pub secure: bool,
	/// Adds the `HttpOnly` attribute.
	pub http_only: bool,
	/// `SameSite` attribute.
	pub same_site: SameSite,
}
impl SessionCookie {
	const DEFAULT_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 7;

	/// Lifetime of the cookie and of the stored record.
	pub fn max_age(&self) -> Option<Duration> {
		self.max_age_secs.map(|secs| Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)))
	}

	/// Renders the `Set-Cookie` value that stores `key` in the browser.
	pub fn render(&self, key: &SessionKey) -> String {
		let mut builder = self.builder(key.to_string());

		if let Some(max_age) = self.max_age() {
			builder = builder.max_age(max_age);
		}

		builder.build().to_string()
	}

	/// Renders a `Set-Cookie` value that removes the cookie from the browser.
	pub fn render_expired(&self) -> String {
		self.builder(String::new()).max_age(Duration::ZERO).build().to_string()
	}

	/// Finds this cookie in a `Cookie` request header.
	///
	/// Values that are not valid session keys are ignored rather than reported.
	pub fn extract(&self, header: &str) -> Option<SessionKey> {
		Cookie::split_parse(header)
			.filter_map(Result::ok)
			.find(|cookie| cookie.name() == self.name)
			.and_then(|cookie| SessionKey::new(cookie.value().trim_matches('"')).ok())
	}

	fn builder(&self, value: String) -> CookieBuilder<'static> {
		let mut builder = Cookie::build((self.name.clone(), value))
			.path(self.path.clone())
			.secure(self.secure)
			.http_only(self.http_only)
			.same_site(self.same_site.into());

		if let Some(domain) = &self.domain {
			builder = builder.domain(domain.clone());
		}

		builder
	}
}
impl Default for SessionCookie {
	fn default() -> Self {
		Self {
			name: "__session".into(),
			path: "/".into(),
			domain: None,
			max_age_secs: Some(Self::DEFAULT_MAX_AGE_SECS),
			secure: true,
			http_only: true,
			same_site: SameSite::Lax,
		}
	}
}
