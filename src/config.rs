//! Broker configuration loaded from application settings.

// self
use crate::{_prelude::*, auth::DEFAULT_EXPIRY_BUFFER, session::SessionCookie};

/// Settings shared by the refresh coordinator and the dispatcher.
///
/// Durations are stored as whole seconds so the struct deserializes from any serde format the
/// host application already uses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
	/// Login page users are sent to when they must (re-)authenticate.
	pub login_url: Url,
	/// Query parameter carrying the return-to location on the login URL.
	#[serde(default = "BrokerConfig::default_return_to_param")]
	pub return_to_param: String,
	/// Seconds subtracted from the access-token expiry before presenting it.
	#[serde(default = "BrokerConfig::default_expiry_buffer_secs")]
	pub expiry_buffer_secs: u64,
	/// Seconds a completed refresh stays joinable by late callers.
	#[serde(default = "BrokerConfig::default_refresh_grace_secs")]
	pub refresh_grace_secs: u64,
	/// Upper bound, in seconds, for one upstream refresh call.
	#[serde(default = "BrokerConfig::default_refresh_timeout_secs")]
	pub refresh_timeout_secs: u64,
	/// Session cookie attributes.
	#[serde(default)]
	pub cookie: SessionCookie,
}
impl BrokerConfig {
	const DEFAULT_REFRESH_GRACE_SECS: u64 = 5;
	const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 15;

	/// Creates a configuration with default timings for the provided login page.
	pub fn new(login_url: Url) -> Self {
		Self {
			login_url,
			return_to_param: Self::default_return_to_param(),
			expiry_buffer_secs: Self::default_expiry_buffer_secs(),
			refresh_grace_secs: Self::default_refresh_grace_secs(),
			refresh_timeout_secs: Self::default_refresh_timeout_secs(),
			cookie: SessionCookie::default(),
		}
	}

	/// Overrides the return-to query parameter name.
	pub fn with_return_to_param(mut self, param: impl Into<String>) -> Self {
		self.return_to_param = param.into();

		self
	}

	/// Overrides the expiry buffer; negative values clamp to zero.
	pub fn with_expiry_buffer(mut self, buffer: Duration) -> Self {
		self.expiry_buffer_secs = whole_secs(buffer);

		self
	}

	/// Overrides the refresh grace window; negative values clamp to zero.
	pub fn with_refresh_grace(mut self, grace: Duration) -> Self {
		self.refresh_grace_secs = whole_secs(grace);

		self
	}

	/// Overrides the refresh timeout; negative values clamp to zero.
	pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
		self.refresh_timeout_secs = whole_secs(timeout);

		self
	}

	/// Overrides the session cookie attributes.
	pub fn with_cookie(mut self, cookie: SessionCookie) -> Self {
		self.cookie = cookie;

		self
	}

	/// Margin subtracted from the access-token expiry.
	pub fn expiry_buffer(&self) -> Duration {
		secs(self.expiry_buffer_secs)
	}

	/// Window during which a completed refresh is reused.
	pub fn refresh_grace(&self) -> Duration {
		secs(self.refresh_grace_secs)
	}

	/// Upper bound for one upstream refresh call.
	pub fn refresh_timeout(&self) -> Duration {
		secs(self.refresh_timeout_secs)
	}

	fn default_return_to_param() -> String {
		"returnTo".into()
	}

	fn default_expiry_buffer_secs() -> u64 {
		whole_secs(DEFAULT_EXPIRY_BUFFER)
	}

	fn default_refresh_grace_secs() -> u64 {
		Self::DEFAULT_REFRESH_GRACE_SECS
	}

	fn default_refresh_timeout_secs() -> u64 {
		Self::DEFAULT_REFRESH_TIMEOUT_SECS
	}
}

fn whole_secs(duration: Duration) -> u64 {
	u64::try_from(duration.whole_seconds()).unwrap_or(0)
}

fn secs(value: u64) -> Duration {
	Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX))
}
