//! Broker-level error types shared across sessions, providers, and flows.

// self
use crate::_prelude::*;

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Shareable error source; cloned into every caller that observes the same failure.
pub type SharedSource = Arc<dyn StdError + Send + Sync>;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Canonical broker error exposed by public APIs.
///
/// Authentication failures carry the login URL (return-to already attached) so request
/// handlers can turn them into redirects without additional context.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Session storage failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::session::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Dispatched request failed for a reason other than authorization.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),

	/// No session or tokens are present; the caller must sign in.
	#[error("No authenticated session is present; sign in at {login}.")]
	Unauthenticated {
		/// Login URL carrying the return-to location.
		login: Url,
	},
	/// A refresh was attempted and failed; the caller must sign in again.
	#[error("Session refresh failed; re-authentication is required at {login}.")]
	ReauthRequired {
		/// Login URL carrying the return-to location.
		login: Url,
		/// Refresh failure shared by every caller of the same refresh cycle.
		#[source]
		source: RefreshError,
	},
}
impl Error {
	/// Returns the login URL when the error demands a redirect.
	pub fn login_redirect(&self) -> Option<&Url> {
		match self {
			Self::Unauthenticated { login } | Self::ReauthRequired { login, .. } => Some(login),
			_ => None,
		}
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Access token cannot be carried in an `Authorization` header.
	#[error("Access token contains characters that are not valid in a header.")]
	InvalidBearer(#[from] oauth2::http::header::InvalidHeaderValue),
	/// Provider descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures of a single refresh cycle.
///
/// Values are cloned into every caller joined to the same pending refresh, so the variants
/// keep only cheap, shareable payloads.
#[derive(Clone, Debug, ThisError)]
pub enum RefreshError {
	/// Identity provider rejected the refresh token (expired, revoked, or reused).
	#[error("Identity provider rejected the refresh token: {reason}.")]
	Rejected {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// Client authentication against the identity provider failed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// Identity provider reported a temporary failure.
	#[error("Identity provider returned a temporary failure: {message}.")]
	Transient {
		/// Provider- or broker-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Network failure while calling the identity provider.
	#[error("Network error occurred while calling the identity provider.")]
	Transport {
		/// Transport-specific failure.
		#[source]
		source: SharedSource,
	},
	/// Refresh request could not be assembled locally.
	#[error("Refresh request could not be built.")]
	Request {
		/// Local construction failure.
		#[source]
		source: SharedSource,
	},
	/// Identity provider answered with a payload that cannot be used.
	#[error("Identity provider returned an unusable response: {reason}.")]
	Malformed {
		/// Description of what was missing or invalid.
		reason: String,
	},
	/// Identity provider did not answer in time.
	#[error("Identity provider did not respond within {after}.")]
	TimedOut {
		/// Configured upper bound for the refresh call.
		after: Duration,
	},
	/// Refresh task stopped before producing a result.
	#[error("Refresh task stopped before completing: {message}.")]
	Aborted {
		/// Runtime-supplied description.
		message: String,
	},
}
impl RefreshError {
	/// Wraps a transport-specific network error.
	pub fn transport(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Transport { source: Arc::new(src) }
	}

	/// Wraps a local request construction failure.
	pub fn request(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Request { source: Arc::new(src) }
	}
}

/// Non-authorization failures of a dispatched API request.
#[derive(Clone, Debug, ThisError)]
pub enum UpstreamError {
	/// Underlying HTTP client reported a failure.
	#[error("Network error occurred while calling the upstream API.")]
	Transport {
		/// Transport-specific failure.
		#[source]
		source: SharedSource,
	},
	/// Request task stopped before producing a response.
	#[error("Upstream request stopped before completing: {message}.")]
	Aborted {
		/// Runtime-supplied description.
		message: String,
	},
}
impl UpstreamError {
	/// Wraps a transport-specific network error.
	pub fn transport(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Transport { source: Arc::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for UpstreamError {
	fn from(e: ReqwestError) -> Self {
		Self::transport(e)
	}
}
