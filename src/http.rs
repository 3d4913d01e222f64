//! Transport primitives for authenticated API calls.
//!
//! [`ApiHttpClient`] is the broker's only dependency on an HTTP stack. Its futures are
//! `'static + Send` because the dispatcher spawns every request of a batch onto the runtime
//! so they proceed concurrently while only the first response is inspected.

pub use oauth2::{
	HttpRequest, HttpResponse,
	http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
};

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::http::header::{AUTHORIZATION, CONTENT_TYPE};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, UpstreamError},
};

/// Boxed future returned by [`ApiHttpClient::execute`].
pub type ApiFuture =
	Pin<Box<dyn Future<Output = Result<HttpResponse, UpstreamError>> + 'static + Send>>;

/// Executes prepared HTTP requests against the upstream API.
///
/// Implementations must own whatever state the returned future needs; the future outlives the
/// call and may run on another worker thread.
pub trait ApiHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves with the full response, whatever its status.
	fn execute(&self, request: HttpRequest) -> ApiFuture;
}

/// Description of one outbound API call, minus its credentials.
///
/// The same spec can be turned into a request any number of times, which is how a batch is
/// reissued with a refreshed token.
#[derive(Clone, Debug)]
pub struct RequestSpec {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Extra request headers; any `Authorization` header is overwritten.
	pub headers: HeaderMap,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
}
impl RequestSpec {
	/// Creates a spec for `method` + `url` with no headers or body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: None }
	}

	/// Shorthand for a `GET` request.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Shorthand for a `POST` request.
	pub fn post(url: Url) -> Self {
		Self::new(Method::POST, url)
	}

	/// Shorthand for a `PATCH` request.
	pub fn patch(url: Url) -> Self {
		Self::new(Method::PATCH, url)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(url: Url) -> Self {
		Self::new(Method::DELETE, url)
	}

	/// Adds or replaces a header.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets a raw body.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `value` as the JSON body and sets `Content-Type`.
	pub fn json<T>(self, value: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		let body = serde_json::to_vec(value)?;

		Ok(self.header(CONTENT_TYPE, HeaderValue::from_static("application/json")).body(body))
	}

	/// Builds the concrete request without credentials.
	pub fn build(&self) -> Result<HttpRequest, ConfigError> {
		let mut request = oauth2::http::Request::builder()
			.method(self.method.clone())
			.uri(self.url.as_str())
			.body(self.body.clone().unwrap_or_default())?;

		*request.headers_mut() = self.headers.clone();

		Ok(request)
	}

	/// Builds the concrete request carrying `Authorization: Bearer <access_token>`.
	pub fn authorize(&self, access_token: &TokenSecret) -> Result<HttpRequest, ConfigError> {
		let mut bearer = HeaderValue::from_str(&access_token.bearer())?;
		let mut request = self.build()?;

		bearer.set_sensitive(true);
		request.headers_mut().insert(AUTHORIZATION, bearer);

		Ok(request)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiHttpClient for ReqwestHttpClient {
	fn execute(&self, request: HttpRequest) -> ApiFuture {
		let client = self.0.clone();

		Box::pin(async move {
			let response = client.execute(request.try_into()?).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new = HttpResponse::new(response.bytes().await?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}
