//! Test doubles shared by the integration suites.

#![allow(dead_code)]

// std
use std::{
	io::{Error as IoError, ErrorKind},
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};
use url::Url;
// self
use session_broker::{
	auth::{TokenPair, TokenSecret},
	config::BrokerConfig,
	context::RequestContext,
	error::{RefreshError, UpstreamError},
	flows::SessionBroker,
	http::{ApiFuture, ApiHttpClient, HttpRequest, HttpResponse, StatusCode},
	oauth2::http::header::AUTHORIZATION,
	provider::{IdentityProvider, ProviderFuture},
	session::MemorySessionStore,
};

/// Builds a reqwest transport that accepts the self-signed certificates served by `httpmock`.
#[cfg(feature = "reqwest")]
pub fn test_reqwest_http_client() -> session_broker::http::ReqwestHttpClient {
	let client = session_broker::reqwest::Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	session_broker::http::ReqwestHttpClient::with_client(client)
}

/// Builds an unsigned JWT for `subject` that expires `expires_in` from now.
pub fn jwt(subject: &str, expires_in: Duration) -> String {
	let exp = (OffsetDateTime::now_utc() + expires_in).unix_timestamp();
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
	let claims =
		URL_SAFE_NO_PAD.encode(serde_json::json!({ "sub": subject, "exp": exp }).to_string());

	format!("{header}.{claims}.c2lnbmF0dXJl")
}

/// Token pair whose access token expires `expires_in` from now.
pub fn token_pair(subject: &str, expires_in: Duration) -> TokenPair {
	TokenPair::new(jwt(subject, expires_in), format!("refresh-{subject}"))
}

/// `Authorization` value carrying `pair`'s access token.
pub fn bearer(pair: &TokenPair) -> String {
	pair.access_token.bearer()
}

pub fn login_url() -> Url {
	Url::parse("https://app.example.com/login").expect("Login URL fixture should parse.")
}

pub fn api_url(path: &str) -> Url {
	Url::parse(&format!("https://api.example.com{path}")).expect("API URL fixture should parse.")
}

/// Identity provider that counts calls and issues numbered token pairs.
#[derive(Debug, Default)]
pub struct CountingProvider {
	calls: AtomicUsize,
	delay: StdDuration,
	failing: AtomicBool,
	presented: Mutex<Vec<String>>,
	issued: Mutex<Vec<TokenPair>>,
}
impl CountingProvider {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_delay(mut self, delay: StdDuration) -> Self {
		self.delay = delay;

		self
	}

	pub fn failing(self) -> Self {
		self.set_failing(true);

		self
	}

	pub fn set_failing(&self, failing: bool) {
		self.failing.store(failing, Ordering::SeqCst);
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	/// Refresh tokens presented so far, in call order.
	pub fn presented(&self) -> Vec<String> {
		self.presented.lock().clone()
	}

	pub fn last_issued(&self) -> Option<TokenPair> {
		self.issued.lock().last().cloned()
	}
}
impl IdentityProvider for CountingProvider {
	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> ProviderFuture<'a, TokenPair> {
		Box::pin(async move {
			let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

			self.presented.lock().push(refresh_token.expose().to_owned());

			if !self.delay.is_zero() {
				tokio::time::sleep(self.delay).await;
			}
			if self.failing.load(Ordering::SeqCst) {
				return Err(RefreshError::Rejected { reason: "refresh token revoked".into() });
			}

			let pair = token_pair(&format!("refreshed-{call}"), Duration::hours(1));

			self.issued.lock().push(pair.clone());

			Ok(pair)
		})
	}
}

/// Scripted answer for one API request.
#[derive(Clone, Debug)]
pub struct Reply {
	status: StatusCode,
	delay: StdDuration,
	network_failure: bool,
}
impl Reply {
	pub fn status(status: StatusCode) -> Self {
		Self { status, delay: StdDuration::ZERO, network_failure: false }
	}

	pub fn ok() -> Self {
		Self::status(StatusCode::OK)
	}

	pub fn unauthorized() -> Self {
		Self::status(StatusCode::UNAUTHORIZED)
	}

	pub fn network_failure() -> Self {
		Self { network_failure: true, ..Self::ok() }
	}

	pub fn after(mut self, millis: u64) -> Self {
		self.delay = StdDuration::from_millis(millis);

		self
	}
}

/// What the scripted transport saw for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedRequest {
	pub path: String,
	pub authorization: Option<String>,
}

type Responder = dyn Fn(&HttpRequest) -> Reply + Send + Sync;

/// API transport answering from a closure and recording every request it receives.
///
/// Response bodies echo the request path so tests can match responses to requests.
pub struct ScriptedApi {
	responder: Box<Responder>,
	recorded: Mutex<Vec<RecordedRequest>>,
}
impl ScriptedApi {
	pub fn new(responder: impl 'static + Fn(&HttpRequest) -> Reply + Send + Sync) -> Self {
		Self { responder: Box::new(responder), recorded: Default::default() }
	}

	/// Answers `401` to requests carrying `stale` and `200` otherwise, delaying each path by the
	/// listed milliseconds.
	pub fn rejecting(stale: &str, delays: &[(&str, u64)]) -> Self {
		let stale = stale.to_owned();
		let delays = delays.iter().map(|(path, ms)| ((*path).to_owned(), *ms)).collect::<Vec<_>>();

		Self::new(move |request| {
			let delay = delays
				.iter()
				.find(|(path, _)| path == request.uri().path())
				.map_or(0, |(_, ms)| *ms);
			let reply = if authorization(request).as_deref() == Some(stale.as_str()) {
				Reply::unauthorized()
			} else {
				Reply::ok()
			};

			reply.after(delay)
		})
	}

	pub fn recorded(&self) -> Vec<RecordedRequest> {
		self.recorded.lock().clone()
	}

	/// Number of recorded requests that carried `authorization`.
	pub fn count_with(&self, authorization: &str) -> usize {
		self.recorded
			.lock()
			.iter()
			.filter(|request| request.authorization.as_deref() == Some(authorization))
			.count()
	}
}
impl ApiHttpClient for ScriptedApi {
	fn execute(&self, request: HttpRequest) -> ApiFuture {
		let reply = (self.responder)(&request);
		let path = request.uri().path().to_owned();

		self.recorded
			.lock()
			.push(RecordedRequest { path: path.clone(), authorization: authorization(&request) });

		Box::pin(async move {
			if !reply.delay.is_zero() {
				tokio::time::sleep(reply.delay).await;
			}
			if reply.network_failure {
				return Err(UpstreamError::transport(IoError::new(
					ErrorKind::ConnectionReset,
					"connection reset by peer",
				)));
			}

			let mut response = HttpResponse::new(path.into_bytes());

			*response.status_mut() = reply.status;

			Ok(response)
		})
	}
}

fn authorization(request: &HttpRequest) -> Option<String> {
	request.headers().get(AUTHORIZATION).and_then(|value| value.to_str().ok()).map(str::to_owned)
}

/// Broker wired to in-memory doubles.
pub struct Harness {
	pub broker: SessionBroker<ScriptedApi>,
	pub store: Arc<MemorySessionStore>,
	pub provider: Arc<CountingProvider>,
	pub api: Arc<ScriptedApi>,
}
impl Harness {
	pub fn new(provider: CountingProvider, api: ScriptedApi) -> Self {
		Self::with_config(BrokerConfig::new(login_url()), provider, api)
	}

	pub fn with_config(config: BrokerConfig, provider: CountingProvider, api: ScriptedApi) -> Self {
		let store = Arc::new(MemorySessionStore::new(config.cookie.clone()));
		let provider = Arc::new(provider);
		let api = Arc::new(api);
		let broker =
			SessionBroker::with_http_client(store.clone(), provider.clone(), config, api.clone());

		Self { broker, store, provider, api }
	}

	/// Signs a new session in with `tokens` and returns the `Cookie` header the browser sends
	/// back afterwards.
	pub async fn sign_in(&self, tokens: TokenPair) -> String {
		let mut ctx = self.open(None, "/").await;

		self.broker.establish(&mut ctx, tokens).await.expect("Session should be established.");

		format!("{}={}", self.broker.config.cookie.name, ctx.session().key().as_ref())
	}

	pub async fn open(&self, cookie: Option<&str>, location: &str) -> RequestContext {
		self.broker.open_session(cookie, location).await.expect("Session should open.")
	}
}
