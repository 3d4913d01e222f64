//! Request-facing orchestration: session lifecycle, refresh coordination, and dispatch.

pub mod dispatch;
pub mod refresh;

pub use dispatch::*;
pub use refresh::*;

// self
use crate::{
	_prelude::*,
	auth::TokenPair,
	config::BrokerConfig,
	context::RequestContext,
	http::ApiHttpClient,
	provider::IdentityProvider,
	redirect::LoginRedirect,
	session::{Session, SessionStore},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Broker specialized for the crate's default reqwest transport.
pub type ReqwestSessionBroker = SessionBroker<ReqwestHttpClient>;

/// Ties the session store, the refresh coordinator, and the API transport together.
///
/// One broker serves every request of the process. Request handlers open a
/// [`RequestContext`] per inbound request, pass it to [`SessionBroker::dispatch`], and attach
/// the context's `Set-Cookie` values to their response.
pub struct SessionBroker<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Transport used for every API request.
	pub http_client: Arc<C>,
	/// Session persistence backend.
	pub store: Arc<dyn SessionStore>,
	/// Single-flight refresh coordinator shared by all requests.
	pub coordinator: Arc<RefreshCoordinator>,
	/// Broker settings.
	pub config: BrokerConfig,
}
impl<C> SessionBroker<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Creates a broker that reuses the caller-provided transport.
	pub fn with_http_client(
		store: Arc<dyn SessionStore>,
		provider: Arc<dyn IdentityProvider>,
		config: BrokerConfig,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		let coordinator = Arc::new(RefreshCoordinator::from_config(provider, &config));

		Self { http_client: http_client.into(), store, coordinator, config }
	}

	/// Replaces the refresh coordinator, e.g. to share one across several brokers.
	pub fn with_coordinator(mut self, coordinator: Arc<RefreshCoordinator>) -> Self {
		self.coordinator = coordinator;

		self
	}

	/// Counters describing refresh activity.
	pub fn refresh_metrics(&self) -> &Arc<RefreshMetrics> {
		self.coordinator.metrics()
	}

	/// Builds the login redirect for a request made to `location`.
	pub fn login_redirect(&self, location: &str) -> LoginRedirect {
		LoginRedirect::new(self.config.login_url.clone(), &self.config.return_to_param, location)
	}

	/// Loads the session named by the request's `Cookie` header, or starts a new one.
	///
	/// Unknown, expired, or malformed keys silently yield a fresh session.
	pub async fn open_session(
		&self,
		cookie_header: Option<&str>,
		location: impl Into<String>,
	) -> Result<RequestContext> {
		let key = cookie_header.and_then(|header| self.config.cookie.extract(header));
		let session = match key {
			Some(key) => match self.store.get(&key).await? {
				Some(record) => Session::from_record(key, record),
				None => Session::new(),
			},
			None => Session::new(),
		};

		Ok(RequestContext::new(session, location))
	}

	/// Returns the session's tokens or [`Error::Unauthenticated`] pointing at the login page.
	pub fn require_tokens(&self, ctx: &RequestContext) -> Result<TokenPair> {
		ctx.session().tokens().cloned().ok_or_else(|| Error::Unauthenticated {
			login: self.login_redirect(ctx.location()).url(),
		})
	}

	/// Stores the tokens obtained at sign-in and commits the session.
	///
	/// The session identifier is fixed here so every later request of this session shares
	/// one refresh scope.
	pub async fn establish(&self, ctx: &mut RequestContext, tokens: TokenPair) -> Result<()> {
		let session = ctx.session_mut();

		session.set_tokens(tokens);
		session.ensure_session_id();

		self.commit(ctx).await
	}

	/// Destroys the stored session and queues an expiring cookie.
	pub async fn logout(&self, ctx: &mut RequestContext) -> Result<()> {
		let cookie = self.store.destroy(ctx.session().key()).await?;

		*ctx.session_mut() = Session::new();
		ctx.push_set_cookie(cookie);

		Ok(())
	}

	/// Persists the session and queues its `Set-Cookie` value on the context.
	pub async fn commit(&self, ctx: &mut RequestContext) -> Result<()> {
		let cookie = self.store.commit(ctx.session()).await?;

		ctx.push_set_cookie(cookie);

		Ok(())
	}
}
#[cfg(feature = "reqwest")]
impl SessionBroker<ReqwestHttpClient> {
	/// Creates a broker backed by a default reqwest client.
	pub fn new(
		store: Arc<dyn SessionStore>,
		provider: Arc<dyn IdentityProvider>,
		config: BrokerConfig,
	) -> Self {
		Self::with_http_client(store, provider, config, ReqwestHttpClient::default())
	}
}
impl<C> Clone for SessionBroker<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			store: self.store.clone(),
			coordinator: self.coordinator.clone(),
			config: self.config.clone(),
		}
	}
}
impl<C> Debug for SessionBroker<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionBroker")
			.field("coordinator", &self.coordinator)
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}
