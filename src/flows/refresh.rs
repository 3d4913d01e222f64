//! Single-flight token refresh shared by every request of a session.
//!
//! [`RefreshCoordinator`] keeps one pending refresh per [`SessionId`]. The first caller that
//! needs fresh credentials registers a spawned upstream call under the map lock before any
//! `.await`; everyone arriving while that call runs (or within the grace window after it
//! succeeded) awaits the same shared outcome instead of calling the identity provider again.
//! Failed refreshes are evicted before their result becomes observable, so the next caller
//! starts a new cycle.
//!
//! Coordination is process-local. Deployments with several instances still perform at most
//! one refresh per session per process.

mod metrics;

pub use metrics::RefreshMetrics;

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use futures_util::future::{BoxFuture, FutureExt, Shared};
// self
use crate::{
	_prelude::*,
	auth::{SessionId, TokenPair, TokenSecret},
	config::BrokerConfig,
	error::RefreshError,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::IdentityProvider,
	redirect::LoginRedirect,
	session::Session,
};

type SharedRefresh = Shared<BoxFuture<'static, Result<TokenPair, RefreshError>>>;
type PendingMap = Arc<Mutex<HashMap<SessionId, PendingRefresh>>>;

struct PendingRefresh {
	generation: u64,
	outcome: SharedRefresh,
}

/// Deduplicates concurrent refreshes per session.
pub struct RefreshCoordinator {
	provider: Arc<dyn IdentityProvider>,
	pending: PendingMap,
	generation: AtomicU64,
	grace: Duration,
	timeout: Duration,
	metrics: Arc<RefreshMetrics>,
}
impl RefreshCoordinator {
	const DEFAULT_GRACE: Duration = Duration::seconds(5);
	const DEFAULT_TIMEOUT: Duration = Duration::seconds(15);

	/// Creates a coordinator with the default grace window (5 s) and timeout (15 s).
	pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
		Self {
			provider,
			pending: Default::default(),
			generation: AtomicU64::new(0),
			grace: Self::DEFAULT_GRACE,
			timeout: Self::DEFAULT_TIMEOUT,
			metrics: Default::default(),
		}
	}

	/// Creates a coordinator using the timings from `config`.
	pub fn from_config(provider: Arc<dyn IdentityProvider>, config: &BrokerConfig) -> Self {
		Self::new(provider)
			.with_grace(config.refresh_grace())
			.with_timeout(config.refresh_timeout())
	}

	/// Overrides how long a successful refresh stays joinable; negative values clamp to zero.
	pub fn with_grace(mut self, grace: Duration) -> Self {
		self.grace = grace.max(Duration::ZERO);

		self
	}

	/// Overrides the upper bound for one upstream call; zero disables the bound.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout.max(Duration::ZERO);

		self
	}

	/// Counters describing refresh activity.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		&self.metrics
	}

	/// Returns `true` while a refresh for `session_id` is running or inside its grace window.
	pub fn is_pending(&self, session_id: &SessionId) -> bool {
		self.pending.lock().contains_key(session_id)
	}

	/// Number of sessions with a pending refresh.
	pub fn pending_len(&self) -> usize {
		self.pending.lock().len()
	}

	/// Returns fresh tokens for `session_id`, joining a pending refresh when one exists.
	///
	/// Every caller joined to the same refresh receives the same pair or the same error.
	/// The upstream call keeps running if the caller is dropped.
	pub async fn refresh(
		&self,
		session_id: &SessionId,
		refresh_token: &TokenSecret,
	) -> Result<TokenPair, RefreshError> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh");

		self.metrics.record_attempt();
		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let (outcome, joined) = self.join_or_start(session_id, refresh_token);

		if joined {
			self.metrics.record_join();
			obs::record_flow_outcome(KIND, FlowOutcome::Joined);
		}

		let result = span.instrument(outcome).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Refreshes the credentials held by `session` and stores the new pair in it.
	///
	/// The session's [`SessionId`] is generated on first use. A session without tokens yields
	/// [`Error::Unauthenticated`]; a failed refresh yields [`Error::ReauthRequired`]. Both carry
	/// the login URL built from `redirect`.
	pub async fn refresh_or_relogin(
		&self,
		session: &mut Session,
		redirect: &LoginRedirect,
	) -> Result<TokenPair> {
		let refresh_token = session
			.tokens()
			.map(|tokens| tokens.refresh_token.clone())
			.ok_or_else(|| Error::Unauthenticated { login: redirect.url() })?;
		let session_id = session.ensure_session_id();

		match self.refresh(&session_id, &refresh_token).await {
			Ok(tokens) => {
				session.set_tokens(tokens.clone());

				Ok(tokens)
			},
			Err(source) => Err(Error::ReauthRequired { login: redirect.url(), source }),
		}
	}

	fn join_or_start(
		&self,
		session_id: &SessionId,
		refresh_token: &TokenSecret,
	) -> (SharedRefresh, bool) {
		let mut pending = self.pending.lock();

		if let Some(entry) = pending.get(session_id) {
			obs::trace_refresh_event("join", session_id, entry.generation);

			return (entry.outcome.clone(), true);
		}

		let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
		let outcome = self.start(session_id.clone(), refresh_token.clone(), generation);

		// The spawned task evicts through this same lock, so it cannot observe the map before
		// the entry exists.
		pending.insert(session_id.clone(), PendingRefresh { generation, outcome: outcome.clone() });

		(outcome, false)
	}

	fn start(
		&self,
		session_id: SessionId,
		refresh_token: TokenSecret,
		generation: u64,
	) -> SharedRefresh {
		let provider = self.provider.clone();
		let pending = self.pending.clone();
		let metrics = self.metrics.clone();
		let grace = self.grace;
		let timeout = self.timeout;
		let task_session_id = session_id.clone();
		let task = tokio::spawn(async move {
			obs::trace_refresh_event("start", &task_session_id, generation);
			metrics.record_upstream_call();

			let result = call_provider(provider.as_ref(), &refresh_token, timeout).await;

			match &result {
				Ok(_) => {
					metrics.record_success();

					tokio::spawn(async move {
						tokio::time::sleep(grace.unsigned_abs()).await;
						evict(&pending, &task_session_id, generation);
					});
				},
				Err(_) => {
					metrics.record_failure();
					evict(&pending, &task_session_id, generation);
				},
			}

			result
		});
		let pending = self.pending.clone();

		async move {
			match task.await {
				Ok(result) => result,
				Err(e) => {
					evict(&pending, &session_id, generation);

					Err(RefreshError::Aborted { message: e.to_string() })
				},
			}
		}
		.boxed()
		.shared()
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("pending", &self.pending_len())
			.field("grace", &self.grace)
			.field("timeout", &self.timeout)
			.field("metrics", &self.metrics)
			.finish_non_exhaustive()
	}
}

async fn call_provider(
	provider: &dyn IdentityProvider,
	refresh_token: &TokenSecret,
	timeout: Duration,
) -> Result<TokenPair, RefreshError> {
	if timeout.is_zero() {
		return provider.refresh(refresh_token).await;
	}

	tokio::time::timeout(timeout.unsigned_abs(), provider.refresh(refresh_token))
		.await
		.unwrap_or(Err(RefreshError::TimedOut { after: timeout }))
}

fn evict(
	pending: &Mutex<HashMap<SessionId, PendingRefresh>>,
	session_id: &SessionId,
	generation: u64,
) {
	let mut pending = pending.lock();

	if pending.get(session_id).is_some_and(|entry| entry.generation == generation) {
		pending.remove(session_id);
		obs::trace_refresh_event("evict", session_id, generation);
	}
}
