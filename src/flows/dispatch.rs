//! Authenticated request batches with peek-and-retry on `401`.
//!
//! [`SessionBroker::dispatch`] sends every request of a batch concurrently with the session's
//! bearer token and inspects only the first response to arrive. A `401` there marks the whole
//! batch as stale: the remaining requests are aborted, the session is refreshed once through
//! the [`RefreshCoordinator`](crate::flows::RefreshCoordinator), and the batch is reissued
//! with the new token. Any other first status hands the batch back untouched.
//!
//! Only the first response is inspected. A later response of the same batch that returns
//! `401` reaches its caller unchanged, and the caller is expected to handle it like any other
//! non-success status.

// crates.io
use futures_util::future;
use tokio::task::{JoinError, JoinHandle};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	context::RequestContext,
	error::UpstreamError,
	flows::SessionBroker,
	http::{ApiHttpClient, HttpResponse, RequestSpec, StatusCode},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

type ApiResult = Result<HttpResponse, UpstreamError>;

/// Response of one dispatched request.
///
/// The response that was inspected for a `401` is already [`ready`](Self::is_ready); the
/// others are still running on the runtime and can be awaited in any order. Dropping a pending
/// response detaches its request.
#[derive(Debug)]
pub struct PendingResponse(PendingState);
impl PendingResponse {
	fn ready(result: ApiResult) -> Self {
		Self(PendingState::Ready(result))
	}

	fn in_flight(handle: JoinHandle<ApiResult>) -> Self {
		Self(PendingState::InFlight(handle))
	}

	/// Returns `true` when the response has already arrived.
	pub fn is_ready(&self) -> bool {
		match &self.0 {
			PendingState::Ready(_) => true,
			PendingState::InFlight(handle) => handle.is_finished(),
		}
	}

	/// Waits for the response, whatever its status.
	pub async fn response(self) -> Result<HttpResponse, UpstreamError> {
		match self.0 {
			PendingState::Ready(result) => result,
			PendingState::InFlight(handle) => flatten_join(handle.await),
		}
	}
}

#[derive(Debug)]
enum PendingState {
	Ready(ApiResult),
	InFlight(JoinHandle<ApiResult>),
}

impl<C> SessionBroker<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Sends `requests` with the session's access token and returns their pending responses in
	/// request order.
	///
	/// An access token that is already expired (expiry buffer included) is refreshed before
	/// anything is sent, and the batch is then returned without peeking. At most one refresh
	/// happens per call. The session is committed afterwards and its `Set-Cookie` value is
	/// queued on `ctx`.
	///
	/// # Errors
	///
	/// - [`Error::Unauthenticated`] when the session holds no tokens.
	/// - [`Error::ReauthRequired`] when the refresh fails.
	/// - [`Error::Config`] when a request cannot carry the bearer token.
	/// - [`Error::Storage`] when the session cannot be committed.
	pub async fn dispatch(
		&self,
		ctx: &mut RequestContext,
		requests: Vec<RequestSpec>,
	) -> Result<Vec<PendingResponse>> {
		const KIND: FlowKind = FlowKind::Dispatch;

		let span = FlowSpan::new(KIND, "dispatch");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.dispatch_batch(ctx, &requests)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Dispatches a single request and waits for its response.
	pub async fn dispatch_one(
		&self,
		ctx: &mut RequestContext,
		request: RequestSpec,
	) -> Result<HttpResponse> {
		let pending = self.dispatch(ctx, vec![request]).await?.pop().ok_or_else(|| {
			UpstreamError::Aborted { message: "request was not issued".into() }
		})?;

		Ok(pending.response().await?)
	}

	async fn dispatch_batch(
		&self,
		ctx: &mut RequestContext,
		requests: &[RequestSpec],
	) -> Result<Vec<PendingResponse>> {
		let tokens = self.require_tokens(ctx)?;
		let responses = if tokens.access_expired(self.config.expiry_buffer()) {
			self.refresh_and_issue(ctx, requests).await?
		} else {
			let mut batch = self.issue(requests, &tokens.access_token)?;

			match peek(&mut batch).await {
				Some((_, Ok(response))) if response.status() == StatusCode::UNAUTHORIZED => {
					batch.iter().for_each(JoinHandle::abort);

					self.refresh_and_issue(ctx, requests).await?
				},
				Some((index, result)) => assemble(batch, index, result),
				None => Vec::new(),
			}
		};

		self.commit(ctx).await?;

		Ok(responses)
	}

	async fn refresh_and_issue(
		&self,
		ctx: &mut RequestContext,
		requests: &[RequestSpec],
	) -> Result<Vec<PendingResponse>> {
		let redirect = self.login_redirect(ctx.location());
		let tokens = self.coordinator.refresh_or_relogin(ctx.session_mut(), &redirect).await?;
		let batch = self.issue(requests, &tokens.access_token)?;

		Ok(batch.into_iter().map(PendingResponse::in_flight).collect())
	}

	fn issue(
		&self,
		requests: &[RequestSpec],
		access_token: &TokenSecret,
	) -> Result<Vec<JoinHandle<ApiResult>>> {
		let prepared = requests
			.iter()
			.map(|spec| spec.authorize(access_token))
			.collect::<Result<Vec<_>, _>>()?;

		Ok(prepared
			.into_iter()
			.map(|request| tokio::spawn(self.http_client.execute(request)))
			.collect())
	}
}

/// Waits for the first request of `batch` to finish and returns its index and result.
async fn peek(batch: &mut [JoinHandle<ApiResult>]) -> Option<(usize, ApiResult)> {
	if batch.is_empty() {
		return None;
	}

	let (joined, index, _) = future::select_all(batch.iter_mut()).await;

	Some((index, flatten_join(joined)))
}

fn assemble(
	batch: Vec<JoinHandle<ApiResult>>,
	ready_index: usize,
	ready: ApiResult,
) -> Vec<PendingResponse> {
	let mut ready = Some(ready);

	batch
		.into_iter()
		.enumerate()
		.map(|(index, handle)| match ready.take_if(|_| index == ready_index) {
			Some(result) => PendingResponse::ready(result),
			None => PendingResponse::in_flight(handle),
		})
		.collect()
}

fn flatten_join(joined: Result<ApiResult, JoinError>) -> ApiResult {
	joined.unwrap_or_else(|e| Err(UpstreamError::Aborted { message: e.to_string() }))
}
