mod support;

// std
use std::time::Duration as StdDuration;
// crates.io
use time::Duration;
// self
use session_broker::{
	error::{Error, RefreshError, UpstreamError},
	flows::PendingResponse,
	http::{HttpResponse, RequestSpec, StatusCode},
};
use support::{CountingProvider, Harness, Reply, ScriptedApi, api_url, bearer, token_pair};

fn get(path: &str) -> RequestSpec {
	RequestSpec::get(api_url(path))
}

async fn collect(pending: Vec<PendingResponse>) -> Vec<HttpResponse> {
	let mut responses = Vec::with_capacity(pending.len());

	for response in pending {
		responses.push(response.response().await.expect("Dispatched request should complete."));
	}

	responses
}

fn body(response: &HttpResponse) -> &str {
	std::str::from_utf8(response.body()).expect("Scripted bodies are UTF-8.")
}

#[tokio::test(start_paused = true)]
async fn first_unauthorized_response_refreshes_once_and_reissues_the_batch() {
	let stale = token_pair("stale", Duration::hours(1));
	let api = ScriptedApi::rejecting(&bearer(&stale), &[("/a", 0), ("/b", 50), ("/c", 50)]);
	let h = Harness::new(CountingProvider::new(), api);
	let cookie = h.sign_in(stale.clone()).await;
	let mut ctx = h.open(Some(&cookie), "/assets").await;
	let pending = h
		.broker
		.dispatch(&mut ctx, vec![get("/a"), get("/b"), get("/c")])
		.await
		.expect("Dispatch should recover from the stale token.");
	let responses = collect(pending).await;
	let fresh = h.provider.last_issued().expect("Provider should have issued a pair.");

	assert_eq!(h.provider.calls(), 1);
	assert_eq!(h.provider.presented(), vec!["refresh-stale".to_owned()]);
	assert!(responses.iter().all(|response| response.status() == StatusCode::OK));
	assert_eq!(responses.iter().map(body).collect::<Vec<_>>(), ["/a", "/b", "/c"]);
	assert_eq!(h.api.count_with(&bearer(&stale)), 3);
	assert_eq!(h.api.count_with(&bearer(&fresh)), 3);
	assert_eq!(ctx.session().tokens(), Some(&fresh));
	assert_eq!(ctx.set_cookies().len(), 1);

	let reopened = h.open(Some(&cookie), "/").await;

	assert_eq!(reopened.session().tokens(), Some(&fresh));
}

#[tokio::test(start_paused = true)]
async fn successful_first_response_returns_the_batch_untouched() {
	let tokens = token_pair("valid", Duration::hours(1));
	let api = ScriptedApi::rejecting("Bearer revoked", &[("/a", 0), ("/b", 50)]);
	let h = Harness::new(CountingProvider::new(), api);
	let cookie = h.sign_in(tokens.clone()).await;
	let mut ctx = h.open(Some(&cookie), "/assets").await;
	let pending = h
		.broker
		.dispatch(&mut ctx, vec![get("/a"), get("/b")])
		.await
		.expect("Dispatch should succeed.");

	assert_eq!(pending.len(), 2);
	assert!(pending[0].is_ready());

	let responses = collect(pending).await;

	assert_eq!(h.provider.calls(), 0);
	assert_eq!(responses.iter().map(body).collect::<Vec<_>>(), ["/a", "/b"]);
	assert_eq!(h.api.recorded().len(), 2);
	assert_eq!(h.api.count_with(&bearer(&tokens)), 2);
	assert_eq!(ctx.set_cookies().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn later_unauthorized_responses_reach_the_caller_unchanged() {
	let tokens = token_pair("valid", Duration::hours(1));
	let api = ScriptedApi::new(|request| match request.uri().path() {
		"/b" => Reply::unauthorized().after(50),
		_ => Reply::ok(),
	});
	let h = Harness::new(CountingProvider::new(), api);
	let cookie = h.sign_in(tokens).await;
	let mut ctx = h.open(Some(&cookie), "/assets").await;
	let pending = h
		.broker
		.dispatch(&mut ctx, vec![get("/a"), get("/b")])
		.await
		.expect("Dispatch should succeed.");
	let responses = collect(pending).await;

	assert_eq!(responses[0].status(), StatusCode::OK);
	assert_eq!(responses[1].status(), StatusCode::UNAUTHORIZED);
	assert_eq!(h.provider.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn token_inside_the_expiry_buffer_is_refreshed_before_sending() {
	let expiring = token_pair("expiring", Duration::seconds(1));
	let api = ScriptedApi::rejecting(&bearer(&expiring), &[]);
	let h = Harness::new(CountingProvider::new(), api);
	let cookie = h.sign_in(expiring.clone()).await;
	let mut ctx = h.open(Some(&cookie), "/assets").await;
	let pending = h
		.broker
		.dispatch(&mut ctx, vec![get("/a"), get("/b")])
		.await
		.expect("Dispatch should refresh preemptively.");
	let responses = collect(pending).await;
	let fresh = h.provider.last_issued().expect("Provider should have issued a pair.");

	assert_eq!(h.provider.calls(), 1);
	assert!(responses.iter().all(|response| response.status() == StatusCode::OK));
	assert_eq!(h.api.count_with(&bearer(&expiring)), 0);
	assert_eq!(h.api.count_with(&bearer(&fresh)), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_batches_of_one_session_share_a_single_refresh() {
	let stale = token_pair("stale", Duration::hours(1));
	let api = ScriptedApi::rejecting(&bearer(&stale), &[("/b", 20), ("/d", 20)]);
	let provider = CountingProvider::new().with_delay(StdDuration::from_millis(100));
	let h = Harness::new(provider, api);
	let cookie = h.sign_in(stale.clone()).await;
	let mut first = h.open(Some(&cookie), "/assets").await;
	let mut second = h.open(Some(&cookie), "/tags").await;
	let (a, b) = tokio::join!(
		h.broker.dispatch(&mut first, vec![get("/a"), get("/b")]),
		h.broker.dispatch(&mut second, vec![get("/c"), get("/d")]),
	);
	let mut responses = collect(a.expect("First batch should recover.")).await;

	responses.extend(collect(b.expect("Second batch should recover.")).await);

	let fresh = h.provider.last_issued().expect("Provider should have issued a pair.");

	assert_eq!(h.provider.calls(), 1);
	assert!(responses.iter().all(|response| response.status() == StatusCode::OK));
	assert_eq!(h.api.count_with(&bearer(&fresh)), 4);
	assert_eq!(first.session().tokens(), Some(&fresh));
	assert_eq!(second.session().tokens(), Some(&fresh));
	assert_eq!(h.broker.refresh_metrics().joins(), 1);
}

#[tokio::test]
async fn sessions_without_tokens_are_sent_to_login() {
	let h = Harness::new(CountingProvider::new(), ScriptedApi::new(|_| Reply::ok()));
	let mut ctx = h.open(None, "/assets?page=2").await;
	let err = h
		.broker
		.dispatch(&mut ctx, vec![get("/a")])
		.await
		.expect_err("Dispatch without tokens must fail.");

	assert!(matches!(err, Error::Unauthenticated { .. }));
	assert_eq!(
		err.login_redirect().map(|url| url.as_str()),
		Some("https://app.example.com/login?returnTo=%2Fassets%3Fpage%3D2")
	);
	assert!(h.api.recorded().is_empty());
	assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn failed_refresh_requires_reauthentication() {
	let expired = token_pair("expired", Duration::minutes(-5));
	let h = Harness::new(CountingProvider::new().failing(), ScriptedApi::new(|_| Reply::ok()));
	let cookie = h.sign_in(expired.clone()).await;
	let mut ctx = h.open(Some(&cookie), "https://evil.example.com/").await;
	let err = h
		.broker
		.dispatch(&mut ctx, vec![get("/a")])
		.await
		.expect_err("Dispatch must fail when the refresh fails.");

	match &err {
		Error::ReauthRequired { login, source: RefreshError::Rejected { .. } } =>
			assert_eq!(login.as_str(), "https://app.example.com/login?returnTo=%2F"),
		other => panic!("Unexpected error: {other:?}."),
	}

	assert!(h.api.recorded().is_empty());
	assert_eq!(ctx.session().tokens(), Some(&expired));
}

#[tokio::test]
async fn empty_batches_still_commit_the_session() {
	let h = Harness::new(CountingProvider::new(), ScriptedApi::new(|_| Reply::ok()));
	let cookie = h.sign_in(token_pair("valid", Duration::hours(1))).await;
	let mut ctx = h.open(Some(&cookie), "/").await;
	let pending =
		h.broker.dispatch(&mut ctx, Vec::new()).await.expect("Empty dispatch should succeed.");

	assert!(pending.is_empty());
	assert_eq!(ctx.set_cookies().len(), 1);
	assert!(ctx.set_cookies()[0].starts_with(&cookie));
}

#[tokio::test(start_paused = true)]
async fn transport_failures_are_returned_without_refreshing() {
	let api = ScriptedApi::new(|request| match request.uri().path() {
		"/a" => Reply::network_failure(),
		_ => Reply::ok().after(50),
	});
	let h = Harness::new(CountingProvider::new(), api);
	let cookie = h.sign_in(token_pair("valid", Duration::hours(1))).await;
	let mut ctx = h.open(Some(&cookie), "/").await;
	let mut pending = h
		.broker
		.dispatch(&mut ctx, vec![get("/a"), get("/b")])
		.await
		.expect("Dispatch should hand back the failed request.");
	let second = pending.pop().expect("Second response should be present.");
	let first = pending.pop().expect("First response should be present.");

	assert!(matches!(first.response().await, Err(UpstreamError::Transport { .. })));
	assert_eq!(
		second.response().await.expect("Second request should succeed.").status(),
		StatusCode::OK
	);
	assert_eq!(h.provider.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn dispatch_one_retries_with_the_refreshed_token() {
	let stale = token_pair("stale", Duration::hours(1));
	let h = Harness::new(CountingProvider::new(), ScriptedApi::rejecting(&bearer(&stale), &[]));
	let cookie = h.sign_in(stale).await;
	let mut ctx = h.open(Some(&cookie), "/").await;
	let response = h
		.broker
		.dispatch_one(&mut ctx, get("/assets/42"))
		.await
		.expect("Single dispatch should recover.");

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(body(&response), "/assets/42");
	assert_eq!(h.api.recorded().len(), 2);
}
