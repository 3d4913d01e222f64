mod support;

// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use futures_util::future;
use time::Duration;
// self
use session_broker::{
	auth::{SessionId, TokenPair, TokenSecret},
	error::{Error, RefreshError},
	flows::RefreshCoordinator,
	redirect::LoginRedirect,
	session::Session,
};
use support::{CountingProvider, login_url, token_pair};

fn session_id(value: &str) -> SessionId {
	SessionId::new(value).expect("Session identifier fixture should be valid.")
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_upstream_call() {
	let provider = Arc::new(CountingProvider::new().with_delay(StdDuration::from_millis(100)));
	let coordinator = RefreshCoordinator::new(provider.clone());
	let sid = session_id("session-a");
	let presented = TokenSecret::new("refresh-0");
	let results = future::join_all((0..16).map(|_| coordinator.refresh(&sid, &presented))).await;
	let pairs = results
		.into_iter()
		.collect::<Result<Vec<TokenPair>, _>>()
		.expect("Every joined caller should receive the refreshed pair.");

	assert_eq!(provider.calls(), 1);
	assert!(pairs.windows(2).all(|w| w[0] == w[1]));
	assert_eq!(Some(&pairs[0]), provider.last_issued().as_ref());

	let metrics = coordinator.metrics();

	assert_eq!(metrics.attempts(), 16);
	assert_eq!(metrics.joins(), 15);
	assert_eq!(metrics.upstream_calls(), 1);
	assert_eq!(metrics.successes(), 1);
}

#[tokio::test(start_paused = true)]
async fn abandoned_initiator_does_not_cancel_the_refresh() {
	let provider = Arc::new(CountingProvider::new().with_delay(StdDuration::from_millis(100)));
	let coordinator = Arc::new(RefreshCoordinator::new(provider.clone()));
	let sid = session_id("session-abandoned");
	let initiator = tokio::spawn({
		let coordinator = coordinator.clone();
		let sid = sid.clone();

		async move { coordinator.refresh(&sid, &TokenSecret::new("refresh-0")).await }
	});

	while !coordinator.is_pending(&sid) {
		tokio::task::yield_now().await;
	}

	initiator.abort();

	let aborted = initiator.await.expect_err("Initiator should have been cancelled.");

	assert!(aborted.is_cancelled());

	let pair = coordinator
		.refresh(&sid, &TokenSecret::new("refresh-0"))
		.await
		.expect("Joined caller should receive the pair started by the cancelled one.");

	assert_eq!(provider.calls(), 1);
	assert_eq!(Some(pair), provider.last_issued());
	assert_eq!(coordinator.metrics().joins(), 1);
	assert_eq!(coordinator.metrics().upstream_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn distinct_sessions_refresh_independently() {
	let provider = Arc::new(CountingProvider::new().with_delay(StdDuration::from_millis(50)));
	let coordinator = RefreshCoordinator::new(provider.clone());
	let first = session_id("session-a");
	let second = session_id("session-b");
	let presented = TokenSecret::new("refresh-0");
	let (a, b) = tokio::join!(
		coordinator.refresh(&first, &presented),
		coordinator.refresh(&second, &presented)
	);
	let a = a.expect("First session should refresh.");
	let b = b.expect("Second session should refresh.");

	assert_eq!(provider.calls(), 2);
	assert_ne!(a, b);
	assert_eq!(coordinator.pending_len(), 2);
}

#[tokio::test(start_paused = true)]
async fn completed_refresh_is_reused_within_the_grace_window() {
	let provider = Arc::new(CountingProvider::new());
	let coordinator = RefreshCoordinator::new(provider.clone()).with_grace(Duration::seconds(5));
	let sid = session_id("session-grace");
	let presented = TokenSecret::new("refresh-0");
	let first = coordinator.refresh(&sid, &presented).await.expect("First refresh should succeed.");

	tokio::time::sleep(StdDuration::from_secs(4)).await;

	let late = coordinator.refresh(&sid, &presented).await.expect("Late caller should succeed.");

	assert_eq!(first, late);
	assert_eq!(provider.calls(), 1);

	tokio::time::sleep(StdDuration::from_secs(2)).await;

	assert!(!coordinator.is_pending(&sid));

	let next = coordinator.refresh(&sid, &presented).await.expect("New cycle should succeed.");

	assert_ne!(first, next);
	assert_eq!(provider.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn failure_reaches_every_joined_caller_and_does_not_poison() {
	let provider =
		Arc::new(CountingProvider::new().with_delay(StdDuration::from_millis(100)).failing());
	let coordinator = RefreshCoordinator::new(provider.clone());
	let sid = session_id("session-fail");
	let presented = TokenSecret::new("refresh-0");
	let (a, b, c) = tokio::join!(
		coordinator.refresh(&sid, &presented),
		coordinator.refresh(&sid, &presented),
		coordinator.refresh(&sid, &presented),
	);

	for result in [a, b, c] {
		assert!(matches!(result, Err(RefreshError::Rejected { .. })));
	}

	assert_eq!(provider.calls(), 1);
	assert!(!coordinator.is_pending(&sid));

	provider.set_failing(false);

	coordinator.refresh(&sid, &presented).await.expect("Retry after a failure should succeed.");

	assert_eq!(provider.calls(), 2);
	assert_eq!(coordinator.metrics().failures(), 1);
	assert_eq!(coordinator.metrics().successes(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_provider_times_out_and_is_evicted() {
	let provider = Arc::new(CountingProvider::new().with_delay(StdDuration::from_secs(60)));
	let coordinator = RefreshCoordinator::new(provider.clone()).with_timeout(Duration::seconds(1));
	let sid = session_id("session-slow");
	let err = coordinator
		.refresh(&sid, &TokenSecret::new("refresh-0"))
		.await
		.expect_err("Refresh should time out.");

	assert!(matches!(err, RefreshError::TimedOut { after } if after == Duration::seconds(1)));
	assert_eq!(coordinator.pending_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn zero_timeout_waits_for_the_provider() {
	let provider = Arc::new(CountingProvider::new().with_delay(StdDuration::from_secs(60)));
	let coordinator = RefreshCoordinator::new(provider.clone()).with_timeout(Duration::ZERO);

	coordinator
		.refresh(&session_id("session-patient"), &TokenSecret::new("refresh-0"))
		.await
		.expect("Unbounded refresh should complete.");

	assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn refresh_or_relogin_stores_rotated_tokens() {
	let provider = Arc::new(CountingProvider::new());
	let coordinator = RefreshCoordinator::new(provider.clone());
	let redirect = LoginRedirect::new(login_url(), "returnTo", "/assets");
	let mut session = Session::new();

	session.set_tokens(token_pair("stale", Duration::seconds(-30)));

	let pair = coordinator
		.refresh_or_relogin(&mut session, &redirect)
		.await
		.expect("Refresh should succeed.");

	assert_eq!(session.tokens(), Some(&pair));
	assert!(session.session_id().is_some());
	assert_eq!(provider.presented(), vec!["refresh-stale".to_owned()]);
}

#[tokio::test]
async fn refresh_or_relogin_failure_carries_the_login_url() {
	let provider = Arc::new(CountingProvider::new().failing());
	let coordinator = RefreshCoordinator::new(provider.clone());
	let redirect = LoginRedirect::new(login_url(), "returnTo", "/sites/7?tab=tags");
	let stale = token_pair("stale", Duration::seconds(-30));
	let mut session = Session::new();

	session.set_tokens(stale.clone());

	let err = coordinator
		.refresh_or_relogin(&mut session, &redirect)
		.await
		.expect_err("Failed refresh must require re-authentication.");

	match &err {
		Error::ReauthRequired { login, source } => {
			assert_eq!(
				login.as_str(),
				"https://app.example.com/login?returnTo=%2Fsites%2F7%3Ftab%3Dtags"
			);
			assert!(matches!(source, RefreshError::Rejected { .. }));
		},
		other => panic!("Unexpected error: {other:?}."),
	}

	assert_eq!(session.tokens(), Some(&stale));
}
