//! Identity providers that exchange refresh tokens for fresh token pairs.
//!
//! [`IdentityProvider`] is the seam the refresh coordinator calls through. Two implementations
//! ship with the crate: [`OAuth2IdentityProvider`] speaks the RFC 6749 `refresh_token` grant
//! via the `oauth2` crate, and [`JsonIdentityProvider`] posts `{"refreshToken": …}` to a JSON
//! endpoint. Both classify failures through a [`ProviderStrategy`] and accept any
//! [`ApiHttpClient`](crate::http::ApiHttpClient) as transport.

pub mod descriptor;
pub mod json;
pub mod oauth;
pub mod strategy;

pub use descriptor::*;
pub use json::*;
pub use oauth::*;
pub use strategy::*;

// self
use crate::{
	_prelude::*,
	auth::{TokenPair, TokenSecret},
	error::RefreshError,
};

/// Boxed future returned by [`IdentityProvider::refresh`].
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RefreshError>> + 'a + Send>>;

/// Upstream identity provider capable of rotating a refresh token.
///
/// Failures are final for the refresh cycle that observed them; the coordinator never
/// retries on its own.
pub trait IdentityProvider
where
	Self: 'static + Send + Sync,
{
	/// Exchanges `refresh_token` for a new access/refresh token pair.
	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> ProviderFuture<'a, TokenPair>;
}
impl<P> IdentityProvider for Arc<P>
where
	P: ?Sized + IdentityProvider,
{
	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> ProviderFuture<'a, TokenPair> {
		(**self).refresh(refresh_token)
	}
}
