//! RFC 6749 `refresh_token` grant over the `oauth2` crate.

// crates.io
use oauth2::{
	AsyncHttpClient, AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RefreshToken, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::{TokenPair, TokenSecret},
	error::{ConfigError, RefreshError, UpstreamError},
	http::{ApiHttpClient, HttpRequest, HttpResponse},
	provider::{
		ClientAuthMethod, DefaultProviderStrategy, IdentityProvider, ProviderDescriptor,
		ProviderErrorContext, ProviderFuture, ProviderStrategy,
	},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

#[cfg(feature = "reqwest")]
/// OAuth 2.0 provider specialized for the crate's default reqwest transport.
pub type ReqwestOAuth2IdentityProvider = OAuth2IdentityProvider<ReqwestHttpClient>;

/// Identity provider speaking the standard OAuth 2.0 token endpoint protocol.
///
/// When the provider does not rotate refresh tokens, the presented refresh token is carried
/// over into the returned pair.
pub struct OAuth2IdentityProvider<C>
where
	C: ?Sized + ApiHttpClient,
{
	descriptor: ProviderDescriptor,
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
	strategy: Arc<dyn ProviderStrategy>,
}
impl<C> OAuth2IdentityProvider<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Creates a provider for `descriptor` using the caller's HTTP client.
	pub fn with_http_client(
		descriptor: ProviderDescriptor,
		client_id: impl Into<String>,
		client_secret: Option<String>,
		http_client: impl Into<Arc<C>>,
	) -> Result<Self, ConfigError> {
		let token_url = TokenUrl::new(descriptor.token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let mut oauth_client =
			BasicClient::new(ClientId::new(client_id.into())).set_token_uri(token_url);

		match (descriptor.client_auth_method, client_secret) {
			(ClientAuthMethod::None, _) | (_, None) => {},
			(ClientAuthMethod::ClientSecretBasic, Some(secret)) => {
				oauth_client = oauth_client.set_client_secret(ClientSecret::new(secret));
			},
			(ClientAuthMethod::ClientSecretPost, Some(secret)) => {
				oauth_client = oauth_client
					.set_client_secret(ClientSecret::new(secret))
					.set_auth_type(AuthType::RequestBody);
			},
		}

		Ok(Self {
			descriptor,
			oauth_client,
			http_client: http_client.into(),
			strategy: Arc::new(DefaultProviderStrategy),
		})
	}

	/// Replaces the error classification strategy.
	pub fn with_strategy(mut self, strategy: Arc<dyn ProviderStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	/// Descriptor this provider was built from.
	pub fn descriptor(&self) -> &ProviderDescriptor {
		&self.descriptor
	}

	async fn exchange(&self, refresh_token: &TokenSecret) -> Result<TokenPair, RefreshError> {
		let transport = ProviderTransport::new(Arc::clone(&self.http_client));
		let presented = RefreshToken::new(refresh_token.expose().to_owned());
		let mut params = BTreeMap::new();

		self.strategy.augment_refresh_request(&mut params);

		let mut request = self.oauth_client.exchange_refresh_token(&presented);

		for (key, value) in params {
			request = request.add_extra_param(key, value);
		}

		let response = request.request_async(&transport).await.map_err(|err| {
			map_request_error(self.strategy.as_ref(), transport.last_status(), err)
		})?;
		let access_token = response.access_token().secret();

		if access_token.is_empty() {
			return Err(RefreshError::Malformed { reason: "access token is empty".into() });
		}

		let rotated = response
			.refresh_token()
			.map(|token| TokenSecret::new(token.secret().to_owned()))
			.unwrap_or_else(|| refresh_token.clone());

		Ok(TokenPair {
			access_token: TokenSecret::new(access_token.to_owned()),
			refresh_token: rotated,
		})
	}
}
#[cfg(feature = "reqwest")]
impl OAuth2IdentityProvider<ReqwestHttpClient> {
	/// Creates a provider backed by a default reqwest client.
	pub fn new(
		descriptor: ProviderDescriptor,
		client_id: impl Into<String>,
		client_secret: Option<String>,
	) -> Result<Self, ConfigError> {
		Self::with_http_client(descriptor, client_id, client_secret, ReqwestHttpClient::default())
	}
}
impl<C> IdentityProvider for OAuth2IdentityProvider<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> ProviderFuture<'a, TokenPair> {
		Box::pin(self.exchange(refresh_token))
	}
}
impl<C> Debug for OAuth2IdentityProvider<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuth2IdentityProvider")
			.field("descriptor", &self.descriptor)
			.finish_non_exhaustive()
	}
}

/// Bridges an [`ApiHttpClient`] into `oauth2` and remembers the last response status for error
/// classification.
struct ProviderTransport<C>
where
	C: ?Sized,
{
	http_client: Arc<C>,
	status: Arc<Mutex<Option<u16>>>,
}
impl<C> ProviderTransport<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn new(http_client: Arc<C>) -> Self {
		Self { http_client, status: Default::default() }
	}

	fn last_status(&self) -> Option<u16> {
		*self.status.lock()
	}
}
impl<'c, C> AsyncHttpClient<'c> for ProviderTransport<C>
where
	C: ?Sized + ApiHttpClient,
{
	type Error = HttpClientError<UpstreamError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		// `oauth2` requires `Sync` futures; the spawned task's handle is.
		let pending = tokio::spawn(self.http_client.execute(request));
		let status = Arc::clone(&self.status);

		Box::pin(async move {
			let response = pending
				.await
				.unwrap_or_else(|e| Err(UpstreamError::Aborted { message: e.to_string() }))
				.map_err(Box::new)?;

			*status.lock() = Some(response.status().as_u16());

			Ok(response)
		})
	}
}

fn map_request_error(
	strategy: &dyn ProviderStrategy,
	status: Option<u16>,
	err: BasicRequestTokenError<HttpClientError<UpstreamError>>,
) -> RefreshError {
	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(strategy, status, response),
		RequestTokenError::Request(error) => map_transport_error(error),
		RequestTokenError::Parse(error, body) => match status {
			Some(code) if code != 200 => {
				let ctx = ProviderErrorContext::new()
					.with_http_status(code)
					.with_body_preview(String::from_utf8_lossy(&body));

				strategy.classify_refresh_error(&ctx).into_refresh_error(
					format!("Token endpoint returned HTTP {code}"),
					Some(code),
				)
			},
			_ => RefreshError::Malformed {
				reason: format!(
					"token response is invalid at `{}`: {}",
					error.path(),
					error.inner()
				),
			},
		},
		RequestTokenError::Other(message) => match status {
			Some(code) if code != 200 => {
				let ctx = ProviderErrorContext::new().with_http_status(code);

				strategy.classify_refresh_error(&ctx).into_refresh_error(message, Some(code))
			},
			_ => RefreshError::Malformed { reason: message },
		},
	}
}

fn map_server_response_error(
	strategy: &dyn ProviderStrategy,
	status: Option<u16>,
	response: BasicErrorResponse,
) -> RefreshError {
	let mut ctx =
		ProviderErrorContext::new().with_oauth_error(response.error().as_ref().to_string());

	if let Some(description) = response.error_description() {
		ctx = ctx.with_error_description(description.clone());
	}
	if let Some(status) = status {
		ctx = ctx.with_http_status(status);
	}

	let message = if let Some(description) = response.error_description() {
		format!("Token endpoint returned an OAuth error: {description}")
	} else {
		format!("Token endpoint returned an OAuth error: {}", response.error().as_ref())
	};

	strategy.classify_refresh_error(&ctx).into_refresh_error(message, status)
}

fn map_transport_error(err: HttpClientError<UpstreamError>) -> RefreshError {
	match err {
		HttpClientError::Reqwest(inner) => RefreshError::transport(*inner),
		HttpClientError::Http(inner) => RefreshError::request(inner),
		HttpClientError::Io(inner) => RefreshError::transport(inner),
		HttpClientError::Other(message) => RefreshError::Transient { message, status: None },
		_ => RefreshError::Transient {
			message: "HTTP client error occurred while calling the token endpoint".into(),
			status: None,
		},
	}
}
