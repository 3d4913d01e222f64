//! Refresh against a JSON endpoint taking `{"refreshToken"}` and answering with a token pair.

// self
use crate::{
	_prelude::*,
	auth::{TokenPair, TokenSecret},
	error::RefreshError,
	http::{ApiHttpClient, HttpResponse, RequestSpec},
	provider::{
		DefaultProviderStrategy, IdentityProvider, ProviderDescriptor, ProviderErrorContext,
		ProviderFuture, ProviderStrategy,
	},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// JSON provider specialized for the crate's default reqwest transport.
pub type ReqwestJsonIdentityProvider = JsonIdentityProvider<ReqwestHttpClient>;

/// Identity provider for bespoke auth services that speak JSON instead of form-encoded OAuth.
///
/// The request body is `{"refreshToken": "…"}` merged with any strategy parameters; a `2xx`
/// answer must carry `accessToken` and may carry a rotated `refreshToken`.
pub struct JsonIdentityProvider<C>
where
	C: ?Sized + ApiHttpClient,
{
	descriptor: ProviderDescriptor,
	http_client: Arc<C>,
	strategy: Arc<dyn ProviderStrategy>,
}
impl<C> JsonIdentityProvider<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Creates a provider posting to the descriptor's token endpoint.
	pub fn with_http_client(
		descriptor: ProviderDescriptor,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		Self {
			descriptor,
			http_client: http_client.into(),
			strategy: Arc::new(DefaultProviderStrategy),
		}
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
		let mut extra = BTreeMap::new();

		self.strategy.augment_refresh_request(&mut extra);

		let payload = RefreshRequestBody { refresh_token: refresh_token.expose(), extra };
		let request = RequestSpec::post(self.descriptor.token_endpoint.clone())
			.json(&payload)
			.and_then(|spec| spec.build())
			.map_err(RefreshError::request)?;
		let response =
			self.http_client.execute(request).await.map_err(RefreshError::transport)?;

		if !response.status().is_success() {
			return Err(self.classify_failure(&response));
		}

		parse_token_pair(response.body(), refresh_token)
	}

	fn classify_failure(&self, response: &HttpResponse) -> RefreshError {
		let status = response.status().as_u16();
		let body = response.body();
		let mut ctx = ProviderErrorContext::new()
			.with_http_status(status)
			.with_body_preview(String::from_utf8_lossy(body));

		if let Ok(error) = serde_json::from_slice::<ErrorBody>(body) {
			if let Some(code) = error.error {
				ctx = ctx.with_oauth_error(code);
			}
			if let Some(description) = error.error_description.or(error.message) {
				ctx = ctx.with_error_description(description);
			}
		}

		let message = match ctx.error_description.as_deref().or(ctx.oauth_error.as_deref()) {
			Some(detail) => format!("Refresh endpoint returned HTTP {status}: {detail}"),
			None => format!("Refresh endpoint returned HTTP {status}"),
		};

		self.strategy.classify_refresh_error(&ctx).into_refresh_error(message, Some(status))
	}
}
#[cfg(feature = "reqwest")]
impl JsonIdentityProvider<ReqwestHttpClient> {
	/// Creates a provider backed by a default reqwest client.
	pub fn new(descriptor: ProviderDescriptor) -> Self {
		Self::with_http_client(descriptor, ReqwestHttpClient::default())
	}
}
impl<C> IdentityProvider for JsonIdentityProvider<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> ProviderFuture<'a, TokenPair> {
		Box::pin(self.exchange(refresh_token))
	}
}
impl<C> Debug for JsonIdentityProvider<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("JsonIdentityProvider")
			.field("descriptor", &self.descriptor)
			.finish_non_exhaustive()
	}
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequestBody<'a> {
	refresh_token: &'a str,
	#[serde(flatten)]
	extra: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponseBody {
	access_token: String,
	refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
	error: Option<String>,
	error_description: Option<String>,
	message: Option<String>,
}

fn parse_token_pair(body: &[u8], presented: &TokenSecret) -> Result<TokenPair, RefreshError> {
	let de = &mut serde_json::Deserializer::from_slice(body);
	let parsed: RefreshResponseBody = serde_path_to_error::deserialize(de).map_err(|e| {
		RefreshError::Malformed {
			reason: format!("refresh response is invalid at `{}`: {}", e.path(), e.inner()),
		}
	})?;

	if parsed.access_token.is_empty() {
		return Err(RefreshError::Malformed { reason: "access token is empty".into() });
	}

	let refresh_token = match parsed.refresh_token {
		Some(rotated) if !rotated.is_empty() => TokenSecret::new(rotated),
		_ => presented.clone(),
	};

	Ok(TokenPair { access_token: TokenSecret::new(parsed.access_token), refresh_token })
}
