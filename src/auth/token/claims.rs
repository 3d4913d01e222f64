//! Unverified access-token claim decoding and expiry checks.
//!
//! Signature verification belongs to the upstream API. The broker only reads the
//! claims segment to decide whether a token is worth presenting at all, and treats
//! anything it cannot read as already expired.

// crates.io
use base64::{
	Engine as _, alphabet,
	engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
// self
use crate::{_prelude::*, auth::TokenSecret};

/// Margin subtracted from the claimed expiry so tokens do not lapse in flight.
pub const DEFAULT_EXPIRY_BUFFER: Duration = Duration::seconds(2);

// Issuers disagree on JWT padding; accept both forms.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
	&alphabet::URL_SAFE,
	GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors raised while reading access-token claims.
#[derive(Debug, ThisError)]
pub enum TokenDecodeError {
	/// The token is not made of `header.payload.signature` segments.
	#[error("Access token must contain three dot-separated segments.")]
	Segments,
	/// The payload segment is not base64url.
	#[error("Access token payload is not valid base64url.")]
	Base64(#[from] base64::DecodeError),
	/// The payload is not a JSON claims object.
	#[error("Access token claims are invalid at `{path}`.")]
	Claims {
		/// Path of the offending field inside the claims object.
		path: String,
		/// Structured parsing failure.
		#[source]
		source: serde_json::Error,
	},
	/// The `exp` claim cannot be represented as an instant.
	#[error("Access token expiry {exp} is out of range.")]
	ExpiryOutOfRange {
		/// Raw `exp` value.
		exp: i64,
	},
}

/// Claims the broker reads from an access token.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AccessClaims {
	/// Expiry as seconds since the Unix epoch.
	pub exp: i64,
	/// Subject the token was issued to.
	#[serde(default)]
	pub sub: Option<String>,
	/// Issued-at as seconds since the Unix epoch.
	#[serde(default)]
	pub iat: Option<i64>,
	/// Permission set granted to the subject.
	#[serde(default)]
	pub permissions: Vec<String>,
}
impl AccessClaims {
	/// Decodes the claims segment of `token` without verifying its signature.
	pub fn decode(token: &TokenSecret) -> Result<Self, TokenDecodeError> {
		let mut segments = token.expose().split('.');
		let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
			(Some(_), Some(payload), Some(_), None) if !payload.is_empty() => payload,
			_ => return Err(TokenDecodeError::Segments),
		};
		let bytes = URL_SAFE_LENIENT.decode(payload)?;
		let de = &mut serde_json::Deserializer::from_slice(&bytes);

		serde_path_to_error::deserialize(de).map_err(|e| TokenDecodeError::Claims {
			path: e.path().to_string(),
			source: e.into_inner(),
		})
	}

	/// Returns the expiry instant.
	pub fn expires_at(&self) -> Result<OffsetDateTime, TokenDecodeError> {
		OffsetDateTime::from_unix_timestamp(self.exp)
			.map_err(|_| TokenDecodeError::ExpiryOutOfRange { exp: self.exp })
	}

	/// Returns `true` when the subject holds `permission`.
	pub fn has_permission(&self, permission: &str) -> bool {
		self.permissions.iter().any(|p| p == permission)
	}
}

/// Returns `true` if `token` is expired, or will be within `buffer`, at the current instant.
pub fn is_expired(token: &TokenSecret, buffer: Duration) -> bool {
	is_expired_at(token, buffer, OffsetDateTime::now_utc())
}

/// Returns `true` if `now >= exp - buffer`; undecodable tokens always count as expired.
///
/// A deadline that falls outside the representable range also counts as expired.
pub fn is_expired_at(token: &TokenSecret, buffer: Duration, now: OffsetDateTime) -> bool {
	match AccessClaims::decode(token).and_then(|claims| claims.expires_at()) {
		Ok(expires_at) =>
			expires_at.checked_sub(buffer).is_none_or(|deadline| now >= deadline),
		Err(_) => true,
	}
}
