//! Stateless issuing and verification of HS256 bearer tokens.
//!
//! Tokens use the compact `header.payload.signature` layout. Every segment is base64 (standard
//! alphabet, no `=` padding) and the signature is HMAC-SHA256 over the first two segments joined
//! by `.`. Verification checks the signature over the segments exactly as received, then the
//! header, then the expiry, so a payload serialized slightly differently by another issuer still
//! verifies as long as it was signed with the same secret.

// crates.io
use time::format_description::well_known::Rfc3339;
// self
use crate::{
	_prelude::*,
	auth::{
		SigningSecret,
		token::{
			codec::{self, Header},
			payload::{TokenClaims, TokenPayload},
		},
	},
	obs::{self, GateOp, OpOutcome},
};

/// Errors produced while issuing or verifying tokens.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TokenError {
	/// The token does not split into exactly three `.`-separated segments.
	#[error("Token is malformed.")]
	MalformedToken,
	/// The payload segment could not be decoded or parsed.
	#[error("Token payload is invalid.")]
	InvalidPayload,
	/// The signature or header does not match what this service would have produced.
	#[error("Token has been tampered with.")]
	TokenTampered,
	/// The payload expiry lies in the past.
	#[error("Token has expired.")]
	TokenExpired,
	/// The requested validity pushes the expiry outside the representable range.
	#[error("Token expiry is out of range.")]
	ExpiryOutOfRange,
}

/// Freshly minted token together with its decoded payload.
#[derive(Clone, PartialEq)]
pub struct IssuedToken {
	/// Compact `header.payload.signature` string handed to the client.
	pub token: String,
	/// Payload embedded in the token.
	pub payload: TokenPayload,
	/// Expiry formatted as RFC 3339 (UTC).
	pub expires_at: String,
}
impl Debug for IssuedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IssuedToken")
			.field("token", &"<redacted>")
			.field("payload", &self.payload)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Issues and verifies tokens signed with a single shared secret.
///
/// The service holds no per-token state; clones share nothing but the secret.
#[derive(Clone, Debug)]
pub struct TokenService {
	secret: SigningSecret,
}
impl TokenService {
	/// Creates a service signing with the provided secret.
	pub fn new(secret: SigningSecret) -> Self {
		Self { secret }
	}

	/// Issues a token valid for `validity` from the current UTC clock.
	pub fn issue(
		&self,
		claims: &TokenClaims,
		validity: Duration,
	) -> Result<IssuedToken, TokenError> {
		self.issue_at(claims, validity, OffsetDateTime::now_utc())
	}

	/// Issues a token valid for `validity` from `now`.
	///
	/// A negative validity yields a token that is already expired.
	pub fn issue_at(
		&self,
		claims: &TokenClaims,
		validity: Duration,
		now: OffsetDateTime,
	) -> Result<IssuedToken, TokenError> {
		let result = self.mint(claims, validity, now);

		obs::record_op(GateOp::Issue, OpOutcome::of(&result));

		result
	}

	/// Issues a token that never outlives the subject's own access window.
	///
	/// When `access_until` falls before `now + default_validity` the validity is shortened to end
	/// at `access_until`.
	pub fn issue_for(
		&self,
		claims: &TokenClaims,
		default_validity: Duration,
		access_until: Option<OffsetDateTime>,
	) -> Result<IssuedToken, TokenError> {
		self.issue_for_at(claims, default_validity, access_until, OffsetDateTime::now_utc())
	}

	/// Deterministic variant of [`TokenService::issue_for`].
	pub fn issue_for_at(
		&self,
		claims: &TokenClaims,
		default_validity: Duration,
		access_until: Option<OffsetDateTime>,
		now: OffsetDateTime,
	) -> Result<IssuedToken, TokenError> {
		self.issue_at(claims, clamp_validity(default_validity, access_until, now), now)
	}

	/// Verifies a token against the current UTC clock.
	pub fn verify(&self, token: &str) -> Result<TokenPayload, TokenError> {
		self.verify_at(token, OffsetDateTime::now_utc())
	}

	/// Verifies a token, treating `now` as the current instant for the expiry check.
	pub fn verify_at(&self, token: &str, now: OffsetDateTime) -> Result<TokenPayload, TokenError> {
		let result = self.check(token, now);

		obs::record_op(GateOp::Verify, OpOutcome::of(&result));

		result
	}

	fn mint(
		&self,
		claims: &TokenClaims,
		validity: Duration,
		now: OffsetDateTime,
	) -> Result<IssuedToken, TokenError> {
		let expires = now.checked_add(validity).ok_or(TokenError::ExpiryOutOfRange)?;
		let payload = claims.clone().into_payload(now.unix_timestamp(), expires.unix_timestamp());
		let expires_at = format_expiry(payload.expires_at)?;
		let token = self.sign_payload(&payload)?;

		Ok(IssuedToken { token, payload, expires_at })
	}

	fn sign_payload(&self, payload: &TokenPayload) -> Result<String, TokenError> {
		// Only non-finite floats fail to serialize and the payload never carries one.
		let header =
			codec::encode_segment(&Header::hs256()).map_err(|_| TokenError::InvalidPayload)?;
		let body = codec::encode_segment(payload).map_err(|_| TokenError::InvalidPayload)?;
		let signing_input = format!("{header}.{body}");
		let signature = codec::sign(&self.secret, &signing_input);

		Ok(format!("{signing_input}.{signature}"))
	}

	fn check(&self, token: &str, now: OffsetDateTime) -> Result<TokenPayload, TokenError> {
		let segments = token.split('.').collect::<Vec<_>>();
		let [header, body, signature] = segments.as_slice() else {
			return Err(TokenError::MalformedToken);
		};
		let payload = codec::decode_segment(body)
			.and_then(|bytes| serde_json::from_slice::<TokenPayload>(&bytes).ok())
			.ok_or(TokenError::InvalidPayload)?;
		let signing_input = &token[..header.len() + 1 + body.len()];

		if !codec::signature_matches(&self.secret, signing_input, signature) {
			return Err(TokenError::TokenTampered);
		}

		let header_ok = codec::decode_segment(header)
			.and_then(|bytes| serde_json::from_slice::<Header>(&bytes).ok())
			.is_some_and(|decoded| decoded == Header::hs256());

		if !header_ok {
			return Err(TokenError::TokenTampered);
		}
		if payload.is_expired_at(now) {
			return Err(TokenError::TokenExpired);
		}

		Ok(payload)
	}
}

fn clamp_validity(
	default_validity: Duration,
	access_until: Option<OffsetDateTime>,
	now: OffsetDateTime,
) -> Duration {
	match access_until {
		Some(until) if until - now < default_validity => until - now,
		_ => default_validity,
	}
}

fn format_expiry(expires_at: i64) -> Result<String, TokenError> {
	OffsetDateTime::from_unix_timestamp(expires_at)
		.ok()
		.and_then(|instant| instant.format(&Rfc3339).ok())
		.ok_or(TokenError::ExpiryOutOfRange)
}
