//! Request authorization: header contract, token verification, grants, and rate gating.
//!
//! Tokens are obtained through [`AccessGuard::login`] with HTTP basic credentials and presented
//! afterwards as `Authorization: JWT <token>`.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
// self
use crate::{
	_prelude::*,
	acl::{AccessControlList, AclError},
	auth::{
		CredentialError, CredentialStore, CredentialVerifier, IssuedToken, TokenError,
		TokenPayload, TokenService,
	},
	gate::RateGate,
	obs::{self, GateOp, OpOutcome, OpSpan},
};

/// Authorization scheme expected in front of the token.
pub const AUTH_SCHEME: &str = "JWT";
/// Authorization scheme expected on login requests.
pub const BASIC_SCHEME: &str = "Basic";

const DEFAULT_VALIDITY: Duration = Duration::days(1);

/// Reasons a request is refused.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AccessError {
	/// No authorization header was presented.
	#[error("Authorization header is missing.")]
	MissingHeader,
	/// The header does not follow the expected scheme.
	#[error("Authorization header malformed.")]
	MalformedHeader,
	/// Login credentials were refused.
	#[error(transparent)]
	Credential(#[from] CredentialError),
	/// The token failed verification.
	#[error(transparent)]
	Token(#[from] TokenError),
	/// The role lacks a usable grant.
	#[error(transparent)]
	Acl(#[from] AclError),
	/// The subject exceeded its rate ceiling.
	#[error("Rate limit exceeded; retry at {retry_at}.")]
	RateLimited {
		/// Instant before which further calls are refused.
		retry_at: OffsetDateTime,
	},
}
impl AccessError {
	/// Returns `true` when the same request may succeed later without a new token.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::RateLimited { .. })
	}

	/// Returns `true` when the client should obtain a fresh token.
	pub fn needs_new_token(&self) -> bool {
		matches!(self, Self::Token(TokenError::TokenExpired))
	}

	/// Returns `true` when the refusal stems from a server-side fault, not from the request.
	pub fn is_server_fault(&self) -> bool {
		matches!(self, Self::Credential(CredentialError::VerifierFailed { .. }))
	}
}

/// Extracts the token from an `Authorization` header value of the form `JWT <token>`.
pub fn bearer_token(header: &str) -> Result<&str, AccessError> {
	let mut parts = header.split(' ');

	match (parts.next(), parts.next(), parts.next()) {
		(Some(AUTH_SCHEME), Some(token), None) => Ok(token),
		_ => Err(AccessError::MalformedHeader),
	}
}

/// Extracts `(login, password)` from an `Authorization` header value of the form
/// `Basic base64(login:password)`.
///
/// The scheme is matched case-insensitively and the password may itself contain `:`.
pub fn basic_credentials(header: &str) -> Result<(String, String), AccessError> {
	let (scheme, encoded) = header.split_once(' ').ok_or(AccessError::MalformedHeader)?;

	if !scheme.eq_ignore_ascii_case(BASIC_SCHEME) {
		return Err(AccessError::MalformedHeader);
	}

	let decoded = STANDARD
		.decode(encoded)
		.ok()
		.and_then(|bytes| String::from_utf8(bytes).ok())
		.ok_or(AccessError::MalformedHeader)?;
	let (login, password) = decoded.split_once(':').ok_or(AccessError::MalformedHeader)?;

	Ok((login.to_owned(), password.to_owned()))
}

/// Composes token verification, optional grant checks, and rate gating for inbound requests.
#[derive(Clone, Debug)]
pub struct AccessGuard {
	/// Service verifying presented tokens.
	pub tokens: TokenService,
	/// Gate consulted when enabled.
	pub gate: RateGate,
	/// Grant table; `None` skips grant checks.
	pub acl: Option<Arc<AccessControlList>>,
	/// Password checker used by [`AccessGuard::login`].
	pub credentials: CredentialVerifier,
	/// Validity of tokens minted on login, before clamping to the access window.
	pub default_validity: Duration,
}
impl AccessGuard {
	/// Creates a guard with a disabled gate, no grant table, no pepper, and one-day tokens.
	pub fn new(tokens: TokenService) -> Self {
		Self {
			tokens,
			gate: RateGate::disabled(),
			acl: None,
			credentials: CredentialVerifier::default(),
			default_validity: DEFAULT_VALIDITY,
		}
	}

	/// Attaches a password checker.
	pub fn with_credentials(mut self, credentials: CredentialVerifier) -> Self {
		self.credentials = credentials;

		self
	}

	/// Sets the validity of tokens minted on login.
	pub fn with_default_validity(mut self, validity: Duration) -> Self {
		self.default_validity = validity;

		self
	}

	/// Attaches a rate gate.
	pub fn with_gate(mut self, gate: RateGate) -> Self {
		self.gate = gate;

		self
	}

	/// Attaches a grant table.
	pub fn with_acl(mut self, acl: impl Into<Arc<AccessControlList>>) -> Self {
		self.acl = Some(acl.into());

		self
	}

	/// Exchanges HTTP basic credentials for a token, against the current UTC clock.
	pub fn login<S>(&self, header: Option<&str>, store: &S) -> Result<IssuedToken, AccessError>
	where
		S: ?Sized + CredentialStore,
	{
		self.login_at(header, store, OffsetDateTime::now_utc())
	}

	/// Exchanges HTTP basic credentials for a token, treating `now` as the current instant.
	///
	/// The token never outlives the end of the subject's access window.
	pub fn login_at<S>(
		&self,
		header: Option<&str>,
		store: &S,
		now: OffsetDateTime,
	) -> Result<IssuedToken, AccessError>
	where
		S: ?Sized + CredentialStore,
	{
		let _span = OpSpan::new(GateOp::Login, "login").enter();
		let result = self.authenticate(header, store, now);

		obs::record_op(GateOp::Login, OpOutcome::of(&result));

		result
	}

	/// Authorizes a request against the current UTC clock.
	pub fn authorize(
		&self,
		header: Option<&str>,
		route: &str,
		method: &str,
	) -> Result<TokenPayload, AccessError> {
		self.authorize_at(header, route, method, OffsetDateTime::now_utc())
	}

	/// Authorizes a request, treating `now` as the current instant.
	///
	/// The header is checked before the token is touched, grants before the gate, so refused
	/// requests never consume rate budget.
	pub fn authorize_at(
		&self,
		header: Option<&str>,
		route: &str,
		method: &str,
		now: OffsetDateTime,
	) -> Result<TokenPayload, AccessError> {
		let _span = OpSpan::new(GateOp::Authorize, "authorize").enter();
		let result = self.evaluate(header, route, method, now);
		let outcome = match &result {
			Ok(_) => OpOutcome::Success,
			Err(AccessError::RateLimited { .. }) => OpOutcome::Rejected,
			Err(_) => OpOutcome::Failure,
		};

		obs::record_op(GateOp::Authorize, outcome);

		result
	}

	fn authenticate<S>(
		&self,
		header: Option<&str>,
		store: &S,
		now: OffsetDateTime,
	) -> Result<IssuedToken, AccessError>
	where
		S: ?Sized + CredentialStore,
	{
		let (login, password) = basic_credentials(header.ok_or(AccessError::MissingHeader)?)?;
		let credentials = store.credentials(&login).ok_or(CredentialError::InvalidCredentials)?;

		self.credentials.verify_at(&credentials, &password, now)?;

		let issued = self.tokens.issue_for_at(
			&credentials.claims(),
			self.default_validity,
			Some(credentials.access.to),
			now,
		)?;

		Ok(issued)
	}

	fn evaluate(
		&self,
		header: Option<&str>,
		route: &str,
		method: &str,
		now: OffsetDateTime,
	) -> Result<TokenPayload, AccessError> {
		let token = bearer_token(header.ok_or(AccessError::MissingHeader)?)?;
		let payload = self.tokens.verify_at(token, now)?;

		if let Some(acl) = &self.acl {
			acl.check_at(payload.role_id, route, method, now)?;
		}

		let blocked_until = if self.gate.is_enabled() {
			self.gate.admit_at(payload.subject_id, payload.rate_ceiling, now)
		} else {
			None
		};

		if let Some(retry_at) = blocked_until.filter(|until| *until > now) {
			return Err(AccessError::RateLimited { retry_at });
		}

		Ok(payload)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn bearer_token_requires_the_jwt_scheme() {
		assert_eq!(bearer_token("JWT abc.def.ghi"), Ok("abc.def.ghi"));
		assert_eq!(bearer_token("Bearer abc.def.ghi"), Err(AccessError::MalformedHeader));
		assert_eq!(bearer_token("jwt abc"), Err(AccessError::MalformedHeader));
		assert_eq!(bearer_token("JWT"), Err(AccessError::MalformedHeader));
		assert_eq!(bearer_token("JWT a b"), Err(AccessError::MalformedHeader));
		assert_eq!(bearer_token("JWT  abc"), Err(AccessError::MalformedHeader));
		assert_eq!(bearer_token("JWT "), Ok(""));
	}

	#[test]
	fn basic_credentials_decode_login_and_password() {
		assert_eq!(
			basic_credentials("Basic YW5hOmh1bnRlcjI="),
			Ok(("ana".to_owned(), "hunter2".to_owned()))
		);
		assert_eq!(
			basic_credentials("basic YW5hOmh1bjp0ZXIy"),
			Ok(("ana".to_owned(), "hun:ter2".to_owned()))
		);
		assert_eq!(basic_credentials("Basic YW5h"), Err(AccessError::MalformedHeader));
		assert_eq!(basic_credentials("Basic !!!"), Err(AccessError::MalformedHeader));
		assert_eq!(basic_credentials("JWT YW5hOmh1bnRlcjI="), Err(AccessError::MalformedHeader));
		assert_eq!(basic_credentials("Basic"), Err(AccessError::MalformedHeader));
	}

	#[test]
	fn error_classification() {
		let retry_at = OffsetDateTime::UNIX_EPOCH;

		assert!(AccessError::RateLimited { retry_at }.is_retryable());
		assert!(!AccessError::MalformedHeader.is_retryable());
		assert!(AccessError::Token(TokenError::TokenExpired).needs_new_token());
		assert!(!AccessError::Token(TokenError::TokenTampered).needs_new_token());
		assert!(
			AccessError::Credential(CredentialError::VerifierFailed { reason: "bad".into() })
				.is_server_fault()
		);
		assert!(!AccessError::Credential(CredentialError::InvalidCredentials).is_server_fault());
	}
}
