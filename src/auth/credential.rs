//! Password credentials checked before a token is handed out.
//!
//! Passwords are bcrypt-hashed with a process-wide pepper appended. Looking records up is left to
//! the caller through [`CredentialStore`].

// std
use std::hash::BuildHasher;
// crates.io
use bcrypt::BcryptError;
// self
use crate::{
	_prelude::*,
	acl::TimeRange,
	auth::{RoleId, SubjectId, TokenClaims},
};

/// Reasons a login attempt is refused.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CredentialError {
	/// Unknown login or wrong password.
	#[error("Invalid credentials.")]
	InvalidCredentials,
	/// The stored hash could not be checked (corrupt hash, unsupported cost, ...).
	#[error("Something went wrong verifying your credentials: {reason}")]
	VerifierFailed {
		/// Underlying bcrypt failure.
		reason: String,
	},
	/// The password matched but `now` lies outside the subject's access window.
	#[error("Credentials expired or not yet valid.")]
	OutsideAccessWindow {
		/// Access window on record.
		window: TimeRange,
	},
}
impl From<BcryptError> for CredentialError {
	fn from(e: BcryptError) -> Self {
		Self::VerifierFailed { reason: e.to_string() }
	}
}

/// Stored login record of one subject.
#[derive(Clone, PartialEq)]
pub struct Credentials {
	/// Subject the record belongs to.
	pub subject_id: SubjectId,
	/// Owning account; defaults to `subject_id` in issued tokens.
	pub parent_id: Option<SubjectId>,
	/// Role embedded into issued tokens.
	pub role_id: RoleId,
	/// bcrypt hash of `password + pepper`.
	pub password_hash: String,
	/// Requests-per-second ceiling embedded into issued tokens.
	pub rate_ceiling: Option<f32>,
	/// Window during which the subject may log in; tokens never outlive its end.
	pub access: TimeRange,
}
impl Credentials {
	/// Creates a record without parent or rate ceiling.
	pub fn new(
		subject_id: SubjectId,
		role_id: RoleId,
		password_hash: impl Into<String>,
		access: TimeRange,
	) -> Self {
		Self {
			subject_id,
			parent_id: None,
			role_id,
			password_hash: password_hash.into(),
			rate_ceiling: None,
			access,
		}
	}

	/// Sets the owning account.
	pub fn with_parent(mut self, parent_id: SubjectId) -> Self {
		self.parent_id = Some(parent_id);

		self
	}

	/// Sets the requests-per-second ceiling.
	pub fn with_rate_ceiling(mut self, ceiling: Option<f32>) -> Self {
		self.rate_ceiling = ceiling;

		self
	}

	/// Claims a token minted for this record carries.
	pub fn claims(&self) -> TokenClaims {
		let claims = TokenClaims::new(self.subject_id, self.role_id)
			.with_rate_ceiling(self.rate_ceiling);

		match self.parent_id {
			Some(parent_id) => claims.with_parent(parent_id),
			None => claims,
		}
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("subject_id", &self.subject_id)
			.field("parent_id", &self.parent_id)
			.field("role_id", &self.role_id)
			.field("password_hash", &"<redacted>")
			.field("rate_ceiling", &self.rate_ceiling)
			.field("access", &self.access)
			.finish()
	}
}

/// Source of login records, typically backed by the caller's user table.
pub trait CredentialStore {
	/// Returns the record registered under `login`, if any.
	fn credentials(&self, login: &str) -> Option<Credentials>;
}
impl<S> CredentialStore for HashMap<String, Credentials, S>
where
	S: BuildHasher,
{
	fn credentials(&self, login: &str) -> Option<Credentials> {
		self.get(login).cloned()
	}
}

/// Secret appended to every password before hashing.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Pepper(String);
impl Pepper {
	/// Wraps a pepper string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}
}
impl Debug for Pepper {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Pepper").field(&"<redacted>").finish()
	}
}

/// Checks passwords against stored bcrypt hashes.
#[derive(Clone, Debug, Default)]
pub struct CredentialVerifier {
	pepper: Pepper,
}
impl CredentialVerifier {
	/// Creates a verifier appending `pepper` to every password.
	pub fn new(pepper: Pepper) -> Self {
		Self { pepper }
	}

	/// Produces a hash suitable for [`Credentials::password_hash`].
	pub fn hash(&self, password: &str, cost: u32) -> Result<String, CredentialError> {
		Ok(bcrypt::hash(self.peppered(password), cost)?)
	}

	/// Verifies `password` against the current UTC clock.
	pub fn verify(&self, credentials: &Credentials, password: &str) -> Result<(), CredentialError> {
		self.verify_at(credentials, password, OffsetDateTime::now_utc())
	}

	/// Verifies `password`, then checks that `now` lies within the record's access window.
	pub fn verify_at(
		&self,
		credentials: &Credentials,
		password: &str,
		now: OffsetDateTime,
	) -> Result<(), CredentialError> {
		if !bcrypt::verify(self.peppered(password), &credentials.password_hash)? {
			return Err(CredentialError::InvalidCredentials);
		}
		if !credentials.access.contains(now) {
			return Err(CredentialError::OutsideAccessWindow { window: credentials.access });
		}

		Ok(())
	}

	fn peppered(&self, password: &str) -> String {
		format!("{password}{}", self.pepper.0)
	}
}
