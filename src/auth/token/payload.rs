//! Token payload model and the claims used to mint it.

// self
use crate::{
	_prelude::*,
	auth::{RoleId, SubjectId},
};

/// Immutable payload carried by every issued token.
///
/// Field order and wire names are part of the signed format: the payload is serialized in
/// declaration order, so reordering fields changes every signature.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenPayload {
	/// Issuer label (`iss`); empty unless the claims set one.
	#[serde(rename = "iss", default)]
	pub issuer: String,
	/// Issued-at instant in seconds since the epoch (`iat`).
	#[serde(rename = "iat")]
	pub issued_at: i64,
	/// Expiry instant in seconds since the epoch (`exp`).
	#[serde(rename = "exp")]
	pub expires_at: i64,
	/// Audience label (`aud`).
	#[serde(rename = "aud", default)]
	pub audience: String,
	/// Free-form subject label (`sub`).
	#[serde(rename = "sub", default)]
	pub subject: String,
	/// Authenticated caller (`user_id`).
	#[serde(rename = "user_id")]
	pub subject_id: SubjectId,
	/// Owning account of the caller (`parent_id`); equals `subject_id` for top-level accounts.
	pub parent_id: SubjectId,
	/// Role used for grant lookups (`role_id`).
	pub role_id: RoleId,
	/// Requests-per-second ceiling (`tps`); `None` is written as `0`.
	#[serde(rename = "tps", default, with = "rate_ceiling")]
	pub rate_ceiling: Option<f32>,
}
impl TokenPayload {
	/// Returns `true` if the payload expired strictly before the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at < instant.unix_timestamp()
	}

	/// Convenience helper that checks expiry against the current UTC clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Issued-at as a UTC instant, if representable.
	pub fn issued_at_utc(&self) -> Option<OffsetDateTime> {
		OffsetDateTime::from_unix_timestamp(self.issued_at).ok()
	}

	/// Expiry as a UTC instant, if representable.
	pub fn expires_at_utc(&self) -> Option<OffsetDateTime> {
		OffsetDateTime::from_unix_timestamp(self.expires_at).ok()
	}
}

/// Identity and limits a caller wants embedded into a new token.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenClaims {
	/// Authenticated caller.
	pub subject_id: SubjectId,
	/// Owning account; defaults to `subject_id` when absent.
	pub parent_id: Option<SubjectId>,
	/// Role granted to the caller.
	pub role_id: RoleId,
	/// Optional requests-per-second ceiling.
	pub rate_ceiling: Option<f32>,
	/// Issuer label.
	pub issuer: String,
	/// Audience label.
	pub audience: String,
	/// Free-form subject label.
	pub subject: String,
}
impl TokenClaims {
	/// Creates claims for the provided subject and role.
	pub fn new(subject_id: SubjectId, role_id: RoleId) -> Self {
		Self {
			subject_id,
			parent_id: None,
			role_id,
			rate_ceiling: None,
			issuer: String::new(),
			audience: String::new(),
			subject: String::new(),
		}
	}

	/// Sets the owning account.
	pub fn with_parent(mut self, parent_id: SubjectId) -> Self {
		self.parent_id = Some(parent_id);

		self
	}

	/// Sets or clears the requests-per-second ceiling.
	pub fn with_rate_ceiling(mut self, ceiling: Option<f32>) -> Self {
		self.rate_ceiling = ceiling;

		self
	}

	/// Sets the issuer label.
	pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
		self.issuer = issuer.into();

		self
	}

	/// Sets the audience label.
	pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
		self.audience = audience.into();

		self
	}

	/// Sets the free-form subject label.
	pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
		self.subject = subject.into();

		self
	}

	/// Stamps the claims into a payload valid over `[issued_at, expires_at]`.
	pub(crate) fn into_payload(self, issued_at: i64, expires_at: i64) -> TokenPayload {
		TokenPayload {
			issuer: self.issuer,
			issued_at,
			expires_at,
			audience: self.audience,
			subject: self.subject,
			subject_id: self.subject_id,
			parent_id: self.parent_id.unwrap_or(self.subject_id),
			role_id: self.role_id,
			rate_ceiling: rate_ceiling::normalize(self.rate_ceiling),
		}
	}
}

/// Wire encoding for the `tps` field.
///
/// Integral ceilings are written without a fractional part (`10`, not `10.0`) so tokens stay
/// byte-identical to the ones existing clients already hold.
pub(crate) mod rate_ceiling {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	// Integral values below this are written as plain integers; larger ones use exponent form.
	const INTEGRAL_LIMIT: f32 = 1e21;

	/// Maps absent, non-positive, and non-finite ceilings to `None`.
	pub(crate) fn normalize(ceiling: Option<f32>) -> Option<f32> {
		ceiling.filter(|value| value.is_finite() && *value > 0.0)
	}

	pub(crate) fn serialize<S>(value: &Option<f32>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match normalize(*value) {
			None => serializer.serialize_i64(0),
			Some(v) if v.fract() == 0.0 && v < INTEGRAL_LIMIT => match shortest_integer(v) {
				Some(digits) => serializer.serialize_u128(digits),
				None => serializer.serialize_f32(v),
			},
			Some(v) => serializer.serialize_f32(v),
		}
	}

	// Shortest round-tripping digits of `value`, read back as an integer (`1e20` becomes
	// `100000000000000000000`, not the exact binary value `100000002004087734272`).
	fn shortest_integer(value: f32) -> Option<u128> {
		value.to_string().parse().ok()
	}

	pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Option<f32>, D::Error>
	where
		D: Deserializer<'de>,
	{
		Ok(normalize(Option::<f32>::deserialize(deserializer)?))
	}
}
