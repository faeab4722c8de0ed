//! Process-wide settings read once at startup.
//!
//! The document is JSON:
//!
//! ```json
//! {
//! 	"hmac_key": "change-me",
//! 	"pepper": "also-change-me",
//! 	"jwt_duration": 86400,
//! 	"tps": { "sample_size": 10, "sweep_interval": 60 },
//! 	"acl": [
//! 		{ "role_id": 1, "route": "users", "method": "GET",
//! 		  "from": "2025-01-01T00:00:00Z", "to": "2030-01-01T00:00:00Z" }
//! 	]
//! }
//! ```
//!
//! Durations are whole seconds. `tps` and `acl` are optional: without `tps` the rate gate is
//! disabled, without `acl` grant checks are skipped.

// std
use std::{fs, path::Path};
// self
use crate::{
	_prelude::*,
	access::AccessGuard,
	acl::{AccessControlList, AclEntry},
	auth::{CredentialVerifier, Pepper, SigningSecret, TokenService},
	gate::{RateGate, RateGateError},
};

const DEFAULT_JWT_DURATION_SECS: i64 = 86_400;

/// Rate gate section of the configuration document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TpsConfig {
	/// Call instants kept per subject (at least 3).
	pub sample_size: usize,
	/// Seconds between sweeps (at least 5).
	pub sweep_interval: i64,
}

/// Top-level configuration document.
#[derive(Clone, Debug, Deserialize)]
pub struct GateConfig {
	/// Shared HMAC signing key.
	pub hmac_key: SigningSecret,
	/// Secret appended to passwords before bcrypt hashing; empty when absent.
	#[serde(default)]
	pub pepper: Pepper,
	/// Default token validity in seconds.
	#[serde(default = "default_jwt_duration")]
	pub jwt_duration: i64,
	/// Optional rate gate settings.
	#[serde(default)]
	pub tps: Option<TpsConfig>,
	/// Optional grant table.
	#[serde(default)]
	pub acl: Option<Vec<AclEntry>>,
}
impl GateConfig {
	/// Parses and validates a JSON document.
	pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
		let deserializer = &mut serde_json::Deserializer::from_str(document);
		let config: Self = serde_path_to_error::deserialize(deserializer)?;

		config.validate()
	}

	/// Reads, parses, and validates a JSON document from disk.
	pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let document = fs::read_to_string(path)
			.map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;

		Self::from_json_str(&document)
	}

	fn validate(self) -> Result<Self, ConfigError> {
		if self.hmac_key.is_empty() {
			return Err(ConfigError::MissingSecret);
		}
		if self.jwt_duration <= 0 {
			return Err(ConfigError::NonPositiveValidity);
		}

		Ok(self)
	}

	/// Default validity applied to new tokens.
	pub fn default_validity(&self) -> Duration {
		Duration::seconds(self.jwt_duration)
	}

	/// Builds the token service for the configured key.
	pub fn token_service(&self) -> TokenService {
		TokenService::new(self.hmac_key.clone())
	}

	/// Builds the password checker for the configured pepper.
	pub fn credential_verifier(&self) -> CredentialVerifier {
		CredentialVerifier::new(self.pepper.clone())
	}

	/// Builds the rate gate, starting its sweeper when `tps` is configured.
	///
	/// Must be called from within a Tokio runtime when `tps` is present.
	pub fn rate_gate(&self) -> Result<RateGate, RateGateError> {
		match &self.tps {
			Some(tps) => RateGate::configure(tps.sample_size, Duration::seconds(tps.sweep_interval)),
			None => Ok(RateGate::disabled()),
		}
	}

	/// Builds the grant table, if one is configured.
	pub fn access_control_list(&self) -> Option<AccessControlList> {
		self.acl.as_ref().map(|entries| entries.iter().cloned().collect())
	}

	/// Wires the token service, password checker, rate gate, and grant table into a guard.
	pub fn access_guard(&self) -> Result<AccessGuard> {
		let mut guard = AccessGuard::new(self.token_service())
			.with_credentials(self.credential_verifier())
			.with_default_validity(self.default_validity())
			.with_gate(self.rate_gate()?);

		if let Some(acl) = self.access_control_list() {
			guard = guard.with_acl(acl);
		}

		Ok(guard)
	}
}

fn default_jwt_duration() -> i64 {
	DEFAULT_JWT_DURATION_SECS
}
