//! Crate-level error types shared across token issuance, rate gating, access checks, and config.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Token issuance or verification failure.
	#[error(transparent)]
	Token(#[from] crate::auth::TokenError),
	/// Rate gate misconfiguration.
	#[error(transparent)]
	RateGate(#[from] crate::gate::RateGateError),
	/// Request refused by the access guard.
	#[error(transparent)]
	Access(#[from] crate::access::AccessError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}

/// Configuration loading and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Configuration document could not be read from disk.
	#[error("Failed to read configuration from {path}.")]
	Read {
		/// Path that failed to load.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Configuration document is not valid JSON for the expected shape.
	#[error("Configuration is malformed at `{path}`.")]
	Parse {
		/// Field path where parsing failed.
		path: String,
		/// Structured parsing failure.
		#[source]
		source: serde_json::Error,
	},
	/// The signing secret is missing or empty.
	#[error("Configuration must provide a non-empty `hmac_key`.")]
	MissingSecret,
	/// Token validity must be positive.
	#[error("The jwt_duration value must be positive.")]
	NonPositiveValidity,
}
impl From<serde_path_to_error::Error<serde_json::Error>> for ConfigError {
	fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		let path = e.path().to_string();

		Self::Parse { path, source: e.into_inner() }
	}
}
