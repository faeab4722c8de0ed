//! Stateless HS256 bearer tokens, role/route grants, and a per-subject transaction-rate gate for
//! convention-driven REST services.
//!
//! The crate is split into small, independent pieces that an HTTP layer composes:
//!
//! - [`auth::TokenService`] issues and verifies `header.payload.signature` tokens.
//! - [`auth::CredentialVerifier`] checks bcrypt password hashes before a token is issued.
//! - [`gate::RateGate`] tracks per-subject call history and reports "blocked until" instants.
//! - [`acl::AccessControlList`] maps `(role, route, method)` grants to validity windows.
//! - [`access::AccessGuard`] wires them together: `Basic` credentials in exchange for a token,
//!   then the `JWT <token>` header contract on every request.
//!
//! # Feature Flags
//!
//! - `tracing`: `token_gate.op` spans carrying `op` and `stage` fields, plus a debug event after
//!   every sweep.
//! - `metrics`: `token_gate_op_total{op, outcome}` and `token_gate_sweep_evicted_total` counters.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod access;
pub mod acl;
pub mod auth;
pub mod config;
pub mod error;
pub mod gate;
mod obs;

mod _prelude {
	pub use std::{
		collections::{HashMap, VecDeque},
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		str::FromStr,
		sync::{Arc, Weak},
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};

	pub use crate::error::{ConfigError, Result};
}

#[cfg(test)] use color_eyre as _;
