//! Role/route/method grants with validity windows.
//!
//! The table is populated by the caller (from configuration or its own storage) and consulted
//! with the role carried by a verified token.

// self
use crate::{_prelude::*, auth::RoleId};

/// Errors produced when a grant lookup refuses access.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AclError {
	/// No grant exists for the role, route, and method.
	#[error("Role {role_id} may not {method} {route}.")]
	NotPermitted {
		/// Role that was checked.
		role_id: RoleId,
		/// Route that was requested.
		route: String,
		/// Normalized HTTP method.
		method: String,
	},
	/// A grant exists but `now` lies outside its window.
	#[error("Role access expired or not yet valid.")]
	GrantOutsideWindow {
		/// Window attached to the matching grant.
		window: TimeRange,
	},
}

/// Key of a single grant.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Grant {
	/// Role the grant applies to.
	pub role_id: RoleId,
	/// Route identifier, matched exactly.
	pub route: String,
	/// HTTP method, stored in upper case.
	pub method: String,
}
impl Grant {
	/// Builds a grant key, normalizing the method to upper case.
	pub fn new(role_id: RoleId, route: impl Into<String>, method: impl AsRef<str>) -> Self {
		Self { role_id, route: route.into(), method: method.as_ref().to_ascii_uppercase() }
	}
}

/// Inclusive validity window of a grant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
	/// First instant the grant is usable.
	#[serde(with = "time::serde::rfc3339")]
	pub from: OffsetDateTime,
	/// Last instant the grant is usable.
	#[serde(with = "time::serde::rfc3339")]
	pub to: OffsetDateTime,
}
impl TimeRange {
	/// Creates a window spanning `[from, to]`.
	pub fn new(from: OffsetDateTime, to: OffsetDateTime) -> Self {
		Self { from, to }
	}

	/// Returns `true` if `instant` lies within the window.
	pub fn contains(&self, instant: OffsetDateTime) -> bool {
		instant >= self.from && instant <= self.to
	}
}

/// Serializable grant row, as found in configuration documents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
	/// Role the grant applies to.
	pub role_id: RoleId,
	/// Route identifier.
	pub route: String,
	/// HTTP method (any case).
	pub method: String,
	/// Validity window.
	#[serde(flatten)]
	pub window: TimeRange,
}

/// In-memory grant table.
#[derive(Clone, Debug, Default)]
pub struct AccessControlList {
	grants: HashMap<Grant, TimeRange>,
}
impl AccessControlList {
	/// Creates an empty table; every lookup is refused until grants are inserted.
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts or replaces a grant.
	pub fn insert(&mut self, grant: Grant, window: TimeRange) -> Option<TimeRange> {
		self.grants.insert(grant, window)
	}

	/// Builder-style variant of [`AccessControlList::insert`].
	pub fn with_grant(mut self, grant: Grant, window: TimeRange) -> Self {
		self.insert(grant, window);

		self
	}

	/// Returns the window attached to a grant, if any.
	pub fn lookup(&self, role_id: RoleId, route: &str, method: &str) -> Option<TimeRange> {
		self.grants.get(&Grant::new(role_id, route, method)).copied()
	}

	/// Checks that `role_id` may call `method` on `route` at `now`.
	pub fn check_at(
		&self,
		role_id: RoleId,
		route: &str,
		method: &str,
		now: OffsetDateTime,
	) -> Result<TimeRange, AclError> {
		let window = self.lookup(role_id, route, method).ok_or_else(|| AclError::NotPermitted {
			role_id,
			route: route.to_owned(),
			method: method.to_ascii_uppercase(),
		})?;

		if window.contains(now) { Ok(window) } else { Err(AclError::GrantOutsideWindow { window }) }
	}

	/// Number of grants in the table.
	pub fn len(&self) -> usize {
		self.grants.len()
	}

	/// Returns `true` when the table holds no grants.
	pub fn is_empty(&self) -> bool {
		self.grants.is_empty()
	}
}
impl FromIterator<AclEntry> for AccessControlList {
	fn from_iter<I>(entries: I) -> Self
	where
		I: IntoIterator<Item = AclEntry>,
	{
		let grants = entries
			.into_iter()
			.map(|entry| (Grant::new(entry.role_id, entry.route, entry.method), entry.window))
			.collect();

		Self { grants }
	}
}
