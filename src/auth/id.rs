//! Strongly typed numeric identifiers carried inside token payloads.

// std
use std::{num::ParseIntError, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(i64);
		impl $name {
			/// Wraps a raw identifier value.
			pub const fn new(value: i64) -> Self {
				Self(value)
			}

			/// Returns the raw identifier value.
			pub const fn get(self) -> i64 {
				self.0
			}
		}
		impl Deref for $name {
			type Target = i64;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl From<i64> for $name {
			fn from(value: i64) -> Self {
				Self(value)
			}
		}
		impl From<$name> for i64 {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				Display::fmt(&self.0, f)
			}
		}
		impl FromStr for $name {
			type Err = ParseIntError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				s.parse().map(Self)
			}
		}
	};
}

def_id! {
	SubjectId,
	"Unique identifier of the authenticated caller (wire field `user_id`).",
	"Subject"
}
def_id! {
	RoleId,
	"Identifier of the role granted to a subject (wire field `role_id`).",
	"Role"
}
