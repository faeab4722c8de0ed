//! Auth-domain identifiers, password credentials, and the bearer token service.

pub mod credential;
pub mod id;
pub mod token;

pub use credential::*;
pub use id::*;
pub use token::{payload::*, secret::*, service::*};
