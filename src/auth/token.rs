//! Token payload model, signing secret wrapper, wire codec, and issuing/verifying service.

pub mod payload;
pub mod secret;
pub mod service;

mod codec;
