//! Typed client for the upstream document-management backend consumed by
//! the sync engine.

mod client;
mod error;
pub mod mock;
pub mod model;

pub use client::{AuthMode, ReqwestUpstreamClient, UpstreamClient, UpstreamClientConfig};
pub use error::UpstreamError;
pub use mock::MockUpstreamClient;
