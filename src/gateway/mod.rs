pub mod auth;
pub mod client;
pub mod types;

pub use client::GatewayClient;
pub use types::{ErrorClass, GatewayRequest, GatewayResponse};
