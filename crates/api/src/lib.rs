//! HTTP surface for Omnicmd commands.
//!
//! [`to_api`] projects a command onto an [`ApiRoute`]; [`router`] mounts a set
//! of routes on an axum router and [`ApiServer`] hosts it with graceful
//! shutdown.

pub mod route;
pub mod server;

pub use route::{ApiResponse, ApiRoute, ToApiRoute, cache_control_header, to_api};
pub use server::{
    ApiServer, DEFAULT_BIND_ADDRESS, RunningApiServer, registry_router, resolve_bind_address, router, serve,
};
