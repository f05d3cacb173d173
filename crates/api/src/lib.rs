//! Campfire API Library
//!
//! Tenant resolution and isolation for the Campfire HTTP surface.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod tenancy;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
pub use tenancy::{TenantContext, TenantDirectory};
