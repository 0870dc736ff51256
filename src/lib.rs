// Public modules
pub mod auth;
pub mod backend;
pub mod chat;
pub mod client;
pub mod error;
pub mod ndjson;
pub mod observability;
pub mod render;
pub mod types;
pub mod utils;

// Re-exports
pub use auth::{AuthState, EnvCredential, IdentityProvider, StaticCredential};
pub use backend::ChatBackend;
pub use client::AgentsClient;
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use types::*;
