//! A GraphQL endpoint over HTTP.
//!
//! Requests are parsed and validated against a schema, then handed to an
//! [`Executor`]. Results are rendered as JSON, as an in-browser explorer for
//! clients preferring HTML, or streamed as `multipart/mixed` for subscriptions.

mod axum_factory;
pub mod configuration;
mod endpoint;
pub mod error;
mod executable;
pub mod graphql;
pub mod json_ext;
mod protocols;
pub mod services;
pub mod spec;
pub mod subscription;

pub use configuration::Configuration;
pub use endpoint::Endpoint;
pub use executable::main;
pub use services::ExecutionRequest;
pub use services::Executor;
