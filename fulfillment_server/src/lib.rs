//! # Order fulfillment server
//! This crate hosts the HTTP front end of the fulfillment engine. It is responsible for:
//! * Receiving payment notifications from the provider, on the webhook and on the browser callback, and handing them
//!   to the engine's notification pipeline.
//! * Exposing an operator API for order placement, status changes, stock adjustments, the webhook audit log and
//!   in-app notifications.
//! * Starting the event handlers that deliver customer and operator notifications.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/payments/webhook` and `/payments/callback`: The two provider channels. Public, but every notification must
//!   carry a valid signature.
//! * `/api/...`: The operator API. Every request must carry the operator token. See [routes](routes/index.html).

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
