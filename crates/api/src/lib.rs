//! HTTP API: bearer authentication, principal normalization and policy guards.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod middleware;
pub mod verifier;
