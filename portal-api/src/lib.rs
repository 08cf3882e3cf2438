//! # Business Portal API Library
//!
//! Core of the portal API server: HTTP routes, middleware and the wiring of
//! the shared real-time hub.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `bootstrap`: First admin account
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Rate limiting and security headers
//! - `routes`: API route handlers

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
