/// Middleware modules for the API server
///
/// - `security`: security headers on every response
/// - `rate_limit`: per-client token buckets for the public auth and contact routes

pub mod rate_limit;
pub mod security;
