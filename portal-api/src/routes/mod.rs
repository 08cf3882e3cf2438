/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, login, refresh and current account
/// - `users`: User profiles and password changes
/// - `projects`: Department projects
/// - `contact`: Public contact form and its admin triage
/// - `admin`: Admin dashboard statistics and user management
/// - `socket`: WebSocket channel and hub endpoints

pub mod admin;
pub mod auth;
pub mod contact;
pub mod health;
pub mod projects;
pub mod socket;
pub mod users;
