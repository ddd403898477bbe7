// Middleware module - Request authentication and shared state

pub mod auth;
pub mod session;
