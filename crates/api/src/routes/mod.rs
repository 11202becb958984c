//! HTTP route handlers

pub mod alerts;
pub mod session;
pub mod status;
pub mod stream;
