//! RADIUS management console backend.
//!
//! A REST API over the FreeRADIUS SQL schema plus the console's own
//! identity, audit and CoA-queue tables.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
