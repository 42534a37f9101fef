//! # Utility Modules
//!
//! Supporting utilities used throughout the crate.
//!
//! ## Components
//! - **Logging**: structured logging configuration

pub mod logging;
