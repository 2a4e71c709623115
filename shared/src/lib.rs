//! Shared types and models for the Pharmacy Retail ERP
//!
//! This crate contains types shared between the backend and other
//! components of the system (reporting jobs, admin tooling).

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
