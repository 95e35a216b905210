//! Core verification logic: configuration, data model, failure classification
//! and the domain worker pool.

pub mod classify;
pub mod config;
pub mod error;
pub mod grouping;
pub mod models;
pub mod verifier;
