//! Utilities Module
//!
//! Hash and address helpers shared across the crate.

pub mod crypto;

pub use crypto::*;
