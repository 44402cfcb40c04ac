//! # Storage Module
//!
//! Data persistence for the tuition tracker. The domain layer talks to
//! storage through the traits in [`traits`]; the [`csv`] module provides
//! the file-backed implementation used in production.

pub mod csv;
pub mod traits;

pub use traits::*;
