//! HTTP request handlers.
//!
//! This module contains the endpoint handlers for the file RPCs.

pub mod file;
pub mod health;
