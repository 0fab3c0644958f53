//! Core algorithm layer
//!
//! Holds the type model shared by every checking phase.

pub mod type_system;
