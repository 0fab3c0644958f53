//! Frontend
//!
//! - `ast`: the syntax tree, generic over its annotation (`()` before
//!   checking, `Type` after)
//! - `core`: the type model and the namespace registry
//! - `typecheck`: the checker itself

pub mod ast;
pub mod core;
pub mod typecheck;
