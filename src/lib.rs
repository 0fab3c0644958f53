//! LeiXing (类型)
//!
//! Static type checker for a class-based, gradually-typed language.
//!
//! The checker consumes a syntax tree (`Vec<Stmt<()>>`, serde-deserializable
//! so an external parser can hand it over as JSON) and produces the same tree
//! annotated with types plus an ordered list of diagnostics.
//!
//! # Example
//!
//! ```no_run
//! use leixing::{check_source_json, Result};
//!
//! fn main() -> Result<()> {
//!     let outcome = check_source_json("main.lx", "[]")?;
//!     for diagnostic in outcome.diagnostics.iter() {
//!         println!("{}", diagnostic.message);
//!     }
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/leixing")]
#![warn(rust_2018_idioms)]

// Public modules
pub mod frontend;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use frontend::typecheck::{check_source, check_source_json, CheckOutcome, Checker};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Checker name
pub const NAME: &str = "LeiXing (类型)";
