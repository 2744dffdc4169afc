//! Output formatters for sync results.
//!
//! This module provides two output formats:
//! - Text for people, colored with yansi
//! - JSON for automation and scripting
//!
//! # Example
//!
//! ```no_run
//! use updir::compare::compare;
//! use updir::output::TextReport;
//! use updir::snapshot::Snapshot;
//!
//! let comparisons = compare(&Snapshot::new(), &Snapshot::new());
//! print!("{}", TextReport::new(&comparisons).render());
//! ```

pub mod json;
pub mod text;

pub use json::{JsonOutputError, JsonReport};
pub use text::TextReport;
