//! Domain layer for Hawthorne Guard
//!
//! Declarations are the input of a validation round, diagnostics its output.
//! Nothing here touches the file system or the syntax tree.

pub mod declarations;
pub mod diagnostics;

pub use declarations::*;
pub use diagnostics::*;
