//! shsyntax - A streaming parser for POSIX and Bash shell scripts
//!
//! This library turns shell source into a typed AST with exact source
//! positions, for use by formatters, linters and other tooling.
//!
//! ```
//! use shsyntax::{parse_str, ParseOptions};
//!
//! let script = parse_str("echo \"a$b\" | wc -l", ParseOptions::default()).unwrap();
//! assert_eq!(script.statements.len(), 1);
//! ```

pub mod ast;
pub mod parser;

pub use ast::position::{LineIndex, Pos, Position};
pub use ast::types::*;
pub use ast::walk::{walk, NodeRef};
pub use parser::{parse, parse_str, Diagnostic, ParseError, ParseOptions, Parser};
