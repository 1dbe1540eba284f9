//! Parser module for shell scripts
//!
//! This module contains the byte source, the lexer and the recursive-descent
//! parser that turns POSIX or Bash source into a `ScriptNode`.

pub mod source;
pub mod lexer;
pub mod types;
pub mod parser;
pub mod heredoc;
pub mod command_parser;
pub mod word_parser;
pub mod expansion_parser;
pub mod arithmetic_parser;
pub mod conditional_parser;
pub mod compound_parser;

// Re-exports
pub use conditional_parser::{test_binary_op, test_unary_op};
pub use lexer::{Lexer, QuoteMode, Token};
pub use parser::{parse, parse_str, Parser};
pub use source::{Source, SourceError};
pub use types::{Diagnostic, ParseError, ParseOptions};
