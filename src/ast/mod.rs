//! Abstract Syntax Tree (AST) Types for POSIX and Bash shell
//!
//! This module defines the complete AST structure for shell scripts.
//! The design follows the shell grammar while being Rust-idiomatic.
//!
//! Architecture:
//!   Bytes → Source → Lexer → Parser → AST → (formatters, linters)

pub mod position;
pub mod types;
pub mod walk;
