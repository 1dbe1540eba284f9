//! Parser Types and Constants
//!
//! Shared types, options, and token classification helpers used across parser
//! modules.

use crate::ast::position::{Pos, Position};
use crate::ast::types::{
    BinaryCommandOperator, CaseTerminator, GlobOperator, ParamExpOperator, RedirectionOperator,
};
use crate::parser::lexer::Token;
use serde::Deserialize;
use std::fmt;
use std::io;
use thiserror::Error;

/// Max nesting of statements and expressions, to keep recursion bounded
pub const MAX_PARSER_DEPTH: usize = 200;

/// Parser configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Reject Bash-only syntax
    pub posix: bool,
    /// Collect comments into the script node
    pub keep_comments: bool,
}

/// A message tied to a source location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub filename: String,
    pub pos: Pos,
    pub position: Position,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.filename.is_empty() {
            write!(f, "{}:", self.filename)?;
        }
        write!(f, "{}: {}", self.position, self.message)
    }
}

fn io_prefix(filename: &str) -> String {
    if filename.is_empty() {
        String::new()
    } else {
        format!("{}: ", filename)
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    /// Input is not valid UTF-8
    #[error("{0}")]
    Encoding(Diagnostic),
    /// A token could not be formed, such as an unclosed quote
    #[error("{0}")]
    Lexical(Diagnostic),
    /// Tokens do not fit the grammar
    #[error("{0}")]
    Syntax(Diagnostic),
    /// Reading the input failed
    #[error("{}{source}", io_prefix(.filename))]
    Io {
        filename: String,
        #[source]
        source: io::Error,
    },
}

impl ParseError {
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Self::Encoding(d) | Self::Lexical(d) | Self::Syntax(d) => Some(d),
            Self::Io { .. } => None,
        }
    }

    pub fn pos(&self) -> Option<Pos> {
        self.diagnostic().map(|d| d.pos)
    }

    pub fn position(&self) -> Option<Position> {
        self.diagnostic().map(|d| d.position)
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

/// Tokens that end a command or a word list
pub fn stop_token(t: Token) -> bool {
    matches!(
        t,
        Token::Eof
            | Token::Semicolon
            | Token::And
            | Token::Or
            | Token::AndAnd
            | Token::OrOr
            | Token::OrAnd
            | Token::DblSemicolon
            | Token::SemiAnd
            | Token::DblSemiAnd
            | Token::RightParen
    )
}

/// Check if a token type is a redirection token
pub fn is_redirection_token(t: Token) -> bool {
    t == Token::LitRedir || redirect_operator(t).is_some()
}

pub fn redirect_operator(t: Token) -> Option<RedirectionOperator> {
    Some(match t {
        Token::RdrIn => RedirectionOperator::Less,
        Token::RdrOut => RedirectionOperator::Great,
        Token::AppOut => RedirectionOperator::DGreat,
        Token::DplOut => RedirectionOperator::GreatAnd,
        Token::DplIn => RedirectionOperator::LessAnd,
        Token::RdrInOut => RedirectionOperator::LessGreat,
        Token::ClbOut => RedirectionOperator::Clobber,
        Token::RdrAll => RedirectionOperator::AndGreat,
        Token::AppAll => RedirectionOperator::AndDGreat,
        Token::WordHdoc => RedirectionOperator::TLess,
        Token::Hdoc => RedirectionOperator::DLess,
        Token::DashHdoc => RedirectionOperator::DLessDash,
        _ => return None,
    })
}

pub fn case_terminator(t: Token) -> Option<CaseTerminator> {
    match t {
        Token::DblSemicolon => Some(CaseTerminator::DoubleSemi),
        Token::SemiAnd => Some(CaseTerminator::SemiAnd),
        Token::DblSemiAnd => Some(CaseTerminator::SemiSemiAnd),
        _ => None,
    }
}

pub fn list_operator(t: Token) -> Option<BinaryCommandOperator> {
    match t {
        Token::AndAnd => Some(BinaryCommandOperator::AndAnd),
        Token::OrOr => Some(BinaryCommandOperator::OrOr),
        Token::Or => Some(BinaryCommandOperator::Pipe),
        Token::OrAnd => Some(BinaryCommandOperator::PipeAll),
        _ => None,
    }
}

pub fn glob_operator(t: Token) -> Option<GlobOperator> {
    match t {
        Token::GlobQuest => Some(GlobOperator::ZeroOrOne),
        Token::GlobStar => Some(GlobOperator::ZeroOrMore),
        Token::GlobPlus => Some(GlobOperator::OneOrMore),
        Token::GlobAt => Some(GlobOperator::One),
        Token::GlobExcl => Some(GlobOperator::Except),
        _ => None,
    }
}

pub fn param_exp_operator(t: Token) -> Option<ParamExpOperator> {
    Some(match t {
        Token::Plus => ParamExpOperator::AlternateUnset,
        Token::ColPlus => ParamExpOperator::AlternateUnsetOrNull,
        Token::Minus => ParamExpOperator::DefaultUnset,
        Token::ColMinus => ParamExpOperator::DefaultUnsetOrNull,
        Token::Quest => ParamExpOperator::ErrorUnset,
        Token::ColQuest => ParamExpOperator::ErrorUnsetOrNull,
        Token::Assign => ParamExpOperator::AssignUnset,
        Token::ColAssign => ParamExpOperator::AssignUnsetOrNull,
        Token::Perc => ParamExpOperator::RemSmallSuffix,
        Token::DblPerc => ParamExpOperator::RemLargeSuffix,
        Token::Hash => ParamExpOperator::RemSmallPrefix,
        Token::DblHash => ParamExpOperator::RemLargePrefix,
        Token::Caret => ParamExpOperator::UpperFirst,
        Token::DblCaret => ParamExpOperator::UpperAll,
        Token::Comma => ParamExpOperator::LowerFirst,
        Token::DblComma => ParamExpOperator::LowerAll,
        _ => return None,
    })
}

/// Tokens that can start a word part
pub fn is_word_start(t: Token) -> bool {
    matches!(
        t,
        Token::Lit
            | Token::LitWord
            | Token::Dollar
            | Token::DollBrace
            | Token::DollParen
            | Token::DollDblParen
            | Token::DollBrack
            | Token::DollSglQuote
            | Token::DollDblQuote
            | Token::SglQuote
            | Token::DblQuote
            | Token::BckQuote
            | Token::CmdIn
            | Token::CmdOut
    ) || glob_operator(t).is_some()
}

/// Check if a string is a valid variable name
pub fn is_valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A valid name optionally followed by one `[subscript]`.
pub fn is_valid_lvalue(s: &str) -> bool {
    match s.find('[') {
        Some(i) => is_valid_name(&s[..i]) && s.len() > i + 1 && s.ends_with(']'),
        None => is_valid_name(s),
    }
}

pub fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Words that start a compound command in Bash mode
pub fn is_compound_start(t: Token, val: &str, bash: bool) -> bool {
    match t {
        Token::LeftParen | Token::DblLeftParen => true,
        Token::LitWord => {
            matches!(val, "{" | "if" | "while" | "until" | "for" | "case")
                || (bash && matches!(val, "[[" | "function"))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("foo_1"));
        assert!(is_valid_name("_"));
        assert!(!is_valid_name("1foo"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("a-b"));
    }

    #[test]
    fn test_valid_lvalue() {
        assert!(is_valid_lvalue("arr[1]"));
        assert!(is_valid_lvalue("arr"));
        assert!(!is_valid_lvalue("arr["));
        assert!(!is_valid_lvalue("[1]"));
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic {
            filename: "script.sh".into(),
            pos: Pos::at_offset(4),
            position: Position {
                line: 2,
                column: 1,
                offset: 4,
            },
            message: "oops".into(),
        };
        assert_eq!(d.to_string(), "script.sh:2:1: oops");
        let anon = Diagnostic {
            filename: String::new(),
            ..d
        };
        assert_eq!(ParseError::Syntax(anon).to_string(), "2:1: oops");
    }

    #[test]
    fn test_io_error_display() {
        let err = ParseError::Io {
            filename: "x.sh".into(),
            source: io::Error::new(io::ErrorKind::Other, "boom"),
        };
        assert!(err.is_io());
        assert_eq!(err.pos(), None);
        assert_eq!(err.to_string(), "x.sh: boom");
    }

    #[test]
    fn test_options_from_toml() {
        let opts: ParseOptions = toml::from_str("posix = true").unwrap();
        assert!(opts.posix);
        assert!(!opts.keep_comments);
    }

    #[test]
    fn test_token_classes() {
        assert!(is_redirection_token(Token::DashHdoc));
        assert!(is_redirection_token(Token::LitRedir));
        assert!(!is_redirection_token(Token::Or));
        assert!(stop_token(Token::DblSemiAnd));
        assert!(is_word_start(Token::GlobAt));
        assert_eq!(param_exp_operator(Token::ColMinus), Some(ParamExpOperator::DefaultUnsetOrNull));
    }
}
