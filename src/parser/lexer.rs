//! Lexer for Shell Scripts
//!
//! The lexer pulls runes from a [`Source`] one at a time and turns them into
//! tokens on demand. What a character means depends on the quoting context the
//! parser is in, so every call takes the active [`QuoteMode`]:
//! - Regular command context: operators, words, comments, extended globs
//! - Double quotes and heredoc bodies: literal text broken by expansions
//! - Parameter expansions: `}`, `:-`, `##`, `//` and friends
//! - Arithmetic: C-style operators with longest-match cascades
//! - Regex operands of `=~`
//!
//! The lexer keeps one rune of lookahead in `r`. Token functions consume every
//! character that belongs to the token they return.

use crate::ast::position::{LineIndex, Pos};
use crate::ast::types::{CommentNode, CondBinaryOperator, CondUnaryOperator};
use crate::parser::source::{Source, SourceError};
use std::io::{self, Read};

/// Token types for the shell lexer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Illegal,
    Eof,

    // Literals
    Lit,      // literal followed by more word parts
    LitWord,  // literal ending a word
    LitRedir, // fd number right before a redirect operator

    // Quotes
    SglQuote, // '
    DblQuote, // "
    BckQuote, // `

    // Lists and pipes
    And,    // &
    AndAnd, // &&
    OrOr,   // ||
    Or,     // |
    OrAnd,  // |&

    // Expansions
    Dollar,       // $
    DollSglQuote, // $'
    DollDblQuote, // $"
    DollBrace,    // ${
    DollBrack,    // $[
    DollParen,    // $(
    DollDblParen, // $((

    // Grouping
    LeftBrack,    // [
    LeftParen,    // (
    DblLeftParen, // ((
    RightBrace,   // }
    RightBrack,   // ]
    RightParen,   // )

    // Separators
    Semicolon,    // ;
    DblSemicolon, // ;;
    SemiAnd,      // ;&
    DblSemiAnd,   // ;;&

    // Extended globs
    GlobQuest, // ?(
    GlobStar,  // *(
    GlobPlus,  // +(
    GlobAt,    // @(
    GlobExcl,  // !(

    // Arithmetic
    ExclMark,   // !
    Tilde,      // ~
    AddAdd,     // ++
    SubSub,     // --
    Star,       // *
    Power,      // **
    Equal,      // ==
    NotEqual,   // !=
    LessEqual,  // <=
    GreatEqual, // >=
    AddAssign,  // +=
    SubAssign,  // -=
    MulAssign,  // *=
    DivAssign,  // /=
    ModAssign,  // %=
    AndAssign,  // &=
    OrAssign,   // |=
    XorAssign,  // ^=
    ShlAssign,  // <<=
    ShrAssign,  // >>=

    // Redirections; `<`, `>`, `<<` and `>>` double as arithmetic operators
    RdrOut,   // >
    AppOut,   // >>
    RdrIn,    // <
    RdrInOut, // <>
    DplIn,    // <&
    DplOut,   // >&
    ClbOut,   // >|
    Hdoc,     // <<
    DashHdoc, // <<-
    WordHdoc, // <<<
    RdrAll,   // &>
    AppAll,   // &>>
    CmdIn,    // <(
    CmdOut,   // >(

    // Parameter expansion operators
    Plus,      // +
    ColPlus,   // :+
    Minus,     // -
    ColMinus,  // :-
    Quest,     // ?
    ColQuest,  // :?
    Assign,    // =
    ColAssign, // :=
    Perc,      // %
    DblPerc,   // %%
    Hash,      // #
    DblHash,   // ##
    Caret,     // ^
    DblCaret,  // ^^
    Comma,     // ,
    DblComma,  // ,,
    At,        // @
    Slash,     // /
    DblSlash,  // //
    Colon,     // :

    // Test operators, produced by classifying literal words
    TsUnary(CondUnaryOperator),
    TsBinary(CondBinaryOperator),
}

impl Token {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Illegal => "illegal",
            Self::Eof => "EOF",
            Self::Lit | Self::LitWord | Self::LitRedir => "Lit",
            Self::SglQuote => "'",
            Self::DblQuote => "\"",
            Self::BckQuote => "`",
            Self::And => "&",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
            Self::Or => "|",
            Self::OrAnd => "|&",
            Self::Dollar => "$",
            Self::DollSglQuote => "$'",
            Self::DollDblQuote => "$\"",
            Self::DollBrace => "${",
            Self::DollBrack => "$[",
            Self::DollParen => "$(",
            Self::DollDblParen => "$((",
            Self::LeftBrack => "[",
            Self::LeftParen => "(",
            Self::DblLeftParen => "((",
            Self::RightBrace => "}",
            Self::RightBrack => "]",
            Self::RightParen => ")",
            Self::Semicolon => ";",
            Self::DblSemicolon => ";;",
            Self::SemiAnd => ";&",
            Self::DblSemiAnd => ";;&",
            Self::GlobQuest => "?(",
            Self::GlobStar => "*(",
            Self::GlobPlus => "+(",
            Self::GlobAt => "@(",
            Self::GlobExcl => "!(",
            Self::ExclMark => "!",
            Self::Tilde => "~",
            Self::AddAdd => "++",
            Self::SubSub => "--",
            Self::Star => "*",
            Self::Power => "**",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessEqual => "<=",
            Self::GreatEqual => ">=",
            Self::AddAssign => "+=",
            Self::SubAssign => "-=",
            Self::MulAssign => "*=",
            Self::DivAssign => "/=",
            Self::ModAssign => "%=",
            Self::AndAssign => "&=",
            Self::OrAssign => "|=",
            Self::XorAssign => "^=",
            Self::ShlAssign => "<<=",
            Self::ShrAssign => ">>=",
            Self::RdrOut => ">",
            Self::AppOut => ">>",
            Self::RdrIn => "<",
            Self::RdrInOut => "<>",
            Self::DplIn => "<&",
            Self::DplOut => ">&",
            Self::ClbOut => ">|",
            Self::Hdoc => "<<",
            Self::DashHdoc => "<<-",
            Self::WordHdoc => "<<<",
            Self::RdrAll => "&>",
            Self::AppAll => "&>>",
            Self::CmdIn => "<(",
            Self::CmdOut => ">(",
            Self::Plus => "+",
            Self::ColPlus => ":+",
            Self::Minus => "-",
            Self::ColMinus => ":-",
            Self::Quest => "?",
            Self::ColQuest => ":?",
            Self::Assign => "=",
            Self::ColAssign => ":=",
            Self::Perc => "%",
            Self::DblPerc => "%%",
            Self::Hash => "#",
            Self::DblHash => "##",
            Self::Caret => "^",
            Self::DblCaret => "^^",
            Self::Comma => ",",
            Self::DblComma => ",,",
            Self::At => "@",
            Self::Slash => "/",
            Self::DblSlash => "//",
            Self::Colon => ":",
            Self::TsUnary(op) => op.as_str(),
            Self::TsBinary(op) => op.as_str(),
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quoting or expansion context the parser is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteMode {
    NoState,
    SubCmd,
    SubCmdBckquo,
    DblQuotes,
    SglQuotes { dollar: bool },
    HdocWord,
    HdocBody,
    HdocBodyTabs,
    ArithmExpr,
    ArithmExprLet,
    ArithmExprCmd,
    ArithmExprBrack,
    TestExpr,
    TestRegexp,
    SwitchCase,
    ArrayElems,
    ParamName,
    ParamIndex,
    ParamOffset,
    ParamLength,
    ParamRepl,
    ParamExp,
}

impl QuoteMode {
    /// Whitespace is content, not a separator.
    pub fn keeps_spaces(self) -> bool {
        matches!(
            self,
            Self::DblQuotes
                | Self::SglQuotes { .. }
                | Self::HdocBody
                | Self::HdocBodyTabs
                | Self::ParamRepl
                | Self::ParamExp
        )
    }

    /// Command-level contexts where operators, comments and globs apply.
    pub fn is_regular(self) -> bool {
        matches!(
            self,
            Self::NoState
                | Self::SubCmd
                | Self::SubCmdBckquo
                | Self::HdocWord
                | Self::SwitchCase
                | Self::ArrayElems
                | Self::TestExpr
        )
    }

    pub fn is_arithm(self) -> bool {
        matches!(
            self,
            Self::ArithmExpr
                | Self::ArithmExprLet
                | Self::ArithmExprCmd
                | Self::ArithmExprBrack
                | Self::ParamIndex
                | Self::ParamOffset
                | Self::ParamLength
        )
    }

    pub fn is_param(self) -> bool {
        matches!(
            self,
            Self::ParamName
                | Self::ParamIndex
                | Self::ParamOffset
                | Self::ParamLength
                | Self::ParamRepl
                | Self::ParamExp
        )
    }

    /// Parameter contexts before any expansion word starts.
    pub fn is_param_reg(self) -> bool {
        matches!(
            self,
            Self::ParamName | Self::ParamIndex | Self::ParamOffset | Self::ParamLength
        )
    }

    /// Contexts closed by `]`.
    pub fn is_rbrack(self) -> bool {
        matches!(self, Self::ParamIndex | Self::ArithmExprBrack)
    }
}

fn is_reg_op(r: char) -> bool {
    matches!(
        r,
        ';' | '"' | '\'' | '(' | ')' | '$' | '|' | '&' | '>' | '<' | '`'
    )
}

fn is_param_op(r: char) -> bool {
    matches!(
        r,
        '}' | '#' | '!' | ':' | '-' | '+' | '=' | '?' | '%' | '[' | ']' | '/' | '^' | ',' | '@' | '*'
    )
}

fn is_arithm_op(r: char) -> bool {
    matches!(
        r,
        '+' | '-' | '!' | '~' | '*' | '/' | '%' | '(' | ')' | '^' | '<' | '>' | ':' | '=' | ',' | '?' | '|' | '&' | ']'
    )
}

/// Characters that can stand alone as a parameter name: `$@`, `$1`, ...
pub fn is_special_param(r: char) -> bool {
    matches!(r, '@' | '*' | '#' | '$' | '?' | '!' | '-' | '0'..='9')
}

fn is_name_char(r: char) -> bool {
    r.is_ascii_alphanumeric() || r == '_'
}

/// Why the lexer stopped for good.
#[derive(Debug)]
pub enum LexFailure {
    Io(io::Error),
    Encoding,
}

enum Skipped {
    Rune(char),
    Eof,
    Illegal,
    HdocsDue,
}

/// Heredoc body text read by [`Lexer::hdoc_raw_body`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBody {
    pub pos: Pos,
    pub end: Pos,
    pub value: String,
}

pub struct Lexer<R> {
    src: Source<R>,
    /// Lookahead rune; `None` at end of input or after a failure
    r: Option<char>,
    /// Position of `r`
    r_pos: Pos,
    /// `r` is the first rune of a line
    line_start: bool,

    pub tok: Token,
    pub val: String,
    pub pos: Pos,
    pub end: Pos,
    /// Whitespace preceded the current token
    pub spaced: bool,
    /// A newline preceded the current token
    pub new_line: bool,
    /// Offset of the first `=` in the last regular literal
    pub as_pos: Option<usize>,

    hdoc_stop: Option<String>,
    comments: Vec<CommentNode>,
    keep_comments: bool,
    bash: bool,
    failure: Option<(Pos, LexFailure)>,
}

impl<R: Read> Lexer<R> {
    pub fn new(reader: R, bash: bool, keep_comments: bool) -> Self {
        let mut lx = Self {
            src: Source::new(reader),
            r: None,
            r_pos: Pos::at_offset(0),
            line_start: true,
            tok: Token::Illegal,
            val: String::new(),
            pos: Pos::INVALID,
            end: Pos::INVALID,
            spaced: false,
            new_line: false,
            as_pos: None,
            hdoc_stop: None,
            comments: Vec::new(),
            keep_comments,
            bash,
            failure: None,
        };
        lx.rune();
        lx.line_start = true;
        lx
    }

    // =========================================================================
    // Rune level
    // =========================================================================

    /// Advances to the next rune and returns it.
    fn rune(&mut self) -> Option<char> {
        self.line_start = self.r == Some('\n');
        if self.failure.is_some() {
            self.r = None;
            return None;
        }
        self.r_pos = Pos::at_offset(self.src.offset());
        match self.src.next_rune() {
            Ok(r) => self.r = r,
            Err(e) => {
                self.fail_source(e);
                self.r = None;
            }
        }
        self.r
    }

    fn peek(&mut self, b: u8) -> bool {
        match self.src.peek_byte(b) {
            Ok(found) => found,
            Err(e) => {
                self.fail_source(e);
                false
            }
        }
    }

    fn fail_source(&mut self, err: SourceError) {
        if self.failure.is_some() {
            return;
        }
        self.failure = Some(match err {
            SourceError::Encoding { offset } => (Pos::at_offset(offset), LexFailure::Encoding),
            SourceError::Io(e) => (self.r_pos, LexFailure::Io(e)),
        });
    }

    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn take_failure(&mut self) -> Option<(Pos, LexFailure)> {
        self.failure.take()
    }

    /// The lookahead rune, for parser-driven scanning.
    pub fn cur_rune(&self) -> Option<char> {
        self.r
    }

    pub fn cur_pos(&self) -> Pos {
        self.r_pos
    }

    /// Consumes the lookahead rune.
    pub fn skip_rune(&mut self) {
        self.rune();
    }

    pub fn bash(&self) -> bool {
        self.bash
    }

    pub fn take_comments(&mut self) -> Vec<CommentNode> {
        std::mem::take(&mut self.comments)
    }

    pub fn lines(&self) -> &LineIndex {
        self.src.lines()
    }

    pub fn take_lines(&mut self) -> LineIndex {
        self.src.take_lines()
    }

    pub fn set_hdoc_stop(&mut self, stop: Option<String>) {
        self.hdoc_stop = stop;
    }

    pub fn take_hdoc_stop(&mut self) -> Option<String> {
        self.hdoc_stop.take()
    }

    /// The stop word has not been seen yet.
    pub fn hdoc_open(&self) -> bool {
        self.hdoc_stop.is_some()
    }

    // =========================================================================
    // Token level
    // =========================================================================

    /// Lexes the next token into `tok`, `val`, `pos` and `end`. Returns true
    /// when it stopped right after a newline because heredoc bodies are due;
    /// the caller reads them and then calls [`Lexer::lex`] to continue.
    pub fn next(&mut self, quote: QuoteMode, hdocs_due: bool) -> bool {
        self.spaced = false;
        self.new_line = false;
        self.lex(quote, hdocs_due)
    }

    pub fn lex(&mut self, quote: QuoteMode, hdocs_due: bool) -> bool {
        self.val.clear();
        self.as_pos = None;
        self.end = Pos::INVALID;
        loop {
            if quote.keeps_spaces() {
                self.pos = self.r_pos;
                self.tok = match self.r {
                    Some(r) => self.lex_keep_spaces(quote, r),
                    None => Token::Eof,
                };
                break;
            }
            let r = match self.skip_space(quote, hdocs_due) {
                Skipped::Rune(r) => r,
                Skipped::HdocsDue => return true,
                Skipped::Eof => {
                    self.pos = self.r_pos;
                    self.tok = Token::Eof;
                    break;
                }
                Skipped::Illegal => {
                    self.pos = self.r_pos;
                    self.tok = Token::Illegal;
                    break;
                }
            };
            self.pos = self.r_pos;
            if quote.is_regular() && r == '#' {
                self.comment();
                continue;
            }
            self.tok = self.dispatch(quote, r);
            break;
        }
        if !self.end.is_valid() {
            self.end = self.r_pos;
        }
        false
    }

    fn skip_space(&mut self, quote: QuoteMode, hdocs_due: bool) -> Skipped {
        loop {
            let Some(r) = self.r else {
                return Skipped::Eof;
            };
            match r {
                ' ' | '\t' | '\r' => self.spaced = true,
                '\n' => {
                    if matches!(quote, QuoteMode::ArithmExprLet | QuoteMode::HdocWord) {
                        return Skipped::Illegal;
                    }
                    self.spaced = true;
                    self.new_line = true;
                    self.rune();
                    if hdocs_due {
                        return Skipped::HdocsDue;
                    }
                    continue;
                }
                '\\' if self.peek(b'\n') => {
                    self.rune();
                }
                _ => return Skipped::Rune(r),
            }
            self.rune();
        }
    }

    fn comment(&mut self) {
        let hash = self.r_pos;
        let mut text = String::new();
        while let Some(r) = self.rune() {
            if r == '\n' {
                break;
            }
            text.push(r);
        }
        if self.keep_comments {
            self.comments.push(CommentNode { hash, text });
        }
    }

    fn dispatch(&mut self, quote: QuoteMode, r: char) -> Token {
        if quote.is_regular() {
            return match r {
                '?' | '*' | '+' | '@' | '!' if self.bash && self.peek(b'(') => {
                    self.rune();
                    self.rune();
                    match r {
                        '?' => Token::GlobQuest,
                        '*' => Token::GlobStar,
                        '+' => Token::GlobPlus,
                        '@' => Token::GlobAt,
                        _ => Token::GlobExcl,
                    }
                }
                _ if is_reg_op(r) => self.reg_token(r),
                _ => self.advance_lit_none(quote),
            };
        }
        if quote.is_arithm() && is_arithm_op(r) {
            return self.arithm_token(r);
        }
        if quote.is_param() && is_param_op(r) {
            return self.param_token(r);
        }
        if quote == QuoteMode::TestRegexp {
            return match r {
                ';' | '"' | '\'' | '$' | '&' | '>' | '<' | '`' | ')' => self.reg_token(r),
                _ => self.advance_lit_re(),
            };
        }
        if is_reg_op(r) {
            return self.reg_token(r);
        }
        self.advance_lit_other(quote)
    }

    fn lex_keep_spaces(&mut self, quote: QuoteMode, r: char) -> Token {
        match quote {
            QuoteMode::ParamRepl => match r {
                '}' => {
                    self.rune();
                    Token::RightBrace
                }
                '/' => {
                    self.rune();
                    Token::Slash
                }
                '`' | '"' | '$' | '\'' => self.reg_token(r),
                _ => self.advance_lit_other(quote),
            },
            QuoteMode::ParamExp => match r {
                '}' => {
                    self.rune();
                    Token::RightBrace
                }
                '`' | '"' | '$' | '\'' => self.reg_token(r),
                _ => self.advance_lit_other(quote),
            },
            QuoteMode::DblQuotes => match r {
                '`' | '"' | '$' => self.dq_token(r),
                _ => self.advance_lit_dquote(),
            },
            QuoteMode::HdocBody | QuoteMode::HdocBodyTabs => match r {
                _ if self.hdoc_stop.is_none() => Token::Illegal,
                '`' | '$' => self.dq_token(r),
                _ => self.advance_lit_hdoc(quote == QuoteMode::HdocBodyTabs, false),
            },
            QuoteMode::SglQuotes { dollar } => match r {
                '\'' => {
                    self.rune();
                    Token::SglQuote
                }
                _ => self.advance_lit_sgl(dollar),
            },
            _ => Token::Illegal,
        }
    }

    fn reg_token(&mut self, r: char) -> Token {
        match r {
            '\'' => {
                self.rune();
                Token::SglQuote
            }
            '"' => {
                self.rune();
                Token::DblQuote
            }
            '`' => {
                self.rune();
                Token::BckQuote
            }
            '&' => match self.rune() {
                Some('&') => {
                    self.rune();
                    Token::AndAnd
                }
                Some('>') if self.bash => {
                    if self.rune() == Some('>') {
                        self.rune();
                        return Token::AppAll;
                    }
                    Token::RdrAll
                }
                _ => Token::And,
            },
            '|' => match self.rune() {
                Some('|') => {
                    self.rune();
                    Token::OrOr
                }
                Some('&') if self.bash => {
                    self.rune();
                    Token::OrAnd
                }
                _ => Token::Or,
            },
            '$' => match self.rune() {
                Some('\'') if self.bash => {
                    self.rune();
                    Token::DollSglQuote
                }
                Some('"') if self.bash => {
                    self.rune();
                    Token::DollDblQuote
                }
                Some('{') => {
                    self.rune();
                    Token::DollBrace
                }
                Some('[') if self.bash => {
                    self.rune();
                    Token::DollBrack
                }
                Some('(') => {
                    if self.rune() == Some('(') {
                        self.rune();
                        return Token::DollDblParen;
                    }
                    Token::DollParen
                }
                _ => Token::Dollar,
            },
            '(' => {
                if self.rune() == Some('(') && self.bash {
                    self.rune();
                    return Token::DblLeftParen;
                }
                Token::LeftParen
            }
            ')' => {
                self.rune();
                Token::RightParen
            }
            ';' => match self.rune() {
                Some(';') => {
                    if self.rune() == Some('&') && self.bash {
                        self.rune();
                        return Token::DblSemiAnd;
                    }
                    Token::DblSemicolon
                }
                Some('&') if self.bash => {
                    self.rune();
                    Token::SemiAnd
                }
                _ => Token::Semicolon,
            },
            '<' => match self.rune() {
                Some('<') => match self.rune() {
                    Some('-') => {
                        self.rune();
                        Token::DashHdoc
                    }
                    Some('<') if self.bash => {
                        self.rune();
                        Token::WordHdoc
                    }
                    _ => Token::Hdoc,
                },
                Some('>') => {
                    self.rune();
                    Token::RdrInOut
                }
                Some('&') => {
                    self.rune();
                    Token::DplIn
                }
                Some('(') if self.bash => {
                    self.rune();
                    Token::CmdIn
                }
                _ => Token::RdrIn,
            },
            _ => match self.rune() {
                Some('>') => {
                    self.rune();
                    Token::AppOut
                }
                Some('&') => {
                    self.rune();
                    Token::DplOut
                }
                Some('|') => {
                    self.rune();
                    Token::ClbOut
                }
                Some('(') if self.bash => {
                    self.rune();
                    Token::CmdOut
                }
                _ => Token::RdrOut,
            },
        }
    }

    fn dq_token(&mut self, r: char) -> Token {
        match r {
            '"' => {
                self.rune();
                Token::DblQuote
            }
            '`' => {
                self.rune();
                Token::BckQuote
            }
            _ => match self.rune() {
                Some('{') => {
                    self.rune();
                    Token::DollBrace
                }
                Some('[') if self.bash => {
                    self.rune();
                    Token::DollBrack
                }
                Some('(') => {
                    if self.rune() == Some('(') {
                        self.rune();
                        return Token::DollDblParen;
                    }
                    Token::DollParen
                }
                _ => Token::Dollar,
            },
        }
    }

    fn param_token(&mut self, r: char) -> Token {
        let next = self.rune();
        match r {
            '}' => Token::RightBrace,
            ':' => {
                let tok = match next {
                    Some('+') => Token::ColPlus,
                    Some('-') => Token::ColMinus,
                    Some('?') => Token::ColQuest,
                    Some('=') => Token::ColAssign,
                    _ => return Token::Colon,
                };
                self.rune();
                tok
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '?' => Token::Quest,
            '=' => Token::Assign,
            '!' => Token::ExclMark,
            '*' => Token::Star,
            '@' => Token::At,
            '[' => Token::LeftBrack,
            ']' => Token::RightBrack,
            '%' => self.doubled(next, '%', Token::DblPerc, Token::Perc),
            '#' => self.doubled(next, '#', Token::DblHash, Token::Hash),
            '/' => self.doubled(next, '/', Token::DblSlash, Token::Slash),
            '^' => self.doubled(next, '^', Token::DblCaret, Token::Caret),
            _ => self.doubled(next, ',', Token::DblComma, Token::Comma),
        }
    }

    fn doubled(&mut self, next: Option<char>, want: char, double: Token, single: Token) -> Token {
        if next == Some(want) {
            self.rune();
            return double;
        }
        single
    }

    fn arithm_token(&mut self, r: char) -> Token {
        let next = self.rune();
        match r {
            '!' => self.doubled(next, '=', Token::NotEqual, Token::ExclMark),
            '=' => self.doubled(next, '=', Token::Equal, Token::Assign),
            '~' => Token::Tilde,
            '(' => Token::LeftParen,
            ')' => Token::RightParen,
            ']' => Token::RightBrack,
            ',' => Token::Comma,
            '?' => Token::Quest,
            ':' => Token::Colon,
            '&' => match next {
                Some('&') => self.take(Token::AndAnd),
                Some('=') => self.take(Token::AndAssign),
                _ => Token::And,
            },
            '|' => match next {
                Some('|') => self.take(Token::OrOr),
                Some('=') => self.take(Token::OrAssign),
                _ => Token::Or,
            },
            '<' => match next {
                Some('<') => {
                    let next = self.rune();
                    self.doubled(next, '=', Token::ShlAssign, Token::Hdoc)
                }
                Some('=') => self.take(Token::LessEqual),
                _ => Token::RdrIn,
            },
            '>' => match next {
                Some('>') => {
                    let next = self.rune();
                    self.doubled(next, '=', Token::ShrAssign, Token::AppOut)
                }
                Some('=') => self.take(Token::GreatEqual),
                _ => Token::RdrOut,
            },
            '+' => match next {
                Some('+') => self.take(Token::AddAdd),
                Some('=') => self.take(Token::AddAssign),
                _ => Token::Plus,
            },
            '-' => match next {
                Some('-') => self.take(Token::SubSub),
                Some('=') => self.take(Token::SubAssign),
                _ => Token::Minus,
            },
            '*' => match next {
                Some('*') => self.take(Token::Power),
                Some('=') => self.take(Token::MulAssign),
                _ => Token::Star,
            },
            '%' => self.doubled(next, '=', Token::ModAssign, Token::Perc),
            '/' => self.doubled(next, '=', Token::DivAssign, Token::Slash),
            _ => self.doubled(next, '=', Token::XorAssign, Token::Caret),
        }
    }

    /// Consumes the lookahead as the last rune of `tok`.
    fn take(&mut self, tok: Token) -> Token {
        self.rune();
        tok
    }

    // =========================================================================
    // Literals
    // =========================================================================

    /// Copies an escape sequence into `val`; `\<newline>` is dropped. The
    /// lookahead must be the backslash.
    fn escape(&mut self) {
        if self.peek(b'\n') {
            self.rune();
            self.rune();
            return;
        }
        self.val.push('\\');
        if let Some(c) = self.rune() {
            self.val.push(c);
            self.rune();
        }
    }

    fn advance_lit_none(&mut self, quote: QuoteMode) -> Token {
        while let Some(r) = self.r {
            match r {
                ' ' | '\t' | '\n' | '\r' | '&' | '|' | ';' | '(' | ')' => return Token::LitWord,
                '\\' => {
                    self.escape();
                    continue;
                }
                '>' | '<' => {
                    if self.bash && self.peek(b'(') {
                        return Token::Lit;
                    }
                    if !self.val.is_empty() && self.val.bytes().all(|b| b.is_ascii_digit()) {
                        return Token::LitRedir;
                    }
                    return Token::LitWord;
                }
                '`' => {
                    if quote == QuoteMode::SubCmdBckquo {
                        return Token::LitWord;
                    }
                    return Token::Lit;
                }
                '"' | '\'' | '$' => return Token::Lit,
                '?' | '*' | '+' | '@' | '!' if self.bash && self.peek(b'(') => return Token::Lit,
                '=' if self.as_pos.is_none() => self.as_pos = Some(self.val.len()),
                _ => {}
            }
            self.val.push(r);
            self.rune();
        }
        Token::LitWord
    }

    fn advance_lit_other(&mut self, quote: QuoteMode) -> Token {
        let start = self.r_pos;
        let mut tok = Token::LitWord;
        while let Some(r) = self.r {
            match r {
                '\\' => {
                    self.escape();
                    continue;
                }
                '\'' | '"' | '`' | '$' => {
                    tok = Token::Lit;
                    break;
                }
                '}' if quote.is_param() => break,
                '/' if quote.is_arithm() || (quote.is_param() && quote != QuoteMode::ParamExp) => break,
                ']' if quote.is_rbrack() => break,
                ':' | '=' | '%' | '^' | ',' | '?' | '!' | '~' | '*'
                    if quote.is_arithm() || quote == QuoteMode::ParamName =>
                {
                    break
                }
                '#' | '@' | '[' | ']' if quote.is_param_reg() => break,
                ']' if quote.is_arithm() => break,
                '[' if quote.is_arithm() => {
                    self.subscript();
                    continue;
                }
                '+' | '-' | ' ' | '\t' | ';' | '&' | '>' | '<' | '|' | '(' | ')' | '\n' | '\r'
                    if !quote.keeps_spaces() =>
                {
                    break
                }
                _ => {}
            }
            self.val.push(r);
            self.rune();
        }
        if self.val.is_empty() && self.r_pos == start && tok == Token::LitWord {
            // The very first rune cannot start anything in this context.
            if let Some(r) = self.r {
                self.val.push(r);
                self.rune();
            }
            return Token::Illegal;
        }
        tok
    }

    /// Copies a `[...]` array subscript verbatim, nested brackets included.
    fn subscript(&mut self) {
        let mut depth = 0usize;
        while let Some(r) = self.r {
            self.val.push(r);
            self.rune();
            match r {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    fn advance_lit_dquote(&mut self) -> Token {
        while let Some(r) = self.r {
            match r {
                '"' => return Token::LitWord,
                '`' | '$' => return Token::Lit,
                '\\' => {
                    self.escape();
                    continue;
                }
                _ => {}
            }
            self.val.push(r);
            self.rune();
        }
        Token::LitWord
    }

    fn advance_lit_sgl(&mut self, dollar: bool) -> Token {
        while let Some(r) = self.r {
            match r {
                '\'' => break,
                '\\' if dollar => {
                    self.val.push('\\');
                    if let Some(c) = self.rune() {
                        self.val.push(c);
                        self.rune();
                    }
                    continue;
                }
                _ => {}
            }
            self.val.push(r);
            self.rune();
        }
        Token::Lit
    }

    fn advance_lit_re(&mut self) -> Token {
        let mut depth = 0usize;
        while let Some(r) = self.r {
            match r {
                '(' => depth += 1,
                ')' if depth == 0 => break,
                ')' => depth -= 1,
                ' ' | '\t' | '\r' | '\n' | ';' | '&' | '<' | '>' if depth == 0 => break,
                '"' | '\'' | '$' | '`' => return Token::Lit,
                '\\' => {
                    self.val.push('\\');
                    if let Some(c) = self.rune() {
                        self.val.push(c);
                        self.rune();
                    }
                    continue;
                }
                _ => {}
            }
            self.val.push(r);
            self.rune();
        }
        Token::LitWord
    }

    /// Reads heredoc body text until an expansion starts (unless `raw`), the
    /// stop line is found, or input ends. A matched stop line is dropped from
    /// the value and clears the pending stop word.
    fn advance_lit_hdoc(&mut self, tabs: bool, raw: bool) -> Token {
        let stop = self.hdoc_stop.take().unwrap_or_default();
        let mut line = None;
        if self.line_start {
            if tabs {
                while self.r == Some('\t') {
                    self.rune();
                }
            }
            self.pos = self.r_pos;
            line = Some((self.val.len(), self.r_pos));
        }
        loop {
            match self.r {
                None | Some('\n') => {
                    if let Some((start, start_pos)) = line {
                        if self.val[start..] == stop {
                            self.val.truncate(start);
                            self.end = start_pos;
                            return if self.val.is_empty() {
                                Token::LitWord
                            } else {
                                Token::Lit
                            };
                        }
                    }
                    if self.r.is_none() {
                        break;
                    }
                    self.val.push('\n');
                    self.rune();
                    if tabs {
                        while self.r == Some('\t') {
                            self.rune();
                        }
                    }
                    line = Some((self.val.len(), self.r_pos));
                }
                Some('$') | Some('`') if !raw => break,
                Some('\\') if !raw => {
                    if self.peek(b'\n') {
                        // A continued line cannot be the stop line.
                        self.rune();
                        self.rune();
                        line = None;
                        continue;
                    }
                    self.val.push('\\');
                    if let Some(c) = self.rune() {
                        if c != '\n' {
                            self.val.push(c);
                            self.rune();
                        }
                    }
                }
                Some(c) => {
                    self.val.push(c);
                    self.rune();
                }
            }
        }
        self.hdoc_stop = Some(stop);
        Token::Lit
    }

    /// Reads a whole heredoc body verbatim, for quoted stop words.
    pub fn hdoc_raw_body(&mut self, tabs: bool) -> RawBody {
        self.val.clear();
        self.pos = self.r_pos;
        self.end = Pos::INVALID;
        self.advance_lit_hdoc(tabs, true);
        if !self.end.is_valid() {
            self.end = self.r_pos;
        }
        RawBody {
            pos: self.pos,
            end: self.end,
            value: std::mem::take(&mut self.val),
        }
    }

    /// Reads the name right after a `$`: one special character or an
    /// identifier. Returns `None`, consuming nothing, if neither follows.
    pub fn scan_short_param(&mut self) -> Option<String> {
        let r = self.r?;
        if is_special_param(r) {
            self.rune();
            return Some(r.to_string());
        }
        if !is_name_char(r) {
            return None;
        }
        let mut name = String::new();
        while let Some(c) = self.r.filter(|&c| is_name_char(c)) {
            name.push(c);
            self.rune();
        }
        Some(name)
    }
}
