//! Recursive Descent Parser for Shell Scripts
//!
//! The parser pulls tokens from the lexer one at a time, telling it which
//! quoting context applies, and assembles the AST as it goes.
//!
//! Grammar (simplified):
//!   script       ::= statement*
//!   statement    ::= [!] pipeline ((&&|'||') pipeline)*  [;|&]
//!   pipeline     ::= command ((|||&) command)*
//!   command      ::= simple_command | compound_command | function_def
//!   simple_cmd   ::= (assignment|redirection)* word (word|redirection)*
//!   compound_cmd ::= if | for | while | until | case | ( | { | (( | [[
//!
//! Heredoc bodies are read when the lexer crosses the first newline after the
//! line that introduced them; see the `heredoc` module.

use crate::ast::position::Pos;
use crate::ast::types::{
    BinaryCommandNode, CommandNode, Node, ScriptNode, StatementNode, WordNode, AST,
};
use crate::parser::heredoc::{attach_heredocs, PendingHeredoc};
use crate::parser::lexer::{LexFailure, Lexer, QuoteMode, Token};
use crate::parser::types::{
    is_redirection_token, is_valid_name, is_word_start, list_operator, stop_token, Diagnostic,
    ParseError, ParseOptions, MAX_PARSER_DEPTH,
};
use std::collections::HashMap;
use std::io::Read;

pub(crate) type ParseResult<T> = Result<T, ParseError>;

/// Quote mode and heredoc boundary saved while parsing a nested construct
pub(crate) type Saved = (QuoteMode, usize);

/// Parse a script from any reader.
///
/// `name` is only used to label diagnostics.
pub fn parse<R: Read>(
    reader: R,
    name: &str,
    options: ParseOptions,
) -> Result<ScriptNode, ParseError> {
    Parser::new(reader, name, options).parse_script()
}

/// Parse a script held in memory.
pub fn parse_str(src: &str, options: ParseOptions) -> Result<ScriptNode, ParseError> {
    parse(src.as_bytes(), "", options)
}

/// Main parser struct
pub struct Parser<R> {
    pub(crate) lx: Lexer<R>,
    name: String,
    /// Quoting context the next token is lexed in
    pub(crate) quote: QuoteMode,
    pub(crate) bash: bool,
    /// Heredocs whose bodies have not been read yet, in source order
    pub(crate) heredocs: Vec<PendingHeredoc>,
    /// Heredocs below this index belong to an enclosing construct
    pub(crate) buried_hdocs: usize,
    /// Bodies read so far, keyed by the position of their `<<` operator
    pub(crate) hdoc_bodies: HashMap<Pos, WordNode>,
    depth: usize,
}

impl<R: Read> Parser<R> {
    pub fn new(reader: R, name: &str, options: ParseOptions) -> Self {
        let bash = !options.posix;
        Parser {
            lx: Lexer::new(reader, bash, options.keep_comments),
            name: name.to_string(),
            quote: QuoteMode::NoState,
            bash,
            heredocs: Vec::new(),
            buried_hdocs: 0,
            hdoc_bodies: HashMap::new(),
            depth: 0,
        }
    }

    /// Parse the whole input into a script node
    pub fn parse_script(mut self) -> Result<ScriptNode, ParseError> {
        match self.script() {
            Ok(statements) => Ok(ScriptNode {
                name: std::mem::take(&mut self.name),
                statements,
                comments: self.lx.take_comments(),
                lines: self.lx.take_lines(),
            }),
            // A failure in the lexer explains whatever went wrong after it.
            Err(err) => Err(self.lexer_failure().unwrap_or(err)),
        }
    }

    fn script(&mut self) -> ParseResult<Vec<StatementNode>> {
        self.next()?;
        let mut finalized = 0;
        let mut stmts = self.stmts(&[], |p, stmts| {
            if p.heredocs.is_empty() && !p.hdoc_bodies.is_empty() {
                attach_heredocs(&mut stmts[finalized..], &mut p.hdoc_bodies);
                finalized = stmts.len();
            }
        })?;
        if self.lx.tok != Token::Eof {
            return Err(self.invalid_stmt_start());
        }
        if !self.hdoc_bodies.is_empty() {
            attach_heredocs(&mut stmts, &mut self.hdoc_bodies);
        }
        Ok(stmts)
    }

    // ===========================================================================
    // TOKEN STREAM
    // ===========================================================================

    /// Advance to the next token, reading any heredoc bodies that became due.
    pub(crate) fn next(&mut self) -> ParseResult<()> {
        let mut due = self.lx.next(self.quote, self.hdocs_due());
        while due {
            self.do_heredocs()?;
            self.lx.spaced = true;
            self.lx.new_line = true;
            due = self.lx.lex(self.quote, self.hdocs_due());
        }
        match self.lexer_failure() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn hdocs_due(&self) -> bool {
        self.heredocs.len() > self.buried_hdocs
    }

    fn lexer_failure(&mut self) -> Option<ParseError> {
        let (pos, failure) = self.lx.take_failure()?;
        Some(match failure {
            LexFailure::Encoding => ParseError::Encoding(self.diag(pos, "invalid UTF-8 encoding")),
            LexFailure::Io(source) => ParseError::Io {
                filename: self.name.clone(),
                source,
            },
        })
    }

    /// Enter a construct with its own quoting; heredocs queued inside it are
    /// read at its first newline rather than the enclosing line's.
    pub(crate) fn pre_nested(&mut self, quote: QuoteMode) -> Saved {
        let saved = (self.quote, self.buried_hdocs);
        self.buried_hdocs = self.heredocs.len();
        self.quote = quote;
        saved
    }

    pub(crate) fn post_nested(&mut self, saved: Saved) {
        (self.quote, self.buried_hdocs) = saved;
    }

    /// Run `f` one nesting level deeper, failing past the depth limit.
    pub(crate) fn deeper<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        if self.depth >= MAX_PARSER_DEPTH {
            return Err(self.cur_err("nesting too deep"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// The current token is the literal word `val`
    pub(crate) fn is_rsrv(&self, val: &str) -> bool {
        self.lx.tok == Token::LitWord && self.lx.val == val
    }

    /// Consume the reserved word `val` if it is next, returning its position
    pub(crate) fn got_rsrv(&mut self, val: &str) -> ParseResult<Option<Pos>> {
        if !self.is_rsrv(val) {
            return Ok(None);
        }
        let pos = self.lx.pos;
        self.next()?;
        Ok(Some(pos))
    }

    pub(crate) fn follow_rsrv(&mut self, lpos: Pos, left: &str, val: &str) -> ParseResult<Pos> {
        match self.got_rsrv(val)? {
            Some(pos) => Ok(pos),
            None => Err(self.follow_err(lpos, left, &format!("{:?}", val))),
        }
    }

    /// Consume the closing keyword of a compound command
    pub(crate) fn stmt_end(&mut self, start_pos: Pos, start: &str, end: &str) -> ParseResult<Pos> {
        match self.got_rsrv(end)? {
            Some(pos) => Ok(pos),
            None => Err(self.pos_err(
                start_pos,
                &format!("{} statement must end with {:?}", start, end),
            )),
        }
    }

    /// Statement list following a keyword such as `then` or `do`
    pub(crate) fn follow_stmts(
        &mut self,
        left: &str,
        lpos: Pos,
        stops: &[&str],
    ) -> ParseResult<Vec<StatementNode>> {
        if self.lx.tok == Token::Semicolon {
            self.next()?;
            return Ok(Vec::new());
        }
        let new_line = self.lx.new_line;
        let stmts = self.stmt_list(stops)?;
        if stmts.is_empty() && !new_line {
            return Err(self.follow_err(lpos, left, "a statement list"));
        }
        Ok(stmts)
    }

    pub(crate) fn backquote_end(&self) -> bool {
        self.lx.tok == Token::BckQuote && self.quote == QuoteMode::SubCmdBckquo
    }

    pub(crate) fn take_lit(&mut self) -> crate::ast::types::LiteralPart {
        AST::literal(self.lx.pos, self.lx.end, std::mem::take(&mut self.lx.val))
    }

    // ===========================================================================
    // ERRORS
    // ===========================================================================

    fn diag(&self, pos: Pos, message: &str) -> Diagnostic {
        Diagnostic {
            filename: self.name.clone(),
            pos,
            position: self.lx.lines().resolve(pos),
            message: message.to_string(),
        }
    }

    pub(crate) fn pos_err(&self, pos: Pos, message: &str) -> ParseError {
        ParseError::Syntax(self.diag(pos, message))
    }

    pub(crate) fn lex_err(&self, pos: Pos, message: &str) -> ParseError {
        ParseError::Lexical(self.diag(pos, message))
    }

    /// Error at the current token; illegal tokens are lexical errors
    pub(crate) fn cur_err(&self, message: &str) -> ParseError {
        if self.lx.tok == Token::Illegal {
            return self.lex_err(self.lx.pos, message);
        }
        self.pos_err(self.lx.pos, message)
    }

    pub(crate) fn follow_err(&self, pos: Pos, left: &str, right: &str) -> ParseError {
        self.pos_err(pos, &format!("{} must be followed by {}", left, right))
    }

    pub(crate) fn follow_err_exp(&self, pos: Pos, left: &str) -> ParseError {
        self.follow_err(pos, left, "an expression")
    }

    pub(crate) fn matching_err(&self, lpos: Pos, left: &str, right: &str) -> ParseError {
        let msg = format!(
            "reached {} without matching {} with {}",
            self.tok_desc(),
            left,
            right
        );
        if self.lx.tok == Token::Eof {
            return self.lex_err(lpos, &msg);
        }
        self.pos_err(lpos, &msg)
    }

    pub(crate) fn lang_err(&self, pos: Pos, feature: &str) -> ParseError {
        self.pos_err(pos, &format!("{} are a bash feature", feature))
    }

    /// Printable form of the current token
    pub(crate) fn tok_desc(&self) -> String {
        match self.lx.tok {
            Token::Lit | Token::LitWord | Token::LitRedir | Token::Illegal => {
                format!("{:?}", self.lx.val)
            }
            tok => tok.to_string(),
        }
    }

    fn invalid_stmt_start(&self) -> ParseError {
        match self.lx.tok {
            Token::Semicolon | Token::And | Token::Or | Token::AndAnd | Token::OrOr => {
                self.cur_err(&format!("{} can only immediately follow a statement", self.lx.tok))
            }
            Token::RightParen => {
                self.cur_err(&format!("{} can only be used to close a subshell", self.lx.tok))
            }
            _ => self.cur_err(&format!(
                "{} is not a valid start for a statement",
                self.tok_desc()
            )),
        }
    }

    // ===========================================================================
    // STATEMENT LISTS
    // ===========================================================================

    /// Statements up to one of the `stops` reserved words or the end of the
    /// enclosing construct.
    pub(crate) fn stmt_list(&mut self, stops: &[&str]) -> ParseResult<Vec<StatementNode>> {
        self.stmts(stops, |_, _| {})
    }

    fn stmts(
        &mut self,
        stops: &[&str],
        mut on_stmt: impl FnMut(&mut Self, &mut Vec<StatementNode>),
    ) -> ParseResult<Vec<StatementNode>> {
        let mut stmts = Vec::new();
        let mut got_end = true;
        while self.lx.tok != Token::Eof {
            match self.lx.tok {
                Token::LitWord if stops.contains(&self.lx.val.as_str()) => break,
                Token::RightParen if self.quote == QuoteMode::SubCmd => break,
                Token::RightParen => return Err(self.invalid_stmt_start()),
                Token::BckQuote if self.backquote_end() => break,
                Token::DblSemicolon | Token::SemiAnd | Token::DblSemiAnd => {
                    if self.quote == QuoteMode::SwitchCase {
                        break;
                    }
                    return Err(
                        self.cur_err(&format!("{} can only be used in a case clause", self.lx.tok))
                    );
                }
                _ => {}
            }
            if !self.lx.new_line && !got_end {
                return Err(self.cur_err("statements must be separated by &, ; or a newline"));
            }
            let Some(stmt) = self.get_stmt(true, false)? else {
                return Err(self.invalid_stmt_start());
            };
            got_end = stmt.semicolon.is_valid();
            stmts.push(stmt);
            on_stmt(self, &mut stmts);
        }
        Ok(stmts)
    }

    // ===========================================================================
    // STATEMENTS AND PIPELINES
    // ===========================================================================

    /// A full statement: optional `!`, a pipeline, `&&`/`||` chains, and with
    /// `read_end` the terminating `;` or `&`.
    pub(crate) fn get_stmt(
        &mut self,
        read_end: bool,
        bin_cmd: bool,
    ) -> ParseResult<Option<StatementNode>> {
        self.deeper(|p| p.get_stmt_inner(read_end, bin_cmd))
    }

    fn get_stmt_inner(
        &mut self,
        read_end: bool,
        bin_cmd: bool,
    ) -> ParseResult<Option<StatementNode>> {
        let mut stmt = AST::statement(self.lx.pos);
        if self.is_rsrv("!") {
            stmt.negated = true;
            self.next()?;
            if stop_token(self.lx.tok) {
                return Err(self.pos_err(stmt.position, "\"!\" cannot form a statement alone"));
            }
            if self.is_rsrv("!") {
                return Err(self.pos_err(stmt.position, "cannot negate a command multiple times"));
            }
        }
        let negated = stmt.negated;
        let position = stmt.position;
        let Some(mut stmt) = self.got_stmt_pipe(stmt, false)? else {
            if negated {
                return Err(self.pos_err(position, "\"!\" cannot form a statement alone"));
            }
            return Ok(None);
        };
        while matches!(self.lx.tok, Token::AndAnd | Token::OrOr) && !self.lx.new_line {
            if bin_cmd {
                return Ok(Some(stmt));
            }
            let op_pos = self.lx.pos;
            let op_tok = self.lx.tok;
            self.next()?;
            let right = self
                .get_stmt(false, true)?
                .ok_or_else(|| self.follow_err(op_pos, op_tok.as_str(), "a statement"))?;
            stmt = self.binary(stmt, right, op_pos, op_tok);
        }
        if read_end && !self.lx.new_line {
            match self.lx.tok {
                Token::Semicolon => {
                    stmt.semicolon = self.lx.pos;
                    self.next()?;
                }
                Token::And => {
                    stmt.semicolon = self.lx.pos;
                    stmt.background = true;
                    self.next()?;
                }
                _ => {}
            }
        }
        Ok(Some(stmt))
    }

    /// Wrap two statements in a binary command. A leading `!` negates the
    /// whole pipeline, so it moves to the wrapper.
    fn binary(
        &self,
        mut left: StatementNode,
        right: StatementNode,
        op_pos: Pos,
        op_tok: Token,
    ) -> StatementNode {
        let mut stmt = AST::statement(left.position);
        if left.negated && matches!(op_tok, Token::Or | Token::OrAnd) {
            left.negated = false;
            stmt.negated = true;
            left.position = first_pos(&left);
        }
        if let Some(operator) = list_operator(op_tok) {
            stmt.command = Some(CommandNode::Binary(BinaryCommandNode {
                op_pos,
                operator,
                left: Box::new(left),
                right: Box::new(right),
            }));
        }
        stmt
    }

    /// A single command plus any `|` / `|&` continuation. With `bin_cmd` it
    /// stops before the pipe so the caller can build a left-leaning tree.
    fn got_stmt_pipe(
        &mut self,
        mut stmt: StatementNode,
        bin_cmd: bool,
    ) -> ParseResult<Option<StatementNode>> {
        match self.lx.tok {
            Token::LitWord => self.lit_word_command(&mut stmt)?,
            tok if is_redirection_token(tok) => {
                self.do_redirect(&mut stmt)?;
                self.call_expr(&mut stmt, None, false)?;
            }
            Token::BckQuote if self.backquote_end() => return Ok(None),
            tok if is_word_start(tok) => {
                if self.has_valid_ident() {
                    self.call_expr(&mut stmt, None, true)?;
                } else {
                    let word = self
                        .get_word()?
                        .ok_or_else(|| self.cur_err("expected a word"))?;
                    if self.lx.tok == Token::LeftParen {
                        return Err(self.pos_err(word.pos(), "invalid func name"));
                    }
                    self.call_expr(&mut stmt, Some(word), false)?;
                }
            }
            Token::LeftParen => stmt.command = Some(self.subshell()?),
            Token::DblLeftParen => stmt.command = Some(self.arithm_cmd()?),
            _ => return Ok(None),
        }
        while !self.lx.new_line && is_redirection_token(self.lx.tok) {
            self.do_redirect(&mut stmt)?;
        }
        while matches!(self.lx.tok, Token::Or | Token::OrAnd) && !self.lx.new_line {
            if bin_cmd {
                return Ok(Some(stmt));
            }
            let op_pos = self.lx.pos;
            let op_tok = self.lx.tok;
            self.next()?;
            let right = AST::statement(self.lx.pos);
            let right = self
                .got_stmt_pipe(right, true)?
                .ok_or_else(|| self.follow_err(op_pos, op_tok.as_str(), "a statement"))?;
            stmt = self.binary(stmt, right, op_pos, op_tok);
        }
        Ok(Some(stmt))
    }

    /// Commands introduced by a plain literal word: reserved words, function
    /// definitions, assignments and calls.
    fn lit_word_command(&mut self, stmt: &mut StatementNode) -> ParseResult<()> {
        let val = self.lx.val.clone();
        let bash = self.bash;
        let cmd = match val.as_str() {
            "{" => Some(self.block()?),
            "if" => Some(self.if_clause()?),
            "while" => Some(self.while_clause(false)?),
            "until" => Some(self.while_clause(true)?),
            "for" => Some(self.for_clause()?),
            "case" => Some(self.case_clause()?),
            "}" => return Err(self.cur_err("\"}\" can only be used to close a block")),
            "then" | "elif" | "else" => {
                return Err(self.cur_err(&format!("{:?} can only be used in an if", val)))
            }
            "fi" => return Err(self.cur_err("\"fi\" can only be used to end an if")),
            "do" => return Err(self.cur_err("\"do\" can only be used in a loop")),
            "done" => return Err(self.cur_err("\"done\" can only be used to end a loop")),
            "esac" => return Err(self.cur_err("\"esac\" can only be used to end a case")),
            "!" if !stmt.negated => {
                return Err(self.cur_err("\"!\" can only be used in full statements"))
            }
            "[[" if bash => Some(self.test_clause()?),
            "]]" if bash => return Err(self.cur_err("\"]]\" can only be used to close a test")),
            "let" if bash => Some(self.let_clause()?),
            "function" if bash => Some(self.bash_func_decl()?),
            "declare" | "local" | "export" | "readonly" | "typeset" | "nameref" if bash => {
                Some(self.decl_clause()?)
            }
            "eval" if bash => Some(self.eval_clause()?),
            "coproc" if bash => Some(self.coproc_clause()?),
            _ => None,
        };
        if let Some(cmd) = cmd {
            stmt.command = Some(cmd);
            return Ok(());
        }
        if self.has_valid_ident() {
            return self.call_expr(stmt, None, true);
        }
        let name = self.take_lit();
        self.next()?;
        if self.lx.tok == Token::LeftParen {
            self.next()?;
            if self.lx.tok != Token::RightParen {
                return Err(self.follow_err(name.value_pos, &format!("{}(", name.value), ")"));
            }
            if !self.bash && !is_valid_name(&name.value) {
                return Err(self.pos_err(name.value_pos, "invalid func name"));
            }
            self.next()?;
            let position = name.value_pos;
            stmt.command = Some(self.func_decl(position, name, false)?);
            return Ok(());
        }
        self.call_expr(stmt, Some(AST::literal_word(name)), false)
    }
}

/// Start of a statement's first element, ignoring any `!`
fn first_pos(stmt: &StatementNode) -> Pos {
    let candidates = [
        stmt.command.as_ref().map(Node::pos),
        stmt.assignments.first().map(Node::pos),
        stmt.redirections.first().map(Node::pos),
    ];
    candidates
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(stmt.position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::{BinaryCommandOperator, CommandNode};

    fn bash(src: &str) -> ScriptNode {
        parse_str(src, ParseOptions::default()).unwrap()
    }

    fn err(src: &str) -> ParseError {
        parse_str(src, ParseOptions::default()).unwrap_err()
    }

    fn args(stmt: &StatementNode) -> Vec<String> {
        match &stmt.command {
            Some(CommandNode::Simple(c)) => c
                .args
                .iter()
                .map(|w| w.lit().unwrap_or("?").to_string())
                .collect(),
            other => panic!("Expected simple command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty() {
        let script = bash("");
        assert_eq!(script.statements.len(), 0);
        let script = bash("\n\n  # only a comment\n");
        assert_eq!(script.statements.len(), 0);
    }

    #[test]
    fn test_parse_simple_command() {
        let script = bash("echo hello world");
        assert_eq!(script.statements.len(), 1);
        assert_eq!(args(&script.statements[0]), ["echo", "hello", "world"]);
        assert_eq!(script.statements[0].pos(), Pos::at_offset(0));
        assert_eq!(script.statements[0].end(), Pos::at_offset(16));
    }

    #[test]
    fn test_parse_newline_separated() {
        let script = bash("a\nb c\n\nd");
        assert_eq!(script.statements.len(), 3);
        assert_eq!(args(&script.statements[1]), ["b", "c"]);
    }

    #[test]
    fn test_parse_semicolon_and_background() {
        let script = bash("a; b & c");
        let stmts = &script.statements;
        assert_eq!(stmts.len(), 3);
        assert_eq!(stmts[0].semicolon, Pos::at_offset(1));
        assert!(!stmts[0].background);
        assert!(stmts[1].background);
        assert_eq!(stmts[1].semicolon, Pos::at_offset(5));
        assert_eq!(stmts[1].end(), Pos::at_offset(6));
    }

    #[test]
    fn test_parse_pipeline_left_assoc() {
        let script = bash("a | b | c");
        let Some(CommandNode::Binary(outer)) = &script.statements[0].command else {
            panic!("Expected binary command");
        };
        assert_eq!(outer.operator, BinaryCommandOperator::Pipe);
        assert_eq!(args(&outer.right), ["c"]);
        assert!(matches!(outer.left.command, Some(CommandNode::Binary(_))));
    }

    #[test]
    fn test_pipe_binds_tighter_than_and() {
        let script = bash("a && b | c || d");
        let Some(CommandNode::Binary(top)) = &script.statements[0].command else {
            panic!("Expected binary command");
        };
        assert_eq!(top.operator, BinaryCommandOperator::OrOr);
        let Some(CommandNode::Binary(and)) = &top.left.command else {
            panic!("Expected && on the left");
        };
        assert_eq!(and.operator, BinaryCommandOperator::AndAnd);
        let Some(CommandNode::Binary(pipe)) = &and.right.command else {
            panic!("Expected pipe on the right of &&");
        };
        assert_eq!(pipe.operator, BinaryCommandOperator::Pipe);
    }

    #[test]
    fn test_negated_pipeline() {
        let script = bash("! a | b");
        let stmt = &script.statements[0];
        assert!(stmt.negated);
        assert_eq!(stmt.pos(), Pos::at_offset(0));
        let Some(CommandNode::Binary(pipe)) = &stmt.command else {
            panic!("Expected pipe");
        };
        assert!(!pipe.left.negated);
        assert_eq!(pipe.left.pos(), Pos::at_offset(2));
    }

    #[test]
    fn test_operator_continues_on_next_line() {
        let script = bash("a &&\nb");
        assert_eq!(script.statements.len(), 1);
    }

    #[test]
    fn test_statements_need_separator() {
        let e = err("if a; then b; fi c");
        assert_eq!(
            e.diagnostic().unwrap().message,
            "statements must be separated by &, ; or a newline"
        );
    }

    #[test]
    fn test_case_terminator_outside_case() {
        let e = err("a;;");
        assert_eq!(e.diagnostic().unwrap().message, ";; can only be used in a case clause");
    }

    #[test]
    fn test_stray_keyword() {
        let e = err("fi");
        assert!(matches!(e, ParseError::Syntax(_)));
        assert_eq!(e.position().unwrap().column, 1);
        let e = err("echo a\n| b");
        assert_eq!(
            e.diagnostic().unwrap().message,
            "| can only immediately follow a statement"
        );
    }

    #[test]
    fn test_bang_alone() {
        let e = err("! ;");
        assert_eq!(e.diagnostic().unwrap().message, "\"!\" cannot form a statement alone");
    }

    #[test]
    fn test_error_has_filename_and_position() {
        let e = parse(&b"echo ok\necho )"[..], "t.sh", ParseOptions::default()).unwrap_err();
        assert_eq!(e.to_string(), "t.sh:2:6: ) can only be used to close a subshell");
    }

    #[test]
    fn test_nesting_limit() {
        let src = "(".repeat(MAX_PARSER_DEPTH + 10);
        let e = err(&src);
        assert_eq!(e.diagnostic().unwrap().message, "nesting too deep");
    }

    #[test]
    fn test_encoding_error_wins() {
        let e = parse(&b"echo \"abc\xff"[..], "", ParseOptions::default()).unwrap_err();
        assert!(matches!(e, ParseError::Encoding(_)));
        assert_eq!(e.pos(), Some(Pos::at_offset(9)));
    }

    #[test]
    fn test_script_keeps_line_index() {
        let script = bash("a\nbb\nccc");
        let third = script.statements[2].pos();
        assert_eq!(script.position(third).line, 3);
        assert_eq!(script.position(third).column, 1);
    }
}
