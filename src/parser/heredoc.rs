//! Heredoc Handling
//!
//! A `<<` redirect is built as soon as its stop word is parsed, but the body
//! lives on the lines after the current one. The parser queues a
//! [`PendingHeredoc`] per operator; once the lexer crosses the next newline the
//! queued bodies are read in order and stored by operator position. Bodies are
//! moved into their redirect nodes once the enclosing top-level statement is
//! complete.

use crate::ast::position::Pos;
use crate::ast::types::{
    ArithExpr, AssignmentNode, CommandNode, ConditionalExpressionNode, ForLoop,
    RedirectionNode, StatementNode, WordNode, WordPart, AST,
};
use crate::parser::lexer::{QuoteMode, Token};
use crate::parser::parser::{ParseResult, Parser};
use std::collections::HashMap;
use std::io::Read;

/// A heredoc whose body has not been read yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingHeredoc {
    /// Position of the `<<` or `<<-` operator
    pub op_pos: Pos,
    /// `<<-`: leading tabs are stripped from body lines
    pub tabs: bool,
    /// Any part of the stop word was quoted, so the body is not expanded
    pub quoted: bool,
    pub stop: String,
}

impl<R: Read> Parser<R> {
    /// Read the bodies of every heredoc queued at this nesting level.
    pub(crate) fn do_heredocs(&mut self) -> ParseResult<()> {
        let pending = self.heredocs.split_off(self.buried_hdocs);
        let saved = self.quote;
        // Set when this is a substitution inside another unquoted body.
        let outer_stop = self.lx.take_hdoc_stop();
        for (i, hdoc) in pending.into_iter().enumerate() {
            // The previous body stopped right before the newline ending its stop line.
            if i > 0 && self.lx.cur_rune() == Some('\n') {
                self.lx.skip_rune();
            }
            self.quote = if hdoc.tabs {
                QuoteMode::HdocBodyTabs
            } else {
                QuoteMode::HdocBody
            };
            self.lx.set_hdoc_stop(Some(hdoc.stop));
            let body = if hdoc.quoted {
                let raw = self.lx.hdoc_raw_body(hdoc.tabs);
                if raw.value.is_empty() {
                    None
                } else {
                    Some(AST::literal_word(AST::literal(raw.pos, raw.end, raw.value)))
                }
            } else {
                self.hdoc_word()?
            };
            self.lx.set_hdoc_stop(None);
            if let Some(body) = body {
                self.hdoc_bodies.insert(hdoc.op_pos, body);
            }
        }
        self.quote = saved;
        self.lx.set_hdoc_stop(outer_stop);
        Ok(())
    }

    /// Body of an unquoted heredoc: literal text and expansions.
    fn hdoc_word(&mut self) -> ParseResult<Option<WordNode>> {
        self.next()?;
        let mut parts = Vec::new();
        while !matches!(self.lx.tok, Token::Illegal | Token::Eof) {
            if matches!(self.lx.tok, Token::Lit | Token::LitWord) && self.lx.val.is_empty() {
                self.next()?;
                continue;
            }
            match self.word_part()? {
                Some(part) => parts.push(part),
                None => break,
            }
        }
        if parts.is_empty() {
            return Ok(None);
        }
        Ok(Some(AST::word(parts)))
    }
}

/// The text a heredoc body must match to end, and whether any of it was quoted.
pub(crate) fn unquote_stop(word: &WordNode) -> Result<(String, bool), String> {
    let mut stop = String::new();
    let mut quoted = false;
    for part in &word.parts {
        match part {
            WordPart::Literal(lit) => {
                let mut chars = lit.value.chars();
                while let Some(c) = chars.next() {
                    if c == '\\' {
                        quoted = true;
                        if let Some(escaped) = chars.next() {
                            stop.push(escaped);
                        }
                    } else {
                        stop.push(c);
                    }
                }
            }
            WordPart::SingleQuoted(sq) => {
                quoted = true;
                stop.push_str(&sq.value);
            }
            WordPart::DoubleQuoted(dq) => {
                quoted = true;
                for inner in &dq.parts {
                    match inner {
                        WordPart::Literal(lit) => stop.push_str(&lit.value),
                        _ => return Err(expansion_in_stop()),
                    }
                }
            }
            WordPart::ParameterExpansion(pe) if pe.short => {
                stop.push('$');
                stop.push_str(&pe.param.value);
            }
            _ => return Err(expansion_in_stop()),
        }
    }
    Ok((stop, quoted))
}

fn expansion_in_stop() -> String {
    "expansions are not supported in heredoc stop words".to_string()
}

// =============================================================================
// BODY ATTACHMENT
// =============================================================================

/// Move read bodies into the heredoc redirects found under `stmts`.
pub(crate) fn attach_heredocs(stmts: &mut [StatementNode], bodies: &mut HashMap<Pos, WordNode>) {
    for stmt in stmts {
        if bodies.is_empty() {
            return;
        }
        attach_stmt(stmt, bodies);
    }
}

fn attach_stmt(stmt: &mut StatementNode, bodies: &mut HashMap<Pos, WordNode>) {
    for assign in &mut stmt.assignments {
        attach_assign(assign, bodies);
    }
    if let Some(cmd) = &mut stmt.command {
        attach_cmd(cmd, bodies);
    }
    for redir in &mut stmt.redirections {
        attach_redirect(redir, bodies);
    }
}

fn attach_redirect(redir: &mut RedirectionNode, bodies: &mut HashMap<Pos, WordNode>) {
    attach_word(&mut redir.target, bodies);
    if redir.operator.is_heredoc() {
        if let Some(body) = bodies.remove(&redir.op_pos) {
            redir.heredoc = Some(body);
        }
    }
    // Bodies may themselves hold substitutions with heredocs.
    if let Some(body) = &mut redir.heredoc {
        attach_word(body, bodies);
    }
}

fn attach_assign(assign: &mut AssignmentNode, bodies: &mut HashMap<Pos, WordNode>) {
    if let Some(value) = &mut assign.value {
        attach_word(value, bodies);
    }
}

fn attach_cmd(cmd: &mut CommandNode, bodies: &mut HashMap<Pos, WordNode>) {
    match cmd {
        CommandNode::Simple(c) => attach_words(&mut c.args, bodies),
        CommandNode::If(c) => {
            attach_heredocs(&mut c.condition, bodies);
            attach_heredocs(&mut c.then_body, bodies);
            for elif in &mut c.elifs {
                attach_heredocs(&mut elif.condition, bodies);
                attach_heredocs(&mut elif.body, bodies);
            }
            attach_heredocs(&mut c.else_body, bodies);
        }
        CommandNode::While(c) => {
            attach_heredocs(&mut c.condition, bodies);
            attach_heredocs(&mut c.body, bodies);
        }
        CommandNode::Until(c) => {
            attach_heredocs(&mut c.condition, bodies);
            attach_heredocs(&mut c.body, bodies);
        }
        CommandNode::For(c) => {
            match &mut c.header {
                ForLoop::WordIter(w) => attach_words(&mut w.items, bodies),
                ForLoop::CStyle(cs) => {
                    for expr in [&mut cs.init, &mut cs.condition, &mut cs.post]
                        .into_iter()
                        .flatten()
                    {
                        attach_arith(expr, bodies);
                    }
                }
            }
            attach_heredocs(&mut c.body, bodies);
        }
        CommandNode::Case(c) => {
            attach_word(&mut c.word, bodies);
            for item in &mut c.items {
                attach_words(&mut item.patterns, bodies);
                attach_heredocs(&mut item.body, bodies);
            }
        }
        CommandNode::Group(c) => attach_heredocs(&mut c.body, bodies),
        CommandNode::Subshell(c) => attach_heredocs(&mut c.body, bodies),
        CommandNode::Binary(c) => {
            attach_stmt(&mut c.left, bodies);
            attach_stmt(&mut c.right, bodies);
        }
        CommandNode::FunctionDef(c) => attach_stmt(&mut c.body, bodies),
        CommandNode::Arithmetic(c) => {
            if let Some(expr) = &mut c.expression {
                attach_arith(expr, bodies);
            }
        }
        CommandNode::Conditional(c) => attach_cond(&mut c.expression, bodies),
        CommandNode::Declare(c) => {
            attach_words(&mut c.opts, bodies);
            for assign in &mut c.assignments {
                attach_assign(assign, bodies);
            }
        }
        CommandNode::Eval(c) => {
            if let Some(stmt) = &mut c.statement {
                attach_stmt(stmt, bodies);
            }
        }
        CommandNode::Let(c) => {
            for expr in &mut c.expressions {
                attach_arith(expr, bodies);
            }
        }
        CommandNode::Coproc(c) => attach_stmt(&mut c.statement, bodies),
    }
}

fn attach_words(words: &mut [WordNode], bodies: &mut HashMap<Pos, WordNode>) {
    for word in words {
        attach_word(word, bodies);
    }
}

fn attach_word(word: &mut WordNode, bodies: &mut HashMap<Pos, WordNode>) {
    attach_parts(&mut word.parts, bodies);
}

fn attach_parts(parts: &mut [WordPart], bodies: &mut HashMap<Pos, WordNode>) {
    for part in parts {
        if bodies.is_empty() {
            return;
        }
        match part {
            WordPart::Literal(_) | WordPart::SingleQuoted(_) | WordPart::ExtGlob(_) => {}
            WordPart::DoubleQuoted(dq) => attach_parts(&mut dq.parts, bodies),
            WordPart::ParameterExpansion(pe) => {
                if let Some(index) = &mut pe.index {
                    attach_arith(index, bodies);
                }
                if let Some(slice) = &mut pe.slice {
                    for expr in [&mut slice.offset, &mut slice.length].into_iter().flatten() {
                        attach_arith(expr, bodies);
                    }
                }
                if let Some(replace) = &mut pe.replace {
                    for word in [&mut replace.orig, &mut replace.with].into_iter().flatten() {
                        attach_word(word, bodies);
                    }
                }
                if let Some(word) = pe.expansion.as_mut().and_then(|e| e.word.as_mut()) {
                    attach_word(word, bodies);
                }
            }
            WordPart::CommandSubstitution(cs) => attach_heredocs(&mut cs.body, bodies),
            WordPart::ProcessSubstitution(ps) => attach_heredocs(&mut ps.body, bodies),
            WordPart::ArithmeticExpansion(ae) => {
                if let Some(expr) = &mut ae.expression {
                    attach_arith(expr, bodies);
                }
            }
            WordPart::Array(arr) => attach_words(&mut arr.elements, bodies),
        }
    }
}

fn attach_arith(expr: &mut ArithExpr, bodies: &mut HashMap<Pos, WordNode>) {
    match expr {
        ArithExpr::Binary(b) => {
            attach_arith(&mut b.left, bodies);
            attach_arith(&mut b.right, bodies);
        }
        ArithExpr::Unary(u) => attach_arith(&mut u.operand, bodies),
        ArithExpr::Group(g) => attach_arith(&mut g.expression, bodies),
        ArithExpr::Word(w) => attach_word(w, bodies),
    }
}

fn attach_cond(expr: &mut ConditionalExpressionNode, bodies: &mut HashMap<Pos, WordNode>) {
    match expr {
        ConditionalExpressionNode::Binary(b) => {
            attach_cond(&mut b.left, bodies);
            attach_cond(&mut b.right, bodies);
        }
        ConditionalExpressionNode::Unary(u) => attach_cond(&mut u.operand, bodies),
        ConditionalExpressionNode::Group(g) => attach_cond(&mut g.expression, bodies),
        ConditionalExpressionNode::Word(w) => attach_word(w, bodies),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::Node;
    use crate::parser::parser::parse_str;
    use crate::parser::types::{ParseError, ParseOptions};

    fn parse_ok(src: &str) -> crate::ast::types::ScriptNode {
        parse_str(src, ParseOptions::default()).unwrap()
    }

    fn first_redirect(stmt: &StatementNode) -> &RedirectionNode {
        stmt.redirections.first().expect("Expected a redirect")
    }

    fn body_lit(redir: &RedirectionNode) -> Option<&str> {
        redir.heredoc.as_ref().and_then(|w| w.lit())
    }

    #[test]
    fn test_simple_heredoc() {
        let script = parse_ok("cat <<EOF\nhello\nEOF\n");
        assert_eq!(script.statements.len(), 1);
        let redir = first_redirect(&script.statements[0]);
        assert_eq!(redir.operator, crate::ast::types::RedirectionOperator::DLess);
        assert_eq!(redir.target.lit(), Some("EOF"));
        assert_eq!(body_lit(redir), Some("hello\n"));
        let body = redir.heredoc.as_ref().unwrap();
        assert_eq!(body.pos(), Pos::at_offset(10));
        assert_eq!(body.end(), Pos::at_offset(16));
    }

    #[test]
    fn test_parsing_resumes_after_body() {
        let script = parse_ok("cat <<EOF\nhello\nEOF\necho next\n");
        assert_eq!(script.statements.len(), 2);
        assert_eq!(script.statements[1].pos(), Pos::at_offset(20));
    }

    #[test]
    fn test_two_heredocs_on_one_line() {
        let script = parse_ok("cat <<A <<B\none\nA\ntwo\nB\n");
        let redirs = &script.statements[0].redirections;
        assert_eq!(redirs.len(), 2);
        assert_eq!(body_lit(&redirs[0]), Some("one\n"));
        assert_eq!(body_lit(&redirs[1]), Some("two\n"));
    }

    #[test]
    fn test_heredoc_rest_of_line_parsed_first() {
        let script = parse_ok("cat <<EOF | grep x\nbody\nEOF\n");
        let Some(CommandNode::Binary(pipe)) = &script.statements[0].command else {
            panic!("Expected pipeline");
        };
        assert_eq!(body_lit(first_redirect(&pipe.left)), Some("body\n"));
    }

    #[test]
    fn test_dash_heredoc_strips_tabs() {
        let script = parse_ok("cat <<-EOF\n\tindented\n\tEOF\n");
        let redir = first_redirect(&script.statements[0]);
        assert_eq!(body_lit(redir), Some("indented\n"));
    }

    #[test]
    fn test_quoted_stop_word_keeps_body_raw() {
        let script = parse_ok("cat <<'EOF'\n$HOME `x`\nEOF\n");
        let redir = first_redirect(&script.statements[0]);
        assert_eq!(body_lit(redir), Some("$HOME `x`\n"));
    }

    #[test]
    fn test_unquoted_body_expands() {
        let script = parse_ok("cat <<EOF\nhi $USER\nEOF\n");
        let body = first_redirect(&script.statements[0]).heredoc.as_ref().unwrap();
        assert_eq!(body.parts.len(), 3);
        assert!(matches!(body.parts[1], WordPart::ParameterExpansion(_)));
        let WordPart::Literal(tail) = &body.parts[2] else {
            panic!("Expected trailing newline literal");
        };
        assert_eq!(tail.value, "\n");
    }

    #[test]
    fn test_empty_body() {
        let script = parse_ok("cat <<EOF\nEOF\n");
        assert!(first_redirect(&script.statements[0]).heredoc.is_none());
    }

    #[test]
    fn test_unterminated_at_eof_is_tolerated() {
        let script = parse_ok("cat <<EOF\nline one\nline two");
        let redir = first_redirect(&script.statements[0]);
        assert_eq!(body_lit(redir), Some("line one\nline two"));
    }

    #[test]
    fn test_heredoc_inside_block() {
        let script = parse_ok("{\n  cat <<EOF\nin\nEOF\n}\necho after");
        assert_eq!(script.statements.len(), 2);
        let Some(CommandNode::Group(group)) = &script.statements[0].command else {
            panic!("Expected group");
        };
        assert_eq!(body_lit(first_redirect(&group.body[0])), Some("in\n"));
    }

    #[test]
    fn test_heredoc_in_command_substitution() {
        let script = parse_ok("x=$(cat <<EOF\ninner\nEOF\n)\n");
        let assign = &script.statements[0].assignments[0];
        let value = assign.value.as_ref().unwrap();
        let WordPart::CommandSubstitution(cs) = &value.parts[0] else {
            panic!("Expected command substitution");
        };
        assert_eq!(body_lit(first_redirect(&cs.body[0])), Some("inner\n"));
    }

    #[test]
    fn test_heredoc_in_substitution_inside_body() {
        let script = parse_ok("cat <<E\n$(cat <<F\nf\nF\n)\nE\n");
        assert_eq!(script.statements.len(), 1);
        let body = first_redirect(&script.statements[0]).heredoc.as_ref().unwrap();
        let [WordPart::CommandSubstitution(cs), WordPart::Literal(tail)] = body.parts.as_slice()
        else {
            panic!("Expected substitution then newline, got {:?}", body.parts);
        };
        assert_eq!(tail.value, "\n");
        assert_eq!(body_lit(first_redirect(&cs.body[0])), Some("f\n"));
    }

    #[test]
    fn test_parsing_resumes_after_nested_bodies() {
        let script = parse_ok("cat <<E\nx $(cat <<F\nf\nF\n) y\nE\necho after\n");
        assert_eq!(script.statements.len(), 2);
        let body = first_redirect(&script.statements[0]).heredoc.as_ref().unwrap();
        assert_eq!(body.parts.len(), 3);
    }

    #[test]
    fn test_here_string_is_inline() {
        let script = parse_ok("cat <<< word\necho x");
        assert_eq!(script.statements.len(), 2);
        let redir = first_redirect(&script.statements[0]);
        assert_eq!(redir.target.lit(), Some("word"));
        assert!(redir.heredoc.is_none());
    }

    #[test]
    fn test_stop_word_unquoting() {
        let script = parse_ok("cat <<\\EOF\n$x\nEOF\n");
        assert_eq!(body_lit(first_redirect(&script.statements[0])), Some("$x\n"));
        let script = parse_ok("cat <<\"E\"OF\n$x\nEOF\n");
        assert_eq!(body_lit(first_redirect(&script.statements[0])), Some("$x\n"));
    }

    #[test]
    fn test_stop_word_with_expansion_fails() {
        let err = parse_str("cat <<$(x)\n", ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::Syntax(_)));
    }

    #[test]
    fn test_missing_stop_word() {
        let err = parse_str("cat <<\nfoo", ParseOptions::default()).unwrap_err();
        assert_eq!(err.diagnostic().unwrap().message, "<< must be followed by a word");
    }
}
