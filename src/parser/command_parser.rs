//! Command Parser
//!
//! Simple commands with their assignments and redirects, function
//! definitions, and the Bash builtins that get their own node: declare-style
//! clauses, eval, let and coproc.

use crate::ast::position::Pos;
use crate::ast::types::{
    ArrayPart, AssignmentNode, CommandNode, CoprocNode, DeclareNode, EvalNode, FunctionDefNode,
    LetNode, LiteralPart, Node, RedirectionNode, SimpleCommandNode, StatementNode, WordNode,
    WordPart, AST,
};
use crate::parser::heredoc::{unquote_stop, PendingHeredoc};
use crate::parser::lexer::{QuoteMode, Token};
use crate::parser::parser::{ParseResult, Parser};
use crate::parser::types::{
    is_compound_start, is_redirection_token, is_valid_lvalue, is_valid_name, is_word_start,
    redirect_operator, stop_token,
};
use std::io::Read;

impl<R: Read> Parser<R> {
    /// Words, assignments and redirects making up a simple command. With
    /// `at_start` the current token is the first element of the statement.
    pub(crate) fn call_expr(
        &mut self,
        stmt: &mut StatementNode,
        first: Option<WordNode>,
        at_start: bool,
    ) -> ParseResult<()> {
        let mut args: Vec<WordNode> = first.into_iter().collect();
        let mut at_start = at_start;
        loop {
            if !at_start && self.lx.new_line {
                break;
            }
            at_start = false;
            match self.lx.tok {
                tok if stop_token(tok) => break,
                Token::Lit | Token::LitWord if args.is_empty() && self.has_valid_ident() => {
                    let assign = self.get_assign()?;
                    stmt.assignments.push(assign);
                }
                Token::BckQuote if self.backquote_end() => break,
                tok if is_word_start(tok) => match self.get_word()? {
                    Some(word) => args.push(word),
                    None => break,
                },
                tok if is_redirection_token(tok) => self.do_redirect(stmt)?,
                Token::DblLeftParen => {
                    return Err(self.cur_err("(( can only be used to open an arithmetic cmd"))
                }
                _ => {
                    return Err(self.cur_err(&format!(
                        "a command can only contain words and redirects; encountered {}",
                        self.tok_desc()
                    )))
                }
            }
        }
        if !args.is_empty() {
            stmt.command = Some(CommandNode::Simple(SimpleCommandNode { args }));
        }
        Ok(())
    }

    /// The current literal starts with `name=` or, in Bash, `name+=` or
    /// `name[idx]=`.
    pub(crate) fn has_valid_ident(&self) -> bool {
        if !matches!(self.lx.tok, Token::Lit | Token::LitWord) {
            return false;
        }
        let Some(eq) = self.lx.as_pos else {
            return false;
        };
        let name = &self.lx.val[..eq];
        if self.bash {
            let name = name.strip_suffix('+').unwrap_or(name);
            return is_valid_lvalue(name);
        }
        is_valid_name(name)
    }

    pub(crate) fn get_assign(&mut self) -> ParseResult<AssignmentNode> {
        let pos = self.lx.pos;
        let end = self.lx.end;
        let eq = self.lx.as_pos.unwrap_or_default();
        let val = std::mem::take(&mut self.lx.val);
        let append = self.bash && val[..eq].ends_with('+');
        let name_len = if append { eq - 1 } else { eq };
        let name = AST::literal(pos, pos + name_len, &val[..name_len]);

        let mut parts = Vec::new();
        if eq + 1 < val.len() {
            parts.push(WordPart::Literal(AST::literal(pos + eq + 1, end, &val[eq + 1..])));
        }
        self.next()?;
        if !self.lx.spaced && !stop_token(self.lx.tok) {
            if self.lx.tok == Token::LeftParen && parts.is_empty() {
                if !self.bash {
                    return Err(self.lang_err(self.lx.pos, "arrays"));
                }
                parts.push(self.array_expr()?);
            } else {
                parts.extend(self.word_parts()?);
            }
        }
        Ok(AssignmentNode {
            append,
            naked: false,
            name: Some(name),
            value: (!parts.is_empty()).then(|| AST::word(parts)),
        })
    }

    fn array_expr(&mut self) -> ParseResult<WordPart> {
        let lparen = self.lx.pos;
        let saved = self.pre_nested(QuoteMode::ArrayElems);
        self.next()?;
        let mut elements = Vec::new();
        while !matches!(self.lx.tok, Token::RightParen | Token::Eof) {
            if !is_word_start(self.lx.tok) {
                return Err(self.cur_err("array element values must be words"));
            }
            match self.get_word()? {
                Some(word) => elements.push(word),
                None => return Err(self.cur_err("array element values must be words")),
            }
        }
        if self.lx.tok != Token::RightParen {
            return Err(self.matching_err(lparen, "(", ")"));
        }
        let rparen = self.lx.pos;
        self.post_nested(saved);
        self.next()?;
        Ok(WordPart::Array(ArrayPart {
            lparen,
            rparen,
            elements,
        }))
    }

    /// A word that must follow the token `tok` at `pos` on the same line.
    pub(crate) fn follow_word_tok(&mut self, tok: Token, pos: Pos) -> ParseResult<WordNode> {
        if self.lx.new_line {
            return Err(self.follow_err(pos, tok.as_str(), "a word"));
        }
        match self.get_word()? {
            Some(word) => Ok(word),
            None => Err(self.follow_err(pos, tok.as_str(), "a word")),
        }
    }

    pub(crate) fn do_redirect(&mut self, stmt: &mut StatementNode) -> ParseResult<()> {
        let fd = if self.lx.tok == Token::LitRedir {
            let fd = self.take_lit();
            self.next()?;
            Some(fd)
        } else {
            None
        };
        let op_tok = self.lx.tok;
        let op_pos = self.lx.pos;
        let Some(operator) = redirect_operator(op_tok) else {
            return Err(self.cur_err(&format!(
                "{} must be followed by a redirect operator",
                self.tok_desc()
            )));
        };
        if operator.is_heredoc() {
            let saved = self.quote;
            self.quote = QuoteMode::HdocWord;
            let target = self.next().and_then(|_| self.follow_word_tok(op_tok, op_pos));
            self.quote = saved;
            let target = target?;
            let (stop, quoted) =
                unquote_stop(&target).map_err(|msg| self.pos_err(target.pos(), &msg))?;
            self.heredocs.push(PendingHeredoc {
                op_pos,
                tabs: op_tok == Token::DashHdoc,
                quoted,
                stop,
            });
            // The stop word was the last thing on its line.
            if self.lx.tok == Token::Illegal {
                self.next()?;
            }
            stmt.redirections.push(RedirectionNode {
                op_pos,
                operator,
                fd,
                target,
                heredoc: None,
            });
            return Ok(());
        }
        self.next()?;
        let target = self.follow_word_tok(op_tok, op_pos)?;
        stmt.redirections.push(RedirectionNode {
            op_pos,
            operator,
            fd,
            target,
            heredoc: None,
        });
        Ok(())
    }

    // ===========================================================================
    // FUNCTIONS
    // ===========================================================================

    /// Body of `name()`; the parentheses are already consumed.
    pub(crate) fn func_decl(
        &mut self,
        position: Pos,
        name: LiteralPart,
        bash_style: bool,
    ) -> ParseResult<CommandNode> {
        let Some(body) = self.get_stmt(false, false)? else {
            return Err(self.follow_err(
                position,
                &format!("\"{}()\"", name.value),
                "a statement",
            ));
        };
        Ok(CommandNode::FunctionDef(FunctionDefNode {
            position,
            bash_style,
            name,
            body: Box::new(body),
        }))
    }

    /// `function name [()] body`
    pub(crate) fn bash_func_decl(&mut self) -> ParseResult<CommandNode> {
        let position = self.lx.pos;
        self.next()?;
        if self.lx.tok != Token::LitWord {
            return Err(self.follow_err(position, "\"function\"", "a name"));
        }
        let name = self.take_lit();
        self.next()?;
        if self.lx.tok == Token::LeftParen {
            self.next()?;
            if self.lx.tok != Token::RightParen {
                return Err(self.follow_err(name.value_pos, &format!("{}(", name.value), ")"));
            }
            self.next()?;
        }
        self.func_decl(position, name, true)
    }

    // ===========================================================================
    // BASH CLAUSES
    // ===========================================================================

    /// declare, local, export, readonly, typeset, nameref
    pub(crate) fn decl_clause(&mut self) -> ParseResult<CommandNode> {
        let position = self.lx.pos;
        let variant = std::mem::take(&mut self.lx.val);
        self.next()?;
        let mut opts = Vec::new();
        let mut assignments = Vec::new();
        while !stop_token(self.lx.tok)
            && !is_redirection_token(self.lx.tok)
            && !self.lx.new_line
            && !self.backquote_end()
        {
            if self.has_valid_ident() {
                assignments.push(self.get_assign()?);
            } else if self.lx.as_pos.is_some() {
                return Err(self.cur_err("invalid var name"));
            } else if self.lx.tok == Token::LitWord && is_valid_name(&self.lx.val) {
                let name = self.take_lit();
                self.next()?;
                assignments.push(AssignmentNode {
                    append: false,
                    naked: true,
                    name: Some(name),
                    value: None,
                });
            } else if let Some(word) = self.get_word()? {
                if is_option(&word) {
                    opts.push(word);
                } else {
                    assignments.push(AssignmentNode {
                        append: false,
                        naked: true,
                        name: None,
                        value: Some(word),
                    });
                }
            } else {
                return Err(self.follow_err(position, &variant, "names or assignments"));
            }
        }
        Ok(CommandNode::Declare(DeclareNode {
            position,
            variant,
            opts,
            assignments,
        }))
    }

    pub(crate) fn eval_clause(&mut self) -> ParseResult<CommandNode> {
        let eval_pos = self.lx.pos;
        self.next()?;
        let statement = if stop_token(self.lx.tok) || self.lx.new_line || self.backquote_end() {
            None
        } else {
            self.get_stmt(false, false)?.map(Box::new)
        };
        Ok(CommandNode::Eval(EvalNode {
            eval_pos,
            statement,
        }))
    }

    /// `let expr...`: each space-separated argument is one expression.
    pub(crate) fn let_clause(&mut self) -> ParseResult<CommandNode> {
        let let_pos = self.lx.pos;
        let saved = self.pre_nested(QuoteMode::ArithmExprLet);
        self.next()?;
        let mut expressions = Vec::new();
        while !stop_token(self.lx.tok)
            && !is_redirection_token(self.lx.tok)
            && self.lx.tok != Token::Illegal
            && !self.backquote_end()
        {
            match self.arithm_expr(true)? {
                Some(expr) => expressions.push(expr),
                None => return Err(self.follow_err_exp(let_pos, "let")),
            }
        }
        if expressions.is_empty() {
            return Err(self.follow_err_exp(let_pos, "let"));
        }
        self.post_nested(saved);
        if self.lx.tok == Token::Illegal {
            if !self.lx.val.is_empty() {
                return Err(self.lex_err(
                    self.lx.pos,
                    &format!("not a valid arithmetic operator: {}", self.lx.val),
                ));
            }
            // Stopped at the newline ending the clause.
            self.next()?;
        }
        Ok(CommandNode::Let(LetNode {
            let_pos,
            expressions,
        }))
    }

    /// `coproc [name] command`. A name is only recognized before a compound
    /// command; otherwise the first word starts the command.
    pub(crate) fn coproc_clause(&mut self) -> ParseResult<CommandNode> {
        let coproc_pos = self.lx.pos;
        self.next()?;
        if is_compound_start(self.lx.tok, &self.lx.val, self.bash) {
            let Some(stmt) = self.get_stmt(false, false)? else {
                return Err(self.pos_err(coproc_pos, "coproc clause requires a command"));
            };
            return Ok(coproc(coproc_pos, None, stmt));
        }
        let word = if self.lx.new_line { None } else { self.get_word()? };
        let stmt = if stop_token(self.lx.tok) || self.lx.new_line {
            None
        } else {
            self.get_stmt(false, false)?
        };
        match (word, stmt) {
            (None, None) => Err(self.pos_err(coproc_pos, "coproc clause requires a command")),
            (Some(word), None) => Ok(coproc(coproc_pos, None, AST::call_statement(word))),
            (None, Some(stmt)) => Ok(coproc(coproc_pos, None, stmt)),
            (Some(word), Some(mut stmt)) => match &mut stmt.command {
                Some(CommandNode::Simple(call)) => {
                    stmt.position = word.pos();
                    call.args.insert(0, word);
                    Ok(coproc(coproc_pos, None, stmt))
                }
                None => {
                    stmt.position = word.pos();
                    stmt.command = Some(CommandNode::Simple(SimpleCommandNode {
                        args: vec![word],
                    }));
                    Ok(coproc(coproc_pos, None, stmt))
                }
                Some(_) => match into_literal(word) {
                    Ok(name) => Ok(coproc(coproc_pos, Some(name), stmt)),
                    Err(word) => Err(self.pos_err(word.pos(), "coproc name must be a literal")),
                },
            },
        }
    }
}

fn coproc(coproc_pos: Pos, name: Option<LiteralPart>, stmt: StatementNode) -> CommandNode {
    CommandNode::Coproc(CoprocNode {
        coproc_pos,
        name,
        statement: Box::new(stmt),
    })
}

fn into_literal(word: WordNode) -> Result<LiteralPart, WordNode> {
    if word.lit().is_none() {
        return Err(word);
    }
    match word.parts.into_iter().next() {
        Some(WordPart::Literal(lit)) => Ok(lit),
        Some(part) => Err(AST::word(vec![part])),
        None => Err(AST::word(Vec::new())),
    }
}

/// Declare options such as `-a` or `+x`
fn is_option(word: &WordNode) -> bool {
    match word.parts.first() {
        Some(WordPart::Literal(lit)) => lit.value.starts_with('-') || lit.value.starts_with('+'),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::{RedirectionOperator, ScriptNode};
    use crate::parser::parser::parse_str;
    use crate::parser::types::{ParseError, ParseOptions};

    fn bash(src: &str) -> ScriptNode {
        let result = parse_str(src, ParseOptions::default());
        assert!(result.is_ok(), "{:?}", result.err());
        result.unwrap()
    }

    fn posix(src: &str) -> Result<ScriptNode, ParseError> {
        parse_str(
            src,
            ParseOptions {
                posix: true,
                ..Default::default()
            },
        )
    }

    fn message(src: &str) -> String {
        let err = parse_str(src, ParseOptions::default()).unwrap_err();
        err.diagnostic().unwrap().message.clone()
    }

    #[test]
    fn test_parse_assignment() {
        let script = bash("FOO=bar");
        let stmt = &script.statements[0];
        assert!(stmt.command.is_none());
        assert_eq!(stmt.assignments.len(), 1);
        let assign = &stmt.assignments[0];
        assert_eq!(assign.name.as_ref().unwrap().value, "FOO");
        assert_eq!(assign.value.as_ref().unwrap().lit(), Some("bar"));
        assert_eq!(assign.end(), Pos::at_offset(7));
    }

    #[test]
    fn test_assignment_prefix() {
        let script = bash("A=1 B= cmd arg C=2");
        let stmt = &script.statements[0];
        assert_eq!(stmt.assignments.len(), 2);
        assert!(stmt.assignments[1].value.is_none());
        let Some(CommandNode::Simple(cmd)) = &stmt.command else {
            panic!("Expected simple command");
        };
        assert_eq!(cmd.args.len(), 3);
        assert_eq!(cmd.args[2].lit(), Some("C=2"));
    }

    #[test]
    fn test_append_and_index_assignment() {
        let script = bash("a+=x arr[1]=y");
        let assigns = &script.statements[0].assignments;
        assert!(assigns[0].append);
        assert_eq!(assigns[0].name.as_ref().unwrap().value, "a");
        assert_eq!(assigns[1].name.as_ref().unwrap().value, "arr[1]");
        let script = posix("a+=x").unwrap();
        assert!(script.statements[0].assignments.is_empty());
    }

    #[test]
    fn test_assignment_value_continues() {
        let script = bash("x=a\"b\"$c");
        let value = script.statements[0].assignments[0].value.as_ref().unwrap();
        assert_eq!(value.parts.len(), 3);
    }

    #[test]
    fn test_array_assignment() {
        let script = bash("arr=(one two\n three)");
        let value = script.statements[0].assignments[0].value.as_ref().unwrap();
        let WordPart::Array(arr) = &value.parts[0] else {
            panic!("Expected array");
        };
        assert_eq!(arr.elements.len(), 3);
        assert_eq!(value.end(), Pos::at_offset(20));
        assert!(posix("arr=(a)").is_err());
    }

    #[test]
    fn test_redirects() {
        let script = bash("cmd >out 2>>err <in 3<&0 &>all");
        let redirs = &script.statements[0].redirections;
        let ops: Vec<_> = redirs.iter().map(|r| r.operator).collect();
        assert_eq!(
            ops,
            [
                RedirectionOperator::Great,
                RedirectionOperator::DGreat,
                RedirectionOperator::Less,
                RedirectionOperator::LessAnd,
                RedirectionOperator::AndGreat
            ]
        );
        assert_eq!(redirs[1].fd.as_ref().unwrap().value, "2");
        assert_eq!(redirs[1].pos(), Pos::at_offset(9));
        assert_eq!(redirs[0].target.lit(), Some("out"));
    }

    #[test]
    fn test_redirect_only_statement() {
        let script = bash(">file");
        let stmt = &script.statements[0];
        assert!(stmt.command.is_none());
        assert_eq!(stmt.redirections.len(), 1);
    }

    #[test]
    fn test_redirect_needs_word() {
        assert_eq!(message("echo >"), "> must be followed by a word");
        assert_eq!(message("echo >\nfile"), "> must be followed by a word");
    }

    #[test]
    fn test_function_definitions() {
        let script = bash("foo() { echo hi; }\nfunction bar { :; }\nfunction baz() (x)");
        let names: Vec<_> = script
            .statements
            .iter()
            .map(|s| match &s.command {
                Some(CommandNode::FunctionDef(f)) => (f.name.value.clone(), f.bash_style),
                other => panic!("Expected function, got {:?}", other),
            })
            .collect();
        assert_eq!(
            names,
            [
                ("foo".to_string(), false),
                ("bar".to_string(), true),
                ("baz".to_string(), true)
            ]
        );
    }

    #[test]
    fn test_function_body_on_next_line() {
        let script = bash("foo()\n{\n  echo\n}");
        assert!(matches!(
            script.statements[0].command,
            Some(CommandNode::FunctionDef(_))
        ));
    }

    #[test]
    fn test_posix_function_name() {
        assert!(posix("foo-bar() { :; }").is_err());
        assert!(posix("foo_bar() { :; }").is_ok());
        // `function` is an ordinary word, so the closing brace is stray.
        assert!(posix("function foo { :; }").is_err());
    }

    #[test]
    fn test_declare_clause() {
        let script = bash("local -r a=1 b c+=(x) \"$d\"");
        let Some(CommandNode::Declare(decl)) = &script.statements[0].command else {
            panic!("Expected declare");
        };
        assert_eq!(decl.variant, "local");
        assert_eq!(decl.opts.len(), 1);
        assert_eq!(decl.assignments.len(), 4);
        assert!(decl.assignments[1].naked);
        assert!(decl.assignments[2].append);
        assert!(decl.assignments[3].name.is_none());
    }

    #[test]
    fn test_declare_invalid_name() {
        assert_eq!(message("export a-b=1"), "invalid var name");
    }

    #[test]
    fn test_eval_clause() {
        let script = bash("eval echo hi; eval");
        let Some(CommandNode::Eval(ev)) = &script.statements[0].command else {
            panic!("Expected eval");
        };
        assert!(ev.statement.is_some());
        let Some(CommandNode::Eval(empty)) = &script.statements[1].command else {
            panic!("Expected eval");
        };
        assert!(empty.statement.is_none());
    }

    #[test]
    fn test_let_clause() {
        let script = bash("let a=1+2 b++\necho done");
        assert_eq!(script.statements.len(), 2);
        let Some(CommandNode::Let(clause)) = &script.statements[0].command else {
            panic!("Expected let");
        };
        assert_eq!(clause.expressions.len(), 2);
        assert_eq!(message("let"), "let must be followed by an expression");
    }

    #[test]
    fn test_coproc_clause() {
        let script = bash("coproc cat file\ncoproc NAME { cat; }\ncoproc { cat; }");
        let coprocs: Vec<&CoprocNode> = script
            .statements
            .iter()
            .map(|s| match &s.command {
                Some(CommandNode::Coproc(c)) => c,
                other => panic!("Expected coproc, got {:?}", other),
            })
            .collect();
        assert!(coprocs[0].name.is_none());
        let Some(CommandNode::Simple(call)) = &coprocs[0].statement.command else {
            panic!("Expected call");
        };
        assert_eq!(call.args.len(), 2);
        assert_eq!(coprocs[0].statement.pos(), Pos::at_offset(7));
        assert_eq!(coprocs[1].name.as_ref().unwrap().value, "NAME");
        assert!(coprocs[2].name.is_none());
    }

    #[test]
    fn test_bash_clauses_are_plain_commands_in_posix() {
        let script = posix("local a=1").unwrap();
        let Some(CommandNode::Simple(cmd)) = &script.statements[0].command else {
            panic!("Expected simple command");
        };
        assert_eq!(cmd.args.len(), 2);
    }

    #[test]
    fn test_invalid_command_token() {
        assert_eq!(message("echo (("), "(( can only be used to open an arithmetic cmd");
        assert_eq!(
            message("echo a (b)"),
            "a command can only contain words and redirects; encountered ("
        );
    }
}
