//! Compound Command Parser
//!
//! Handles parsing of compound commands: if, for, while, until, case,
//! subshell, group and the `((...))` arithmetic command. Each clause starts
//! with the current token on its opening keyword and returns with the token
//! just past its closing one.

use crate::ast::position::Pos;
use crate::ast::types::{
    ArithmeticCommandNode, CStyleLoopNode, CaseItemNode, CaseNode, CaseTerminator, CommandNode,
    ElifClause, ForLoop, ForNode, GroupNode, IfNode, SubshellNode, UntilNode, WhileNode,
    WordIterNode,
};
use crate::parser::lexer::{QuoteMode, Token};
use crate::parser::parser::{ParseResult, Parser};
use crate::parser::types::{case_terminator, is_valid_name, stop_token};
use std::io::Read;

impl<R: Read> Parser<R> {
    // ===========================================================================
    // IF
    // ===========================================================================

    pub(crate) fn if_clause(&mut self) -> ParseResult<CommandNode> {
        let if_pos = self.lx.pos;
        self.next()?;
        let condition = self.follow_stmts("if", if_pos, &["then"])?;
        let then_pos = self.follow_rsrv(if_pos, "if <cond>", "then")?;
        let then_body = self.follow_stmts("then", then_pos, &["fi", "elif", "else"])?;

        let mut elifs = Vec::new();
        while let Some(elif_pos) = self.got_rsrv("elif")? {
            let condition = self.follow_stmts("elif", elif_pos, &["then"])?;
            let then_pos = self.follow_rsrv(elif_pos, "elif <cond>", "then")?;
            let body = self.follow_stmts("then", then_pos, &["fi", "elif", "else"])?;
            elifs.push(ElifClause {
                elif_pos,
                then_pos,
                condition,
                body,
            });
        }

        let mut else_pos = Pos::INVALID;
        let mut else_body = Vec::new();
        if let Some(pos) = self.got_rsrv("else")? {
            else_pos = pos;
            else_body = self.follow_stmts("else", pos, &["fi"])?;
        }
        let fi_pos = self.stmt_end(if_pos, "if", "fi")?;

        Ok(CommandNode::If(IfNode {
            if_pos,
            then_pos,
            fi_pos,
            condition,
            then_body,
            elifs,
            else_pos,
            else_body,
        }))
    }

    // ===========================================================================
    // LOOPS
    // ===========================================================================

    /// `while` and `until` share everything but the keyword.
    pub(crate) fn while_clause(&mut self, until: bool) -> ParseResult<CommandNode> {
        let keyword = if until { "until" } else { "while" };
        let pos = self.lx.pos;
        self.next()?;
        let condition = self.follow_stmts(keyword, pos, &["do"])?;
        let do_pos = self.follow_rsrv(pos, &format!("{} <cond>", keyword), "do")?;
        let body = self.follow_stmts("do", do_pos, &["done"])?;
        let done_pos = self.stmt_end(pos, keyword, "done")?;
        Ok(if until {
            CommandNode::Until(UntilNode {
                until_pos: pos,
                do_pos,
                done_pos,
                condition,
                body,
            })
        } else {
            CommandNode::While(WhileNode {
                while_pos: pos,
                do_pos,
                done_pos,
                condition,
                body,
            })
        })
    }

    pub(crate) fn for_clause(&mut self) -> ParseResult<CommandNode> {
        let for_pos = self.lx.pos;
        self.next()?;
        let header = if self.lx.tok == Token::DblLeftParen {
            ForLoop::CStyle(self.c_style_loop()?)
        } else {
            ForLoop::WordIter(self.word_iter(for_pos)?)
        };
        let left = match header {
            ForLoop::CStyle(_) => "for ((...))",
            ForLoop::WordIter(_) => "for foo [in words]",
        };
        let do_pos = self.follow_rsrv(for_pos, left, "do")?;
        let body = self.follow_stmts("do", do_pos, &["done"])?;
        let done_pos = self.stmt_end(for_pos, "for", "done")?;
        Ok(CommandNode::For(ForNode {
            for_pos,
            do_pos,
            done_pos,
            header,
            body,
        }))
    }

    /// `name [in words]` up to and including an optional `;`.
    fn word_iter(&mut self, for_pos: Pos) -> ParseResult<WordIterNode> {
        if self.lx.tok != Token::LitWord || !is_valid_name(&self.lx.val) {
            return Err(self.pos_err(for_pos, "for must be followed by a literal"));
        }
        let name = self.take_lit();
        self.next()?;
        let mut items = Vec::new();
        if self.got_rsrv("in")?.is_some() {
            while !self.lx.new_line && !stop_token(self.lx.tok) {
                match self.get_word()? {
                    Some(word) => items.push(word),
                    None => return Err(self.cur_err("word list can only contain words")),
                }
            }
        }
        if self.lx.tok == Token::Semicolon && !self.lx.new_line {
            self.next()?;
        }
        Ok(WordIterNode { name, items })
    }

    /// `((init; cond; post))`; each part may be empty.
    fn c_style_loop(&mut self) -> ParseResult<CStyleLoopNode> {
        let lparen = self.lx.pos;
        let saved = self.pre_nested(QuoteMode::ArithmExpr);
        self.next()?;
        let init = self.arithm_expr(false)?;
        let mut condition = None;
        if self.lx.tok == Token::DblSemicolon {
            self.next()?;
        } else {
            self.c_style_semicolon(lparen)?;
            condition = self.arithm_expr(false)?;
            self.c_style_semicolon(lparen)?;
        }
        let post = self.arithm_expr(false)?;
        let rparen = self.arithm_end(lparen, "((")?;
        self.post_nested(saved);
        self.next()?;
        if self.lx.tok == Token::Semicolon && !self.lx.new_line {
            self.next()?;
        }
        Ok(CStyleLoopNode {
            lparen,
            rparen,
            init,
            condition,
            post,
        })
    }

    fn c_style_semicolon(&mut self, lparen: Pos) -> ParseResult<()> {
        if self.lx.tok != Token::Semicolon {
            return Err(self.pos_err(lparen, "c-style fors require three parts"));
        }
        self.next()
    }

    // ===========================================================================
    // CASE
    // ===========================================================================

    pub(crate) fn case_clause(&mut self) -> ParseResult<CommandNode> {
        let case_pos = self.lx.pos;
        self.next()?;
        let Some(word) = self.get_word()? else {
            return Err(self.follow_err(case_pos, "case", "a word"));
        };
        self.follow_rsrv(case_pos, "case x", "in")?;
        let items = self.case_items()?;
        let esac_pos = self.stmt_end(case_pos, "case", "esac")?;
        Ok(CommandNode::Case(CaseNode {
            case_pos,
            esac_pos,
            word,
            items,
        }))
    }

    fn case_items(&mut self) -> ParseResult<Vec<CaseItemNode>> {
        let mut items = Vec::new();
        while self.lx.tok != Token::Eof && !self.is_rsrv("esac") {
            if self.lx.tok == Token::LeftParen {
                self.next()?;
            }
            let mut patterns = Vec::new();
            loop {
                match self.get_word()? {
                    Some(word) => patterns.push(word),
                    None => return Err(self.cur_err("case patterns must consist of words")),
                }
                if self.lx.tok != Token::Or {
                    break;
                }
                self.next()?;
            }
            if self.lx.tok != Token::RightParen {
                return Err(self.cur_err("case patterns must be separated with |"));
            }
            let rparen = self.lx.pos;

            let old = self.quote;
            self.quote = QuoteMode::SwitchCase;
            self.next()?;
            let body = self.stmt_list(&["esac"])?;
            self.quote = old;

            let Some(terminator) = case_terminator(self.lx.tok) else {
                items.push(CaseItemNode {
                    terminator: CaseTerminator::DoubleSemi,
                    terminator_pos: Pos::INVALID,
                    rparen,
                    patterns,
                    body,
                });
                break;
            };
            let terminator_pos = self.lx.pos;
            self.next()?;
            items.push(CaseItemNode {
                terminator,
                terminator_pos,
                rparen,
                patterns,
                body,
            });
        }
        Ok(items)
    }

    // ===========================================================================
    // GROUPING
    // ===========================================================================

    pub(crate) fn block(&mut self) -> ParseResult<CommandNode> {
        let lbrace = self.lx.pos;
        self.next()?;
        let body = self.stmt_list(&["}"])?;
        let Some(rbrace) = self.got_rsrv("}")? else {
            return Err(self.matching_err(lbrace, "{", "}"));
        };
        if body.is_empty() {
            return Err(self.follow_err(lbrace, "{", "a statement list"));
        }
        Ok(CommandNode::Group(GroupNode {
            lbrace,
            rbrace,
            body,
        }))
    }

    pub(crate) fn subshell(&mut self) -> ParseResult<CommandNode> {
        let lparen = self.lx.pos;
        let old = self.quote;
        self.quote = QuoteMode::SubCmd;
        self.next()?;
        let body = self.stmt_list(&[])?;
        self.quote = old;
        if self.lx.tok != Token::RightParen {
            return Err(self.matching_err(lparen, "(", ")"));
        }
        if body.is_empty() {
            return Err(self.follow_err(lparen, "(", "a statement list"));
        }
        let rparen = self.lx.pos;
        self.next()?;
        Ok(CommandNode::Subshell(SubshellNode {
            lparen,
            rparen,
            body,
        }))
    }

    pub(crate) fn arithm_cmd(&mut self) -> ParseResult<CommandNode> {
        let left = self.lx.pos;
        let saved = self.pre_nested(QuoteMode::ArithmExprCmd);
        self.next()?;
        let expression = self.arithm_expr(false)?;
        let right = self.arithm_end(left, "((")?;
        self.post_nested(saved);
        self.next()?;
        Ok(CommandNode::Arithmetic(ArithmeticCommandNode {
            left,
            right,
            expression,
        }))
    }
}
