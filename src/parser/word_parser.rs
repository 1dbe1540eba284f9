//! Word Parser
//!
//! A word is a run of adjacent parts with no unquoted whitespace between
//! them: literals, quotes, expansions, substitutions and extended globs.

use crate::ast::position::Pos;
use crate::ast::types::{
    CommandSubstitutionPart, DoubleQuotedPart, ExtGlobPart, GlobOperator, ParameterExpansionPart,
    ProcessDirection, ProcessSubstitutionPart, SingleQuotedPart, WordNode, WordPart, AST,
};
use crate::parser::lexer::{QuoteMode, Token};
use crate::parser::parser::{ParseResult, Parser};
use crate::parser::types::glob_operator;
use std::io::Read;

impl<R: Read> Parser<R> {
    pub(crate) fn get_word(&mut self) -> ParseResult<Option<WordNode>> {
        let parts = self.word_parts()?;
        if parts.is_empty() {
            return Ok(None);
        }
        Ok(Some(AST::word(parts)))
    }

    /// Parts up to the first whitespace or non-word token.
    pub(crate) fn word_parts(&mut self) -> ParseResult<Vec<WordPart>> {
        let mut parts = Vec::new();
        while let Some(part) = self.word_part()? {
            parts.push(part);
            if self.lx.spaced {
                break;
            }
        }
        Ok(parts)
    }

    pub(crate) fn word_part(&mut self) -> ParseResult<Option<WordPart>> {
        self.deeper(|p| p.word_part_inner())
    }

    fn word_part_inner(&mut self) -> ParseResult<Option<WordPart>> {
        let part = match self.lx.tok {
            Token::Lit | Token::LitWord => {
                let lit = self.take_lit();
                self.next()?;
                WordPart::Literal(lit)
            }
            Token::DollBrace => self.param_exp()?,
            Token::DollDblParen | Token::DollBrack => self.arithm_exp()?,
            Token::DollParen => self.cmd_subst()?,
            Token::Dollar => self.short_param()?,
            Token::CmdIn | Token::CmdOut => self.proc_subst()?,
            Token::SglQuote | Token::DollSglQuote => self.single_quoted()?,
            Token::DblQuote | Token::DollDblQuote => {
                if self.quote == QuoteMode::DblQuotes {
                    return Ok(None);
                }
                self.double_quoted()?
            }
            Token::BckQuote => {
                if self.backquote_end() {
                    return Ok(None);
                }
                self.backquote()?
            }
            tok => match glob_operator(tok) {
                Some(op) => self.ext_glob(op)?,
                None => return Ok(None),
            },
        };
        Ok(Some(part))
    }

    /// `$name`, `$1`, `$@` ...; a lone `$` is literal text.
    fn short_param(&mut self) -> ParseResult<WordPart> {
        let dollar = self.lx.pos;
        let start = self.lx.cur_pos();
        let Some(name) = self.lx.scan_short_param() else {
            let lit = AST::literal(dollar, dollar + 1, "$");
            self.next()?;
            return Ok(WordPart::Literal(lit));
        };
        let param = AST::literal(start, self.lx.cur_pos(), name);
        self.next()?;
        Ok(WordPart::ParameterExpansion(Box::new(ParameterExpansionPart {
            dollar,
            rbrace: Pos::INVALID,
            short: true,
            length: false,
            indirect: false,
            param,
            index: None,
            slice: None,
            replace: None,
            expansion: None,
        })))
    }

    fn unclosed_quote(&self, position: Pos, quote: &str) -> crate::parser::types::ParseError {
        self.lex_err(
            position,
            &format!("reached {} without closing quote {}", self.tok_desc(), quote),
        )
    }

    fn single_quoted(&mut self) -> ParseResult<WordPart> {
        let position = self.lx.pos;
        let dollar = self.lx.tok == Token::DollSglQuote;
        let saved = self.quote;
        self.quote = QuoteMode::SglQuotes { dollar };
        self.next()?;
        let mut value = String::new();
        if self.lx.tok == Token::Lit {
            value = std::mem::take(&mut self.lx.val);
            self.next()?;
        }
        self.quote = saved;
        if self.lx.tok != Token::SglQuote {
            return Err(self.unclosed_quote(position, "'"));
        }
        self.next()?;
        Ok(WordPart::SingleQuoted(SingleQuotedPart {
            position,
            dollar,
            value,
        }))
    }

    fn double_quoted(&mut self) -> ParseResult<WordPart> {
        let position = self.lx.pos;
        let dollar = self.lx.tok == Token::DollDblQuote;
        let saved = self.quote;
        self.quote = QuoteMode::DblQuotes;
        self.next()?;
        let mut parts = Vec::new();
        while let Some(part) = self.word_part()? {
            parts.push(part);
        }
        self.quote = saved;
        if self.lx.tok != Token::DblQuote {
            return Err(self.unclosed_quote(position, "\""));
        }
        self.next()?;
        Ok(WordPart::DoubleQuoted(DoubleQuotedPart {
            position,
            dollar,
            parts,
        }))
    }

    fn cmd_subst(&mut self) -> ParseResult<WordPart> {
        let left = self.lx.pos;
        let saved = self.pre_nested(QuoteMode::SubCmd);
        self.next()?;
        let body = self.stmt_list(&[])?;
        if self.lx.tok != Token::RightParen {
            return Err(self.matching_err(left, "$(", ")"));
        }
        let right = self.lx.pos;
        self.post_nested(saved);
        self.next()?;
        Ok(WordPart::CommandSubstitution(CommandSubstitutionPart {
            left,
            right,
            body,
            backquote: false,
        }))
    }

    fn backquote(&mut self) -> ParseResult<WordPart> {
        let left = self.lx.pos;
        let saved = self.pre_nested(QuoteMode::SubCmdBckquo);
        self.next()?;
        let body = self.stmt_list(&[])?;
        if self.lx.tok != Token::BckQuote {
            return Err(self.matching_err(left, "`", "`"));
        }
        let right = self.lx.pos;
        self.post_nested(saved);
        self.next()?;
        Ok(WordPart::CommandSubstitution(CommandSubstitutionPart {
            left,
            right,
            body,
            backquote: true,
        }))
    }

    fn proc_subst(&mut self) -> ParseResult<WordPart> {
        let op_pos = self.lx.pos;
        let op_tok = self.lx.tok;
        let direction = if op_tok == Token::CmdIn {
            ProcessDirection::Input
        } else {
            ProcessDirection::Output
        };
        let saved = self.pre_nested(QuoteMode::SubCmd);
        self.next()?;
        let body = self.stmt_list(&[])?;
        if self.lx.tok != Token::RightParen {
            return Err(self.matching_err(op_pos, op_tok.as_str(), ")"));
        }
        let rparen = self.lx.pos;
        self.post_nested(saved);
        self.next()?;
        Ok(WordPart::ProcessSubstitution(ProcessSubstitutionPart {
            op_pos,
            rparen,
            direction,
            body,
        }))
    }

    /// `@(a|b)` and friends. The pattern is kept verbatim up to the
    /// matching `)`.
    fn ext_glob(&mut self, operator: GlobOperator) -> ParseResult<WordPart> {
        let op_pos = self.lx.pos;
        let start = self.lx.cur_pos();
        let mut value = String::new();
        let mut depth = 1usize;
        while let Some(r) = self.lx.cur_rune() {
            match r {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            value.push(r);
            self.lx.skip_rune();
        }
        let end = self.lx.cur_pos();
        if depth > 0 {
            self.next()?;
            return Err(self.matching_err(op_pos, &operator.to_string(), ")"));
        }
        self.lx.skip_rune();
        self.next()?;
        Ok(WordPart::ExtGlob(ExtGlobPart {
            op_pos,
            operator,
            pattern: AST::literal(start, end, value),
        }))
    }
}
