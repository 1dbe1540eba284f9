//! Expansion Parser
//!
//! `${...}` parameter expansions and `$((...))` / `$[...]` arithmetic
//! expansions. Each piece of a `${...}` is lexed in its own quote mode, so the
//! same character can be an operator in one position and text in the next.

use crate::ast::position::Pos;
use crate::ast::types::{
    ArithExpr, ArithmeticExpansionPart, ExpansionOp, ParamExpOperator,
    ParameterExpansionPart, ReplaceOp, SliceOp, WordPart, AST,
};
use crate::parser::lexer::{is_special_param, QuoteMode, Token};
use crate::parser::parser::{ParseResult, Parser};
use crate::parser::types::{is_number, is_valid_name, param_exp_operator};
use std::io::Read;

/// `r` can start the name after `${#` or `${!`
fn starts_param_name(r: Option<char>) -> bool {
    matches!(r, Some(c) if c.is_ascii_alphanumeric() || c == '_' || is_special_param(c))
}

fn is_case_operator(op: ParamExpOperator) -> bool {
    matches!(
        op,
        ParamExpOperator::UpperFirst
            | ParamExpOperator::UpperAll
            | ParamExpOperator::LowerFirst
            | ParamExpOperator::LowerAll
    )
}

impl<R: Read> Parser<R> {
    pub(crate) fn param_exp(&mut self) -> ParseResult<WordPart> {
        let dollar = self.lx.pos;
        let old = self.quote;
        self.quote = QuoteMode::ParamName;
        self.next()?;

        let mut length = false;
        let mut indirect = false;
        let mut hash_pos = Pos::INVALID;
        match self.lx.tok {
            Token::Hash if starts_param_name(self.lx.cur_rune()) => {
                length = true;
                hash_pos = self.lx.pos;
                self.next()?;
            }
            Token::ExclMark if starts_param_name(self.lx.cur_rune()) => {
                indirect = true;
                self.next()?;
            }
            _ => {}
        }

        let param = match self.lx.tok {
            Token::Lit | Token::LitWord => {
                if !is_number(&self.lx.val) && !is_valid_name(&self.lx.val) {
                    return Err(self.cur_err("invalid parameter name"));
                }
                let param = self.take_lit();
                self.next()?;
                param
            }
            // `${#-word}` is `$#` with a default, not the length of `$-`.
            Token::Minus | Token::Quest if length && self.lx.cur_rune() != Some('}') => {
                length = false;
                AST::literal(hash_pos, hash_pos + 1, "#")
            }
            Token::At
            | Token::Star
            | Token::Hash
            | Token::ExclMark
            | Token::Dollar
            | Token::Quest
            | Token::Minus => {
                let param = AST::literal(self.lx.pos, self.lx.pos + 1, self.lx.tok.as_str());
                self.next()?;
                param
            }
            _ => return Err(self.cur_err("parameter expansion requires a literal")),
        };

        let mut pe = ParameterExpansionPart {
            dollar,
            rbrace: Pos::INVALID,
            short: false,
            length,
            indirect,
            param,
            index: None,
            slice: None,
            replace: None,
            expansion: None,
        };

        if self.lx.tok == Token::LeftBrack {
            pe.index = Some(self.param_index()?);
        }

        match self.lx.tok {
            Token::RightBrace => {}
            Token::Slash | Token::DblSlash => {
                if !self.bash {
                    return Err(self.lang_err(self.lx.pos, "search and replace expansions"));
                }
                pe.replace = Some(self.param_replace()?);
            }
            Token::Colon => {
                if !self.bash {
                    return Err(self.lang_err(self.lx.pos, "slicing expansions"));
                }
                pe.slice = Some(self.param_slice()?);
            }
            Token::Lit | Token::LitWord => {
                return Err(self.cur_err(&format!(
                    "{} cannot be followed by a word",
                    pe.param.value
                )))
            }
            tok => match param_exp_operator(tok) {
                Some(op) => {
                    if is_case_operator(op) && !self.bash {
                        return Err(self.lang_err(self.lx.pos, "case expansions"));
                    }
                    self.quote = QuoteMode::ParamExp;
                    self.next()?;
                    let word = if self.lx.tok == Token::RightBrace {
                        None
                    } else {
                        self.get_word()?
                    };
                    pe.expansion = Some(ExpansionOp { operator: op, word });
                }
                None => return Err(self.matching_err(dollar, "${", "}")),
            },
        }

        self.quote = old;
        if self.lx.tok != Token::RightBrace {
            return Err(self.matching_err(dollar, "${", "}"));
        }
        pe.rbrace = self.lx.pos;
        self.next()?;
        Ok(WordPart::ParameterExpansion(Box::new(pe)))
    }

    /// `[index]` after a parameter name; `@` and `*` are kept as words.
    fn param_index(&mut self) -> ParseResult<ArithExpr> {
        let lbrack = self.lx.pos;
        if !self.bash {
            return Err(self.lang_err(lbrack, "arrays"));
        }
        self.quote = QuoteMode::ParamIndex;
        self.next()?;
        let index = match self.lx.tok {
            Token::At | Token::Star => {
                let lit = AST::literal(self.lx.pos, self.lx.pos + 1, self.lx.tok.as_str());
                self.next()?;
                ArithExpr::Word(AST::literal_word(lit))
            }
            _ => match self.arithm_expr(false)? {
                Some(expr) => expr,
                None => return Err(self.follow_err_exp(lbrack, "[")),
            },
        };
        if self.lx.tok != Token::RightBrack {
            return Err(self.matching_err(lbrack, "[", "]"));
        }
        self.quote = QuoteMode::ParamName;
        self.next()?;
        Ok(index)
    }

    fn param_replace(&mut self) -> ParseResult<ReplaceOp> {
        let all = self.lx.tok == Token::DblSlash;
        self.quote = QuoteMode::ParamRepl;
        self.next()?;
        let orig = self.get_word()?;
        self.quote = QuoteMode::ParamExp;
        let mut with = None;
        if self.lx.tok == Token::Slash {
            self.next()?;
            with = self.get_word()?;
        }
        Ok(ReplaceOp { all, orig, with })
    }

    /// `:offset` and `:offset:length`; either expression may be empty.
    fn param_slice(&mut self) -> ParseResult<SliceOp> {
        let colon = self.lx.pos;
        self.quote = QuoteMode::ParamOffset;
        self.next()?;
        let offset = if matches!(self.lx.tok, Token::Colon | Token::RightBrace) {
            None
        } else {
            Some(self.slice_expr(colon)?)
        };
        let mut length = None;
        if self.lx.tok == Token::Colon {
            let colon = self.lx.pos;
            self.quote = QuoteMode::ParamLength;
            self.next()?;
            if self.lx.tok != Token::RightBrace {
                length = Some(self.slice_expr(colon)?);
            }
        }
        Ok(SliceOp { offset, length })
    }

    fn slice_expr(&mut self, colon: Pos) -> ParseResult<ArithExpr> {
        match self.arithm_expr(false)? {
            Some(expr) => Ok(expr),
            None => Err(self.follow_err_exp(colon, ":")),
        }
    }

    // ===========================================================================
    // ARITHMETIC EXPANSION
    // ===========================================================================

    /// `$((expr))` or `$[expr]`
    pub(crate) fn arithm_exp(&mut self) -> ParseResult<WordPart> {
        let left = self.lx.pos;
        let bracket = self.lx.tok == Token::DollBrack;
        let mode = if bracket {
            QuoteMode::ArithmExprBrack
        } else {
            QuoteMode::ArithmExpr
        };
        let saved = self.pre_nested(mode);
        self.next()?;
        let expression = self.arithm_expr(false)?;
        let right = if bracket {
            if self.lx.tok != Token::RightBrack {
                return Err(self.matching_err(left, "$[", "]"));
            }
            self.lx.pos
        } else {
            self.arithm_end(left, "$((")?
        };
        self.post_nested(saved);
        self.next()?;
        Ok(WordPart::ArithmeticExpansion(Box::new(ArithmeticExpansionPart {
            left,
            right,
            bracket,
            expression,
        })))
    }

    /// Consume the first `)` of a closing `))`, returning its position. The
    /// second one is skipped at rune level so the caller can lex what follows
    /// in its own mode.
    pub(crate) fn arithm_end(&mut self, left: Pos, ltok: &str) -> ParseResult<Pos> {
        if self.lx.tok != Token::RightParen || self.lx.cur_rune() != Some(')') {
            return Err(self.matching_err(left, ltok, "))"));
        }
        let right = self.lx.pos;
        self.lx.skip_rune();
        Ok(right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::{ArithBinaryOperator, CommandNode, Node, ScriptNode, WordNode};
    use crate::parser::parser::parse_str;
    use crate::parser::types::ParseOptions;

    fn bash(src: &str) -> ScriptNode {
        let result = parse_str(src, ParseOptions::default());
        assert!(result.is_ok(), "{:?}", result.err());
        result.unwrap()
    }

    fn arg(script: &ScriptNode, i: usize) -> &WordNode {
        match &script.statements[0].command {
            Some(CommandNode::Simple(c)) => &c.args[i],
            other => panic!("Expected simple command, got {:?}", other),
        }
    }

    fn param(src: &str) -> ParameterExpansionPart {
        let script = bash(src);
        match &arg(&script, 1).parts[0] {
            WordPart::ParameterExpansion(pe) => (**pe).clone(),
            other => panic!("Expected parameter expansion, got {:?}", other),
        }
    }

    fn message(src: &str) -> String {
        let err = parse_str(src, ParseOptions::default()).unwrap_err();
        err.diagnostic().unwrap().message.clone()
    }

    #[test]
    fn test_braced_param() {
        let pe = param("echo ${foo}");
        assert!(!pe.short);
        assert_eq!(pe.param.value, "foo");
        assert_eq!(pe.pos(), Pos::at_offset(5));
        assert_eq!(pe.end(), Pos::at_offset(11));
    }

    #[test]
    fn test_length_and_indirect() {
        let pe = param("echo ${#foo}");
        assert!(pe.length);
        assert_eq!(pe.param.value, "foo");
        let pe = param("echo ${#}");
        assert!(!pe.length);
        assert_eq!(pe.param.value, "#");
        let pe = param("echo ${!ref}");
        assert!(pe.indirect);
        let pe = param("echo ${#@}");
        assert!(pe.length);
        assert_eq!(pe.param.value, "@");
    }

    #[test]
    fn test_hash_with_default() {
        let pe = param("echo ${#-x}");
        assert!(!pe.length);
        assert_eq!(pe.param.value, "#");
        let exp = pe.expansion.unwrap();
        assert_eq!(exp.operator, ParamExpOperator::DefaultUnset);
        assert_eq!(exp.word.unwrap().lit(), Some("x"));
    }

    #[test]
    fn test_default_operators() {
        let pe = param("echo ${foo:-bar baz}");
        let exp = pe.expansion.unwrap();
        assert_eq!(exp.operator, ParamExpOperator::DefaultUnsetOrNull);
        assert_eq!(exp.word.unwrap().lit(), Some("bar baz"));
        let pe = param("echo ${foo%%.*}");
        assert_eq!(pe.expansion.unwrap().operator, ParamExpOperator::RemLargeSuffix);
        let pe = param("echo ${foo:=}");
        let exp = pe.expansion.unwrap();
        assert_eq!(exp.operator, ParamExpOperator::AssignUnsetOrNull);
        assert!(exp.word.is_none());
        let pe = param("echo ${foo^^}");
        assert_eq!(pe.expansion.unwrap().operator, ParamExpOperator::UpperAll);
    }

    #[test]
    fn test_nested_default_word() {
        let pe = param("echo ${a:-\"$b\"/${c}}");
        let word = pe.expansion.unwrap().word.unwrap();
        assert_eq!(word.parts.len(), 3);
    }

    #[test]
    fn test_index() {
        let pe = param("echo ${arr[i+1]}");
        let Some(ArithExpr::Binary(b)) = &pe.index else {
            panic!("Expected arithmetic index");
        };
        assert_eq!(b.operator, ArithBinaryOperator::Add);
        let pe = param("echo ${arr[@]}");
        let Some(ArithExpr::Word(w)) = &pe.index else {
            panic!("Expected @ index");
        };
        assert_eq!(w.lit(), Some("@"));
    }

    #[test]
    fn test_replace() {
        let pe = param("echo ${path//\\//:}");
        let replace = pe.replace.unwrap();
        assert!(replace.all);
        assert_eq!(replace.orig.unwrap().lit(), Some("\\/"));
        assert_eq!(replace.with.unwrap().lit(), Some(":"));
        let pe = param("echo ${x/a}");
        let replace = pe.replace.unwrap();
        assert!(!replace.all);
        assert!(replace.with.is_none());
    }

    #[test]
    fn test_slice() {
        let pe = param("echo ${s:1:2}");
        let slice = pe.slice.unwrap();
        assert!(slice.offset.is_some());
        assert!(slice.length.is_some());
        let pe = param("echo ${s: -3}");
        let slice = pe.slice.unwrap();
        assert!(matches!(slice.offset, Some(ArithExpr::Unary(_))));
        assert!(slice.length.is_none());
    }

    #[test]
    fn test_param_errors() {
        assert_eq!(message("echo ${}"), "parameter expansion requires a literal");
        assert_eq!(message("echo ${1a}"), "invalid parameter name");
        assert_eq!(message("echo ${a b}"), "a cannot be followed by a word");
        assert_eq!(message("echo ${a"), "reached EOF without matching ${ with }");
    }

    #[test]
    fn test_posix_rejects_bash_expansions() {
        let posix = ParseOptions {
            posix: true,
            ..Default::default()
        };
        assert!(parse_str("echo ${a[1]}", posix).is_err());
        assert!(parse_str("echo ${a/b/c}", posix).is_err());
        assert!(parse_str("echo ${a:1}", posix).is_err());
        assert!(parse_str("echo ${a,,}", posix).is_err());
        assert!(parse_str("echo ${a:-b}", posix).is_ok());
    }

    #[test]
    fn test_arithmetic_expansion() {
        let script = bash("echo $((1 + 2 * 3)) $[4]");
        let WordPart::ArithmeticExpansion(ae) = &arg(&script, 1).parts[0] else {
            panic!("Expected arithmetic expansion");
        };
        let Some(ArithExpr::Binary(b)) = &ae.expression else {
            panic!("Expected binary expression");
        };
        assert_eq!(b.operator, ArithBinaryOperator::Add);
        assert_eq!(ae.end(), Pos::at_offset(19));
        let WordPart::ArithmeticExpansion(br) = &arg(&script, 2).parts[0] else {
            panic!("Expected $[...]");
        };
        assert!(br.bracket);
        assert_eq!(br.end(), Pos::at_offset(24));
    }

    #[test]
    fn test_unclosed_arithmetic() {
        assert_eq!(message("echo $((1 + 2)"), "reached ) without matching $(( with ))");
        assert_eq!(message("echo $((1 + 2"), "reached EOF without matching $(( with ))");
    }
}
