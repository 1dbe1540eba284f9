//! Conditional Expression Parser
//!
//! Handles parsing of [[ ... ]] conditional commands.
//!
//! Operators reach the parser as plain literal words and are classified
//! through the lookup tables below; `<` and `>` arrive as redirect tokens.
//! `&&` binds tighter than `||`, and `!` applies to the next primary.

use crate::ast::position::Pos;
use crate::ast::types::{
    CommandNode, CondBinaryNode, CondBinaryOperator, CondGroupNode, CondUnaryNode,
    CondUnaryOperator, ConditionalCommandNode, ConditionalExpressionNode, WordNode, AST,
};
use crate::parser::lexer::{QuoteMode, Token};
use crate::parser::parser::{ParseResult, Parser};
use std::collections::HashMap;
use std::io::Read;

lazy_static::lazy_static! {
    /// Unary test operators by spelling
    static ref TEST_UNARY_OPS: HashMap<&'static str, CondUnaryOperator> = {
        use CondUnaryOperator::*;
        let mut m = HashMap::new();
        m.insert("-e", Exists);
        m.insert("-a", Exists);
        m.insert("-f", RegularFile);
        m.insert("-d", Directory);
        m.insert("-c", CharDevice);
        m.insert("-b", BlockDevice);
        m.insert("-p", NamedPipe);
        m.insert("-S", Socket);
        m.insert("-L", Symlink);
        m.insert("-h", Symlink);
        m.insert("-g", SetGid);
        m.insert("-u", SetUid);
        m.insert("-r", Readable);
        m.insert("-w", Writable);
        m.insert("-x", Executable);
        m.insert("-s", NonEmptyFile);
        m.insert("-t", Terminal);
        m.insert("-z", EmptyString);
        m.insert("-n", NonEmptyString);
        m.insert("-o", OptionSet);
        m.insert("-v", VarSet);
        m.insert("-R", NameRef);
        m
    };

    /// Binary test operators by spelling
    static ref TEST_BINARY_OPS: HashMap<&'static str, CondBinaryOperator> = {
        use CondBinaryOperator::*;
        let mut m = HashMap::new();
        m.insert("=", Eq);
        m.insert("==", EqEq);
        m.insert("!=", Ne);
        m.insert("=~", Match);
        m.insert("<", Lt);
        m.insert(">", Gt);
        m.insert("-eq", NumEq);
        m.insert("-ne", NumNe);
        m.insert("-lt", NumLt);
        m.insert("-le", NumLe);
        m.insert("-gt", NumGt);
        m.insert("-ge", NumGe);
        m.insert("-nt", Nt);
        m.insert("-ot", Ot);
        m.insert("-ef", Ef);
        m
    };
}

/// Classify a unary test operator; `Token::Illegal` if `val` is not one.
pub fn test_unary_op(val: &str) -> Token {
    TEST_UNARY_OPS
        .get(val)
        .map_or(Token::Illegal, |op| Token::TsUnary(*op))
}

/// Classify a binary test operator; `Token::Illegal` if `val` is not one.
pub fn test_binary_op(val: &str) -> Token {
    TEST_BINARY_OPS
        .get(val)
        .map_or(Token::Illegal, |op| Token::TsBinary(*op))
}

impl<R: Read> Parser<R> {
    pub(crate) fn test_clause(&mut self) -> ParseResult<CommandNode> {
        let left = self.lx.pos;
        let saved = self.pre_nested(QuoteMode::TestExpr);
        self.next()?;
        if self.is_rsrv("]]") {
            return Err(self.follow_err_exp(left, "[["));
        }
        let Some(expression) = self.cond_or()? else {
            return Err(self.follow_err_exp(left, "[["));
        };
        if !self.is_rsrv("]]") {
            return Err(self.matching_err(left, "[[", "]]"));
        }
        let right = self.lx.pos;
        self.post_nested(saved);
        self.next()?;
        Ok(CommandNode::Conditional(ConditionalCommandNode {
            left,
            right,
            expression,
        }))
    }

    fn cond_or(&mut self) -> ParseResult<Option<ConditionalExpressionNode>> {
        let Some(mut left) = self.cond_and()? else {
            return Ok(None);
        };
        while self.lx.tok == Token::OrOr {
            let op_pos = self.lx.pos;
            self.next()?;
            let Some(right) = self.cond_and()? else {
                return Err(self.follow_err_exp(op_pos, "||"));
            };
            left = cond_binary(op_pos, CondBinaryOperator::Or, left, right);
        }
        Ok(Some(left))
    }

    fn cond_and(&mut self) -> ParseResult<Option<ConditionalExpressionNode>> {
        let Some(mut left) = self.cond_not()? else {
            return Ok(None);
        };
        while self.lx.tok == Token::AndAnd {
            let op_pos = self.lx.pos;
            self.next()?;
            let Some(right) = self.cond_not()? else {
                return Err(self.follow_err_exp(op_pos, "&&"));
            };
            left = cond_binary(op_pos, CondBinaryOperator::And, left, right);
        }
        Ok(Some(left))
    }

    fn cond_not(&mut self) -> ParseResult<Option<ConditionalExpressionNode>> {
        if !self.is_rsrv("!") {
            return self.cond_primary();
        }
        self.deeper(|p| {
            let op_pos = p.lx.pos;
            p.next()?;
            let Some(operand) = p.cond_not()? else {
                return Err(p.follow_err_exp(op_pos, "!"));
            };
            Ok(Some(ConditionalExpressionNode::Unary(Box::new(CondUnaryNode {
                op_pos,
                operator: CondUnaryOperator::Not,
                operand,
            }))))
        })
    }

    fn cond_primary(&mut self) -> ParseResult<Option<ConditionalExpressionNode>> {
        if self.lx.tok == Token::LeftParen {
            let group = self.deeper(|p| p.cond_group())?;
            self.complex_end()?;
            return Ok(Some(group));
        }
        if self.is_rsrv("]]") {
            return Ok(None);
        }
        if self.lx.tok == Token::LitWord {
            if let Token::TsUnary(operator) = test_unary_op(&self.lx.val) {
                let lit = self.take_lit();
                self.next()?;
                if self.cond_operand_missing() {
                    // `[[ -f ]]` tests the string "-f"
                    return Ok(Some(ConditionalExpressionNode::Word(AST::literal_word(lit))));
                }
                let operand = self.cond_word(lit.value_pos, operator.as_str())?;
                self.complex_end()?;
                return Ok(Some(ConditionalExpressionNode::Unary(Box::new(CondUnaryNode {
                    op_pos: lit.value_pos,
                    operator,
                    operand: ConditionalExpressionNode::Word(operand),
                }))));
            }
        }
        let Some(left) = self.get_word()? else {
            return Ok(None);
        };
        self.cond_binary(left).map(Some)
    }

    fn cond_group(&mut self) -> ParseResult<ConditionalExpressionNode> {
        let lparen = self.lx.pos;
        self.next()?;
        let Some(expression) = self.cond_or()? else {
            return Err(self.follow_err_exp(lparen, "("));
        };
        if self.lx.tok != Token::RightParen {
            return Err(self.matching_err(lparen, "(", ")"));
        }
        let rparen = self.lx.pos;
        self.next()?;
        Ok(ConditionalExpressionNode::Group(Box::new(CondGroupNode {
            lparen,
            rparen,
            expression,
        })))
    }

    /// A word, optionally followed by a binary operator and its right side.
    fn cond_binary(&mut self, left: WordNode) -> ParseResult<ConditionalExpressionNode> {
        let operator = match self.lx.tok {
            Token::RdrIn => CondBinaryOperator::Lt,
            Token::RdrOut => CondBinaryOperator::Gt,
            Token::LitWord if self.lx.val == "]]" => {
                return Ok(ConditionalExpressionNode::Word(left))
            }
            Token::LitWord => match test_binary_op(&self.lx.val) {
                Token::TsBinary(op) => op,
                _ => {
                    return Err(self.cur_err(&format!(
                        "not a valid test operator: {}",
                        self.lx.val
                    )))
                }
            },
            tok if crate::parser::types::is_word_start(tok) => {
                return Err(self.cur_err("test must consist of a single word"))
            }
            _ => return Ok(ConditionalExpressionNode::Word(left)),
        };
        let op_pos = self.lx.pos;
        let right = if operator == CondBinaryOperator::Match {
            let old = self.quote;
            self.quote = QuoteMode::TestRegexp;
            self.next()?;
            let right = self.cond_word(op_pos, operator.as_str());
            self.quote = old;
            right?
        } else {
            self.next()?;
            self.cond_word(op_pos, operator.as_str())?
        };
        Ok(cond_binary(
            op_pos,
            operator,
            ConditionalExpressionNode::Word(left),
            ConditionalExpressionNode::Word(right),
        ))
    }

    fn cond_word(&mut self, op_pos: Pos, op: &str) -> ParseResult<WordNode> {
        if self.is_rsrv("]]") {
            return Err(self.follow_err(op_pos, op, "a word"));
        }
        match self.get_word()? {
            Some(word) => Ok(word),
            None => Err(self.follow_err(op_pos, op, "a word")),
        }
    }

    /// A unary operator with nothing after it is just a word.
    fn cond_operand_missing(&self) -> bool {
        matches!(
            self.lx.tok,
            Token::AndAnd | Token::OrOr | Token::RightParen | Token::Eof
        ) || self.is_rsrv("]]")
    }

    /// Only a plain word may be the left side of a binary operator.
    fn complex_end(&self) -> ParseResult<()> {
        let binary = match self.lx.tok {
            Token::RdrIn | Token::RdrOut => true,
            Token::LitWord => test_binary_op(&self.lx.val) != Token::Illegal,
            _ => false,
        };
        if binary {
            return Err(self.cur_err("expected &&, || or ]] after complex expr"));
        }
        Ok(())
    }
}

fn cond_binary(
    op_pos: Pos,
    operator: CondBinaryOperator,
    left: ConditionalExpressionNode,
    right: ConditionalExpressionNode,
) -> ConditionalExpressionNode {
    ConditionalExpressionNode::Binary(Box::new(CondBinaryNode {
        op_pos,
        operator,
        left,
        right,
    }))
}
