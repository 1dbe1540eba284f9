//! Arithmetic Expression Parser
//!
//! Parses the arithmetic language shared by `$((...))`, `((...))`, `let`,
//! array indexes and slice offsets:
//! - $((1 + 2))
//! - $((x++))
//! - $((a ? b : c))
//! - let a=1 b+=2
//!
//! Binary operators are parsed by precedence climbing over the token stream.
//! In compact mode (`let` arguments) whitespace ends the expression, so
//! operators and their operands must be written without spaces.

use crate::ast::position::Pos;
use crate::ast::types::{
    ArithBinaryNode, ArithBinaryOperator, ArithExpr, ArithGroupNode, ArithUnaryNode,
    ArithUnaryOperator,
};
use crate::parser::lexer::Token;
use crate::parser::parser::{ParseResult, Parser};
use crate::parser::types::is_valid_lvalue;
use std::io::Read;

// Binding strength, loosest first
const PREC_COMMA: u8 = 1;
const PREC_ASSIGN: u8 = 2;
const PREC_TERNARY: u8 = 3;
const PREC_POWER: u8 = 14;

/// Binary operator for `tok` with its precedence.
fn arith_binary_op(tok: Token) -> Option<(ArithBinaryOperator, u8)> {
    use ArithBinaryOperator as Op;
    Some(match tok {
        Token::Comma => (Op::Comma, PREC_COMMA),
        Token::Assign => (Op::Assign, PREC_ASSIGN),
        Token::AddAssign => (Op::AddAssign, PREC_ASSIGN),
        Token::SubAssign => (Op::SubAssign, PREC_ASSIGN),
        Token::MulAssign => (Op::MulAssign, PREC_ASSIGN),
        Token::DivAssign => (Op::DivAssign, PREC_ASSIGN),
        Token::ModAssign => (Op::ModAssign, PREC_ASSIGN),
        Token::ShlAssign => (Op::LShiftAssign, PREC_ASSIGN),
        Token::ShrAssign => (Op::RShiftAssign, PREC_ASSIGN),
        Token::AndAssign => (Op::AndAssign, PREC_ASSIGN),
        Token::OrAssign => (Op::OrAssign, PREC_ASSIGN),
        Token::XorAssign => (Op::XorAssign, PREC_ASSIGN),
        Token::Quest => (Op::Quest, PREC_TERNARY),
        Token::OrOr => (Op::LogOr, 4),
        Token::AndAnd => (Op::LogAnd, 5),
        Token::Or => (Op::BitOr, 6),
        Token::Caret => (Op::BitXor, 7),
        Token::And => (Op::BitAnd, 8),
        Token::Equal => (Op::Eq, 9),
        Token::NotEqual => (Op::Ne, 9),
        Token::RdrIn => (Op::Lt, 10),
        Token::RdrOut => (Op::Gt, 10),
        Token::LessEqual => (Op::Le, 10),
        Token::GreatEqual => (Op::Ge, 10),
        Token::Hdoc => (Op::LShift, 11),
        Token::AppOut => (Op::RShift, 11),
        Token::Plus => (Op::Add, 12),
        Token::Minus => (Op::Sub, 12),
        Token::Star => (Op::Mul, 13),
        Token::Slash => (Op::Div, 13),
        Token::Perc => (Op::Mod, 13),
        Token::Power => (Op::Pow, PREC_POWER),
        _ => return None,
    })
}

fn arith_unary_op(tok: Token) -> Option<ArithUnaryOperator> {
    Some(match tok {
        Token::ExclMark => ArithUnaryOperator::Not,
        Token::Tilde => ArithUnaryOperator::BitNot,
        Token::Plus => ArithUnaryOperator::Pos,
        Token::Minus => ArithUnaryOperator::Neg,
        Token::AddAdd => ArithUnaryOperator::Inc,
        Token::SubSub => ArithUnaryOperator::Dec,
        _ => return None,
    })
}

fn right_assoc(prec: u8) -> bool {
    matches!(prec, PREC_ASSIGN | PREC_TERNARY | PREC_POWER)
}

/// A plain variable or array element that can be assigned to.
fn is_name_expr(expr: &ArithExpr) -> bool {
    match expr {
        ArithExpr::Word(w) => w.lit().is_some_and(is_valid_lvalue),
        _ => false,
    }
}

impl<R: Read> Parser<R> {
    /// Parse one arithmetic expression starting at the current token.
    ///
    /// Returns `None` when the current token cannot start an expression; the
    /// caller decides whether that is an error.
    pub(crate) fn arithm_expr(&mut self, compact: bool) -> ParseResult<Option<ArithExpr>> {
        self.arithm_binary(PREC_COMMA, compact)
    }

    fn arithm_binary(&mut self, min: u8, compact: bool) -> ParseResult<Option<ArithExpr>> {
        let Some(mut left) = self.arithm_unary(compact)? else {
            return Ok(None);
        };
        while let Some((operator, prec)) = arith_binary_op(self.lx.tok) {
            if prec < min || (compact && self.lx.spaced) {
                break;
            }
            let op_pos = self.lx.pos;
            if operator.is_assignment() && !is_name_expr(&left) {
                return Err(self.pos_err(op_pos, &format!("{} must follow a name", operator)));
            }
            self.next()?;
            let next_min = if right_assoc(prec) { prec } else { prec + 1 };
            if operator == ArithBinaryOperator::Quest {
                left = self.arithm_ternary(op_pos, left, compact)?;
                continue;
            }
            let right = self.arithm_operand(op_pos, &operator.to_string(), next_min, compact)?;
            left = ArithExpr::Binary(Box::new(ArithBinaryNode {
                op_pos,
                operator,
                left,
                right,
            }));
        }
        Ok(Some(left))
    }

    /// The operand after a binary operator, which must be present.
    fn arithm_operand(
        &mut self,
        op_pos: Pos,
        op: &str,
        min: u8,
        compact: bool,
    ) -> ParseResult<ArithExpr> {
        if compact && self.lx.spaced {
            return Err(self.follow_err_exp(op_pos, op));
        }
        match self.arithm_binary(min, compact)? {
            Some(expr) => Ok(expr),
            None => Err(self.follow_err_exp(op_pos, op)),
        }
    }

    /// `cond ? then : else`, already past the `?`. The branches are held by a
    /// `:` node on the right of the `?` node.
    fn arithm_ternary(
        &mut self,
        quest: Pos,
        cond: ArithExpr,
        compact: bool,
    ) -> ParseResult<ArithExpr> {
        let then = self.arithm_operand(quest, "?", PREC_ASSIGN, compact)?;
        if self.lx.tok != Token::Colon {
            return Err(self.pos_err(quest, "ternary operator missing : after ?"));
        }
        let colon = self.lx.pos;
        self.next()?;
        let otherwise = self.arithm_operand(colon, ":", PREC_TERNARY, compact)?;
        Ok(ArithExpr::Binary(Box::new(ArithBinaryNode {
            op_pos: quest,
            operator: ArithBinaryOperator::Quest,
            left: cond,
            right: ArithExpr::Binary(Box::new(ArithBinaryNode {
                op_pos: colon,
                operator: ArithBinaryOperator::Colon,
                left: then,
                right: otherwise,
            })),
        })))
    }

    fn arithm_unary(&mut self, compact: bool) -> ParseResult<Option<ArithExpr>> {
        let Some(operator) = arith_unary_op(self.lx.tok) else {
            return self.arithm_postfix(compact);
        };
        self.deeper(|p| {
            let op_pos = p.lx.pos;
            p.next()?;
            if compact && p.lx.spaced {
                return Err(p.follow_err_exp(op_pos, &operator.to_string()));
            }
            let Some(operand) = p.arithm_unary(compact)? else {
                return Err(p.follow_err_exp(op_pos, &operator.to_string()));
            };
            if matches!(operator, ArithUnaryOperator::Inc | ArithUnaryOperator::Dec)
                && !is_name_expr(&operand)
            {
                return Err(p.pos_err(op_pos, &format!("{} must be followed by a name", operator)));
            }
            Ok(Some(ArithExpr::Unary(Box::new(ArithUnaryNode {
                op_pos,
                operator,
                postfix: false,
                operand,
            }))))
        })
    }

    fn arithm_postfix(&mut self, compact: bool) -> ParseResult<Option<ArithExpr>> {
        let Some(operand) = self.arithm_primary()? else {
            return Ok(None);
        };
        let operator = match self.lx.tok {
            Token::AddAdd => ArithUnaryOperator::Inc,
            Token::SubSub => ArithUnaryOperator::Dec,
            _ => return Ok(Some(operand)),
        };
        if compact && self.lx.spaced {
            return Ok(Some(operand));
        }
        let op_pos = self.lx.pos;
        if !is_name_expr(&operand) {
            return Err(self.pos_err(op_pos, &format!("{} must follow a name", operator)));
        }
        self.next()?;
        Ok(Some(ArithExpr::Unary(Box::new(ArithUnaryNode {
            op_pos,
            operator,
            postfix: true,
            operand,
        }))))
    }

    fn arithm_primary(&mut self) -> ParseResult<Option<ArithExpr>> {
        if self.lx.tok != Token::LeftParen {
            return Ok(self.get_word()?.map(ArithExpr::Word));
        }
        let lparen = self.lx.pos;
        self.next()?;
        let Some(expression) = self.deeper(|p| p.arithm_expr(false))? else {
            return Err(self.follow_err_exp(lparen, "("));
        };
        if self.lx.tok != Token::RightParen {
            return Err(self.matching_err(lparen, "(", ")"));
        }
        let rparen = self.lx.pos;
        self.next()?;
        Ok(Some(ArithExpr::Group(Box::new(ArithGroupNode {
            lparen,
            rparen,
            expression,
        }))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::{CommandNode, Node, WordPart};
    use crate::parser::parser::parse_str;
    use crate::parser::types::ParseOptions;

    fn arith(src: &str) -> ArithExpr {
        let script = parse_str(&format!("echo $(({}))", src), ParseOptions::default());
        assert!(script.is_ok(), "{:?}", script.err());
        let script = script.unwrap();
        let Some(CommandNode::Simple(cmd)) = &script.statements[0].command else {
            panic!("Expected simple command");
        };
        let WordPart::ArithmeticExpansion(ae) = &cmd.args[1].parts[0] else {
            panic!("Expected arithmetic expansion");
        };
        ae.expression.clone().expect("Expected expression")
    }

    fn message(src: &str) -> String {
        let err = parse_str(src, ParseOptions::default()).unwrap_err();
        err.diagnostic().unwrap().message.clone()
    }

    fn binary(expr: &ArithExpr) -> &ArithBinaryNode {
        match expr {
            ArithExpr::Binary(b) => b,
            other => panic!("Expected binary expression, got {:?}", other),
        }
    }

    fn lit(expr: &ArithExpr) -> &str {
        match expr {
            ArithExpr::Word(w) => w.lit().unwrap(),
            other => panic!("Expected word, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        let expr = arith("1 + 2 * 3");
        let add = binary(&expr);
        assert_eq!(add.operator, ArithBinaryOperator::Add);
        assert_eq!(add.op_pos, Pos::at_offset(10));
        assert_eq!(lit(&add.left), "1");
        assert_eq!(binary(&add.right).operator, ArithBinaryOperator::Mul);
    }

    #[test]
    fn test_left_assoc() {
        let expr = arith("1 - 2 - 3");
        let outer = binary(&expr);
        assert_eq!(lit(&outer.right), "3");
        assert_eq!(binary(&outer.left).operator, ArithBinaryOperator::Sub);
    }

    #[test]
    fn test_power_right_assoc() {
        let expr = arith("2 ** 3 ** 2");
        let outer = binary(&expr);
        assert_eq!(outer.operator, ArithBinaryOperator::Pow);
        assert_eq!(lit(&outer.left), "2");
        assert_eq!(binary(&outer.right).operator, ArithBinaryOperator::Pow);
    }

    #[test]
    fn test_assignment_chain() {
        let expr = arith("a = b += 1");
        let outer = binary(&expr);
        assert_eq!(outer.operator, ArithBinaryOperator::Assign);
        assert_eq!(binary(&outer.right).operator, ArithBinaryOperator::AddAssign);
        let expr = arith("a[i+1] <<= 2");
        assert_eq!(binary(&expr).operator, ArithBinaryOperator::LShiftAssign);
    }

    #[test]
    fn test_comparison_and_logic() {
        let expr = arith("a < b && c >= d || e");
        let or = binary(&expr);
        assert_eq!(or.operator, ArithBinaryOperator::LogOr);
        let and = binary(&or.left);
        assert_eq!(and.operator, ArithBinaryOperator::LogAnd);
        assert_eq!(binary(&and.left).operator, ArithBinaryOperator::Lt);
        assert_eq!(binary(&and.right).operator, ArithBinaryOperator::Ge);
        let expr = arith("1 << 2 | 3 ^ 4 & 5");
        assert_eq!(binary(&expr).operator, ArithBinaryOperator::BitOr);
    }

    #[test]
    fn test_ternary() {
        let expr = arith("a ? b : c ? d : e");
        let quest = binary(&expr);
        assert_eq!(quest.operator, ArithBinaryOperator::Quest);
        let colon = binary(&quest.right);
        assert_eq!(colon.operator, ArithBinaryOperator::Colon);
        assert_eq!(lit(&colon.left), "b");
        assert_eq!(binary(&colon.right).operator, ArithBinaryOperator::Quest);
    }

    #[test]
    fn test_comma() {
        let expr = arith("a = 1, b = 2");
        let comma = binary(&expr);
        assert_eq!(comma.operator, ArithBinaryOperator::Comma);
        assert_eq!(binary(&comma.left).operator, ArithBinaryOperator::Assign);
    }

    #[test]
    fn test_unary_and_postfix() {
        let expr = arith("-x");
        let ArithExpr::Unary(u) = &expr else {
            panic!("Expected unary");
        };
        assert_eq!(u.operator, ArithUnaryOperator::Neg);
        assert_eq!(u.pos(), Pos::at_offset(8));
        let expr = arith("x++ + --y");
        let add = binary(&expr);
        let ArithExpr::Unary(post) = &add.left else {
            panic!("Expected postfix");
        };
        assert!(post.postfix);
        assert_eq!(post.operator, ArithUnaryOperator::Inc);
        assert_eq!(post.end(), Pos::at_offset(11));
        let ArithExpr::Unary(pre) = &add.right else {
            panic!("Expected prefix");
        };
        assert!(!pre.postfix);
        assert_eq!(pre.operator, ArithUnaryOperator::Dec);
        let expr = arith("!~a");
        let ArithExpr::Unary(not) = &expr else {
            panic!("Expected unary");
        };
        assert!(matches!(&not.operand, ArithExpr::Unary(_)));
    }

    #[test]
    fn test_group() {
        let expr = arith("(1 + 2) * 3");
        let mul = binary(&expr);
        let ArithExpr::Group(g) = &mul.left else {
            panic!("Expected group");
        };
        assert_eq!(g.lparen, Pos::at_offset(8));
        assert_eq!(g.rparen, Pos::at_offset(14));
        assert_eq!(binary(&g.expression).operator, ArithBinaryOperator::Add);
    }

    #[test]
    fn test_expansions_as_operands() {
        let expr = arith("$x + ${y} * $(echo 2)");
        let add = binary(&expr);
        let ArithExpr::Word(w) = &add.left else {
            panic!("Expected word");
        };
        assert!(matches!(w.parts[0], WordPart::ParameterExpansion(_)));
    }

    #[test]
    fn test_arithmetic_errors() {
        assert_eq!(message("echo $((1 = 2))"), "= must follow a name");
        assert_eq!(message("echo $((++1))"), "++ must be followed by a name");
        assert_eq!(message("echo $((1++))"), "++ must follow a name");
        assert_eq!(message("echo $((1 +))"), "+ must be followed by an expression");
        assert_eq!(message("echo $((a ? b))"), "ternary operator missing : after ?");
        assert_eq!(message("echo $(((1 + 2))"), "reached ) without matching $(( with ))");
    }

    #[test]
    fn test_let_is_compact() {
        let script = parse_str("let a=1+2 b++", ParseOptions::default()).unwrap();
        let Some(CommandNode::Let(l)) = &script.statements[0].command else {
            panic!("Expected let");
        };
        assert_eq!(l.expressions.len(), 2);
        assert_eq!(binary(&l.expressions[0]).operator, ArithBinaryOperator::Assign);
        assert_eq!(
            message("let a= 1"),
            "= must be followed by an expression"
        );
    }
}
