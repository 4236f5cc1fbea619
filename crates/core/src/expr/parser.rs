use super::lexer::{tokenize, Token, TokenKind};
use crate::ExprError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    BitAnd,
    BitOr,
    And,
    Or,
}

/// Compound assignments carry the arithmetic they apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Apply(BinaryOp),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Var(String),
    Memory { global: bool, index: Box<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Var(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Assign {
        target: Target,
        op: AssignOp,
        value: Box<Expr>,
    },
    /// Parenthesised statement list; evaluates to its last statement.
    Sequence(Vec<Expr>),
}

/// Parses a `;`-separated list of formulas.
pub fn parse(source: &str) -> Result<Vec<Expr>, ExprError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.statements(&TokenKind::Eof)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

const UNARY_BP: u8 = 17;

fn infix_binding(kind: &TokenKind) -> Option<(BinaryOp, u8, u8)> {
    let binding = match kind {
        TokenKind::PipePipe => (BinaryOp::Or, 1, 2),
        TokenKind::AmpAmp => (BinaryOp::And, 3, 4),
        TokenKind::Pipe => (BinaryOp::BitOr, 5, 6),
        TokenKind::Amp => (BinaryOp::BitAnd, 7, 8),
        TokenKind::EqEq => (BinaryOp::Eq, 9, 10),
        TokenKind::BangEq => (BinaryOp::Ne, 9, 10),
        TokenKind::Lt => (BinaryOp::Lt, 11, 12),
        TokenKind::Gt => (BinaryOp::Gt, 11, 12),
        TokenKind::Le => (BinaryOp::Le, 11, 12),
        TokenKind::Ge => (BinaryOp::Ge, 11, 12),
        TokenKind::Plus => (BinaryOp::Add, 13, 14),
        TokenKind::Minus => (BinaryOp::Sub, 13, 14),
        TokenKind::Star => (BinaryOp::Mul, 15, 16),
        TokenKind::Slash => (BinaryOp::Div, 15, 16),
        TokenKind::Percent => (BinaryOp::Mod, 15, 16),
        // Right-associative and tighter than unary minus: -2^2 == -4.
        TokenKind::Caret => (BinaryOp::Pow, 19, 18),
        _ => return None,
    };
    Some(binding)
}

fn assign_op(kind: &TokenKind) -> Option<AssignOp> {
    let op = match kind {
        TokenKind::Assign => AssignOp::Set,
        TokenKind::PlusAssign => AssignOp::Apply(BinaryOp::Add),
        TokenKind::MinusAssign => AssignOp::Apply(BinaryOp::Sub),
        TokenKind::StarAssign => AssignOp::Apply(BinaryOp::Mul),
        TokenKind::SlashAssign => AssignOp::Apply(BinaryOp::Div),
        TokenKind::PercentAssign => AssignOp::Apply(BinaryOp::Mod),
        _ => return None,
    };
    Some(op)
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn error(&self, message: impl Into<String>) -> ExprError {
        let token = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        ExprError::Syntax {
            line: token.line,
            column: token.column,
            message: message.into(),
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), ExprError> {
        if *self.peek() == kind {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn statements(&mut self, end: &TokenKind) -> Result<Vec<Expr>, ExprError> {
        let mut statements = Vec::new();
        loop {
            while *self.peek() == TokenKind::Semicolon {
                self.advance();
            }
            if self.peek() == end {
                return Ok(statements);
            }
            statements.push(self.expression()?);
            if *self.peek() == TokenKind::Semicolon {
                self.advance();
            } else if self.peek() != end {
                return Err(self.error("expected `;`"));
            }
        }
    }

    fn expression(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.ternary()?;
        let Some(op) = assign_op(self.peek()) else {
            return Ok(lhs);
        };
        let target = match lhs {
            Expr::Var(name) => Target::Var(name),
            Expr::Call(name, mut args) if args.len() == 1 && is_memory(&name) => Target::Memory {
                global: name == "gmegabuf",
                index: Box::new(args.remove(0)),
            },
            _ => return Err(ExprError::NotAssignable),
        };
        self.advance();
        let value = self.expression()?;
        Ok(Expr::Assign {
            target,
            op,
            value: Box::new(value),
        })
    }

    fn ternary(&mut self) -> Result<Expr, ExprError> {
        let condition = self.binary(0)?;
        if *self.peek() != TokenKind::Question {
            return Ok(condition);
        }
        self.advance();
        let then = self.expression()?;
        self.expect(TokenKind::Colon, "`:` in conditional")?;
        let otherwise = self.expression()?;
        Ok(Expr::Ternary(
            Box::new(condition),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    fn binary(&mut self, min_bp: u8) -> Result<Expr, ExprError> {
        let mut lhs = self.unary()?;
        while let Some((op, left_bp, right_bp)) = infix_binding(self.peek()) {
            if left_bp < min_bp {
                break;
            }
            self.advance();
            let rhs = self.binary(right_bp)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        match self.peek() {
            TokenKind::Minus => {
                self.advance();
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.binary(UNARY_BP)?)))
            }
            TokenKind::Bang => {
                self.advance();
                Ok(Expr::Unary(UnaryOp::Not, Box::new(self.binary(UNARY_BP)?)))
            }
            TokenKind::Plus => {
                self.advance();
                self.binary(UNARY_BP)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        match self.advance() {
            TokenKind::Number(value) => Ok(Expr::Number(value)),
            TokenKind::Ident(name) => {
                if *self.peek() != TokenKind::LParen {
                    return Ok(Expr::Var(name));
                }
                self.advance();
                let mut args = Vec::new();
                if *self.peek() != TokenKind::RParen {
                    loop {
                        args.push(self.expression()?);
                        if *self.peek() == TokenKind::Comma {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen, "`)` after arguments")?;
                Ok(Expr::Call(name, args))
            }
            TokenKind::LParen => {
                let mut body = self.statements(&TokenKind::RParen)?;
                self.expect(TokenKind::RParen, "`)`")?;
                match body.len() {
                    0 => Err(self.error("empty parentheses")),
                    1 => Ok(body.remove(0)),
                    _ => Ok(Expr::Sequence(body)),
                }
            }
            TokenKind::Eof => Err(self.error("unexpected end of code")),
            other => {
                // Step back so the error points at the offending token.
                self.pos = self.pos.saturating_sub(1);
                Err(self.error(format!("unexpected token {other:?}")))
            }
        }
    }
}

pub(crate) fn is_memory(name: &str) -> bool {
    name == "megabuf" || name == "gmegabuf"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(value: f64) -> Box<Expr> {
        Box::new(Expr::Number(value))
    }

    #[test]
    fn unary_minus_binds_looser_than_power() {
        let parsed = parse("-2^2").unwrap();
        assert_eq!(
            parsed,
            vec![Expr::Unary(
                UnaryOp::Neg,
                Box::new(Expr::Binary(BinaryOp::Pow, num(2.0), num(2.0)))
            )]
        );
    }

    #[test]
    fn assignment_is_right_associative() {
        let parsed = parse("a = b = 3").unwrap();
        let Expr::Assign { target, value, .. } = &parsed[0] else {
            panic!("expected assignment");
        };
        assert_eq!(*target, Target::Var("a".into()));
        assert!(matches!(**value, Expr::Assign { .. }));
    }

    #[test]
    fn memory_calls_are_assignable() {
        let parsed = parse("gmegabuf(3) += 1").unwrap();
        assert!(matches!(
            &parsed[0],
            Expr::Assign {
                target: Target::Memory { global: true, .. },
                op: AssignOp::Apply(BinaryOp::Add),
                ..
            }
        ));
    }

    #[test]
    fn rejects_assignment_to_expression() {
        assert_eq!(parse("a + 1 = 2").unwrap_err(), ExprError::NotAssignable);
    }

    #[test]
    fn empty_statements_are_skipped() {
        assert_eq!(parse(";; x = 1;;\n").unwrap().len(), 1);
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn parenthesised_lists_become_sequences() {
        let parsed = parse("y = (a = 1; a + 2)").unwrap();
        let Expr::Assign { value, .. } = &parsed[0] else {
            panic!("expected assignment");
        };
        assert!(matches!(**value, Expr::Sequence(ref items) if items.len() == 2));
    }

    #[test]
    fn missing_separator_is_a_syntax_error() {
        let err = parse("a = 1 b = 2").unwrap_err();
        assert!(matches!(err, ExprError::Syntax { column: 7, .. }));
    }
}
