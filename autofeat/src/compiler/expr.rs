//! Constrained expression grammar over named columns.
//!
//! Grammar: column references (bare identifiers or backtick-quoted
//! names), numeric literals, `+ - * /`, parentheses, unary minus, and
//! a fixed reducer set applied row-wise across column arguments:
//! `sum`, `mean`, `var`, `min`, `max`, `ratio`, `difference`.
//!
//! Evaluation follows IEEE semantics (division by zero yields
//! infinity or NaN, never an error), and a missing operand makes the
//! result missing for that row only.

use crate::frame::Frame;

/// Binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
}

/// Row-wise reducer over two or more operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    /// Row-wise sum of all arguments.
    Sum,
    /// Row-wise mean of all arguments.
    Mean,
    /// Row-wise population variance of all arguments.
    Var,
    /// Row-wise minimum.
    Min,
    /// Row-wise maximum.
    Max,
    /// First argument divided by the second (exactly two).
    Ratio,
    /// First argument minus the second (exactly two).
    Difference,
}

impl Reducer {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "sum" => Some(Self::Sum),
            "mean" => Some(Self::Mean),
            "var" => Some(Self::Var),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "ratio" => Some(Self::Ratio),
            "difference" => Some(Self::Difference),
            _ => None,
        }
    }

    fn check_arity(self, n: usize) -> Result<(), String> {
        match self {
            Self::Ratio | Self::Difference if n != 2 => Err(format!(
                "{self:?} takes exactly 2 arguments, got {n}"
            )),
            _ if n == 0 => Err(format!("{self:?} takes at least 1 argument")),
            _ => Ok(()),
        }
    }
}

/// A parsed derivation expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Reference to a dataset column by exact name.
    Column(String),
    /// Numeric literal.
    Literal(f64),
    /// Unary negation.
    Neg(Box<Expr>),
    /// Binary arithmetic.
    Binary {
        /// Operator.
        op: BinOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// Reducer call.
    Call {
        /// Which reducer.
        reducer: Reducer,
        /// Arguments, reduced row-wise.
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Parses an expression in the constrained grammar.
    pub fn parse(input: &str) -> Result<Self, String> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expression()?;
        if parser.pos != parser.tokens.len() {
            return Err(format!(
                "unexpected trailing input at token {}",
                parser.pos
            ));
        }
        Ok(expr)
    }

    /// Collects every column name the expression references.
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Column(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Self::Literal(_) => {}
            Self::Neg(inner) => inner.collect_columns(out),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_columns(out);
                rhs.collect_columns(out);
            }
            Self::Call { args, .. } => {
                for arg in args {
                    arg.collect_columns(out);
                }
            }
        }
    }

    /// Materializes the expression against a frame, column by row.
    ///
    /// # Errors
    ///
    /// Fails if a referenced column is absent; per-row missing values
    /// propagate as `None` without failing the column.
    pub fn materialize(&self, frame: &Frame) -> Result<Vec<Option<f64>>, String> {
        for name in self.columns() {
            if !frame.has_column(name) {
                return Err(format!("unknown column '{name}'"));
            }
        }
        Ok((0..frame.n_rows())
            .map(|row| self.eval_row(frame, row))
            .collect())
    }

    fn eval_row(&self, frame: &Frame, row: usize) -> Option<f64> {
        match self {
            Self::Column(name) => frame.column(name)?.values[row],
            Self::Literal(v) => Some(*v),
            Self::Neg(inner) => inner.eval_row(frame, row).map(|v| -v),
            Self::Binary { op, lhs, rhs } => {
                let l = lhs.eval_row(frame, row)?;
                let r = rhs.eval_row(frame, row)?;
                Some(match op {
                    BinOp::Add => l + r,
                    BinOp::Sub => l - r,
                    BinOp::Mul => l * r,
                    BinOp::Div => l / r,
                })
            }
            Self::Call { reducer, args } => {
                let values: Option<Vec<f64>> =
                    args.iter().map(|a| a.eval_row(frame, row)).collect();
                let values = values?;
                Some(match reducer {
                    Reducer::Sum => values.iter().sum(),
                    Reducer::Mean => values.iter().sum::<f64>() / values.len() as f64,
                    Reducer::Var => {
                        let mean = values.iter().sum::<f64>() / values.len() as f64;
                        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
                            / values.len() as f64
                    }
                    Reducer::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
                    Reducer::Max => {
                        values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
                    }
                    Reducer::Ratio => values[0] / values[1],
                    Reducer::Difference => values[0] - values[1],
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '`' => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('`') => break,
                        Some(ch) => name.push(ch),
                        None => return Err("unterminated backtick quote".to_string()),
                    }
                }
                if name.is_empty() {
                    return Err("empty backtick-quoted name".to_string());
                }
                tokens.push(Token::Ident(name));
            }
            '0'..='9' | '.' => {
                let mut text = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_digit() || ch == '.' || ch == 'e' || ch == 'E' {
                        text.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value: f64 = text
                    .parse()
                    .map_err(|_| format!("invalid number '{text}'"))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        name.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(name));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), String> {
        match self.advance() {
            Some(ref token) if token == expected => Ok(()),
            Some(token) => Err(format!("expected {expected:?}, found {token:?}")),
            None => Err(format!("expected {expected:?}, found end of input")),
        }
    }

    // expression := term (('+' | '-') term)*
    fn expression(&mut self) -> Result<Expr, String> {
        let mut lhs = self.term()?;
        while let Some(op) = match self.peek() {
            Some(Token::Plus) => Some(BinOp::Add),
            Some(Token::Minus) => Some(BinOp::Sub),
            _ => None,
        } {
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    // term := factor (('*' | '/') factor)*
    fn term(&mut self) -> Result<Expr, String> {
        let mut lhs = self.factor()?;
        while let Some(op) = match self.peek() {
            Some(Token::Star) => Some(BinOp::Mul),
            Some(Token::Slash) => Some(BinOp::Div),
            _ => None,
        } {
            self.pos += 1;
            let rhs = self.factor()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    // factor := '-' factor | '(' expression ')' | number
    //         | ident '(' args ')' | ident
    fn factor(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Some(Token::Minus) => Ok(Expr::Neg(Box::new(self.factor()?))),
            Some(Token::LParen) => {
                let inner = self.expression()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Number(v)) => Ok(Expr::Literal(v)),
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    let reducer = Reducer::from_name(&name)
                        .ok_or_else(|| format!("unknown function '{name}'"))?;
                    self.pos += 1;
                    let mut args = Vec::new();
                    if self.peek() != Some(&Token::RParen) {
                        loop {
                            args.push(self.expression()?);
                            if self.peek() == Some(&Token::Comma) {
                                self.pos += 1;
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(&Token::RParen)?;
                    reducer.check_arity(args.len())?;
                    Ok(Expr::Call { reducer, args })
                } else {
                    Ok(Expr::Column(name))
                }
            }
            Some(token) => Err(format!("unexpected token {token:?}")),
            None => Err("unexpected end of input".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Column, Frame};
    use pretty_assertions::assert_eq;

    fn frame() -> Frame {
        Frame::from_columns(vec![
            Column::dense("A", &[1.0, 2.0, 3.0, 4.0]),
            Column::dense("B", &[10.0, 0.0, 5.0, 2.0]),
            Column::new("C", vec![Some(1.0), None, Some(3.0), Some(4.0)]),
        ])
        .unwrap()
    }

    #[test]
    fn parses_arithmetic_with_precedence() {
        let expr = Expr::parse("A + B * 2").unwrap();
        let values = expr.materialize(&frame()).unwrap();
        assert_eq!(values, vec![Some(21.0), Some(2.0), Some(13.0), Some(8.0)]);
    }

    #[test]
    fn parses_backtick_quoted_columns() {
        let expr = Expr::parse("`A` + `B`").unwrap();
        assert_eq!(expr.columns(), vec!["A", "B"]);
    }

    #[test]
    fn sum_reducer_adds_rowwise() {
        let expr = Expr::parse("sum(A, B)").unwrap();
        let values = expr.materialize(&frame()).unwrap();
        assert_eq!(values, vec![Some(11.0), Some(2.0), Some(8.0), Some(6.0)]);
    }

    #[test]
    fn ratio_follows_ieee_division() {
        let expr = Expr::parse("ratio(A, B)").unwrap();
        let values = expr.materialize(&frame()).unwrap();
        assert_eq!(values[0], Some(0.1));
        // Division by zero yields infinity, not an error.
        assert_eq!(values[1], Some(f64::INFINITY));
    }

    #[test]
    fn zero_over_zero_is_nan_not_error() {
        let frame = Frame::from_columns(vec![
            Column::dense("x", &[0.0]),
            Column::dense("y", &[0.0]),
        ])
        .unwrap();
        let values = Expr::parse("x / y").unwrap().materialize(&frame).unwrap();
        assert!(values[0].is_some_and(f64::is_nan));
    }

    #[test]
    fn missing_operand_makes_row_missing_only() {
        let expr = Expr::parse("A + C").unwrap();
        let values = expr.materialize(&frame()).unwrap();
        assert_eq!(values, vec![Some(2.0), None, Some(6.0), Some(8.0)]);
    }

    #[test]
    fn unknown_column_is_a_materialize_error() {
        let expr = Expr::parse("A + Z").unwrap();
        let err = expr.materialize(&frame()).unwrap_err();
        assert!(err.contains("'Z'"));
    }

    #[test]
    fn min_max_mean_var_reduce_rowwise() {
        let f = frame();
        assert_eq!(
            Expr::parse("min(A, B)").unwrap().materialize(&f).unwrap()[0],
            Some(1.0)
        );
        assert_eq!(
            Expr::parse("max(A, B)").unwrap().materialize(&f).unwrap()[0],
            Some(10.0)
        );
        assert_eq!(
            Expr::parse("mean(A, B)").unwrap().materialize(&f).unwrap()[0],
            Some(5.5)
        );
        // var over {1, 10}: mean 5.5, population variance 20.25.
        assert_eq!(
            Expr::parse("var(A, B)").unwrap().materialize(&f).unwrap()[0],
            Some(20.25)
        );
    }

    #[test]
    fn difference_and_unary_minus() {
        let f = frame();
        assert_eq!(
            Expr::parse("difference(B, A)")
                .unwrap()
                .materialize(&f)
                .unwrap()[0],
            Some(9.0)
        );
        assert_eq!(
            Expr::parse("-A").unwrap().materialize(&f).unwrap()[0],
            Some(-1.0)
        );
    }

    #[test]
    fn arity_errors() {
        assert!(Expr::parse("ratio(A)").is_err());
        assert!(Expr::parse("difference(A, B, A)").is_err());
        assert!(Expr::parse("sum()").is_err());
    }

    #[test]
    fn rejects_unknown_functions_and_garbage() {
        assert!(Expr::parse("exec(A)").is_err());
        assert!(Expr::parse("A +").is_err());
        assert!(Expr::parse("A ; B").is_err());
        assert!(Expr::parse("`unterminated").is_err());
    }
}
