//! Resolution of natural-language derivations into expressions.
//!
//! Two resolvers exist: [`RuleResolver`] handles derivations that are
//! already formulas plus a fixed set of spoken phrasings ("sum of A
//! and B", "ratio of A to C"); [`BackendResolver`] falls back to a
//! secondary generative call whose reply is schema-validated through
//! the contract caller before anything is executed.

use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;

use super::expr::{Expr, Reducer};
use crate::backend::{ChatBackend, ChatMessage};
use crate::contract::{ContractCaller, FormulaReply};
use crate::frame::Frame;

/// Turns a derivation text into an executable expression.
#[async_trait]
pub trait TransformResolver: Send + Sync {
    /// Resolves `derivation` for feature `name` against the columns of
    /// `frame`.
    ///
    /// # Errors
    ///
    /// Returns a reason string; the compiler converts it into a
    /// per-feature failure, never a batch abort.
    async fn resolve(
        &self,
        name: &str,
        derivation: &str,
        frame: &Frame,
    ) -> Result<Expr, String>;
}

/// Deterministic resolver: direct grammar parse, then spoken-phrase
/// patterns.
#[derive(Debug, Clone, Default)]
pub struct RuleResolver;

impl RuleResolver {
    /// Creates a rule resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn try_rules(derivation: &str, frame: &Frame) -> Result<Expr, String> {
        // A derivation that already is a formula wins outright.
        if let Ok(expr) = Expr::parse(derivation) {
            check_columns(&expr, frame)?;
            return Ok(expr);
        }

        let text = derivation.trim().trim_end_matches('.');

        // Multi-operand phrasings: "sum of A and B", "mean of A, B and C".
        for (pattern, reducer) in [
            (r"(?i)^(?:the )?sum of (.+)$", Reducer::Sum),
            (r"(?i)^(?:the )?mean of (.+)$", Reducer::Mean),
            (r"(?i)^(?:the )?average of (.+)$", Reducer::Mean),
            (r"(?i)^(?:the )?minimum of (.+)$", Reducer::Min),
            (r"(?i)^(?:the )?maximum of (.+)$", Reducer::Max),
            (r"(?i)^(?:the )?variance of (.+)$", Reducer::Var),
        ] {
            #[allow(clippy::unwrap_used)] // patterns are fixed literals
            let re = Regex::new(pattern).unwrap();
            if let Some(caps) = re.captures(text) {
                let args = split_operands(&caps[1])
                    .iter()
                    .map(|op| operand(op, frame))
                    .collect::<Result<Vec<_>, _>>()?;
                if args.len() < 2 {
                    return Err(format!(
                        "'{text}' names {} operand(s), expected at least 2",
                        args.len()
                    ));
                }
                return Ok(Expr::Call { reducer, args });
            }
        }

        // Two-operand phrasings.
        for (pattern, reducer) in [
            (r"(?i)^(?:the )?ratio of (.+?) to (.+)$", Reducer::Ratio),
            (r"(?i)^(.+?) divided by (.+)$", Reducer::Ratio),
            (
                r"(?i)^(?:the )?difference (?:of|between) (.+?) and (.+)$",
                Reducer::Difference,
            ),
        ] {
            #[allow(clippy::unwrap_used)]
            let re = Regex::new(pattern).unwrap();
            if let Some(caps) = re.captures(text) {
                let args = vec![operand(&caps[1], frame)?, operand(&caps[2], frame)?];
                return Ok(Expr::Call { reducer, args });
            }
        }

        // "product of A and B" has no reducer; expand to multiplication.
        #[allow(clippy::unwrap_used)]
        let product = Regex::new(r"(?i)^(?:the )?product of (.+)$").unwrap();
        if let Some(caps) = product.captures(text) {
            let mut args = split_operands(&caps[1])
                .iter()
                .map(|op| operand(op, frame))
                .collect::<Result<Vec<_>, _>>()?;
            if args.len() < 2 {
                return Err(format!("'{text}' names fewer than 2 operands"));
            }
            let first = args.remove(0);
            return Ok(args.into_iter().fold(first, |acc, rhs| Expr::Binary {
                op: super::expr::BinOp::Mul,
                lhs: Box::new(acc),
                rhs: Box::new(rhs),
            }));
        }

        Err(format!("could not resolve derivation '{derivation}'"))
    }
}

#[async_trait]
impl TransformResolver for RuleResolver {
    async fn resolve(
        &self,
        _name: &str,
        derivation: &str,
        frame: &Frame,
    ) -> Result<Expr, String> {
        Self::try_rules(derivation, frame)
    }
}

/// Splits an operand list on commas and the word "and".
fn split_operands(text: &str) -> Vec<String> {
    #[allow(clippy::unwrap_used)]
    let sep = Regex::new(r"\s*,\s*(?:and\s+)?|\s+and\s+").unwrap();
    sep.split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Resolves one operand: an existing column name (quoting stripped) or
/// a numeric literal.
fn operand(text: &str, frame: &Frame) -> Result<Expr, String> {
    let name = text.trim().trim_matches(|c| c == '`' || c == '\'' || c == '"');
    if frame.has_column(name) {
        return Ok(Expr::Column(name.to_string()));
    }
    if let Ok(value) = name.parse::<f64>() {
        return Ok(Expr::Literal(value));
    }
    Err(format!("unknown column '{name}'"))
}

fn check_columns(expr: &Expr, frame: &Frame) -> Result<(), String> {
    for name in expr.columns() {
        if !frame.has_column(name) {
            return Err(format!("unknown column '{name}'"));
        }
    }
    Ok(())
}

/// Resolver that falls back to a schema-validated generative call when
/// the rules cannot interpret a derivation.
pub struct BackendResolver {
    rules: RuleResolver,
    backend: Arc<dyn ChatBackend>,
    caller: ContractCaller,
}

impl BackendResolver {
    /// Creates a backend-backed resolver.
    #[must_use]
    pub fn new(backend: Arc<dyn ChatBackend>, caller: ContractCaller) -> Self {
        Self {
            rules: RuleResolver::new(),
            backend,
            caller,
        }
    }

    fn prompt(name: &str, derivation: &str, frame: &Frame) -> Vec<ChatMessage> {
        let system = concat!(
            "You translate feature derivation descriptions into formulas.\n",
            "Allowed: column names (backtick-quote names with spaces), numeric ",
            "literals, + - * /, parentheses, and the functions sum, mean, var, ",
            "min, max, ratio, difference applied to columns.\n",
            "Output format (STRICT JSON): {\"formula\": \"<expression>\"}\n",
        );
        let user = format!(
            "==== Available columns ====\n{}\n==== Feature ====\n{name}\n\
             ==== Derivation ====\n{derivation}\n",
            frame.names().join(", "),
        );
        vec![ChatMessage::system(system), ChatMessage::user(user)]
    }
}

#[async_trait]
impl TransformResolver for BackendResolver {
    async fn resolve(
        &self,
        name: &str,
        derivation: &str,
        frame: &Frame,
    ) -> Result<Expr, String> {
        if let Ok(expr) = self.rules.resolve(name, derivation, frame).await {
            return Ok(expr);
        }

        let messages = Self::prompt(name, derivation, frame);
        let reply: FormulaReply = self
            .caller
            .call("ResolveFormula", self.backend.as_ref(), &messages, |r: &FormulaReply| {
                r.validate()?;
                let expr = Expr::parse(&r.formula)?;
                check_columns(&expr, frame)
            })
            .await
            .map_err(|e| e.to_string())?;

        // The predicate already proved this parses and references only
        // existing columns.
        let expr = Expr::parse(&reply.formula)?;
        Ok(expr)
    }
}
