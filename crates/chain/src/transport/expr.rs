//! Transport expression parser.
//!
//! Grammar:
//!
//! ```text
//! expr := url | "fallback(" list ")" | "loadbalance(" list ")"
//! list := expr ("," expr)*
//! ```
//!
//! Argument lists are split on top-level commas only, so nested calls such as
//! `loadbalance(fallback(http://a,http://b),http://c)` keep their inner commas.

use std::fmt;
use thiserror::Error;

const FALLBACK: &str = "fallback";
const LOAD_BALANCE: &str = "loadbalance";

/// Parsed transport expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportExpr {
    /// Single HTTP(S) JSON-RPC endpoint
    Http(String),
    /// Try children in order, advancing on transport-level failure
    Fallback(Vec<TransportExpr>),
    /// Round-robin requests across children
    LoadBalance(Vec<TransportExpr>),
}

/// Transport expression parse error. Always carries the offending substring.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExprError {
    #[error("unrecognized transport expression `{0}`")]
    UnrecognizedPrefix(String),
    #[error("unbalanced parentheses in `{0}`")]
    Unbalanced(String),
    #[error("empty endpoint in argument list of `{0}`")]
    EmptyArgument(String),
    #[error("invalid endpoint url `{0}`")]
    InvalidUrl(String),
}

impl TransportExpr {
    /// Parse a transport expression.
    pub fn parse(input: &str) -> Result<Self, ExprError> {
        let expr = input.trim();

        if let Some(args) = call_arguments(expr, FALLBACK)? {
            return Ok(Self::Fallback(parse_list(args, expr)?));
        }
        if let Some(args) = call_arguments(expr, LOAD_BALANCE)? {
            return Ok(Self::LoadBalance(parse_list(args, expr)?));
        }
        if expr.starts_with("http://") || expr.starts_with("https://") {
            if expr.contains(['(', ')', ',']) {
                return Err(ExprError::InvalidUrl(expr.to_string()));
            }
            reqwest::Url::parse(expr).map_err(|_| ExprError::InvalidUrl(expr.to_string()))?;
            return Ok(Self::Http(expr.to_string()));
        }

        Err(ExprError::UnrecognizedPrefix(expr.to_string()))
    }

    /// Number of leaf endpoints in the tree.
    pub fn endpoint_count(&self) -> usize {
        match self {
            Self::Http(_) => 1,
            Self::Fallback(children) | Self::LoadBalance(children) => {
                children.iter().map(Self::endpoint_count).sum()
            }
        }
    }
}

impl fmt::Display for TransportExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, children) = match self {
            Self::Http(url) => return f.write_str(url),
            Self::Fallback(children) => (FALLBACK, children),
            Self::LoadBalance(children) => (LOAD_BALANCE, children),
        };
        write!(f, "{name}(")?;
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{child}")?;
        }
        f.write_str(")")
    }
}

impl std::str::FromStr for TransportExpr {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// If `expr` is a call to `name`, return the text between its parentheses.
fn call_arguments<'a>(expr: &'a str, name: &str) -> Result<Option<&'a str>, ExprError> {
    let Some(rest) = expr.strip_prefix(name) else {
        return Ok(None);
    };
    let Some(rest) = rest.trim_start().strip_prefix('(') else {
        return Ok(None);
    };
    let Some(args) = rest.strip_suffix(')') else {
        return Err(ExprError::Unbalanced(expr.to_string()));
    };
    Ok(Some(args))
}

fn parse_list(args: &str, whole: &str) -> Result<Vec<TransportExpr>, ExprError> {
    split_top_level(args, whole)?
        .into_iter()
        .map(TransportExpr::parse)
        .collect()
}

/// Split on commas at nesting depth zero.
fn split_top_level<'a>(args: &'a str, whole: &str) -> Result<Vec<&'a str>, ExprError> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in args.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ExprError::Unbalanced(whole.to_string()))?;
            }
            ',' if depth == 0 => {
                parts.push(&args[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(ExprError::Unbalanced(whole.to_string()));
    }
    parts.push(&args[start..]);

    if parts.iter().any(|p| p.trim().is_empty()) {
        return Err(ExprError::EmptyArgument(whole.to_string()));
    }
    Ok(parts)
}
