use crate::wire::expression::{BinaryOp, Expression};
use crate::wire::item::{Item, ScalarValue};
use std::fmt;

/// The already-decoded siblings an [`Expression`] may reference by name.
/// A plain slice (rather than the full struct `Item` being built) lets the
/// dissector evaluate a length expression while that struct's own children
/// vector is still being appended to.
pub type Siblings<'a> = &'a [Item];

/// Why an [`Expression`] failed to evaluate against a parent [`Item`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// No child of the parent carries the referenced name.
    UnknownFieldRef(String),
    /// The referenced child exists but is not a scalar (e.g. it's a struct or list).
    NotAScalar(String),
    DivideByZero,
    /// Shift amount outside `[0, 63]`.
    ShiftOutOfRange(i64),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::UnknownFieldRef(name) => write!(f, "no field named {name:?} in scope"),
            EvalError::NotAScalar(name) => write!(f, "field {name:?} is not a scalar value"),
            EvalError::DivideByZero => write!(f, "division by zero in length expression"),
            EvalError::ShiftOutOfRange(amount) => write!(f, "shift amount {amount} out of range"),
        }
    }
}

pub trait Eval {
    /// Evaluates `self` to a signed 64-bit integer, resolving any field
    /// references against `siblings` (the struct's already-decoded children).
    fn eval(&self, siblings: Siblings) -> Result<i64, EvalError>;
}

impl Eval for Expression {
    fn eval(&self, siblings: Siblings) -> Result<i64, EvalError> {
        match self {
            Expression::Literal(value) => Ok(*value),
            Expression::FieldRef(name) => resolve_field_ref(siblings, name),
            Expression::Binary(op, lhs, rhs) => {
                let lhs = lhs.eval(siblings)?;
                let rhs = rhs.eval(siblings)?;
                apply(*op, lhs, rhs)
            }
        }
    }
}

fn resolve_field_ref(siblings: Siblings, name: &str) -> Result<i64, EvalError> {
    let child = siblings
        .iter()
        .find(|item| item.name == name)
        .ok_or_else(|| EvalError::UnknownFieldRef(name.to_string()))?;
    match child.value {
        Some(ScalarValue::Signed(v)) => Ok(v),
        Some(ScalarValue::Unsigned(v)) => Ok(v as i64),
        Some(ScalarValue::Bool(v)) => Ok(v as i64),
        Some(ScalarValue::Char(v)) => Ok(v as i64),
        None => Err(EvalError::NotAScalar(name.to_string())),
    }
}

fn apply(op: BinaryOp, lhs: i64, rhs: i64) -> Result<i64, EvalError> {
    Ok(match op {
        BinaryOp::Add => lhs.wrapping_add(rhs),
        BinaryOp::Subtract => lhs.wrapping_sub(rhs),
        BinaryOp::Multiply => lhs.wrapping_mul(rhs),
        BinaryOp::Divide => {
            if rhs == 0 {
                return Err(EvalError::DivideByZero);
            }
            lhs.wrapping_div(rhs)
        }
        BinaryOp::LeftShift => {
            if !(0..64).contains(&rhs) {
                return Err(EvalError::ShiftOutOfRange(rhs));
            }
            lhs.wrapping_shl(rhs as u32)
        }
        BinaryOp::BitwiseAnd => lhs & rhs,
    })
}

/// Parses an XML-XCB integer literal: `0` itself, `0x`-prefixed hex, a
/// leading-zero octal run, or plain decimal.
pub fn parse_literal(text: &str) -> Option<i64> {
    if text == "0" {
        Some(0)
    } else if let Some(digits) = text.to_ascii_lowercase().strip_prefix("0x") {
        i64::from_str_radix(digits, 16).ok()
    } else if let Some(digits) = text.strip_prefix('0') {
        i64::from_str_radix(digits, 8).ok()
    } else {
        text.parse::<i64>().ok()
    }
}
