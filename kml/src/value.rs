use std::fmt;

use strum::{Display, EnumIs};

use crate::error::{Error, KmlResult};
use crate::linalg::{Matrix, format_significant};

/// The two kinds of value an expression can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ValueKind {
    Number,
    Matrix,
}

/// Result of evaluating a program or a function call.
#[derive(Debug, Clone, PartialEq, EnumIs)]
pub enum Value {
    Number(f64),
    Matrix(Matrix),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Number(_) => ValueKind::Number,
            Value::Matrix(_) => ValueKind::Matrix,
        }
    }

    pub fn into_number(self, context: &str) -> KmlResult<f64> {
        match self {
            Value::Number(n) => Ok(n),
            Value::Matrix(_) => Err(Error::type_mismatch(
                context,
                ValueKind::Number,
                ValueKind::Matrix,
            )),
        }
    }

    pub fn into_matrix(self, context: &str) -> KmlResult<Matrix> {
        match self {
            Value::Matrix(m) => Ok(m),
            Value::Number(_) => Err(Error::type_mismatch(
                context,
                ValueKind::Matrix,
                ValueKind::Number,
            )),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<Matrix> for Value {
    fn from(value: Matrix) -> Self {
        Value::Matrix(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", format_significant(*n, 6)),
            Value::Matrix(m) => write!(f, "\n{m}"),
        }
    }
}
