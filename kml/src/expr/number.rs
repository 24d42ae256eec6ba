use std::{fmt, sync::Arc};

use strum::Display;

use crate::error::KmlResult;
use crate::expr::{Argument, FunctionCall, Grouping, MatrixExpr, NodeKind, Trace, TraceField};
use crate::functions::Function;
use crate::linalg::Matrix;
use crate::matrix_cache::MatrixCache;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ArithmeticOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
}

impl ArithmeticOp {
    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            ArithmeticOp::Add => lhs + rhs,
            ArithmeticOp::Sub => lhs - rhs,
            ArithmeticOp::Mul => lhs * rhs,
            ArithmeticOp::Div => lhs / rhs,
        }
    }
}

/// A scalar-valued expression.
#[derive(Debug, Clone)]
pub enum NumberExpr {
    Constant(f64),
    Negative(Box<NumberExpr>),
    /// Brackets the user wrote. Affects rendering only.
    Bracketed(Box<NumberExpr>),
    Arithmetic {
        lhs: Box<NumberExpr>,
        rhs: Box<NumberExpr>,
        op: ArithmeticOp,
    },
    Determinant(Box<MatrixExpr>),
    Call(FunctionCall),
}

impl NumberExpr {
    pub fn constant(value: f64) -> Self {
        NumberExpr::Constant(value)
    }

    pub fn negative(number: NumberExpr) -> Self {
        NumberExpr::Negative(Box::new(number))
    }

    pub fn bracketed(number: NumberExpr) -> Self {
        NumberExpr::Bracketed(Box::new(number))
    }

    pub fn arithmetic(lhs: NumberExpr, op: ArithmeticOp, rhs: NumberExpr) -> Self {
        NumberExpr::Arithmetic {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            op,
        }
    }

    pub fn determinant(matrix: MatrixExpr) -> Self {
        NumberExpr::Determinant(Box::new(matrix))
    }

    pub fn call(function: Arc<Function>, arguments: Vec<Argument>) -> Self {
        NumberExpr::Call(FunctionCall::new(function, arguments))
    }

    pub fn evaluate(&self, cache: &MatrixCache) -> KmlResult<f64> {
        match self {
            NumberExpr::Constant(value) => Ok(*value),
            NumberExpr::Negative(number) => Ok(-number.evaluate(cache)?),
            NumberExpr::Bracketed(number) => number.evaluate(cache),
            NumberExpr::Arithmetic { lhs, rhs, op } => {
                Ok(op.apply(lhs.evaluate(cache)?, rhs.evaluate(cache)?))
            }
            NumberExpr::Determinant(matrix) => matrix.evaluate(cache)?.determinant(),
            NumberExpr::Call(call) => call.invoke(cache)?.into_number(&call.result_context()),
        }
    }

    /// Number of nodes on the longest path down from this one.
    pub fn height(&self) -> usize {
        match self {
            NumberExpr::Constant(_) => 1,
            NumberExpr::Negative(number) | NumberExpr::Bracketed(number) => number.height() + 1,
            NumberExpr::Arithmetic { lhs, rhs, .. } => lhs.height().max(rhs.height()) + 1,
            NumberExpr::Determinant(matrix) => matrix.height() + 1,
            NumberExpr::Call(call) => call.height() + 1,
        }
    }

    pub fn render_compact(&self) -> String {
        let mut out = String::new();
        self.write(&mut out, Grouping::Compact);
        out
    }

    pub fn render_fully_parenthesized(&self) -> String {
        let mut out = String::new();
        self.write(&mut out, Grouping::Full);
        out
    }

    pub(crate) fn write(&self, out: &mut String, grouping: Grouping) {
        let full = grouping == Grouping::Full;
        match self {
            NumberExpr::Constant(value) => out.push_str(&value.to_string()),
            NumberExpr::Negative(number) => {
                if full {
                    out.push('(');
                }
                out.push('-');
                number.write(out, grouping);
                if full {
                    out.push(')');
                }
            }
            NumberExpr::Bracketed(number) => {
                out.push('(');
                number.write(out, grouping);
                out.push(')');
            }
            NumberExpr::Arithmetic { lhs, rhs, op } => {
                if full {
                    out.push('(');
                }
                lhs.write(out, grouping);
                out.push_str(&op.to_string());
                rhs.write(out, grouping);
                if full {
                    out.push(')');
                }
            }
            NumberExpr::Determinant(matrix) => {
                out.push('|');
                matrix.write(out, grouping);
                out.push('|');
            }
            NumberExpr::Call(call) => call.write(out, grouping),
        }
    }

    /// Describe this node. With a cache, every node records its value, each
    /// computed once from the values recorded for its children.
    pub fn trace(&self, results: Option<&MatrixCache>) -> KmlResult<Trace> {
        let label = self.render_compact();
        let (trace, value) = match self {
            NumberExpr::Constant(value) => (Trace::new(NodeKind::ConstantNumber, label), Some(*value)),
            NumberExpr::Negative(number) => {
                let number = number.trace(results)?;
                let value = number.number_result().map(|n| -n);
                let trace = Trace::new(NodeKind::NegativeNumber, label)
                    .with("number", TraceField::Node(number));
                (trace, value)
            }
            NumberExpr::Bracketed(number) => {
                let number = number.trace(results)?;
                let value = number.number_result();
                let trace = Trace::new(NodeKind::BracketedNumber, label)
                    .with("number", TraceField::Node(number));
                (trace, value)
            }
            NumberExpr::Arithmetic { lhs, rhs, op } => {
                let lhs = lhs.trace(results)?;
                let rhs = rhs.trace(results)?;
                let value = lhs
                    .number_result()
                    .zip(rhs.number_result())
                    .map(|(lhs, rhs)| op.apply(lhs, rhs));
                let trace = Trace::new(NodeKind::NumberArithmetic, label)
                    .with("lhs", TraceField::Node(lhs))
                    .with("rhs", TraceField::Node(rhs))
                    .with("op", TraceField::Text(op.to_string()));
                (trace, value)
            }
            NumberExpr::Determinant(matrix) => {
                let matrix = matrix.trace(results)?;
                let value = matrix.matrix_result().map(Matrix::determinant).transpose()?;
                let trace = Trace::new(NodeKind::Determinant, label)
                    .with("matrix", TraceField::Node(matrix));
                (trace, value)
            }
            NumberExpr::Call(call) => {
                let trace = call.trace(NodeKind::NumberFunctionCall, label, results)?;
                let value = trace
                    .result
                    .clone()
                    .map(|value| value.into_number(&call.result_context()))
                    .transpose()?;
                (trace, value)
            }
        };
        Ok(trace.with_result(results.and(value.map(Value::Number))))
    }
}

impl fmt::Display for NumberExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_compact())
    }
}
