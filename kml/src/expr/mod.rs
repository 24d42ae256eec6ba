//! Expression model
//!
//! A parsed source is a tree of closed sum types. [`NumberExpr`] nodes only ever
//! produce numbers and [`MatrixExpr`] nodes only ever produce matrices, so the
//! "number versus matrix" distinction is checked by the compiler everywhere
//! except at the [`Expression`] root, where asking for the wrong kind is a
//! [`TypeMismatch`](crate::Error::TypeMismatch).
//!
//! Every node can
//! - evaluate itself against a [`MatrixCache`],
//! - render itself compactly (only the grouping the user wrote) or fully
//!   parenthesized (every operation grouped, re-parseable to the same value),
//! - describe itself as a [`Trace`] for the pretty-printer.
//!
//! Nodes own their children; there is no sharing between trees.
use std::{fmt, sync::Arc};

use strum::{Display, EnumIs};

use crate::error::{Error, KmlResult};
use crate::functions::{ArgKind, ArgValue, Function};
use crate::linalg::Matrix;
use crate::matrix_cache::MatrixCache;
use crate::value::Value;

pub mod assignment;
pub mod matrix;
pub mod number;
pub mod pretty;
pub mod trace;

pub use assignment::Assignment;
pub use matrix::{BinaryOp, MatrixExpr, ScaleOp, UnaryOp};
pub use number::{ArithmeticOp, NumberExpr};
pub use trace::{NodeKind, Trace, TraceField};

/// Root of a parsed expression.
#[derive(Debug, Clone, EnumIs)]
pub enum Expression {
    Number(NumberExpr),
    Matrix(MatrixExpr),
    Assignment(Assignment),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ExpressionKind {
    Number,
    Matrix,
    Assignment,
}

/// How much grouping a rendering shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Grouping {
    /// Only brackets the user wrote.
    Compact,
    /// Every operation bracketed.
    Full,
}

impl Expression {
    pub fn kind(&self) -> ExpressionKind {
        match self {
            Expression::Number(_) => ExpressionKind::Number,
            Expression::Matrix(_) => ExpressionKind::Matrix,
            Expression::Assignment(_) => ExpressionKind::Assignment,
        }
    }

    pub fn evaluate_number(&self, cache: &MatrixCache) -> KmlResult<f64> {
        match self {
            Expression::Number(number) => number.evaluate(cache),
            other => Err(other.mismatch("a number")),
        }
    }

    pub fn evaluate_matrix(&self, cache: &MatrixCache) -> KmlResult<Matrix> {
        match self {
            Expression::Matrix(matrix) => matrix.evaluate(cache),
            other => Err(other.mismatch("a matrix")),
        }
    }

    /// Evaluate a number or matrix expression. Assignments have no value.
    pub fn evaluate(&self, cache: &MatrixCache) -> KmlResult<Value> {
        match self {
            Expression::Number(number) => number.evaluate(cache).map(Value::Number),
            Expression::Matrix(matrix) => matrix.evaluate(cache).map(Value::Matrix),
            Expression::Assignment(_) => Err(self.mismatch("a value")),
        }
    }

    pub fn render_compact(&self) -> String {
        self.render(Grouping::Compact)
    }

    pub fn render_fully_parenthesized(&self) -> String {
        self.render(Grouping::Full)
    }

    pub(crate) fn render(&self, grouping: Grouping) -> String {
        let mut out = String::new();
        match self {
            Expression::Number(number) => number.write(&mut out, grouping),
            Expression::Matrix(matrix) => matrix.write(&mut out, grouping),
            Expression::Assignment(assignment) => assignment.write(&mut out, grouping),
        }
        out
    }

    /// Describe this expression. With a cache, every node carries its value.
    pub fn trace(&self, results: Option<&MatrixCache>) -> KmlResult<Trace> {
        match self {
            Expression::Number(number) => number.trace(results),
            Expression::Matrix(matrix) => matrix.trace(results),
            Expression::Assignment(assignment) => assignment.trace(results),
        }
    }

    fn mismatch(&self, wanted: &str) -> Error {
        Error::type_mismatch(
            format!("evaluation of `{}`", self.render_compact()),
            format!("{wanted} expression"),
            format!("{} expression", self.kind()),
        )
    }
}

impl From<NumberExpr> for Expression {
    fn from(value: NumberExpr) -> Self {
        Expression::Number(value)
    }
}

impl From<MatrixExpr> for Expression {
    fn from(value: MatrixExpr) -> Self {
        Expression::Matrix(value)
    }
}

impl From<Assignment> for Expression {
    fn from(value: Assignment) -> Self {
        Expression::Assignment(value)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_compact())
    }
}

/// One argument of a function call. The variant is fixed by the callee's
/// declared parameter kind.
#[derive(Debug, Clone)]
pub enum Argument {
    Size(i64),
    Number(NumberExpr),
    Matrix(MatrixExpr),
}

impl Argument {
    pub fn kind(&self) -> ArgKind {
        match self {
            Argument::Size(_) => ArgKind::Size,
            Argument::Number(_) => ArgKind::Number,
            Argument::Matrix(_) => ArgKind::Matrix,
        }
    }

    fn evaluate(&self, cache: &MatrixCache) -> KmlResult<ArgValue> {
        Ok(match self {
            Argument::Size(size) => ArgValue::Size(*size),
            Argument::Number(number) => ArgValue::Number(number.evaluate(cache)?),
            Argument::Matrix(matrix) => ArgValue::Matrix(matrix.evaluate(cache)?),
        })
    }

    fn height(&self) -> usize {
        match self {
            Argument::Size(_) => 1,
            Argument::Number(number) => number.height(),
            Argument::Matrix(matrix) => matrix.height(),
        }
    }

    fn write(&self, out: &mut String, grouping: Grouping) {
        match self {
            Argument::Size(size) => out.push_str(&size.to_string()),
            Argument::Number(number) => number.write(out, grouping),
            Argument::Matrix(matrix) => matrix.write(out, grouping),
        }
    }

    fn trace(&self, results: Option<&MatrixCache>) -> KmlResult<TraceField> {
        Ok(match self {
            Argument::Size(size) => TraceField::Integer(*size),
            Argument::Number(number) => TraceField::Node(number.trace(results)?),
            Argument::Matrix(matrix) => TraceField::Node(matrix.trace(results)?),
        })
    }
}

/// A resolved call of a registered function.
#[derive(Debug, Clone)]
pub struct FunctionCall {
    function: Arc<Function>,
    arguments: Vec<Argument>,
}

impl FunctionCall {
    pub fn new(function: Arc<Function>, arguments: Vec<Argument>) -> Self {
        Self {
            function,
            arguments,
        }
    }

    pub fn function(&self) -> &Arc<Function> {
        &self.function
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub(crate) fn height(&self) -> usize {
        self.arguments.iter().map(Argument::height).max().unwrap_or(0)
    }

    fn check_arguments(&self) -> KmlResult<()> {
        let kinds: Vec<ArgKind> = self.arguments.iter().map(Argument::kind).collect();
        self.function.check_arguments(&kinds)
    }

    /// Check the signature, evaluate the arguments in order, then run the body.
    pub(crate) fn invoke(&self, cache: &MatrixCache) -> KmlResult<Value> {
        self.check_arguments()?;
        let values = self
            .arguments
            .iter()
            .map(|argument| argument.evaluate(cache))
            .collect::<KmlResult<Vec<_>>>()?;
        self.function.invoke(&values)
    }

    pub(crate) fn result_context(&self) -> String {
        format!("result of {}", self.function.name())
    }

    pub(crate) fn write(&self, out: &mut String, grouping: Grouping) {
        out.push_str(self.function.name());
        out.push('(');
        for (index, argument) in self.arguments.iter().enumerate() {
            if index > 0 {
                out.push_str(", ");
            }
            argument.write(out, grouping);
        }
        out.push(')');
    }

    /// Trace the arguments, then run the body on their recorded results so
    /// the call's value agrees with what its arguments show.
    pub(crate) fn trace(
        &self,
        kind: NodeKind,
        label: String,
        results: Option<&MatrixCache>,
    ) -> KmlResult<Trace> {
        if results.is_some() {
            self.check_arguments()?;
        }
        let arguments = self
            .arguments
            .iter()
            .map(|argument| argument.trace(results))
            .collect::<KmlResult<Vec<_>>>()?;
        let result = arguments
            .iter()
            .map(traced_argument)
            .collect::<Option<Vec<_>>>()
            .filter(|_| results.is_some())
            .map(|values| self.function.invoke(&values))
            .transpose()?;
        Ok(Trace::new(kind, label)
            .with("function", TraceField::Text(self.function.name().to_string()))
            .with("arguments", TraceField::List(arguments))
            .with_result(result))
    }
}

fn traced_argument(field: &TraceField) -> Option<ArgValue> {
    match field {
        TraceField::Integer(size) => Some(ArgValue::Size(*size)),
        TraceField::Node(trace) => match trace.result.clone()? {
            Value::Number(number) => Some(ArgValue::Number(number)),
            Value::Matrix(matrix) => Some(ArgValue::Matrix(matrix)),
        },
        _ => None,
    }
}
