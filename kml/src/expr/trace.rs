//! Structured descriptions of expression trees.
//!
//! A [`Trace`] mirrors the tree it was taken from: every node has a kind, a
//! label (its compact rendering), named fields and, on request, its value.
//! Formatting is left to [`pretty`](crate::expr::pretty).

use strum::{Display, IntoStaticStr};

use crate::linalg::Matrix;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum NodeKind {
    ConstantNumber,
    NegativeNumber,
    BracketedNumber,
    NumberArithmetic,
    Determinant,
    NumberFunctionCall,
    ConstantMatrix,
    NamedMatrix,
    BracketedMatrix,
    MatrixUnaryOp,
    MatrixNumberOp,
    MatrixBinaryOp,
    MatrixFunctionCall,
    Assignment,
    Program,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TraceField {
    Node(Trace),
    List(Vec<TraceField>),
    Text(String),
    Integer(i64),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub kind: NodeKind,
    pub label: String,
    pub fields: Vec<(&'static str, TraceField)>,
    pub result: Option<Value>,
}

impl Trace {
    pub fn new(kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            fields: Vec::new(),
            result: None,
        }
    }

    pub fn with(mut self, name: &'static str, field: TraceField) -> Self {
        self.fields.push((name, field));
        self
    }

    pub fn with_result(mut self, result: Option<Value>) -> Self {
        self.result = result;
        self
    }

    pub fn field(&self, name: &str) -> Option<&TraceField> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    /// The recorded value, if it is a number.
    pub fn number_result(&self) -> Option<f64> {
        match self.result {
            Some(Value::Number(number)) => Some(number),
            _ => None,
        }
    }

    /// The recorded value, if it is a matrix.
    pub fn matrix_result(&self) -> Option<&Matrix> {
        match &self.result {
            Some(Value::Matrix(matrix)) => Some(matrix),
            _ => None,
        }
    }

    /// The field `name`, if it holds a single node.
    pub fn child(&self, name: &str) -> Option<&Trace> {
        match self.field(name) {
            Some(TraceField::Node(trace)) => Some(trace),
            _ => None,
        }
    }
}
