use std::{fmt, sync::Arc};

use strum::Display;

use crate::error::KmlResult;
use crate::expr::{Argument, FunctionCall, Grouping, NodeKind, NumberExpr, Trace, TraceField};
use crate::functions::Function;
use crate::linalg::Matrix;
use crate::matrix_cache::MatrixCache;
use crate::value::Value;

/// Postfix and prefix operators on a single matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum UnaryOp {
    #[strum(serialize = "^T")]
    Transpose,
    #[strum(serialize = "^-1")]
    Inverse,
    #[strum(serialize = "-")]
    Negate,
}

/// Scaling of a matrix by a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ScaleOp {
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
}

/// Operators between two matrices. `Mul` is the matrix product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum BinaryOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
}

impl UnaryOp {
    pub fn apply(self, operand: &Matrix) -> KmlResult<Matrix> {
        match self {
            UnaryOp::Transpose => Ok(operand.transpose()),
            UnaryOp::Inverse => operand.inverse(),
            UnaryOp::Negate => Ok(operand.negate()),
        }
    }
}

impl ScaleOp {
    pub fn apply(self, matrix: &Matrix, number: f64) -> Matrix {
        match self {
            ScaleOp::Mul => matrix.scale(number),
            ScaleOp::Div => matrix.divide(number),
        }
    }
}

impl BinaryOp {
    pub fn apply(self, lhs: &Matrix, rhs: &Matrix) -> KmlResult<Matrix> {
        match self {
            BinaryOp::Add => lhs.add(rhs),
            BinaryOp::Sub => lhs.sub(rhs),
            BinaryOp::Mul => lhs.mul(rhs),
        }
    }
}

/// A matrix-valued expression.
#[derive(Debug, Clone)]
pub enum MatrixExpr {
    /// A literal, already fully evaluated.
    Constant(Matrix),
    /// Resolved against the cache when evaluated, never when parsed.
    Named(String),
    Bracketed(Box<MatrixExpr>),
    Unary {
        operand: Box<MatrixExpr>,
        op: UnaryOp,
    },
    Scaled {
        matrix: Box<MatrixExpr>,
        number: Box<NumberExpr>,
        op: ScaleOp,
    },
    Binary {
        lhs: Box<MatrixExpr>,
        rhs: Box<MatrixExpr>,
        op: BinaryOp,
    },
    Call(FunctionCall),
}

impl MatrixExpr {
    pub fn constant(matrix: Matrix) -> Self {
        MatrixExpr::Constant(matrix)
    }

    pub fn named(name: impl Into<String>) -> Self {
        MatrixExpr::Named(name.into())
    }

    pub fn bracketed(matrix: MatrixExpr) -> Self {
        MatrixExpr::Bracketed(Box::new(matrix))
    }

    pub fn unary(operand: MatrixExpr, op: UnaryOp) -> Self {
        MatrixExpr::Unary {
            operand: Box::new(operand),
            op,
        }
    }

    pub fn scaled(matrix: MatrixExpr, op: ScaleOp, number: NumberExpr) -> Self {
        MatrixExpr::Scaled {
            matrix: Box::new(matrix),
            number: Box::new(number),
            op,
        }
    }

    pub fn binary(lhs: MatrixExpr, op: BinaryOp, rhs: MatrixExpr) -> Self {
        MatrixExpr::Binary {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            op,
        }
    }

    pub fn call(function: Arc<Function>, arguments: Vec<Argument>) -> Self {
        MatrixExpr::Call(FunctionCall::new(function, arguments))
    }

    pub fn evaluate(&self, cache: &MatrixCache) -> KmlResult<Matrix> {
        match self {
            MatrixExpr::Constant(matrix) => Ok(matrix.clone()),
            MatrixExpr::Named(name) => cache.lookup(name).cloned(),
            MatrixExpr::Bracketed(matrix) => matrix.evaluate(cache),
            MatrixExpr::Unary { operand, op } => op.apply(&operand.evaluate(cache)?),
            MatrixExpr::Scaled { matrix, number, op } => {
                let matrix = matrix.evaluate(cache)?;
                Ok(op.apply(&matrix, number.evaluate(cache)?))
            }
            MatrixExpr::Binary { lhs, rhs, op } => {
                let lhs = lhs.evaluate(cache)?;
                op.apply(&lhs, &rhs.evaluate(cache)?)
            }
            MatrixExpr::Call(call) => call.invoke(cache)?.into_matrix(&call.result_context()),
        }
    }

    /// Number of nodes on the longest path down from this one.
    pub fn height(&self) -> usize {
        match self {
            MatrixExpr::Constant(_) | MatrixExpr::Named(_) => 1,
            MatrixExpr::Bracketed(matrix) => matrix.height() + 1,
            MatrixExpr::Unary { operand, .. } => operand.height() + 1,
            MatrixExpr::Scaled { matrix, number, .. } => matrix.height().max(number.height()) + 1,
            MatrixExpr::Binary { lhs, rhs, .. } => lhs.height().max(rhs.height()) + 1,
            MatrixExpr::Call(call) => call.height() + 1,
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
        let open = |out: &mut String| {
            if full {
                out.push('(');
            }
        };
        let close = |out: &mut String| {
            if full {
                out.push(')');
            }
        };
        match self {
            MatrixExpr::Constant(matrix) => write_literal(out, matrix),
            MatrixExpr::Named(name) => out.push_str(name),
            MatrixExpr::Bracketed(matrix) => {
                out.push('(');
                matrix.write(out, grouping);
                out.push(')');
            }
            MatrixExpr::Unary { operand, op } => {
                open(out);
                if *op == UnaryOp::Negate {
                    out.push('-');
                    operand.write(out, grouping);
                } else {
                    operand.write(out, grouping);
                    out.push_str(&op.to_string());
                }
                close(out);
            }
            // A scaled matrix reads `number*matrix` but `matrix/number`.
            MatrixExpr::Scaled { matrix, number, op } => {
                open(out);
                match op {
                    ScaleOp::Mul => {
                        number.write(out, grouping);
                        out.push('*');
                        matrix.write(out, grouping);
                    }
                    ScaleOp::Div => {
                        matrix.write(out, grouping);
                        out.push('/');
                        number.write(out, grouping);
                    }
                }
                close(out);
            }
            MatrixExpr::Binary { lhs, rhs, op } => {
                open(out);
                lhs.write(out, grouping);
                out.push_str(&op.to_string());
                rhs.write(out, grouping);
                close(out);
            }
            MatrixExpr::Call(call) => call.write(out, grouping),
        }
    }

    pub fn trace(&self, results: Option<&MatrixCache>) -> KmlResult<Trace> {
        let label = self.render_compact();
        let (trace, value) = match self {
            MatrixExpr::Constant(matrix) => {
                let data = matrix
                    .to_row_major()
                    .into_iter()
                    .map(TraceField::Number)
                    .collect();
                let trace = Trace::new(NodeKind::ConstantMatrix, label)
                    .with("rows", TraceField::Integer(matrix.rows() as i64))
                    .with("columns", TraceField::Integer(matrix.columns() as i64))
                    .with("data", TraceField::List(data));
                (trace, results.map(|_| matrix.clone()))
            }
            MatrixExpr::Named(name) => {
                let value = results.map(|cache| cache.lookup(name).cloned()).transpose()?;
                let trace = Trace::new(NodeKind::NamedMatrix, label)
                    .with("name", TraceField::Text(name.clone()));
                (trace, value)
            }
            MatrixExpr::Bracketed(matrix) => {
                let matrix = matrix.trace(results)?;
                let value = matrix.matrix_result().cloned();
                let trace = Trace::new(NodeKind::BracketedMatrix, label)
                    .with("matrix", TraceField::Node(matrix));
                (trace, value)
            }
            MatrixExpr::Unary { operand, op } => {
                let operand = operand.trace(results)?;
                let value = operand.matrix_result().map(|m| op.apply(m)).transpose()?;
                let trace = Trace::new(NodeKind::MatrixUnaryOp, label)
                    .with("matrix", TraceField::Node(operand))
                    .with("op", TraceField::Text(op.to_string()));
                (trace, value)
            }
            MatrixExpr::Scaled { matrix, number, op } => {
                let matrix = matrix.trace(results)?;
                let number = number.trace(results)?;
                let value = matrix
                    .matrix_result()
                    .zip(number.number_result())
                    .map(|(m, n)| op.apply(m, n));
                let trace = Trace::new(NodeKind::MatrixNumberOp, label)
                    .with("matrix", TraceField::Node(matrix))
                    .with("number", TraceField::Node(number))
                    .with("op", TraceField::Text(op.to_string()));
                (trace, value)
            }
            MatrixExpr::Binary { lhs, rhs, op } => {
                let lhs = lhs.trace(results)?;
                let rhs = rhs.trace(results)?;
                let value = lhs
                    .matrix_result()
                    .zip(rhs.matrix_result())
                    .map(|(l, r)| op.apply(l, r))
                    .transpose()?;
                let trace = Trace::new(NodeKind::MatrixBinaryOp, label)
                    .with("lhs", TraceField::Node(lhs))
                    .with("rhs", TraceField::Node(rhs))
                    .with("op", TraceField::Text(op.to_string()));
                (trace, value)
            }
            MatrixExpr::Call(call) => {
                let trace = call.trace(NodeKind::MatrixFunctionCall, label, results)?;
                let value = trace
                    .result
                    .clone()
                    .map(|value| value.into_matrix(&call.result_context()))
                    .transpose()?;
                (trace, value)
            }
        };
        Ok(trace.with_result(results.and(value.map(Value::Matrix))))
    }
}

/// Write a literal as `[[a,b],[c,d]]`, the form the parser accepts.
fn write_literal(out: &mut String, matrix: &Matrix) {
    out.push('[');
    for (r, row) in matrix.row_vectors().iter().enumerate() {
        if r > 0 {
            out.push(',');
        }
        out.push('[');
        for (c, value) in row.iter().enumerate() {
            if c > 0 {
                out.push(',');
            }
            out.push_str(&value.to_string());
        }
        out.push(']');
    }
    out.push(']');
}

impl fmt::Display for MatrixExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_compact())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::FunctionTable;

    fn cache() -> MatrixCache {
        let mut cache = MatrixCache::new(Arc::new(FunctionTable::default()));
        cache
            .bind(
                "m",
                Matrix::from_rows(&[vec![4.0, 7.0], vec![2.0, 6.0]]).unwrap(),
            )
            .unwrap();
        cache
    }

    fn close(a: &Matrix, b: &Matrix) -> bool {
        a.to_row_major()
            .iter()
            .zip(b.to_row_major())
            .all(|(x, y)| (x - y).abs() < 1e-12)
    }

    #[test]
    fn postfix_order() {
        // m^T^-1 is the inverse of the transpose.
        let expr = MatrixExpr::unary(
            MatrixExpr::unary(MatrixExpr::named("m"), UnaryOp::Transpose),
            UnaryOp::Inverse,
        );
        let cache = cache();
        let m = cache.lookup("m").unwrap();
        let expected = m.transpose().inverse().unwrap();
        assert!(close(&expr.evaluate(&cache).unwrap(), &expected));
        assert_eq!(expr.render_compact(), "m^T^-1");
        assert_eq!(expr.render_fully_parenthesized(), "((m^T)^-1)");
    }

    #[test]
    fn scaling_renders_number_first() {
        let expr = MatrixExpr::scaled(MatrixExpr::named("m"), ScaleOp::Mul, NumberExpr::constant(3.0));
        assert_eq!(expr.render_compact(), "3*m");
        let expr = MatrixExpr::scaled(MatrixExpr::named("m"), ScaleOp::Div, NumberExpr::constant(2.0));
        assert_eq!(expr.render_fully_parenthesized(), "(m/2)");
        assert_eq!(
            expr.evaluate(&cache()).unwrap(),
            Matrix::from_rows(&[vec![2.0, 3.5], vec![1.0, 3.0]]).unwrap()
        );
    }

    #[test]
    fn literal_rendering() {
        let literal = Matrix::from_rows(&[vec![1.0, 2.5], vec![-3.0, 4.0]]).unwrap();
        let expr = MatrixExpr::constant(literal.clone());
        assert_eq!(expr.render_compact(), "[[1,2.5],[-3,4]]");
        assert_eq!(expr.evaluate(&cache()).unwrap(), literal);
    }

    #[test]
    fn unknown_name_is_reported_at_evaluation() {
        let err = MatrixExpr::named("M").evaluate(&cache()).unwrap_err();
        assert_eq!(err.to_string(), "Matrix M does not exist. Did you mean: m?");
    }

    #[test]
    fn product_shape_mismatch() {
        let lhs = MatrixExpr::constant(Matrix::zero(2, 3));
        let expr = MatrixExpr::binary(lhs.clone(), BinaryOp::Mul, lhs);
        assert!(expr.evaluate(&cache()).unwrap_err().is_shape());
    }

    #[test]
    fn traced_values_agree_with_their_children() {
        let table = FunctionTable::default();
        let random = table.get("random").unwrap().clone();
        let expr = MatrixExpr::unary(
            MatrixExpr::call(random, vec![Argument::Size(2), Argument::Size(2)]),
            UnaryOp::Transpose,
        );
        let trace = expr.trace(Some(&cache())).unwrap();
        let drawn = trace.child("matrix").and_then(Trace::matrix_result).unwrap();
        assert_eq!(trace.matrix_result(), Some(&drawn.transpose()));
    }

    #[test]
    fn trace_of_named_matrix() {
        let cache = cache();
        let trace = MatrixExpr::unary(MatrixExpr::named("m"), UnaryOp::Negate)
            .trace(Some(&cache))
            .unwrap();
        assert_eq!(trace.kind, NodeKind::MatrixUnaryOp);
        assert_eq!(trace.label, "-m");
        assert_eq!(trace.field("op"), Some(&TraceField::Text("-".into())));
        assert_eq!(
            trace.result,
            Some(Value::Matrix(cache.lookup("m").unwrap().negate()))
        );
    }
}
