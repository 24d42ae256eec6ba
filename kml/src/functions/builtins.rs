//! The functions every session starts with.

use crate::error::{Error, KmlResult};
use crate::functions::{ArgKind, ArgValue, Function};
use crate::linalg::Matrix;
use crate::value::{Value, ValueKind};

pub(crate) fn all() -> Vec<Function> {
    vec![
        Function::new(
            "abs",
            "Absolute value of a number.",
            ValueKind::Number,
            vec![ArgKind::Number],
            |args| Ok(Value::Number(number(args, 0)?.abs())),
        ),
        Function::new(
            "trace",
            "Computes trace of a matrix.",
            ValueKind::Number,
            vec![ArgKind::Matrix],
            |args| Ok(Value::Number(matrix(args, 0)?.trace()?)),
        ),
        Function::new(
            "dot",
            "Dot product of two matrices of the same size.",
            ValueKind::Number,
            vec![ArgKind::Matrix, ArgKind::Matrix],
            |args| Ok(Value::Number(matrix(args, 0)?.dot(matrix(args, 1)?)?)),
        ),
        Function::new(
            "identity",
            "Creates a diagonal matrix of a given size.",
            ValueKind::Matrix,
            vec![ArgKind::Size, ArgKind::Size],
            |args| {
                let (rows, columns) = dimensions(args)?;
                Ok(Value::Matrix(Matrix::identity(rows, columns)))
            },
        ),
        Function::new(
            "zero",
            "Creates a zero matrix of a given size.",
            ValueKind::Matrix,
            vec![ArgKind::Size, ArgKind::Size],
            |args| {
                let (rows, columns) = dimensions(args)?;
                Ok(Value::Matrix(Matrix::zero(rows, columns)))
            },
        ),
        Function::new(
            "random",
            "Creates a random matrix of a given size.",
            ValueKind::Matrix,
            vec![ArgKind::Size, ArgKind::Size],
            |args| {
                let (rows, columns) = dimensions(args)?;
                Ok(Value::Matrix(Matrix::random(rows, columns)))
            },
        ),
        Function::new(
            "constant",
            "Creates a constant matrix of a given size.",
            ValueKind::Matrix,
            vec![ArgKind::Size, ArgKind::Size, ArgKind::Number],
            |args| {
                let (rows, columns) = dimensions(args)?;
                Ok(Value::Matrix(Matrix::constant(rows, columns, number(args, 2)?)))
            },
        ),
    ]
}

fn number(args: &[ArgValue], index: usize) -> KmlResult<f64> {
    match args.get(index) {
        Some(ArgValue::Number(n)) => Ok(*n),
        other => Err(mismatch(index, ArgKind::Number, other)),
    }
}

fn matrix(args: &[ArgValue], index: usize) -> KmlResult<&Matrix> {
    match args.get(index) {
        Some(ArgValue::Matrix(m)) => Ok(m),
        other => Err(mismatch(index, ArgKind::Matrix, other)),
    }
}

fn size(args: &[ArgValue], index: usize) -> KmlResult<usize> {
    match args.get(index) {
        Some(ArgValue::Size(n)) => usize::try_from(*n)
            .map_err(|_| Error::shape(format!("matrix dimension {n} is negative"))),
        other => Err(mismatch(index, ArgKind::Size, other)),
    }
}

fn dimensions(args: &[ArgValue]) -> KmlResult<(usize, usize)> {
    let (rows, columns) = (size(args, 0)?, size(args, 1)?);
    Matrix::check_dimensions(rows, columns)?;
    Ok((rows, columns))
}

fn mismatch(index: usize, expected: ArgKind, actual: Option<&ArgValue>) -> Error {
    let actual = actual.map_or_else(|| "nothing".to_string(), |a| a.kind().to_string());
    Error::type_mismatch(format!("argument {index}"), expected, actual)
}

#[cfg(test)]
mod tests {
    use crate::functions::FunctionTable;

    use super::*;

    fn call(name: &str, args: &[ArgValue]) -> KmlResult<Value> {
        FunctionTable::default().get(name)?.invoke(args)
    }

    #[test]
    fn abs() {
        assert_eq!(call("abs", &[ArgValue::Number(-4.0)]).unwrap(), Value::Number(4.0));
    }

    #[test]
    fn factories() {
        let id = call("identity", &[ArgValue::Size(3), ArgValue::Size(3)]).unwrap();
        assert_eq!(id, Value::Matrix(Matrix::identity(3, 3)));

        let c = call(
            "constant",
            &[ArgValue::Size(2), ArgValue::Size(3), ArgValue::Number(0.5)],
        )
        .unwrap();
        assert_eq!(c, Value::Matrix(Matrix::constant(2, 3, 0.5)));

        let z = call("zero", &[ArgValue::Size(1), ArgValue::Size(2)]).unwrap();
        assert_eq!(z, Value::Matrix(Matrix::zero(1, 2)));
    }

    #[test]
    fn negative_size_is_a_shape_error() {
        let err = call("random", &[ArgValue::Size(-1), ArgValue::Size(2)]).unwrap_err();
        assert!(err.is_shape());
    }

    #[test]
    fn oversized_factories_are_shape_errors() {
        for (rows, columns) in [(4_294_967_296, 4_294_967_296), (100_000, 100_000)] {
            for name in ["identity", "zero", "random"] {
                let err = call(name, &[ArgValue::Size(rows), ArgValue::Size(columns)]).unwrap_err();
                assert!(err.is_shape(), "{name}({rows},{columns}): {err}");
            }
            let err = call(
                "constant",
                &[ArgValue::Size(rows), ArgValue::Size(columns), ArgValue::Number(1.0)],
            )
            .unwrap_err();
            assert!(err.is_shape());
        }
    }

    #[test]
    fn dot_uses_both_arguments() {
        let a = Matrix::constant(2, 2, 2.0);
        let b = Matrix::identity(2, 2);
        let value = call("dot", &[ArgValue::Matrix(a), ArgValue::Matrix(b)]).unwrap();
        assert_eq!(value, Value::Number(4.0));
    }

    #[test]
    fn trace_of_identity() {
        let value = call("trace", &[ArgValue::Matrix(Matrix::identity(3, 3))]).unwrap();
        assert_eq!(value, Value::Number(3.0));
    }
}
