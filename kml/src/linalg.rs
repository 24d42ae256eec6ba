//! Dense real matrices.
//!
//! [`Matrix`] wraps a `nalgebra::DMatrix<f64>` and turns every dimension
//! precondition of the underlying library (which asserts) into a
//! [`Error::Shape`](crate::Error::Shape). Constructors take row-major data.

use std::fmt;

use nalgebra::DMatrix;
use rand::Rng;

use crate::error::{Error, KmlResult};

/// Largest number of entries a matrix may hold.
pub const MAX_ELEMENTS: usize = 1 << 24;

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix(DMatrix<f64>);

impl Matrix {
    /// Check that a `rows` by `columns` matrix can be allocated. The factories
    /// below assume their dimensions passed this check.
    pub fn check_dimensions(rows: usize, columns: usize) -> KmlResult<usize> {
        match rows.checked_mul(columns) {
            Some(elements) if elements <= MAX_ELEMENTS => Ok(elements),
            _ => Err(Error::shape(format!(
                "a {rows}x{columns} matrix exceeds the limit of {MAX_ELEMENTS} entries"
            ))),
        }
    }

    /// Build a matrix from a flat row-major buffer.
    pub fn from_row_major(rows: usize, columns: usize, data: &[f64]) -> KmlResult<Self> {
        let elements = Self::check_dimensions(rows, columns)?;
        if elements != data.len() {
            return Err(Error::shape(format!(
                "a {rows}x{columns} matrix needs {elements} values, but {} were provided",
                data.len()
            )));
        }
        Ok(Self(DMatrix::from_row_slice(rows, columns, data)))
    }

    /// Build a matrix from a rectangular literal. Ragged or empty input is
    /// rejected rather than padded.
    pub fn from_rows(rows: &[Vec<f64>]) -> KmlResult<Self> {
        let Some(first) = rows.first() else {
            return Err(Error::shape("cannot initialise a matrix with an empty array"));
        };
        let columns = first.len();
        if columns == 0 {
            return Err(Error::shape("cannot initialise a matrix with an empty array"));
        }
        if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns) {
            return Err(Error::shape(format!(
                "cannot initialise a matrix with an array that is not rectangular: row {index} has {} columns, but row 0 has {columns}",
                row.len()
            )));
        }
        let data: Vec<f64> = rows.iter().flatten().copied().collect();
        Self::from_row_major(rows.len(), columns, &data)
    }

    pub fn identity(rows: usize, columns: usize) -> Self {
        Self(DMatrix::identity(rows, columns))
    }

    pub fn zero(rows: usize, columns: usize) -> Self {
        Self(DMatrix::zeros(rows, columns))
    }

    pub fn constant(rows: usize, columns: usize, value: f64) -> Self {
        Self(DMatrix::from_element(rows, columns, value))
    }

    /// Entries drawn uniformly from `[-1, 1]`.
    pub fn random(rows: usize, columns: usize) -> Self {
        let mut rng = rand::rng();
        Self(DMatrix::from_fn(rows, columns, |_, _| {
            rng.random_range(-1.0..=1.0)
        }))
    }

    pub fn rows(&self) -> usize {
        self.0.nrows()
    }

    pub fn columns(&self) -> usize {
        self.0.ncols()
    }

    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        self.0.get((row, column)).copied()
    }

    /// Entries in row-major order.
    pub fn to_row_major(&self) -> Vec<f64> {
        self.row_vectors().into_iter().flatten().collect()
    }

    pub fn row_vectors(&self) -> Vec<Vec<f64>> {
        self.0
            .row_iter()
            .map(|row| row.iter().copied().collect())
            .collect()
    }

    pub fn is_square(&self) -> bool {
        self.0.is_square()
    }

    pub fn add(&self, rhs: &Matrix) -> KmlResult<Matrix> {
        self.require_same_shape(rhs, "add")?;
        Ok(Self(&self.0 + &rhs.0))
    }

    pub fn sub(&self, rhs: &Matrix) -> KmlResult<Matrix> {
        self.require_same_shape(rhs, "subtract")?;
        Ok(Self(&self.0 - &rhs.0))
    }

    pub fn mul(&self, rhs: &Matrix) -> KmlResult<Matrix> {
        if self.columns() != rhs.rows() {
            return Err(Error::shape(format!(
                "cannot multiply a {} matrix by a {} matrix",
                self.dimensions(),
                rhs.dimensions()
            )));
        }
        Ok(Self(&self.0 * &rhs.0))
    }

    pub fn scale(&self, factor: f64) -> Matrix {
        Self(self.0.map(|x| x * factor))
    }

    pub fn divide(&self, divisor: f64) -> Matrix {
        Self(self.0.map(|x| x / divisor))
    }

    pub fn negate(&self) -> Matrix {
        Self(self.0.map(|x| -x))
    }

    pub fn transpose(&self) -> Matrix {
        Self(self.0.transpose())
    }

    pub fn inverse(&self) -> KmlResult<Matrix> {
        self.require_square("invert")?;
        self.0
            .clone()
            .try_inverse()
            .map(Self)
            .ok_or_else(|| Error::shape("cannot invert a singular matrix"))
    }

    pub fn determinant(&self) -> KmlResult<f64> {
        self.require_square("compute the determinant of")?;
        Ok(self.0.determinant())
    }

    pub fn trace(&self) -> KmlResult<f64> {
        self.require_square("compute the trace of")?;
        Ok(self.0.trace())
    }

    /// Sum of element-wise products over the column-major flattening of both
    /// matrices.
    pub fn dot(&self, rhs: &Matrix) -> KmlResult<f64> {
        if self.0.len() != rhs.0.len() {
            return Err(Error::shape(format!(
                "cannot compute the dot product of a {} matrix and a {} matrix",
                self.dimensions(),
                rhs.dimensions()
            )));
        }
        Ok(self
            .0
            .iter()
            .zip(rhs.0.iter())
            .fold(0.0, |sum, (a, b)| sum + a * b))
    }

    fn dimensions(&self) -> String {
        format!("{}x{}", self.rows(), self.columns())
    }

    fn require_same_shape(&self, rhs: &Matrix, operation: &str) -> KmlResult<()> {
        if self.0.shape() != rhs.0.shape() {
            return Err(Error::shape(format!(
                "cannot {operation} a {} matrix and a {} matrix",
                self.dimensions(),
                rhs.dimensions()
            )));
        }
        Ok(())
    }

    fn require_square(&self, operation: &str) -> KmlResult<()> {
        if !self.is_square() {
            return Err(Error::shape(format!(
                "cannot {operation} a non-square {} matrix",
                self.dimensions()
            )));
        }
        Ok(())
    }
}

impl From<DMatrix<f64>> for Matrix {
    fn from(inner: DMatrix<f64>) -> Self {
        Self(inner)
    }
}

impl From<Matrix> for DMatrix<f64> {
    fn from(matrix: Matrix) -> Self {
        matrix.0
    }
}

/// Format a number with at most `precision` significant digits, switching to
/// exponent notation for very large or very small magnitudes.
pub(crate) fn format_significant(value: f64, precision: usize) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{value}");
    }
    let exponent = value.abs().log10().floor() as i32;
    if exponent < -5 || exponent >= precision as i32 {
        let text = format!("{:.*e}", precision.saturating_sub(1), value);
        match text.split_once('e') {
            Some((mantissa, exp)) => format!("{}e{exp}", trim_fraction(mantissa)),
            None => text,
        }
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.0.row_iter() {
            write!(f, "|")?;
            for value in row.iter() {
                write!(f, " {:>10}", format_significant(*value, 6))?;
            }
            writeln!(f, " |")?;
        }
        Ok(())
    }
}
