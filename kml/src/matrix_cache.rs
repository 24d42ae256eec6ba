//! Named matrices visible to expressions.
//!
//! Names are stored exactly as written. Lookups are exact; letter case only
//! matters when binding, where a name that equals an existing matrix or
//! function ignoring case is rejected.

use std::{collections::BTreeMap, sync::Arc};

use log::debug;

use crate::error::{Error, KmlResult, NameKind};
use crate::expr::Expression;
use crate::functions::FunctionTable;
use crate::linalg::Matrix;
use crate::parser::Parser;

#[derive(Debug, Clone)]
pub struct MatrixCache {
    functions: Arc<FunctionTable>,
    matrices: BTreeMap<String, Matrix>,
}

impl MatrixCache {
    pub fn new(functions: Arc<FunctionTable>) -> Self {
        Self {
            functions,
            matrices: BTreeMap::new(),
        }
    }

    pub fn functions(&self) -> &Arc<FunctionTable> {
        &self.functions
    }

    /// Bind `name` to `matrix`.
    pub fn bind(&mut self, name: &str, matrix: Matrix) -> KmlResult<()> {
        if let Some(existing) = self
            .matrices
            .keys()
            .find(|existing| existing.eq_ignore_ascii_case(name))
        {
            return Err(Error::NameCollision {
                name: name.to_string(),
                existing: existing.clone(),
                kind: NameKind::Matrix,
            });
        }
        if let Some(function) = self.functions.find_case_insensitive(name) {
            return Err(Error::NameCollision {
                name: name.to_string(),
                existing: function.name().to_string(),
                kind: NameKind::Function,
            });
        }
        debug!(
            "Bound matrix `{name}` ({}x{})",
            matrix.rows(),
            matrix.columns()
        );
        self.matrices.insert(name.to_string(), matrix);
        Ok(())
    }

    /// Parse `code` as a matrix expression, evaluate it against the current
    /// bindings and bind the result to `name`.
    pub fn bind_from_expression(&mut self, name: &str, code: &str) -> KmlResult<()> {
        let expression = Parser::new(&self.functions).parse_expression(code)?;
        let matrix = match expression {
            Expression::Matrix(matrix) => matrix.evaluate(self)?,
            other => {
                return Err(Error::type_mismatch(
                    format!("binding of {name}"),
                    "matrix expression",
                    format!("{} expression", other.kind()),
                ));
            }
        };
        self.bind(name, matrix)
    }

    /// Exact lookup. On a miss the error suggests a matrix whose name only
    /// differs by case.
    pub fn lookup(&self, name: &str) -> KmlResult<&Matrix> {
        self.find(name).ok_or_else(|| Error::UnknownName {
            kind: NameKind::Matrix,
            name: name.to_string(),
            suggestion: self
                .matrices
                .keys()
                .find(|existing| existing.eq_ignore_ascii_case(name))
                .cloned(),
        })
    }

    pub fn find(&self, name: &str) -> Option<&Matrix> {
        self.matrices.get(name)
    }

    /// Remove a binding, returning the matrix it held.
    pub fn unbind(&mut self, name: &str) -> Option<Matrix> {
        let removed = self.matrices.remove(name);
        if removed.is_some() {
            debug!("Unbound matrix `{name}`");
        }
        removed
    }

    /// Reinstate a binding that was present before an activation. The caller
    /// guarantees that no colliding name is bound.
    pub(crate) fn reinstate(&mut self, name: &str, matrix: Matrix) {
        debug!("Reinstated matrix `{name}`");
        self.matrices.insert(name.to_string(), matrix);
    }

    /// Bound names in sorted order.
    pub fn list(&self) -> Vec<String> {
        self.matrices.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Matrix)> {
        self.matrices.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn clear(&mut self) {
        self.matrices.clear();
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> MatrixCache {
        MatrixCache::new(Arc::new(FunctionTable::default()))
    }

    #[test]
    fn case_insensitive_collision() {
        let mut cache = cache();
        cache.bind("m1", Matrix::identity(2, 2)).unwrap();
        let err = cache.bind("M1", Matrix::identity(2, 2)).unwrap_err();
        assert!(err.is_name_collision());
        assert!(cache.bind("m1", Matrix::zero(1, 1)).unwrap_err().is_name_collision());
        assert_eq!(cache.list(), vec!["m1".to_string()]);
    }

    #[test]
    fn function_names_are_reserved() {
        let mut cache = cache();
        match cache.bind("Identity", Matrix::zero(1, 1)).unwrap_err() {
            Error::NameCollision { existing, kind, .. } => {
                assert_eq!(existing, "identity");
                assert_eq!(kind, NameKind::Function);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn lookup_suggests_other_case() {
        let mut cache = cache();
        cache.bind("Alpha", Matrix::identity(1, 1)).unwrap();
        assert!(cache.lookup("Alpha").is_ok());
        assert!(cache.find("alpha").is_none());
        assert_eq!(
            cache.lookup("alpha").unwrap_err().to_string(),
            "Matrix alpha does not exist. Did you mean: Alpha?"
        );
        assert_eq!(
            cache.lookup("beta").unwrap_err().to_string(),
            "Matrix beta does not exist."
        );
    }

    #[test]
    fn bind_from_expression() {
        let mut cache = cache();
        cache.bind_from_expression("a", "2 identity(2,2)").unwrap();
        cache.bind_from_expression("b", "a^-1").unwrap();
        assert_eq!(cache.lookup("b").unwrap(), &Matrix::identity(2, 2).scale(0.5));

        let err = cache.bind_from_expression("c", "trace(a)").unwrap_err();
        assert!(err.is_type_mismatch());
        assert!(cache.find("c").is_none());
    }

    #[test]
    fn unbind_and_clear() {
        let mut cache = cache();
        cache.bind("x", Matrix::identity(1, 1)).unwrap();
        cache.bind("y", Matrix::identity(1, 1)).unwrap();
        assert_eq!(cache.unbind("x"), Some(Matrix::identity(1, 1)));
        assert_eq!(cache.unbind("x"), None);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
