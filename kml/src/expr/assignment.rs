use std::fmt;

use log::debug;

use crate::error::KmlResult;
use crate::expr::{Grouping, MatrixExpr, NodeKind, Trace, TraceField};
use crate::linalg::Matrix;
use crate::matrix_cache::MatrixCache;

/// `name = value;`
#[derive(Debug, Clone)]
pub struct Assignment {
    name: String,
    value: MatrixExpr,
}

impl Assignment {
    pub fn new(name: impl Into<String>, value: MatrixExpr) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &MatrixExpr {
        &self.value
    }

    /// Bind the value to the name, returning whatever was bound before.
    ///
    /// The value is evaluated against the bindings as they are before this
    /// assignment, so `m = 2 m;` scales the previous `m`. On failure the cache
    /// is left exactly as it was.
    pub fn activate(&self, cache: &mut MatrixCache) -> KmlResult<Option<Matrix>> {
        let value = match &self.value {
            MatrixExpr::Constant(matrix) => matrix.clone(),
            other => other.evaluate(cache)?,
        };
        self.activate_with(cache, value)
    }

    /// [`activate`](Self::activate) with a value evaluated beforehand.
    pub(crate) fn activate_with(
        &self,
        cache: &mut MatrixCache,
        value: Matrix,
    ) -> KmlResult<Option<Matrix>> {
        let saved = cache.unbind(&self.name);
        if let Err(err) = cache.bind(&self.name, value) {
            if let Some(previous) = saved {
                cache.reinstate(&self.name, previous);
            }
            return Err(err);
        }
        debug!("Activated assignment to `{}`", self.name);
        Ok(saved)
    }

    /// Undo [`activate`](Self::activate): drop the binding and put back the
    /// saved matrix, if there was one.
    pub fn restore(&self, cache: &mut MatrixCache, saved: Option<Matrix>) {
        cache.unbind(&self.name);
        if let Some(previous) = saved {
            cache.reinstate(&self.name, previous);
        }
        debug!("Restored `{}`", self.name);
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
        out.push_str(&self.name);
        out.push_str(" = ");
        self.value.write(out, grouping);
        out.push(';');
    }

    /// Trace of the assignment. Results are those of the value, evaluated
    /// against the cache as given.
    pub fn trace(&self, results: Option<&MatrixCache>) -> KmlResult<Trace> {
        Ok(Trace::new(NodeKind::Assignment, self.render_compact())
            .with("name", TraceField::Text(self.name.clone()))
            .with("value", TraceField::Node(self.value.trace(results)?)))
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_compact())
    }
}
