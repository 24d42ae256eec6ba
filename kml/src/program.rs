//! Program orchestrator.
//!
//! A program is a list of assignments followed by an optional expression.
//! Executing it activates every assignment in order, evaluates the expression
//! and then restores the bindings in reverse order, whether or not anything
//! failed. After [`Program::execute`] or [`Program::trace`] returns, the cache
//! holds exactly the bindings it held before the call.

use log::debug;

use crate::error::KmlResult;
use crate::expr::{Assignment, Expression, Grouping, NodeKind, Trace, TraceField};
use crate::functions::FunctionTable;
use crate::linalg::Matrix;
use crate::matrix_cache::MatrixCache;
use crate::parser::Parser;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct Program {
    assignments: Vec<Assignment>,
    expression: Option<Expression>,
}

impl Program {
    pub fn new(assignments: Vec<Assignment>, expression: Option<Expression>) -> Self {
        Self {
            assignments,
            expression,
        }
    }

    /// Parse `source` with a fresh parser and no expression cache.
    pub fn parse(source: &str, functions: &FunctionTable) -> KmlResult<Self> {
        let (assignments, expression) = Parser::new(functions).parse_program(source)?;
        Ok(Self::new(assignments, expression))
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn expression(&self) -> Option<&Expression> {
        self.expression.as_ref()
    }

    /// Run the program. Returns `None` when there is no trailing expression.
    pub fn execute(&self, cache: &mut MatrixCache) -> KmlResult<Option<Value>> {
        self.bracket(
            cache,
            |_, _| Ok(None),
            |cache| {
                self.expression
                    .as_ref()
                    .map(|expression| expression.evaluate(cache))
                    .transpose()
            },
        )
    }

    pub fn render_compact(&self) -> String {
        self.render(Grouping::Compact)
    }

    pub fn render_fully_parenthesized(&self) -> String {
        self.render(Grouping::Full)
    }

    // One line per assignment, then the expression.
    fn render(&self, grouping: Grouping) -> String {
        let mut lines: Vec<String> = self
            .assignments
            .iter()
            .map(|assignment| {
                let mut line = String::new();
                assignment.write(&mut line, grouping);
                line
            })
            .collect();
        if let Some(expression) = &self.expression {
            lines.push(expression.render(grouping));
        }
        lines.join("\n")
    }

    /// Describe the program. Each assignment is traced against the bindings
    /// visible just before it is activated, the expression against all of
    /// them.
    pub fn trace(&self, cache: &mut MatrixCache, include_results: bool) -> KmlResult<Trace> {
        let mut assignments = Vec::with_capacity(self.assignments.len());
        let expression = self.bracket(
            cache,
            |assignment, cache| {
                let trace = assignment.trace(include_results.then_some(cache))?;
                let value = trace.child("value").and_then(Trace::matrix_result).cloned();
                assignments.push(TraceField::Node(trace));
                Ok(value)
            },
            |cache| {
                self.expression
                    .as_ref()
                    .map(|expression| expression.trace(include_results.then_some(cache)))
                    .transpose()
            },
        )?;

        let result = expression.as_ref().and_then(|trace| trace.result.clone());
        let mut trace = Trace::new(NodeKind::Program, self.render_compact())
            .with("assignments", TraceField::List(assignments));
        if let Some(expression) = expression {
            trace = trace.with("expression", TraceField::Node(expression));
        }
        Ok(trace.with_result(result))
    }

    /// Activate the assignments, run `body`, then restore. `before` sees each
    /// assignment just ahead of its activation and may hand back its value
    /// already evaluated.
    fn bracket<T>(
        &self,
        cache: &mut MatrixCache,
        mut before: impl FnMut(&Assignment, &MatrixCache) -> KmlResult<Option<Matrix>>,
        body: impl FnOnce(&MatrixCache) -> KmlResult<T>,
    ) -> KmlResult<T> {
        let mut saved = Vec::with_capacity(self.assignments.len());
        let activated = self.assignments.iter().try_for_each(|assignment| {
            let previous = match before(assignment, cache)? {
                Some(value) => assignment.activate_with(cache, value)?,
                None => assignment.activate(cache)?,
            };
            saved.push(previous);
            Ok(())
        });
        debug!(
            "Activated {} of {} assignments",
            saved.len(),
            self.assignments.len()
        );
        let result = activated.and_then(|()| body(cache));
        self.restore(cache, saved);
        result
    }

    // `saved[i]` belongs to `assignments[i]`; only activated assignments have one.
    fn restore(&self, cache: &mut MatrixCache, saved: Vec<Option<Matrix>>) {
        let restored = saved.len();
        for (assignment, previous) in self.assignments[..restored].iter().zip(saved).rev() {
            assignment.restore(cache, previous);
        }
        debug!("Restored {restored} assignments");
    }
}

impl std::fmt::Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render_compact())
    }
}
