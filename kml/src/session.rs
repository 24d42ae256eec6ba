//! Execution context.
//!
//! A [`Kml`] session owns everything a program needs: the function table, the
//! matrix cache, the whole-expression cache and the configuration. Sessions do
//! not share state, so independent sessions can live on different threads.

use std::sync::Arc;

use crate::config::Config;
use crate::error::KmlResult;
use crate::expr::Trace;
use crate::functions::FunctionTable;
use crate::matrix_cache::MatrixCache;
use crate::parser::{ExpressionCache, Parser};
use crate::program::Program;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct Kml {
    config: Config,
    matrices: MatrixCache,
    expressions: ExpressionCache,
}

impl Default for Kml {
    fn default() -> Self {
        Self::new()
    }
}

impl Kml {
    /// A session with the built-in functions and the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_functions(FunctionTable::default(), config)
    }

    pub fn with_functions(functions: FunctionTable, config: Config) -> Self {
        Self {
            matrices: MatrixCache::new(Arc::new(functions)),
            expressions: ExpressionCache::new(config.expression_cache_capacity),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn functions(&self) -> &FunctionTable {
        self.matrices.functions()
    }

    pub fn matrices(&self) -> &MatrixCache {
        &self.matrices
    }

    pub fn matrices_mut(&mut self) -> &mut MatrixCache {
        &mut self.matrices
    }

    pub fn expression_cache(&self) -> &ExpressionCache {
        &self.expressions
    }

    /// Parse a program, reusing cached trailing expressions.
    pub fn parse(&mut self, source: &str) -> KmlResult<Program> {
        let (assignments, expression) = Parser::new(self.matrices.functions())
            .with_expression_cache(&mut self.expressions)
            .with_max_depth(self.config.max_depth)
            .with_max_height(self.config.max_height)
            .parse_program(source)?;
        Ok(Program::new(assignments, expression))
    }

    /// Parse and execute a program.
    pub fn run(&mut self, source: &str) -> KmlResult<Option<Value>> {
        let program = self.parse(source)?;
        program.execute(&mut self.matrices)
    }

    /// Parse a program and trace it, with results if the configuration asks
    /// for them.
    pub fn trace(&mut self, source: &str) -> KmlResult<Trace> {
        let program = self.parse(source)?;
        program.trace(&mut self.matrices, self.config.include_results)
    }

    /// Bind `name` to the value of the matrix expression `code`. The binding
    /// outlives any program.
    pub fn bind(&mut self, name: &str, code: &str) -> KmlResult<()> {
        self.matrices.bind_from_expression(name, code)
    }
}
