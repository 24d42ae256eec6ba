//! Parser
//!
//! A packrat recursive-descent parser for KML programs: zero or more
//! assignments `name = matrix_expression;` followed by an optional trailing
//! expression.
//!
//! ```text
//! m1 = identity(3,3);
//! m2 = 2 m1 - [[1,0,0],[0,1,0],[0,0,1]];
//! |m2^T^-1|
//! ```
//!
//! Names are disambiguated against the [`FunctionTable`] while parsing. Bare
//! matrix names are not resolved until evaluation, so parsing never consults a
//! [`MatrixCache`](crate::MatrixCache).
//!
//! Every production is memoized by start offset for the duration of one
//! expression. Parsed trailing expressions can additionally be remembered
//! across programs in an [`ExpressionCache`].

use log::{debug, trace};

use crate::error::KmlResult;
use crate::expr::{Assignment, Expression};
use crate::functions::FunctionTable;

mod grammar;
mod memo;

pub use memo::ExpressionCache;

use grammar::Grammar;
use memo::Origin;

/// Default bound on bracket and call nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default bound on the height of an expression tree, reached by long operator
/// chains such as `1+1+...+1`.
pub const DEFAULT_MAX_HEIGHT: usize = 256;

pub struct Parser<'a> {
    functions: &'a FunctionTable,
    expressions: Option<&'a mut ExpressionCache>,
    max_depth: usize,
    max_height: usize,
}

impl<'a> Parser<'a> {
    pub fn new(functions: &'a FunctionTable) -> Self {
        Self {
            functions,
            expressions: None,
            max_depth: DEFAULT_MAX_DEPTH,
            max_height: DEFAULT_MAX_HEIGHT,
        }
    }

    /// Remember parsed trailing expressions in `cache`, and reuse them.
    pub fn with_expression_cache(mut self, cache: &'a mut ExpressionCache) -> Self {
        self.expressions = Some(cache);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_height(mut self, max_height: usize) -> Self {
        self.max_height = max_height;
        self
    }

    fn grammar<'s>(&self, source: &'s str) -> Grammar<'s, 'a> {
        Grammar::new(source, self.functions, self.max_depth).with_max_height(self.max_height)
    }

    fn origin(&self) -> Origin {
        Origin {
            functions: self.functions.revision(),
            max_depth: self.max_depth,
            max_height: self.max_height,
        }
    }

    /// Parse a single expression spanning the whole of `source`.
    pub fn parse_expression(&mut self, source: &str) -> KmlResult<Expression> {
        let mut grammar = self.grammar(source);
        self.trailing_expression(&mut grammar)
    }

    /// Parse a program. The trailing expression is `None` when the source ends
    /// after its assignments.
    pub fn parse_program(
        &mut self,
        source: &str,
    ) -> KmlResult<(Vec<Assignment>, Option<Expression>)> {
        let mut grammar = self.grammar(source);
        let assignments = grammar.assignments()?;
        let expression = if grammar.at_end() {
            None
        } else {
            Some(self.trailing_expression(&mut grammar)?)
        };
        Ok((assignments, expression))
    }

    fn trailing_expression(&mut self, grammar: &mut Grammar<'_, '_>) -> KmlResult<Expression> {
        grammar.skip_whitespace();
        let key = grammar.rest().trim_end();
        let origin = self.origin();
        if let Some(cache) = self.expressions.as_deref_mut() {
            cache.adopt(origin);
            if let Some(expression) = cache.get(key) {
                debug!("Reusing cached expression `{key}`");
                return Ok(expression.clone());
            }
        }

        grammar.clear_memo();
        let expression = grammar.expression()?;
        let (hits, misses) = grammar.memo_stats();
        trace!("Parsed `{key}` with {hits} memo hits and {misses} misses");

        if let Some(cache) = self.expressions.as_deref_mut() {
            cache.insert(key, expression.clone());
        }
        Ok(expression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::matrix_cache::MatrixCache;
    use crate::value::Value;
    use std::sync::Arc;

    fn parse(source: &str) -> KmlResult<Expression> {
        Parser::new(&FunctionTable::default()).parse_expression(source)
    }

    fn number(source: &str) -> f64 {
        let functions = Arc::new(FunctionTable::default());
        let cache = MatrixCache::new(Arc::clone(&functions));
        let expression = Parser::new(&functions).parse_expression(source).unwrap();
        expression.evaluate_number(&cache).unwrap()
    }

    fn syntax_error(source: &str) -> (String, usize) {
        match parse(source).unwrap_err() {
            Error::Syntax { message, offset } => (message, offset),
            other => panic!("expected a syntax error for `{source}`, got {other}"),
        }
    }

    #[test]
    fn arithmetic() {
        assert_eq!(number("5-1-2"), 2.0);
        assert_eq!(number("2(4-2)"), 4.0);
        assert!((number("1.234-3.4*0.1") - 0.894).abs() < 1e-12);
        assert_eq!(number("(1+2)*(3-4)"), -3.0);
        assert_eq!(number("-1"), -1.0);
        assert_eq!(number("8/2/2"), 2.0);
        assert_eq!(number("--3"), 3.0);
        assert_eq!(number("2 3 4"), 24.0);
        assert_eq!(number("  7  "), 7.0);
    }

    #[test]
    fn functions() {
        assert_eq!(number("abs(-4)"), 4.0);
        assert_eq!(number("trace(identity(3,3))"), 3.0);
        assert_eq!(number("|identity(2,2)|"), 1.0);
        assert_eq!(number("dot(constant(2,2,2), identity(2,2))"), 4.0);
        assert_eq!(number("2 abs(-2)"), 4.0);
    }

    #[test]
    fn matrices() {
        let expression = parse("2 m").unwrap();
        assert_eq!(expression.render_fully_parenthesized(), "(2*m)");

        let expression = parse("m1*2-m2").unwrap();
        assert_eq!(expression.render_fully_parenthesized(), "((2*m1)-m2)");

        let expression = parse("2*3*m1").unwrap();
        assert_eq!(expression.render_fully_parenthesized(), "((2*3)*m1)");

        let expression = parse("-m^T^-1").unwrap();
        assert_eq!(expression.render_fully_parenthesized(), "(-((m^T)^-1))");

        let expression = parse("(m1 + m2) * m3").unwrap();
        assert!(expression.is_matrix());
        assert_eq!(expression.render_compact(), "(m1+m2)*m3");

        let expression = parse("[[1, 2], [3, 4.5]]").unwrap();
        assert_eq!(expression.render_compact(), "[[1,2],[3,4.5]]");
    }

    #[test]
    fn number_functions_are_not_matrices() {
        let expression = parse("abs(1) m").unwrap();
        assert_eq!(expression.render_fully_parenthesized(), "(abs(1)*m)");
        assert!(parse("abs").unwrap_err().is_syntax());
    }

    #[test]
    fn ragged_array_is_a_shape_error() {
        assert!(parse("[[1,2],[3,4,5]]").unwrap_err().is_shape());
    }

    #[test]
    fn call_site_type_mismatch() {
        let err = parse("identity(3)").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Type mismatch in call to function identity: expected 2 arguments, but found 1 argument."
        );
        let err = parse("abs(1, 2)").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Type mismatch in call to function abs: expected 1 argument, but found 2 arguments."
        );
        let err = parse("trace(2)").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Type mismatch in argument 0 of function trace: expected matrix, but found number."
        );
        let err = parse("abs(m)").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Type mismatch in argument 0 of function abs: expected number, but found matrix."
        );
        assert!(parse("identity(2.5, 2)").unwrap_err().is_type_mismatch());
    }

    #[test]
    fn syntax_errors() {
        assert_eq!(syntax_error(""), ("no parseable expression found".into(), 0));
        assert_eq!(syntax_error("  )"), ("no parseable expression found".into(), 2));
        assert_eq!(
            syntax_error("1 + 2 )"),
            ("trailing code after end of expression".into(), 6)
        );
        assert_eq!(syntax_error("(1 + 2").1, 6);
        assert_eq!(syntax_error("|m").0, "expected '|' to close the determinant");
        assert_eq!(syntax_error("identity 2").0, "expected '(' after function name identity");
        assert_eq!(syntax_error("[[1,2]"), ("expected ']' to close the array".into(), 6));
        assert_eq!(syntax_error("m /").0, "trailing '/'");
        assert_eq!(syntax_error("m / )").0, "a number expression expected after '/'");
    }

    #[test]
    fn offsets_count_characters() {
        let (_, offset) = syntax_error("ä + 1");
        assert_eq!(offset, 0);
        let (_, offset) = syntax_error("(1 + 2) ß");
        assert_eq!(offset, 8);
    }

    #[test]
    fn programs() {
        let functions = FunctionTable::default();
        let (assignments, expression) = Parser::new(&functions)
            .parse_program("a = identity(2,2); b = a + a; |b|")
            .unwrap();
        assert_eq!(assignments.len(), 2);
        assert_eq!(assignments[1].render_compact(), "b = a+a;");
        assert_eq!(expression.unwrap().render_compact(), "|b|");

        let (assignments, expression) = Parser::new(&functions)
            .parse_program("a = identity(2,2);  ")
            .unwrap();
        assert_eq!(assignments.len(), 1);
        assert!(expression.is_none());

        let err = Parser::new(&functions)
            .parse_program("a = identity(2,2) b")
            .unwrap_err();
        assert_eq!(err.to_string(), "Syntax error: assignments must end in ';' (at position 18)");

        let err = Parser::new(&functions).parse_program("a = 2;").unwrap_err();
        assert!(err.is_syntax());
    }

    #[test]
    fn expression_cache_reuses_trailing_expressions() {
        let functions = FunctionTable::default();
        let mut expressions = ExpressionCache::new(4);
        for source in ["a = identity(2,2); a^T ", "b = zero(1,1); a^T"] {
            let (_, expression) = Parser::new(&functions)
                .with_expression_cache(&mut expressions)
                .parse_program(source)
                .unwrap();
            assert_eq!(expression.unwrap().render_compact(), "a^T");
        }
        assert_eq!(expressions.len(), 1);
        assert!(expressions.get("a^T").is_some());

        Parser::new(&functions)
            .with_expression_cache(&mut expressions)
            .parse_expression("A^T")
            .unwrap();
        assert_eq!(expressions.len(), 2);
    }

    #[test]
    fn cached_expressions_evaluate_the_same() {
        let functions = Arc::new(FunctionTable::default());
        let cache = MatrixCache::new(Arc::clone(&functions));
        let mut expressions = ExpressionCache::new(4);
        let mut values = Vec::new();
        for _ in 0..2 {
            let expression = Parser::new(&functions)
                .with_expression_cache(&mut expressions)
                .parse_expression("2(3 + abs(-1)) - 1")
                .unwrap();
            values.push(expression.evaluate(&cache).unwrap());
        }
        assert_eq!(values, vec![Value::Number(7.0); 2]);
    }

    #[test]
    fn expression_cache_follows_the_function_table() {
        let builtins = FunctionTable::default();
        let empty = FunctionTable::new();
        let mut expressions = ExpressionCache::new(4);
        let call = Parser::new(&builtins)
            .with_expression_cache(&mut expressions)
            .parse_expression("abs(-2)")
            .unwrap();
        assert!(call.is_number());

        // Without `abs` in the table, the name is a matrix and `(-2)` trails it.
        let err = Parser::new(&empty)
            .with_expression_cache(&mut expressions)
            .parse_expression("abs(-2)")
            .unwrap_err();
        assert!(err.is_syntax());
        assert!(expressions.is_empty());
    }

    #[test]
    fn height_limit() {
        let functions = FunctionTable::default();
        let chain = vec!["1"; DEFAULT_MAX_HEIGHT].join("-");
        assert!(Parser::new(&functions).parse_expression(&chain).is_ok());
        let err = Parser::new(&functions)
            .with_max_height(DEFAULT_MAX_HEIGHT - 1)
            .parse_expression(&chain)
            .unwrap_err();
        assert!(err.is_syntax());
    }

    #[test]
    fn depth_limit() {
        let functions = FunctionTable::default();
        let source = format!("{}1{}", "(".repeat(50), ")".repeat(50));
        assert!(Parser::new(&functions).parse_expression(&source).is_ok());
        let err = Parser::new(&functions)
            .with_max_depth(49)
            .parse_expression(&source)
            .unwrap_err();
        assert!(err.is_syntax());
    }
}
