//! Productions of the grammar.
//!
//! There is no tokenizer: each production starts on a non-whitespace
//! character, consumes its text and skips the whitespace that follows.
//! Productions return `Ok(None)` when their alternative does not apply, which
//! lets the caller try another one, and `Err(..)` once an alternative has
//! committed and its text turns out to be malformed.

use std::sync::Arc;

use crate::error::{Error, KmlResult};
use crate::expr::{
    ArithmeticOp, Argument, Assignment, BinaryOp, Expression, MatrixExpr, NumberExpr, ScaleOp,
    UnaryOp,
};
use crate::functions::{ArgKind, Function, FunctionTable};
use crate::linalg::Matrix;
use crate::parser::DEFAULT_MAX_HEIGHT;
use crate::parser::memo::{Memo, MemoTables, Memoized, Rule};
use crate::value::ValueKind;

type Parsed<T> = KmlResult<Option<T>>;

pub(crate) struct Grammar<'s, 'f> {
    source: &'s str,
    pos: usize,
    functions: &'f FunctionTable,
    memo: MemoTables,
    depth: usize,
    max_depth: usize,
    max_height: usize,
}

impl<'s, 'f> Grammar<'s, 'f> {
    pub(crate) fn new(source: &'s str, functions: &'f FunctionTable, max_depth: usize) -> Self {
        Self {
            source,
            pos: 0,
            functions,
            memo: MemoTables::default(),
            depth: 0,
            max_depth,
            max_height: DEFAULT_MAX_HEIGHT,
        }
    }

    pub(crate) fn with_max_height(mut self, max_height: usize) -> Self {
        self.max_height = max_height;
        self
    }

    pub(crate) fn rest(&self) -> &'s str {
        &self.source[self.pos..]
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    pub(crate) fn clear_memo(&mut self) {
        self.memo.clear();
    }

    pub(crate) fn memo_stats(&self) -> (usize, usize) {
        (self.memo.hits, self.memo.misses)
    }

    pub(crate) fn skip_whitespace(&mut self) {
        let skipped = self
            .rest()
            .find(|c: char| !c.is_whitespace())
            .unwrap_or(self.rest().len());
        self.pos += skipped;
    }

    fn peek(&self) -> Option<u8> {
        self.source.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.as_bytes().get(self.pos + offset).copied()
    }

    /// Consume `c` and the whitespace after it.
    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            self.skip_whitespace();
            true
        } else {
            false
        }
    }

    /// Consume a one-character operator or opening bracket, which can never
    /// end the input.
    fn advance_operator(&mut self) -> KmlResult<()> {
        let operator = self.peek().map(char::from).unwrap_or_default();
        self.pos += 1;
        self.skip_whitespace();
        if self.at_end() {
            return Err(self.error(format!("trailing '{operator}'")));
        }
        Ok(())
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> Error {
        self.error_at(self.pos, message)
    }

    pub(crate) fn error_at(&self, offset: usize, message: impl Into<String>) -> Error {
        let offset = offset.min(self.source.len());
        Error::Syntax {
            message: message.into(),
            offset: self.source[..offset].chars().count(),
        }
    }

    /// Run a production at the current offset, reusing its previous outcome
    /// there if any. A miss leaves the offset unchanged.
    fn memoized<T: Memoized>(
        &mut self,
        rule: Rule,
        parse: impl FnOnce(&mut Self) -> Parsed<T>,
    ) -> Parsed<T> {
        let start = self.pos;
        if let Some(memo) = T::table(&mut self.memo).get(&(rule, start)) {
            let found = match memo {
                Memo::Found { node, end } => {
                    self.pos = *end;
                    Some(node.clone())
                }
                Memo::NotFound => None,
            };
            self.memo.hits += 1;
            return Ok(found);
        }
        self.memo.misses += 1;
        let found = parse(self)?;
        let memo = match &found {
            Some(node) => Memo::Found {
                node: node.clone(),
                end: self.pos,
            },
            None => {
                self.pos = start;
                Memo::NotFound
            }
        };
        T::table(&mut self.memo).insert((rule, start), memo);
        Ok(found)
    }

    /// Enter one level of nesting.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> KmlResult<T>) -> KmlResult<T> {
        if self.depth >= self.max_depth {
            return Err(self.error(format!(
                "expression is nested more than {} levels deep",
                self.max_depth
            )));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Operator chains build one tree level per operator, and every later pass
    /// over the tree recurses once per level. `height` is the height of the
    /// node about to be built by the operator at `at`.
    fn check_height(&self, at: usize, height: usize) -> KmlResult<()> {
        if height > self.max_height {
            return Err(self.error_at(
                at,
                format!(
                    "expression is more than {} operations deep",
                    self.max_height
                ),
            ));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Terminals
    // ------------------------------------------------------------------

    fn name(&mut self) -> Option<&'s str> {
        let bytes = self.source.as_bytes();
        if !bytes.get(self.pos).is_some_and(u8::is_ascii_alphabetic) {
            return None;
        }
        let start = self.pos;
        let mut end = start + 1;
        while bytes.get(end).is_some_and(u8::is_ascii_alphanumeric) {
            end += 1;
        }
        self.pos = end;
        self.skip_whitespace();
        Some(&self.source[start..end])
    }

    fn digits_from(&self, from: usize) -> usize {
        let bytes = self.source.as_bytes();
        let mut end = from;
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
        end
    }

    /// `('+'|'-')? digit+ ('.' digit+)?`
    fn constant_number(&mut self) -> Option<f64> {
        let start = self.pos;
        let signed = matches!(self.peek(), Some(b'+' | b'-'));
        let digits = start + usize::from(signed);
        let mut end = self.digits_from(digits);
        if end == digits {
            return None;
        }
        let bytes = self.source.as_bytes();
        if bytes.get(end) == Some(&b'.') && bytes.get(end + 1).is_some_and(u8::is_ascii_digit) {
            end = self.digits_from(end + 1);
        }
        let value = self.source[start..end].parse::<f64>().ok()?;
        self.pos = end;
        self.skip_whitespace();
        Some(value)
    }

    /// `digit+`
    fn size(&mut self) -> Parsed<i64> {
        let end = self.digits_from(self.pos);
        if end == self.pos {
            return Ok(None);
        }
        let text = &self.source[self.pos..end];
        let size = text
            .parse::<i64>()
            .map_err(|_| self.error(format!("size {text} is out of range")))?;
        self.pos = end;
        self.skip_whitespace();
        Ok(Some(size))
    }

    fn array_row(&mut self) -> Parsed<Vec<f64>> {
        if self.peek() != Some(b'[') {
            return Ok(None);
        }
        self.advance_operator()?;
        let mut row = Vec::new();
        loop {
            let Some(value) = self.constant_number() else {
                return Err(self.error("expected a number"));
            };
            row.push(value);
            if !self.eat(b',') {
                break;
            }
        }
        if !self.eat(b']') {
            return Err(self.error("expected ']' to close the row"));
        }
        Ok(Some(row))
    }

    /// A literal `[[..],[..]]`. Committed as soon as the first `[` is seen.
    fn array(&mut self) -> Parsed<Matrix> {
        if self.peek() != Some(b'[') {
            return Ok(None);
        }
        self.advance_operator()?;
        let mut rows = Vec::new();
        loop {
            let Some(row) = self.array_row()? else {
                return Err(self.error("expected a row"));
            };
            rows.push(row);
            if !self.eat(b',') {
                break;
            }
        }
        if !self.eat(b']') {
            return Err(self.error("expected ']' to close the array"));
        }
        Matrix::from_rows(&rows).map(Some)
    }

    // ------------------------------------------------------------------
    // Function calls
    // ------------------------------------------------------------------

    fn at_argument_end(&self) -> bool {
        matches!(self.peek(), Some(b',' | b')'))
    }

    fn argument(&mut self, kind: ArgKind) -> Parsed<Argument> {
        Ok(match kind {
            ArgKind::Size => self.size()?.map(Argument::Size),
            ArgKind::Number => self.number_expression()?.map(Argument::Number),
            ArgKind::Matrix => self.matrix_expression()?.map(Argument::Matrix),
        })
    }

    /// Find out what kind of argument the text at the current offset is.
    /// On success the argument is consumed.
    fn any_argument(&mut self) -> Parsed<ArgKind> {
        let start = self.pos;
        for kind in [ArgKind::Matrix, ArgKind::Number] {
            self.pos = start;
            if self.argument(kind)?.is_some() && self.at_argument_end() {
                return Ok(Some(kind));
            }
        }
        self.pos = start;
        Ok(None)
    }

    fn argument_mismatch(
        &mut self,
        function: &Function,
        index: usize,
        expected: ArgKind,
    ) -> KmlResult<Error> {
        let start = self.pos;
        let actual = self.any_argument()?;
        self.pos = start;
        Ok(match actual {
            Some(actual) => function.kind_mismatch(index, expected, actual),
            None if self.peek() == Some(b')') => function.arity_mismatch(index),
            None => self.error(format!(
                "argument {index} of function {} not found",
                function.name()
            )),
        })
    }

    /// `'(' argument (',' argument)* ')'`, typed by the callee's signature.
    /// Only called once the name has matched a function, so every failure is
    /// an error.
    fn arguments(&mut self, function: &Function) -> KmlResult<Vec<Argument>> {
        if self.peek() != Some(b'(') {
            return Err(self.error(format!(
                "expected '(' after function name {}",
                function.name()
            )));
        }
        self.advance_operator()?;

        let parameters = function.parameters();
        let mut arguments = Vec::with_capacity(parameters.len());
        for (index, &kind) in parameters.iter().enumerate() {
            if index > 0 {
                match self.peek() {
                    Some(b',') => self.advance_operator()?,
                    Some(b')') => return Err(function.arity_mismatch(index)),
                    _ => return Err(self.error("expected ',' between function arguments")),
                }
            }
            let start = self.pos;
            match self.nested(|g| g.argument(kind))? {
                Some(argument) if self.at_argument_end() => arguments.push(argument),
                _ => {
                    self.pos = start;
                    return Err(self.argument_mismatch(function, index, kind)?);
                }
            }
        }

        // Count surplus arguments so the error can say how many there were.
        let mut supplied = parameters.len();
        loop {
            let more = if supplied == 0 {
                self.peek() != Some(b')')
            } else {
                self.peek() == Some(b',')
            };
            if !more {
                break;
            }
            if supplied > 0 {
                self.advance_operator()?;
            }
            if self.nested(Self::any_argument)?.is_none() {
                return Err(self.error("function argument not found"));
            }
            supplied += 1;
        }
        if supplied != parameters.len() {
            return Err(function.arity_mismatch(supplied));
        }

        if !self.eat(b')') {
            return Err(self.error(format!(
                "unbalanced brackets, expected ')' to close the arguments of {}",
                function.name()
            )));
        }
        Ok(arguments)
    }

    // ------------------------------------------------------------------
    // Number expressions
    // ------------------------------------------------------------------

    /// `'(' number_expression ')'`
    ///
    /// Brackets that hold a number followed by anything but `)` may still be
    /// a bracketed matrix, so that case backtracks unless the input is
    /// exhausted.
    fn bracketed_number(&mut self) -> Parsed<NumberExpr> {
        self.memoized(Rule::BracketedNumber, |g| {
            if g.peek() != Some(b'(') {
                return Ok(None);
            }
            g.advance_operator()?;
            let Some(number) = g.nested(Self::number_expression)? else {
                return Ok(None);
            };
            if g.eat(b')') {
                Ok(Some(NumberExpr::bracketed(number)))
            } else if g.at_end() {
                Err(g.error("unbalanced brackets, expected ')'"))
            } else {
                Ok(None)
            }
        })
    }

    fn number_call(&mut self) -> Parsed<NumberExpr> {
        self.memoized(Rule::NumberCall, |g| {
            let Some(function) = g.function_named(ValueKind::Number) else {
                return Ok(None);
            };
            let arguments = g.nested(|g| g.arguments(&function))?;
            Ok(Some(NumberExpr::call(function, arguments)))
        })
    }

    /// Consume a name if it denotes a function returning `kind`.
    fn function_named(&mut self, kind: ValueKind) -> Option<Arc<Function>> {
        let start = self.pos;
        let functions = self.functions;
        let function = self
            .name()
            .and_then(|name| functions.find(name))
            .filter(|function| function.returns() == kind)
            .cloned();
        if function.is_none() {
            self.pos = start;
        }
        function
    }

    fn number_mul_term(&mut self) -> Parsed<NumberExpr> {
        self.memoized(Rule::NumberMulTerm, |g| {
            if let Some(value) = g.constant_number() {
                return Ok(Some(NumberExpr::constant(value)));
            }
            if let Some(bracketed) = g.bracketed_number()? {
                return Ok(Some(bracketed));
            }
            g.number_call()
        })
    }

    /// Multiplication and division, left associative. Two terms side by side
    /// multiply unless the second starts with a sign or a closing bracket.
    fn number_product(&mut self) -> Parsed<NumberExpr> {
        self.memoized(Rule::NumberProduct, |g| {
            let Some(mut product) = g.number_mul_term()? else {
                return Ok(None);
            };
            let mut height = product.height();
            loop {
                let checkpoint = g.pos;
                let op = match g.peek() {
                    Some(b'*') => {
                        g.advance_operator()?;
                        ArithmeticOp::Mul
                    }
                    Some(b'/') => {
                        g.advance_operator()?;
                        ArithmeticOp::Div
                    }
                    None | Some(b'+' | b'-' | b')') => break,
                    Some(_) => ArithmeticOp::Mul,
                };
                match g.number_mul_term()? {
                    Some(rhs) => {
                        height = height.max(rhs.height()) + 1;
                        g.check_height(checkpoint, height)?;
                        product = NumberExpr::arithmetic(product, op, rhs);
                    }
                    None => {
                        g.pos = checkpoint;
                        break;
                    }
                }
            }
            Ok(Some(product))
        })
    }

    /// Leading signs fold into one negation when odd in number.
    fn number_term(&mut self) -> Parsed<NumberExpr> {
        self.memoized(Rule::NumberTerm, |g| {
            let mut negative = false;
            while let Some(sign @ (b'+' | b'-')) = g.peek() {
                negative ^= sign == b'-';
                g.advance_operator()?;
            }
            Ok(g.number_product()?.map(|product| {
                if negative {
                    NumberExpr::negative(product)
                } else {
                    product
                }
            }))
        })
    }

    fn number_sum(&mut self) -> Parsed<NumberExpr> {
        self.memoized(Rule::NumberSum, |g| {
            let Some(mut sum) = g.number_term()? else {
                return Ok(None);
            };
            let mut height = sum.height();
            loop {
                let checkpoint = g.pos;
                let op = match g.peek() {
                    Some(b'+') => ArithmeticOp::Add,
                    Some(b'-') => ArithmeticOp::Sub,
                    _ => break,
                };
                g.advance_operator()?;
                match g.number_term()? {
                    Some(rhs) => {
                        height = height.max(rhs.height()) + 1;
                        g.check_height(checkpoint, height)?;
                        sum = NumberExpr::arithmetic(sum, op, rhs);
                    }
                    None => {
                        g.pos = checkpoint;
                        break;
                    }
                }
            }
            Ok(Some(sum))
        })
    }

    /// `number_sum | '|' matrix_expression '|'`
    fn number_expression(&mut self) -> Parsed<NumberExpr> {
        self.memoized(Rule::NumberExpression, |g| {
            if let Some(sum) = g.number_sum()? {
                return Ok(Some(sum));
            }
            if g.peek() != Some(b'|') {
                return Ok(None);
            }
            g.advance_operator()?;
            let Some(matrix) = g.nested(Self::matrix_expression)? else {
                return Ok(None);
            };
            if !g.eat(b'|') {
                return Err(g.error("expected '|' to close the determinant"));
            }
            Ok(Some(NumberExpr::determinant(matrix)))
        })
    }

    // ------------------------------------------------------------------
    // Matrix expressions
    // ------------------------------------------------------------------

    /// `('^-1' | '^T')*`, applied left to right.
    fn postfix(&mut self, mut matrix: MatrixExpr) -> KmlResult<MatrixExpr> {
        let mut height = matrix.height();
        loop {
            let at = self.pos;
            let op = if self.rest().starts_with("^-1") {
                self.pos += 3;
                UnaryOp::Inverse
            } else if self.rest().starts_with("^T") {
                self.pos += 2;
                UnaryOp::Transpose
            } else {
                return Ok(matrix);
            };
            self.skip_whitespace();
            height += 1;
            self.check_height(at, height)?;
            matrix = MatrixExpr::unary(matrix, op);
        }
    }

    fn matrix_term(&mut self) -> Parsed<MatrixExpr> {
        self.memoized(Rule::MatrixTerm, |g| {
            let start = g.pos;
            let functions = g.functions;
            if let Some(name) = g.name() {
                let Some(function) = functions.find(name) else {
                    return Ok(Some(g.postfix(MatrixExpr::named(name))?));
                };
                if function.returns() == ValueKind::Number {
                    g.pos = start;
                    return Ok(None);
                }
                let arguments = g.nested(|g| g.arguments(function))?;
                let call = MatrixExpr::call(Arc::clone(function), arguments);
                return Ok(Some(g.postfix(call)?));
            }
            match g.peek() {
                Some(b'+' | b'-') => {
                    let mut negative = false;
                    while let Some(sign @ (b'+' | b'-')) = g.peek() {
                        negative ^= sign == b'-';
                        g.advance_operator()?;
                    }
                    let Some(term) = g.nested(Self::matrix_term)? else {
                        return Ok(None);
                    };
                    let term = g.postfix(term)?;
                    Ok(Some(if negative {
                        MatrixExpr::unary(term, UnaryOp::Negate)
                    } else {
                        term
                    }))
                }
                Some(b'(') => {
                    g.advance_operator()?;
                    let Some(inner) = g.nested(Self::matrix_expression)? else {
                        return Ok(None);
                    };
                    if !g.eat(b')') {
                        return Err(g.error("unbalanced brackets, expected ')'"));
                    }
                    Ok(Some(g.postfix(MatrixExpr::bracketed(inner))?))
                }
                _ => Ok(None),
            }
        })
    }

    /// A matrix scaled by a number: `m * n`, `m / n`, `n * m` or `n m`.
    fn matrix_number_term(&mut self) -> Parsed<MatrixExpr> {
        self.memoized(Rule::MatrixNumberTerm, |g| {
            if let Some(matrix) = g.matrix_term()? {
                let checkpoint = g.pos;
                let op = match g.peek() {
                    Some(b'*') => ScaleOp::Mul,
                    Some(b'/') => ScaleOp::Div,
                    _ => return Ok(Some(matrix)),
                };
                g.advance_operator()?;
                return match g.number_expression()? {
                    Some(number) => Ok(Some(MatrixExpr::scaled(matrix, op, number))),
                    None if op == ScaleOp::Div => {
                        Err(g.error("a number expression expected after '/'"))
                    }
                    None => {
                        g.pos = checkpoint;
                        Ok(Some(matrix))
                    }
                };
            }
            let Some(number) = g.number_expression()? else {
                return Ok(None);
            };
            if g.peek() == Some(b'*') {
                g.advance_operator()?;
            }
            Ok(g
                .matrix_term()?
                .map(|matrix| MatrixExpr::scaled(matrix, ScaleOp::Mul, number)))
        })
    }

    fn matrix_product(&mut self) -> Parsed<MatrixExpr> {
        self.memoized(Rule::MatrixProduct, |g| {
            let Some(mut product) = g.matrix_number_term()? else {
                return Ok(None);
            };
            let mut height = product.height();
            while g.peek() == Some(b'*') {
                let checkpoint = g.pos;
                g.advance_operator()?;
                match g.matrix_number_term()? {
                    Some(rhs) => {
                        height = height.max(rhs.height()) + 1;
                        g.check_height(checkpoint, height)?;
                        product = MatrixExpr::binary(product, BinaryOp::Mul, rhs);
                    }
                    None => {
                        g.pos = checkpoint;
                        break;
                    }
                }
            }
            Ok(Some(product))
        })
    }

    /// `array | matrix_product (('+'|'-') matrix_product)*`
    fn matrix_expression(&mut self) -> Parsed<MatrixExpr> {
        self.memoized(Rule::MatrixExpression, |g| {
            if let Some(literal) = g.array()? {
                return Ok(Some(MatrixExpr::constant(literal)));
            }
            let Some(mut sum) = g.matrix_product()? else {
                return Ok(None);
            };
            let mut height = sum.height();
            loop {
                let checkpoint = g.pos;
                let op = match g.peek() {
                    Some(b'+') => BinaryOp::Add,
                    Some(b'-') => BinaryOp::Sub,
                    _ => break,
                };
                g.advance_operator()?;
                match g.matrix_product()? {
                    Some(rhs) => {
                        height = height.max(rhs.height()) + 1;
                        g.check_height(checkpoint, height)?;
                        sum = MatrixExpr::binary(sum, op, rhs);
                    }
                    None => {
                        g.pos = checkpoint;
                        break;
                    }
                }
            }
            Ok(Some(sum))
        })
    }

    // ------------------------------------------------------------------
    // Top level
    // ------------------------------------------------------------------

    /// A whole expression reaching the end of the input. The matrix reading is
    /// preferred; the number reading is tried when it does not match or stops
    /// early.
    pub(crate) fn expression(&mut self) -> KmlResult<Expression> {
        self.skip_whitespace();
        let start = self.pos;
        let mut farthest = None;
        if let Some(matrix) = self.matrix_expression()? {
            if self.at_end() {
                return Ok(Expression::Matrix(matrix));
            }
            farthest = Some(self.pos);
        }
        self.pos = start;
        if let Some(number) = self.number_expression()? {
            if self.at_end() {
                return Ok(Expression::Number(number));
            }
            farthest = farthest.max(Some(self.pos));
        }
        match farthest {
            Some(end) => Err(self.error_at(end, "trailing code after end of expression")),
            None => Err(self.error_at(start, "no parseable expression found")),
        }
    }

    /// `name '=' matrix_expression ';'`. Backtracks until the `=` is seen.
    fn assignment(&mut self) -> Parsed<Assignment> {
        let start = self.pos;
        let Some(name) = self.name() else {
            return Ok(None);
        };
        if self.peek() != Some(b'=') {
            self.pos = start;
            return Ok(None);
        }
        self.advance_operator()?;
        let Some(value) = self.matrix_expression()? else {
            return Err(self.error("expected a matrix expression"));
        };
        if !self.eat(b';') {
            return Err(self.error("assignments must end in ';'"));
        }
        Ok(Some(Assignment::new(name, value)))
    }

    pub(crate) fn assignments(&mut self) -> KmlResult<Vec<Assignment>> {
        self.skip_whitespace();
        let mut assignments = Vec::new();
        while let Some(assignment) = self.assignment()? {
            assignments.push(assignment);
        }
        Ok(assignments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grammar<'s>(source: &'s str, functions: &'s FunctionTable) -> Grammar<'s, 's> {
        Grammar::new(source, functions, 64)
    }

    #[test]
    fn constants() {
        let functions = FunctionTable::default();
        for (text, value) in [("12", 12.0), ("-3.25 ", -3.25), ("+0.5", 0.5)] {
            let mut g = grammar(text, &functions);
            assert_eq!(g.constant_number(), Some(value));
            assert!(g.at_end());
        }
        for text in ["-", ".5", "x1", "- 3"] {
            assert_eq!(grammar(text, &functions).constant_number(), None);
        }
        let mut g = grammar("1.x", &functions);
        assert_eq!(g.constant_number(), Some(1.0));
        assert_eq!(g.rest(), ".x");
    }

    #[test]
    fn names_stop_at_non_alphanumerics() {
        let functions = FunctionTable::default();
        let mut g = grammar("m1x2 ^T", &functions);
        assert_eq!(g.name(), Some("m1x2"));
        assert_eq!(g.rest(), "^T");
        assert_eq!(grammar("1m", &functions).name(), None);
    }

    #[test]
    fn memo_hits_do_not_change_the_result() {
        let functions = FunctionTable::default();
        let mut g = grammar("2(4-2)", &functions);
        let first = g.number_expression().unwrap().unwrap();
        let end = g.pos;
        g.pos = 0;
        let (hits, _) = g.memo_stats();
        let second = g.number_expression().unwrap().unwrap();
        assert_eq!(g.memo_stats().0, hits + 1);
        assert_eq!(g.pos, end);
        assert_eq!(first.render_fully_parenthesized(), second.render_fully_parenthesized());
    }

    #[test]
    fn not_found_restores_offset() {
        let functions = FunctionTable::default();
        let mut g = grammar("(m1+m2)", &functions);
        assert!(g.bracketed_number().unwrap().is_none());
        assert_eq!(g.pos, 0);
        assert!(g.matrix_term().unwrap().is_some());
        assert!(g.at_end());
    }

    #[test]
    fn trailing_operator() {
        let functions = FunctionTable::default();
        let err = grammar("1+", &functions).expression().unwrap_err();
        assert_eq!(err.to_string(), "Syntax error: trailing '+' (at position 2)");
    }

    #[test]
    fn depth_limit() {
        let functions = FunctionTable::default();
        let deep = format!("{}1{}", "(".repeat(10), ")".repeat(10));
        assert!(Grammar::new(&deep, &functions, 10).expression().is_ok());
        let err = Grammar::new(&deep, &functions, 9).expression().unwrap_err();
        assert!(err.to_string().contains("nested more than 9 levels"));
    }

    #[test]
    fn height_limit() {
        let functions = FunctionTable::default();
        let chain = vec!["1"; 8].join("+");
        let parse = |source: &str, max_height| {
            Grammar::new(source, &functions, 64)
                .with_max_height(max_height)
                .expression()
        };
        assert!(parse(&chain, 8).is_ok());
        let err = parse(&chain, 7).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Syntax error: expression is more than 7 operations deep (at position 13)"
        );

        let product = vec!["2"; 8].join(" ");
        assert!(parse(&product, 8).is_ok());
        assert!(parse(&product, 7).unwrap_err().is_syntax());

        let postfix = format!("m{}", "^T".repeat(8));
        assert!(parse(&postfix, 9).is_ok());
        assert!(parse(&postfix, 8).unwrap_err().is_syntax());

        let matrices = vec!["m"; 8].join(" * ");
        assert!(parse(&matrices, 8).is_ok());
        assert!(parse(&matrices, 7).unwrap_err().is_syntax());
    }
}
