//! Function table
//!
//! Built-in functions are looked up by name while parsing: a name that matches a
//! matrix-returning function starts a call, a name that matches a
//! number-returning function cannot denote a matrix, and any other name is a
//! matrix reference resolved at evaluation time.
//!
//! Each [`Function`] declares the kind of every parameter ([`ArgKind`]) and the
//! kind of value it returns ([`ValueKind`]). Calls are checked against that
//! signature before the body runs.
use std::{
    collections::BTreeMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use log::debug;
use strum::Display;

use crate::error::{Error, KmlResult, NameKind};
use crate::linalg::Matrix;
use crate::value::{Value, ValueKind};

pub mod builtins;

/// Declared kind of a function parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ArgKind {
    /// A non-negative integer literal, used for dimensions.
    Size,
    Number,
    Matrix,
}

/// An argument after evaluation, as handed to a function body.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Size(i64),
    Number(f64),
    Matrix(Matrix),
}

impl ArgValue {
    pub fn kind(&self) -> ArgKind {
        match self {
            ArgValue::Size(_) => ArgKind::Size,
            ArgValue::Number(_) => ArgKind::Number,
            ArgValue::Matrix(_) => ArgKind::Matrix,
        }
    }
}

type Body = dyn Fn(&[ArgValue]) -> KmlResult<Value> + Send + Sync;

/// A built-in function. Immutable once registered.
pub struct Function {
    name: String,
    help: String,
    returns: ValueKind,
    parameters: Vec<ArgKind>,
    body: Box<Body>,
}

impl Function {
    pub fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        returns: ValueKind,
        parameters: Vec<ArgKind>,
        body: impl Fn(&[ArgValue]) -> KmlResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            returns,
            parameters,
            body: Box::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn returns(&self) -> ValueKind {
        self.returns
    }

    pub fn parameters(&self) -> &[ArgKind] {
        &self.parameters
    }

    /// Human-readable signature, e.g. `matrix constant(size, size, number)`.
    pub fn signature(&self) -> String {
        let parameters = self
            .parameters
            .iter()
            .map(ArgKind::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} {}({parameters})", self.returns, self.name)
    }

    /// Check the number and kind of the arguments of a call against this
    /// function's signature.
    pub fn check_arguments(&self, kinds: &[ArgKind]) -> KmlResult<()> {
        if kinds.len() != self.parameters.len() {
            return Err(self.arity_mismatch(kinds.len()));
        }
        for (index, (&actual, &expected)) in kinds.iter().zip(&self.parameters).enumerate() {
            if actual != expected {
                return Err(self.kind_mismatch(index, expected, actual));
            }
        }
        Ok(())
    }

    pub(crate) fn arity_mismatch(&self, supplied: usize) -> Error {
        Error::type_mismatch(
            format!("call to function {}", self.name),
            plural(self.parameters.len(), "argument"),
            plural(supplied, "argument"),
        )
    }

    pub(crate) fn kind_mismatch(&self, index: usize, expected: ArgKind, actual: ArgKind) -> Error {
        Error::type_mismatch(
            format!("argument {index} of function {}", self.name),
            expected,
            actual,
        )
    }

    /// Run the function body on already evaluated arguments.
    pub fn invoke(&self, arguments: &[ArgValue]) -> KmlResult<Value> {
        let kinds: Vec<ArgKind> = arguments.iter().map(ArgValue::kind).collect();
        self.check_arguments(&kinds)?;
        let value = (self.body)(arguments)?;
        if value.kind() != self.returns {
            return Err(Error::type_mismatch(
                format!("result of function {}", self.name),
                self.returns,
                value.kind(),
            ));
        }
        Ok(value)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("signature", &self.signature())
            .finish_non_exhaustive()
    }
}

pub(crate) fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Registry of functions, keyed by exact name.
///
/// [`FunctionTable::default`] holds the built-ins; [`FunctionTable::new`] is empty.
#[derive(Debug, Clone)]
pub struct FunctionTable {
    functions: BTreeMap<String, Arc<Function>>,
    revision: u64,
}

fn next_revision() -> u64 {
    static REVISIONS: AtomicU64 = AtomicU64::new(0);
    REVISIONS.fetch_add(1, Ordering::Relaxed)
}

impl Default for FunctionTable {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FunctionTable {
    pub fn new() -> Self {
        Self {
            functions: BTreeMap::new(),
            revision: next_revision(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        for function in builtins::all() {
            table.functions.insert(function.name.clone(), Arc::new(function));
        }
        table
    }

    /// Register a function. Fails if any function has the same name ignoring
    /// case.
    pub fn register(&mut self, function: Function) -> KmlResult<()> {
        if let Some(existing) = self.find_case_insensitive(&function.name) {
            return Err(Error::NameCollision {
                name: function.name,
                existing: existing.name.clone(),
                kind: NameKind::Function,
            });
        }
        debug!("Registered function `{}`", function.signature());
        self.functions
            .insert(function.name.clone(), Arc::new(function));
        self.revision = next_revision();
        Ok(())
    }

    /// Identifies the current contents. Two tables share a revision only when
    /// one is an unmodified clone of the other.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Exact lookup. On a miss the error suggests a function whose name only
    /// differs by case.
    pub fn get(&self, name: &str) -> KmlResult<&Arc<Function>> {
        self.find(name).ok_or_else(|| Error::UnknownName {
            kind: NameKind::Function,
            name: name.to_string(),
            suggestion: self.find_case_insensitive(name).map(|f| f.name.clone()),
        })
    }

    /// Exact lookup without an error.
    pub fn find(&self, name: &str) -> Option<&Arc<Function>> {
        self.functions.get(name)
    }

    pub fn find_case_insensitive(&self, name: &str) -> Option<&Arc<Function>> {
        self.functions
            .values()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn exists_case_insensitive(&self, name: &str) -> bool {
        self.find_case_insensitive(name).is_some()
    }

    /// Every signature with its help text.
    pub fn help(&self) -> BTreeMap<String, String> {
        self.functions
            .values()
            .map(|f| (f.signature(), f.help.clone()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Function>> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn double() -> Function {
        Function::new(
            "Double",
            "Twice a number.",
            ValueKind::Number,
            vec![ArgKind::Number],
            |args| match args {
                [ArgValue::Number(n)] => Ok(Value::Number(2.0 * n)),
                _ => unreachable!(),
            },
        )
    }

    #[test]
    fn builtin_signatures() {
        let table = FunctionTable::default();
        let help = table.help();
        assert_eq!(help.len(), 7);
        assert_eq!(help["number abs(number)"], "Absolute value of a number.");
        assert!(help.contains_key("matrix constant(size, size, number)"));
        assert!(help.contains_key("number dot(matrix, matrix)"));
        assert!(FunctionTable::new().is_empty());
    }

    #[test]
    fn register_rejects_case_insensitive_clash() {
        let mut table = FunctionTable::default();
        table.register(double()).unwrap();
        let err = table
            .register(Function::new("DOUBLE", "", ValueKind::Number, vec![], |_| {
                Ok(Value::Number(0.0))
            }))
            .unwrap_err();
        match err {
            Error::NameCollision { name, existing, .. } => {
                assert_eq!(name, "DOUBLE");
                assert_eq!(existing, "Double");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(table.register(Function::new("ABS", "", ValueKind::Number, vec![], |_| {
            Ok(Value::Number(0.0))
        }))
        .is_err());
    }

    #[test]
    fn registration_changes_revision() {
        let mut table = FunctionTable::default();
        let copy = table.clone();
        assert_eq!(copy.revision(), table.revision());
        assert_ne!(FunctionTable::default().revision(), table.revision());

        table.register(double()).unwrap();
        assert_ne!(copy.revision(), table.revision());
    }

    #[test]
    fn get_and_find() {
        let table = FunctionTable::default();
        assert_eq!(table.get("abs").unwrap().name(), "abs");
        assert!(table.find("Abs").is_none());
        assert!(table.exists_case_insensitive("Abs"));

        match table.get("Abs").unwrap_err() {
            Error::UnknownName { suggestion, .. } => assert_eq!(suggestion.as_deref(), Some("abs")),
            other => panic!("unexpected error: {other}"),
        }
        match table.get("nothing").unwrap_err() {
            Error::UnknownName { suggestion, .. } => assert!(suggestion.is_none()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn invoke_checks_signature() {
        let f = double();
        assert_eq!(f.invoke(&[ArgValue::Number(2.5)]).unwrap(), Value::Number(5.0));

        let err = f.invoke(&[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Type mismatch in call to function Double: expected 1 argument, but found 0 arguments."
        );

        let err = f.invoke(&[ArgValue::Size(2)]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Type mismatch in argument 0 of function Double: expected number, but found size."
        );
    }
}
