//! KML: a small expression language for matrix and scalar arithmetic.
//!
//! A program is a sequence of matrix assignments followed by one optional
//! expression. Programs are parsed by a packrat recursive-descent parser into a
//! typed expression tree, evaluated against a cache of named matrices, and can
//! be rendered back to source or described as a structured trace.
//!
//! Layout
//!  - [`parser`] turns source text into [`Expression`] trees, disambiguating
//!    names against a [`FunctionTable`].
//!  - [`expr`] holds the tree itself: evaluation, rendering and tracing.
//!  - [`MatrixCache`] binds names to matrices; [`Program`] activates its
//!    assignments for the duration of one run and restores them afterwards.
//!  - [`Kml`] bundles all of the above into one execution context.
//!
//! Example
//! ```
//! use kml::{Kml, Value};
//!
//! let mut kml = Kml::new();
//! let value = kml.run("m1 = identity(3,3); |2 m1|").unwrap();
//! assert_eq!(value, Some(Value::Number(8.0)));
//!
//! // Assignments only live for the duration of their program.
//! assert!(kml.matrices().is_empty());
//! ```

pub mod config;
pub mod error;
pub mod expr;
pub mod functions;
/// Dense real matrices over `nalgebra`, with shape-checked operations.
pub mod linalg;
pub mod matrix_cache;
pub mod parser;
pub mod program;
pub mod session;
pub mod value;

pub use config::Config;
pub use error::{Error, KmlResult, NameKind};
pub use expr::pretty::PrettyTrace;
pub use expr::{Expression, Trace};
pub use functions::{ArgKind, ArgValue, Function, FunctionTable};
pub use linalg::Matrix;
pub use matrix_cache::MatrixCache;
pub use parser::{ExpressionCache, Parser};
pub use program::Program;
pub use session::Kml;
pub use value::{Value, ValueKind};

/// Run `source` in a fresh session.
pub fn run(source: &str) -> KmlResult<Option<Value>> {
    Kml::new().run(source)
}
