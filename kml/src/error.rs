//! Error taxonomy shared by every stage of the language.
//!
//! Parsing, evaluation, binding and configuration failures all surface as
//! [`Error`]. None of them are retried: each one is terminal for the operation
//! that raised it.

use strum::{Display, EnumIs};
use thiserror::Error;

/// Which namespace a name was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum NameKind {
    Matrix,
    Function,
}

#[derive(Debug, EnumIs, Error)]
pub enum Error {
    /// The input is malformed. Either a committed grammar alternative hit a
    /// structural violation, or no alternative matched at all.
    #[error("Syntax error: {message} (at position {offset})")]
    Syntax { message: String, offset: usize },

    /// A matrix or function name is not bound.
    #[error("{kind} {name} does not exist.{}", did_you_mean(.suggestion))]
    UnknownName {
        kind: NameKind,
        name: String,
        suggestion: Option<String>,
    },

    /// A new name clashes, ignoring case, with an existing matrix or function.
    #[error(
        "{name} collides with the existing {kind} {existing}. Names are compared without regard to letter case."
    )]
    NameCollision {
        name: String,
        existing: String,
        kind: NameKind,
    },

    /// A value of one kind was used where another kind was required.
    #[error("Type mismatch in {context}: expected {expected}, but found {actual}.")]
    TypeMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    /// Matrix dimensions do not allow the requested construction or operation.
    #[error("Shape error: {message}")]
    Shape { message: String },

    /// A configuration document could not be decoded.
    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: toml::de::Error,
    },
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" Did you mean: {s}?"))
        .unwrap_or_default()
}

impl Error {
    pub(crate) fn shape(message: impl Into<String>) -> Self {
        Error::Shape {
            message: message.into(),
        }
    }

    pub(crate) fn type_mismatch(
        context: impl Into<String>,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Error::TypeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Character offset of a syntax error, if this is one.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Error::Syntax { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

pub type KmlResult<T> = Result<T, Error>;
