use serde::Deserialize;

use crate::error::KmlResult;
use crate::parser::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_HEIGHT};

/// Tunables of a [`Kml`](crate::Kml) session.
///
/// Every field has a default, so a configuration document only needs to name
/// the values it changes:
///
/// ```
/// let config = kml::Config::from_toml_str("max_depth = 16").unwrap();
/// assert_eq!(config.max_depth, 16);
/// assert!(config.include_results);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Maximum nesting of brackets, determinants, signs and argument lists.
    pub max_depth: usize,
    /// Maximum height of an expression tree. Long operator chains such as
    /// `1+1+...+1` add one level per operator.
    pub max_height: usize,
    /// Number of parsed expressions remembered across programs. Zero disables
    /// the cache.
    pub expression_cache_capacity: usize,
    /// Whether traces carry the evaluated value of every node.
    pub include_results: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_height: DEFAULT_MAX_HEIGHT,
            expression_cache_capacity: 256,
            include_results: true,
        }
    }
}

impl Config {
    pub fn from_toml_str(document: &str) -> KmlResult<Self> {
        Ok(toml::from_str(document)?)
    }
}
