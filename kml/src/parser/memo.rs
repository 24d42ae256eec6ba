//! Packrat tables and the whole-expression cache.

use std::collections::{HashMap, VecDeque};

use log::debug;
use strum::Display;

use crate::expr::{Expression, MatrixExpr, NumberExpr};

/// Memoized grammar productions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum Rule {
    BracketedNumber,
    NumberCall,
    NumberMulTerm,
    NumberProduct,
    NumberTerm,
    NumberSum,
    NumberExpression,
    MatrixTerm,
    MatrixNumberTerm,
    MatrixProduct,
    MatrixExpression,
}

/// Outcome of a production at a given offset.
#[derive(Debug, Clone)]
pub(crate) enum Memo<T> {
    Found { node: T, end: usize },
    NotFound,
}

/// Per-parse results keyed by `(rule, start offset)`.
#[derive(Debug, Default)]
pub(crate) struct MemoTables {
    numbers: HashMap<(Rule, usize), Memo<NumberExpr>>,
    matrices: HashMap<(Rule, usize), Memo<MatrixExpr>>,
    pub(crate) hits: usize,
    pub(crate) misses: usize,
}

impl MemoTables {
    pub(crate) fn clear(&mut self) {
        self.numbers.clear();
        self.matrices.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

/// Node types with their own table.
pub(crate) trait Memoized: Clone + Sized {
    fn table(tables: &mut MemoTables) -> &mut HashMap<(Rule, usize), Memo<Self>>;
}

impl Memoized for NumberExpr {
    fn table(tables: &mut MemoTables) -> &mut HashMap<(Rule, usize), Memo<Self>> {
        &mut tables.numbers
    }
}

impl Memoized for MatrixExpr {
    fn table(tables: &mut MemoTables) -> &mut HashMap<(Rule, usize), Memo<Self>> {
        &mut tables.matrices
    }
}

/// What a parse depends on besides its source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Origin {
    pub(crate) functions: u64,
    pub(crate) max_depth: usize,
    pub(crate) max_height: usize,
}

/// Parsed expressions remembered across programs, keyed by their exact source
/// text. When full, the oldest entry is evicted. A capacity of zero disables
/// the cache.
///
/// Entries are only valid for the function table and limits they were parsed
/// with. A parser using different ones empties the cache first.
#[derive(Debug, Clone)]
pub struct ExpressionCache {
    entries: HashMap<String, Expression>,
    order: VecDeque<String>,
    capacity: usize,
    origin: Option<Origin>,
}

impl ExpressionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
            origin: None,
        }
    }

    /// Make `origin` the owner of the entries, dropping them if they were
    /// parsed under another one.
    pub(crate) fn adopt(&mut self, origin: Origin) {
        if self.origin == Some(origin) {
            return;
        }
        if !self.is_empty() {
            debug!("Dropping {} cached expressions parsed with other settings", self.len());
            self.clear();
        }
        self.origin = Some(origin);
    }

    pub fn get(&self, source: &str) -> Option<&Expression> {
        self.entries.get(source)
    }

    pub fn insert(&mut self, source: &str, expression: Expression) {
        if self.capacity == 0 || self.entries.contains_key(source) {
            return;
        }
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            debug!("Evicted cached expression `{oldest}`");
            self.entries.remove(&oldest);
        }
        self.order.push_back(source.to_string());
        self.entries.insert(source.to_string(), expression);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
