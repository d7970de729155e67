//! The accounting-method protocol and the built-in method registry.
//!
//! A method decides which acquired lot funds the next fraction of a taxable
//! event. The engine owns the remaining-amount bookkeeping; methods only
//! inspect the candidate view and point at a lot.

mod average;
mod fifo;
mod hifo;
mod lifo;

pub use average::TotalAverage;
pub use fifo::Fifo;
pub use hifo::Hifo;
pub use lifo::Lifo;

use crate::engine::TaxableEvent;
use crate::entry_set::EntrySet;
use crate::error::{Result, TaxlotError};
use crate::transaction::Acquisition;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Direction in which a method traverses the acquired-lot candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LotOrder {
    OlderToNewer,
    NewerToOlder,
}

/// Read-only view over the sealed acquisitions of one asset plus the
/// engine's remaining amounts, traversed in the method's order.
pub struct LotCandidates<'a> {
    lots: &'a EntrySet<Acquisition>,
    remaining: &'a [Decimal],
    order: &'a [usize],
}

impl<'a> LotCandidates<'a> {
    pub(crate) fn new(
        lots: &'a EntrySet<Acquisition>,
        remaining: &'a [Decimal],
        order: &'a [usize],
    ) -> Self {
        debug_assert_eq!(lots.len(), remaining.len());
        LotCandidates {
            lots,
            remaining,
            order,
        }
    }

    /// Lots in method traversal order, with their entry-set index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &'a Acquisition)> + '_ {
        self.order
            .iter()
            .map(|&index| (index, self.lots.get(index).expect("order index in range")))
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    /// Unconsumed amount left in the lot at `index`.
    pub fn remaining(&self, index: usize) -> Decimal {
        self.remaining[index]
    }

    pub fn is_exhausted(&self, index: usize) -> bool {
        self.remaining[index] == crate::decimal::ZERO
    }

    /// Whether earlier pairings consumed part (but not all) of the lot.
    pub fn has_partial_amount(&self, index: usize) -> bool {
        let lot = self.lots.get(index).expect("index in range");
        self.remaining[index] > crate::decimal::ZERO && self.remaining[index] < lot.crypto_in
    }

    pub fn partial_amount(&self, index: usize) -> Decimal {
        self.remaining[index]
    }
}

/// A lot selected by a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotMatch {
    /// Index of the selected lot in the asset's acquisitions entry set.
    pub lot_index: usize,
    /// Unconsumed amount in that lot.
    pub remaining: Decimal,
    /// Cost-basis price to use instead of the lot's own spot price.
    /// Only averaging methods set this.
    pub basis_price_override: Option<Decimal>,
}

/// Outcome of one seek: either a lot to draw from or nothing left that the
/// method is willing to select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeekResult {
    Found(LotMatch),
    Exhausted,
}

/// A pluggable lot-selection policy.
pub trait AccountingMethod: std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Traversal direction for the candidate view handed to `seek_lot`.
    fn lot_order(&self) -> LotOrder;

    /// Select the next non-exhausted lot for `amount` of `event`.
    fn seek_lot(
        &self,
        candidates: &LotCandidates<'_>,
        event: &TaxableEvent<'_>,
        amount: Decimal,
    ) -> SeekResult;
}

/// Explicit registry of accounting methods; looked up by the name in the
/// configuration. Built-ins are registered at construction, callers may add
/// their own before the run starts.
pub struct MethodRegistry {
    methods: BTreeMap<&'static str, Box<dyn AccountingMethod>>,
}

impl MethodRegistry {
    pub fn with_builtins() -> Self {
        let mut registry = MethodRegistry {
            methods: BTreeMap::new(),
        };
        registry.register(Box::new(Fifo));
        registry.register(Box::new(Lifo));
        registry.register(Box::new(Hifo));
        registry.register(Box::new(TotalAverage));
        registry
    }

    pub fn register(&mut self, method: Box<dyn AccountingMethod>) {
        self.methods.insert(method.name(), method);
    }

    pub fn get(&self, name: &str) -> Result<&dyn AccountingMethod> {
        self.methods
            .get(name)
            .map(|method| method.as_ref())
            .ok_or_else(|| {
                TaxlotError::Configuration(format!("unknown accounting method '{name}'"))
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.methods.keys().copied()
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
