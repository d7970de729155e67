//! Last-in, first-out: the newest lot with anything left funds the event.
//!
//! No tax-year restriction is imposed here; jurisdictions that bound LIFO to
//! the event's year can plug in a variant that filters the candidates.

use super::{AccountingMethod, LotCandidates, LotMatch, LotOrder, SeekResult};
use crate::engine::TaxableEvent;
use rust_decimal::Decimal;

#[derive(Debug)]
pub struct Lifo;

impl AccountingMethod for Lifo {
    fn name(&self) -> &'static str {
        "lifo"
    }

    fn lot_order(&self) -> LotOrder {
        LotOrder::NewerToOlder
    }

    fn seek_lot(
        &self,
        candidates: &LotCandidates<'_>,
        event: &TaxableEvent<'_>,
        _amount: Decimal,
    ) -> SeekResult {
        for (index, lot) in candidates.iter() {
            // Lots acquired after the event cannot fund it.
            if lot.timestamp > event.timestamp() {
                continue;
            }
            if !candidates.is_exhausted(index) {
                return SeekResult::Found(LotMatch {
                    lot_index: index,
                    remaining: candidates.remaining(index),
                    basis_price_override: None,
                });
            }
        }
        SeekResult::Exhausted
    }
}
