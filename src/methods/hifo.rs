//! Highest-in, first-out: the costliest lot funds the event first,
//! minimizing the realized gain. Price ties go to the older lot.

use super::{AccountingMethod, LotCandidates, LotMatch, LotOrder, SeekResult};
use crate::engine::TaxableEvent;
use rust_decimal::Decimal;

#[derive(Debug)]
pub struct Hifo;

impl AccountingMethod for Hifo {
    fn name(&self) -> &'static str {
        "hifo"
    }

    fn lot_order(&self) -> LotOrder {
        LotOrder::OlderToNewer
    }

    fn seek_lot(
        &self,
        candidates: &LotCandidates<'_>,
        event: &TaxableEvent<'_>,
        _amount: Decimal,
    ) -> SeekResult {
        let mut best: Option<(usize, Decimal)> = None;
        for (index, lot) in candidates.iter() {
            // Lots acquired after the event cannot fund it.
            if lot.timestamp > event.timestamp() {
                continue;
            }
            if candidates.is_exhausted(index) {
                continue;
            }
            let better = match best {
                None => true,
                // Forward scan over older-to-newer order: a strictly higher
                // price wins, an equal price keeps the earlier lot.
                Some((_, best_price)) => lot.spot_price > best_price,
            };
            if better {
                best = Some((index, lot.spot_price));
            }
        }
        match best {
            Some((index, _)) => SeekResult::Found(LotMatch {
                lot_index: index,
                remaining: candidates.remaining(index),
                basis_price_override: None,
            }),
            None => SeekResult::Exhausted,
        }
    }
}
