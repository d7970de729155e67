//! First-in, first-out: the oldest lot with anything left funds the event.

use super::{AccountingMethod, LotCandidates, LotMatch, LotOrder, SeekResult};
use crate::engine::TaxableEvent;
use rust_decimal::Decimal;

#[derive(Debug)]
pub struct Fifo;

impl AccountingMethod for Fifo {
    fn name(&self) -> &'static str {
        "fifo"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TaxableEvent;
    use crate::methods::tests::{sell_event, Fixture};
    use rust_decimal_macros::dec;

    #[test]
    fn picks_oldest_lot_first() {
        let fixture = Fixture::new(&[
            ("2020-01-01T00:00:00Z", dec!(10000), dec!(1)),
            ("2020-02-01T00:00:00Z", dec!(20000), dec!(1)),
        ]);
        let sell = sell_event("2020-03-01T00:00:00Z", dec!(1.5));
        let event = TaxableEvent::Disposal(&sell);

        let candidates = fixture.candidates(Fifo.lot_order());
        let result = Fifo.seek_lot(&candidates, &event, dec!(1.5));
        assert_eq!(
            result,
            SeekResult::Found(LotMatch {
                lot_index: 0,
                remaining: dec!(1),
                basis_price_override: None,
            })
        );
    }

    #[test]
    fn skips_exhausted_lots() {
        let mut fixture = Fixture::new(&[
            ("2020-01-01T00:00:00Z", dec!(10000), dec!(1)),
            ("2020-02-01T00:00:00Z", dec!(20000), dec!(1)),
        ]);
        fixture.remaining[0] = dec!(0);

        let sell = sell_event("2020-03-01T00:00:00Z", dec!(0.5));
        let event = TaxableEvent::Disposal(&sell);
        let candidates = fixture.candidates(Fifo.lot_order());
        match Fifo.seek_lot(&candidates, &event, dec!(0.5)) {
            SeekResult::Found(m) => assert_eq!(m.lot_index, 1),
            SeekResult::Exhausted => panic!("expected a lot"),
        }
    }

    #[test]
    fn exhausted_when_only_future_lots_remain() {
        // Inventory acquired after the event cannot cover it, even though
        // the later lot still has its full amount.
        let mut fixture = Fixture::new(&[
            ("2020-01-01T00:00:00Z", dec!(10000), dec!(1)),
            ("2020-06-01T00:00:00Z", dec!(20000), dec!(1)),
        ]);
        fixture.remaining[0] = dec!(0);

        let sell = sell_event("2020-03-01T00:00:00Z", dec!(0.5));
        let event = TaxableEvent::Disposal(&sell);
        let candidates = fixture.candidates(Fifo.lot_order());
        assert_eq!(
            Fifo.seek_lot(&candidates, &event, dec!(0.5)),
            SeekResult::Exhausted
        );
    }

    #[test]
    fn exhausted_when_nothing_left() {
        let mut fixture = Fixture::new(&[("2020-01-01T00:00:00Z", dec!(10000), dec!(1))]);
        fixture.remaining[0] = dec!(0);

        let sell = sell_event("2020-03-01T00:00:00Z", dec!(0.5));
        let event = TaxableEvent::Disposal(&sell);
        let candidates = fixture.candidates(Fifo.lot_order());
        assert_eq!(Fifo.seek_lot(&candidates, &event, dec!(0.5)), SeekResult::Exhausted);
    }
}
