//! Total-average method: cost basis is the volume-weighted average price of
//! every lot acquired through the end of the event's calendar year.
//!
//! The earliest non-exhausted lot carries the fraction bookkeeping; the
//! averaged price rides along as a basis override, so the engine's pairing
//! loop stays method-agnostic.

use super::{AccountingMethod, LotCandidates, LotMatch, LotOrder, SeekResult};
use crate::engine::TaxableEvent;
use chrono::Datelike;
use rust_decimal::Decimal;

#[derive(Debug)]
pub struct TotalAverage;

impl AccountingMethod for TotalAverage {
    fn name(&self) -> &'static str {
        "total_average"
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
        let event_year = event.timestamp().year();

        let mut volume = crate::decimal::ZERO;
        let mut cost = crate::decimal::ZERO;
        let mut first_open: Option<usize> = None;
        for (index, lot) in candidates.iter() {
            if lot.timestamp.year() > event_year {
                continue;
            }
            volume += lot.crypto_in;
            cost += lot.crypto_in * lot.spot_price;
            if first_open.is_none() && !candidates.is_exhausted(index) {
                first_open = Some(index);
            }
        }

        match first_open {
            Some(index) if volume > crate::decimal::ZERO => SeekResult::Found(LotMatch {
                lot_index: index,
                remaining: candidates.remaining(index),
                basis_price_override: Some(cost / volume),
            }),
            _ => SeekResult::Exhausted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TaxableEvent;
    use crate::methods::tests::{sell_event, Fixture};
    use rust_decimal_macros::dec;

    #[test]
    fn basis_is_volume_weighted_average() {
        // 1 at 10000 and 3 at 20000 average to 17500.
        let fixture = Fixture::new(&[
            ("2020-01-01T00:00:00Z", dec!(10000), dec!(1)),
            ("2020-02-01T00:00:00Z", dec!(20000), dec!(3)),
        ]);
        let sell = sell_event("2020-03-01T00:00:00Z", dec!(2));
        let event = TaxableEvent::Disposal(&sell);

        let candidates = fixture.candidates(TotalAverage.lot_order());
        match TotalAverage.seek_lot(&candidates, &event, dec!(2)) {
            SeekResult::Found(m) => {
                assert_eq!(m.lot_index, 0);
                assert_eq!(m.basis_price_override, Some(dec!(17500)));
            }
            SeekResult::Exhausted => panic!("expected a lot"),
        }
    }

    #[test]
    fn lots_from_later_years_are_excluded() {
        let fixture = Fixture::new(&[
            ("2020-01-01T00:00:00Z", dec!(10000), dec!(1)),
            ("2021-01-01T00:00:00Z", dec!(50000), dec!(1)),
        ]);
        let sell = sell_event("2020-03-01T00:00:00Z", dec!(0.5));
        let event = TaxableEvent::Disposal(&sell);

        let candidates = fixture.candidates(TotalAverage.lot_order());
        match TotalAverage.seek_lot(&candidates, &event, dec!(0.5)) {
            SeekResult::Found(m) => {
                assert_eq!(m.basis_price_override, Some(dec!(10000)));
            }
            SeekResult::Exhausted => panic!("expected a lot"),
        }
    }

    #[test]
    fn same_year_lots_after_the_event_still_count() {
        // The yearly average covers the whole calendar year, including lots
        // acquired after the disposal date.
        let fixture = Fixture::new(&[
            ("2020-01-01T00:00:00Z", dec!(10000), dec!(1)),
            ("2020-11-01T00:00:00Z", dec!(30000), dec!(1)),
        ]);
        let sell = sell_event("2020-03-01T00:00:00Z", dec!(0.5));
        let event = TaxableEvent::Disposal(&sell);

        let candidates = fixture.candidates(TotalAverage.lot_order());
        match TotalAverage.seek_lot(&candidates, &event, dec!(0.5)) {
            SeekResult::Found(m) => {
                assert_eq!(m.basis_price_override, Some(dec!(20000)));
            }
            SeekResult::Exhausted => panic!("expected a lot"),
        }
    }

    #[test]
    fn exhausted_when_every_lot_is_consumed() {
        let mut fixture = Fixture::new(&[("2020-01-01T00:00:00Z", dec!(10000), dec!(1))]);
        fixture.remaining[0] = dec!(0);

        let sell = sell_event("2020-03-01T00:00:00Z", dec!(0.5));
        let event = TaxableEvent::Disposal(&sell);
        let candidates = fixture.candidates(TotalAverage.lot_order());
        assert_eq!(
            TotalAverage.seek_lot(&candidates, &event, dec!(0.5)),
            SeekResult::Exhausted
        );
    }
}
