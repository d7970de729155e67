//! The per-asset result artifact handed to report generators.

use crate::balance::{self, BalanceSet, YearlySummary};
use crate::config::Configuration;
use crate::decimal::ZERO;
use crate::engine::{GainLoss, PairingOutcome};
use crate::transform::AssetEntries;
use crate::transaction::{Acquisition, Disposal, Transfer};
use crate::entry_set::EntrySet;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Everything the run produced for one asset. Immutable; report generators
/// only ever read it.
///
/// The `[from_date, to_date]` window is applied here, not in the engine:
/// out-of-window transactions still shape cost basis, they are only filtered
/// out of the reporting views.
#[derive(Debug, Clone)]
pub struct ComputedData {
    asset: String,
    entries: AssetEntries,
    gains: Vec<GainLoss>,
    lot_remaining: Vec<Decimal>,
    balances: BalanceSet,
    summaries: Vec<YearlySummary>,
    total_crypto_acquired: Decimal,
    total_crypto_disposed: Decimal,
    average_acquisition_price: Decimal,
    from_date: NaiveDate,
    to_date: NaiveDate,
}

impl ComputedData {
    pub(crate) fn new(
        asset: String,
        entries: AssetEntries,
        outcome: PairingOutcome,
        balances: BalanceSet,
        config: &Configuration,
    ) -> Self {
        let summaries = balance::yearly_summaries(&outcome.gains);

        let total_crypto_acquired: Decimal =
            entries.acquisitions.iter().map(|a| a.crypto_in).sum();
        let total_crypto_disposed: Decimal =
            entries.disposals.iter().map(|d| d.crypto_out_with_fee).sum();
        let total_fiat_acquired: Decimal = entries
            .acquisitions
            .iter()
            .map(|a| a.crypto_in * a.spot_price)
            .sum();
        let average_acquisition_price = if total_crypto_acquired > ZERO {
            total_fiat_acquired / total_crypto_acquired
        } else {
            ZERO
        };

        ComputedData {
            asset,
            entries,
            gains: outcome.gains,
            lot_remaining: outcome.lot_remaining,
            balances,
            summaries,
            total_crypto_acquired,
            total_crypto_disposed,
            average_acquisition_price,
            from_date: config.from_date(),
            to_date: config.to_date(),
        }
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn acquisitions(&self) -> &EntrySet<Acquisition> {
        &self.entries.acquisitions
    }

    pub fn disposals(&self) -> &EntrySet<Disposal> {
        &self.entries.disposals
    }

    pub fn transfers(&self) -> &EntrySet<Transfer> {
        &self.entries.transfers
    }

    /// The full gain/loss stream, in emission order.
    pub fn gain_loss_list(&self) -> &[GainLoss] {
        &self.gains
    }

    /// Unconsumed amount per acquired lot, parallel to the acquisitions set.
    pub fn lot_remaining(&self) -> &[Decimal] {
        &self.lot_remaining
    }

    pub fn balances(&self) -> &BalanceSet {
        &self.balances
    }

    pub fn yearly_summaries(&self) -> &[YearlySummary] {
        &self.summaries
    }

    pub fn from_date(&self) -> NaiveDate {
        self.from_date
    }

    pub fn to_date(&self) -> NaiveDate {
        self.to_date
    }

    pub fn total_crypto_acquired(&self) -> Decimal {
        self.total_crypto_acquired
    }

    pub fn total_crypto_disposed(&self) -> Decimal {
        self.total_crypto_disposed
    }

    /// Volume-weighted average spot price across every acquired lot.
    pub fn average_acquisition_price(&self) -> Decimal {
        self.average_acquisition_price
    }

    /// Gain/loss records whose event date falls inside the window.
    pub fn gains_in_window(&self) -> impl Iterator<Item = &GainLoss> {
        self.gains.iter().filter(|g| {
            let date = g.event_timestamp.date_naive();
            date >= self.from_date && date <= self.to_date
        })
    }

    /// Yearly summaries whose year overlaps the window.
    pub fn summaries_in_window(&self) -> impl Iterator<Item = &YearlySummary> {
        use chrono::Datelike;
        let from_year = self.from_date.year();
        let to_year = self.to_date.year();
        self.summaries
            .iter()
            .filter(move |s| s.year >= from_year && s.year <= to_year)
    }
}
