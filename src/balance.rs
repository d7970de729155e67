//! Second-pass derivation of per-account balances and yearly summaries.
//!
//! Balances are computed from the transaction streams, not from gain/loss
//! records, so they also cover non-taxable flows. The synthetic MOVE disposal
//! is skipped here: its fee is already part of the transfer's `crypto_sent`
//! and counting both would double the outflow.

use crate::decimal::ZERO;
use crate::engine::{CapitalGainType, GainLoss};
use crate::error::{LineId, Result, TaxlotError};
use crate::transaction::{Timestamp, TransactionKind};
use crate::transform::AssetEntries;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Running state of one (exchange, holder) account for a single asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Balance {
    pub exchange: String,
    pub holder: String,
    pub acquired_balance: Decimal,
    pub sent_balance: Decimal,
    pub received_balance: Decimal,
}

impl Balance {
    fn new(exchange: &str, holder: &str) -> Self {
        Balance {
            exchange: exchange.to_string(),
            holder: holder.to_string(),
            acquired_balance: ZERO,
            sent_balance: ZERO,
            received_balance: ZERO,
        }
    }

    pub fn final_balance(&self) -> Decimal {
        self.acquired_balance + self.received_balance - self.sent_balance
    }
}

/// All account balances of one asset, keyed by (exchange, holder).
#[derive(Debug, Clone, Default)]
pub struct BalanceSet {
    balances: BTreeMap<(String, String), Balance>,
}

impl BalanceSet {
    pub fn get(&self, exchange: &str, holder: &str) -> Option<&Balance> {
        self.balances
            .get(&(exchange.to_string(), holder.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Balance> {
        self.balances.values()
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    /// Asset-level aggregate across every account.
    pub fn total_final_balance(&self) -> Decimal {
        self.balances.values().map(Balance::final_balance).sum()
    }

    fn entry(&mut self, exchange: &str, holder: &str) -> &mut Balance {
        self.balances
            .entry((exchange.to_string(), holder.to_string()))
            .or_insert_with(|| Balance::new(exchange, holder))
    }

    fn check(&self, exchange: &str, holder: &str, asset: &str, line: LineId) -> Result<()> {
        let balance = self
            .get(exchange, holder)
            .expect("account touched before check");
        if balance.final_balance() < ZERO {
            Err(TaxlotError::BalanceUnderflow {
                line,
                asset: asset.to_string(),
                exchange: exchange.to_string(),
                holder: holder.to_string(),
                balance: balance.final_balance(),
            })
        } else {
            Ok(())
        }
    }
}

/// Walk the asset's streams in `(timestamp, line_id)` order, maintaining
/// every account's running balance and failing the moment one would go
/// negative.
pub fn derive_balances(entries: &AssetEntries) -> Result<BalanceSet> {
    enum Step<'a> {
        Acquisition(&'a crate::transaction::Acquisition),
        Disposal(&'a crate::transaction::Disposal),
        Transfer(&'a crate::transaction::Transfer),
    }

    impl Step<'_> {
        fn key(&self) -> (Timestamp, LineId) {
            match self {
                Step::Acquisition(a) => (a.timestamp, a.line_id),
                Step::Disposal(d) => (d.timestamp, d.line_id),
                Step::Transfer(t) => (t.timestamp, t.line_id),
            }
        }
    }

    let asset = entries.acquisitions.asset();
    let mut steps: Vec<Step<'_>> = Vec::new();
    steps.extend(entries.acquisitions.iter().map(Step::Acquisition));
    steps.extend(
        entries
            .disposals
            .iter()
            .filter(|d| d.kind != TransactionKind::Move)
            .map(Step::Disposal),
    );
    steps.extend(entries.transfers.iter().map(Step::Transfer));
    steps.sort_by_key(Step::key);

    let mut set = BalanceSet::default();
    for step in steps {
        match step {
            Step::Acquisition(acq) => {
                set.entry(&acq.exchange, &acq.holder).acquired_balance += acq.crypto_in;
                set.check(&acq.exchange, &acq.holder, asset, acq.line_id)?;
            }
            Step::Disposal(disp) => {
                set.entry(&disp.exchange, &disp.holder).sent_balance += disp.crypto_out_with_fee;
                set.check(&disp.exchange, &disp.holder, asset, disp.line_id)?;
            }
            Step::Transfer(transfer) => {
                set.entry(&transfer.from_exchange, &transfer.from_holder).sent_balance +=
                    transfer.crypto_sent;
                set.entry(&transfer.to_exchange, &transfer.to_holder).received_balance +=
                    transfer.crypto_received;
                set.check(
                    &transfer.from_exchange,
                    &transfer.from_holder,
                    asset,
                    transfer.line_id,
                )?;
                set.check(
                    &transfer.to_exchange,
                    &transfer.to_holder,
                    asset,
                    transfer.line_id,
                )?;
            }
        }
    }
    Ok(set)
}

/// Totals of one (year, capital-gain type) bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearlySummary {
    pub year: i32,
    pub gain_type: CapitalGainType,
    pub crypto_amount: Decimal,
    pub fiat_proceeds: Decimal,
    pub fiat_cost_basis: Decimal,
    pub fiat_gain_loss: Decimal,
}

/// Group the gain/loss stream by `(event year, capital-gain type)`.
pub fn yearly_summaries(gains: &[GainLoss]) -> Vec<YearlySummary> {
    fn rank(gain_type: CapitalGainType) -> u8 {
        match gain_type {
            CapitalGainType::Short => 0,
            CapitalGainType::Long => 1,
            CapitalGainType::None => 2,
        }
    }

    let mut buckets: BTreeMap<(i32, u8), YearlySummary> = BTreeMap::new();
    for gain in gains {
        let summary = buckets
            .entry((gain.year(), rank(gain.gain_type)))
            .or_insert_with(|| YearlySummary {
                year: gain.year(),
                gain_type: gain.gain_type,
                crypto_amount: ZERO,
                fiat_proceeds: ZERO,
                fiat_cost_basis: ZERO,
                fiat_gain_loss: ZERO,
            });
        summary.crypto_amount += gain.crypto_amount;
        summary.fiat_proceeds += gain.fiat_proceeds;
        summary.fiat_cost_basis += gain.fiat_cost_basis;
        summary.fiat_gain_loss += gain.fiat_gain_loss;
    }
    buckets.into_values().collect()
}
