//! The gain/loss pairing engine.
//!
//! Per asset, taxable events (disposals plus income-kind acquisitions) are
//! walked in `(timestamp, line_id)` order; each disposal amount is funded by
//! acquired-lot fractions chosen by the configured accounting method. No
//! value is rounded anywhere in the loop, so the emitted records sum back to
//! the inputs with exact decimal equality.

use crate::balance::{self, BalanceSet};
use crate::computed::ComputedData;
use crate::config::Configuration;
use crate::decimal::{HUNDRED, ZERO};
use crate::error::{LineId, Result, TaxlotError};
use crate::methods::{AccountingMethod, LotCandidates, LotOrder, MethodRegistry, SeekResult};
use crate::transaction::{Acquisition, Disposal, Timestamp, Transaction, TransactionKind};
use crate::transform::{self, AssetEntries};
use chrono::Datelike;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Holding-period classification of one gain/loss record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CapitalGainType {
    Long,
    Short,
    /// Income-kind acquisitions have no paired lot and no holding period.
    None,
}

impl std::fmt::Display for CapitalGainType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CapitalGainType::Long => "LONG",
            CapitalGainType::Short => "SHORT",
            CapitalGainType::None => "NONE",
        };
        f.write_str(s)
    }
}

/// Position of a taxable event in its sealed entry set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRef {
    Acquisition(usize),
    Disposal(usize),
}

/// One taxable event during iteration: either an income-kind acquisition or
/// a disposal (including synthetic FEE and MOVE rows).
#[derive(Debug, Clone, Copy)]
pub enum TaxableEvent<'a> {
    Acquisition(&'a Acquisition),
    Disposal(&'a Disposal),
}

impl<'a> TaxableEvent<'a> {
    pub fn timestamp(&self) -> Timestamp {
        match self {
            TaxableEvent::Acquisition(a) => a.timestamp,
            TaxableEvent::Disposal(d) => d.timestamp,
        }
    }

    pub fn line_id(&self) -> LineId {
        match self {
            TaxableEvent::Acquisition(a) => a.line_id,
            TaxableEvent::Disposal(d) => d.line_id,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        match self {
            TaxableEvent::Acquisition(a) => a.kind,
            TaxableEvent::Disposal(d) => d.kind,
        }
    }

    pub fn spot_price(&self) -> Decimal {
        match self {
            TaxableEvent::Acquisition(a) => a.spot_price,
            TaxableEvent::Disposal(d) => d.spot_price,
        }
    }

    pub fn crypto_taxable_amount(&self) -> Decimal {
        match self {
            TaxableEvent::Acquisition(a) => a.crypto_taxable_amount(),
            TaxableEvent::Disposal(d) => d.crypto_taxable_amount(),
        }
    }
}

/// One fraction of a taxable event paired with one fraction of an acquired
/// lot (or standing alone for income-kind acquisitions).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GainLoss {
    pub asset: String,
    pub event: EventRef,
    pub event_kind: TransactionKind,
    pub event_timestamp: Timestamp,
    pub event_line_id: LineId,
    /// Index of the funding lot in the acquisitions entry set; `None` for
    /// income-kind acquisition events.
    pub lot_index: Option<usize>,
    pub lot_timestamp: Option<Timestamp>,
    pub lot_line_id: Option<LineId>,
    pub crypto_amount: Decimal,
    pub fiat_proceeds: Decimal,
    pub fiat_cost_basis: Decimal,
    pub fiat_gain_loss: Decimal,
    pub gain_type: CapitalGainType,
    /// Share of the taxable event funded by this record, in percent.
    pub event_fraction_percent: Decimal,
    /// Share of the acquired lot consumed by this record, in percent.
    pub lot_fraction_percent: Decimal,
}

impl GainLoss {
    pub fn year(&self) -> i32 {
        self.event_timestamp.year()
    }
}

/// Result of pairing one asset: the ordered gain/loss records and what is
/// left of every acquired lot.
#[derive(Debug, Clone)]
pub struct PairingOutcome {
    pub gains: Vec<GainLoss>,
    pub lot_remaining: Vec<Decimal>,
}

/// Pair every taxable event of one asset against acquired-lot fractions.
pub fn pair_lots(
    config: &Configuration,
    method: &dyn AccountingMethod,
    entries: &AssetEntries,
) -> Result<PairingOutcome> {
    let asset = entries.acquisitions.asset();
    let events = merge_events(entries)?;

    let order: Vec<usize> = match method.lot_order() {
        LotOrder::OlderToNewer => (0..entries.acquisitions.len()).collect(),
        LotOrder::NewerToOlder => (0..entries.acquisitions.len()).rev().collect(),
    };
    let mut remaining: Vec<Decimal> = entries
        .acquisitions
        .iter()
        .map(|lot| lot.crypto_in)
        .collect();

    let mut gains = Vec::new();
    for (event_ref, event) in events {
        match event {
            TaxableEvent::Acquisition(acq) => {
                // Income on receipt: proceeds at fair market value, nothing
                // consumed from the lots.
                gains.push(GainLoss {
                    asset: asset.to_string(),
                    event: event_ref,
                    event_kind: acq.kind,
                    event_timestamp: acq.timestamp,
                    event_line_id: acq.line_id,
                    lot_index: None,
                    lot_timestamp: None,
                    lot_line_id: None,
                    crypto_amount: acq.crypto_in,
                    fiat_proceeds: acq.fiat_in_no_fee,
                    fiat_cost_basis: ZERO,
                    fiat_gain_loss: acq.fiat_in_no_fee,
                    gain_type: CapitalGainType::None,
                    event_fraction_percent: HUNDRED,
                    lot_fraction_percent: HUNDRED,
                });
            }
            TaxableEvent::Disposal(disp) => {
                let event_amount = disp.crypto_taxable_amount();
                let mut need = event_amount;
                while need > ZERO {
                    let sought = {
                        let candidates =
                            LotCandidates::new(&entries.acquisitions, &remaining, &order);
                        method.seek_lot(&candidates, &event, need)
                    };
                    let matched = match sought {
                        SeekResult::Found(matched) => matched,
                        SeekResult::Exhausted => {
                            return Err(TaxlotError::AcquiredLotsExhausted {
                                line: disp.line_id,
                                asset: asset.to_string(),
                                shortfall: need,
                            });
                        }
                    };
                    let lot = entries
                        .acquisitions
                        .get(matched.lot_index)
                        .expect("method returned an index inside the candidate view");
                    debug_assert!(matched.remaining > ZERO);

                    let take = need.min(matched.remaining);
                    let basis_price = matched.basis_price_override.unwrap_or(lot.spot_price);
                    let fiat_proceeds = take * disp.spot_price;
                    let fiat_cost_basis = take * basis_price;
                    let elapsed = disp.timestamp.signed_duration_since(lot.timestamp);
                    let gain_type = if elapsed.num_days() >= config.long_term_days() {
                        CapitalGainType::Long
                    } else {
                        CapitalGainType::Short
                    };

                    log::debug!(
                        "{asset}: line {} takes {take} from lot line {} ({gain_type}), \
                         proceeds {fiat_proceeds}, basis {fiat_cost_basis}",
                        disp.line_id,
                        lot.line_id,
                    );

                    gains.push(GainLoss {
                        asset: asset.to_string(),
                        event: event_ref,
                        event_kind: disp.kind,
                        event_timestamp: disp.timestamp,
                        event_line_id: disp.line_id,
                        lot_index: Some(matched.lot_index),
                        lot_timestamp: Some(lot.timestamp),
                        lot_line_id: Some(lot.line_id),
                        crypto_amount: take,
                        fiat_proceeds,
                        fiat_cost_basis,
                        fiat_gain_loss: fiat_proceeds - fiat_cost_basis,
                        gain_type,
                        event_fraction_percent: take / event_amount * HUNDRED,
                        lot_fraction_percent: take / lot.crypto_in * HUNDRED,
                    });

                    remaining[matched.lot_index] -= take;
                    need -= take;
                }
            }
        }
    }

    Ok(PairingOutcome {
        gains,
        lot_remaining: remaining,
    })
}

/// Run the whole computation: transform, pair, derive balances, and build
/// the per-asset artifacts. Assets are independent; the first failing asset
/// aborts with its line id, continuation policy belongs to the caller.
pub fn compute_all(
    config: &Configuration,
    transactions: Vec<Transaction>,
) -> Result<BTreeMap<String, ComputedData>> {
    compute_all_with(config, transactions, &MethodRegistry::with_builtins())
}

/// Like [`compute_all`], resolving the method through a caller-supplied
/// registry.
pub fn compute_all_with(
    config: &Configuration,
    transactions: Vec<Transaction>,
    registry: &MethodRegistry,
) -> Result<BTreeMap<String, ComputedData>> {
    let method = registry.get(config.accounting_method())?;
    let by_asset = transform::transform(transactions, config)?;

    let mut computed = BTreeMap::new();
    for (asset, entries) in by_asset {
        log::info!(
            "{asset}: {} acquisitions, {} disposals, {} transfers ({})",
            entries.acquisitions.len(),
            entries.disposals.len(),
            entries.transfers.len(),
            method.name(),
        );
        let outcome = pair_lots(config, method, &entries)?;
        let balances: BalanceSet = balance::derive_balances(&entries)?;
        computed.insert(
            asset.clone(),
            ComputedData::new(asset, entries, outcome, balances, config),
        );
    }
    Ok(computed)
}

/// Interleave disposals and income-kind acquisitions by `(timestamp,
/// line_id)`. Two events on the same key would make the order ambiguous and
/// are rejected.
fn merge_events(entries: &AssetEntries) -> Result<Vec<(EventRef, TaxableEvent<'_>)>> {
    let mut events: Vec<(EventRef, TaxableEvent<'_>)> = Vec::new();
    for (index, acq) in entries.acquisitions.iter().enumerate() {
        if acq.is_taxable() {
            events.push((EventRef::Acquisition(index), TaxableEvent::Acquisition(acq)));
        }
    }
    for (index, disp) in entries.disposals.iter().enumerate() {
        if disp.is_taxable() {
            events.push((EventRef::Disposal(index), TaxableEvent::Disposal(disp)));
        }
    }
    events.sort_by_key(|(_, event)| (event.timestamp(), event.line_id()));
    for pair in events.windows(2) {
        let (a, b) = (&pair[0].1, &pair[1].1);
        if a.timestamp() == b.timestamp() && a.line_id() == b.line_id() {
            return Err(TaxlotError::Ordering {
                line: b.line_id(),
                message: format!("two taxable events at {} share a line id", b.timestamp()),
            });
        }
    }
    Ok(events)
}
