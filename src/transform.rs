//! Normalizes the validated transaction stream into sealed per-asset entry
//! sets ready for the engine.
//!
//! Two kinds of synthetic disposals are produced here:
//! - an acquisition paying its fee in crypto spawns a fee-only disposal, so
//!   the fee consumes acquired-lot fractions like any other outflow;
//! - an inter-account transfer spawns a MOVE disposal for the network fee on
//!   the sending account. The received amount never becomes a new acquired
//!   lot; the sent lots keep their original cost basis.

use crate::config::Configuration;
use crate::entry_set::EntrySet;
use crate::error::{LineId, Result};
use crate::transaction::{
    Acquisition, Disposal, Entry, NewDisposal, Transaction, TransactionKind, Transfer,
};
use std::collections::BTreeMap;

/// The three sealed entry sets of one asset.
#[derive(Debug, Clone)]
pub struct AssetEntries {
    pub acquisitions: EntrySet<Acquisition>,
    pub disposals: EntrySet<Disposal>,
    pub transfers: EntrySet<Transfer>,
}

impl AssetEntries {
    fn new(asset: &str) -> Self {
        AssetEntries {
            acquisitions: EntrySet::new(asset),
            disposals: EntrySet::new(asset),
            transfers: EntrySet::new(asset),
        }
    }

    fn seal(&mut self) {
        self.acquisitions.seal();
        self.disposals.seal();
        self.transfers.seal();
    }
}

/// Expand synthetic disposals, partition by asset and seal the sets.
///
/// Synthetic rows get line ids above the highest parsed id, in input order,
/// so they sort directly behind their source row among entries that share its
/// timestamp and every id stays unique.
pub fn transform(
    transactions: Vec<Transaction>,
    config: &Configuration,
) -> Result<BTreeMap<String, AssetEntries>> {
    let mut next_synthetic: LineId = transactions
        .iter()
        .map(|tx| tx.line_id())
        .max()
        .map_or(0, |max| max + 1);

    let mut by_asset: BTreeMap<String, AssetEntries> = BTreeMap::new();
    for tx in transactions {
        let entries = by_asset
            .entry(tx.asset().to_string())
            .or_insert_with(|| AssetEntries::new(tx.asset()));

        match tx {
            Transaction::Acquisition(acq) => {
                if acq.crypto_fee > crate::decimal::ZERO {
                    let fee = synthetic_fee_disposal(&acq, next_synthetic, config)?;
                    next_synthetic += 1;
                    log::debug!(
                        "line {}: crypto fee {} {} split into fee-only disposal (line {})",
                        acq.line_id,
                        acq.crypto_fee,
                        acq.asset,
                        fee.line_id
                    );
                    entries.disposals.push(fee)?;
                }
                entries.acquisitions.push(acq)?;
            }
            Transaction::Disposal(disp) => {
                entries.disposals.push(disp)?;
            }
            Transaction::Transfer(transfer) => {
                if transfer.crypto_fee > crate::decimal::ZERO {
                    let fee = synthetic_move_disposal(&transfer, next_synthetic, config)?;
                    next_synthetic += 1;
                    log::debug!(
                        "line {}: transfer fee {} {} split into MOVE disposal (line {})",
                        transfer.line_id,
                        transfer.crypto_fee,
                        transfer.asset,
                        fee.line_id
                    );
                    entries.disposals.push(fee)?;
                }
                entries.transfers.push(transfer)?;
            }
        }
    }

    for entries in by_asset.values_mut() {
        entries.seal();
    }
    Ok(by_asset)
}

fn synthetic_fee_disposal(
    acq: &Acquisition,
    line_id: LineId,
    config: &Configuration,
) -> Result<Disposal> {
    Disposal::new(
        NewDisposal {
            timestamp: acq.timestamp,
            asset: acq.asset.clone(),
            kind: TransactionKind::Fee,
            exchange: acq.exchange.clone(),
            holder: acq.holder.clone(),
            spot_price: acq.spot_price,
            crypto_out_no_fee: crate::decimal::ZERO,
            crypto_fee: acq.crypto_fee,
            fiat_out_no_fee: None,
            fiat_fee: None,
            unique_id: acq.unique_id.clone(),
            notes: acq.notes.clone(),
            line_id,
        },
        config,
    )
}

fn synthetic_move_disposal(
    transfer: &Transfer,
    line_id: LineId,
    config: &Configuration,
) -> Result<Disposal> {
    Disposal::new(
        NewDisposal {
            timestamp: transfer.timestamp,
            asset: transfer.asset.clone(),
            kind: TransactionKind::Move,
            exchange: transfer.from_exchange.clone(),
            holder: transfer.from_holder.clone(),
            spot_price: transfer.spot_price,
            crypto_out_no_fee: crate::decimal::ZERO,
            crypto_fee: transfer.crypto_fee,
            fiat_out_no_fee: None,
            fiat_fee: None,
            unique_id: transfer.unique_id.clone(),
            notes: transfer.notes.clone(),
            line_id,
        },
        config,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::tests::{config, new_acquisition, new_disposal, ts};
    use crate::transaction::NewTransfer;
    use rust_decimal_macros::dec;

    fn buy(time: &str, line: u32) -> Transaction {
        Transaction::Acquisition(
            Acquisition::new(
                new_acquisition(time, TransactionKind::Buy, dec!(10000), dec!(1), line),
                &config(),
            )
            .unwrap(),
        )
    }

    fn sell(time: &str, line: u32) -> Transaction {
        Transaction::Disposal(
            Disposal::new(
                new_disposal(time, TransactionKind::Sell, dec!(20000), dec!(0.5), dec!(0), line),
                &config(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn partitions_by_asset_and_seals() {
        let mut eth = new_acquisition("2020-01-02T00:00:00Z", TransactionKind::Buy, dec!(100), dec!(10), 2);
        eth.asset = "ETH".to_string();
        let eth = Transaction::Acquisition(Acquisition::new(eth, &config()).unwrap());

        let by_asset = transform(
            vec![buy("2020-01-01T00:00:00Z", 1), eth, sell("2020-02-01T00:00:00Z", 3)],
            &config(),
        )
        .unwrap();

        assert_eq!(by_asset.len(), 2);
        let btc = &by_asset["BTC"];
        assert_eq!(btc.acquisitions.len(), 1);
        assert_eq!(btc.disposals.len(), 1);
        assert!(btc.acquisitions.is_sealed());
        assert!(btc.transfers.is_sealed());
        assert_eq!(by_asset["ETH"].acquisitions.len(), 1);
    }

    #[test]
    fn crypto_fee_acquisition_spawns_fee_disposal() {
        let mut new = new_acquisition("2020-01-01T00:00:00Z", TransactionKind::Buy, dec!(10000), dec!(1), 1);
        new.crypto_fee = Some(dec!(0.01));
        let acq = Transaction::Acquisition(Acquisition::new(new, &config()).unwrap());

        let by_asset = transform(vec![acq, sell("2020-02-01T00:00:00Z", 2)], &config()).unwrap();
        let btc = &by_asset["BTC"];

        assert_eq!(btc.disposals.len(), 2);
        let fee = btc
            .disposals
            .iter()
            .find(|d| d.kind == TransactionKind::Fee)
            .unwrap();
        assert_eq!(fee.crypto_out_no_fee, dec!(0));
        assert_eq!(fee.crypto_fee, dec!(0.01));
        assert_eq!(fee.crypto_out_with_fee, dec!(0.01));
        assert_eq!(fee.timestamp, ts("2020-01-01T00:00:00Z"));
        assert_eq!(fee.exchange, "Coinbase");
        // Above the highest input id.
        assert_eq!(fee.line_id, 3);
    }

    #[test]
    fn transfer_spawns_move_disposal_on_sender() {
        let transfer = Transaction::Transfer(
            Transfer::new(
                NewTransfer {
                    timestamp: ts("2020-06-01T00:00:00Z"),
                    asset: "BTC".to_string(),
                    from_exchange: "Coinbase".to_string(),
                    from_holder: "Alice".to_string(),
                    to_exchange: "Ledger".to_string(),
                    to_holder: "Alice".to_string(),
                    spot_price: Some(dec!(15000)),
                    crypto_sent: dec!(1),
                    crypto_received: dec!(0.99),
                    unique_id: None,
                    notes: None,
                    line_id: 2,
                },
                &config(),
            )
            .unwrap(),
        );

        let by_asset = transform(vec![buy("2020-01-01T00:00:00Z", 1), transfer], &config()).unwrap();
        let btc = &by_asset["BTC"];

        assert_eq!(btc.transfers.len(), 1);
        assert_eq!(btc.disposals.len(), 1);
        let mv = btc.disposals.get(0).unwrap();
        assert_eq!(mv.kind, TransactionKind::Move);
        assert_eq!(mv.crypto_out_with_fee, dec!(0.01));
        assert_eq!(mv.spot_price, dec!(15000));
        assert_eq!(mv.exchange, "Coinbase");
        assert_eq!(mv.holder, "Alice");
    }

    #[test]
    fn lossless_transfer_spawns_no_disposal() {
        let transfer = Transaction::Transfer(
            Transfer::new(
                NewTransfer {
                    timestamp: ts("2020-06-01T00:00:00Z"),
                    asset: "BTC".to_string(),
                    from_exchange: "Coinbase".to_string(),
                    from_holder: "Alice".to_string(),
                    to_exchange: "Ledger".to_string(),
                    to_holder: "Alice".to_string(),
                    spot_price: Some(dec!(15000)),
                    crypto_sent: dec!(1),
                    crypto_received: dec!(1),
                    unique_id: None,
                    notes: None,
                    line_id: 2,
                },
                &config(),
            )
            .unwrap(),
        );

        let by_asset = transform(vec![buy("2020-01-01T00:00:00Z", 1), transfer], &config()).unwrap();
        assert!(by_asset["BTC"].disposals.is_empty());
    }
}
