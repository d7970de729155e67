//! Typed input records: the JSON boundary between an external parser and the
//! engine's validated transaction stream.
//!
//! Records mirror the three workbook tables (IN / OUT / INTRA). Line ids are
//! assigned densely in insertion order while converting, so every diagnostic
//! can point back at the offending row.

use crate::config::Configuration;
use crate::error::{LineId, Result, TaxlotError};
use crate::transaction::{
    Acquisition, Disposal, NewAcquisition, NewDisposal, NewTransfer, Timestamp, Transaction,
    TransactionKind, Transfer,
};
use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Input root for transaction JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionInput {
    pub transactions: Vec<TransactionRecord>,
}

/// One raw input row, tagged with the table it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "table", rename_all = "UPPERCASE")]
pub enum TransactionRecord {
    In {
        /// RFC3339 with offset; date-only assumes UTC midnight.
        timestamp: String,
        asset: String,
        exchange: String,
        holder: String,
        transaction_type: TransactionKind,
        spot_price: Decimal,
        crypto_in: Decimal,
        #[serde(default)]
        crypto_fee: Option<Decimal>,
        #[serde(default)]
        fiat_fee: Option<Decimal>,
        #[serde(default)]
        fiat_in_no_fee: Option<Decimal>,
        #[serde(default)]
        fiat_in_with_fee: Option<Decimal>,
        #[serde(default)]
        unique_id: Option<String>,
        #[serde(default)]
        notes: Option<String>,
    },
    Out {
        timestamp: String,
        asset: String,
        exchange: String,
        holder: String,
        transaction_type: TransactionKind,
        spot_price: Decimal,
        crypto_out_no_fee: Decimal,
        crypto_fee: Decimal,
        #[serde(default)]
        fiat_out_no_fee: Option<Decimal>,
        #[serde(default)]
        fiat_fee: Option<Decimal>,
        #[serde(default)]
        unique_id: Option<String>,
        #[serde(default)]
        notes: Option<String>,
    },
    Intra {
        timestamp: String,
        asset: String,
        from_exchange: String,
        from_holder: String,
        to_exchange: String,
        to_holder: String,
        #[serde(default)]
        spot_price: Option<Decimal>,
        crypto_sent: Decimal,
        crypto_received: Decimal,
        #[serde(default)]
        unique_id: Option<String>,
        #[serde(default)]
        notes: Option<String>,
    },
}

/// Read the transaction JSON and validate every row.
pub fn read_transactions_json<R: Read>(
    reader: R,
    config: &Configuration,
) -> Result<Vec<Transaction>> {
    let input: TransactionInput = serde_json::from_reader(reader).map_err(|e| {
        TaxlotError::MalformedInput {
            line: 0,
            message: format!("invalid transaction JSON: {e}"),
        }
    })?;
    to_transactions(input.transactions, config)
}

/// Convert raw records to validated transactions, assigning dense line ids
/// in insertion order starting at 1.
pub fn to_transactions(
    records: Vec<TransactionRecord>,
    config: &Configuration,
) -> Result<Vec<Transaction>> {
    records
        .into_iter()
        .zip(1u32..)
        .map(|(record, line_id)| to_transaction(record, line_id, config))
        .collect()
}

fn to_transaction(
    record: TransactionRecord,
    line_id: LineId,
    config: &Configuration,
) -> Result<Transaction> {
    match record {
        TransactionRecord::In {
            timestamp,
            asset,
            exchange,
            holder,
            transaction_type,
            spot_price,
            crypto_in,
            crypto_fee,
            fiat_fee,
            fiat_in_no_fee,
            fiat_in_with_fee,
            unique_id,
            notes,
        } => {
            let acquisition = Acquisition::new(
                NewAcquisition {
                    timestamp: parse_timestamp(&timestamp, line_id)?,
                    asset,
                    kind: transaction_type,
                    exchange,
                    holder,
                    spot_price,
                    crypto_in,
                    crypto_fee,
                    fiat_fee,
                    fiat_in_no_fee,
                    fiat_in_with_fee,
                    unique_id,
                    notes,
                    line_id,
                },
                config,
            )?;
            Ok(Transaction::Acquisition(acquisition))
        }
        TransactionRecord::Out {
            timestamp,
            asset,
            exchange,
            holder,
            transaction_type,
            spot_price,
            crypto_out_no_fee,
            crypto_fee,
            fiat_out_no_fee,
            fiat_fee,
            unique_id,
            notes,
        } => {
            if transaction_type == TransactionKind::Move {
                return Err(TaxlotError::MalformedInput {
                    line: line_id,
                    message: "MOVE rows are derived from INTRA transfers, not supplied".to_string(),
                });
            }
            let disposal = Disposal::new(
                NewDisposal {
                    timestamp: parse_timestamp(&timestamp, line_id)?,
                    asset,
                    kind: transaction_type,
                    exchange,
                    holder,
                    spot_price,
                    crypto_out_no_fee,
                    crypto_fee,
                    fiat_out_no_fee,
                    fiat_fee,
                    unique_id,
                    notes,
                    line_id,
                },
                config,
            )?;
            Ok(Transaction::Disposal(disposal))
        }
        TransactionRecord::Intra {
            timestamp,
            asset,
            from_exchange,
            from_holder,
            to_exchange,
            to_holder,
            spot_price,
            crypto_sent,
            crypto_received,
            unique_id,
            notes,
        } => {
            let transfer = Transfer::new(
                NewTransfer {
                    timestamp: parse_timestamp(&timestamp, line_id)?,
                    asset,
                    from_exchange,
                    from_holder,
                    to_exchange,
                    to_holder,
                    spot_price,
                    crypto_sent,
                    crypto_received,
                    unique_id,
                    notes,
                    line_id,
                },
                config,
            )?;
            Ok(Transaction::Transfer(transfer))
        }
    }
}

fn parse_timestamp(s: &str, line: LineId) -> Result<Timestamp> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(s) {
        return Ok(datetime);
    }
    // Date-only cells assume UTC midnight.
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let datetime = date
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc();
        return Ok(datetime.fixed_offset());
    }
    Err(TaxlotError::MalformedInput {
        line,
        message: format!("invalid timestamp '{s}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::raw_config;
    use rust_decimal_macros::dec;

    fn config() -> Configuration {
        Configuration::new(raw_config()).unwrap()
    }

    #[test]
    fn json_rows_become_validated_transactions() {
        let json = r#"{
            "transactions": [
                {
                    "table": "IN",
                    "timestamp": "2020-01-01T00:00:00Z",
                    "asset": "BTC",
                    "exchange": "Coinbase",
                    "holder": "Alice",
                    "transaction_type": "BUY",
                    "spot_price": "10000",
                    "crypto_in": "1.0"
                },
                {
                    "table": "OUT",
                    "timestamp": "2021-06-01T00:00:00Z",
                    "asset": "BTC",
                    "exchange": "Coinbase",
                    "holder": "Alice",
                    "transaction_type": "SELL",
                    "spot_price": "40000",
                    "crypto_out_no_fee": "0.5",
                    "crypto_fee": "0"
                },
                {
                    "table": "INTRA",
                    "timestamp": "2021-07-01",
                    "asset": "BTC",
                    "from_exchange": "Coinbase",
                    "from_holder": "Alice",
                    "to_exchange": "Ledger",
                    "to_holder": "Alice",
                    "spot_price": "35000",
                    "crypto_sent": "0.5",
                    "crypto_received": "0.499"
                }
            ]
        }"#;

        let transactions = read_transactions_json(json.as_bytes(), &config()).unwrap();
        assert_eq!(transactions.len(), 3);

        match &transactions[0] {
            Transaction::Acquisition(acq) => {
                assert_eq!(acq.line_id, 1);
                assert_eq!(acq.fiat_in_no_fee, dec!(10000));
            }
            other => panic!("expected acquisition, got {other:?}"),
        }
        match &transactions[2] {
            Transaction::Transfer(transfer) => {
                assert_eq!(transfer.line_id, 3);
                assert_eq!(transfer.crypto_fee, dec!(0.001));
            }
            other => panic!("expected transfer, got {other:?}"),
        }
    }

    #[test]
    fn validation_failures_carry_the_row_number() {
        let json = r#"{
            "transactions": [
                {
                    "table": "IN",
                    "timestamp": "2020-01-01T00:00:00Z",
                    "asset": "DOGE",
                    "exchange": "Coinbase",
                    "holder": "Alice",
                    "transaction_type": "BUY",
                    "spot_price": "0.05",
                    "crypto_in": "1000"
                }
            ]
        }"#;

        let err = read_transactions_json(json.as_bytes(), &config()).unwrap_err();
        assert_eq!(err.to_string(), "unknown asset 'DOGE' at line 1");
    }

    #[test]
    fn supplied_move_rows_are_rejected() {
        let json = r#"{
            "transactions": [
                {
                    "table": "OUT",
                    "timestamp": "2020-01-01T00:00:00Z",
                    "asset": "BTC",
                    "exchange": "Coinbase",
                    "holder": "Alice",
                    "transaction_type": "MOVE",
                    "spot_price": "10000",
                    "crypto_out_no_fee": "0",
                    "crypto_fee": "0.01"
                }
            ]
        }"#;

        let err = read_transactions_json(json.as_bytes(), &config()).unwrap_err();
        assert!(err.to_string().contains("INTRA"));
    }

    #[test]
    fn bad_timestamp_is_malformed_input() {
        let records = vec![TransactionRecord::In {
            timestamp: "yesterday".to_string(),
            asset: "BTC".to_string(),
            exchange: "Coinbase".to_string(),
            holder: "Alice".to_string(),
            transaction_type: TransactionKind::Buy,
            spot_price: dec!(10000),
            crypto_in: dec!(1),
            crypto_fee: None,
            fiat_fee: None,
            fiat_in_no_fee: None,
            fiat_in_with_fee: None,
            unique_id: None,
            notes: None,
        }];
        let err = to_transactions(records, &config()).unwrap_err();
        assert!(err.to_string().contains("invalid timestamp"));
    }
}
