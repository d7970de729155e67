//! Run configuration: accepted assets, exchanges and holders, the column
//! layout of the three input tables, the reporting window and the selected
//! accounting method.

use crate::decimal;
use crate::error::{LineId, ReferenceKind, Result, TaxlotError};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

/// Mandatory fields of the acquisitions (IN) table.
pub const IN_FIELDS: &[&str] = &[
    "timestamp",
    "asset",
    "exchange",
    "holder",
    "transaction_type",
    "spot_price",
    "crypto_in",
];

/// Mandatory fields of the disposals (OUT) table.
pub const OUT_FIELDS: &[&str] = &[
    "timestamp",
    "asset",
    "exchange",
    "holder",
    "transaction_type",
    "spot_price",
    "crypto_out_no_fee",
    "crypto_fee",
];

/// Mandatory fields of the transfers (INTRA) table.
pub const INTRA_FIELDS: &[&str] = &[
    "timestamp",
    "asset",
    "from_exchange",
    "from_holder",
    "to_exchange",
    "to_holder",
    "crypto_sent",
    "crypto_received",
];

/// Column map of one input table: field name to zero-based column index.
pub type Header = BTreeMap<String, usize>;

/// Raw configuration as deserialized from the TOML file; validated into
/// [`Configuration`] before anything else runs.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    pub assets: Vec<String>,
    pub exchanges: Vec<String>,
    pub holders: Vec<String>,
    pub in_header: BTreeMap<String, i64>,
    pub out_header: BTreeMap<String, i64>,
    pub intra_header: BTreeMap<String, i64>,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub accounting_method: String,
    pub fiat_currency: String,
    pub long_term_days: i64,
    #[serde(default)]
    pub amount_tolerance: Option<Decimal>,
}

/// Immutable run configuration. Constructed once, read everywhere.
#[derive(Debug, Clone)]
pub struct Configuration {
    assets: BTreeSet<String>,
    exchanges: BTreeSet<String>,
    holders: BTreeSet<String>,
    in_header: Header,
    out_header: Header,
    intra_header: Header,
    from_date: NaiveDate,
    to_date: NaiveDate,
    accounting_method: String,
    fiat_currency: String,
    long_term_days: i64,
    amount_tolerance: Decimal,
}

impl Configuration {
    pub fn new(raw: RawConfig) -> Result<Self> {
        let assets = validated_set("assets", raw.assets)?;
        let exchanges = validated_set("exchanges", raw.exchanges)?;
        let holders = validated_set("holders", raw.holders)?;

        let in_header = validated_header("IN", raw.in_header, IN_FIELDS)?;
        let out_header = validated_header("OUT", raw.out_header, OUT_FIELDS)?;
        let intra_header = validated_header("INTRA", raw.intra_header, INTRA_FIELDS)?;

        if raw.from_date > raw.to_date {
            return Err(TaxlotError::Configuration(format!(
                "from_date {} is after to_date {}",
                raw.from_date, raw.to_date
            )));
        }
        if raw.long_term_days <= 0 {
            return Err(TaxlotError::Configuration(format!(
                "long_term_days must be positive, got {}",
                raw.long_term_days
            )));
        }
        let amount_tolerance = raw.amount_tolerance.unwrap_or(decimal::ZERO);
        if amount_tolerance < decimal::ZERO {
            return Err(TaxlotError::Configuration(format!(
                "amount_tolerance must not be negative, got {amount_tolerance}"
            )));
        }

        Ok(Configuration {
            assets,
            exchanges,
            holders,
            in_header,
            out_header,
            intra_header,
            from_date: raw.from_date,
            to_date: raw.to_date,
            accounting_method: raw.accounting_method,
            fiat_currency: raw.fiat_currency,
            long_term_days: raw.long_term_days,
            amount_tolerance,
        })
    }

    pub fn is_known_asset(&self, asset: &str) -> bool {
        self.assets.contains(asset)
    }

    pub fn is_known_exchange(&self, exchange: &str) -> bool {
        self.exchanges.contains(exchange)
    }

    pub fn is_known_holder(&self, holder: &str) -> bool {
        self.holders.contains(holder)
    }

    pub fn check_asset(&self, asset: &str, line: LineId) -> Result<()> {
        self.check(ReferenceKind::Asset, self.is_known_asset(asset), asset, line)
    }

    pub fn check_exchange(&self, exchange: &str, line: LineId) -> Result<()> {
        self.check(
            ReferenceKind::Exchange,
            self.is_known_exchange(exchange),
            exchange,
            line,
        )
    }

    pub fn check_holder(&self, holder: &str, line: LineId) -> Result<()> {
        self.check(
            ReferenceKind::Holder,
            self.is_known_holder(holder),
            holder,
            line,
        )
    }

    fn check(&self, kind: ReferenceKind, known: bool, value: &str, line: LineId) -> Result<()> {
        if known {
            Ok(())
        } else {
            Err(TaxlotError::UnknownReference {
                line,
                kind,
                value: value.to_string(),
            })
        }
    }

    /// Resolve `field` through `header` and parse the cell as a Decimal.
    ///
    /// Missing mandatory cells and non-numeric content are reported against
    /// the row's line id.
    pub fn get_numeric_column(
        &self,
        row: &[String],
        field: &str,
        header: &Header,
        line: LineId,
    ) -> Result<Decimal> {
        let column = header.get(field).ok_or_else(|| TaxlotError::MalformedInput {
            line,
            message: format!("field '{field}' is not mapped to a column"),
        })?;
        let cell = row.get(*column).ok_or_else(|| TaxlotError::MalformedInput {
            line,
            message: format!("row has no column {column} for field '{field}'"),
        })?;
        decimal::parse_decimal(cell, line)
    }

    /// Boundary assertion: reject empty strings coming out of the parser.
    pub fn type_check_string(&self, field: &str, value: &str, line: LineId) -> Result<()> {
        if value.is_empty() {
            Err(TaxlotError::MalformedInput {
                line,
                message: format!("field '{field}' is empty"),
            })
        } else {
            Ok(())
        }
    }

    /// Boundary assertion: amounts must not be negative.
    pub fn type_check_non_negative(
        &self,
        field: &str,
        value: Decimal,
        line: LineId,
    ) -> Result<()> {
        if value < decimal::ZERO {
            Err(TaxlotError::MalformedInput {
                line,
                message: format!("field '{field}' is negative: {value}"),
            })
        } else {
            Ok(())
        }
    }

    pub fn in_header(&self) -> &Header {
        &self.in_header
    }

    pub fn out_header(&self) -> &Header {
        &self.out_header
    }

    pub fn intra_header(&self) -> &Header {
        &self.intra_header
    }

    pub fn assets(&self) -> impl Iterator<Item = &str> {
        self.assets.iter().map(String::as_str)
    }

    pub fn from_date(&self) -> NaiveDate {
        self.from_date
    }

    pub fn to_date(&self) -> NaiveDate {
        self.to_date
    }

    pub fn accounting_method(&self) -> &str {
        &self.accounting_method
    }

    pub fn fiat_currency(&self) -> &str {
        &self.fiat_currency
    }

    pub fn long_term_days(&self) -> i64 {
        self.long_term_days
    }

    pub fn amount_tolerance(&self) -> Decimal {
        self.amount_tolerance
    }
}

fn validated_set(name: &str, values: Vec<String>) -> Result<BTreeSet<String>> {
    if values.is_empty() {
        return Err(TaxlotError::Configuration(format!("{name} set is empty")));
    }
    let mut set = BTreeSet::new();
    for value in values {
        if value.is_empty() {
            return Err(TaxlotError::Configuration(format!(
                "{name} set contains an empty string"
            )));
        }
        if !set.insert(value.clone()) {
            return Err(TaxlotError::Configuration(format!(
                "{name} set contains '{value}' twice"
            )));
        }
    }
    Ok(set)
}

fn validated_header(
    table: &str,
    raw: BTreeMap<String, i64>,
    mandatory: &[&str],
) -> Result<Header> {
    let mut header = Header::new();
    let mut seen = BTreeMap::new();
    for (field, column) in raw {
        if column < 0 {
            return Err(TaxlotError::Configuration(format!(
                "{table} header maps '{field}' to negative column {column}"
            )));
        }
        let column = column as usize;
        if let Some(other) = seen.insert(column, field.clone()) {
            return Err(TaxlotError::Configuration(format!(
                "{table} header maps both '{other}' and '{field}' to column {column}"
            )));
        }
        header.insert(field, column);
    }
    for field in mandatory {
        if !header.contains_key(*field) {
            return Err(TaxlotError::Configuration(format!(
                "{table} header is missing mandatory field '{field}'"
            )));
        }
    }
    Ok(header)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    pub(crate) fn raw_config() -> RawConfig {
        let columns =
            |fields: &[&str]| -> BTreeMap<String, i64> {
                fields
                    .iter()
                    .enumerate()
                    .map(|(i, f)| (f.to_string(), i as i64))
                    .collect()
            };
        RawConfig {
            assets: vec!["BTC".to_string(), "ETH".to_string()],
            exchanges: vec!["Coinbase".to_string(), "Kraken".to_string(), "Ledger".to_string()],
            holders: vec!["Alice".to_string(), "Bob".to_string()],
            in_header: columns(IN_FIELDS),
            out_header: columns(OUT_FIELDS),
            intra_header: columns(INTRA_FIELDS),
            from_date: NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
            to_date: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            accounting_method: "fifo".to_string(),
            fiat_currency: "USD".to_string(),
            long_term_days: 365,
            amount_tolerance: None,
        }
    }

    #[test]
    fn valid_config_builds() {
        let config = Configuration::new(raw_config()).unwrap();
        assert!(config.is_known_asset("BTC"));
        assert!(!config.is_known_asset("btc"));
        assert_eq!(config.long_term_days(), 365);
        assert_eq!(config.amount_tolerance(), dec!(0));
    }

    #[test]
    fn empty_asset_set_rejected() {
        let mut raw = raw_config();
        raw.assets.clear();
        let err = Configuration::new(raw).unwrap_err();
        assert!(matches!(err, TaxlotError::Configuration(_)));
    }

    #[test]
    fn duplicate_column_rejected() {
        let mut raw = raw_config();
        raw.in_header.insert("notes".to_string(), 0);
        let err = Configuration::new(raw).unwrap_err();
        assert!(err.to_string().contains("column 0"));
    }

    #[test]
    fn negative_column_rejected() {
        let mut raw = raw_config();
        raw.out_header.insert("notes".to_string(), -2);
        let err = Configuration::new(raw).unwrap_err();
        assert!(err.to_string().contains("negative column"));
    }

    #[test]
    fn missing_mandatory_field_rejected() {
        let mut raw = raw_config();
        raw.intra_header.remove("crypto_sent");
        let err = Configuration::new(raw).unwrap_err();
        assert!(err.to_string().contains("crypto_sent"));
    }

    #[test]
    fn check_reports_unknown_reference_with_line() {
        let config = Configuration::new(raw_config()).unwrap();
        assert!(config.check_exchange("Coinbase", 1).is_ok());
        let err = config.check_holder("Mallory", 9).unwrap_err();
        assert_eq!(err.line(), Some(9));
        assert_eq!(err.to_string(), "unknown holder 'Mallory' at line 9");
    }

    #[test]
    fn numeric_column_resolution() {
        let config = Configuration::new(raw_config()).unwrap();
        let row: Vec<String> = vec![
            "2020-01-01T00:00:00Z".into(),
            "BTC".into(),
            "Coinbase".into(),
            "Alice".into(),
            "BUY".into(),
            "10000".into(),
            "1.5".into(),
        ];
        let value = config
            .get_numeric_column(&row, "crypto_in", config.in_header(), 3)
            .unwrap();
        assert_eq!(value, dec!(1.5));

        let err = config
            .get_numeric_column(&row, "spot_price", config.out_header(), 3)
            .unwrap_err();
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn inverted_window_rejected() {
        let mut raw = raw_config();
        raw.from_date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert!(Configuration::new(raw).is_err());
    }
}
