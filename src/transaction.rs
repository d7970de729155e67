//! The three transaction variants and their validated constructors.
//!
//! Every variant is built through a `New*` input struct plus the
//! [`Configuration`], which supplies the reference sets and the tolerance for
//! user-supplied fiat fields. Derived fiat fields follow the spot price;
//! a user-supplied value wins only when it agrees with the derivation within
//! the configured tolerance.

use crate::config::Configuration;
use crate::decimal;
use crate::error::{LineId, Result, TaxlotError};
use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Instant with timezone. Comparisons are over the absolute instant.
pub type Timestamp = DateTime<FixedOffset>;

/// What a transaction row represents for tax purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    // Acquisition kinds.
    Buy,
    Airdrop,
    DonateIn,
    GiftIn,
    Hardfork,
    Income,
    Interest,
    Mining,
    Staking,
    Wages,
    // Disposal kinds. `Move` only ever originates from the input
    // transformer splitting an inter-account transfer.
    Sell,
    DonateOut,
    GiftOut,
    Fee,
    Move,
}

impl TransactionKind {
    pub fn is_acquisition(&self) -> bool {
        use TransactionKind::*;
        matches!(
            self,
            Buy | Airdrop | DonateIn | GiftIn | Hardfork | Income | Interest | Mining | Staking
                | Wages
        )
    }

    pub fn is_disposal(&self) -> bool {
        !self.is_acquisition()
    }

    /// Acquisition kinds that realize income on receipt. Everything but a
    /// plain buy: a buy creates cost basis without a taxable event.
    pub fn is_income(&self) -> bool {
        self.is_acquisition() && *self != TransactionKind::Buy
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use TransactionKind::*;
        let s = match self {
            Buy => "BUY",
            Airdrop => "AIRDROP",
            DonateIn => "DONATE_IN",
            GiftIn => "GIFT_IN",
            Hardfork => "HARDFORK",
            Income => "INCOME",
            Interest => "INTEREST",
            Mining => "MINING",
            Staking => "STAKING",
            Wages => "WAGES",
            Sell => "SELL",
            DonateOut => "DONATE_OUT",
            GiftOut => "GIFT_OUT",
            Fee => "FEE",
            Move => "MOVE",
        };
        f.write_str(s)
    }
}

/// Capability set shared by all three variants: everything the entry sets
/// and the balance pass need to order and attribute a row.
pub trait Entry {
    fn timestamp(&self) -> Timestamp;
    fn asset(&self) -> &str;
    fn line_id(&self) -> LineId;
}

/// An inflow of crypto: a buy or any income-kind receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquisition {
    pub timestamp: Timestamp,
    pub asset: String,
    pub kind: TransactionKind,
    pub exchange: String,
    pub holder: String,
    pub spot_price: Decimal,
    pub crypto_in: Decimal,
    pub crypto_fee: Decimal,
    pub fiat_in_no_fee: Decimal,
    pub fiat_in_with_fee: Decimal,
    pub fiat_fee: Decimal,
    pub line_id: LineId,
    pub unique_id: Option<String>,
    pub notes: Option<String>,
}

/// Constructor input for [`Acquisition`]; `None` fields are derived.
#[derive(Debug, Clone)]
pub struct NewAcquisition {
    pub timestamp: Timestamp,
    pub asset: String,
    pub kind: TransactionKind,
    pub exchange: String,
    pub holder: String,
    pub spot_price: Decimal,
    pub crypto_in: Decimal,
    pub crypto_fee: Option<Decimal>,
    pub fiat_fee: Option<Decimal>,
    pub fiat_in_no_fee: Option<Decimal>,
    pub fiat_in_with_fee: Option<Decimal>,
    pub unique_id: Option<String>,
    pub notes: Option<String>,
    pub line_id: LineId,
}

impl Acquisition {
    pub fn new(new: NewAcquisition, config: &Configuration) -> Result<Self> {
        let line = new.line_id;
        config.check_asset(&new.asset, line)?;
        config.check_exchange(&new.exchange, line)?;
        config.check_holder(&new.holder, line)?;

        if !new.kind.is_acquisition() {
            return Err(TaxlotError::MalformedInput {
                line,
                message: format!("{} is not an acquisition type", new.kind),
            });
        }
        check_non_negative("spot_price", new.spot_price, line)?;
        if new.crypto_in <= decimal::ZERO {
            return Err(TaxlotError::MalformedInput {
                line,
                message: format!("crypto_in must be positive, got {}", new.crypto_in),
            });
        }

        let crypto_fee = new.crypto_fee.unwrap_or(decimal::ZERO);
        check_non_negative("crypto_fee", crypto_fee, line)?;
        let supplied_fiat_fee = new.fiat_fee.unwrap_or(decimal::ZERO);
        check_non_negative("fiat_fee", supplied_fiat_fee, line)?;

        if crypto_fee > decimal::ZERO && supplied_fiat_fee > decimal::ZERO {
            return Err(TaxlotError::MalformedInput {
                line,
                message: "only one of crypto_fee and fiat_fee may be supplied".to_string(),
            });
        }
        check_fee_has_value(new.spot_price, crypto_fee, supplied_fiat_fee, line)?;

        // A crypto fee is valued at the spot price; the synthetic fee-only
        // disposal spawned by the transformer realizes the loss.
        let fiat_fee = if crypto_fee > decimal::ZERO {
            crypto_fee * new.spot_price
        } else {
            supplied_fiat_fee
        };

        let fiat_in_no_fee = reconcile(
            "fiat_in_no_fee",
            new.fiat_in_no_fee,
            new.crypto_in * new.spot_price,
            config.amount_tolerance(),
            line,
        )?;
        let fiat_in_with_fee = reconcile(
            "fiat_in_with_fee",
            new.fiat_in_with_fee,
            fiat_in_no_fee + fiat_fee,
            config.amount_tolerance(),
            line,
        )?;

        Ok(Acquisition {
            timestamp: new.timestamp,
            asset: new.asset,
            kind: new.kind,
            exchange: new.exchange,
            holder: new.holder,
            spot_price: new.spot_price,
            crypto_in: new.crypto_in,
            crypto_fee,
            fiat_in_no_fee,
            fiat_in_with_fee,
            fiat_fee,
            line_id: new.line_id,
            unique_id: new.unique_id,
            notes: new.notes,
        })
    }

    /// Income-kind acquisitions realize a taxable event on receipt.
    pub fn is_taxable(&self) -> bool {
        self.kind.is_income()
    }

    pub fn fiat_taxable_amount(&self) -> Decimal {
        if self.is_taxable() {
            self.fiat_in_no_fee
        } else {
            decimal::ZERO
        }
    }

    pub fn crypto_taxable_amount(&self) -> Decimal {
        if self.is_taxable() {
            self.crypto_in
        } else {
            decimal::ZERO
        }
    }

    /// Net balance effect on the owning (exchange, holder) account.
    pub fn crypto_balance_change(&self) -> Decimal {
        self.crypto_in
    }
}

impl Entry for Acquisition {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn asset(&self) -> &str {
        &self.asset
    }

    fn line_id(&self) -> LineId {
        self.line_id
    }
}

/// An outflow of crypto: a sale, gift, donation, fee or transfer fee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposal {
    pub timestamp: Timestamp,
    pub asset: String,
    pub kind: TransactionKind,
    pub exchange: String,
    pub holder: String,
    pub spot_price: Decimal,
    pub crypto_out_no_fee: Decimal,
    pub crypto_fee: Decimal,
    pub crypto_out_with_fee: Decimal,
    pub fiat_out_no_fee: Decimal,
    pub fiat_fee: Decimal,
    pub line_id: LineId,
    pub unique_id: Option<String>,
    pub notes: Option<String>,
}

/// Constructor input for [`Disposal`]; `None` fields are derived.
#[derive(Debug, Clone)]
pub struct NewDisposal {
    pub timestamp: Timestamp,
    pub asset: String,
    pub kind: TransactionKind,
    pub exchange: String,
    pub holder: String,
    pub spot_price: Decimal,
    pub crypto_out_no_fee: Decimal,
    pub crypto_fee: Decimal,
    pub fiat_out_no_fee: Option<Decimal>,
    pub fiat_fee: Option<Decimal>,
    pub unique_id: Option<String>,
    pub notes: Option<String>,
    pub line_id: LineId,
}

impl Disposal {
    pub fn new(new: NewDisposal, config: &Configuration) -> Result<Self> {
        let line = new.line_id;
        config.check_asset(&new.asset, line)?;
        config.check_exchange(&new.exchange, line)?;
        config.check_holder(&new.holder, line)?;

        if !new.kind.is_disposal() {
            return Err(TaxlotError::MalformedInput {
                line,
                message: format!("{} is not a disposal type", new.kind),
            });
        }
        check_non_negative("spot_price", new.spot_price, line)?;
        check_non_negative("crypto_out_no_fee", new.crypto_out_no_fee, line)?;
        check_non_negative("crypto_fee", new.crypto_fee, line)?;
        check_fee_has_value(new.spot_price, new.crypto_fee, decimal::ZERO, line)?;

        if new.kind == TransactionKind::Fee && new.crypto_out_no_fee != decimal::ZERO {
            return Err(TaxlotError::MalformedInput {
                line,
                message: format!(
                    "FEE disposal must have crypto_out_no_fee = 0, got {}",
                    new.crypto_out_no_fee
                ),
            });
        }

        let crypto_out_with_fee = new.crypto_out_no_fee + new.crypto_fee;
        let fiat_out_no_fee = reconcile(
            "fiat_out_no_fee",
            new.fiat_out_no_fee,
            new.crypto_out_no_fee * new.spot_price,
            config.amount_tolerance(),
            line,
        )?;
        let fiat_fee = reconcile(
            "fiat_fee",
            new.fiat_fee,
            new.crypto_fee * new.spot_price,
            config.amount_tolerance(),
            line,
        )?;

        Ok(Disposal {
            timestamp: new.timestamp,
            asset: new.asset,
            kind: new.kind,
            exchange: new.exchange,
            holder: new.holder,
            spot_price: new.spot_price,
            crypto_out_no_fee: new.crypto_out_no_fee,
            crypto_fee: new.crypto_fee,
            crypto_out_with_fee,
            fiat_out_no_fee,
            fiat_fee,
            line_id: new.line_id,
            unique_id: new.unique_id,
            notes: new.notes,
        })
    }

    /// A disposal is taxable when anything actually left the account,
    /// fee included.
    pub fn is_taxable(&self) -> bool {
        self.crypto_out_with_fee > decimal::ZERO
    }

    pub fn crypto_taxable_amount(&self) -> Decimal {
        self.crypto_out_with_fee
    }

    pub fn crypto_balance_change(&self) -> Decimal {
        -self.crypto_out_with_fee
    }
}

impl Entry for Disposal {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn asset(&self) -> &str {
        &self.asset
    }

    fn line_id(&self) -> LineId {
        self.line_id
    }
}

/// A move between two (exchange, holder) accounts. Not taxable in itself;
/// only the network/exchange fee realizes a disposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub timestamp: Timestamp,
    pub asset: String,
    pub from_exchange: String,
    pub from_holder: String,
    pub to_exchange: String,
    pub to_holder: String,
    pub spot_price: Decimal,
    pub crypto_sent: Decimal,
    pub crypto_received: Decimal,
    pub crypto_fee: Decimal,
    pub line_id: LineId,
    pub unique_id: Option<String>,
    pub notes: Option<String>,
}

/// Constructor input for [`Transfer`].
#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub timestamp: Timestamp,
    pub asset: String,
    pub from_exchange: String,
    pub from_holder: String,
    pub to_exchange: String,
    pub to_holder: String,
    pub spot_price: Option<Decimal>,
    pub crypto_sent: Decimal,
    pub crypto_received: Decimal,
    pub unique_id: Option<String>,
    pub notes: Option<String>,
    pub line_id: LineId,
}

impl Transfer {
    pub fn new(new: NewTransfer, config: &Configuration) -> Result<Self> {
        let line = new.line_id;
        config.check_asset(&new.asset, line)?;
        config.check_exchange(&new.from_exchange, line)?;
        config.check_holder(&new.from_holder, line)?;
        config.check_exchange(&new.to_exchange, line)?;
        config.check_holder(&new.to_holder, line)?;

        if new.crypto_sent <= decimal::ZERO {
            return Err(TaxlotError::MalformedInput {
                line,
                message: format!("crypto_sent must be positive, got {}", new.crypto_sent),
            });
        }
        check_non_negative("crypto_received", new.crypto_received, line)?;
        if new.crypto_received > new.crypto_sent {
            return Err(TaxlotError::MalformedInput {
                line,
                message: format!(
                    "crypto_received {} exceeds crypto_sent {}",
                    new.crypto_received, new.crypto_sent
                ),
            });
        }

        let crypto_fee = new.crypto_sent - new.crypto_received;
        let spot_price = new.spot_price.unwrap_or(decimal::ZERO);
        check_non_negative("spot_price", spot_price, line)?;
        check_fee_has_value(spot_price, crypto_fee, decimal::ZERO, line)?;

        Ok(Transfer {
            timestamp: new.timestamp,
            asset: new.asset,
            from_exchange: new.from_exchange,
            from_holder: new.from_holder,
            to_exchange: new.to_exchange,
            to_holder: new.to_holder,
            spot_price,
            crypto_sent: new.crypto_sent,
            crypto_received: new.crypto_received,
            crypto_fee,
            line_id: new.line_id,
            unique_id: new.unique_id,
            notes: new.notes,
        })
    }
}

impl Entry for Transfer {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn asset(&self) -> &str {
        &self.asset
    }

    fn line_id(&self) -> LineId {
        self.line_id
    }
}

/// A validated input row of any variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Acquisition(Acquisition),
    Disposal(Disposal),
    Transfer(Transfer),
}

impl Entry for Transaction {
    fn timestamp(&self) -> Timestamp {
        match self {
            Transaction::Acquisition(a) => a.timestamp,
            Transaction::Disposal(d) => d.timestamp,
            Transaction::Transfer(t) => t.timestamp,
        }
    }

    fn asset(&self) -> &str {
        match self {
            Transaction::Acquisition(a) => &a.asset,
            Transaction::Disposal(d) => &d.asset,
            Transaction::Transfer(t) => &t.asset,
        }
    }

    fn line_id(&self) -> LineId {
        match self {
            Transaction::Acquisition(a) => a.line_id,
            Transaction::Disposal(d) => d.line_id,
            Transaction::Transfer(t) => t.line_id,
        }
    }
}

fn check_non_negative(field: &str, value: Decimal, line: LineId) -> Result<()> {
    if value < decimal::ZERO {
        Err(TaxlotError::MalformedInput {
            line,
            message: format!("field '{field}' is negative: {value}"),
        })
    } else {
        Ok(())
    }
}

/// A fee priced at spot zero has no fiat value and cannot be accounted for.
fn check_fee_has_value(
    spot_price: Decimal,
    crypto_fee: Decimal,
    fiat_fee: Decimal,
    line: LineId,
) -> Result<()> {
    if spot_price == decimal::ZERO && (crypto_fee > decimal::ZERO || fiat_fee > decimal::ZERO) {
        Err(TaxlotError::MalformedInput {
            line,
            message: "fee given with zero spot price".to_string(),
        })
    } else {
        Ok(())
    }
}

/// Accept a user-supplied fiat value only when it agrees with the derived
/// value within `tolerance`; otherwise the row is inconsistent.
fn reconcile(
    field: &'static str,
    supplied: Option<Decimal>,
    derived: Decimal,
    tolerance: Decimal,
    line: LineId,
) -> Result<Decimal> {
    match supplied {
        None => Ok(derived),
        Some(supplied) => {
            if (supplied - derived).abs() > tolerance {
                Err(TaxlotError::InconsistentAmount {
                    line,
                    field,
                    supplied,
                    derived,
                })
            } else {
                Ok(supplied)
            }
        }
    }
}
