//! Position normalizer
//!
//! Turns an unordered list of raw records into a canonical [`Portfolio`]:
//! same-symbol equity records are summed, identical option contracts are
//! summed, and anything that nets to zero is dropped. Leg ids are handed
//! out in canonical contract order so that the result does not depend on
//! the order the records arrived in.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use tracing::{debug, info};

use super::model::{ContractKey, EquityLot, Portfolio};
use super::raw::RawPosition;
use crate::common::errors::{Result, ScreenerError};
use crate::common::types::{CioRating, InstrumentKind, OptionType, PositionSide};

/// Shares per contract when a record does not say otherwise
pub const DEFAULT_MULTIPLIER: u32 = 100;

/// Largest share-equivalent a single position may carry
///
/// Keeps every downstream sum well inside `Decimal`'s range.
pub const MAX_SHARE_EQUIVALENT: Decimal = dec!(1000000000000000);

/// Symbols are matched trimmed and upper-cased everywhere
pub fn canonical_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

#[derive(Default)]
struct EquityAccumulator {
    quantity: Decimal,
    acquisition_ids: BTreeSet<String>,
    cio_rating: Option<CioRating>,
}

/// Normalize raw records into a portfolio
///
/// Fails on the first malformed record; the error names the record.
pub fn normalize(records: &[RawPosition]) -> Result<Portfolio> {
    let mut equities: BTreeMap<String, EquityAccumulator> = BTreeMap::new();
    let mut contracts: BTreeMap<ContractKey, Decimal> = BTreeMap::new();
    let mut skipped = 0usize;

    for (index, record) in records.iter().enumerate() {
        let identity = record.identity(index);
        let kind = required_str(record.instrument_kind.as_deref(), "instrument_kind", &identity)?
            .parse::<InstrumentKind>()
            .map_err(|reason| ScreenerError::malformed(&identity, reason))?;

        match kind {
            InstrumentKind::Equity => {
                let symbol = parse_symbol(record, &identity)?;
                let quantity = signed_quantity(record, &identity)?;
                let entry = equities.entry(symbol).or_default();
                entry.quantity = merged(entry.quantity, quantity, Decimal::ONE, &identity)?;
                if let Some(id) = record.acquisition_id.as_ref() {
                    entry.acquisition_ids.insert(id.clone());
                }
                if let Some(rating) = record.cio_rating.as_deref() {
                    let rating = rating
                        .parse::<CioRating>()
                        .map_err(|reason| ScreenerError::malformed(&identity, reason))?;
                    entry.cio_rating = entry.cio_rating.max(Some(rating));
                }
            }
            InstrumentKind::Option => {
                let symbol = parse_symbol(record, &identity)?;
                let quantity = signed_quantity(record, &identity)?;
                let key = contract_key(record, symbol, &identity)?;
                let multiplier = key.multiplier;
                let total = contracts.entry(key).or_default();
                *total = merged(*total, quantity, multiplier, &identity)?;
            }
            other => {
                debug!("Skipping {} record {}", other, identity);
                skipped += 1;
            }
        }
    }

    let mut portfolio = Portfolio::new();

    for (symbol, acc) in equities {
        if acc.quantity.is_zero() {
            debug!("Dropping flat equity position in {}", symbol);
            continue;
        }
        portfolio.insert_equity(EquityLot {
            symbol,
            quantity: acc.quantity.normalize(),
            acquisition_ids: acc.acquisition_ids.into_iter().collect(),
            cio_rating: acc.cio_rating,
        });
    }

    for (key, quantity) in contracts {
        if quantity.is_zero() {
            debug!(
                "Dropping flat option position {} {} {} {}",
                key.symbol, key.expiry, key.strike, key.option_type
            );
            continue;
        }
        portfolio.insert_leg(key, quantity.normalize());
    }

    info!(
        records = records.len(),
        skipped,
        underlyings = portfolio.symbols().count(),
        legs = portfolio.leg_count(),
        "Normalized portfolio"
    );

    Ok(portfolio)
}

fn required_str<'a>(value: Option<&'a str>, field: &str, identity: &str) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ScreenerError::malformed(
            identity,
            format!("missing field `{}`", field),
        )),
    }
}

fn required_value<'a>(value: Option<&'a Value>, field: &str, identity: &str) -> Result<&'a Value> {
    value.ok_or_else(|| ScreenerError::malformed(identity, format!("missing field `{}`", field)))
}

fn parse_symbol(record: &RawPosition, identity: &str) -> Result<String> {
    Ok(canonical_symbol(required_str(
        record.symbol.as_deref(),
        "symbol",
        identity,
    )?))
}

/// Add a record's quantity to a running total, both sides within
/// [`MAX_SHARE_EQUIVALENT`]
fn merged(
    total: Decimal,
    quantity: Decimal,
    multiplier: Decimal,
    identity: &str,
) -> Result<Decimal> {
    let within = |contracts: Decimal| {
        contracts
            .checked_mul(multiplier)
            .is_some_and(|shares| shares.abs() <= MAX_SHARE_EQUIVALENT)
    };
    let sum = total.checked_add(quantity).filter(|sum| within(*sum));
    match sum {
        Some(sum) if within(quantity) => Ok(sum),
        _ => Err(ScreenerError::malformed(
            identity,
            format!(
                "quantity {} exceeds {} share-equivalents",
                quantity, MAX_SHARE_EQUIVALENT
            ),
        )),
    }
}

/// Parse a decimal from a JSON number or numeric string
fn parse_decimal(value: &Value, field: &str, identity: &str) -> Result<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => {
            return Err(ScreenerError::malformed(
                identity,
                format!("field `{}` is not numeric: {}", field, other),
            ))
        }
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| {
            ScreenerError::malformed(
                identity,
                format!("field `{}` is not numeric: {:?}", field, text),
            )
        })
}

fn signed_quantity(record: &RawPosition, identity: &str) -> Result<Decimal> {
    let value = required_value(record.quantity.as_ref(), "quantity", identity)?;
    let quantity = parse_decimal(value, "quantity", identity)?;

    let Some(side) = record.position.as_deref() else {
        return Ok(quantity);
    };
    let side = side
        .parse::<PositionSide>()
        .map_err(|reason| ScreenerError::malformed(identity, reason))?;
    if quantity.is_sign_negative() && !quantity.is_zero() {
        return Err(ScreenerError::malformed(
            identity,
            "quantity must be unsigned when `position` is given",
        ));
    }
    Ok(match side {
        PositionSide::Long => quantity,
        PositionSide::Short => -quantity,
    })
}

fn contract_key(record: &RawPosition, symbol: String, identity: &str) -> Result<ContractKey> {
    let option_type = required_str(record.option_type.as_deref(), "option_type", identity)?
        .parse::<OptionType>()
        .map_err(|reason| ScreenerError::malformed(identity, reason))?;

    let strike = parse_decimal(
        required_value(record.strike.as_ref(), "strike", identity)?,
        "strike",
        identity,
    )?;
    if strike.is_sign_negative() && !strike.is_zero() {
        return Err(ScreenerError::malformed(identity, "strike must not be negative"));
    }

    let expiry_text = required_str(record.expiry.as_deref(), "expiry", identity)?;
    let expiry = NaiveDate::parse_from_str(expiry_text, "%Y-%m-%d").map_err(|e| {
        ScreenerError::malformed(identity, format!("invalid expiry {:?}: {}", expiry_text, e))
    })?;

    let multiplier = match record.multiplier.as_ref() {
        Some(value) => parse_decimal(value, "multiplier", identity)?,
        None => Decimal::from(DEFAULT_MULTIPLIER),
    };
    if multiplier <= Decimal::ZERO {
        return Err(ScreenerError::malformed(identity, "multiplier must be positive"));
    }

    Ok(ContractKey {
        symbol,
        strike: strike.normalize(),
        expiry,
        option_type,
        multiplier: multiplier.normalize(),
    })
}
