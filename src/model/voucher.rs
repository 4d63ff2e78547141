//! Voucher wallet and package records, and the balance summary derived from them.
//!
//! Records are sourced verbatim from the remote gateway and are read-only
//! after the fetch. Field extraction is lenient: the remote payload is only
//! loosely structured, so a missing or mistyped field degrades to `None`/zero
//! instead of rejecting the record.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Raw balance units per currency unit (balances are reported in 10^-12).
pub const BALANCE_DIVISOR: i128 = 1_000_000_000_000;

const BALANCE_DECIMALS: u32 = 12;

/// One voucher wallet as reported by the balance-listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletRecord {
    /// Voucher package this wallet was issued from.
    pub package_id: Option<i64>,
    /// Remaining balance in 10^-12 currency units; zero when absent or non-numeric.
    pub balance_raw_units: i64,
    /// JSON-encoded multilingual display name, if any.
    pub name: Option<String>,
    /// The record exactly as received.
    pub raw: Value,
}

impl WalletRecord {
    /// Extract a wallet from one element of the remote wallet list.
    ///
    /// Returns `None` for non-object elements.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            package_id: object.get("packageId").and_then(integral),
            balance_raw_units: object.get("balance").and_then(integral).unwrap_or(0),
            name: object
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string),
            raw: value.clone(),
        })
    }

    /// Localised display name.
    ///
    /// Tries `lang`, then `en-us`, then the first value of the JSON name map.
    /// A name that is not a JSON object is returned as-is.
    pub fn display_name(&self, lang: &str) -> Option<String> {
        let name = self.name.as_deref()?;
        if name.is_empty() {
            return None;
        }
        let Ok(Value::Object(map)) = serde_json::from_str::<Value>(name) else {
            return Some(name.to_string());
        };
        let pick = |key: &str| {
            map.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        pick(lang)
            .or_else(|| pick("en-us"))
            .or_else(|| {
                map.values()
                    .filter_map(Value::as_str)
                    .find(|s| !s.is_empty())
                    .map(str::to_string)
            })
            .or_else(|| Some(name.to_string()))
    }
}

/// One voucher package type as reported by the package-definition endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageDefinition {
    /// Numeric package id; packages without one are ignored by the support index.
    pub id: Option<i64>,
    /// JSON-encoded multilingual description listing the covered models.
    pub description: Option<String>,
}

impl PackageDefinition {
    /// Build a definition directly (mostly useful for tests and fixtures).
    pub fn new(id: i64, description: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            description: Some(description.into()),
        }
    }

    /// Extract a package from one element of the remote package list.
    ///
    /// Returns `None` for non-object elements.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            id: object.get("id").and_then(integral),
            description: object
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

/// Accept integers and integral floats; JSON numbers from the API are untyped.
fn integral(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Balance and voucher count for one package id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PackageTotal {
    /// Summed raw balance.
    pub balance_raw_units: i128,
    /// Number of wallets of this package.
    pub count: usize,
}

impl PackageTotal {
    /// Balance in currency units.
    pub fn amount(&self) -> f64 {
        raw_to_amount(self.balance_raw_units)
    }
}

/// Totals shown on the expense bill panel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BalanceSummary {
    total_raw_units: i128,
    voucher_count: usize,
    by_package: BTreeMap<Option<i64>, PackageTotal>,
}

impl BalanceSummary {
    /// Sum balances with integer arithmetic and group them per package.
    pub fn from_wallets(wallets: &[WalletRecord]) -> Self {
        let mut summary = Self::default();
        for wallet in wallets {
            let raw = i128::from(wallet.balance_raw_units);
            summary.total_raw_units += raw;
            summary.voucher_count += 1;
            let group = summary.by_package.entry(wallet.package_id).or_default();
            group.balance_raw_units += raw;
            group.count += 1;
        }
        summary
    }

    /// Total balance in raw units.
    pub fn total_raw_units(&self) -> i128 {
        self.total_raw_units
    }

    /// Total balance in currency units.
    pub fn total_amount(&self) -> f64 {
        raw_to_amount(self.total_raw_units)
    }

    /// Number of wallets summed.
    pub fn voucher_count(&self) -> usize {
        self.voucher_count
    }

    /// Per-package totals keyed by package id (`None` for wallets without one).
    pub fn by_package(&self) -> &BTreeMap<Option<i64>, PackageTotal> {
        &self.by_package
    }

    /// Total formatted with `decimals` fraction digits, rounded half-up.
    ///
    /// `decimals` above 12 is clamped; the raw unit has no more precision.
    pub fn format_amount(&self, decimals: u32) -> String {
        format_raw(self.total_raw_units, decimals)
    }
}

fn raw_to_amount(raw: i128) -> f64 {
    raw as f64 / BALANCE_DIVISOR as f64
}

fn format_raw(raw: i128, decimals: u32) -> String {
    let decimals = decimals.min(BALANCE_DECIMALS);
    let scale = 10i128.pow(BALANCE_DECIMALS - decimals);
    let magnitude = raw.unsigned_abs() as i128;
    let rounded = (magnitude + scale / 2) / scale;
    let unit = 10i128.pow(decimals);
    let whole = rounded / unit;
    let fraction = rounded % unit;
    let sign = if raw < 0 && rounded != 0 { "-" } else { "" };
    if decimals == 0 {
        format!("{sign}{whole}")
    } else {
        format!("{sign}{whole}.{fraction:0width$}", width = decimals as usize)
    }
}
