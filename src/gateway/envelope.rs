//! Response envelope normalisation.
//!
//! The remote API wraps its lists in several envelope shapes. Each shape is a
//! matcher that either extracts the list or reports no match; matchers are
//! tried in order and the first match wins. A matched list that turns out not
//! to be an array, or a body no matcher accepts, normalises to an empty list.

use crate::model::{PackageDefinition, WalletRecord};
use serde::Serialize;
use serde_json::Value;

/// `code` value of a successful coded envelope.
pub const SUCCESS_CODE: i64 = 20000;

/// Normalised balance listing.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct WalletsPayload {
    /// Wallet records in response order.
    pub wallets: Vec<WalletRecord>,
    /// Server-reported total, or the list length when absent.
    pub total: u64,
}

/// Normalised package definitions.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PackagesPayload {
    /// Package definitions in response order.
    pub packages: Vec<PackageDefinition>,
}

struct WalletMatch<'a> {
    list: Option<&'a Value>,
    total: Option<u64>,
}

type WalletMatcher = for<'a> fn(&'a Value) -> Option<WalletMatch<'a>>;
type PackageMatcher = for<'a> fn(&'a Value) -> Option<Option<&'a Value>>;

const WALLET_SHAPES: &[(&str, WalletMatcher)] =
    &[("coded", coded_wallets), ("wallets", bare_wallets)];

const PACKAGE_SHAPES: &[(&str, PackageMatcher)] = &[
    ("array", array_packages),
    ("coded", coded_packages),
    ("items", items_packages),
    ("packages", keyed_packages),
    ("data", data_packages),
];

/// Normalise a decoded wallets response.
pub fn parse_wallets(body: &Value) -> WalletsPayload {
    let Some((shape, matched)) = WALLET_SHAPES
        .iter()
        .find_map(|(name, matcher)| matcher(body).map(|m| (*name, m)))
    else {
        tracing::warn!("Unrecognised wallets envelope, treating as empty");
        return WalletsPayload::default();
    };

    let list = as_list(matched.list);
    let wallets: Vec<WalletRecord> = list.iter().filter_map(WalletRecord::from_value).collect();
    let total = matched.total.unwrap_or(list.len() as u64);
    tracing::debug!(shape, count = wallets.len(), total, "Parsed wallets envelope");
    WalletsPayload { wallets, total }
}

/// Normalise a decoded packages response.
pub fn parse_packages(body: &Value) -> PackagesPayload {
    let Some((shape, list)) = PACKAGE_SHAPES
        .iter()
        .find_map(|(name, matcher)| matcher(body).map(|m| (*name, m)))
    else {
        tracing::warn!("Unrecognised packages envelope, treating as empty");
        return PackagesPayload::default();
    };

    let packages: Vec<PackageDefinition> = as_list(list)
        .iter()
        .filter_map(PackageDefinition::from_value)
        .collect();
    tracing::debug!(shape, count = packages.len(), "Parsed packages envelope");
    PackagesPayload { packages }
}

fn as_list(value: Option<&Value>) -> &[Value] {
    value
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// JSON truthiness: null, false, 0, and "" are absent.
fn present<'a>(value: Option<&'a Value>) -> Option<&'a Value> {
    value.filter(|v| match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

fn coded_data(body: &Value) -> Option<&Value> {
    if body.get("code").and_then(Value::as_i64) != Some(SUCCESS_CODE) {
        return None;
    }
    present(body.get("data"))
}

fn pagination_total(container: &Value) -> Option<u64> {
    container
        .get("pagination")
        .and_then(|p| p.get("total"))
        .and_then(Value::as_u64)
        .filter(|total| *total > 0)
}

fn coded_wallets(body: &Value) -> Option<WalletMatch<'_>> {
    let data = coded_data(body)?;
    Some(WalletMatch {
        list: present(data.get("wallets")).or_else(|| present(data.get("items"))),
        total: pagination_total(data),
    })
}

fn bare_wallets(body: &Value) -> Option<WalletMatch<'_>> {
    let list = present(body.get("wallets"))?;
    Some(WalletMatch {
        list: Some(list),
        total: pagination_total(body),
    })
}

fn array_packages(body: &Value) -> Option<Option<&Value>> {
    body.is_array().then_some(Some(body))
}

fn coded_packages(body: &Value) -> Option<Option<&Value>> {
    let data = coded_data(body)?;
    Some(
        present(data.get("packages"))
            .or_else(|| present(data.get("items")))
            .or(Some(data)),
    )
}

fn items_packages(body: &Value) -> Option<Option<&Value>> {
    present(body.get("items")).map(Some)
}

fn keyed_packages(body: &Value) -> Option<Option<&Value>> {
    present(body.get("packages")).map(Some)
}

fn data_packages(body: &Value) -> Option<Option<&Value>> {
    let data = present(body.get("data"))?;
    if data.is_array() {
        return Some(Some(data));
    }
    Some(present(data.get("packages")).or_else(|| present(data.get("items"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coded_wallets_envelope_with_pagination() {
        let body = json!({
            "code": 20000,
            "data": {
                "wallets": [{"packageId": 1, "balance": 5}, {"packageId": 2, "balance": 7}],
                "pagination": {"total": 40}
            }
        });
        let payload = parse_wallets(&body);
        assert_eq!(payload.wallets.len(), 2);
        assert_eq!(payload.total, 40);
    }

    #[test]
    fn coded_wallets_envelope_with_items_falls_back_to_length() {
        let body = json!({"code": 20000, "data": {"items": [{"balance": 1}]}});
        let payload = parse_wallets(&body);
        assert_eq!(payload.wallets.len(), 1);
        assert_eq!(payload.total, 1);
    }

    #[test]
    fn bare_wallets_envelope() {
        let body = json!({"wallets": [{"balance": 3}], "pagination": {"total": 9}});
        let payload = parse_wallets(&body);
        assert_eq!(payload.wallets[0].balance_raw_units, 3);
        assert_eq!(payload.total, 9);
    }

    #[test]
    fn non_array_wallets_normalise_to_empty() {
        let body = json!({"code": 20000, "data": {"wallets": {"oops": true}}});
        assert_eq!(parse_wallets(&body), WalletsPayload::default());
        assert_eq!(parse_wallets(&json!({"code": 50000, "msg": "x"})), WalletsPayload::default());
        assert_eq!(parse_wallets(&json!("text")), WalletsPayload::default());
    }

    #[test]
    fn packages_shapes_are_all_recognised() {
        let item = json!({"id": 1, "description": "d"});
        let bodies = [
            json!([item.clone()]),
            json!({"code": 20000, "data": {"packages": [item.clone()]}}),
            json!({"code": 20000, "data": {"items": [item.clone()]}}),
            json!({"code": 20000, "data": [item.clone()]}),
            json!({"items": [item.clone()]}),
            json!({"packages": [item.clone()]}),
            json!({"data": [item.clone()]}),
            json!({"data": {"packages": [item.clone()]}}),
            json!({"data": {"items": [item.clone()]}}),
        ];
        for body in &bodies {
            let payload = parse_packages(body);
            assert_eq!(payload.packages.len(), 1, "shape not recognised: {body}");
            assert_eq!(payload.packages[0].id, Some(1));
        }
    }

    #[test]
    fn unknown_package_shapes_normalise_to_empty() {
        assert!(parse_packages(&json!({"foo": []})).packages.is_empty());
        assert!(parse_packages(&json!({"code": 20000, "data": {"other": 1}})).packages.is_empty());
        assert!(parse_packages(&json!({"data": {"packages": "nope"}})).packages.is_empty());
        assert!(parse_packages(&json!(null)).packages.is_empty());
    }
}
