//! Maps loosely-shaped transaction requests onto one canonical record.
//!
//! Callers send weights and cone counts under several field names (camelCase
//! from web clients, snake_case from internal jobs, a few legacy spellings).
//! Numbers may arrive as JSON numbers or numeric strings; absent, `null` and
//! empty values count as zero.

use core::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use loomerp_core::{DomainError, DomainResult, YarnId};

use crate::metrics::StockMetrics;
use crate::transaction::TransactionKind;

/// Transaction request as received from a caller, before any validation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawTransactionRequest {
    #[serde(default, alias = "transactionType", alias = "type")]
    pub transaction_type: Option<String>,

    #[serde(default, alias = "yarnId", alias = "yarn_id")]
    pub yarn: Option<String>,

    #[serde(default, alias = "netWeight")]
    pub net_weight: Option<JsonValue>,

    #[serde(default, alias = "totalWeight", alias = "grossWeight", alias = "gross_weight")]
    pub total_weight: Option<JsonValue>,

    #[serde(default, alias = "tearWeight", alias = "tareWeight", alias = "tare_weight")]
    pub tear_weight: Option<JsonValue>,

    #[serde(default, alias = "numberOfCones", alias = "cones", alias = "coneCount")]
    pub number_of_cones: Option<JsonValue>,

    /// Requested reservation for `blocked` requests.
    #[serde(
        default,
        alias = "blockedNetWeight",
        alias = "blockedWeight",
        alias = "blocked_weight",
        alias = "blockQty"
    )]
    pub blocked_net_weight: Option<JsonValue>,

    #[serde(default, alias = "orderRef", alias = "orderId", alias = "order_id", alias = "orderNo")]
    pub order_ref: Option<String>,

    #[serde(default, alias = "transactionDate", alias = "date")]
    pub transaction_date: Option<JsonValue>,

    /// External overbooking trigger (forces a requisition refresh).
    #[serde(default, alias = "overbook")]
    pub overbooked: Option<bool>,
}

impl RawTransactionRequest {
    pub fn new(kind: impl Into<String>, yarn: YarnId) -> Self {
        Self {
            transaction_type: Some(kind.into()),
            yarn: Some(yarn.to_string()),
            ..Self::default()
        }
    }

    /// Decode a JSON payload. Shape errors surface as validation failures.
    pub fn from_json(value: JsonValue) -> DomainResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| DomainError::validation(format!("malformed transaction request: {e}")))
    }

    pub fn from_json_str(raw: &str) -> DomainResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| DomainError::validation(format!("malformed transaction request: {e}")))
    }

    pub fn with_net_weight(mut self, value: Decimal) -> Self {
        self.net_weight = Some(decimal_json(value));
        self
    }

    pub fn with_total_weight(mut self, value: Decimal) -> Self {
        self.total_weight = Some(decimal_json(value));
        self
    }

    pub fn with_tear_weight(mut self, value: Decimal) -> Self {
        self.tear_weight = Some(decimal_json(value));
        self
    }

    pub fn with_cones(mut self, value: Decimal) -> Self {
        self.number_of_cones = Some(decimal_json(value));
        self
    }

    pub fn with_blocked_net_weight(mut self, value: Decimal) -> Self {
        self.blocked_net_weight = Some(decimal_json(value));
        self
    }

    pub fn with_order_ref(mut self, order_ref: impl Into<String>) -> Self {
        self.order_ref = Some(order_ref.into());
        self
    }

    pub fn with_transaction_date(mut self, date: DateTime<Utc>) -> Self {
        self.transaction_date = Some(JsonValue::String(date.to_rfc3339()));
        self
    }

    pub fn with_overbooked_trigger(mut self) -> Self {
        self.overbooked = Some(true);
        self
    }
}

fn decimal_json(value: Decimal) -> JsonValue {
    JsonValue::String(value.to_string())
}

/// Canonical transaction: validated kind and yarn, five numeric fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTransaction {
    pub yarn: YarnId,
    pub kind: TransactionKind,
    pub metrics: StockMetrics,
    pub order_ref: Option<String>,
    pub transaction_date: Option<DateTime<Utc>>,
    pub overbooked_trigger: bool,
}

/// Validate and canonicalize a raw request.
///
/// - `blocked`: net and total weight are both the requested reservation;
///   tear weight and cones are zero.
/// - every other kind: weights and cones as given; tear weight as given or
///   derived as `max(total - net, 0)`, rejected when that difference does not
///   fit in a `Decimal`.
pub fn normalize(raw: &RawTransactionRequest) -> DomainResult<NormalizedTransaction> {
    let kind = match raw.transaction_type.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => TransactionKind::from_str(s)?,
        _ => return Err(DomainError::validation("transaction type is required")),
    };

    let yarn = match raw.yarn.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => YarnId::from_str(s)
            .map_err(|e| DomainError::validation(format!("invalid yarn reference: {e}")))?,
        _ => return Err(DomainError::validation("yarn reference is required")),
    };

    let metrics = match kind {
        TransactionKind::Blocked => {
            let requested = match quantity("blocked_net_weight", raw.blocked_net_weight.as_ref())? {
                Some(v) => v,
                None => quantity("net_weight", raw.net_weight.as_ref())?.unwrap_or_default(),
            };
            StockMetrics {
                total_weight: requested,
                tear_weight: Decimal::ZERO,
                net_weight: requested,
                number_of_cones: Decimal::ZERO,
            }
        }
        TransactionKind::Issued
        | TransactionKind::Stocked
        | TransactionKind::Transferred
        | TransactionKind::Returned => {
            let net_weight = quantity("net_weight", raw.net_weight.as_ref())?.unwrap_or_default();
            let total_weight =
                quantity("total_weight", raw.total_weight.as_ref())?.unwrap_or_default();
            let number_of_cones =
                quantity("number_of_cones", raw.number_of_cones.as_ref())?.unwrap_or_default();
            let tear_weight = match quantity("tear_weight", raw.tear_weight.as_ref())? {
                Some(v) => v,
                None => total_weight
                    .checked_sub(net_weight)
                    .ok_or_else(|| {
                        DomainError::validation(
                            "tear_weight cannot be derived: total_weight - net_weight overflows",
                        )
                    })?
                    .max(Decimal::ZERO),
            };
            StockMetrics {
                total_weight,
                tear_weight,
                net_weight,
                number_of_cones,
            }
        }
    };

    let order_ref = raw
        .order_ref
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(NormalizedTransaction {
        yarn,
        kind,
        metrics,
        order_ref,
        transaction_date: transaction_date(raw.transaction_date.as_ref())?,
        overbooked_trigger: raw.overbooked.unwrap_or(false),
    })
}

/// Parse an optional numeric field. `None` means "not supplied".
fn quantity(field: &str, value: Option<&JsonValue>) -> DomainResult<Option<Decimal>> {
    let invalid = |detail: &dyn core::fmt::Display| {
        DomainError::validation(format!("{field} is not a valid number: {detail}"))
    };

    match value {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::Number(n)) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map(Some)
                .map_err(|e| invalid(&e))
        }
        Some(JsonValue::String(s)) if s.trim().is_empty() => Ok(None),
        Some(JsonValue::String(s)) => {
            let text = s.trim();
            Decimal::from_str(text)
                .or_else(|_| Decimal::from_scientific(text))
                .map(Some)
                .map_err(|_| invalid(&text))
        }
        Some(other) => Err(invalid(other)),
    }
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates (midnight UTC).
fn transaction_date(value: Option<&JsonValue>) -> DomainResult<Option<DateTime<Utc>>> {
    match value {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) if s.trim().is_empty() => Ok(None),
        Some(JsonValue::String(s)) => {
            let text = s.trim();
            if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
                return Ok(Some(ts.with_timezone(&Utc)));
            }
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| Some(dt.and_utc()))
                .ok_or_else(|| {
                    DomainError::validation(format!("transaction_date is not a valid date: {text}"))
                })
        }
        Some(other) => Err(DomainError::validation(format!(
            "transaction_date is not a valid date: {other}"
        ))),
    }
}
