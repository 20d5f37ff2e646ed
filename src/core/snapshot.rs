//! Raw overview payloads and the schema-tolerant extraction into a [`Snapshot`].
//!
//! Every accessor here is pure and never fails: fields that are missing or
//! have an unexpected type come out as `None` or empty.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

pub type Payload = Map<String, Value>;

/// The three endpoint responses of one poll cycle, keyed by source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overview {
    pub accounts: Payload,
    pub budgets: Payload,
    pub contracts: Payload,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonthlySummary {
    pub expenses: Option<f64>,
    pub income: Option<f64>,
    pub categories: Payload,
}

/// One poll cycle's extracted metrics. Replaced wholesale, never edited.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub monthly: MonthlySummary,
    pub today_spending: Option<f64>,
    pub contracts: Vec<Value>,
    pub budget: Payload,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn from_overview(overview: &Overview) -> Self {
        Self {
            monthly: extract_monthly(&overview.accounts),
            today_spending: extract_today_spending(&overview.accounts),
            contracts: extract_contracts(&overview.contracts),
            budget: extract_budget_status(&overview.budgets),
            fetched_at: Utc::now(),
        }
    }
}

/// False for null, `false`, zero, and empty strings, arrays or objects.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(object) => !object.is_empty(),
    }
}

/// First truthy value among `keys`, in order.
pub fn first_truthy<'a>(payload: &'a Payload, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| payload.get(*key))
        .find(|value| is_truthy(value))
}

/// Non-empty object under `key`, mirroring "present and truthy".
fn non_empty_object<'a>(payload: &'a Payload, key: &str) -> Option<&'a Payload> {
    payload
        .get(key)
        .and_then(Value::as_object)
        .filter(|object| !object.is_empty())
}

/// Reads `monthly`, falling back to `analysis.monthly`.
pub fn extract_monthly(accounts: &Payload) -> MonthlySummary {
    let monthly = non_empty_object(accounts, "monthly").or_else(|| {
        accounts
            .get("analysis")
            .and_then(Value::as_object)
            .and_then(|analysis| non_empty_object(analysis, "monthly"))
    });
    let Some(monthly) = monthly else {
        return MonthlySummary::default();
    };

    let categories = non_empty_object(monthly, "categories")
        .or_else(|| non_empty_object(monthly, "by_category"))
        .cloned()
        .unwrap_or_default();

    MonthlySummary {
        expenses: monthly.get("expenses").and_then(Value::as_f64),
        income: monthly.get("income").and_then(Value::as_f64),
        categories,
    }
}

/// Reads `today_spending`, falling back to `today.spending`.
pub fn extract_today_spending(accounts: &Payload) -> Option<f64> {
    match accounts.get("today_spending") {
        Some(Value::Null) | None => accounts
            .get("today")
            .and_then(|today| today.get("spending"))
            .and_then(Value::as_f64),
        Some(value) => value.as_f64(),
    }
}

/// List under `contracts`, else under `items`, else empty.
pub fn extract_contracts(contracts: &Payload) -> Vec<Value> {
    ["contracts", "items"]
        .iter()
        .find_map(|key| contracts.get(*key).and_then(Value::as_array))
        .cloned()
        .unwrap_or_default()
}

/// The first truthy of `current` and `budget`, if it is an object.
///
/// A truthy `current` of another type wins over `budget` and yields an empty
/// status.
pub fn extract_budget_status(budgets: &Payload) -> Payload {
    match first_truthy(budgets, &["current", "budget"]) {
        Some(Value::Object(status)) => status.clone(),
        _ => Payload::new(),
    }
}

/// Budget usage in percent.
///
/// Prefers an explicit `used_percent` or `usage`, else derives it from
/// `spent` and `limit`. A zero limit has no usage.
pub fn budget_usage(budget: &Payload) -> Option<f64> {
    let explicit = budget
        .get("used_percent")
        .filter(|value| !value.is_null())
        .or_else(|| budget.get("usage"));
    if let Some(percent) = explicit.and_then(Value::as_f64) {
        return Some(percent);
    }

    let spent = budget.get("spent").and_then(Value::as_f64)?;
    let limit = budget.get("limit").and_then(Value::as_f64)?;
    (limit != 0.0).then(|| spent / limit * 100.0)
}
