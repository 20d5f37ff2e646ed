//! Read-only metrics derived from the latest [`Snapshot`].

use super::snapshot::{Payload, Snapshot, budget_usage, first_truthy};
use serde_json::{Value, json};
use std::fmt::Display;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    Currency(String),
    Count,
    Percent,
}

impl Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unit::Currency(code) => write!(f, "{code}"),
            Unit::Count => Ok(()),
            Unit::Percent => write!(f, "%"),
        }
    }
}

/// Something a host can display: a current value plus free-form attributes.
pub trait ObservableValue {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn unit(&self) -> Unit;
    fn current_value(&self) -> Option<f64>;
    fn attributes(&self) -> Payload;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    MonthlyExpenses,
    MonthlyIncome,
    TodaySpending,
    ContractsOverview,
    BudgetUsage,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::MonthlyExpenses,
        Metric::MonthlyIncome,
        Metric::TodaySpending,
        Metric::ContractsOverview,
        Metric::BudgetUsage,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Metric::MonthlyExpenses => "monthly_expenses",
            Metric::MonthlyIncome => "monthly_income",
            Metric::TodaySpending => "today_spending",
            Metric::ContractsOverview => "contracts_overview",
            Metric::BudgetUsage => "budget_usage",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Metric::MonthlyExpenses => "Monthly expenses",
            Metric::MonthlyIncome => "Monthly income",
            Metric::TodaySpending => "Today's spending",
            Metric::ContractsOverview => "Contracts",
            Metric::BudgetUsage => "Budget usage",
        }
    }

    pub fn unit(&self, currency: &str) -> Unit {
        match self {
            Metric::MonthlyExpenses | Metric::MonthlyIncome | Metric::TodaySpending => {
                Unit::Currency(currency.to_string())
            }
            Metric::ContractsOverview => Unit::Count,
            Metric::BudgetUsage => Unit::Percent,
        }
    }

    pub fn value(&self, snapshot: &Snapshot) -> Option<f64> {
        match self {
            Metric::MonthlyExpenses => snapshot.monthly.expenses,
            Metric::MonthlyIncome => snapshot.monthly.income,
            Metric::TodaySpending => snapshot.today_spending,
            Metric::ContractsOverview => Some(snapshot.contracts.len() as f64),
            Metric::BudgetUsage => budget_usage(&snapshot.budget),
        }
    }

    pub fn attributes(&self, snapshot: &Snapshot, currency: &str) -> Payload {
        let mut attributes = Payload::new();
        match self {
            Metric::MonthlyExpenses | Metric::MonthlyIncome => {
                if !snapshot.monthly.categories.is_empty() {
                    attributes.insert(
                        "categories".to_string(),
                        Value::Object(snapshot.monthly.categories.clone()),
                    );
                }
            }
            Metric::ContractsOverview => {
                let list = snapshot
                    .contracts
                    .iter()
                    .filter_map(|item| normalize_contract(item, currency))
                    .collect();
                attributes.insert("list".to_string(), Value::Array(list));
            }
            Metric::TodaySpending | Metric::BudgetUsage => {}
        }
        attributes
    }
}

/// First truthy value among `keys`; when none is, whatever the last key
/// holds, falsy or not.
fn first_present(item: &Payload, keys: &[&str]) -> Value {
    first_truthy(item, keys)
        .or_else(|| keys.last().and_then(|key| item.get(*key)))
        .cloned()
        .unwrap_or(Value::Null)
}

fn normalize_contract(item: &Value, currency: &str) -> Option<Value> {
    let item = item.as_object()?;
    let currency = first_truthy(item, &["currency"])
        .cloned()
        .unwrap_or_else(|| Value::String(currency.to_string()));
    Some(json!({
        "name": first_present(item, &["name", "title"]),
        "price": first_present(item, &["price", "amount"]),
        "payment_rate": first_present(item, &["payment_rate", "rate"]),
        "currency": currency,
    }))
}

/// A metric bound to one snapshot.
pub struct SnapshotSensor {
    metric: Metric,
    snapshot: Arc<Snapshot>,
    currency: String,
}

impl SnapshotSensor {
    pub fn new(metric: Metric, snapshot: Arc<Snapshot>, currency: &str) -> Self {
        Self {
            metric,
            snapshot,
            currency: currency.to_string(),
        }
    }

    /// One sensor per metric, all sharing `snapshot`.
    pub fn all(snapshot: &Arc<Snapshot>, currency: &str) -> Vec<SnapshotSensor> {
        Metric::ALL
            .iter()
            .map(|metric| SnapshotSensor::new(*metric, Arc::clone(snapshot), currency))
            .collect()
    }
}

impl ObservableValue for SnapshotSensor {
    fn id(&self) -> &str {
        self.metric.id()
    }

    fn name(&self) -> &str {
        self.metric.name()
    }

    fn unit(&self) -> Unit {
        self.metric.unit(&self.currency)
    }

    fn current_value(&self) -> Option<f64> {
        self.metric.value(&self.snapshot)
    }

    fn attributes(&self) -> Payload {
        self.metric.attributes(&self.snapshot, &self.currency)
    }
}
