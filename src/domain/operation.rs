use super::payment::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Insert,
    UpdateOne,
    FindOneAndUpdate,
    UpdateMany,
}

/// A single write against one of the two collections.
///
/// Empty optional columns leave the corresponding field untouched.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Operation {
    pub collection: Side,
    pub operation: OperationType,
    pub key: String,
    pub paid: Option<bool>,
    pub paid_on: Option<DateTime<Utc>>,
    pub amount: Option<Decimal>,
    pub note: Option<String>,
}
