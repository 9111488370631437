use super::document::Document;
use crate::error::{Result, SyncError};
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Field names one collection uses for the mirrored payment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMap {
    /// Business key (invoice number) field.
    pub key: &'static str,
    pub paid: &'static str,
    /// Paid-on date, present only while `paid` is true.
    pub paid_on: &'static str,
}

pub const INVOICE_FIELDS: FieldMap = FieldMap {
    key: "invoiceNumber",
    paid: "paid",
    paid_on: "paidOnDate",
};

pub const CONTRACT_PAYMENT_FIELDS: FieldMap = FieldMap {
    key: "invoiceNo",
    paid: "paid",
    paid_on: "paidDate",
};

/// One of the two mirrored collections.
///
/// `Source` holds invoices, `Mirror` holds contract payments. Either side may
/// be written directly; the other is kept in step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "invoices")]
    Source,
    #[serde(rename = "payments")]
    Mirror,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Source => Side::Mirror,
            Side::Mirror => Side::Source,
        }
    }

    pub fn fields(self) -> FieldMap {
        match self {
            Side::Source => INVOICE_FIELDS,
            Side::Mirror => CONTRACT_PAYMENT_FIELDS,
        }
    }

    pub fn collection_name(self) -> &'static str {
        match self {
            Side::Source => "invoices",
            Side::Mirror => "payments",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection_name())
    }
}

/// A payment-status change observed on one side, ready to be mirrored.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentChange {
    /// Side the change was written to.
    pub side: Side,
    pub business_key: String,
    pub paid: bool,
    /// Date supplied with the write, if any.
    pub paid_on: Option<DateTime<Utc>>,
}

/// Invoice document as the invoicing subsystem stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub invoice_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<Decimal>,
    #[serde(default)]
    pub paid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_on_date: Option<DateTime<Utc>>,
}

impl Invoice {
    pub fn new(invoice_number: impl Into<String>) -> Self {
        Self {
            invoice_number: invoice_number.into(),
            description: None,
            total: None,
            paid: false,
            paid_on_date: None,
        }
    }

    pub fn to_document(&self) -> Result<Document> {
        to_document(self)
    }

    pub fn from_document(document: &Document) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(document.clone()))?)
    }
}

/// Payment-plan entry as the contract subsystem stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractPayment {
    pub invoice_no: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub paid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_date: Option<DateTime<Utc>>,
}

impl ContractPayment {
    pub fn new(invoice_no: impl Into<String>) -> Self {
        Self {
            invoice_no: invoice_no.into(),
            note: None,
            amount: None,
            paid: false,
            paid_date: None,
        }
    }

    pub fn to_document(&self) -> Result<Document> {
        to_document(self)
    }

    pub fn from_document(document: &Document) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(document.clone()))?)
    }
}

/// One row of the final payment-status report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentStatus {
    pub collection: Side,
    pub key: String,
    pub amount: Option<Decimal>,
    pub paid: bool,
    pub paid_on: Option<String>,
}

impl From<Invoice> for PaymentStatus {
    fn from(invoice: Invoice) -> Self {
        Self {
            collection: Side::Source,
            key: invoice.invoice_number,
            amount: invoice.total,
            paid: invoice.paid,
            paid_on: invoice.paid_on_date.map(format_timestamp),
        }
    }
}

impl From<ContractPayment> for PaymentStatus {
    fn from(payment: ContractPayment) -> Self {
        Self {
            collection: Side::Mirror,
            key: payment.invoice_no,
            amount: payment.amount,
            paid: payment.paid,
            paid_on: payment.paid_date.map(format_timestamp),
        }
    }
}

fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(document) => Ok(document),
        other => Err(SyncError::ValidationError(format!(
            "expected a document, got {other}"
        ))),
    }
}

/// Formats a timestamp the way documents store it.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Reads a stored timestamp. Anything that is not an RFC 3339 string is `None`.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}
