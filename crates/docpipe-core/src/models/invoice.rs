//! Invoice data models produced by document extraction.
//!
//! Every field is optional: extraction may fail to populate any of them, and
//! the validation engine is the only place "required" is enforced.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Data extracted from a single invoice document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceData {
    /// Invoice number/identifier.
    #[serde(default)]
    pub invoice_number: Option<String>,

    /// Purchase order the invoice refers to.
    #[serde(default)]
    pub purchase_order_number: Option<String>,

    /// Customer name.
    #[serde(default)]
    pub customer_name: Option<String>,

    /// Customer address as printed.
    #[serde(default)]
    pub customer_address: Option<String>,

    /// Delivery date as extracted (ISO 8601 when the extractor follows the template).
    #[serde(default)]
    pub delivery_date: Option<String>,

    /// Payment due date as extracted.
    #[serde(default)]
    pub payable_by: Option<String>,

    /// Delivered products.
    #[serde(default)]
    pub products: Option<Vec<InvoiceProduct>>,

    /// Returned products.
    #[serde(default)]
    pub returns: Option<Vec<InvoiceProduct>>,

    /// Total quantity printed on the invoice.
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub total_quantity: Option<Decimal>,

    /// Total price printed on the invoice.
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub total_price: Option<Decimal>,

    /// Signatures confirming product delivery.
    #[serde(default)]
    pub products_signatures: Option<Vec<InvoiceSignature>>,

    /// Signatures confirming returns.
    #[serde(default)]
    pub returns_signatures: Option<Vec<InvoiceSignature>>,
}

impl InvoiceData {
    /// Empty-valued structure used to describe the expected shape to an extractor.
    pub fn template() -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            invoice_number: Some(String::new()),
            purchase_order_number: Some(String::new()),
            customer_name: Some(String::new()),
            customer_address: Some(String::new()),
            delivery_date: Some(now.clone()),
            payable_by: Some(now),
            products: Some(vec![InvoiceProduct::template()]),
            returns: Some(vec![InvoiceProduct::template()]),
            total_quantity: Some(Decimal::ZERO),
            total_price: Some(Decimal::ZERO),
            products_signatures: Some(vec![InvoiceSignature::template()]),
            returns_signatures: Some(vec![InvoiceSignature::template()]),
        }
    }

    /// Delivered products, empty when absent.
    pub fn products(&self) -> &[InvoiceProduct] {
        self.products.as_deref().unwrap_or_default()
    }

    /// Returned products, empty when absent.
    pub fn returns(&self) -> &[InvoiceProduct] {
        self.returns.as_deref().unwrap_or_default()
    }

    pub fn products_signatures(&self) -> &[InvoiceSignature] {
        self.products_signatures.as_deref().unwrap_or_default()
    }

    pub fn returns_signatures(&self) -> &[InvoiceSignature] {
        self.returns_signatures.as_deref().unwrap_or_default()
    }
}

/// A product line, delivered or returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceProduct {
    /// Product code.
    #[serde(default)]
    pub id: Option<String>,

    /// Product description.
    #[serde(default)]
    pub description: Option<String>,

    /// Price per unit.
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub unit_price: Option<Decimal>,

    /// Quantity.
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub quantity: Option<Decimal>,

    /// Line total.
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    pub total: Option<Decimal>,

    /// Reason for the return (return lines only).
    #[serde(default)]
    pub reason: Option<String>,
}

impl InvoiceProduct {
    pub fn template() -> Self {
        Self {
            id: Some(String::new()),
            description: Some(String::new()),
            unit_price: Some(Decimal::ZERO),
            quantity: Some(Decimal::ZERO),
            total: Some(Decimal::ZERO),
            reason: Some(String::new()),
        }
    }
}

/// A signature block on the invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceSignature {
    /// Who signed.
    #[serde(rename = "type", default)]
    pub signature_type: Option<SignatureType>,

    /// Printed name next to the signature.
    #[serde(default)]
    pub name: Option<String>,

    /// Whether a signature is present.
    #[serde(default)]
    pub is_signed: Option<bool>,
}

impl InvoiceSignature {
    pub fn template() -> Self {
        Self {
            signature_type: Some(SignatureType::Other(String::new())),
            name: Some(String::new()),
            is_signed: Some(false),
        }
    }

    /// Check whether this signature is of the given type.
    pub fn is(&self, signature_type: &SignatureType) -> bool {
        self.signature_type.as_ref() == Some(signature_type)
    }
}

/// Type of signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SignatureType {
    /// Delivery driver.
    Driver,
    /// Receiving customer.
    Customer,
    /// Anything else the extractor returned, kept verbatim.
    Other(String),
}

impl From<String> for SignatureType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Driver" => SignatureType::Driver,
            "Customer" => SignatureType::Customer,
            _ => SignatureType::Other(s),
        }
    }
}

impl From<SignatureType> for String {
    fn from(t: SignatureType) -> Self {
        match t {
            SignatureType::Driver => "Driver".to_string(),
            SignatureType::Customer => "Customer".to_string(),
            SignatureType::Other(s) => s,
        }
    }
}
