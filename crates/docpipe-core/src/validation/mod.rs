//! Consistency checks for extracted invoice data.
//!
//! Every rule runs independently and contributes its own message and status
//! flag; nothing short-circuits on the first failure.

mod status;

pub use status::ValidationStatus;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::invoice::{InvoiceData, InvoiceSignature, SignatureType};
use crate::models::request::Validate;
use crate::models::result::{ValidationResult, WorkflowResult};

/// Action name used to tag validation messages.
pub const NAME: &str = "ValidateInvoiceData";

/// Request to validate the data extracted from one invoice blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidateInvoiceDataRequest {
    /// Name of the invoice blob.
    pub name: String,

    /// Extracted invoice data.
    pub data: Option<InvoiceData>,
}

impl ValidateInvoiceDataRequest {
    pub fn new(name: impl Into<String>, data: InvoiceData) -> Self {
        Self {
            name: name.into(),
            data: Some(data),
        }
    }
}

impl Validate for ValidateInvoiceDataRequest {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.name.is_empty() {
            result.add_error("name is required");
        }

        if self.data.is_none() {
            result.add_error("data is required");
        }

        result
    }
}

/// Workflow result of validating one invoice, plus its status flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceValidationResult {
    #[serde(flatten)]
    pub result: WorkflowResult,

    pub status: ValidationStatus,
}

impl InvoiceValidationResult {
    fn new(name: &str) -> Self {
        Self {
            result: WorkflowResult::new(name),
            status: ValidationStatus::empty(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.result.is_valid()
    }

    pub fn messages(&self) -> &[String] {
        self.result.messages()
    }

    fn fail(&mut self, flag: ValidationStatus, message: impl AsRef<str>) {
        self.status |= flag;
        self.result.add_error(NAME, message);
    }
}

impl AsRef<ValidationResult> for InvoiceValidationResult {
    fn as_ref(&self) -> &ValidationResult {
        self.result.as_ref()
    }
}

/// Validate extracted invoice data, tagging messages with `name`.
pub fn validate(name: &str, data: &InvoiceData) -> InvoiceValidationResult {
    validate_invoice_data(&ValidateInvoiceDataRequest::new(name, data.clone()))
}

/// Validate the data carried by a validation request.
pub fn validate_invoice_data(request: &ValidateInvoiceDataRequest) -> InvoiceValidationResult {
    let name = if request.name.is_empty() {
        NAME
    } else {
        request.name.as_str()
    };
    let mut result = InvoiceValidationResult::new(name);

    let input = request.validate();
    let data = match &request.data {
        Some(data) if input.is_valid => data,
        _ => {
            result.result.merge(&input);
            return result;
        }
    };

    if data.customer_name.as_deref().unwrap_or_default().is_empty() {
        result.fail(
            ValidationStatus::CUSTOMER_NAME_MISSING,
            "customer_name is required",
        );
    }

    validate_products(data, &mut result);
    validate_returns(data, &mut result);

    if result.is_valid() {
        result.status = ValidationStatus::SUCCESS;
    }

    result
}

fn validate_products(data: &InvoiceData, result: &mut InvoiceValidationResult) {
    let products = data.products();
    if products.is_empty() {
        result.fail(ValidationStatus::PRODUCTS_MISSING, "products is required");
    } else {
        let total_quantity: Decimal = products.iter().filter_map(|p| p.quantity).sum();
        if Some(total_quantity) != data.total_quantity {
            result.fail(
                ValidationStatus::PRODUCTS_TOTAL_QUANTITY_INVALID,
                format!(
                    "products quantity total must match total_quantity. Expected: {}, Actual: {}",
                    display(data.total_quantity),
                    total_quantity
                ),
            );
        }

        let total_price: Decimal = products.iter().filter_map(|p| p.total).sum();
        if Some(total_price) != data.total_price {
            result.fail(
                ValidationStatus::PRODUCTS_TOTAL_PRICE_INVALID,
                format!(
                    "products price total must match total_price. Expected: {}, Actual: {}",
                    display(data.total_price),
                    total_price
                ),
            );
        }
    }

    validate_signatures(
        "products_signatures",
        data.products_signatures(),
        ValidationStatus::PRODUCTS_DRIVER_SIGNATURE_MISSING,
        ValidationStatus::PRODUCTS_CUSTOMER_SIGNATURE_MISSING,
        result,
    );
}

fn validate_returns(data: &InvoiceData, result: &mut InvoiceValidationResult) {
    let returns = data.returns();
    if returns.is_empty() {
        // Returns are optional
        return;
    }

    for (index, line) in returns.iter().enumerate() {
        if line.reason.as_deref().unwrap_or_default().is_empty() {
            let id = line
                .id
                .clone()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("returns[{}]", index));
            result.fail(
                ValidationStatus::RETURN_REASON_MISSING,
                format!("{} must contain a reason for the return", id),
            );
        }
    }

    validate_signatures(
        "returns_signatures",
        data.returns_signatures(),
        ValidationStatus::RETURNS_DRIVER_SIGNATURE_MISSING,
        ValidationStatus::RETURNS_CUSTOMER_SIGNATURE_MISSING,
        result,
    );
}

fn validate_signatures(
    field: &str,
    signatures: &[InvoiceSignature],
    driver_missing: ValidationStatus,
    customer_missing: ValidationStatus,
    result: &mut InvoiceValidationResult,
) {
    if signatures.is_empty() {
        result.fail(driver_missing | customer_missing, format!("{} is required", field));
        return;
    }

    if !signatures.iter().any(|s| s.is(&SignatureType::Driver)) {
        result.fail(
            driver_missing,
            format!("{} must contain a driver signature", field),
        );
    }

    if !signatures.iter().any(|s| s.is(&SignatureType::Customer)) {
        result.fail(
            customer_missing,
            format!("{} must contain a customer signature", field),
        );
    }
}

fn display(value: Option<Decimal>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "null".to_string())
}
