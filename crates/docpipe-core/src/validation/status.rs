//! Validation status flags for extracted invoice data.

use bitflags::bitflags;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// Set of named validation outcomes.
    ///
    /// Failure flags accumulate independently. `SUCCESS` is only ever set on
    /// its own, when no failure flag was raised. The empty set means "not yet
    /// validated" and serializes as `Fail`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ValidationStatus: u16 {
        const SUCCESS = 1 << 0;
        const CUSTOMER_NAME_MISSING = 1 << 1;
        const PRODUCTS_MISSING = 1 << 2;
        const PRODUCTS_TOTAL_QUANTITY_INVALID = 1 << 3;
        const PRODUCTS_TOTAL_PRICE_INVALID = 1 << 4;
        const PRODUCTS_DRIVER_SIGNATURE_MISSING = 1 << 5;
        const PRODUCTS_CUSTOMER_SIGNATURE_MISSING = 1 << 6;
        const RETURNS_DRIVER_SIGNATURE_MISSING = 1 << 7;
        const RETURNS_CUSTOMER_SIGNATURE_MISSING = 1 << 8;
        const RETURN_REASON_MISSING = 1 << 9;
    }
}

const FAIL: &str = "Fail";

/// Wire names, in bit order.
const NAMES: [(&str, ValidationStatus); 10] = [
    ("Success", ValidationStatus::SUCCESS),
    ("CustomerNameMissing", ValidationStatus::CUSTOMER_NAME_MISSING),
    ("ProductsMissing", ValidationStatus::PRODUCTS_MISSING),
    ("ProductsTotalQuantityInvalid", ValidationStatus::PRODUCTS_TOTAL_QUANTITY_INVALID),
    ("ProductsTotalPriceInvalid", ValidationStatus::PRODUCTS_TOTAL_PRICE_INVALID),
    ("ProductsDriverSignatureMissing", ValidationStatus::PRODUCTS_DRIVER_SIGNATURE_MISSING),
    ("ProductsCustomerSignatureMissing", ValidationStatus::PRODUCTS_CUSTOMER_SIGNATURE_MISSING),
    ("ReturnsDriverSignatureMissing", ValidationStatus::RETURNS_DRIVER_SIGNATURE_MISSING),
    ("ReturnsCustomerSignatureMissing", ValidationStatus::RETURNS_CUSTOMER_SIGNATURE_MISSING),
    ("ReturnReasonMissing", ValidationStatus::RETURN_REASON_MISSING),
];

impl ValidationStatus {
    /// Names of the set flags, in bit order.
    pub fn flag_names(&self) -> Vec<&'static str> {
        NAMES
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(name, _)| *name)
            .collect()
    }

    /// Parse a `|`-joined list of flag names.
    pub fn parse(s: &str) -> Option<Self> {
        s.split('|')
            .map(str::trim)
            .try_fold(ValidationStatus::empty(), |acc, name| {
                if name == FAIL {
                    return Some(acc);
                }
                NAMES
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, flag)| acc | *flag)
            })
    }

    pub fn is_success(&self) -> bool {
        *self == ValidationStatus::SUCCESS
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str(FAIL);
        }
        f.write_str(&self.flag_names().join("|"))
    }
}

impl Serialize for ValidationStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ValidationStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ValidationStatus::parse(&s)
            .ok_or_else(|| de::Error::custom(format!("unknown validation status: {}", s)))
    }
}
