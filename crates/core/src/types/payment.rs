//! Payment methods accepted at the till.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PaymentMethod`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentMethodError {
    /// The input is not one of the accepted methods.
    #[error("invalid payment method: {0} (expected cash, mpesa or credit)")]
    Unknown(String),
}

/// How the customer settles a sale.
///
/// `Credit` sales are booked against a named customer, so selecting it makes
/// the customer-name field visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Mpesa,
    Credit,
}

impl PaymentMethod {
    /// Every method, in the order the selector lists them.
    pub const ALL: [Self; 3] = [Self::Cash, Self::Mpesa, Self::Credit];

    /// Wire value sent to the checkout endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Mpesa => "mpesa",
            Self::Credit => "credit",
        }
    }

    /// Whether the customer-name field is shown for this method.
    #[must_use]
    pub const fn requires_customer_name(self) -> bool {
        matches!(self, Self::Credit)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = PaymentMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "mpesa" | "m-pesa" => Ok(Self::Mpesa),
            "credit" => Ok(Self::Credit),
            other => Err(PaymentMethodError::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_credit_requires_customer_name() {
        assert!(PaymentMethod::Credit.requires_customer_name());
        assert!(!PaymentMethod::Cash.requires_customer_name());
        assert!(!PaymentMethod::Mpesa.requires_customer_name());
    }

    #[test]
    fn test_parse_round_trips_display() {
        for method in PaymentMethod::ALL {
            assert_eq!(method.to_string().parse::<PaymentMethod>().unwrap(), method);
        }
        assert_eq!("M-Pesa".parse::<PaymentMethod>().unwrap(), PaymentMethod::Mpesa);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "cheque".parse::<PaymentMethod>().unwrap_err();
        assert_eq!(err, PaymentMethodError::Unknown("cheque".to_string()));
    }

    #[test]
    fn test_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::Mpesa).unwrap(),
            "\"mpesa\""
        );
    }
}
