//! Shipping address captured on the checkout form.

use serde::{Deserialize, Serialize};

/// Checkout-form validation failure for the shipping address.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// One or more required fields are blank.
    #[error("missing shipping fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
}

/// Where the order ships to.
///
/// `label`, `district` and `zip_code` are optional; every other field must be
/// filled in before checkout may proceed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    #[serde(default)]
    pub label: String,
    pub full_name: String,
    pub phone: String,
    pub address_line: String,
    pub city: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub zip_code: String,
}

impl ShippingAddress {
    /// Zip code sent to the gateway when the customer left it blank.
    pub const DEFAULT_ZIP_CODE: &'static str = "34000";

    /// Check that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::MissingFields` naming each blank required field.
    pub fn validate(&self) -> Result<(), AddressError> {
        let missing: Vec<&'static str> = [
            ("full_name", &self.full_name),
            ("phone", &self.phone),
            ("address_line", &self.address_line),
            ("city", &self.city),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AddressError::MissingFields(missing))
        }
    }

    /// Zip code, or the market default when blank.
    #[must_use]
    pub fn zip_code_or_default(&self) -> &str {
        let zip = self.zip_code.trim();
        if zip.is_empty() {
            Self::DEFAULT_ZIP_CODE
        } else {
            zip
        }
    }

    /// Split the full name into first name and surname at the first space.
    ///
    /// Blank parts fall back to generic placeholders because the gateway
    /// requires both.
    #[must_use]
    pub fn name_parts(&self) -> (String, String) {
        let mut parts = self.full_name.split_whitespace();
        let first = parts.next().unwrap_or("Müşteri").to_owned();
        let rest: Vec<&str> = parts.collect();
        let surname = if rest.is_empty() {
            "Kullanıcı".to_owned()
        } else {
            rest.join(" ")
        };
        (first, surname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            label: "Ev".to_string(),
            full_name: "Ayşe Nur Yılmaz".to_string(),
            phone: "5321112233".to_string(),
            address_line: "Bağdat Cd. No:1".to_string(),
            city: "İstanbul".to_string(),
            district: String::new(),
            zip_code: String::new(),
        }
    }

    #[test]
    fn test_optional_fields_may_be_blank() {
        assert_eq!(address().validate(), Ok(()));
    }

    #[test]
    fn test_missing_required_fields_are_listed() {
        let mut a = address();
        a.phone = "  ".to_string();
        a.city = String::new();
        assert_eq!(
            a.validate(),
            Err(AddressError::MissingFields(vec!["phone", "city"]))
        );
    }

    #[test]
    fn test_zip_code_default() {
        let mut a = address();
        assert_eq!(a.zip_code_or_default(), "34000");
        a.zip_code = "34710".to_string();
        assert_eq!(a.zip_code_or_default(), "34710");
    }

    #[test]
    fn test_name_parts() {
        assert_eq!(
            address().name_parts(),
            ("Ayşe".to_string(), "Nur Yılmaz".to_string())
        );

        let mut single = address();
        single.full_name = "Cem".to_string();
        assert_eq!(
            single.name_parts(),
            ("Cem".to_string(), "Kullanıcı".to_string())
        );
    }
}
