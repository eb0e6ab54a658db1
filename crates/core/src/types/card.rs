//! Payment card details entered on the checkout form.
//!
//! Card data only lives for the duration of the gateway request. It is never
//! serialized, and `Debug` output never contains the number or CVC.

use secrecy::{ExposeSecret, SecretString};

/// Checkout-form validation failure for card fields.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CardError {
    #[error("card holder name is required")]
    MissingHolder,
    #[error("card number must be 13-19 digits")]
    InvalidNumber,
    #[error("expiry date must be in MM/YY format")]
    InvalidExpiry,
    #[error("CVC must be 3 or 4 digits")]
    InvalidCvc,
}

/// Validated card details.
pub struct CardDetails {
    holder_name: String,
    number: SecretString,
    expire_month: String,
    expire_year: String,
    cvc: SecretString,
}

impl CardDetails {
    /// Validate raw form input.
    ///
    /// Whitespace is stripped from the card number before validation, and the
    /// `MM/YY` expiry is expanded to a four-digit year.
    ///
    /// # Errors
    ///
    /// Returns a `CardError` describing the first malformed field.
    pub fn parse(holder_name: &str, number: &str, expiry: &str, cvc: &str) -> Result<Self, CardError> {
        let holder_name = holder_name.trim();
        if holder_name.is_empty() {
            return Err(CardError::MissingHolder);
        }

        let number: String = number.chars().filter(|c| !c.is_whitespace()).collect();
        if !(13..=19).contains(&number.len()) || !number.chars().all(|c| c.is_ascii_digit()) {
            return Err(CardError::InvalidNumber);
        }

        let (month, year) = parse_expiry(expiry)?;

        let cvc = cvc.trim();
        if !(3..=4).contains(&cvc.len()) || !cvc.chars().all(|c| c.is_ascii_digit()) {
            return Err(CardError::InvalidCvc);
        }

        Ok(Self {
            holder_name: holder_name.to_owned(),
            number: SecretString::from(number),
            expire_month: month,
            expire_year: year,
            cvc: SecretString::from(cvc.to_owned()),
        })
    }

    #[must_use]
    pub fn holder_name(&self) -> &str {
        &self.holder_name
    }

    /// The normalized card number. Only call when building the gateway request.
    #[must_use]
    pub fn number(&self) -> &str {
        self.number.expose_secret()
    }

    /// Two-digit expiry month.
    #[must_use]
    pub fn expire_month(&self) -> &str {
        &self.expire_month
    }

    /// Four-digit expiry year.
    #[must_use]
    pub fn expire_year(&self) -> &str {
        &self.expire_year
    }

    #[must_use]
    pub fn cvc(&self) -> &str {
        self.cvc.expose_secret()
    }

    /// Last four digits, safe for logs.
    #[must_use]
    pub fn last_four(&self) -> &str {
        let number = self.number.expose_secret();
        number.get(number.len().saturating_sub(4)..).unwrap_or_default()
    }
}

impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardDetails")
            .field("holder_name", &self.holder_name)
            .field("number", &format_args!("**** {}", self.last_four()))
            .field("expire_month", &self.expire_month)
            .field("expire_year", &self.expire_year)
            .field("cvc", &"[REDACTED]")
            .finish()
    }
}

fn parse_expiry(expiry: &str) -> Result<(String, String), CardError> {
    let (month, year) = expiry.trim().split_once('/').ok_or(CardError::InvalidExpiry)?;
    let month = month.trim();
    let year = year.trim();

    let month_num: u8 = month.parse().map_err(|_| CardError::InvalidExpiry)?;
    if month.len() != 2 || !(1..=12).contains(&month_num) {
        return Err(CardError::InvalidExpiry);
    }
    if year.len() != 2 || !year.chars().all(|c| c.is_ascii_digit()) {
        return Err(CardError::InvalidExpiry);
    }

    Ok((month.to_owned(), format!("20{year}")))
}
