//! Simulated card processor for the ticket purchase path.
//!
//! No money moves: a charge waits `payment.simulated_delay_ms` and always
//! succeeds once the card details pass validation.

use serde::Deserialize;
use std::borrow::Cow;
use std::time::Duration;
use tracing::debug;
use validator::{Validate, ValidationError};

use crate::config::PaymentConfig;
use crate::error::AppError;
use crate::models::ticket::{transaction_id, ChargeMethod};

fn digits(value: &str, len: usize, message: &'static str) -> Result<(), ValidationError> {
    if value.len() == len && value.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("format").with_message(Cow::Borrowed(message)))
    }
}

fn validate_card_number(value: &str) -> Result<(), ValidationError> {
    digits(value, 16, "Card number must be 16 digits")
}

fn validate_cvv(value: &str) -> Result<(), ValidationError> {
    digits(value, 3, "CVV must be 3 digits")
}

fn validate_expiry(value: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::new("format").with_message(Cow::Borrowed("Expiry date must be in MM/YY format"));
    let (month, year) = value.split_once('/').ok_or_else(invalid)?;
    if year.len() != 2 || !year.chars().all(|c| c.is_ascii_digit()) || month.len() != 2 {
        return Err(invalid());
    }
    match month.parse::<u8>() {
        Ok(1..=12) => Ok(()),
        _ => Err(invalid()),
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    #[validate(custom(function = "validate_card_number"))]
    pub card_number: String,
    #[validate(custom(function = "validate_expiry"))]
    pub expiry_date: String,
    #[validate(custom(function = "validate_cvv"))]
    pub cvv: String,
}

/// Result of an accepted charge.
#[derive(Debug, Clone)]
pub struct Charge {
    pub transaction_id: String,
    pub method: ChargeMethod,
}

#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    delay: Duration,
}

impl SimulatedGateway {
    pub fn new(config: &PaymentConfig) -> Self {
        Self {
            delay: Duration::from_millis(config.simulated_delay_ms),
        }
    }

    pub async fn charge(&self, amount: f64, details: &PaymentDetails) -> Result<Charge, AppError> {
        details.validate()?;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let transaction_id = transaction_id();
        debug!(
            "Charged {:.2} to card ending {} ({})",
            amount,
            &details.card_number[details.card_number.len() - 4..],
            transaction_id
        );
        Ok(Charge {
            transaction_id,
            method: ChargeMethod::Card,
        })
    }
}
