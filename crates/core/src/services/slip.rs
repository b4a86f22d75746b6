//! Bank slip verification.

use std::time::Duration;

use enrollo_common::{AppError, AppResult, config::SlipConfig};
use serde::Deserialize;

use super::upstream::{status_error, transport_error};

/// Result of verifying a slip payload with the bank-slip service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSlip {
    /// Transferred amount in minor currency units.
    pub amount: i64,
    /// Bank transaction reference.
    pub transaction_ref: String,
    /// Receiving account number as printed on the slip, partly masked
    /// (e.g. `xxx-x-x1234-x`).
    pub receiver_account: String,
}

/// Slip verification collaborator.
#[async_trait::async_trait]
pub trait SlipVerifier: Send + Sync {
    /// Verify a decoded QR payload.
    async fn verify(&self, payload: &str) -> AppResult<VerifiedSlip>;
}

/// Convert a major-unit amount (baht) into minor units (satang).
pub fn to_minor_units(amount: f64) -> AppResult<i64> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AppError::BadRequest(format!("Invalid slip amount: {amount}")));
    }
    let minor = (amount * 100.0).round();
    if minor >= i64::MAX as f64 {
        return Err(AppError::BadRequest(format!("Invalid slip amount: {amount}")));
    }
    Ok(minor as i64)
}

#[derive(Debug, Deserialize)]
struct EasySlipResponse {
    data: EasySlipData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EasySlipData {
    trans_ref: String,
    amount: EasySlipAmount,
    receiver: EasySlipParty,
}

#[derive(Debug, Deserialize)]
struct EasySlipAmount {
    amount: f64,
}

#[derive(Debug, Deserialize)]
struct EasySlipParty {
    account: EasySlipAccount,
}

#[derive(Debug, Deserialize)]
struct EasySlipAccount {
    #[serde(default)]
    bank: Option<EasySlipBankAccount>,
}

#[derive(Debug, Deserialize)]
struct EasySlipBankAccount {
    account: String,
}

impl TryFrom<EasySlipResponse> for VerifiedSlip {
    type Error = AppError;

    fn try_from(response: EasySlipResponse) -> AppResult<Self> {
        let data = response.data;
        let receiver_account = data
            .receiver
            .account
            .bank
            .map(|bank| bank.account)
            .ok_or_else(|| AppError::BadRequest("Slip has no receiving bank account".to_string()))?;

        Ok(Self {
            amount: to_minor_units(data.amount.amount)?,
            transaction_ref: data.trans_ref,
            receiver_account,
        })
    }
}

/// `EasySlip` verification client.
#[derive(Clone)]
pub struct EasySlipVerifier {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl EasySlipVerifier {
    /// Create a new client.
    pub fn new(config: &SlipConfig) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait::async_trait]
impl SlipVerifier for EasySlipVerifier {
    async fn verify(&self, payload: &str) -> AppResult<VerifiedSlip> {
        let response = self
            .http_client
            .get(&self.api_url)
            .query(&[("payload", payload)])
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| transport_error("EasySlip", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("EasySlip", status, &body));
        }

        let parsed: EasySlipResponse = response.json().await.map_err(|e| {
            AppError::ExternalService(format!("Failed to parse EasySlip response: {e}"))
        })?;

        parsed.try_into()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(100.0).unwrap(), 10_000);
        assert_eq!(to_minor_units(0.1 + 0.2).unwrap(), 30);
        assert_eq!(to_minor_units(1234.56).unwrap(), 123_456);
        assert!(to_minor_units(0.0).is_err());
        assert!(to_minor_units(-5.0).is_err());
        assert!(to_minor_units(f64::NAN).is_err());
    }

    #[test]
    fn test_parse_verified_slip() {
        let body = r#"{
            "status": 200,
            "data": {
                "payload": "0041000600000101030040220014",
                "transRef": "015073144041ATF00999",
                "amount": { "amount": 250.5, "local": { "amount": 0, "currency": "" } },
                "sender": { "account": { "name": { "th": "a" } } },
                "receiver": {
                    "account": {
                        "name": { "th": "b" },
                        "bank": { "type": "BANKAC", "account": "xxx-x-x5678-x" }
                    }
                }
            }
        }"#;

        let parsed: EasySlipResponse = serde_json::from_str(body).unwrap();
        let slip = VerifiedSlip::try_from(parsed).unwrap();
        assert_eq!(slip.amount, 25_050);
        assert_eq!(slip.transaction_ref, "015073144041ATF00999");
        assert_eq!(slip.receiver_account, "xxx-x-x5678-x");
    }

    #[test]
    fn test_missing_bank_account_rejected() {
        let body = r#"{
            "data": {
                "transRef": "ref",
                "amount": { "amount": 10 },
                "receiver": { "account": { "proxy": { "type": "MSISDN" } } }
            }
        }"#;

        let parsed: EasySlipResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(
            VerifiedSlip::try_from(parsed),
            Err(AppError::BadRequest(_))
        ));
    }
}
