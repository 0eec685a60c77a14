use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use crate::clients::gateway::{GatewayReceipt, PaymentGateway};
use crate::config::GatewayInfo;
use crate::error::PaymentError;
use crate::models::{GatewayStatus, PaymentMethod, PayoutDestination};

#[derive(Serialize)]
struct ChargeRequest<'a> {
    reference: Uuid,
    amount: i64,
    method: &'a PaymentMethod,
}

#[derive(Serialize)]
struct PayoutRequest<'a> {
    reference: Uuid,
    amount: i64,
    bank_code: &'a str,
    account_number: &'a str,
    account_name: Option<&'a str>,
}

#[derive(Deserialize)]
struct PaygateResponse {
    status: String,
    transaction_id: Option<String>,
    message: Option<String>,
}

/// HTTP client for the Paygate processor. Every dispatch of the same journal
/// entry reuses the entry's reference, which Paygate deduplicates on.
#[derive(Clone)]
pub struct PaygateClient {
    http: Client,
    base_url: Url,
    secret_key: SecretString,
}

impl PaygateClient {
    pub fn new(config: &GatewayInfo) -> Result<Self, PaymentError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PaymentError::Internal(format!("failed to build http client: {e}")))?;
        let base_url = Url::parse(&config.api_url)
            .map_err(|_| PaymentError::Internal("invalid Paygate base URL".into()))?;

        Ok(Self {
            http,
            base_url,
            secret_key: config.secret_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(path);
        url
    }

    async fn submit<T: Serialize>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<GatewayReceipt, PaymentError> {
        let resp = self
            .http
            .post(self.endpoint(path))
            .bearer_auth(self.secret_key.expose_secret())
            .json(payload)
            .send()
            .await?;

        let status = resp.status();
        let body_text = resp.text().await.unwrap_or_default();

        if status.is_server_error() {
            warn!(
                http_status = status.as_u16(),
                response = %body_text.chars().take(200).collect::<String>(),
                "Paygate returned a server error"
            );
            return Err(PaymentError::GatewayTransient(format!(
                "paygate returned {status}"
            )));
        }

        if status.is_client_error() {
            // Definite decline; the outcome is known and final.
            let message = serde_json::from_str::<PaygateResponse>(&body_text)
                .ok()
                .and_then(|b| b.message);
            warn!(
                http_status = status.as_u16(),
                message = message.as_deref().unwrap_or("none"),
                "Paygate declined the request"
            );
            return Ok(GatewayReceipt {
                status: GatewayStatus::Rejected,
                external_id: None,
                message,
            });
        }

        let body: PaygateResponse = serde_json::from_str(&body_text).map_err(|e| {
            error!(
                error = %e,
                response = %body_text.chars().take(200).collect::<String>(),
                "Unreadable Paygate response"
            );
            PaymentError::GatewayTransient("unreadable gateway response".into())
        })?;

        if body.status == "success" {
            Ok(GatewayReceipt {
                status: GatewayStatus::Approved,
                external_id: body.transaction_id,
                message: body.message,
            })
        } else {
            Ok(GatewayReceipt {
                status: GatewayStatus::Rejected,
                external_id: body.transaction_id,
                message: body.message,
            })
        }
    }
}

#[async_trait]
impl PaymentGateway for PaygateClient {
    async fn charge(
        &self,
        reference: Uuid,
        amount: i64,
        method: PaymentMethod,
    ) -> Result<GatewayReceipt, PaymentError> {
        self.submit(
            "charge",
            &ChargeRequest {
                reference,
                amount,
                method: &method,
            },
        )
        .await
    }

    async fn payout(
        &self,
        reference: Uuid,
        amount: i64,
        destination: &PayoutDestination,
    ) -> Result<GatewayReceipt, PaymentError> {
        self.submit(
            "payout",
            &PayoutRequest {
                reference,
                amount,
                bank_code: &destination.bank_code,
                account_number: &destination.account_number,
                account_name: destination.account_name.as_deref(),
            },
        )
        .await
    }
}
