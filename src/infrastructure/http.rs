use crate::config::TrackerConfig;
use crate::domain::payment::PaymentRecord;
use crate::domain::ports::PaymentApi;
use crate::error::{Result, TrackerError};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

/// REST client for the admin backend.
///
/// The API token is attached as a bearer token; do not log it.
#[derive(Debug, Clone)]
pub struct HttpPaymentApi {
    http: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

/// The backend answers either with the bare record or wrapped in `data`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordEnvelope {
    Wrapped { data: PaymentRecord },
    Bare(PaymentRecord),
}

impl From<RecordEnvelope> for PaymentRecord {
    fn from(envelope: RecordEnvelope) -> Self {
        match envelope {
            RecordEnvelope::Wrapped { data } => data,
            RecordEnvelope::Bare(record) => record,
        }
    }
}

impl HttpPaymentApi {
    pub fn new(config: &TrackerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    fn payment_url(&self, payment_id: &str) -> String {
        format!("{}/payments/{}", self.base_url, payment_id)
    }

    fn query_url(&self) -> String {
        format!("{}/payments/mpesa/query", self.base_url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl PaymentApi for HttpPaymentApi {
    async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentRecord> {
        let resp = self
            .authorize(self.http.get(self.payment_url(payment_id)))
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(TrackerError::NotFound(payment_id.to_string()));
        }
        let envelope: RecordEnvelope = resp.error_for_status()?.json().await?;
        Ok(envelope.into())
    }

    async fn query_status(&self, tracking_key: &str) -> Result<Value> {
        let resp = self
            .authorize(self.http.post(self.query_url()))
            .json(&json!({ "checkoutRequestId": tracking_key }))
            .send()
            .await?;

        Ok(resp.error_for_status()?.json().await?)
    }
}
