//! Thin RapidPro REST client implementing both gateway traits the bridge
//! needs: `RapidProGateway::fetch` for the inbound poller and
//! `SmsGateway::send` for the outbound dispatcher. Both share one
//! `reqwest::Client` built once per configured timeout pair, with a
//! default 10-minute request timeout, rather than one per call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fc_inbound::{GatewayError, InboundSms, RapidProGateway};
use fc_outbound::{SendError, SmsGateway};
use serde::Deserialize;
use std::time::Duration;

#[derive(Clone)]
pub struct RapidProClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl RapidProClient {
    pub fn new(
        base_url: String,
        token: String,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }
}

#[derive(Debug, Deserialize)]
struct MessagesPage {
    results: Vec<RapidProMessage>,
}

#[derive(Debug, Deserialize)]
struct RapidProMessage {
    urn: String,
    text: String,
    created_on: DateTime<Utc>,
    direction: String,
}

#[async_trait]
impl RapidProGateway for RapidProClient {
    async fn fetch(
        &self,
        created_after_inclusive: DateTime<Utc>,
    ) -> std::result::Result<Vec<InboundSms>, GatewayError> {
        let url = format!("{}/api/v2/messages.json", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.token))
            .query(&[
                ("after", created_after_inclusive.to_rfc3339()),
                ("direction", "in".to_string()),
            ])
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        if response.status().is_client_error() && response.status().as_u16() != 429 {
            return Err(GatewayError::Fatal(format!(
                "RapidPro rejected the fetch request: {}",
                response.status()
            )));
        }
        if !response.status().is_success() {
            return Err(GatewayError::Transient(format!(
                "RapidPro fetch returned {}",
                response.status()
            )));
        }

        let page: MessagesPage = response
            .json()
            .await
            .map_err(|e| GatewayError::Transient(format!("malformed RapidPro response: {e}")))?;

        Ok(page
            .results
            .into_iter()
            .map(|m| InboundSms {
                address: m.urn,
                created_on: m.created_on,
                text: m.text,
                direction: m.direction,
            })
            .collect())
    }
}

#[derive(serde::Serialize)]
struct BroadcastRequest<'a> {
    text: &'a str,
    urns: &'a [String],
    interrupt: bool,
}

#[async_trait]
impl SmsGateway for RapidProClient {
    async fn send(&self, text: &str, group: &[String], interrupt: bool) -> std::result::Result<(), SendError> {
        let url = format!("{}/api/v2/broadcasts.json", self.base_url);
        let body = BroadcastRequest {
            text,
            urns: group,
            interrupt,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.token))
            .json(&body)
            .send()
            .await
            .map_err(|e| SendError::Http(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status.as_u16() == 400 {
            return Err(SendError::BadRequest(format!("RapidPro rejected broadcast: {status}")));
        }
        if status.as_u16() == 429 {
            return Err(SendError::RateExceeded(format!("RapidPro throttled broadcast: {status}")));
        }
        Err(SendError::Http(format!("RapidPro broadcast failed: {status}")))
    }
}

fn classify_reqwest_error(error: &reqwest::Error) -> GatewayError {
    if error.is_timeout() || error.is_connect() {
        GatewayError::Transient(error.to_string())
    } else {
        GatewayError::Transient(error.to_string())
    }
}
