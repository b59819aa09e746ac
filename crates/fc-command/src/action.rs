//! Closed command action table.

use chrono::{DateTime, Utc};
use fc_common::Token;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SmsRawPayload {
    pub deidentified_phone_number: Token,
    pub created_on: DateTime<Utc>,
    pub text: String,
    pub direction: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CommandAction {
    SendToMultiIds {
        ids: Vec<Token>,
        text: String,
    },
    SendMessagesToIds {
        ids: Vec<Token>,
        messages: Vec<String>,
    },
    AddOpinion {
        namespace: String,
        #[serde(default)]
        opinion: Value,
        source: String,
        #[serde(rename = "_authenticatedUserEmail", default)]
        authenticated_user_email: Option<String>,
        #[serde(rename = "_authenticatedUserDisplayName", default)]
        authenticated_user_display_name: Option<String>,
    },
    SmsFromRapidpro {
        sms_raw: SmsRawPayload,
    },
}
