use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{MessagingGateway, NotifyError};
use crate::config::SmsSettings;

#[derive(Deserialize)]
struct MessageResource {
    sid: String,
}

/// Twilio Programmable Messaging client.
pub struct TwilioClient {
    client: reqwest::Client,
    messages_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl TwilioClient {
    pub fn new(settings: &SmsSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let messages_url = format!(
            "{}/Accounts/{}/Messages.json",
            settings.api_base.trim_end_matches('/'),
            settings.account_sid
        );
        Ok(Self {
            client,
            messages_url,
            account_sid: settings.account_sid.clone(),
            auth_token: settings.auth_token.clone(),
            from_number: settings.from_number.clone(),
        })
    }
}

#[async_trait]
impl MessagingGateway for TwilioClient {
    async fn send(&self, to: &str, body: &str) -> Result<String, NotifyError> {
        let form = [("To", to), ("From", self.from_number.as_str()), ("Body", body)];
        let response = self
            .client
            .post(&self.messages_url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let message: MessageResource = serde_json::from_str(&text)
            .map_err(|e| NotifyError::Malformed(format!("{e}: {text}")))?;
        Ok(message.sid)
    }
}
