use async_trait::async_trait;

use super::{Notifier, NotifyError, normalize_phone, prepare_message};
use crate::config::TwilioSettings;

/// SMS gateway backed by the Twilio Messages API
pub struct TwilioNotifier {
    client: reqwest::Client,
    settings: TwilioSettings,
}

impl TwilioNotifier {
    pub fn new(settings: TwilioSettings) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self { client, settings })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.account_sid
        )
    }
}

#[async_trait]
impl Notifier for TwilioNotifier {
    async fn send(&self, phone: &str, message: &str) -> Result<(), NotifyError> {
        let phone = normalize_phone(phone)?;
        let body = prepare_message(message)?;
        let to = format!("{}{}", self.settings.country_code, phone);

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.settings.account_sid, Some(&self.settings.auth_token))
            .form(&[("From", self.settings.from_phone.as_str()), ("To", to.as_str()), ("Body", body)])
            .send()
            .await?;

        match response.status().as_u16() {
            200 | 201 => {
                tracing::debug!(to = %to, "Alert delivered to gateway");
                Ok(())
            }
            status => Err(NotifyError::Rejected(status)),
        }
    }
}
