use anyhow::Context;
use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;

use super::{EmailMessage, EmailProvider};

const POSTMARK_URL: &str = "https://api.postmarkapp.com/email";

/// Sends through the Postmark HTTP API. Without an API key it only logs,
/// which keeps local setups free of mail credentials.
pub struct PostmarkEmailProvider {
    api_key: Option<Secret<String>>,
    from_email: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PostmarkEmail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
    text_body: &'a str,
    message_stream: &'a str,
}

impl PostmarkEmailProvider {
    pub fn new(api_key: Option<Secret<String>>, from_email: String) -> Self {
        if api_key.is_none() {
            tracing::warn!("POSTMARK_API_KEY not configured, emails will only be logged");
        }
        Self {
            api_key,
            from_email,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmailProvider for PostmarkEmailProvider {
    async fn send_email(&self, message: &EmailMessage) -> anyhow::Result<()> {
        let Some(api_key) = &self.api_key else {
            tracing::info!(
                to = %message.to,
                subject = %message.subject,
                body = %message.text_body,
                "mock email"
            );
            return Ok(());
        };

        let body = PostmarkEmail {
            from: &self.from_email,
            to: &message.to,
            subject: &message.subject,
            html_body: &message.html_body,
            text_body: &message.text_body,
            message_stream: "outbound",
        };

        self.client
            .post(POSTMARK_URL)
            .header("X-Postmark-Server-Token", api_key.expose_secret())
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .context("failed to send Postmark email")?
            .error_for_status()
            .context("Postmark API returned error")?;

        tracing::info!(to = %message.to, "email sent");
        Ok(())
    }
}
