//! WhatsApp alerts via the Twilio REST API.
//!
//! Delivery is fire-and-forget: failures are logged by the caller and never
//! retried. Without configured credentials the notifier only logs, which
//! keeps local development working without a Twilio account.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::Config;

/// Twilio WhatsApp sandbox number.
const FROM_WHATSAPP: &str = "whatsapp:+14155238886";

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Notifier {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

#[derive(Debug)]
struct Credentials {
    account_sid: String,
    auth_token: String,
    to: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
}

impl Notifier {
    pub fn new(config: &Config) -> Self {
        let credentials = match (
            &config.twilio_account_sid,
            &config.twilio_auth_token,
            &config.whatsapp_to_number,
        ) {
            (Some(account_sid), Some(auth_token), Some(to)) => Some(Credentials {
                account_sid: account_sid.clone(),
                auth_token: auth_token.clone(),
                to: to.clone(),
            }),
            _ => {
                warn!("Twilio credentials not configured; alarm notifications will only be logged");
                None
            }
        };

        Self {
            inner: Arc::new(Inner {
                http: Client::new(),
                base_url: config.twilio_base_url.clone(),
                credentials,
            }),
        }
    }

    pub async fn send(&self, message: &str) -> Result<()> {
        let Some(creds) = &self.inner.credentials else {
            info!(message = %message, "Notification (delivery disabled)");
            return Ok(());
        };

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.inner.base_url, creds.account_sid
        );
        let params = [
            ("From", FROM_WHATSAPP),
            ("To", creds.to.as_str()),
            ("Body", message),
        ];

        let resp: MessageResponse = self
            .inner
            .http
            .post(&url)
            .basic_auth(&creds.account_sid, Some(&creds.auth_token))
            .form(&params)
            .timeout(SEND_TIMEOUT)
            .send()
            .await
            .context("Twilio request failed")?
            .error_for_status()
            .context("Twilio returned error status")?
            .json()
            .await
            .context("Failed to deserialize Twilio response")?;

        info!(sid = %resp.sid, "WhatsApp message sent");
        Ok(())
    }
}
