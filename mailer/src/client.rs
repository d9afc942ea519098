use common::error::{AppError, Res};
use log::{info, warn};
use reqwest::Client;
use serde::Serialize;

use crate::templates::RenderedEmail;

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

/// Client for a transactional e-mail API that accepts `{from, to, subject, html}`.
#[derive(Clone)]
pub struct MailClient {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl MailClient {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        MailClient {
            client: Client::new(),
            api_url,
            api_key,
            from,
        }
    }

    /// Sends one e-mail. `idempotency_key` lets the provider drop duplicates
    /// when a send is retried after its result was lost.
    pub async fn send(&self, to: &str, email: &RenderedEmail, idempotency_key: &str) -> Res<()> {
        let request_body = SendEmailRequest {
            from: &self.from,
            to,
            subject: &email.subject,
            html: &email.html,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .header("Idempotency-Key", idempotency_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_response = response
                .json::<serde_json::Value>()
                .await
                .unwrap_or(serde_json::json!({ "message": "Unknown error" }));
            let message = error_response["message"]
                .as_str()
                .unwrap_or("Failed to send e-mail")
                .to_string();
            warn!("E-mail API rejected message to {}: {} {}", to, status, message);
            return Err(AppError::Internal(format!(
                "E-mail API responded {}: {}",
                status, message
            )));
        }

        info!("E-mail '{}' sent to {}", email.subject, to);
        Ok(())
    }
}
