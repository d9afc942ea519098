use async_trait::async_trait;
use common::{env_config::MailConfig, error::Res};
use log::info;
use mailer::{MailClient, TemplateData, templates};

use crate::{domain::ReminderPayload, ports::NotificationSender};

/// Renders the reminder template and sends it through the mail API.
pub struct EmailNotificationSender {
    client: MailClient,
    account_settings_url: String,
    support_url: String,
}

impl EmailNotificationSender {
    pub fn new(client: MailClient, account_settings_url: String, support_url: String) -> Self {
        EmailNotificationSender {
            client,
            account_settings_url,
            support_url,
        }
    }

    pub fn from_config(config: &MailConfig) -> Self {
        EmailNotificationSender::new(
            MailClient::new(
                config.api_url.clone(),
                config.api_key.clone(),
                config.from.clone(),
            ),
            config.account_settings_url.clone(),
            config.support_url.clone(),
        )
    }

    fn template_data(&self, payload: &ReminderPayload) -> TemplateData {
        TemplateData {
            user_name: payload.owner_name.clone(),
            subscription_name: payload.subscription_name.clone(),
            renewal_date: payload.formatted_renewal_date.clone(),
            plan_name: payload.subscription_name.clone(),
            price: payload.price.clone(),
            payment_method: payload.payment_method.clone(),
            account_settings_link: self.account_settings_url.clone(),
            support_link: self.support_url.clone(),
            days_left: payload.days_left,
        }
    }
}

#[async_trait]
impl NotificationSender for EmailNotificationSender {
    async fn send(&self, payload: &ReminderPayload) -> Res<()> {
        let email = templates::render(&self.template_data(payload));
        self.client.send(&payload.to, &email, &payload.label).await?;
        info!(
            "Sent '{}' for {} to {}",
            templates::reminder_type(payload.days_left),
            payload.subscription_name,
            payload.to
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn template_uses_payload_and_links() {
        let sender = EmailNotificationSender::new(
            MailClient::new(
                "http://localhost/emails".to_string(),
                "key".to_string(),
                "SubTrack <noreply@example.com>".to_string(),
            ),
            "https://example.com/account".to_string(),
            "https://example.com/support".to_string(),
        );
        let payload = ReminderPayload {
            to: "ada@example.com".to_string(),
            owner_name: "Ada".to_string(),
            subscription_name: "Spotify".to_string(),
            renewal_date: Utc.with_ymd_and_hms(2026, 3, 4, 0, 0, 0).unwrap(),
            formatted_renewal_date: "Mar 4, 2026".to_string(),
            price: "EUR 9.99 (monthly)".to_string(),
            payment_method: "Visa".to_string(),
            days_left: 1,
            label: "Reminder-x-1".to_string(),
        };

        let data = sender.template_data(&payload);
        assert_eq!(data.renewal_date, "Mar 4, 2026");
        assert_eq!(data.support_link, "https://example.com/support");
        assert_eq!(
            templates::render(&data).subject,
            "Final Reminder: Spotify Renews Tomorrow!"
        );
    }
}
