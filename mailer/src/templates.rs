/// Values substituted into a reminder e-mail.
#[derive(Debug, Clone)]
pub struct TemplateData {
    pub user_name: String,
    pub subscription_name: String,
    /// Already formatted, e.g. `Mar 4, 2026`.
    pub renewal_date: String,
    pub plan_name: String,
    /// e.g. `USD 9.99 (monthly)`.
    pub price: String,
    pub payment_method: String,
    pub account_settings_link: String,
    pub support_link: String,
    pub days_left: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

/// Label of the reminder type sent `days_left` days before renewal.
pub fn reminder_type(days_left: u32) -> String {
    format!("{} days before reminder", days_left)
}

pub fn render(data: &TemplateData) -> RenderedEmail {
    RenderedEmail {
        subject: subject(data),
        html: body(data),
    }
}

fn subject(data: &TemplateData) -> String {
    match data.days_left {
        0 => format!("Today: Your {} Subscription Renews!", data.subscription_name),
        1 => format!("Final Reminder: {} Renews Tomorrow!", data.subscription_name),
        n if n <= 2 => format!(
            "Reminder: {} Renews in {} Days. Action may be required",
            data.subscription_name, n
        ),
        n => format!(
            "Reminder: Your {} Subscription Renews in {} Days!",
            data.subscription_name, n
        ),
    }
}

fn when(days_left: u32) -> String {
    match days_left {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        n => format!("in {} days", n),
    }
}

fn body(data: &TemplateData) -> String {
    format!(
        r#"<div style="font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 0; background-color: #f4f7fa;">
  <table cellpadding="0" cellspacing="0" border="0" width="100%" style="background-color: #ffffff; border-radius: 10px; overflow: hidden;">
    <tr>
      <td style="background-color: #4a90e2; text-align: center; padding: 24px; color: #ffffff; font-size: 22px;">SubTrack</td>
    </tr>
    <tr>
      <td style="padding: 32px 30px;">
        <p style="font-size: 16px; margin-bottom: 25px;">Hello <strong style="color: #4a90e2;">{user_name}</strong>,</p>
        <p style="font-size: 16px; margin-bottom: 25px;">Your <strong>{subscription_name}</strong> subscription is set to renew on <strong style="color: #4a90e2;">{renewal_date}</strong> ({when}).</p>
        <table cellpadding="15" cellspacing="0" border="0" width="100%" style="background-color: #f0f7ff; border-radius: 10px; margin-bottom: 25px;">
          <tr><td style="font-size: 16px; border-bottom: 1px solid #d0e3ff;"><strong>Plan:</strong> {plan_name}</td></tr>
          <tr><td style="font-size: 16px; border-bottom: 1px solid #d0e3ff;"><strong>Price:</strong> {price}</td></tr>
          <tr><td style="font-size: 16px;"><strong>Payment Method:</strong> {payment_method}</td></tr>
        </table>
        <p style="font-size: 16px; margin-bottom: 25px;">If you'd like to make changes or cancel your subscription, please visit your <a href="{account_settings_link}" style="color: #4a90e2; text-decoration: none;">account settings</a> before the renewal date.</p>
        <p style="font-size: 16px; margin-top: 30px;">Need help? <a href="{support_link}" style="color: #4a90e2; text-decoration: none;">Contact our support team</a> anytime.</p>
        <p style="font-size: 16px; margin-top: 30px;">Best regards,<br><strong>The SubTrack Team</strong></p>
      </td>
    </tr>
  </table>
</div>"#,
        user_name = escape(&data.user_name),
        subscription_name = escape(&data.subscription_name),
        renewal_date = escape(&data.renewal_date),
        when = when(data.days_left),
        plan_name = escape(&data.plan_name),
        price = escape(&data.price),
        payment_method = escape(&data.payment_method),
        account_settings_link = escape(&data.account_settings_link),
        support_link = escape(&data.support_link),
    )
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn data(days_left: u32) -> TemplateData {
        TemplateData {
            user_name: "Ada".to_string(),
            subscription_name: "Netflix Premium".to_string(),
            renewal_date: "Mar 4, 2026".to_string(),
            plan_name: "Netflix Premium".to_string(),
            price: "USD 15.49 (monthly)".to_string(),
            payment_method: "Credit Card".to_string(),
            account_settings_link: "https://example.com/settings".to_string(),
            support_link: "https://example.com/support".to_string(),
            days_left,
        }
    }

    #[rstest]
    #[case(7, "Reminder: Your Netflix Premium Subscription Renews in 7 Days!")]
    #[case(5, "Reminder: Your Netflix Premium Subscription Renews in 5 Days!")]
    #[case(2, "Reminder: Netflix Premium Renews in 2 Days. Action may be required")]
    #[case(1, "Final Reminder: Netflix Premium Renews Tomorrow!")]
    #[case(0, "Today: Your Netflix Premium Subscription Renews!")]
    fn subject_depends_on_days_left(#[case] days: u32, #[case] expected: &str) {
        assert_eq!(render(&data(days)).subject, expected);
    }

    #[test]
    fn body_contains_plan_details() {
        let html = render(&data(5)).html;
        assert!(html.contains("Mar 4, 2026"));
        assert!(html.contains("USD 15.49 (monthly)"));
        assert!(html.contains("Credit Card"));
        assert!(html.contains("in 5 days"));
        assert!(html.contains("https://example.com/support"));
    }

    #[test]
    fn user_supplied_text_is_escaped() {
        let mut d = data(7);
        d.subscription_name = "<script>alert('x')</script>".to_string();
        let html = render(&d).html;
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
    }

    #[test]
    fn reminder_type_label() {
        assert_eq!(reminder_type(7), "7 days before reminder");
    }
}
