use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use uuid::Uuid;

use crate::config::Config;
use crate::error::DeliveryError;
use crate::services::delivery::{DeliveryGateway, MealReminder, WeeklySummary};

pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    app_name: String,
}

impl EmailService {
    /// Returns None if SMTP is not fully configured.
    pub fn new(config: &Config) -> Option<Self> {
        let host = config.smtp_host.as_deref()?;
        let username = config.smtp_username.clone()?;
        let password = config.smtp_password.clone()?;
        let from_addr = config.smtp_from.as_deref()?;

        let port = config.smtp_port.unwrap_or(587);
        let creds = Credentials::new(username, password);

        let transport = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .ok()?
                .credentials(creds)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .ok()?
                .port(port)
                .credentials(creds)
                .build()
        };

        let from: Mailbox = from_addr.parse().ok()?;

        Some(Self {
            transport,
            from,
            app_name: config.app_name.clone(),
        })
    }

    /// Probe the SMTP server.
    pub async fn verify_connection(&self) -> bool {
        match self.transport.test_connection().await {
            Ok(ok) => ok,
            Err(e) => {
                tracing::warn!("SMTP connection check failed: {e}");
                false
            }
        }
    }

    // ─── Private helpers ─────────────────────────────────────────────────────

    fn new_message_id(&self) -> String {
        format!("<{}@{}>", Uuid::new_v4(), self.from.email.domain())
    }

    fn recipient(address: &str, name: &str) -> Result<Mailbox, DeliveryError> {
        format!("{name} <{address}>")
            .parse::<Mailbox>()
            .or_else(|_| address.parse::<Mailbox>())
            .map_err(|_| DeliveryError::InvalidAddress(address.to_string()))
    }

    /// Wraps inner HTML content in the branded email layout.
    fn wrap_html(app_name: &str, content: &str) -> String {
        let app_name = escape_html(app_name);
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width,initial-scale=1">
  <title>{app_name}</title>
</head>
<body style="margin:0;padding:0;background-color:#f1f5f9;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,Helvetica,Arial,sans-serif">
  <table role="presentation" width="100%" cellpadding="0" cellspacing="0" style="background-color:#f1f5f9;padding:40px 16px">
    <tr>
      <td align="center">
        <table role="presentation" width="100%" cellpadding="0" cellspacing="0" style="max-width:560px">
          <tr>
            <td align="center" style="padding-bottom:28px">
              <p style="margin:0;font-size:20px;font-weight:700;color:#0f172a;text-align:center">{app_name}</p>
            </td>
          </tr>
          <tr>
            <td style="background:#ffffff;border-radius:12px;padding:40px;box-shadow:0 1px 3px rgba(0,0,0,0.08),0 8px 24px rgba(0,0,0,0.04)">
              {content}
            </td>
          </tr>
        </table>
      </td>
    </tr>
  </table>
</body>
</html>"#
        )
    }

    async fn send_email(
        &self,
        to: Mailbox,
        subject: &str,
        text: &str,
        html: &str,
    ) -> anyhow::Result<()> {
        let from = Mailbox::new(Some(self.app_name.clone()), self.from.email.clone());
        let email = Message::builder()
            .message_id(Some(self.new_message_id()))
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html.to_string()),
                    ),
            )
            .context("Failed to build email message")?;

        self.transport
            .send(email)
            .await
            .context("Failed to send email")?;

        Ok(())
    }
}

/// Escape text for insertion into HTML element content or attribute values.
fn escape_html(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#x27;"),
            _ => output.push(ch),
        }
    }
    output
}

fn meal_reminder_body(r: &MealReminder) -> (String, String, String) {
    let meal = r.category.label().to_lowercase();
    let subject = format!("Time for your {meal}: {}", r.recipe_name);

    let ingredients_text = r
        .ingredients
        .iter()
        .map(|i| format!("- {i}"))
        .collect::<Vec<_>>()
        .join("\n");
    let text = format!(
        "Hi {},\n\n\
        Your {meal} is planned for {} at {}: {}.\n\n\
        {}\n\n\
        Ingredients:\n{ingredients_text}",
        r.user_name, r.day_name, r.meal_time, r.recipe_name, r.description
    );

    let ingredients_html: String = r
        .ingredients
        .iter()
        .map(|i| format!(r#"<li style="margin:0 0 4px 0">{}</li>"#, escape_html(i)))
        .collect();
    let steps_html: String = r
        .instructions
        .iter()
        .map(|s| format!(r#"<li style="margin:0 0 6px 0">{}</li>"#, escape_html(s)))
        .collect();
    let content = format!(
        r#"<h1 style="margin:0 0 8px 0;font-size:22px;font-weight:700;color:#0f172a">{recipe}</h1>
<p style="margin:0 0 20px 0;font-size:15px;color:#64748b;line-height:1.6">Hi <strong style="color:#334155">{user}</strong>, your {meal} is planned for <strong style="color:#334155">{day} at {time}</strong>.</p>
<p style="margin:0 0 20px 0;font-size:15px;color:#374151;line-height:1.6">{description}</p>
<h2 style="margin:0 0 8px 0;font-size:16px;color:#0f172a">Ingredients</h2>
<ul style="margin:0 0 20px 18px;padding:0;font-size:14px;color:#374151">{ingredients_html}</ul>
<h2 style="margin:0 0 8px 0;font-size:16px;color:#0f172a">Steps</h2>
<ol style="margin:0 0 0 18px;padding:0;font-size:14px;color:#374151">{steps_html}</ol>"#,
        recipe = escape_html(&r.recipe_name),
        user = escape_html(&r.user_name),
        day = escape_html(&r.day_name),
        time = escape_html(&r.meal_time),
        description = escape_html(&r.description),
    );

    (subject, text, content)
}

fn weekly_summary_body(s: &WeeklySummary) -> (String, String, String) {
    let subject = format!("Your weekly menu: {}", s.title);

    let mut text = format!(
        "Hi {},\n\nHere is your menu from {} to {}:\n",
        s.user_name,
        s.week_start.format("%d/%m/%Y"),
        s.week_end.format("%d/%m/%Y")
    );
    let mut rows = String::new();
    for day in &s.days {
        text.push_str(&format!("\n{} ({})\n", day.day_name, day.date.format("%d/%m")));
        rows.push_str(&format!(
            r#"<tr><td colspan="2" style="padding:14px 0 6px 0;font-size:15px;font-weight:700;color:#0f172a">{} <span style="font-weight:400;color:#94a3b8">{}</span></td></tr>"#,
            escape_html(&day.day_name),
            day.date.format("%d/%m")
        ));
        for meal in &day.meals {
            let name = meal.recipe_name.as_deref().unwrap_or("-");
            text.push_str(&format!("  {}: {name}\n", meal.meal));
            rows.push_str(&format!(
                r#"<tr><td style="padding:4px 12px 4px 0;font-size:14px;color:#64748b;width:110px">{}</td><td style="padding:4px 0;font-size:14px;color:#0f172a">{}</td></tr>"#,
                meal.meal,
                escape_html(name)
            ));
        }
    }

    let content = format!(
        r#"<h1 style="margin:0 0 8px 0;font-size:22px;font-weight:700;color:#0f172a">{title}</h1>
<p style="margin:0 0 12px 0;font-size:15px;color:#64748b;line-height:1.6">Hi <strong style="color:#334155">{user}</strong>, {planned} meals are planned this week.</p>
<table role="presentation" width="100%" cellpadding="0" cellspacing="0">{rows}</table>"#,
        title = escape_html(&s.title),
        user = escape_html(&s.user_name),
        planned = s.planned_meals(),
    );

    (subject, text, content)
}

#[async_trait]
impl DeliveryGateway for EmailService {
    fn is_configured(&self) -> bool {
        true
    }

    async fn send_meal_reminder(
        &self,
        address: &str,
        reminder: &MealReminder,
    ) -> Result<(), DeliveryError> {
        let to = Self::recipient(address, &reminder.user_name)?;
        let (subject, text, content) = meal_reminder_body(reminder);
        let html = Self::wrap_html(&self.app_name, &content);
        Ok(self.send_email(to, &subject, &text, &html).await?)
    }

    async fn send_weekly_summary(
        &self,
        address: &str,
        summary: &WeeklySummary,
    ) -> Result<(), DeliveryError> {
        let to = Self::recipient(address, &summary.user_name)?;
        let (subject, text, content) = weekly_summary_body(summary);
        let html = Self::wrap_html(&self.app_name, &content);
        Ok(self.send_email(to, &subject, &text, &html).await?)
    }

    async fn send_test(&self, address: &str, user_name: &str) -> Result<(), DeliveryError> {
        let to = Self::recipient(address, user_name)?;
        let subject = format!("Email notifications are working: {}", self.app_name);
        let text = format!(
            "Hi {user_name},\n\n\
            This is a test message. Meal reminders and weekly summaries will arrive at this address."
        );
        let content = format!(
            r#"<h1 style="margin:0 0 8px 0;font-size:22px;font-weight:700;color:#0f172a">Email setup complete</h1>
<p style="margin:0;font-size:15px;color:#64748b;line-height:1.6">Hi <strong style="color:#334155">{}</strong>, meal reminders and weekly summaries will arrive at this address.</p>"#,
            escape_html(user_name)
        );
        let html = Self::wrap_html(&self.app_name, &content);
        Ok(self.send_email(to, &subject, &text, &html).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::week::MealCategory;
    use crate::services::delivery::{SummaryDay, SummaryMeal};
    use chrono::NaiveDate;

    #[test]
    fn reminder_body_mentions_recipe_and_time() {
        let reminder = MealReminder {
            user_name: "Ana".into(),
            category: MealCategory::Lunch,
            recipe_name: "Pollo asado".into(),
            description: "Roast chicken".into(),
            ingredients: vec!["chicken".into(), "lemon".into()],
            instructions: vec!["Roast it".into()],
            meal_time: "13:00".into(),
            day_name: "Friday".into(),
        };
        let (subject, text, html) = meal_reminder_body(&reminder);
        assert_eq!(subject, "Time for your lunch: Pollo asado");
        assert!(text.contains("Friday at 13:00"));
        assert!(text.contains("- lemon"));
        assert!(html.contains("<li style=\"margin:0 0 6px 0\">Roast it</li>"));
    }

    #[test]
    fn summary_body_lists_every_day() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 12).unwrap();
        let summary = WeeklySummary {
            user_name: "Ana".into(),
            title: "Week 42".into(),
            week_start: date,
            week_end: date + chrono::Duration::days(6),
            days: vec![SummaryDay {
                day_name: "Monday".into(),
                date,
                meals: vec![
                    SummaryMeal { meal: "Breakfast", recipe_name: None },
                    SummaryMeal { meal: "Lunch", recipe_name: Some("Soup".into()) },
                ],
            }],
        };
        let (subject, text, html) = weekly_summary_body(&summary);
        assert_eq!(subject, "Your weekly menu: Week 42");
        assert!(text.contains("Lunch: Soup"));
        assert!(html.contains("1 meals are planned"));
    }

    #[test]
    fn user_text_is_escaped_in_html_only() {
        let reminder = MealReminder {
            user_name: "Tom & Jerry".into(),
            category: MealCategory::Dinner,
            recipe_name: "<b>Mac</b> & cheese".into(),
            description: "<script>alert(1)</script>".into(),
            ingredients: vec!["\"elbow\" pasta".into()],
            instructions: vec!["Boil < 10 min".into()],
            meal_time: "20:00".into(),
            day_name: "Friday".into(),
        };
        let (subject, text, html) = meal_reminder_body(&reminder);

        assert!(html.contains("&lt;b&gt;Mac&lt;/b&gt; &amp; cheese"));
        assert!(html.contains("Tom &amp; Jerry"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("&quot;elbow&quot; pasta"));
        assert!(html.contains("Boil &lt; 10 min"));
        assert!(!html.contains("<b>"));
        assert!(!html.contains("<script>"));

        // Plain text and the subject stay verbatim.
        assert_eq!(subject, "Time for your dinner: <b>Mac</b> & cheese");
        assert!(text.contains("Tom & Jerry"));

        let wrapped = EmailService::wrap_html("Eat <well>", &html);
        assert!(wrapped.contains("<title>Eat &lt;well&gt;</title>"));
    }
}
