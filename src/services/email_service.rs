use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::config::{env_opt, env_or, env_parse};
use crate::models::WeeklyReport;

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";

const WEEKLY_REPORT_TEMPLATE: &str = include_str!("../templates/email/weekly_report.html");
const VERIFY_EMAIL_TEMPLATE: &str = include_str!("../templates/email/verify_email.html");
const PASSWORD_RESET_TEMPLATE: &str = include_str!("../templates/email/password_reset.html");

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub sendgrid_api_key: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_email: String,
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            sendgrid_api_key: None,
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            from_email: "noreply@punchtracker.app".to_string(),
            from_name: "PunchTracker".to_string(),
        }
    }
}

impl EmailConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            sendgrid_api_key: env_opt("SENDGRID_API_KEY"),
            smtp_host: env_opt("SMTP_HOST"),
            smtp_port: env_parse("SMTP_PORT", defaults.smtp_port),
            smtp_username: env_opt("SMTP_USERNAME"),
            smtp_password: env_opt("SMTP_PASSWORD"),
            from_email: env_or("FROM_EMAIL", &defaults.from_email),
            from_name: env_or("FROM_NAME", &defaults.from_name),
        }
    }
}

#[derive(Error, Debug)]
pub enum EmailError {
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
    #[error("Failed to build email: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("SendGrid rejected the message with status {0}")]
    SendGrid(u16),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// How a message actually left the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailTransport {
    SendGrid,
    Smtp,
    LogOnly,
}

/// Rendered message ready for delivery
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

pub struct EmailService {
    config: EmailConfig,
    http: reqwest::Client,
    smtp: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailService")
            .field("transport", &self.transport())
            .field("from_email", &self.config.from_email)
            .finish()
    }
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        let smtp = match config.smtp_host.as_deref() {
            Some(host) if config.sendgrid_api_key.is_none() => {
                match AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host) {
                    Ok(builder) => {
                        let mut builder = builder.port(config.smtp_port).timeout(Some(Duration::from_secs(10)));
                        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
                            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
                        }
                        Some(builder.build())
                    }
                    Err(e) => {
                        tracing::warn!("SMTP relay {} unusable, emails will only be logged: {}", host, e);
                        None
                    }
                }
            }
            _ => None,
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self { config, http, smtp }
    }

    pub fn transport(&self) -> EmailTransport {
        if self.config.sendgrid_api_key.is_some() {
            EmailTransport::SendGrid
        } else if self.smtp.is_some() {
            EmailTransport::Smtp
        } else {
            EmailTransport::LogOnly
        }
    }

    /// SendGrid when an API key is configured, SMTP when a host is, otherwise
    /// the message is logged and counted as delivered.
    pub async fn send(&self, to_email: &str, email: &RenderedEmail) -> Result<EmailTransport, EmailError> {
        match self.transport() {
            EmailTransport::SendGrid => self.send_via_sendgrid(to_email, email).await?,
            EmailTransport::Smtp => self.send_via_smtp(to_email, email).await?,
            EmailTransport::LogOnly => {
                tracing::info!(
                    to = to_email,
                    subject = %email.subject,
                    "No email transport configured, message logged only"
                );
            }
        }

        Ok(self.transport())
    }

    async fn send_via_sendgrid(&self, to_email: &str, email: &RenderedEmail) -> Result<(), EmailError> {
        let api_key = self.config.sendgrid_api_key.as_deref().unwrap_or_default();

        let payload = json!({
            "personalizations": [{"to": [{"email": to_email}]}],
            "from": {"email": self.config.from_email, "name": self.config.from_name},
            "subject": email.subject,
            "content": [{"type": "text/html", "value": email.html}],
        });

        let response = self
            .http
            .post(SENDGRID_URL)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        if response.status().as_u16() != 202 {
            return Err(EmailError::SendGrid(response.status().as_u16()));
        }

        tracing::info!(to = to_email, "Email sent via SendGrid");
        Ok(())
    }

    async fn send_via_smtp(&self, to_email: &str, email: &RenderedEmail) -> Result<(), EmailError> {
        let Some(mailer) = &self.smtp else {
            return Ok(());
        };

        let from = format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse::<Mailbox>()
            .map_err(|_| EmailError::InvalidAddress(self.config.from_email.clone()))?;
        let to = to_email
            .parse::<Mailbox>()
            .map_err(|_| EmailError::InvalidAddress(to_email.to_string()))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(email.html.clone())?;

        mailer.send(message).await?;

        tracing::info!(to = to_email, "Email sent via SMTP");
        Ok(())
    }
}

/// Replace `{{key}}` placeholders; values are HTML-escaped.
pub fn render_template(template: &str, vars: &[(&str, String)]) -> String {
    let mut rendered = template.to_string();
    for (key, value) in vars {
        rendered = rendered.replace(&format!("{{{{{}}}}}", key), &escape_html(value));
    }
    rendered
}

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub fn weekly_report_email(username: &str, report: &WeeklyReport) -> RenderedEmail {
    RenderedEmail {
        subject: format!("Weekly Punch Report - {}", username),
        html: render_template(
            WEEKLY_REPORT_TEMPLATE,
            &[
                ("username", username.to_string()),
                ("week_start", report.week_start.format("%Y-%m-%d").to_string()),
                ("week_end", report.week_end.format("%Y-%m-%d").to_string()),
                ("total_punches", report.total_punches.to_string()),
                ("avg_speed", format!("{:.2}", report.avg_speed)),
                ("workouts_count", report.workouts_count.to_string()),
                ("best_session_punches", report.best_session_punches.to_string()),
                ("change_percent", format!("{:+.1}", report.change_percent)),
            ],
        ),
    }
}

pub fn verify_email_email(username: &str, action_url: &str, ttl_minutes: i64) -> RenderedEmail {
    RenderedEmail {
        subject: "Verify Your Email - PunchTracker".to_string(),
        html: render_template(
            VERIFY_EMAIL_TEMPLATE,
            &[
                ("username", username.to_string()),
                ("action_url", action_url.to_string()),
                ("ttl_minutes", ttl_minutes.to_string()),
            ],
        ),
    }
}

pub fn password_reset_email(username: &str, action_url: &str, ttl_minutes: i64) -> RenderedEmail {
    RenderedEmail {
        subject: "Reset Your Password - PunchTracker".to_string(),
        html: render_template(
            PASSWORD_RESET_TEMPLATE,
            &[
                ("username", username.to_string()),
                ("action_url", action_url.to_string()),
                ("ttl_minutes", ttl_minutes.to_string()),
            ],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_render_template_escapes_values() {
        let rendered = render_template("Hi {{name}}, {{name}}!", &[("name", "<b>Ali</b>".to_string())]);
        assert_eq!(rendered, "Hi &lt;b&gt;Ali&lt;/b&gt;, &lt;b&gt;Ali&lt;/b&gt;!");
    }

    #[test]
    fn test_weekly_report_email() {
        let report = WeeklyReport {
            total_punches: 1250,
            avg_speed: 21.456,
            workouts_count: 4,
            best_session_punches: 480,
            change_percent: 12.5,
            week_start: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            week_end: Utc.with_ymd_and_hms(2024, 5, 8, 9, 0, 0).unwrap(),
        };

        let email = weekly_report_email("rocky", &report);
        assert_eq!(email.subject, "Weekly Punch Report - rocky");
        assert!(email.html.contains("Hello rocky"));
        assert!(email.html.contains("1250"));
        assert!(email.html.contains("21.46 mph"));
        assert!(email.html.contains("+12.5%"));
        assert!(email.html.contains("2024-05-01 to 2024-05-08"));
        assert!(!email.html.contains("{{"));
    }

    #[test]
    fn test_action_emails_embed_link() {
        let email = verify_email_email("rocky", "http://localhost:3000/auth/verify?token=abc", 60);
        assert!(email.html.contains("href=\"http://localhost:3000/auth/verify?token=abc\""));
        assert!(email.html.contains("expire in 60 minutes"));

        let email = password_reset_email("rocky", "http://localhost:3000/auth/reset?token=xyz", 30);
        assert_eq!(email.subject, "Reset Your Password - PunchTracker");
        assert!(email.html.contains("token=xyz"));
    }

    #[test]
    fn test_transport_selection() {
        assert_eq!(EmailService::new(EmailConfig::default()).transport(), EmailTransport::LogOnly);

        let sendgrid = EmailConfig {
            sendgrid_api_key: Some("SG.key".to_string()),
            ..EmailConfig::default()
        };
        assert_eq!(EmailService::new(sendgrid).transport(), EmailTransport::SendGrid);
    }

    #[tokio::test]
    async fn test_log_only_delivery_succeeds() {
        let service = EmailService::new(EmailConfig::default());
        let email = verify_email_email("rocky", "http://localhost/verify", 60);

        assert_eq!(service.send("rocky@example.com", &email).await.unwrap(), EmailTransport::LogOnly);
    }
}
