use std::fs;

use color_eyre::Result;
use eyre::{WrapErr, eyre};
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::config::Config;
use crate::models::otp::OtpPurpose;

const OTP_TEMPLATE: &str = "templates/otp_email.html";

pub struct EmailService {
    mailer: Option<AsyncSmtpTransport<Tokio1Executor>>,
    relay_url: Option<String>,
    http: reqwest::Client,
    from_address: Option<String>,
    platform_name: String,
}

impl EmailService {
    pub fn from_config(config: &Config) -> Result<Self> {
        let mailer = match (&config.smtp_host, &config.smtp_user, &config.smtp_pass) {
            (Some(host), Some(user), Some(pass)) => {
                let creds = Credentials::new(user.clone(), pass.clone());
                Some(
                    AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                        .wrap_err("Building SMTP transport")?
                        .credentials(creds)
                        .build(),
                )
            }
            _ => {
                info!("SMTP not configured; codes will not be emailed");
                None
            }
        };

        Ok(Self {
            mailer,
            relay_url: config.otp_relay_url.clone(),
            http: reqwest::Client::new(),
            from_address: config.smtp_from.clone().or_else(|| config.smtp_user.clone()),
            platform_name: config.platform_name.clone(),
        })
    }

    /// Log-only service with no transports. What `from_config` builds when
    /// nothing is configured, spelled out for tests.
    pub fn disabled(platform_name: impl Into<String>) -> Self {
        Self {
            mailer: None,
            relay_url: None,
            http: reqwest::Client::new(),
            from_address: None,
            platform_name: platform_name.into(),
        }
    }

    pub fn load_template(&self, path: &str) -> Result<String> {
        let template = fs::read_to_string(path)?;
        Ok(template)
    }

    pub async fn send_email(
        &self,
        to: &str,
        subject: &str,
        template_path: &str,
        data: &Value,
    ) -> Result<()> {
        let mailer = self
            .mailer
            .as_ref()
            .ok_or_else(|| eyre!("SMTP transport not configured"))?;
        let from = self
            .from_address
            .as_deref()
            .ok_or_else(|| eyre!("No from address configured"))?;

        let mut body = self.load_template(template_path)?;
        if let Some(fields) = data.as_object() {
            for (key, value) in fields {
                let placeholder = format!("{{{{{}}}}}", key);
                body = body.replace(&placeholder, value.as_str().unwrap_or_default());
            }
        }

        let email = lettre::Message::builder()
            .from(from.parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body)?;

        mailer.send(email).await?;

        Ok(())
    }

    async fn send_relay(&self, to: &str, code: &str, purpose: OtpPurpose) -> Result<()> {
        let url = self
            .relay_url
            .as_ref()
            .ok_or_else(|| eyre!("Relay transport not configured"))?;

        self.http
            .post(url)
            .json(&serde_json::json!({
                "email": to,
                "otp": code,
                "type": purpose.to_string(),
            }))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    /// Tries SMTP, then the relay. Failure of both is not fatal: the code
    /// stays stored and the caller decides what to tell the user.
    pub async fn deliver_otp(&self, to: &str, name: &str, code: &str, purpose: OtpPurpose) -> bool {
        let data = serde_json::json!({
            "name": if name.is_empty() { "there" } else { name },
            "otp": code,
            "platformName": self.platform_name,
        });

        match self.send_email(to, "Verify Your Email", OTP_TEMPLATE, &data).await {
            Ok(()) => return true,
            Err(err) => warn!(to, error = %err, "primary email delivery failed"),
        }

        match self.send_relay(to, code, purpose).await {
            Ok(()) => true,
            Err(err) => {
                warn!(to, error = %err, "fallback delivery failed; code held for manual verification");
                false
            }
        }
    }
}
