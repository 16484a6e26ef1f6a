use color_eyre::Result;
use dotenv::dotenv;
use eyre::WrapErr;
use serde::Deserialize;
use tracing::info;

fn default_ttl_secs() -> u64 {
    600
}

fn default_max_attempts() -> u32 {
    5
}

fn default_resend_cooldown_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub platform_name: String,

    pub smtp_host: Option<String>,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
    pub smtp_from: Option<String>,
    /// Secondary delivery backend, hit when SMTP fails.
    pub otp_relay_url: Option<String>,

    /// When set, a code that could not be delivered is echoed back in the
    /// response body. Must stay off in production.
    #[serde(default)]
    pub dev_mode: bool,
    #[serde(default = "default_ttl_secs")]
    pub otp_ttl_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub otp_max_attempts: u32,
    #[serde(default = "default_resend_cooldown_secs")]
    pub otp_resend_cooldown_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        info!("Initializing configuration");
        let settings = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .wrap_err("Building configuration")?;

        settings
            .try_deserialize()
            .wrap_err("loading configuration from environment")
    }
}
