use clap::Parser;
use std::time::Duration;
use url::Url;

pub const DEFAULT_DASHBOARD_URL: &str = "https://dashboard.katabump.com";
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Debug)]
pub enum ConfigError {
    MissingCredentials,
    UnsupportedProxyScheme(String),
    InvalidUrl { name: &'static str, source: url::ParseError },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingCredentials => write!(f, "KATA_EMAIL and KATA_PASSWORD must be set"),
            ConfigError::UnsupportedProxyScheme(scheme) => {
                write!(f, "Unsupported proxy scheme '{}', expected socks5:// or socks5h://", scheme)
            }
            ConfigError::InvalidUrl { name, source } => write!(f, "Invalid {}: {}", name, source),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidUrl { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Command line / environment input. Every flag can be supplied through its environment variable.
#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "Renew a KataBump server and report the result to Telegram",
    long_about = None
)]
pub struct Args {
    #[clap(long, env = "KATA_SERVER_ID", default_value = "")]
    pub server_id: String,

    #[clap(long, env = "KATA_EMAIL", hide_env_values = true)]
    pub email: Option<String>,

    #[clap(long, env = "KATA_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[clap(long, env = "TG_BOT_TOKEN", hide_env_values = true)]
    pub tg_bot_token: Option<String>,

    #[clap(long, env = "TG_CHAT_ID")]
    pub tg_chat_id: Option<String>,

    /// Label naming the scheduler that triggered this run.
    #[clap(long, env = "EXECUTOR_NAME", default_value = "GitHub Actions")]
    pub executor_name: String,

    /// socks5:// or socks5h:// proxy, optionally with user:pass@.
    #[clap(long, env = "SOCKS5_PROXY", hide_env_values = true)]
    pub socks5_proxy: Option<String>,

    #[clap(long, env = "KATA_DASHBOARD_URL", default_value = DEFAULT_DASHBOARD_URL)]
    pub dashboard_url: String,

    #[clap(long, env = "TG_API_URL", default_value = DEFAULT_TELEGRAM_API_URL)]
    pub tg_api_url: String,

    /// Timeout applied to every single HTTP call.
    #[clap(long, env = "KATA_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub api_url: Url,
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

/// Validated run configuration, passed to every stage.
#[derive(Debug, Clone)]
pub struct Config {
    pub dashboard_url: Url,
    pub server_id: String,
    pub email: String,
    pub password: String,
    pub executor_name: String,
    pub proxy: Option<String>,
    pub timeout: Duration,
    pub telegram: TelegramConfig,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_base_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim_end_matches('/')).map_err(|source| ConfigError::InvalidUrl { name, source })
}

impl TryFrom<Args> for Config {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let password = args.password.filter(|p| !p.is_empty());
        let (email, password) = match (non_empty(args.email), password) {
            (Some(email), Some(password)) => (email, password),
            _ => return Err(ConfigError::MissingCredentials),
        };

        let proxy = non_empty(args.socks5_proxy);
        if let Some(proxy_url) = &proxy {
            let scheme = proxy_url.split("://").next().unwrap_or_default().to_ascii_lowercase();
            if scheme != "socks5" && scheme != "socks5h" {
                return Err(ConfigError::UnsupportedProxyScheme(scheme));
            }
        }

        Ok(Config {
            dashboard_url: parse_base_url("dashboard url", &args.dashboard_url)?,
            server_id: args.server_id.trim().to_string(),
            email,
            password,
            executor_name: args.executor_name,
            proxy,
            timeout: Duration::from_secs(args.timeout_secs),
            telegram: TelegramConfig {
                api_url: parse_base_url("telegram api url", &args.tg_api_url)?,
                bot_token: non_empty(args.tg_bot_token),
                chat_id: non_empty(args.tg_chat_id),
            },
        })
    }
}

impl Config {
    /// Absolute URL of a dashboard endpoint, e.g. `endpoint("/auth/login")`.
    pub fn endpoint(&self, path_and_query: &str) -> String {
        format!("{}{}", self.dashboard_url.as_str().trim_end_matches('/'), path_and_query)
    }

    pub fn dashboard_origin(&self) -> String {
        self.dashboard_url.origin().unicode_serialization()
    }

    pub fn server_page_url(&self) -> String {
        self.endpoint(&format!("/servers/edit?id={}", self.server_id))
    }

    pub fn renew_url(&self) -> String {
        self.endpoint(&format!("/api-client/renew?id={}", self.server_id))
    }
}
