use crate::config::ConfigError;
use crate::network_client::NetworkError;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Auth(String),
    Captcha(String),
    Network(NetworkError),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "Configuration error: {}", err),
            AppError::Auth(msg) => write!(f, "Login failed: {}", msg),
            AppError::Captcha(msg) => write!(f, "Captcha detected: {}", msg),
            AppError::Network(err) => write!(f, "Network error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Network(err) => Some(err),
            AppError::Auth(_) | AppError::Captcha(_) => None,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<NetworkError> for AppError {
    fn from(err: NetworkError) -> Self {
        AppError::Network(err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(NetworkError::from(err))
    }
}
