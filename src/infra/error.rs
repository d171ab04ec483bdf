use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store client error: {message}")]
    StoreClient { message: String },
    #[error("admin request failed: {message}")]
    AdminRequest { message: String },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl InfraError {
    pub fn store_client(message: impl Into<String>) -> Self {
        Self::StoreClient {
            message: message.into(),
        }
    }

    pub fn admin_request(message: impl Into<String>) -> Self {
        Self::AdminRequest {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
