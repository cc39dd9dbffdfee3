use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("validation - {0}")]
    Validation(String),
    #[error("not_found - {0}")]
    NotFound(String),
    #[error("store - {0}")]
    Store(String),
    #[error("delivery - {0}")]
    Delivery(String),
    #[error("config - {0}")]
    Config(String),
    #[error("client - {0}")]
    Client(String),
    #[error("io_error - {0}")]
    Io(String),
}

impl AppError {
    pub fn validation<M: Into<String>>(message: M) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found<M: Into<String>>(message: M) -> Self {
        Self::NotFound(message.into())
    }

    pub fn store<M: Into<String>>(message: M) -> Self {
        Self::Store(message.into())
    }

    pub fn delivery<M: Into<String>>(message: M) -> Self {
        Self::Delivery(message.into())
    }

    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::Config(message.into())
    }

    pub fn client<M: Into<String>>(message: M) -> Self {
        Self::Client(message.into())
    }

    pub fn io<M: Into<String>>(message: M) -> Self {
        Self::Io(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Store(_) => "store",
            Self::Delivery(_) => "delivery",
            Self::Config(_) => "config",
            Self::Client(_) => "client",
            Self::Io(_) => "io_error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation(message)
            | Self::NotFound(message)
            | Self::Store(message)
            | Self::Delivery(message)
            | Self::Config(message)
            | Self::Client(message)
            | Self::Io(message) => message,
        }
    }
}
