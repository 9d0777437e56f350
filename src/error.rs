use thiserror::Error;

/// Failures reported by the remote collaborators (order creation, payment
/// initiation and status checks).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// The server answered with a non-success status code.
    #[error("HTTP {status}: {}", .message.as_deref().unwrap_or("no details"))]
    Http { status: u16, message: Option<String> },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Malformed response: {0}")]
    Decode(String),
    /// A scripted adapter ran out of canned responses.
    #[error("No scripted response left for {0}")]
    Exhausted(&'static str),
}

impl GatewayError {
    /// The message the server attached to its error body, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            GatewayError::Http { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    OrderCreation(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A transition was requested that the payment state machine does not allow.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("cannot {action} while {from:?}")]
    InvalidTransition {
        from: crate::domain::payment::PollState,
        action: &'static str,
    },
    #[error("no payment id assigned yet")]
    MissingPaymentId,
    #[error("attempt budget of {0} already spent")]
    BudgetExhausted(u32),
}

pub type Result<T> = std::result::Result<T, CheckoutError>;
