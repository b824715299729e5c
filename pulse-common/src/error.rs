use std::fmt::{Display, Formatter, Result as FmtResult};
use thiserror::Error as ErrorTrait;

use crate::name_types::Address;

#[derive(Debug, Clone, ErrorTrait)]
pub struct Error {
    ctx: Kind,
}

impl Error {
    fn new(ctx: Kind) -> Self {
        Self { ctx }
    }

    pub fn kind(&self) -> &Kind {
        &self.ctx
    }

    pub fn is_queue_full(&self) -> bool {
        self.ctx == Kind::QueueFull
    }

    pub fn is_timeout(&self) -> bool {
        self.ctx == Kind::Timeout
    }

    pub fn is_cancelled(&self) -> bool {
        self.ctx == Kind::Cancelled
    }

    pub fn is_source_failure(&self) -> bool {
        matches!(
            &self.ctx,
            Kind::SourceFailed { .. } | Kind::SourceNotStarted(_)
        )
    }

    pub fn is_internal(&self) -> bool {
        matches!(&self.ctx, Kind::Internal(_))
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(Kind::Internal(msg.into()))
    }

    pub fn timeout() -> Self {
        Self::new(Kind::Timeout)
    }

    pub fn cancelled() -> Self {
        Self::new(Kind::Cancelled)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(Kind::Config(msg.into()))
    }

    pub fn source_failed(address: &Address, cause: impl Into<String>) -> Self {
        Self::new(Kind::SourceFailed {
            address: address.clone(),
            cause: cause.into(),
        })
    }

    pub fn source_not_started(address: &Address) -> Self {
        Self::new(Kind::SourceNotStarted(address.clone()))
    }

    pub fn unresolved_address(address: &Address) -> Self {
        Self::new(Kind::UnresolvedAddress(address.clone()))
    }

    pub fn misbound_definition(expected: &Address, found: &Address) -> Self {
        Self::new(Kind::MisboundDefinition {
            expected: expected.clone(),
            found: found.clone(),
        })
    }

    pub fn queue_full() -> Self {
        Self::new(Kind::QueueFull)
    }

    pub fn queue_timeout() -> Self {
        Self::new(Kind::QueueTimeout)
    }

    pub fn queue_closed() -> Self {
        Self::new(Kind::QueueClosed)
    }

    pub fn pool_closed() -> Self {
        Self::new(Kind::PoolClosed)
    }

    pub fn consumer(name: &str, cause: impl Into<String>) -> Self {
        Self::new(Kind::Consumer {
            name: name.to_owned(),
            cause: cause.into(),
        })
    }

    pub fn already_started() -> Self {
        Self::new(Kind::AlreadyStarted)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        Display::fmt(&self.ctx, f)
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::SourceFailed { address, cause } => {
                write!(f, "source {} failed: {}", address, cause)
            }
            Self::SourceNotStarted(address) => write!(f, "source {} is not started", address),
            Self::UnresolvedAddress(address) => {
                write!(f, "no source configured for address {}", address)
            }
            Self::MisboundDefinition { expected, found } => write!(
                f,
                "metric definition bound to {} passed to source {}",
                found, expected
            ),
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Consumer { name, cause } => write!(f, "consumer '{}' failed: {}", name, cause),
            Self::Internal(msg) => write!(f, "internal error: {}", msg),
            err => write!(f, "{:?}", err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::internal(format!("io: {}", err))
    }
}

#[derive(PartialEq, Debug, Clone)]
pub enum Kind {
    Timeout,
    Cancelled,
    Config(String),
    SourceFailed { address: Address, cause: String },
    SourceNotStarted(Address),
    UnresolvedAddress(Address),
    MisboundDefinition { expected: Address, found: Address },
    QueueFull,
    QueueTimeout,
    QueueClosed,
    PoolClosed,
    Consumer { name: String, cause: String },
    AlreadyStarted,
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_address() {
        let err = Error::source_failed(&Address::from("os://localhost"), "boom");
        assert_eq!(err.to_string(), "source os://localhost failed: boom");
        assert!(err.is_source_failure());
        assert_eq!(Error::queue_full().to_string(), "QueueFull");
    }
}
