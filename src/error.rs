//! Link-level error taxonomy.
//!
//! Every failure in the transport stack is caught where it happens, logged
//! with a human-readable cause, and collapsed to a boolean at the dispatcher
//! boundary. The variants below are the complete set of causes a diagnostic
//! line can report.

use thiserror::Error;

/// Unified error type for all transports.
#[derive(Error, Debug)]
pub enum LinkError {
    /// The OS denied access to the Bluetooth stack.
    #[error("bluetooth permission denied")]
    PermissionDenied,

    /// No usable Bluetooth adapter (radio off, or no backend on this target).
    #[error("bluetooth adapter unavailable")]
    AdapterUnavailable,

    /// Device address is blank or not a valid MAC / port name.
    #[error("invalid device address `{0}`")]
    InvalidAddress(String),

    /// Connection could not be established (status error, timeout, or an
    /// unexpected disconnect while setting up).
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// Connected, but the expected GATT service or characteristic is missing.
    #[error("service or characteristic not found")]
    ServiceOrCharacteristicNotFound,

    /// The stack refused to take the write (queue full, link closed, ...).
    #[error("write rejected: {0}")]
    WriteRejected(String),

    /// No acknowledgement arrived within the allowed window.
    #[error("write not acknowledged within {0} ms")]
    WriteTimeout(u64),

    /// Socket or stream failure on one of the plain byte transports.
    #[error("transport i/o error: {0}")]
    TransportIo(#[from] std::io::Error),
}

impl LinkError {
    /// Errors that describe the environment rather than a flaky link.
    /// Retrying a connect cannot fix these, so the retry plan aborts early.
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(
            self,
            LinkError::PermissionDenied
                | LinkError::AdapterUnavailable
                | LinkError::InvalidAddress(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_strings_are_reportable() {
        let err = LinkError::InvalidAddress("garbage".to_string());
        assert_eq!(format!("{err}"), "invalid device address `garbage`");

        let err = LinkError::WriteTimeout(800);
        assert_eq!(format!("{err}"), "write not acknowledged within 800 ms");

        let err = LinkError::ConnectFailed("no event within 25 s".to_string());
        assert!(format!("{err}").contains("no event within 25 s"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: LinkError = io.into();
        assert!(matches!(err, LinkError::TransportIo(_)));
    }

    #[test]
    fn fatal_classification() {
        assert!(LinkError::AdapterUnavailable.is_fatal());
        assert!(LinkError::InvalidAddress(String::new()).is_fatal());
        assert!(!LinkError::ConnectFailed("x".into()).is_fatal());
        assert!(!LinkError::WriteTimeout(500).is_fatal());
    }
}
