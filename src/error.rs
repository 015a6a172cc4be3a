use std::{error::Error, fmt, io};

pub type PingResult<T> = std::result::Result<T, PingError>;

/// Error kinds surfaced by the echo engine.
///
/// `Timeout` is the one recoverable kind: callers count it as packet loss and
/// move on. The engine itself never retries.
#[derive(Debug)]
pub enum PingError {
    /// The raw socket could not be acquired, usually for lack of privilege.
    TransportUnavailable(io::Error),
    /// No matching reply arrived within the configured window.
    Timeout,
    /// The session was used after `close`.
    ClosedResource,
    /// The destination could not be resolved to a usable address.
    AddressResolution(String),
    /// Any other I/O failure on an open session.
    Transport(io::Error),
}

impl fmt::Display for PingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            PingError::TransportUnavailable(e) => {
                write!(f, "raw transport unavailable: {}", e)
            }
            PingError::Timeout => write!(f, "timed out waiting for echo reply"),
            PingError::ClosedResource => write!(f, "session is closed"),
            PingError::AddressResolution(message) => {
                write!(f, "address resolution failed: {}", message)
            }
            PingError::Transport(e) => write!(f, "transport error: {}", e),
        }
    }
}

impl Error for PingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PingError::TransportUnavailable(e) | PingError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PingError {
    fn from(error: io::Error) -> PingError {
        match error.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => PingError::Timeout,
            io::ErrorKind::PermissionDenied => PingError::TransportUnavailable(error),
            _ => PingError::Transport(error),
        }
    }
}
