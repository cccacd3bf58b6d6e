use std::net::{Ipv4Addr, SocketAddr};

/// All error types that can occur when talking to MagicHome controllers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The controller could not be reached (connection refused, timed out, unroutable).
    #[error("cannot connect to {addr}: {err:?}")]
    Connect { addr: SocketAddr, err: std::io::Error },

    /// A socket operation failed after the connection was established.
    #[error("socket {action} error: {err:?}")]
    Socket { action: String, err: std::io::Error },

    /// A status response did not have the expected layout.
    #[error("malformed response: {0}")]
    Parse(String),

    /// A value handed to the controller lies outside its domain.
    #[error("{field} value {value} is outside {min}..={max}")]
    Range {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Every query attempt ended without data from the device.
    #[error("no response from {0}")]
    NoResponse(SocketAddr),

    /// Failed to deserialize the configuration document.
    #[error("failed to load json: {0:?}")]
    JsonLoad(serde_json::Error),

    /// The specified device is not registered.
    #[error("device {0} not found")]
    DeviceNotFound(String),

    /// The provided IP address is invalid (e.g., already used by another device).
    #[error("device with ip {ip} is invalid because the IP is {reason}")]
    InvalidIP { ip: Ipv4Addr, reason: String },
}

impl Error {
    /// Create a new socket error
    pub fn socket(action: &str, err: std::io::Error) -> Self {
        Error::Socket {
            action: action.to_string(),
            err,
        }
    }

    /// Create a new connect error
    pub fn connect(addr: SocketAddr, err: std::io::Error) -> Self {
        Error::Connect { addr, err }
    }

    /// Create a new range error
    pub fn range(field: &'static str, value: f64, min: f64, max: f64) -> Self {
        Error::Range {
            field,
            value,
            min,
            max,
        }
    }

    /// Create a new invalid IP error
    pub fn invalid_ip(ip: &Ipv4Addr, reason: &str) -> Self {
        Error::InvalidIP {
            ip: *ip,
            reason: reason.to_string(),
        }
    }

    /// Whether the error means the device could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Error::Connect { .. } | Error::NoResponse(_))
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
