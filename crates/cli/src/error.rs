//! CLI error types.

use std::fmt;

#[derive(Debug)]
pub enum CliError {
    /// Configuration file error
    Config(String),
    /// Fixture file could not be parsed
    Fixture(String),
    /// No enabled adapter with this partner code
    UnknownPartner(String),
    /// The adapter produced no wire request to work with
    NoRequests(String),
    /// IO error
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::Fixture(msg) => write!(f, "Fixture error: {msg}"),
            Self::UnknownPartner(code) => {
                write!(f, "Partner '{code}' is not configured or not enabled")
            }
            Self::NoRequests(code) => write!(f, "Partner '{code}' built no requests for these bids"),
            Self::Io(err) => write!(f, "IO error: {err}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Self::Io(err) = self {
            Some(err)
        } else {
            None
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Fixture(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_cli_error_display() {
        assert_eq!(
            format!("{}", CliError::Config("test".into())),
            "Configuration error: test"
        );
        assert_eq!(
            format!("{}", CliError::Fixture("test".into())),
            "Fixture error: test"
        );
        assert_eq!(
            format!("{}", CliError::UnknownPartner("acme".into())),
            "Partner 'acme' is not configured or not enabled"
        );
        assert_eq!(
            format!("{}", CliError::NoRequests("acme".into())),
            "Partner 'acme' built no requests for these bids"
        );
    }

    #[test]
    fn test_cli_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "bids.json");
        assert!(matches!(CliError::from(io_err), CliError::Io(_)));
    }

    #[test]
    fn test_cli_error_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").expect_err("should fail");
        let cli_err: CliError = json_err.into();
        assert!(matches!(cli_err, CliError::Fixture(_)));
    }

    #[test]
    fn test_only_io_errors_have_a_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(CliError::from(io_err).source().is_some());
        assert!(CliError::UnknownPartner("acme".into()).source().is_none());
    }
}
