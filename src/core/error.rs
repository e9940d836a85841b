//! Error handling for PiNet
//!
//! This module provides the error taxonomy used across PiNet and the
//! user-friendly reporting layer used by the CLI. The error system follows
//! two principles:
//! 1. **Strongly-typed errors** so callers can react to specific failures
//!    (offer a space override, stop on a corrupt backup, retry a command)
//! 2. **User-friendly messages** with actionable suggestions for the operator
//!
//! # Error Categories
//!
//! - **Network**: [`PinetError::NetworkError`] for unreachable feeds and downloads
//! - **Format**: [`PinetError::FormatError`] for malformed versions and feeds
//! - **Validation**: [`PinetError::ValidationError`] for rejected user input
//! - **Space**: [`PinetError::SpaceError`] when a backup would exhaust the disk
//! - **Integrity**: [`PinetError::IntegrityError`] for backups that fail validation
//! - **Process**: [`PinetError::ProcessError`] for external commands that exit non-zero
//!
//! Use [`user_friendly_error`] to convert any [`anyhow::Error`] into an
//! [`ErrorContext`] for display.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pinet_cli::core::{PinetError, ErrorContext};
//!
//! let context = ErrorContext::new(PinetError::SpaceError {
//!     required: 1_500_000,
//!     available: 900_000,
//! })
//! .with_suggestion("Free some disk space or re-run with --override-space");
//!
//! context.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for PiNet operations
///
/// Each variant carries enough context for the CLI to explain what went wrong
/// and, where the operator can do something about it, what to try next.
///
/// Recoverability differs per variant:
/// - [`ProcessError`](Self::ProcessError) is recoverable: the operator may
///   continue, retry or abort (see [`crate::shell::recovery`])
/// - [`SpaceError`](Self::SpaceError) blocks but allows an informed override
/// - [`IntegrityError`](Self::IntegrityError) is a hard stop
/// - [`FormatError`](Self::FormatError) and [`NetworkError`](Self::NetworkError)
///   abort the current update check
#[derive(Error, Debug)]
pub enum PinetError {
    /// A remote resource could not be reached or returned a failure status
    #[error("Network error during {operation}: {reason}")]
    NetworkError {
        /// What was being attempted (e.g. "fetching release feed")
        operation: String,
        /// Underlying cause
        reason: String,
    },

    /// Input could not be parsed (version strings, feed documents, version files)
    #[error("Invalid format for '{input}': {reason}")]
    FormatError {
        /// The offending input, truncated by the caller if large
        input: String,
        /// Why parsing failed
        reason: String,
    },

    /// User-supplied input was rejected
    #[error("Invalid {field}: {reason}")]
    ValidationError {
        /// Name of the validated field (e.g. "backup name")
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Not enough free disk space for a chroot backup
    #[error(
        "Insufficient disk space: {available} KB free but {required} KB needed (chroot size plus safety margin)"
    )]
    SpaceError {
        /// Kilobytes needed (chroot size plus threshold)
        required: u64,
        /// Kilobytes currently free on the backup volume
        available: u64,
    },

    /// A backup failed its integrity heuristic and must not be restored
    #[error("Backup '{name}' appears to be corrupt or damaged: {reason}")]
    IntegrityError {
        /// Backup name
        name: String,
        /// What the check found
        reason: String,
    },

    /// An external command exited unsuccessfully
    #[error("Command '{command}' failed{}: {stderr}", code.map(|c| format!(" with exit code {c}")).unwrap_or_default())]
    ProcessError {
        /// Command line as executed
        command: String,
        /// Exit code, `None` when killed by a signal or timed out
        code: Option<i32>,
        /// Captured standard error (or a description of the failure)
        stderr: String,
    },

    /// Restore was requested but the backup directory holds no backups
    #[error("No chroot backups found in {path}")]
    NoBackupsFound {
        /// The backup root that was searched
        path: String,
    },

    /// Another PiNet process holds a chroot or backup lock
    #[error("Lock '{name}' is held by another PiNet process")]
    LockHeld {
        /// Lock name
        name: String,
    },

    /// The operator cancelled a prompt
    #[error("Operation cancelled")]
    Cancelled,

    /// The settings file or config store could not be used
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the problem
        message: String,
    },

    /// Wrapped standard I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error from the settings file
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Catch-all used when converting foreign errors for display
    #[error("{message}")]
    Other {
        /// Full message including the cause chain
        message: String,
    },
}

impl Clone for PinetError {
    fn clone(&self) -> Self {
        match self {
            Self::NetworkError {
                operation,
                reason,
            } => Self::NetworkError {
                operation: operation.clone(),
                reason: reason.clone(),
            },
            Self::FormatError {
                input,
                reason,
            } => Self::FormatError {
                input: input.clone(),
                reason: reason.clone(),
            },
            Self::ValidationError {
                field,
                reason,
            } => Self::ValidationError {
                field: field.clone(),
                reason: reason.clone(),
            },
            Self::SpaceError {
                required,
                available,
            } => Self::SpaceError {
                required: *required,
                available: *available,
            },
            Self::IntegrityError {
                name,
                reason,
            } => Self::IntegrityError {
                name: name.clone(),
                reason: reason.clone(),
            },
            Self::ProcessError {
                command,
                code,
                stderr,
            } => Self::ProcessError {
                command: command.clone(),
                code: *code,
                stderr: stderr.clone(),
            },
            Self::NoBackupsFound {
                path,
            } => Self::NoBackupsFound {
                path: path.clone(),
            },
            Self::LockHeld {
                name,
            } => Self::LockHeld {
                name: name.clone(),
            },
            Self::Cancelled => Self::Cancelled,
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            // For errors that don't implement Clone, convert to Other
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::TomlError(e) => Self::Other {
                message: format!("TOML parsing error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

impl PinetError {
    /// Severity used when the error is written to the persistent log.
    ///
    /// Recoverable conditions are logged as warnings, everything else as errors.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ProcessError { .. }
                | Self::SpaceError { .. }
                | Self::ValidationError { .. }
                | Self::Cancelled
        )
    }
}

/// Error context wrapper that provides user-friendly error information
///
/// `ErrorContext` wraps a [`PinetError`] with an optional suggestion and
/// details. When displayed, the error is shown in red, details in yellow and
/// the suggestion in green.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: PinetError,
    /// Actionable suggestion for the operator
    pub suggestion: Option<String>,
    /// Additional context about the failure
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: PinetError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognizes [`PinetError`] anywhere in the cause chain, then common
/// [`std::io::Error`] kinds, and falls back to a generic message that includes
/// the full cause chain.
///
/// # Examples
///
/// ```rust,no_run
/// use pinet_cli::core::{PinetError, user_friendly_error};
///
/// let error = anyhow::Error::from(PinetError::Cancelled);
/// user_friendly_error(error).display();
/// ```
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(pinet_error) = error.chain().find_map(|e| e.downcast_ref::<PinetError>()) {
        return create_error_context(pinet_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(PinetError::Other {
                    message: format!("Permission denied: {error:#}"),
                })
                .with_suggestion("PiNet manages system files. Run it with sudo")
                .with_details("The chroot, backup directory and /etc/pinet are owned by root");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(PinetError::Other {
                    message: format!("File not found: {error:#}"),
                })
                .with_suggestion("Check that the LTSP chroot has been built and the paths in your settings are correct");
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(PinetError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax in your PiNet settings file");
    }

    // Generic error - include the full error chain for better diagnostics
    let mut message = error.to_string();

    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(PinetError::Other {
        message,
    })
}

fn create_error_context(error: PinetError) -> ErrorContext {
    match &error {
        PinetError::NetworkError { .. } => ErrorContext::new(error)
            .with_suggestion("Check the server's internet connection. Run 'pinet network-report' to see which sites are blocked")
            .with_details("PiNet needs access to GitHub and the Raspbian mirrors to check for and download updates"),

        PinetError::FormatError { .. } => ErrorContext::new(error)
            .with_details("Versions must have the form MAJOR.MINOR.PATCH, for example 1.2.3"),

        PinetError::ValidationError { .. } => ErrorContext::new(error)
            .with_suggestion("Correct the value and try again"),

        PinetError::SpaceError { .. } => ErrorContext::new(error)
            .with_suggestion("Free some disk space, or re-run with --override-space if you are sure the backup will fit")
            .with_details("A backup is a full copy of the chroot and must leave at least 1GB free"),

        PinetError::IntegrityError { .. } => ErrorContext::new(error)
            .with_suggestion("Choose a different backup. The live chroot has been left untouched")
            .with_details("A valid backup contains a boot directory"),

        PinetError::ProcessError { .. } => ErrorContext::new(error)
            .with_suggestion("Check the log file for the command output, fix the cause and run the operation again"),

        PinetError::NoBackupsFound { .. } => ErrorContext::new(error)
            .with_suggestion("Create a backup first with 'pinet backup'"),

        PinetError::LockHeld { .. } => ErrorContext::new(error)
            .with_suggestion("Wait for the other PiNet operation to finish and try again"),

        PinetError::ConfigError { .. } => ErrorContext::new(error)
            .with_suggestion("Check /etc/pinet and the PiNet settings file"),

        PinetError::Cancelled
        | PinetError::IoError(_)
        | PinetError::TomlError(_)
        | PinetError::Other { .. } => ErrorContext::new(error),
    }
}
