//! Error types for logbook.
//!
//! This module defines all error types used throughout the logbook crate.
//! Integrity violations in certificate data get their own cloneable type,
//! returned directly by the certificate resolver so that batch operations
//! can report them per certificate.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::{AircraftId, CertificateId};

/// The main error type for logbook operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// A record was rejected before it reached the database.
    #[error("invalid record: {message}")]
    InvalidRecord {
        /// Description of the rule the record breaks.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Evaluation Errors ===
    /// An evaluator was called with arguments that break its preconditions.
    #[error("invalid invocation: {message}")]
    InvalidInvocation {
        /// Description of the violated precondition.
        message: String,
    },

    /// Currency was requested for an aircraft that does not require it.
    #[error("currency is not applicable to aircraft {aircraft}")]
    CurrencyNotApplicable {
        /// The aircraft in question.
        aircraft: AircraftId,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Violations of the certificate supersession invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    /// A certificate names itself as the one it supersedes.
    #[error("certificate {0} supersedes itself")]
    SelfSupersession(CertificateId),

    /// More than one certificate claims the same supersession target.
    #[error("certificate {target} is superseded by several certificates: {superseders:?}")]
    MultipleSuperseders {
        /// The certificate being superseded.
        target: CertificateId,
        /// Every certificate naming it, in ascending id order.
        superseders: Vec<CertificateId>,
    },

    /// Following supersession links revisits a certificate.
    #[error("supersession cycle detected starting at certificate {start}")]
    SupersessionCycle {
        /// The certificate the traversal started from.
        start: CertificateId,
        /// Links followed before the cycle was detected.
        steps: usize,
    },

    /// The requested certificate is not part of the snapshot.
    #[error("unknown certificate {0}")]
    UnknownCertificate(CertificateId),

    /// A certificate supersedes one that is not part of the snapshot.
    #[error("certificate {certificate} supersedes unknown certificate {target}")]
    DanglingSupersedes {
        /// The superseding certificate.
        certificate: CertificateId,
        /// The missing target.
        target: CertificateId,
    },

    /// Two certificates in the snapshot share an id.
    #[error("duplicate certificate id {0}")]
    DuplicateCertificate(CertificateId),
}

/// A specialized Result type for logbook operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new invalid invocation error.
    #[must_use]
    pub fn invalid_invocation(message: impl Into<String>) -> Self {
        Self::InvalidInvocation {
            message: message.into(),
        }
    }

    /// Create a new invalid record error.
    #[must_use]
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Check if this error is a precondition violation by the caller.
    #[must_use]
    pub fn is_precondition_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInvocation { .. } | Self::CurrencyNotApplicable { .. }
        )
    }
}
