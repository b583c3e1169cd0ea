//! Certificate expiry notices.
//!
//! Chain heads that expire within the warning horizon produce a warning,
//! those already expired produce an error. Superseded certificates stay
//! silent since a renewal exists.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::certificate::CertificateIndex;
use crate::error::IntegrityError;
use crate::model::CertificateId;

/// How far ahead of expiry warnings start.
///
/// Serialized as a string such as `"90 days"` or `"3 months"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ExpiryHorizon {
    /// A fixed number of days.
    Days(u32),
    /// A number of calendar months, clamped to the end of shorter months.
    Months(u32),
}

impl Default for ExpiryHorizon {
    fn default() -> Self {
        Self::Days(90)
    }
}

impl ExpiryHorizon {
    /// The last date of validity that still triggers a notice on `today`.
    ///
    /// Returns `None` when the date cannot be represented, in which case
    /// every dated certificate is within the horizon.
    #[must_use]
    pub fn deadline(self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Days(days) => today.checked_add_signed(Duration::days(i64::from(days))),
            Self::Months(months) => today.checked_add_months(Months::new(months)),
        }
    }

    /// Whether the horizon is empty.
    #[must_use]
    pub fn is_zero(self) -> bool {
        matches!(self, Self::Days(0) | Self::Months(0))
    }
}

impl fmt::Display for ExpiryHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Days(days) => write!(f, "{days} days"),
            Self::Months(months) => write!(f, "{months} months"),
        }
    }
}

impl FromStr for ExpiryHorizon {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid horizon {s:?}, expected e.g. \"90 days\" or \"3 months\"");
        let mut parts = s.split_whitespace();
        let (Some(amount), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };
        let amount: u32 = amount.parse().map_err(|_| invalid())?;
        match unit {
            "day" | "days" => Ok(Self::Days(amount)),
            "month" | "months" => Ok(Self::Months(amount)),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for ExpiryHorizon {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExpiryHorizon> for String {
    fn from(horizon: ExpiryHorizon) -> Self {
        horizon.to_string()
    }
}

/// Notice severity. Errors sort before warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// The certificate has expired.
    Error,
    /// The certificate expires within the horizon.
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// An expiry notice about a single certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// How urgent the notice is.
    pub severity: Severity,
    /// The certificate concerned.
    pub certificate_id: CertificateId,
    /// Display name of the certificate.
    pub subject: String,
    /// Last day of validity.
    pub valid_until: NaiveDate,
    /// Days from today until `valid_until`; negative once expired.
    pub days_until_expiry: i64,
}

impl Notice {
    /// Whether the certificate has already expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// A certificate left out of the notices because its data is inconsistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeFailure {
    /// The certificate that could not be resolved.
    pub certificate_id: CertificateId,
    /// Why.
    pub error: IntegrityError,
}

/// Output of [`notify`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoticeReport {
    /// Notices, errors first, then by ascending expiry date.
    pub notices: Vec<Notice>,
    /// Certificates skipped because of integrity violations.
    pub failures: Vec<NoticeFailure>,
}

impl NoticeReport {
    /// Number of error notices.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.notices.iter().filter(|n| n.is_expired()).count()
    }

    /// Number of warning notices.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.notices.len() - self.error_count()
    }
}

/// Produce expiry notices for every chain head in the index.
///
/// Only certificates with a `valid_until` on or before `today + horizon`
/// are resolved. Integrity failures land in [`NoticeReport::failures`] and
/// leave other certificates untouched.
#[must_use]
pub fn notify(index: &CertificateIndex<'_>, today: NaiveDate, horizon: ExpiryHorizon) -> NoticeReport {
    let deadline = horizon.deadline(today);
    let mut report = NoticeReport::default();

    for certificate in index.iter() {
        let Some(valid_until) = certificate.valid_until else {
            continue;
        };
        if deadline.is_some_and(|deadline| valid_until > deadline) {
            continue;
        }

        let status = match index.resolve(certificate.id, today) {
            Ok(status) => status,
            Err(error) => {
                warn!(certificate = %certificate.id, "Skipping expiry check: {error}");
                report.failures.push(NoticeFailure {
                    certificate_id: certificate.id,
                    error,
                });
                continue;
            }
        };
        if status.is_superseded() {
            continue;
        }

        let days_until_expiry = (valid_until - today).num_days();
        let severity = if valid_until < today {
            Severity::Error
        } else {
            Severity::Warning
        };

        report.notices.push(Notice {
            severity,
            certificate_id: certificate.id,
            subject: certificate.to_string(),
            valid_until,
            days_until_expiry,
        });
    }

    report.notices.sort_by(|a, b| {
        (a.severity, a.valid_until, a.certificate_id).cmp(&(b.severity, b.valid_until, b.certificate_id))
    });

    debug!(
        notices = report.notices.len(),
        failures = report.failures.len(),
        %horizon,
        "Checked certificate expiry"
    );
    report
}
