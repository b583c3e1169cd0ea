//! Certificate validity and supersession chains.
//!
//! A renewed certificate names the one it replaces through `supersedes_id`.
//! The renewals of one qualification therefore form a chain, and only the
//! newest link (the chain head) can be in force. [`CertificateIndex`] builds
//! the reverse lookup once per batch and answers validity questions against
//! it. Broken supersession data is reported per certificate as an
//! [`IntegrityError`]; it never poisons the rest of the batch.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::IntegrityError;
use crate::model::{Certificate, CertificateId};

type IntegrityResult<T> = std::result::Result<T, IntegrityError>;

/// Computed validity of one certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateStatus {
    /// Whether the certificate is in force.
    pub valid: bool,
    /// Head of the chain that replaced this certificate, when superseded.
    pub superseded_by_active_chain_head: Option<CertificateId>,
    /// Days left until `valid_until`. Negative once expired, absent when
    /// open-ended or superseded.
    pub days_until_expiry: Option<i64>,
}

impl CertificateStatus {
    /// Whether another certificate has replaced this one.
    #[must_use]
    pub fn is_superseded(&self) -> bool {
        self.superseded_by_active_chain_head.is_some()
    }
}

/// A certificate paired with its resolution outcome.
#[derive(Debug, Clone)]
pub struct ResolvedCertificate<'a> {
    /// The certificate.
    pub certificate: &'a Certificate,
    /// Its status, or the integrity violation that prevented resolving it.
    pub status: IntegrityResult<CertificateStatus>,
}

/// Reverse supersession index over a snapshot of certificates.
#[derive(Debug)]
pub struct CertificateIndex<'a> {
    by_id: BTreeMap<CertificateId, &'a Certificate>,
    superseders: HashMap<CertificateId, Vec<CertificateId>>,
    duplicates: BTreeSet<CertificateId>,
    total: usize,
}

impl<'a> CertificateIndex<'a> {
    /// Index a snapshot of certificates.
    ///
    /// Building never fails; inconsistencies surface when the affected
    /// certificates are looked up.
    #[must_use]
    pub fn build(certificates: &'a [Certificate]) -> Self {
        let mut by_id = BTreeMap::new();
        let mut duplicates = BTreeSet::new();
        let mut superseders: HashMap<CertificateId, Vec<CertificateId>> = HashMap::new();

        for certificate in certificates {
            if by_id.insert(certificate.id, certificate).is_some() {
                duplicates.insert(certificate.id);
            }
            if let Some(target) = certificate.supersedes_id {
                superseders.entry(target).or_default().push(certificate.id);
            }
        }

        for ids in superseders.values_mut() {
            ids.sort_unstable();
        }

        if !duplicates.is_empty() {
            warn!(count = duplicates.len(), "Certificate snapshot contains duplicate ids");
        }
        debug!(
            certificates = certificates.len(),
            links = superseders.len(),
            "Built certificate index"
        );

        Self {
            by_id,
            superseders,
            duplicates,
            total: certificates.len(),
        }
    }

    /// Number of certificates in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.total
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// All certificates in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &'a Certificate> + '_ {
        self.by_id.values().copied()
    }

    /// Look up a certificate by id.
    ///
    /// # Errors
    ///
    /// Fails if the id is unknown or used by more than one certificate.
    pub fn get(&self, id: CertificateId) -> IntegrityResult<&'a Certificate> {
        if self.duplicates.contains(&id) {
            return Err(IntegrityError::DuplicateCertificate(id));
        }
        self.by_id
            .get(&id)
            .copied()
            .ok_or(IntegrityError::UnknownCertificate(id))
    }

    /// The certificate that directly supersedes `id`, if any.
    ///
    /// # Errors
    ///
    /// Fails if `id` is unknown or claimed by several superseders.
    pub fn superseded_by(&self, id: CertificateId) -> IntegrityResult<Option<&'a Certificate>> {
        self.get(id)?;
        match self.superseders.get(&id).map(Vec::as_slice) {
            None | Some([]) => Ok(None),
            Some([single]) => self.get(*single).map(Some),
            Some(many) => Err(IntegrityError::MultipleSuperseders {
                target: id,
                superseders: many.to_vec(),
            }),
        }
    }

    /// Follow supersession links forward to the certificate currently in
    /// force for this lineage. A certificate nobody supersedes is its own
    /// chain head.
    ///
    /// The walk takes at most as many steps as there are certificates.
    ///
    /// # Errors
    ///
    /// Fails on self-supersession, ambiguous links, or a cycle.
    pub fn chain_head(&self, id: CertificateId) -> IntegrityResult<&'a Certificate> {
        let start = self.get(id)?;
        reject_self_supersession(start)?;

        let mut current = start;
        let mut seen = BTreeSet::from([start.id]);
        let mut steps = 0;

        while let Some(next) = self.superseded_by(current.id)? {
            steps += 1;
            if steps > self.total || !seen.insert(next.id) {
                return Err(IntegrityError::SupersessionCycle { start: id, steps });
            }
            current = next;
        }

        Ok(current)
    }

    /// The renewal lineage ending at `id`, newest first, starting with the
    /// certificate itself.
    ///
    /// # Errors
    ///
    /// Fails on self-supersession, a link to a certificate outside the
    /// snapshot, or a cycle.
    pub fn history(&self, id: CertificateId) -> IntegrityResult<Vec<&'a Certificate>> {
        let start = self.get(id)?;
        reject_self_supersession(start)?;

        let mut lineage = vec![start];
        let mut seen = BTreeSet::from([start.id]);
        let mut current = start;

        while let Some(target) = current.supersedes_id {
            let previous = self.get(target).map_err(|err| match err {
                IntegrityError::UnknownCertificate(_) => IntegrityError::DanglingSupersedes {
                    certificate: current.id,
                    target,
                },
                other => other,
            })?;
            if lineage.len() > self.total || !seen.insert(previous.id) {
                return Err(IntegrityError::SupersessionCycle {
                    start: id,
                    steps: lineage.len(),
                });
            }
            lineage.push(previous);
            current = previous;
        }

        Ok(lineage)
    }

    /// Resolve the validity of one certificate on `today`.
    ///
    /// A superseded certificate is never valid. Otherwise it is valid when
    /// open-ended or when `valid_until` is today or later.
    ///
    /// # Errors
    ///
    /// Fails when the certificate supersedes itself, is claimed by several
    /// superseders, or its chain loops.
    pub fn resolve(&self, id: CertificateId, today: NaiveDate) -> IntegrityResult<CertificateStatus> {
        let certificate = self.get(id)?;
        reject_self_supersession(certificate)?;

        if self.superseded_by(id)?.is_some() {
            let head = self.chain_head(id)?;
            return Ok(CertificateStatus {
                valid: false,
                superseded_by_active_chain_head: Some(head.id),
                days_until_expiry: None,
            });
        }

        Ok(CertificateStatus {
            valid: certificate.valid_until.map_or(true, |until| until >= today),
            superseded_by_active_chain_head: None,
            days_until_expiry: certificate
                .valid_until
                .map(|until| (until - today).num_days()),
        })
    }

    /// Resolve every certificate in the snapshot, in ascending id order.
    #[must_use]
    pub fn resolve_all(&self, today: NaiveDate) -> Vec<ResolvedCertificate<'a>> {
        self.iter()
            .map(|certificate| {
                let status = self.resolve(certificate.id, today);
                if let Err(err) = &status {
                    warn!(certificate = %certificate.id, "Cannot resolve certificate: {err}");
                }
                ResolvedCertificate {
                    certificate,
                    status,
                }
            })
            .collect()
    }
}

fn reject_self_supersession(certificate: &Certificate) -> IntegrityResult<()> {
    if certificate.supersedes_id == Some(certificate.id) {
        return Err(IntegrityError::SelfSupersession(certificate.id));
    }
    Ok(())
}
