//! Correspondence use-case service.
//!
//! # Responsibility
//! - Create, read and list correspondences.
//! - Run proposed edits through the transition engine and persist the
//!   accepted patch as one write.
//! - Fire audit, notification and feed side effects after a successful write.
//!
//! # Invariants
//! - A no-op proposal performs no write, no audit and no notification.
//! - Audit and notification failures are logged and never undo a write.
//! - Nothing fallible runs between a committed write and its audit entry.
//! - Every persisted change carries the acting user's id in the audit trail.

use crate::clock::{Clock, SystemClock};
use crate::engine::transition::{EngineOptions, Proposal, TransitionEngine};
use crate::feed::CorrespondenceFeed;
use crate::model::audit::{AuditEntry, AuditEntryId, ChangeLog, FieldChange};
use crate::model::correspondence::{
    Correspondence, CorrespondenceId, CorrespondenceValidationError, Field, FieldPatch, FieldValue,
};
use crate::model::user::{is_valid_user_id, User};
use crate::repo::audit_repo::AuditSink;
use crate::repo::correspondence_repo::{
    CorrespondenceListQuery, CorrespondenceRepository, RepoError, WriteGuard,
};
use crate::repo::notification_repo::Notifier;
use log::{debug, error, info, warn};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error surfaced to callers of create/edit/sweep paths.
#[derive(Debug)]
pub enum ServiceError {
    /// Entity construction or post-patch validation failed; nothing written.
    Validation(CorrespondenceValidationError),
    /// Acting user id is malformed.
    InvalidActor(String),
    NotFound(CorrespondenceId),
    /// Stored version advanced since the caller read `current`.
    Conflict {
        id: CorrespondenceId,
        expected: u64,
        actual: u64,
    },
    /// Store transport or data failure.
    Store(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidActor(value) => write!(f, "invalid acting user id `{value}`"),
            Self::NotFound(id) => write!(f, "correspondence not found: {id}"),
            Self::Conflict {
                id,
                expected,
                actual,
            } => write!(
                f,
                "correspondence {id} was modified concurrently (read version {expected}, stored {actual}); re-fetch and retry"
            ),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::Conflict {
                id,
                expected,
                actual,
            } => Self::Conflict {
                id,
                expected,
                actual,
            },
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Store(other),
        }
    }
}

impl From<CorrespondenceValidationError> for ServiceError {
    fn from(value: CorrespondenceValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Write concurrency policy for edits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyMode {
    /// Reject the write with `Conflict` when the stored version moved.
    #[default]
    Optimistic,
    /// Write regardless of the stored version; last writer wins per field.
    LastWriteWins,
}

/// Request model for registering a new correspondence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateCorrespondenceRequest {
    pub subject: String,
    pub recipient: String,
    pub content: String,
    /// Wire status string; `None` means `Registered`.
    pub initial_status: Option<String>,
    /// Reference to an already uploaded attachment.
    pub attachment_ref: Option<String>,
}

/// Result of one `apply_edits` call.
///
/// `rejected_fields` is always populated so callers can warn about dropped
/// edits even when the call succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    /// Stored record after the call (unchanged input on a no-op).
    pub record: Correspondence,
    pub accepted: FieldPatch,
    pub rejected_fields: BTreeSet<Field>,
    pub change_log: ChangeLog,
    /// Audit entry id, when an entry was appended.
    pub audit_entry: Option<AuditEntryId>,
    /// Whether the assignment notification was delivered to the sink.
    pub notified: bool,
}

impl TransitionOutcome {
    pub fn is_noop(&self) -> bool {
        self.accepted.is_empty()
    }
}

/// Message text sent to the action officer when a record is sent to them.
pub fn assignment_message(record: &Correspondence) -> String {
    format!("New correspondence assigned: {}", record.subject())
}

/// Use-case service over a store, audit sink and notifier.
pub struct CorrespondenceService<R, A, N, C = SystemClock>
where
    R: CorrespondenceRepository,
    A: AuditSink,
    N: Notifier,
    C: Clock,
{
    repo: R,
    audit: A,
    notifier: N,
    clock: C,
    engine: TransitionEngine,
    concurrency: ConcurrencyMode,
    feed: Option<CorrespondenceFeed>,
}

impl<R, A, N> CorrespondenceService<R, A, N>
where
    R: CorrespondenceRepository,
    A: AuditSink,
    N: Notifier,
{
    /// Creates a service on the system clock with default engine options.
    pub fn new(repo: R, audit: A, notifier: N) -> Self {
        Self {
            repo,
            audit,
            notifier,
            clock: SystemClock,
            engine: TransitionEngine::default(),
            concurrency: ConcurrencyMode::default(),
            feed: None,
        }
    }
}

impl<R, A, N, C> CorrespondenceService<R, A, N, C>
where
    R: CorrespondenceRepository,
    A: AuditSink,
    N: Notifier,
    C: Clock,
{
    pub fn with_clock<C2: Clock>(self, clock: C2) -> CorrespondenceService<R, A, N, C2> {
        CorrespondenceService {
            repo: self.repo,
            audit: self.audit,
            notifier: self.notifier,
            clock,
            engine: self.engine,
            concurrency: self.concurrency,
            feed: self.feed,
        }
    }

    pub fn with_engine_options(mut self, options: EngineOptions) -> Self {
        self.engine = TransitionEngine::new(options);
        self
    }

    pub fn with_concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.concurrency = mode;
        self
    }

    /// Publishes every persisted insert/update to `feed`.
    pub fn with_feed(mut self, feed: CorrespondenceFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn concurrency(&self) -> ConcurrencyMode {
        self.concurrency
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Registers a new correspondence created by `actor`.
    ///
    /// The creation is audited as a change log from null to every initial
    /// non-null field value.
    pub fn create(
        &self,
        actor: &User,
        request: &CreateCorrespondenceRequest,
    ) -> Result<Correspondence, ServiceError> {
        ensure_actor(actor)?;

        let mut record = Correspondence::create_at(
            self.clock.now_ms(),
            request.subject.as_str(),
            request.recipient.as_str(),
            request.content.as_str(),
            request.initial_status.as_deref(),
            request.attachment_ref.clone(),
        )?;
        record.set_created_by(actor.id.clone());

        let id = self.repo.insert(&record)?;
        info!(
            "event=correspondence_create module=service status=ok id={id} actor={} initial_status={}",
            actor.id,
            record.status()
        );

        let changes: ChangeLog = Field::ALL
            .into_iter()
            .filter_map(|field| {
                let value = record.value_of(field).normalized_for(field);
                let empty = value.is_null() || value == FieldValue::Text(String::new());
                (!empty).then(|| {
                    (
                        field,
                        FieldChange {
                            from: FieldValue::Null,
                            to: value,
                        },
                    )
                })
            })
            .collect();
        self.record_audit(actor, id, changes);
        self.publish(&record);

        Ok(record)
    }

    /// Returns one correspondence or `NotFound`.
    pub fn get(&self, id: CorrespondenceId) -> Result<Correspondence, ServiceError> {
        self.repo.get(id)?.ok_or(ServiceError::NotFound(id))
    }

    pub fn list(
        &self,
        query: &CorrespondenceListQuery,
    ) -> Result<Vec<Correspondence>, ServiceError> {
        Ok(self.repo.list(query)?)
    }

    /// Reads the stored record and applies `edits` on behalf of `actor`.
    pub fn apply_edits(
        &self,
        id: CorrespondenceId,
        edits: &FieldPatch,
        actor: &User,
    ) -> Result<TransitionOutcome, ServiceError> {
        let current = self.get(id)?;
        self.apply_edits_to(&current, edits, actor)
    }

    /// Applies `edits` against a previously read `current` snapshot.
    ///
    /// # Errors
    /// - `Validation` when the accepted patch would break invariants of the
    ///   stored record; nothing is written.
    /// - `Conflict` in optimistic mode when `current` is stale.
    /// - `NotFound` / `Store` on store failures; not retried.
    pub fn apply_edits_to(
        &self,
        current: &Correspondence,
        edits: &FieldPatch,
        actor: &User,
    ) -> Result<TransitionOutcome, ServiceError> {
        let guard = match self.concurrency {
            ConcurrencyMode::Optimistic => WriteGuard::ExpectVersion(current.version()),
            ConcurrencyMode::LastWriteWins => WriteGuard::Unconditional,
        };
        self.apply_guarded(current, edits, actor, guard)
    }

    pub(crate) fn apply_guarded(
        &self,
        current: &Correspondence,
        edits: &FieldPatch,
        actor: &User,
        guard: WriteGuard,
    ) -> Result<TransitionOutcome, ServiceError> {
        ensure_actor(actor)?;
        let id = current.id();

        let proposal = self.engine.propose(current, edits, actor);
        let triggers_notification = proposal.triggers_notification();
        let Proposal {
            accepted,
            rejected_fields,
            change_log,
        } = proposal;

        if !rejected_fields.is_empty() {
            info!(
                "event=transition_fields_rejected module=service status=skip id={id} actor={} role={} fields={}",
                actor.id,
                actor.role,
                join_fields(&rejected_fields)
            );
        }

        if accepted.is_empty() {
            debug!("event=transition_apply module=service status=skip id={id} reason=noop");
            return Ok(TransitionOutcome {
                record: current.clone(),
                accepted,
                rejected_fields,
                change_log,
                audit_entry: None,
                notified: false,
            });
        }

        let record = match self.repo.apply_patch(id, guard, &accepted) {
            Ok(record) => record,
            Err(err) => {
                error!(
                    "event=transition_apply module=service status=error id={id} actor={} error={err}",
                    actor.id
                );
                return Err(err.into());
            }
        };
        let new_version = record.version();

        info!(
            "event=transition_apply module=service status=ok id={id} actor={} version={new_version} accepted={} rejected={}",
            actor.id,
            join_fields(accepted.keys()),
            rejected_fields.len()
        );

        let audit_entry = self.record_audit(actor, id, change_log.clone());
        let notified = triggers_notification && self.notify_assignment(&record);
        self.publish(&record);

        Ok(TransitionOutcome {
            record,
            accepted,
            rejected_fields,
            change_log,
            audit_entry,
            notified,
        })
    }

    fn record_audit(
        &self,
        actor: &User,
        id: CorrespondenceId,
        changes: ChangeLog,
    ) -> Option<AuditEntryId> {
        let entry = AuditEntry::new(actor.id.clone(), id, changes, self.clock.now_ms());
        match self.audit.append(&entry) {
            Ok(entry_id) => Some(entry_id),
            Err(err) => {
                error!(
                    "event=audit_append module=service status=error id={id} actor={} error={err}",
                    actor.id
                );
                None
            }
        }
    }

    fn notify_assignment(&self, record: &Correspondence) -> bool {
        let id = record.id();
        let Some(officer) = record.action_officer() else {
            warn!("event=notify_assignment module=service status=skip id={id} reason=no_action_officer");
            return false;
        };

        match self.notifier.send(officer, &assignment_message(record)) {
            Ok(()) => {
                info!("event=notify_assignment module=service status=ok id={id} recipient={officer}");
                true
            }
            Err(err) => {
                warn!(
                    "event=notify_assignment module=service status=error id={id} recipient={officer} error={err}"
                );
                false
            }
        }
    }

    fn publish(&self, record: &Correspondence) {
        if let Some(feed) = &self.feed {
            let delivered = feed.publish(record);
            debug!(
                "event=feed_publish module=service status=ok id={} subscribers={delivered}",
                record.id()
            );
        }
    }
}

fn ensure_actor(actor: &User) -> Result<(), ServiceError> {
    if is_valid_user_id(&actor.id) {
        Ok(())
    } else {
        Err(ServiceError::InvalidActor(actor.id.clone()))
    }
}

fn join_fields<'a>(fields: impl IntoIterator<Item = &'a Field>) -> String {
    fields
        .into_iter()
        .map(|field| field.as_str())
        .collect::<Vec<_>>()
        .join(",")
}
