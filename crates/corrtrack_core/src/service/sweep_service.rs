//! Scheduled status sweeper.
//!
//! # Responsibility
//! - Advance every `Sent to AO` record whose `dateToAO` has passed to
//!   `Processing`.
//!
//! # Invariants
//! - Sweeps run as the system actor through the transition engine, so each
//!   advance is audited like any user edit.
//! - Writes always carry a version guard: overlapping sweeps never advance
//!   the same record twice.
//! - Re-running with the same `now` after a completed sweep advances nothing.

use crate::clock::Clock;
use crate::model::correspondence::{CorrespondenceStatus, Field, FieldPatch};
use crate::model::user::User;
use crate::repo::audit_repo::AuditSink;
use crate::repo::correspondence_repo::{
    CorrespondenceListQuery, CorrespondenceRepository, WriteGuard,
};
use crate::repo::notification_repo::Notifier;
use crate::service::correspondence_service::{CorrespondenceService, ServiceError};
use log::{debug, info};
use std::time::Instant;

/// Counters for one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records matching the selection predicate when the sweep started.
    pub selected: usize,
    /// Records moved to `Processing` by this pass.
    pub advanced: usize,
    /// Records changed or removed by someone else mid-sweep.
    pub skipped: usize,
}

/// Batch job advancing overdue `Sent to AO` records.
pub struct StatusSweeper<'svc, R, A, N, C>
where
    R: CorrespondenceRepository,
    A: AuditSink,
    N: Notifier,
    C: Clock,
{
    service: &'svc CorrespondenceService<R, A, N, C>,
    actor: User,
}

impl<'svc, R, A, N, C> StatusSweeper<'svc, R, A, N, C>
where
    R: CorrespondenceRepository,
    A: AuditSink,
    N: Notifier,
    C: Clock,
{
    pub fn new(service: &'svc CorrespondenceService<R, A, N, C>) -> Self {
        Self {
            service,
            actor: User::system(),
        }
    }

    /// Advances overdue records and returns how many were advanced.
    pub fn sweep(&self, now: i64) -> Result<usize, ServiceError> {
        self.sweep_with_report(now).map(|report| report.advanced)
    }

    /// Same as [`StatusSweeper::sweep`] with full counters.
    ///
    /// # Errors
    /// - Store failures other than a concurrent change abort the pass;
    ///   records advanced before the failure stay advanced.
    pub fn sweep_with_report(&self, now: i64) -> Result<SweepReport, ServiceError> {
        let started_at = Instant::now();
        let candidates = self.service.list(&CorrespondenceListQuery {
            status: Some(CorrespondenceStatus::SentToAo),
            date_to_ao_at_or_before: Some(now),
            ..CorrespondenceListQuery::default()
        })?;

        let mut edits = FieldPatch::new();
        edits.insert(Field::Status, CorrespondenceStatus::Processing.into());

        let mut report = SweepReport {
            selected: candidates.len(),
            ..SweepReport::default()
        };

        for candidate in &candidates {
            let guard = WriteGuard::ExpectVersion(candidate.version());
            match self
                .service
                .apply_guarded(candidate, &edits, &self.actor, guard)
            {
                Ok(outcome) if !outcome.is_noop() => report.advanced += 1,
                Ok(_) => report.skipped += 1,
                Err(ServiceError::Conflict { id, .. } | ServiceError::NotFound(id)) => {
                    debug!("event=status_sweep module=sweep status=skip id={id} reason=concurrent_change");
                    report.skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            "event=status_sweep module=sweep status=ok now={now} selected={} advanced={} skipped={} duration_ms={}",
            report.selected,
            report.advanced,
            report.skipped,
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }
}
