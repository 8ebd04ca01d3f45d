//! Read-only dashboard projections.
//!
//! # Responsibility
//! - Scope the record set to what a viewer may see.
//! - Build the status histogram and the upcoming-deadline schedule.
//! - Keep a live snapshot current from the change feed.
//!
//! # Invariants
//! - Projections never mutate records.
//! - `level2AO`/`level3AO` viewers see only records assigned to themselves
//!   or to their deputy; every other role sees everything.
//! - Upcoming deadlines are ordered by deadline, then subject, then id.

use crate::feed::{CorrespondenceFeed, FeedEvent, Subscription};
use crate::model::correspondence::{Correspondence, CorrespondenceId, CorrespondenceStatus};
use crate::model::user::{Role, User};
use crate::repo::correspondence_repo::{CorrespondenceListQuery, CorrespondenceRepository};
use crate::service::correspondence_service::ServiceError;
use log::debug;
use std::collections::BTreeMap;

/// Status -> record count over the visible set. Absent statuses are omitted.
pub type StatusHistogram = BTreeMap<CorrespondenceStatus, usize>;

/// One schedule row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpcomingDeadline {
    pub id: CorrespondenceId,
    pub subject: String,
    /// Unix epoch milliseconds.
    pub deadline_date: i64,
}

/// Returns whether `viewer` may see `record` on dashboards.
pub fn is_visible_to(record: &Correspondence, viewer: &User) -> bool {
    match viewer.role {
        Role::Level2Ao | Role::Level3Ao => record.action_officer().is_some_and(|officer| {
            officer == viewer.id || viewer.deputy.as_deref() == Some(officer)
        }),
        Role::Level1Ao | Role::Secretary | Role::Admin => true,
    }
}

/// Counts visible records per status in a single pass.
pub fn status_histogram<'a>(
    records: impl IntoIterator<Item = &'a Correspondence>,
    viewer: &User,
) -> StatusHistogram {
    let mut histogram = StatusHistogram::new();
    for record in records {
        if is_visible_to(record, viewer) {
            *histogram.entry(record.status()).or_default() += 1;
        }
    }
    histogram
}

/// Visible `Sent to AO`/`Processing` records with a deadline, soonest first.
pub fn upcoming_deadlines<'a>(
    records: impl IntoIterator<Item = &'a Correspondence>,
    viewer: &User,
) -> Vec<UpcomingDeadline> {
    let mut rows: Vec<UpcomingDeadline> = records
        .into_iter()
        .filter(|record| {
            matches!(
                record.status(),
                CorrespondenceStatus::SentToAo | CorrespondenceStatus::Processing
            ) && is_visible_to(record, viewer)
        })
        .filter_map(|record| {
            record.deadline_date().map(|deadline_date| UpcomingDeadline {
                id: record.id(),
                subject: record.subject().to_string(),
                deadline_date,
            })
        })
        .collect();

    rows.sort_by(|left, right| {
        left.deadline_date
            .cmp(&right.deadline_date)
            .then_with(|| left.subject.cmp(&right.subject))
            .then_with(|| left.id.cmp(&right.id))
    });
    rows
}

/// Both dashboard views for one viewer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardSnapshot {
    pub histogram: StatusHistogram,
    pub upcoming: Vec<UpcomingDeadline>,
    /// Number of records visible to the viewer.
    pub visible_total: usize,
}

impl DashboardSnapshot {
    pub fn build<'a, I>(records: I, viewer: &User) -> Self
    where
        I: IntoIterator<Item = &'a Correspondence>,
        I::IntoIter: Clone,
    {
        let records = records.into_iter();
        let histogram = status_histogram(records.clone(), viewer);
        Self {
            visible_total: histogram.values().sum(),
            upcoming: upcoming_deadlines(records, viewer),
            histogram,
        }
    }
}

/// Dashboard queries over a correspondence store.
pub struct DashboardService<R: CorrespondenceRepository> {
    repo: R,
}

impl<R: CorrespondenceRepository> DashboardService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// One-shot snapshot over the full record set.
    pub fn snapshot(&self, viewer: &User) -> Result<DashboardSnapshot, ServiceError> {
        let records = self.repo.list(&CorrespondenceListQuery::default())?;
        Ok(DashboardSnapshot::build(&records, viewer))
    }

    /// Visible records, newest first.
    pub fn recent(
        &self,
        viewer: &User,
        limit: usize,
    ) -> Result<Vec<Correspondence>, ServiceError> {
        let records = self.repo.list(&CorrespondenceListQuery::default())?;
        Ok(records
            .into_iter()
            .filter(|record| is_visible_to(record, viewer))
            .take(limit)
            .collect())
    }

    /// Starts a live dashboard fed by `feed`.
    ///
    /// Subscribes before the initial read so no change between the two is lost.
    pub fn live(
        &self,
        feed: &CorrespondenceFeed,
        viewer: User,
    ) -> Result<LiveDashboard, ServiceError> {
        let subscription = feed.subscribe();
        let initial = self.repo.list(&CorrespondenceListQuery::default())?;
        Ok(LiveDashboard::with_subscription(subscription, viewer, initial))
    }
}

/// Dashboard kept current from the change feed.
///
/// Dropping it releases the feed subscription.
pub struct LiveDashboard {
    viewer: User,
    records: BTreeMap<CorrespondenceId, Correspondence>,
    snapshot: DashboardSnapshot,
    subscription: Subscription,
}

impl LiveDashboard {
    /// Subscribes to `feed` and seeds state from `initial`.
    pub fn start(feed: &CorrespondenceFeed, viewer: User, initial: Vec<Correspondence>) -> Self {
        Self::with_subscription(feed.subscribe(), viewer, initial)
    }

    fn with_subscription(
        subscription: Subscription,
        viewer: User,
        initial: Vec<Correspondence>,
    ) -> Self {
        let mut dashboard = Self {
            viewer,
            records: BTreeMap::new(),
            snapshot: DashboardSnapshot::default(),
            subscription,
        };
        for record in initial {
            dashboard.upsert(record);
        }
        dashboard.rebuild();
        dashboard
    }

    pub fn viewer(&self) -> &User {
        &self.viewer
    }

    pub fn snapshot(&self) -> &DashboardSnapshot {
        &self.snapshot
    }

    /// Applies pending feed events; returns whether the snapshot changed.
    pub fn refresh(&mut self) -> bool {
        let events = self.subscription.drain();
        if events.is_empty() {
            return false;
        }

        let mut touched = false;
        for FeedEvent::Upserted(record) in events {
            touched |= self.upsert(record);
        }
        if !touched {
            return false;
        }

        let previous = std::mem::take(&mut self.snapshot);
        self.rebuild();
        let changed = previous != self.snapshot;
        debug!(
            "event=dashboard_refresh module=dashboard status=ok viewer={} changed={changed} visible={}",
            self.viewer.id, self.snapshot.visible_total
        );
        changed
    }

    fn upsert(&mut self, record: Correspondence) -> bool {
        let id = record.id();
        if !is_visible_to(&record, &self.viewer) {
            return self.records.remove(&id).is_some();
        }
        match self.records.get(&id) {
            Some(known) if known.version() >= record.version() => false,
            _ => {
                self.records.insert(id, record);
                true
            }
        }
    }

    fn rebuild(&mut self) {
        self.snapshot = DashboardSnapshot::build(self.records.values(), &self.viewer);
    }
}
