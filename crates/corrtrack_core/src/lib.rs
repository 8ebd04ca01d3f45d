//! Core domain logic for correspondence tracking.
//! This crate owns the record lifecycle, field permissions and the audit
//! and notification side effects of every accepted edit.

pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod feed;
pub mod logging;
pub mod model;
pub mod policy;
pub mod repo;
pub mod service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use engine::transition::{propose, EngineOptions, Proposal, TransitionEngine};
pub use feed::{CorrespondenceFeed, FeedEvent, Subscription};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::audit::{AuditEntry, AuditEntryId, ChangeLog, FieldChange};
pub use model::correspondence::{
    Correspondence, CorrespondenceId, CorrespondenceStatus, CorrespondenceValidationError, Field,
    FieldPatch, FieldValue,
};
pub use model::notification::Notification;
pub use model::user::{Role, User, UserId, SYSTEM_USER_ID};
pub use policy::role_policy::{can_write, writable_fields};
pub use repo::audit_repo::{AuditSink, SqliteAuditRepository};
pub use repo::correspondence_repo::{
    CorrespondenceListQuery, CorrespondenceRepository, RepoError, RepoResult,
    SqliteCorrespondenceRepository, WriteGuard,
};
pub use repo::notification_repo::{Notifier, SqliteNotificationRepository};
pub use service::correspondence_service::{
    ConcurrencyMode, CorrespondenceService, CreateCorrespondenceRequest, ServiceError,
    TransitionOutcome,
};
pub use service::dashboard_service::{
    DashboardService, DashboardSnapshot, LiveDashboard, StatusHistogram, UpcomingDeadline,
};
pub use service::sweep_service::{StatusSweeper, SweepReport};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
