//! Daily attendance: reconciliation of reactions against the roster, the
//! per-day prompt ledger, reporting, and the `!attendance` command.

pub mod ledger;
pub mod query;
pub mod reconcile;
pub mod report;
pub mod service;
pub mod types;

pub use ledger::AttendanceLedger;
pub use reconcile::{Reconciler, reconcile};
pub use service::{AttendanceService, PromptOutcome, SummaryOutcome};
pub use types::{AttendanceRecord, AttendanceStatus, DateRange, Markers};
