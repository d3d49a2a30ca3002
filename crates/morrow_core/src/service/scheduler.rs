//! Daily planning fan-out across all users.
//!
//! # Responsibility
//! - Run one planning pass per user at the scheduled trigger.
//! - Isolate per-user failures so one bad account never aborts the cycle.
//!
//! # Invariants
//! - Failures are logged per user and counted; nothing is retried mid-cycle.

use crate::repo::todo_repo::SqliteTodoRepository;
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::RepoResult;
use crate::service::planner_service::{PlanOutcome, PlannerService};
use chrono::{DateTime, Local};
use log::{error, info};
use rusqlite::Connection;

/// Summary of one scheduler cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlanRunSummary {
    pub users_total: u32,
    pub users_planned: u32,
    pub users_skipped: u32,
    pub users_failed: u32,
}

/// Runs the planning engine once for every known user.
///
/// Listing the users is the only fallible step that aborts the run; each
/// individual planning failure is logged and counted instead.
pub fn plan_all_users(conn: &mut Connection, now: DateTime<Local>) -> RepoResult<PlanRunSummary> {
    let user_ids = {
        let users = SqliteUserRepository::try_new(conn)?;
        users.list_user_ids()?
    };

    let mut summary = PlanRunSummary {
        users_total: user_ids.len() as u32,
        ..PlanRunSummary::default()
    };

    for user_id in user_ids {
        let outcome = SqliteTodoRepository::try_new(conn)
            .map_err(Into::into)
            .and_then(|repo| PlannerService::new(repo).plan_tomorrow(user_id, now));
        match outcome {
            Ok(PlanOutcome::Planned { tasks_planned, .. }) => {
                summary.users_planned += 1;
                info!(
                    "event=scheduler_user module=scheduler status=ok user={user_id} tasks_planned={tasks_planned}"
                );
            }
            Ok(PlanOutcome::AlreadyPlanned { tasks_existing }) => {
                summary.users_skipped += 1;
                info!(
                    "event=scheduler_user module=scheduler status=skipped user={user_id} tasks_existing={tasks_existing}"
                );
            }
            Err(err) => {
                summary.users_failed += 1;
                error!(
                    "event=scheduler_user module=scheduler status=error user={user_id} error={err}"
                );
            }
        }
    }

    info!(
        "event=scheduler_cycle module=scheduler status=ok total={} planned={} skipped={} failed={}",
        summary.users_total, summary.users_planned, summary.users_skipped, summary.users_failed
    );
    Ok(summary)
}
