//! Planning engine: assigns tomorrow's tasks from completion history.
//!
//! # Responsibility
//! - Analyze one user's completion history (weekday and category histograms).
//! - Reassign due dates so tomorrow carries a sensible workload.
//!
//! # Invariants
//! - A calendar day is never planned twice: any existing due date inside
//!   tomorrow's window short-circuits the run.
//! - High-priority pending tasks are always included, regardless of the
//!   derived optimal count.
//! - The engine mutates `due_date` only; everything else is read-only here.
//!
//! The heuristic is open-loop: deterministic and idempotent per calendar day
//! so the midnight scheduler can retry safely, but not an optimal planner.

use crate::model::todo::{Priority, Todo};
use crate::model::user::UserId;
use crate::repo::{RepoError, TodoRepository};
use chrono::{DateTime, Datelike, Days, Local, LocalResult, NaiveTime, TimeZone};
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;
/// Floor for the daily task budget, even with no completion history.
const MIN_DAILY_TASKS: u32 = 3;

pub type PlanResult<T> = Result<T, PlanError>;

/// Planning-run failure.
#[derive(Debug)]
pub enum PlanError {
    Repo(RepoError),
    /// Tomorrow's local midnight could not be resolved to an instant.
    UnresolvableWindow,
}

impl Display for PlanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::UnresolvableWindow => {
                write!(f, "could not resolve tomorrow's local midnight")
            }
        }
    }
}

impl Error for PlanError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::UnresolvableWindow => None,
        }
    }
}

impl From<RepoError> for PlanError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Per-category completion histogram entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub count: u32,
    /// Sum of `completed_at - created_at`, taken as-is (may be negative for
    /// anomalous records).
    pub total_duration_ms: i64,
}

/// Analysis bundle returned with a successful planning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionAnalysis {
    /// Weekday with the most completions, 0 = Sunday. Ties resolve to the
    /// lowest index; 0 when there is no history.
    pub most_productive_day: u32,
    pub completion_by_category: BTreeMap<String, CategoryStats>,
    /// Mean duration per category in whole milliseconds; integer division
    /// truncates toward zero.
    pub average_completion_time: BTreeMap<String, i64>,
}

/// Outcome of one planning run.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    /// Tomorrow already had assignments; nothing was written.
    AlreadyPlanned { tasks_existing: u32 },
    /// Tomorrow was planned; `tasks_planned` counts todos now due tomorrow.
    Planned {
        tasks_planned: u32,
        analysis: CompletionAnalysis,
    },
}

/// Use-case service wrapper for the planning heuristic.
pub struct PlannerService<R: TodoRepository> {
    repo: R,
}

impl<R: TodoRepository> PlannerService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Runs one planning pass for `user` relative to `now`.
    ///
    /// # Contract
    /// - Idempotent per calendar day: a second run for the same day returns
    ///   `AlreadyPlanned` with the standing count.
    /// - Pending high-priority todos are reassigned unconditionally; medium
    ///   ones fill the remaining budget in stored order, only when they have
    ///   no due date yet.
    pub fn plan_tomorrow(&self, user: UserId, now: DateTime<Local>) -> PlanResult<PlanOutcome> {
        let (window_start, window_end) = tomorrow_window(now)?;

        let todos = self.repo.list_todos(user)?;
        let (completed, pending): (Vec<&Todo>, Vec<&Todo>) =
            todos.iter().partition(|todo| todo.completed);
        let analysis = analyze_completions(&completed);

        let existing = self.repo.count_due_between(user, window_start, window_end)?;
        if existing > 0 {
            info!(
                "event=plan_tomorrow module=planner status=skipped tasks_existing={existing}"
            );
            return Ok(PlanOutcome::AlreadyPlanned {
                tasks_existing: existing,
            });
        }

        let mut assigned_high: u32 = 0;
        for todo in pending.iter().filter(|t| t.priority == Priority::High) {
            self.repo.set_due_date(todo.uuid, user, window_start)?;
            assigned_high += 1;
        }

        let optimal = optimal_task_count(completed.len());
        let additional_needed = optimal.saturating_sub(assigned_high);

        let mut added: u32 = 0;
        for todo in pending
            .iter()
            .filter(|t| t.priority == Priority::Medium && t.due_date.is_none())
        {
            if added == additional_needed {
                break;
            }
            self.repo.set_due_date(todo.uuid, user, window_start)?;
            added += 1;
        }

        // Re-read rather than trusting the in-memory count; concurrent
        // mutations during the run are an accepted race.
        let tasks_planned = self.repo.count_due_between(user, window_start, window_end)?;
        info!(
            "event=plan_tomorrow module=planner status=ok tasks_planned={tasks_planned} high={assigned_high} medium={added}"
        );

        Ok(PlanOutcome::Planned {
            tasks_planned,
            analysis,
        })
    }
}

/// Builds weekday/category histograms over completed todos.
///
/// Records missing a completion timestamp are skipped; durations are taken
/// as-is even when negative (data anomaly, not a rejection).
fn analyze_completions(completed: &[&Todo]) -> CompletionAnalysis {
    let mut by_day = [0u32; 7];
    let mut by_category: BTreeMap<String, CategoryStats> = BTreeMap::new();

    for todo in completed {
        let Some(completed_at) = todo.completed_at else {
            continue;
        };
        if let Some(day) = weekday_of_ms(completed_at) {
            by_day[day as usize] += 1;
        }

        let entry = by_category
            .entry(todo.category.clone())
            .or_insert(CategoryStats {
                count: 0,
                total_duration_ms: 0,
            });
        entry.count += 1;
        entry.total_duration_ms += completed_at - todo.created_at;
    }

    let mut most_productive_day = 0u32;
    for (day, &count) in by_day.iter().enumerate() {
        if count > by_day[most_productive_day as usize] {
            most_productive_day = day as u32;
        }
    }

    let average_completion_time = by_category
        .iter()
        .filter(|(_, stats)| stats.count > 0)
        .map(|(category, stats)| {
            // Whole-millisecond mean, truncated toward zero.
            (
                category.clone(),
                stats.total_duration_ms / i64::from(stats.count),
            )
        })
        .collect();

    CompletionAnalysis {
        most_productive_day,
        completion_by_category: by_category,
        average_completion_time,
    }
}

/// Daily task budget: `ceil(max(3, completed/7 + 1))`.
///
/// Uses the whole completed-history count as a rolling-average proxy.
fn optimal_task_count(completed_count: usize) -> u32 {
    let raw = completed_count as f64 / 7.0 + 1.0;
    raw.max(f64::from(MIN_DAILY_TASKS)).ceil() as u32
}

/// Local weekday of an epoch-milliseconds instant, 0 = Sunday.
fn weekday_of_ms(epoch_ms: i64) -> Option<u32> {
    match Local.timestamp_millis_opt(epoch_ms) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
            Some(dt.weekday().num_days_from_sunday())
        }
        LocalResult::None => None,
    }
}

/// Resolves `[tomorrow 00:00 local, +24h)` as epoch milliseconds.
pub fn tomorrow_window(now: DateTime<Local>) -> PlanResult<(i64, i64)> {
    let date = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .ok_or(PlanError::UnresolvableWindow)?;
    let mut naive = date.and_time(NaiveTime::MIN);

    // A DST transition can remove local midnight; probe forward in
    // half-hour steps until the local time exists.
    for _ in 0..=4 {
        match Local.from_local_datetime(&naive) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
                let start = dt.timestamp_millis();
                return Ok((start, start + DAY_MS));
            }
            LocalResult::None => {
                naive += chrono::Duration::minutes(30);
            }
        }
    }

    Err(PlanError::UnresolvableWindow)
}

#[cfg(test)]
mod tests {
    use super::{analyze_completions, optimal_task_count, tomorrow_window};
    use crate::model::todo::Todo;
    use chrono::{Local, TimeZone, Timelike};
    use uuid::Uuid;

    fn completed_todo(category: &str, created_at: i64, completed_at: i64) -> Todo {
        let mut todo = Todo::new(Uuid::new_v4(), "t", created_at);
        todo.category = category.to_string();
        todo.completed = true;
        todo.completed_at = Some(completed_at);
        todo
    }

    #[test]
    fn optimal_count_floors_at_three() {
        assert_eq!(optimal_task_count(0), 3);
        assert_eq!(optimal_task_count(7), 3);
        assert_eq!(optimal_task_count(14), 3);
        assert_eq!(optimal_task_count(15), 4);
        assert_eq!(optimal_task_count(21), 4);
        assert_eq!(optimal_task_count(28), 5);
    }

    #[test]
    fn average_completion_time_is_arithmetic_mean() {
        let todos = vec![
            completed_todo("work", 0, 1_000),
            completed_todo("work", 0, 3_000),
            completed_todo("home", 100, 200),
        ];
        let refs: Vec<&Todo> = todos.iter().collect();
        let analysis = analyze_completions(&refs);

        assert_eq!(analysis.average_completion_time["work"], 2_000);
        assert_eq!(analysis.average_completion_time["home"], 100);
        assert_eq!(analysis.completion_by_category["work"].count, 2);
        assert_eq!(analysis.completion_by_category["work"].total_duration_ms, 4_000);
    }

    #[test]
    fn average_of_non_divisible_total_truncates_toward_zero() {
        let todos = vec![
            completed_todo("work", 0, 1_000),
            completed_todo("work", 0, 2_001),
        ];
        let refs: Vec<&Todo> = todos.iter().collect();
        let analysis = analyze_completions(&refs);
        // 3001 / 2 = 1500 in whole milliseconds.
        assert_eq!(analysis.average_completion_time["work"], 1_500);
    }

    #[test]
    fn negative_durations_count_as_is() {
        let todos = vec![completed_todo("odd", 5_000, 1_000)];
        let refs: Vec<&Todo> = todos.iter().collect();
        let analysis = analyze_completions(&refs);
        assert_eq!(analysis.completion_by_category["odd"].total_duration_ms, -4_000);
    }

    #[test]
    fn records_without_completion_timestamp_are_skipped() {
        let mut anomalous = completed_todo("work", 0, 0);
        anomalous.completed_at = None;
        let todos = vec![anomalous];
        let refs: Vec<&Todo> = todos.iter().collect();
        let analysis = analyze_completions(&refs);
        assert!(analysis.completion_by_category.is_empty());
        assert_eq!(analysis.most_productive_day, 0);
    }

    #[test]
    fn most_productive_day_ties_resolve_to_lowest_index() {
        // Two completions on one weekday, two on a later weekday.
        let base = Local
            .with_ymd_and_hms(2024, 7, 1, 12, 0, 0) // a Monday
            .single()
            .unwrap();
        let monday = base.timestamp_millis();
        let wednesday = (base + chrono::Duration::days(2)).timestamp_millis();

        let todos = vec![
            completed_todo("a", 0, monday),
            completed_todo("a", 0, monday),
            completed_todo("a", 0, wednesday),
            completed_todo("a", 0, wednesday),
        ];
        let refs: Vec<&Todo> = todos.iter().collect();
        let analysis = analyze_completions(&refs);
        assert_eq!(analysis.most_productive_day, 1); // Monday, 0 = Sunday
    }

    #[test]
    fn tomorrow_window_starts_at_local_midnight() {
        let now = Local::now();
        let (start, end) = tomorrow_window(now).unwrap();
        assert_eq!(end - start, 24 * 60 * 60 * 1000);

        let start_dt = Local.timestamp_millis_opt(start).single().unwrap();
        assert_eq!(start_dt.hour(), 0);
        assert_eq!(start_dt.minute(), 0);
        assert!(start_dt.date_naive() > now.date_naive());
        assert_eq!(
            start_dt.date_naive(),
            now.date_naive().succ_opt().unwrap()
        );
    }
}
