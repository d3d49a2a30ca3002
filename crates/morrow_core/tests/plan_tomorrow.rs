use chrono::Local;
use morrow_core::db::open_db_in_memory;
use morrow_core::service::planner_service::tomorrow_window;
use morrow_core::{
    plan_all_users, CreateTodoInput, PlanOutcome, PlannerService, Priority, SqliteTodoRepository,
    SqliteUserRepository, Todo, TodoService, UpdateTodoInput, User, UserId, UserRepository,
};
use rusqlite::Connection;

const NOW: i64 = 1_700_000_000_000;
const HOUR_MS: i64 = 60 * 60 * 1000;

fn seed_user(conn: &Connection, email: &str) -> UserId {
    let repo = SqliteUserRepository::try_new(conn).unwrap();
    let user = User::new(email, NOW);
    repo.create_user(&user).unwrap()
}

fn seed_todo(
    conn: &mut Connection,
    owner: UserId,
    title: &str,
    priority: Priority,
    due_date: Option<i64>,
) -> Todo {
    let mut todos = TodoService::new(SqliteTodoRepository::try_new(conn).unwrap());
    todos
        .create_at(
            owner,
            CreateTodoInput {
                title: title.to_string(),
                priority: Some(priority),
                due_date,
                ..CreateTodoInput::default()
            },
            NOW,
        )
        .unwrap()
}

fn seed_completed(conn: &mut Connection, owner: UserId, category: &str, n: usize) {
    let mut todos = TodoService::new(SqliteTodoRepository::try_new(conn).unwrap());
    for i in 0..n {
        let created = todos
            .create_at(
                owner,
                CreateTodoInput {
                    title: format!("done {i}"),
                    category: Some(category.to_string()),
                    ..CreateTodoInput::default()
                },
                NOW,
            )
            .unwrap();
        todos
            .update_at(
                owner,
                created.uuid,
                UpdateTodoInput {
                    completed: Some(true),
                    ..UpdateTodoInput::default()
                },
                NOW + HOUR_MS,
            )
            .unwrap();
    }
}

fn run_plan(conn: &mut Connection, owner: UserId) -> PlanOutcome {
    let planner = PlannerService::new(SqliteTodoRepository::try_new(conn).unwrap());
    planner.plan_tomorrow(owner, Local::now()).unwrap()
}

fn due_dates(conn: &mut Connection, owner: UserId) -> Vec<(String, Option<i64>)> {
    let todos = TodoService::new(SqliteTodoRepository::try_new(conn).unwrap());
    todos
        .list(owner)
        .unwrap()
        .into_iter()
        .map(|todo| (todo.title, todo.due_date))
        .collect()
}

#[test]
fn plans_the_floor_of_three_with_no_history() {
    let mut conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "a@example.com");
    for i in 0..5 {
        seed_todo(&mut conn, owner, &format!("m{i}"), Priority::Medium, None);
    }
    seed_todo(&mut conn, owner, "someday", Priority::Low, None);

    let outcome = run_plan(&mut conn, owner);
    let (window_start, _) = tomorrow_window(Local::now()).unwrap();

    match outcome {
        PlanOutcome::Planned { tasks_planned, .. } => assert_eq!(tasks_planned, 3),
        other => panic!("unexpected outcome: {other:?}"),
    }

    let dues = due_dates(&mut conn, owner);
    // Mediums fill the budget in stored order; low priority is never picked.
    assert_eq!(dues[0], ("m0".to_string(), Some(window_start)));
    assert_eq!(dues[1], ("m1".to_string(), Some(window_start)));
    assert_eq!(dues[2], ("m2".to_string(), Some(window_start)));
    assert_eq!(dues[3].1, None);
    assert_eq!(dues[4].1, None);
    assert_eq!(dues[5], ("someday".to_string(), None));
}

#[test]
fn high_priority_tasks_are_always_assigned() {
    let mut conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "a@example.com");
    for i in 0..5 {
        // Even a stale due date does not exempt a high-priority task.
        seed_todo(
            &mut conn,
            owner,
            &format!("h{i}"),
            Priority::High,
            Some(NOW - HOUR_MS),
        );
    }
    seed_todo(&mut conn, owner, "filler", Priority::Medium, None);

    let outcome = run_plan(&mut conn, owner);
    match outcome {
        // Five high already exceed the budget of three; no medium is added.
        PlanOutcome::Planned { tasks_planned, .. } => assert_eq!(tasks_planned, 5),
        other => panic!("unexpected outcome: {other:?}"),
    }

    let dues = due_dates(&mut conn, owner);
    let (window_start, _) = tomorrow_window(Local::now()).unwrap();
    for (title, due) in &dues[..5] {
        assert_eq!(*due, Some(window_start), "todo {title} not reassigned");
    }
    assert_eq!(dues[5].1, None);
}

#[test]
fn mediums_with_existing_due_dates_are_not_candidates() {
    let mut conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "a@example.com");
    let overdue = seed_todo(
        &mut conn,
        owner,
        "overdue",
        Priority::Medium,
        Some(NOW - HOUR_MS),
    );
    for i in 0..3 {
        seed_todo(&mut conn, owner, &format!("m{i}"), Priority::Medium, None);
    }

    let outcome = run_plan(&mut conn, owner);
    match outcome {
        PlanOutcome::Planned { tasks_planned, .. } => assert_eq!(tasks_planned, 3),
        other => panic!("unexpected outcome: {other:?}"),
    }

    let dues = due_dates(&mut conn, owner);
    assert_eq!(dues[0], (overdue.title, Some(NOW - HOUR_MS)));
}

#[test]
fn completion_history_raises_the_budget() {
    let mut conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "a@example.com");
    // 21 completions: ceil(21 / 7 + 1) = 4.
    seed_completed(&mut conn, owner, "work", 21);
    seed_todo(&mut conn, owner, "urgent", Priority::High, None);
    for i in 0..5 {
        seed_todo(&mut conn, owner, &format!("m{i}"), Priority::Medium, None);
    }

    let outcome = run_plan(&mut conn, owner);
    match outcome {
        PlanOutcome::Planned {
            tasks_planned,
            analysis,
        } => {
            assert_eq!(tasks_planned, 4);
            assert_eq!(analysis.completion_by_category["work"].count, 21);
            assert_eq!(analysis.average_completion_time["work"], HOUR_MS);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn second_run_for_the_same_day_is_a_no_op() {
    let mut conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "a@example.com");
    for i in 0..4 {
        seed_todo(&mut conn, owner, &format!("m{i}"), Priority::Medium, None);
    }

    let first = run_plan(&mut conn, owner);
    let planned = match first {
        PlanOutcome::Planned { tasks_planned, .. } => tasks_planned,
        other => panic!("unexpected outcome: {other:?}"),
    };
    assert_eq!(planned, 3);

    let second = run_plan(&mut conn, owner);
    assert_eq!(
        second,
        PlanOutcome::AlreadyPlanned {
            tasks_existing: planned
        }
    );

    // The fourth medium stays unassigned.
    let dues = due_dates(&mut conn, owner);
    assert_eq!(dues[3].1, None);
}

#[test]
fn preexisting_tomorrow_assignment_short_circuits() {
    let mut conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "a@example.com");
    let (window_start, _) = tomorrow_window(Local::now()).unwrap();

    seed_todo(
        &mut conn,
        owner,
        "already scheduled",
        Priority::Medium,
        Some(window_start + HOUR_MS),
    );
    seed_todo(&mut conn, owner, "urgent", Priority::High, None);

    let outcome = run_plan(&mut conn, owner);
    assert_eq!(outcome, PlanOutcome::AlreadyPlanned { tasks_existing: 1 });

    // Short-circuit means nothing was written, not even the high priority.
    let dues = due_dates(&mut conn, owner);
    assert_eq!(dues[1], ("urgent".to_string(), None));
}

#[test]
fn scheduler_counts_a_corrupt_user_as_failed_and_plans_the_rest() {
    let mut conn = open_db_in_memory().unwrap();
    let broken = seed_user(&conn, "broken@example.com");
    let healthy = seed_user(&conn, "healthy@example.com");

    // Corrupt one row so the broken user's planning run fails on read.
    let bad = seed_todo(&mut conn, broken, "bad row", Priority::Medium, None);
    conn.execute(
        "UPDATE todos SET priority = 'urgent' WHERE uuid = ?1;",
        [bad.uuid.to_string()],
    )
    .unwrap();
    seed_todo(&mut conn, healthy, "fine", Priority::Medium, None);

    let summary = plan_all_users(&mut conn, Local::now()).unwrap();
    assert_eq!(summary.users_total, 2);
    assert_eq!(summary.users_failed, 1);
    assert_eq!(summary.users_planned, 1);
    assert_eq!(summary.users_skipped, 0);

    let (window_start, _) = tomorrow_window(Local::now()).unwrap();
    let healthy_dues = due_dates(&mut conn, healthy);
    assert_eq!(healthy_dues[0].1, Some(window_start));
}

#[test]
fn scheduler_covers_every_user_independently() {
    let mut conn = open_db_in_memory().unwrap();
    let alice = seed_user(&conn, "alice@example.com");
    let bob = seed_user(&conn, "bob@example.com");
    let (window_start, _) = tomorrow_window(Local::now()).unwrap();

    // Alice's tomorrow already carries a task; Bob still needs a plan.
    seed_todo(
        &mut conn,
        alice,
        "planned ahead",
        Priority::Medium,
        Some(window_start),
    );
    seed_todo(&mut conn, bob, "b1", Priority::Medium, None);
    seed_todo(&mut conn, bob, "b2", Priority::High, None);

    let summary = plan_all_users(&mut conn, Local::now()).unwrap();
    assert_eq!(summary.users_total, 2);
    assert_eq!(summary.users_planned, 1);
    assert_eq!(summary.users_skipped, 1);
    assert_eq!(summary.users_failed, 0);

    let bob_dues = due_dates(&mut conn, bob);
    assert_eq!(bob_dues[0], ("b1".to_string(), Some(window_start)));
    assert_eq!(bob_dues[1], ("b2".to_string(), Some(window_start)));
}
