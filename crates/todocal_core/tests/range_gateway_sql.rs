mod common;

use common::{day, month};
use rusqlite::Connection;
use std::collections::BTreeSet;
use todocal_core::repo::todo_repo::TodoValidationError;
use todocal_core::{
    completion_key, open_db_in_memory, DateRange, GatewayError, MutationScope, NewTodo,
    RangeQueryGateway, RepoError, SqliteRangeGateway, SqliteTodoRepository,
};

fn january() -> DateRange {
    DateRange::new(day(2026, 1, 1), day(2026, 1, 31)).unwrap()
}

fn candidate_titles(conn: &Connection, range: &DateRange) -> BTreeSet<String> {
    SqliteRangeGateway::try_new(conn)
        .unwrap()
        .query_todo_candidates(range)
        .unwrap()
        .into_iter()
        .map(|row| row.title)
        .collect()
}

#[test]
fn todo_candidates_follow_range_predicates() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTodoRepository::new(&conn);
    let create = |todo: NewTodo| repo.create_todo(&todo).unwrap();

    create(NewTodo::on_date("single in range", day(2026, 1, 15)));
    create(NewTodo::on_date("single before", day(2025, 12, 31)));
    create(NewTodo::period("period overlapping", day(2025, 12, 20), day(2026, 1, 2)));
    create(NewTodo::period("period after", day(2026, 2, 1), day(2026, 2, 3)));
    create(NewTodo {
        title: "start only".to_string(),
        start_date: Some(day(2026, 1, 9)),
        is_all_day: true,
        ..NewTodo::default()
    });
    create(NewTodo::recurring("weekly active", day(2025, 6, 2), "FREQ=WEEKLY"));
    let mut ended = NewTodo::recurring("weekly ended", day(2025, 6, 2), "FREQ=WEEKLY");
    ended.recurrence_end_date = Some(day(2025, 12, 31));
    create(ended);
    create(NewTodo::recurring("weekly later", day(2026, 2, 2), "FREQ=WEEKLY"));

    let titles = candidate_titles(&conn, &january());

    let expected: BTreeSet<String> = [
        "single in range",
        "period overlapping",
        "start only",
        "weekly active",
    ]
    .into_iter()
    .map(str::to_string)
    .collect();
    assert_eq!(titles, expected);
}

#[test]
fn soft_deleted_todos_are_excluded() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTodoRepository::new(&conn);
    let kept = repo
        .create_todo(&NewTodo::on_date("kept", day(2026, 1, 10)))
        .unwrap();
    let deleted = repo
        .create_todo(&NewTodo::on_date("deleted", day(2026, 1, 10)))
        .unwrap();

    let mutation = repo.soft_delete_todo(deleted.todo_id).unwrap();
    assert_eq!(mutation.scope, MutationScope::Months(vec![month(2026, 1)]));

    let rows = SqliteRangeGateway::try_new(&conn)
        .unwrap()
        .query_todo_candidates(&january())
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, kept.todo_id);
    assert!(rows[0].deleted_at.is_none());
}

#[test]
fn category_is_joined_into_candidates() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTodoRepository::new(&conn);
    let work = repo.create_category("Work", "#3366FF", Some("briefcase")).unwrap();
    let mut todo = NewTodo::on_date("review", day(2026, 1, 20));
    todo.category_id = Some(work.id);
    repo.create_todo(&todo).unwrap();

    let rows = SqliteRangeGateway::try_new(&conn)
        .unwrap()
        .query_todo_candidates(&january())
        .unwrap();

    assert_eq!(rows[0].category_id, Some(work.id));
    assert_eq!(rows[0].category.as_ref(), Some(&work));
}

#[test]
fn completions_are_range_filtered_and_keyed() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTodoRepository::new(&conn);
    let single = repo
        .create_todo(&NewTodo::on_date("once", day(2026, 1, 3)))
        .unwrap();
    let weekly = repo
        .create_todo(&NewTodo::recurring("weekly", day(2026, 1, 5), "FREQ=WEEKLY"))
        .unwrap();
    assert_eq!(weekly.scope, MutationScope::All);

    repo.complete(single.todo_id, day(2026, 1, 3)).unwrap();
    repo.complete(weekly.todo_id, day(2026, 1, 12)).unwrap();
    repo.complete(weekly.todo_id, day(2026, 2, 2)).unwrap();
    // Completing the same occurrence again replaces the row.
    repo.complete(weekly.todo_id, day(2026, 1, 12)).unwrap();

    let rows = SqliteRangeGateway::try_new(&conn)
        .unwrap()
        .query_completion_candidates(&january())
        .unwrap();
    let keys: Vec<String> = rows.iter().map(|row| row.key.clone()).collect();
    assert_eq!(
        keys,
        vec![
            completion_key(single.todo_id, None),
            completion_key(weekly.todo_id, Some(day(2026, 1, 12))),
        ]
    );

    repo.uncomplete(weekly.todo_id, day(2026, 1, 12)).unwrap();
    let rows = SqliteRangeGateway::try_new(&conn)
        .unwrap()
        .query_completion_candidates(&january())
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[test]
fn malformed_rows_are_reported_as_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO todos (id, title, date) VALUES ('not-a-uuid', 'broken', '2026-01-05');",
        [],
    )
    .unwrap();

    let err = SqliteRangeGateway::try_new(&conn)
        .unwrap()
        .query_todo_candidates(&january())
        .unwrap_err();
    assert!(matches!(err, GatewayError::InvalidData(_)), "got {err}");
}

#[test]
fn period_mutation_reports_every_touched_month() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTodoRepository::new(&conn);
    let mutation = repo
        .create_todo(&NewTodo::period("trip", day(2025, 12, 28), day(2026, 2, 2)))
        .unwrap();
    assert_eq!(
        mutation.scope,
        MutationScope::Months(vec![month(2025, 12), month(2026, 1), month(2026, 2)])
    );
}

#[test]
fn invalid_input_is_rejected_before_sql() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTodoRepository::new(&conn);

    let err = repo
        .create_todo(&NewTodo::on_date("   ", day(2026, 1, 1)))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(TodoValidationError::BlankTitle)
    ));

    let err = repo
        .create_todo(&NewTodo::period("bad", day(2026, 1, 5), day(2026, 1, 1)))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(TodoValidationError::InvertedPeriod { .. })
    ));

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM todos;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}
