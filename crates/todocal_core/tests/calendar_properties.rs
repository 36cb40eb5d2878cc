mod common;

use chrono::NaiveTime;
use common::{completion_row, day, month, period_row, recurring_row, single_row, FakeGateway};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use todocal_core::{
    completion_key, BatchAggregationService, CacheChange, CalendarDataCache, MonthData, MonthId,
    MonthWindow, MonthWindowManager, WeekStart,
};

fn assert_contiguous(window: &MonthWindow) {
    let ids = window.ids();
    for pair in ids.windows(2) {
        assert_eq!(pair[0].next(), Some(pair[1]), "gap or duplicate in window");
    }
}

/// Deterministic step sequence mixing small and large moves in both directions.
fn steps(seed: u64, count: usize) -> Vec<i32> {
    let mut state = seed;
    (0..count)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let magnitude = ((state >> 33) % 70) as i32;
            if (state >> 17) & 1 == 0 {
                magnitude
            } else {
                -magnitude
            }
        })
        .collect()
}

#[test]
fn window_stays_contiguous_for_any_growth_sequence() {
    for seed in 1..=20 {
        let mut manager = MonthWindowManager::new();
        manager.initialize(day(2026, 6, 15));
        for step in steps(seed, 40) {
            if step >= 0 {
                manager.append_future(step);
            } else {
                manager.prepend_past(-step);
            }
            assert_contiguous(manager.window());
        }
    }
}

#[test]
fn window_never_exceeds_ceiling_and_trims_to_retention() {
    for seed in 1..=20 {
        let mut manager = MonthWindowManager::new();
        manager.initialize(day(2026, 6, 15));
        for step in steps(seed, 40) {
            let before = manager.window().len();
            if step >= 0 {
                manager.append_future(step);
            } else {
                manager.prepend_past(-step);
            }
            let after = manager.window().len();
            assert!(after <= 100, "window grew to {after}");
            let untrimmed = before + step.unsigned_abs() as usize;
            if untrimmed > 100 {
                assert_eq!(after, 50);
            } else {
                assert_eq!(after, untrimmed);
            }
        }
    }
}

#[test]
fn empty_month_entry_counts_as_cached() {
    let cache = CalendarDataCache::new();
    let mut todos = BTreeMap::new();
    todos.insert(month(2026, 1), Vec::new());
    cache.set_batch_month_data(todos, BTreeMap::new());

    assert!(cache.has_month(month(2026, 1)));
    assert!(cache.month_data(month(2026, 1)).unwrap().is_empty());
    assert!(!cache.has_month(month(2026, 2)));
}

#[test]
fn aggregation_issues_two_queries_for_any_month_count() {
    for count in [1_i32, 2, 6, 24] {
        let gateway = FakeGateway::new();
        let service = BatchAggregationService::new(&gateway);
        let start = month(2026, 1);
        let ids: Vec<MonthId> = (0..count)
            .map(|delta| start.checked_offset(delta).unwrap())
            .collect();

        let result = service.aggregate(ids.iter().copied(), WeekStart::Sunday);

        assert_eq!(result.len(), count as usize);
        assert_eq!(gateway.calls(), 2, "for {count} months");
        assert_eq!(gateway.ranges().len(), 1);
    }
}

#[test]
fn global_range_covers_every_requested_grid() {
    let gateway = FakeGateway::new();
    let service = BatchAggregationService::new(&gateway);
    let result = service.aggregate_detailed([month(2026, 1), month(2026, 3)], WeekStart::Sunday);

    let range = result.global_range.unwrap();
    assert_eq!(range.start_date, day(2025, 12, 28));
    // March 2026 grid starts Sunday 2026-03-01 and spans 42 days.
    assert_eq!(range.end_date, day(2026, 4, 11));
    assert_eq!(gateway.ranges(), vec![range]);
}

#[test]
fn period_todo_lands_in_both_months() {
    let row = period_row("conference", day(2026, 1, 28), day(2026, 2, 5));
    let todo_id = row.id;
    let gateway = FakeGateway::with_todos(vec![row]);
    let service = BatchAggregationService::new(&gateway);

    let result = service.aggregate([month(2026, 1), month(2026, 2)], WeekStart::Sunday);

    for id in [month(2026, 1), month(2026, 2)] {
        let todos = &result[&id].todos;
        assert_eq!(todos.len(), 1, "month {id}");
        assert_eq!(todos[0].id, todo_id);
    }
}

#[test]
fn gateway_failure_degrades_to_empty_months() {
    let gateway = FakeGateway::failing();
    let service = BatchAggregationService::new(&gateway);

    let result = service.aggregate_detailed([month(2026, 1), month(2026, 2)], WeekStart::Sunday);

    let mut expected = BTreeMap::new();
    expected.insert(month(2026, 1), MonthData::default());
    expected.insert(month(2026, 2), MonthData::default());
    assert_eq!(result.months, expected);
    assert!(result.degraded);
    assert!(result.error.unwrap().contains("offline"));
}

#[test]
fn invalidate_adjacent_removes_three_months_only() {
    let cache = CalendarDataCache::new();
    let batch: BTreeMap<MonthId, MonthData> = [
        month(2025, 12),
        month(2026, 1),
        month(2026, 2),
        month(2026, 3),
        month(2026, 4),
    ]
    .into_iter()
    .map(|id| (id, MonthData::default()))
    .collect();
    cache.write_batch(batch);

    let removed = cache.invalidate_adjacent(2026, 2);

    assert_eq!(removed, vec![month(2026, 1), month(2026, 2), month(2026, 3)]);
    assert!(!cache.has_month(month(2026, 1)));
    assert!(!cache.has_month(month(2026, 2)));
    assert!(!cache.has_month(month(2026, 3)));
    assert!(cache.has_month(month(2025, 12)));
    assert!(cache.has_month(month(2026, 4)));
}

#[test]
fn invalidate_adjacent_rolls_over_year_boundaries() {
    let cache = CalendarDataCache::new();
    for id in [month(2025, 12), month(2026, 1), month(2026, 2)] {
        cache.set_month_data(id, Vec::new(), BTreeMap::new());
    }
    assert_eq!(cache.invalidate_adjacent(2026, 1).len(), 3);
    assert!(cache.is_empty());
}

#[test]
fn pruning_twice_is_a_structural_noop() {
    let cache = CalendarDataCache::new();
    let events: Arc<Mutex<Vec<CacheChange>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    cache.subscribe(move |change| sink.lock().unwrap().push(change.clone()));
    for id in [month(2026, 1), month(2026, 2), month(2026, 3), month(2026, 4)] {
        cache.set_month_data(id, Vec::new(), BTreeMap::new());
    }
    events.lock().unwrap().clear();

    let first = cache.prune_to_window(month(2026, 2), month(2026, 3));
    let snapshot = cache.cached_months();
    let second = cache.prune_to_window(month(2026, 2), month(2026, 3));

    assert_eq!(first, vec![month(2026, 1), month(2026, 4)]);
    assert!(second.is_empty());
    assert_eq!(cache.cached_months(), snapshot);
    assert_eq!(
        *events.lock().unwrap(),
        vec![CacheChange::Pruned(vec![month(2026, 1), month(2026, 4)])]
    );
}

#[test]
fn months_without_rows_are_present_and_empty() {
    let gateway = FakeGateway::new();
    let service = BatchAggregationService::new(&gateway);

    let result = service.aggregate([month(2030, 1), month(2030, 2)], WeekStart::Sunday);

    assert_eq!(result.len(), 2);
    for data in result.values() {
        assert!(data.todos.is_empty());
        assert!(data.completions.is_empty());
    }
}

#[test]
fn todos_are_ordered_by_date_then_all_day_then_time() {
    let mut late = single_row("late", day(2026, 1, 10));
    late.is_all_day = false;
    late.start_time = NaiveTime::from_hms_opt(18, 0, 0);
    let mut early = single_row("early", day(2026, 1, 10));
    early.is_all_day = false;
    early.start_time = NaiveTime::from_hms_opt(7, 30, 0);
    let all_day = single_row("all day", day(2026, 1, 10));
    let first_day = single_row("first", day(2026, 1, 2));
    let gateway = FakeGateway::with_todos(vec![late, early, all_day, first_day]);
    let service = BatchAggregationService::new(&gateway);

    let result = service.aggregate([month(2026, 1)], WeekStart::Sunday);

    let titles: Vec<&str> = result[&month(2026, 1)]
        .todos
        .iter()
        .map(|todo| todo.title.as_str())
        .collect();
    assert_eq!(titles, vec!["first", "all day", "early", "late"]);
}

#[test]
fn completions_attach_to_every_grid_containing_their_date() {
    let row = single_row("pay rent", day(2026, 2, 1));
    let todo_id = row.id;
    let gateway = FakeGateway::with_todos(vec![row]);
    let key = completion_key(todo_id, None);
    gateway.push_completion(completion_row(key.clone(), todo_id, day(2026, 2, 1)));
    let service = BatchAggregationService::new(&gateway);

    let result = service.aggregate(
        [month(2026, 1), month(2026, 2), month(2026, 3)],
        WeekStart::Sunday,
    );

    // 2026-02-01 is a padding day of the January grid and the first day of February.
    assert!(result[&month(2026, 1)].completions.contains_key(&key));
    assert!(result[&month(2026, 2)].completions.contains_key(&key));
    assert!(result[&month(2026, 3)].completions.is_empty());
}

#[test]
fn bounded_recurrence_stops_at_its_end_date() {
    let mut row = recurring_row("course", day(2026, 1, 6), "FREQ=WEEKLY;BYDAY=TU");
    row.recurrence_end_date = Some(day(2026, 2, 10));
    let gateway = FakeGateway::with_todos(vec![row]);
    let service = BatchAggregationService::new(&gateway);

    let result = service.aggregate(
        [month(2026, 1), month(2026, 2), month(2026, 4)],
        WeekStart::Monday,
    );

    assert_eq!(result[&month(2026, 1)].todos.len(), 1);
    assert_eq!(result[&month(2026, 2)].todos.len(), 1);
    assert!(result[&month(2026, 4)].todos.is_empty());
}

#[test]
fn open_recurrence_reaches_every_requested_month() {
    let row = recurring_row("standup", day(2026, 1, 5), "FREQ=DAILY");
    let gateway = FakeGateway::with_todos(vec![row]);
    let service = BatchAggregationService::new(&gateway);

    let result = service.aggregate(
        [month(2025, 10), month(2026, 1), month(2027, 9)],
        WeekStart::Sunday,
    );

    assert!(result[&month(2025, 10)].todos.is_empty());
    assert_eq!(result[&month(2026, 1)].todos.len(), 1);
    assert_eq!(result[&month(2027, 9)].todos.len(), 1);
}
