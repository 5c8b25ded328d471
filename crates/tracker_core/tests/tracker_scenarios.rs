use std::fs;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::tempdir;
use tracker_core::changes::IndexPath;
use tracker_core::draft::TrackerDraft;
use tracker_core::error::{StoreError, TrackerError};
use tracker_core::store::{FileStore, TrackerStore};
use tracker_core::weekday::{Schedule, WeekDay};
use tracker_core::{Calendar, TrackerService};

fn monday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 20, 8, 30, 0).unwrap()
}

fn service_for(store: Arc<dyn TrackerStore>) -> TrackerService {
    TrackerService::builder()
        .store(store)
        .calendar(Calendar::utc())
        .with_clock(monday)
        .build()
        .expect("build tracker service")
}

fn mondays() -> Schedule {
    [WeekDay::Monday].into_iter().collect()
}

#[test]
fn pinned_and_unpinned_views_with_completion_round_trip() {
    let temp = tempdir().expect("tempdir");
    let store = Arc::new(FileStore::open(temp.path().join("trackers.json")).expect("open store"));
    let mut service = service_for(store);

    let c1 = service.create_category("C1").expect("category");
    let t1 = service
        .create_tracker(
            TrackerDraft::regular()
                .name("T1")
                .emoji("🏃")
                .color(0)
                .category(c1.id)
                .schedule(mondays()),
        )
        .expect("T1");
    let t2 = service
        .create_tracker(
            TrackerDraft::irregular()
                .name("T2")
                .emoji("📅")
                .color(1)
                .category(c1.id),
        )
        .expect("T2");
    let t3 = service
        .create_tracker(
            TrackerDraft::regular()
                .name("T3")
                .emoji("📌")
                .color(2)
                .category(c1.id)
                .schedule(mondays())
                .pinned(true),
        )
        .expect("T3");

    let sections = service.sections();
    assert_eq!(sections.section_count(), 2);
    assert_eq!(sections.section_title(1), Some("C1"));
    let unpinned: Vec<_> = sections.category_sections()[0]
        .rows
        .iter()
        .map(|row| row.tracker.id)
        .collect();
    assert_eq!(unpinned, vec![t1.id, t2.id]);
    assert_eq!(sections.row_count(0), 1);
    assert_eq!(sections.locate(t3.id), Some(IndexPath::new(0, 0)));

    service
        .toggle_completion(t1.id, monday(), true)
        .expect("complete T1");
    assert_eq!(service.completed_days(t1.id, monday()).unwrap(), 1);
    assert!(service.is_completed(t1.id, monday()).unwrap());

    service
        .toggle_completion(t1.id, monday(), false)
        .expect("undo T1");
    assert_eq!(service.completed_days(t1.id, monday()).unwrap(), 0);
    assert!(!service.is_completed(t1.id, monday()).unwrap());
}

#[test]
fn weekday_filter_hides_regular_trackers_on_other_days() {
    let temp = tempdir().expect("tempdir");
    let store = Arc::new(FileStore::open(temp.path().join("trackers.json")).expect("open store"));
    let mut service = service_for(store);
    let c1 = service.create_category("Спорт").expect("category");
    let gym = service
        .create_tracker(
            TrackerDraft::regular()
                .name("Зал")
                .emoji("🏋")
                .color(3)
                .category(c1.id)
                .schedule([WeekDay::Monday, WeekDay::Wednesday].into_iter().collect()),
        )
        .expect("gym");

    for offset in 0..7 {
        let date = monday() - chrono::Duration::days(offset);
        service.set_selected_date(date).expect("select date");
        let visible = service.sections().locate(gym.id).is_some();
        let weekday = Calendar::utc().weekday_of(date);
        assert_eq!(
            visible,
            matches!(weekday, WeekDay::Monday | WeekDay::Wednesday),
            "{weekday:?}"
        );
    }

    service.set_selected_date(monday()).expect("select monday");
    service.set_search_text("ЗА").expect("search");
    assert!(service.sections().locate(gym.id).is_some());
    service.set_search_text("бег2").expect("search");
    assert!(service.sections().is_empty());
}

#[test]
fn data_survives_reopening_the_store() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("nested").join("trackers.json");
    let tracker_id = {
        let store = Arc::new(FileStore::open(&path).expect("open store"));
        let mut service = service_for(store);
        let category = service.create_category("Дом").expect("category");
        let tracker = service
            .create_tracker(
                TrackerDraft::regular()
                    .name("Полить цветы")
                    .emoji("🌵")
                    .color(4)
                    .category(category.id)
                    .schedule(mondays()),
            )
            .expect("tracker");
        service
            .toggle_completion(tracker.id, monday(), true)
            .expect("complete");
        tracker.id
    };

    let raw = fs::read_to_string(&path).expect("read store file");
    assert!(raw.contains("\"schedule\": \"Пн\""), "{raw}");

    let reopened = Arc::new(FileStore::open(&path).expect("reopen store"));
    let service = service_for(reopened);
    assert!(service.is_completed(tracker_id, monday()).unwrap());
    let stats = service.statistics().expect("statistics");
    assert_eq!(stats.completed_total, 1);
    assert_eq!(stats.perfect_days, 1);
}

#[test]
fn deleting_a_tracker_removes_its_completions() {
    let temp = tempdir().expect("tempdir");
    let store = Arc::new(FileStore::open(temp.path().join("trackers.json")).expect("open store"));
    let mut service = service_for(store.clone());
    let category = service.create_category("Дом").expect("category");
    let tracker = service
        .create_tracker(
            TrackerDraft::irregular()
                .name("Сантехник")
                .emoji("🔧")
                .color(5)
                .category(category.id),
        )
        .expect("tracker");
    service
        .toggle_completion(tracker.id, monday(), true)
        .expect("complete");

    service.delete_tracker(tracker.id).expect("delete");
    assert!(store.all_completions().unwrap().is_empty());
    assert!(service.sections().locate(tracker.id).is_none());
    assert!(service.statistics().unwrap().is_empty());
}

#[test]
fn failed_write_is_reported_but_view_stays_optimistic() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("trackers.json");
    let store = Arc::new(FileStore::open(&path).expect("open store"));
    let mut service = service_for(store);
    let category = service.create_category("Дом").expect("category");
    let tracker = service
        .create_tracker(
            TrackerDraft::irregular()
                .name("Почта")
                .emoji("✉")
                .color(6)
                .category(category.id),
        )
        .expect("tracker");

    // Make the store file unwritable by replacing it with a directory.
    fs::remove_file(&path).expect("remove store file");
    fs::create_dir(&path).expect("block store path");

    let result = service.toggle_completion(tracker.id, monday(), true);
    assert!(matches!(
        result,
        Err(TrackerError::Store(StoreError::Io { .. }))
    ));
    let row = service
        .sections()
        .locate(tracker.id)
        .and_then(|path| service.sections().tracker_at(path))
        .expect("row still visible");
    assert!(row.is_completed);
}
