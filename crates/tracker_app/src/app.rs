use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{debug, info, warn};
use tracker_core::changes::{ChangeSink, IndexPath, SectionChanges};
use tracker_core::draft::TrackerDraft;
use tracker_core::store::{FileStore, TrackerStore};
use tracker_core::weekday::{Schedule, WeekDay};
use tracker_core::{Calendar, TrackerService};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) data_path: PathBuf,
    pub(crate) utc_offset_minutes: i32,
    pub(crate) first_weekday: WeekDay,
    pub(crate) search: String,
    pub(crate) date: Option<NaiveDate>,
    pub(crate) seed_demo: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("trackers.json"),
            utc_offset_minutes: 0,
            first_weekday: WeekDay::Monday,
            search: String::new(),
            date: None,
            seed_demo: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(path) = lookup("TRACKER_DATA_PATH") {
            if !path.trim().is_empty() {
                config.data_path = PathBuf::from(path);
            }
        }
        if let Some(offset) = lookup("TRACKER_UTC_OFFSET_MINUTES") {
            match offset.trim().parse::<i32>() {
                Ok(value) if Calendar::with_offset_minutes(value, WeekDay::Monday).is_some() => {
                    config.utc_offset_minutes = value;
                }
                _ => warn!(%offset, "ignoring invalid TRACKER_UTC_OFFSET_MINUTES"),
            }
        }
        if let Some(first) = lookup("TRACKER_FIRST_WEEKDAY") {
            match first.trim().parse::<u32>().ok().and_then(WeekDay::from_number) {
                Some(day) => config.first_weekday = day,
                None => warn!(%first, "ignoring invalid TRACKER_FIRST_WEEKDAY"),
            }
        }
        if let Some(search) = lookup("TRACKER_SEARCH") {
            config.search = search;
        }
        if let Some(date) = lookup("TRACKER_DATE") {
            match NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d") {
                Ok(value) => config.date = Some(value),
                Err(err) => warn!(%date, %err, "ignoring invalid TRACKER_DATE"),
            }
        }
        if let Some(seed) = lookup("TRACKER_SEED_DEMO") {
            config.seed_demo = matches!(seed.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
        config
    }

    pub fn calendar(&self) -> Calendar {
        Calendar::with_offset_minutes(self.utc_offset_minutes, self.first_weekday)
            .unwrap_or_else(|| Calendar::new(Calendar::utc().offset(), self.first_weekday))
    }
}

/// Forwards batched list changes to the log.
struct LoggedChanges;

impl ChangeSink for LoggedChanges {
    fn apply(&self, changes: &SectionChanges) {
        debug!(
            inserted_sections = ?changes.inserted_sections,
            deleted_sections = ?changes.deleted_sections,
            inserted_rows = changes.inserted_rows.len(),
            deleted_rows = changes.deleted_rows.len(),
            "tracker list changed"
        );
    }

    fn reload(&self) {
        debug!("tracker list reloaded");
    }
}

pub fn run(config: AppConfig) -> Result<()> {
    let service = open(&config)?;
    print!("{}", render_day(&service));
    Ok(())
}

pub(crate) fn open(config: &AppConfig) -> Result<TrackerService> {
    let started = Instant::now();
    let calendar = config.calendar();
    let store = Arc::new(
        FileStore::open(&config.data_path)
            .with_context(|| format!("failed to open {}", config.data_path.display()))?,
    );
    let is_empty = store.trackers()?.is_empty() && store.categories()?.is_empty();

    let mut builder = TrackerService::builder()
        .store(store)
        .calendar(calendar)
        .with_change_sink(Box::new(LoggedChanges));
    if let Some(date) = config.date {
        builder = builder.selected_date(calendar.start_of_day(date));
    }
    let mut service = builder.build().context("failed to load trackers")?;

    if config.seed_demo && is_empty {
        seed_demo(&mut service).context("failed to seed demo trackers")?;
    }
    if !config.search.is_empty() {
        service.set_search_text(config.search.as_str())?;
    }

    let stats = service.statistics()?;
    info!(
        path = %config.data_path.display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        completed_total = stats.completed_total,
        best_streak = stats.best_streak,
        "trackers loaded"
    );
    Ok(service)
}

fn seed_demo(service: &mut TrackerService) -> Result<()> {
    let home = service.create_category("Домашний уют")?;
    let joys = service.create_category("Радостные мелочи")?;
    service.create_tracker(
        TrackerDraft::regular()
            .name("Поливать растения")
            .emoji("🌺")
            .color(4)
            .category(home.id)
            .schedule(Schedule::every_day()),
    )?;
    service.create_tracker(
        TrackerDraft::regular()
            .name("Уборка")
            .emoji("🧹")
            .color(9)
            .category(home.id)
            .schedule([WeekDay::Saturday, WeekDay::Sunday].into_iter().collect()),
    )?;
    service.create_tracker(
        TrackerDraft::irregular()
            .name("Кошка заслонила камеру на созвоне")
            .emoji("😻")
            .color(1)
            .category(joys.id),
    )?;
    service.create_tracker(
        TrackerDraft::irregular()
            .name("Бабушка прислала открытку")
            .emoji("💌")
            .color(0)
            .category(joys.id)
            .pinned(true),
    )?;
    info!("demo trackers seeded");
    Ok(())
}

/// Text rendering of the tracker screen for the selected day.
pub fn render_day(service: &TrackerService) -> String {
    let calendar = service.calendar();
    let filter = service.filter();
    let sections = service.sections();

    let mut lines = vec![format!(
        "{}, {}",
        calendar.weekday_of(filter.selected_date).long_label(),
        calendar.day_of(filter.selected_date).format("%d.%m.%Y")
    )];
    if sections.is_empty() {
        let filtered = filter.search_needle().is_some() || filter.completion.is_some();
        let message = if filtered {
            "Ничего не найдено"
        } else {
            "Что будем отслеживать?"
        };
        lines.push(message.to_string());
        return lines.join("\n") + "\n";
    }

    for section in 0..sections.section_count() {
        let rows = sections.row_count(section);
        if rows == 0 {
            continue;
        }
        lines.push(String::new());
        lines.push(sections.section_title(section).unwrap_or_default().to_string());
        for row in (0..rows).filter_map(|row| sections.tracker_at(IndexPath::new(section, row))) {
            let mark = if row.is_completed { "[x]" } else { "[ ]" };
            lines.push(format!(
                "  {mark} {} {} · {} {}",
                row.tracker.emoji,
                row.tracker.name,
                row.completed_days,
                days_word(row.completed_days)
            ));
        }
    }
    lines.join("\n") + "\n"
}

fn days_word(count: usize) -> &'static str {
    match (count % 10, count % 100) {
        (1, n) if n != 11 => "день",
        (2..=4, n) if !(12..=14).contains(&n) => "дня",
        _ => "дней",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{TimeZone, Utc};

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn config_reads_variables_and_ignores_invalid_ones() {
        let config = AppConfig::from_lookup(lookup(&[
            ("TRACKER_DATA_PATH", "/tmp/habits.json"),
            ("TRACKER_UTC_OFFSET_MINUTES", "180"),
            ("TRACKER_FIRST_WEEKDAY", "1"),
            ("TRACKER_SEARCH", "бег"),
            ("TRACKER_DATE", "2025-10-20"),
            ("TRACKER_SEED_DEMO", "true"),
        ]));
        assert_eq!(config.data_path, PathBuf::from("/tmp/habits.json"));
        assert_eq!(config.utc_offset_minutes, 180);
        assert_eq!(config.first_weekday, WeekDay::Sunday);
        assert_eq!(config.search, "бег");
        assert_eq!(config.date, NaiveDate::from_ymd_opt(2025, 10, 20));
        assert!(config.seed_demo);
        assert_eq!(config.calendar().offset().local_minus_utc(), 180 * 60);

        let config = AppConfig::from_lookup(lookup(&[
            ("TRACKER_UTC_OFFSET_MINUTES", "100000"),
            ("TRACKER_FIRST_WEEKDAY", "8"),
            ("TRACKER_DATE", "20.10.2025"),
        ]));
        assert_eq!(config.utc_offset_minutes, 0);
        assert_eq!(config.first_weekday, WeekDay::Monday);
        assert_eq!(config.date, None);
        assert!(!config.seed_demo);
    }

    #[test]
    fn russian_day_counts() {
        assert_eq!(days_word(0), "дней");
        assert_eq!(days_word(1), "день");
        assert_eq!(days_word(3), "дня");
        assert_eq!(days_word(11), "дней");
        assert_eq!(days_word(12), "дней");
        assert_eq!(days_word(21), "день");
        assert_eq!(days_word(104), "дня");
    }

    #[test]
    fn seeded_store_renders_pinned_section_first() {
        let temp = tempfile::tempdir().unwrap();
        let config = AppConfig {
            data_path: temp.path().join("trackers.json"),
            date: NaiveDate::from_ymd_opt(2025, 10, 20),
            seed_demo: true,
            ..AppConfig::default()
        };
        let mut service = open(&config).unwrap();
        let text = render_day(&service);
        assert!(text.starts_with("Понедельник, 20.10.2025\n"), "{text}");
        let pinned = text.find("Закреплённые").unwrap();
        let card = text.find("Бабушка прислала открытку").unwrap();
        let home = text.find("Домашний уют").unwrap();
        assert!(pinned < card && card < home, "{text}");
        // weekend-only tracker is hidden on Monday
        assert!(!text.contains("Уборка"), "{text}");

        let plants = service
            .sections()
            .category_sections()
            .iter()
            .flat_map(|section| section.rows.iter())
            .find(|row| row.tracker.name == "Поливать растения")
            .map(|row| row.tracker.id)
            .unwrap();
        let monday = Utc.with_ymd_and_hms(2025, 10, 20, 12, 0, 0).unwrap();
        service.toggle_completion(plants, monday, true).unwrap();
        assert!(render_day(&service).contains("[x] 🌺 Поливать растения · 1 день"));

        // reopening does not seed twice
        let service = open(&config).unwrap();
        assert_eq!(service.categories().unwrap().len(), 2);
    }

    #[test]
    fn empty_and_unmatched_screens() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = AppConfig {
            data_path: temp.path().join("trackers.json"),
            ..AppConfig::default()
        };
        let service = open(&config).unwrap();
        assert!(render_day(&service).ends_with("Что будем отслеживать?\n"));

        config.seed_demo = true;
        config.search = "нет такого".into();
        let service = open(&config).unwrap();
        assert!(render_day(&service).ends_with("Ничего не найдено\n"));
    }
}
