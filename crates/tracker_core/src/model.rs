use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::weekday::{Schedule, WeekDay};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackerId(Uuid);

impl TrackerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrackerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(Uuid);

impl CategoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CategoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerKind {
    /// A habit shown on the weekdays of its schedule.
    Regular,
    /// A one-off event without a schedule.
    Irregular,
}

pub const PALETTE: [&str; 18] = [
    "#FD4C49", "#FF881E", "#007BFA", "#6E44FE", "#33CF69", "#E66DD4", "#F9D4D4", "#34A7FE",
    "#46E69D", "#35347C", "#FF674D", "#FF99CC", "#F6C48B", "#7994F5", "#832CF1", "#AD56DA",
    "#8D72E6", "#2FD058",
];

/// Index into [`PALETTE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackerColor(u8);

impl TrackerColor {
    pub fn new(index: usize) -> Option<Self> {
        if index < PALETTE.len() {
            u8::try_from(index).ok().map(Self)
        } else {
            None
        }
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    pub fn hex(self) -> &'static str {
        PALETTE.get(self.index()).copied().unwrap_or(PALETTE[0])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CategoryId::new(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracker {
    pub id: TrackerId,
    pub name: String,
    pub kind: TrackerKind,
    pub emoji: String,
    pub color: TrackerColor,
    /// `None` encodes "no schedule" and is what irregular trackers carry.
    #[serde(default)]
    pub schedule: Option<Schedule>,
    #[serde(default)]
    pub pinned: bool,
    pub category: CategoryId,
}

impl Tracker {
    /// Whether the tracker should be listed on a day falling on `weekday`.
    ///
    /// A regular tracker with no weekdays is listed every day so that the
    /// broken record stays visible to the user.
    pub fn is_scheduled_on(&self, weekday: WeekDay) -> bool {
        match self.kind {
            TrackerKind::Irregular => true,
            TrackerKind::Regular => match &self.schedule {
                Some(schedule) if !schedule.is_empty() => schedule.contains(weekday),
                _ => true,
            },
        }
    }

    /// Whether the tracker is expected on `weekday`. Irregular trackers never are.
    pub fn is_expected_on(&self, weekday: WeekDay) -> bool {
        self.kind == TrackerKind::Regular && self.is_scheduled_on(weekday)
    }
}

/// One tracker marked done on one day. `day` is always midnight UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub tracker_id: TrackerId,
    pub day: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(kind: TrackerKind, schedule: Option<Schedule>) -> Tracker {
        Tracker {
            id: TrackerId::new(),
            name: "Пробежка".into(),
            kind,
            emoji: "🏃".into(),
            color: TrackerColor::new(0).unwrap(),
            schedule,
            pinned: false,
            category: CategoryId::new(),
        }
    }

    #[test]
    fn regular_tracker_matches_only_its_weekdays() {
        let schedule: Schedule = [WeekDay::Monday, WeekDay::Wednesday].into_iter().collect();
        let t = tracker(TrackerKind::Regular, Some(schedule));
        for day in WeekDay::ALL {
            let expected = matches!(day, WeekDay::Monday | WeekDay::Wednesday);
            assert_eq!(t.is_scheduled_on(day), expected, "{day:?}");
        }
    }

    #[test]
    fn irregular_and_unscheduled_regular_are_always_listed() {
        let irregular = tracker(TrackerKind::Irregular, None);
        let unscheduled = tracker(TrackerKind::Regular, Some(Schedule::new()));
        for day in WeekDay::ALL {
            assert!(irregular.is_scheduled_on(day));
            assert!(unscheduled.is_scheduled_on(day));
            assert!(!irregular.is_expected_on(day));
        }
    }

    #[test]
    fn color_is_bounded_by_palette() {
        assert_eq!(TrackerColor::new(17).map(TrackerColor::index), Some(17));
        assert!(TrackerColor::new(18).is_none());
        assert_eq!(TrackerColor::new(0).unwrap().hex(), "#FD4C49");
    }

    #[test]
    fn tracker_json_keeps_schedule_as_label_string() {
        let schedule: Schedule = [WeekDay::Monday].into_iter().collect();
        let t = tracker(TrackerKind::Regular, Some(schedule));
        let value = serde_json::to_value(&t).unwrap();
        assert_eq!(value["schedule"], "Пн");
        assert_eq!(value["kind"], "regular");

        let irregular = tracker(TrackerKind::Irregular, None);
        let value = serde_json::to_value(&irregular).unwrap();
        assert!(value["schedule"].is_null());
    }
}
