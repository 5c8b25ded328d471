use crate::error::ValidationError;
use crate::model::{CategoryId, Tracker, TrackerColor, TrackerId, TrackerKind};
use crate::weekday::Schedule;

pub const MAX_NAME_CHARS: usize = 38;

/// Editable state of the "new / edit tracker" form.
///
/// Nothing reaches the store until [`TrackerDraft::validate`] succeeds.
#[derive(Debug, Clone)]
pub struct TrackerDraft {
    pub id: Option<TrackerId>,
    pub name: String,
    pub kind: TrackerKind,
    pub emoji: Option<String>,
    pub color: Option<usize>,
    pub schedule: Schedule,
    pub category: Option<CategoryId>,
    pub pinned: bool,
}

impl TrackerDraft {
    pub fn new(kind: TrackerKind) -> Self {
        Self {
            id: None,
            name: String::new(),
            kind,
            emoji: None,
            color: None,
            schedule: Schedule::new(),
            category: None,
            pinned: false,
        }
    }

    pub fn regular() -> Self {
        Self::new(TrackerKind::Regular)
    }

    pub fn irregular() -> Self {
        Self::new(TrackerKind::Irregular)
    }

    /// Starts an edit of an existing tracker, keeping its identity.
    pub fn from_tracker(tracker: &Tracker) -> Self {
        Self {
            id: Some(tracker.id),
            name: tracker.name.clone(),
            kind: tracker.kind,
            emoji: Some(tracker.emoji.clone()),
            color: Some(tracker.color.index()),
            schedule: tracker.schedule.clone().unwrap_or_default(),
            category: Some(tracker.category),
            pinned: tracker.pinned,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = Some(emoji.into());
        self
    }

    pub fn color(mut self, index: usize) -> Self {
        self.color = Some(index);
        self
    }

    pub fn schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn category(mut self, category: CategoryId) -> Self {
        self.category = Some(category);
        self
    }

    pub fn pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }

    pub fn is_complete(&self) -> bool {
        self.clone().validate().is_ok()
    }

    pub fn validate(self) -> Result<Tracker, ValidationError> {
        let name = validate_name(&self.name)?;
        let category = self.category.ok_or(ValidationError::MissingCategory)?;
        let emoji = self
            .emoji
            .filter(|emoji| !emoji.trim().is_empty())
            .ok_or(ValidationError::MissingEmoji)?;
        let index = self.color.ok_or(ValidationError::MissingColor)?;
        let color = TrackerColor::new(index).ok_or(ValidationError::ColorOutOfPalette { index })?;

        let schedule = match self.kind {
            TrackerKind::Regular if self.schedule.is_empty() => {
                return Err(ValidationError::EmptySchedule)
            }
            TrackerKind::Regular => Some(self.schedule),
            TrackerKind::Irregular => None,
        };

        Ok(Tracker {
            id: self.id.unwrap_or_default(),
            name,
            kind: self.kind,
            emoji,
            color,
            schedule,
            pinned: self.pinned,
            category,
        })
    }
}

/// Trims `raw` and enforces the shared name rules for trackers and categories.
pub fn validate_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(ValidationError::NameTooLong {
            max: MAX_NAME_CHARS,
        });
    }
    Ok(name.to_string())
}
