use std::path::PathBuf;

use thiserror::Error;

use crate::model::{CategoryId, TrackerId};

/// Rejections raised by the tracker and category creation workflow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("name must be at most {max} characters")]
    NameTooLong { max: usize },
    #[error("no category selected")]
    MissingCategory,
    #[error("no emoji selected")]
    MissingEmoji,
    #[error("no color selected")]
    MissingColor,
    #[error("color {index} is not part of the palette")]
    ColorOutOfPalette { index: usize },
    #[error("a regular tracker needs at least one weekday")]
    EmptySchedule,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("tracker {0} not found")]
    TrackerNotFound(TrackerId),
    #[error("category {0} not found")]
    CategoryNotFound(CategoryId),
    #[error("tracker {0} already exists")]
    DuplicateTracker(TrackerId),
    #[error("could not access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not (de)serialize tracker data: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("cannot change completion for {date}, which is in the future")]
    FutureDate { date: chrono::NaiveDate },
}
