pub mod calendar;
pub mod changes;
pub mod draft;
pub mod error;
pub mod ledger;
pub mod model;
pub mod predicate;
pub mod sections;
pub mod service;
pub mod statistics;
pub mod store;
pub mod weekday;

pub use crate::calendar::Calendar;
pub use crate::error::{StoreError, TrackerError, ValidationError};
pub use crate::service::{TrackerService, TrackerServiceBuilder};
