pub mod app;

pub use app::{run, AppConfig};
