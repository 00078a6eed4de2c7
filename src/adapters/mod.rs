//! Driven adapters implementing the application port traits.

pub mod config_file;
pub mod log_sink;
pub mod valves;
pub mod weather_file;

pub use config_file::FileConfigStore;
pub use log_sink::LogEventSink;
pub use valves::{LogValveController, ShellValveController};
pub use weather_file::FileWeatherSource;
