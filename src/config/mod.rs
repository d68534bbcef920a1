pub mod env;
mod loader;
pub mod settings;

pub use env::{AnalysisConfig, AppConfig, DirectoryConfig, MonitorConfig};
pub use loader::load_config;
pub use settings::Settings;
