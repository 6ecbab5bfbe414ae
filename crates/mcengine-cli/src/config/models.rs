use mcengine::engine::config as core_config;
use std::path::PathBuf;

pub struct AppConfig {
    pub report_path: Option<PathBuf>,
    pub bias_csv_path: Option<PathBuf>,
    pub core_config: core_config::GrandCanonicalConfig,
}
