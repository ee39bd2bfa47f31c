mod app;
mod gamepad;

use anyhow::{Context, Result};
use app::App;
use log::info;
use motormap_experiment::TaskConfig;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args_os().nth(1) {
        Some(path) => TaskConfig::from_json_file(&path)
            .with_context(|| format!("loading {}", path.to_string_lossy()))?,
        None => {
            info!("no config file given, using defaults");
            TaskConfig::default()
        }
    };

    App::new(config)?.run()
}
