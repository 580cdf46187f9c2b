use anyhow::Result;
use clap::Parser;
use log::info;

use geoview::{ViewerApp, ViewerConfig};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = ViewerConfig::parse();
    info!("Starting geoview against {}", config.server);

    ViewerApp::new(config)?.run()?;
    Ok(())
}
