// src/main.rs
use auto_pallet::config::AppConfig;
use auto_pallet::{api, logging};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let dotenv_result = dotenvy::dotenv();

    logging::init();

    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            warn!("Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();
    let api_config = app_config.api.clone();
    let engine_settings = app_config.engine.clone();

    info!(
        default_pallet = %engine_settings.default_pallet(),
        role_rules = engine_settings.role_rules().len(),
        "Pallet loading service starting"
    );
    if let Err(err) = api::start_api_server(api_config, engine_settings).await {
        error!("API server terminated with an error: {err}");
        std::process::exit(1);
    }
}
