use std::{env, error::Error};

use horde::{
    config::{HordeConfig, HordeConfigLoadError},
    logging::HordeLogger,
    orchestrator::Horde,
    proxy::ProxyPool,
    utils::leak,
};
use tokio::sync::broadcast;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = dotenvy::dotenv();

    let current_dir = env::current_dir()?;
    let config_file = current_dir.join("settings.toml");

    let config = match HordeConfig::load(&config_file) {
        Ok(config) => Ok(config),
        Err(error) => match error {
            HordeConfigLoadError::Io(_) => {
                // No config on disk yet; write the defaults out so the
                // operator has something to edit.
                let default_config = HordeConfig::default();
                let _ = default_config.save(&config_file);
                Ok(default_config)
            }
            HordeConfigLoadError::Parse(parse_error) => Err(parse_error),
        },
    }?;

    let mut logger = env_logger::Builder::from_default_env();
    if config.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let proxies = match &config.proxy_url {
        Some(url) => match ProxyPool::fetch(url).await {
            Ok(pool) => {
                HordeLogger::proxies_loaded(pool.len(), url);
                pool
            }
            Err(err) => {
                HordeLogger::proxy_fetch_failed(url, &err);
                ProxyPool::empty()
            }
        },
        None => ProxyPool::empty(),
    };

    let stop = leak(broadcast::channel(1).0);
    let horde = leak(Horde::new(config, proxies, stop));
    let runner = tokio::spawn(async move {
        if let Err(e) = horde.start().await {
            log::error!("{e}");
        }
    });

    {
        use futures::future::{select_all, FutureExt};
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        let sigint_fut = sigint.recv().map(|_| true).boxed();
        let sigterm_fut = sigterm.recv().map(|_| true).boxed();
        // One-shot floods and debug runs finish on their own.
        let runner_fut = runner.map(|_| false).boxed();

        let (signalled, _, _) = select_all([sigint_fut, sigterm_fut, runner_fut]).await;
        if signalled {
            log::info!("Received signal, stopping...");
            let _ = stop.send(());
        }
    }
    Ok(())
}
