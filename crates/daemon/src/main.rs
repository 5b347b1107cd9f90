mod sink;

use std::{fs::File, io::BufReader, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use buildmon_cache::MemoryBuildCache;
use buildmon_client::CiClient;
use buildmon_core::{config::Config, traits::AlwaysLive};
use buildmon_watcher::BuildWatcher;
use tokio::signal;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::sink::HttpEventSink;

type Watcher = BuildWatcher<CiClient, MemoryBuildCache, HttpEventSink, AlwaysLive>;

#[tokio::main]
async fn main() {
    let env_filter = EnvFilter::builder()
        // Default to info level
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let config: Config = {
        let file = BufReader::new(File::open("config.yml").expect("Failed to open config file"));
        serde_yaml::from_reader(file).expect("Failed to parse config file")
    };

    let mut scheduler = create_scheduler(&config).await.expect("Failed to create scheduler");

    shutdown_signal().await;
    scheduler.shutdown().await.expect("Failed to shut down scheduler");
    tracing::info!("Shut down gracefully");
}

/// One repeated job per configured master, all sharing the in-memory build
/// cache and the event sink.
async fn create_scheduler(config: &Config) -> Result<JobScheduler> {
    let sched = JobScheduler::new().await?;

    let cache = Arc::new(MemoryBuildCache::new());
    let sink = match &config.sink {
        Some(sink_config) => Some(Arc::new(HttpEventSink::new(sink_config.url.clone())?)),
        None => None,
    };

    for master_config in &config.masters {
        let client = CiClient::new(master_config)
            .with_context(|| format!("Failed to create client for {}", master_config.name))?;
        let watcher: Arc<Watcher> = Arc::new(BuildWatcher::new(
            master_config.name.clone(),
            Arc::new(client),
            cache.clone(),
            sink.clone(),
            Some(Arc::new(AlwaysLive)),
            config.poll.clone(),
        ));
        let interval = Duration::from_secs(watcher.poll_interval_secs());
        sched
            .add(Job::new_repeated_async(interval, move |_uuid, _l| {
                let watcher = watcher.clone();
                Box::pin(async move {
                    if let Err(e) = watcher.poll().await {
                        tracing::error!("Polling cycle failed for {}: {:?}", watcher.master(), e);
                    }
                })
            })?)
            .await?;
        tracing::info!(
            "Watching {} every {}s",
            master_config.name,
            interval.as_secs()
        );
    }

    sched.start().await?;
    Ok(sched)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler");
        tokio::select! {
            _ = signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.expect("Failed to install signal handler");
    }
}
