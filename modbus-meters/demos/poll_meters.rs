/// Poll every meter of a JSON5 configuration file
use anyhow::Context;
use modbus_meters::config::MetersConfig;
use modbus_meters::logger::TracingLogger;
use modbus_meters::query;
use modbus_meters::registry::Registry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "meters.json5".to_string());
    let config = MetersConfig::load_from_file(&path)
        .with_context(|| format!("Failed to load config from {path}"))?;

    let registry = Registry::with_builtin_models()?;
    config.validate(&registry)?;

    let mut tasks = Vec::new();
    for device in config.devices {
        let producer = registry.create(&device.model)?;
        let mut conn = device.connect().await?;
        conn.logger(Arc::new(TracingLogger));

        info!(
            "Polling '{}' ({}) at {} slave {}",
            device.name,
            producer.description(),
            conn,
            device.slave_id
        );

        tasks.push(tokio::spawn(async move {
            if let Err(e) = query::probe(conn.as_mut(), producer.as_ref()).await {
                warn!("Device '{}': probe failed: {}", device.name, e);
            }

            loop {
                match query::query(conn.as_mut(), producer.as_ref()).await {
                    Ok(readings) => {
                        for r in readings {
                            info!(
                                "{} {} = {:.3} {}",
                                device.name,
                                r.measurement,
                                r.value,
                                r.measurement.unit()
                            );
                        }
                    }
                    Err(e) => {
                        error!("Device '{}': polling error: {}", device.name, e);
                    }
                }
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }));
    }

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");
    for task in tasks {
        task.abort();
    }

    Ok(())
}
