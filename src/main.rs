/*
 * Copyright 2026 Molock Team
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use anyhow::Context;
use clap::{Parser, Subcommand};
use mockspec::config::{Config, ConfigLoader};
use mockspec::registry::EndpointRegistry;
use mockspec::router::RuntimeRouter;
use mockspec::server::run_server;
use mockspec::spec::{SpecPipeline, TracingSink};
use mockspec::storage::MockStore;
use mockspec::telemetry::{init_telemetry, shutdown_telemetry};
use mockspec::utils::shutdown_signal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate mock response files from an OpenAPI document.
    Generate {
        #[arg(short, long)]
        spec: PathBuf,

        /// Defaults to `mock.root` from the configuration.
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Serve the mock tree over HTTP.
    Serve {
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Generate from this document before serving.
        #[arg(short, long)]
        spec: Option<PathBuf>,

        /// Rescan the mock tree when files change.
        #[arg(long)]
        hot_reload: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let result = match args.command {
        Command::Generate {
            spec,
            output,
            config,
        } => {
            let config = load_config(config.as_deref()).await?;
            let output = output.unwrap_or_else(|| config.mock.root.clone());
            generate(&spec, &output).await
        }
        Command::Serve {
            config,
            spec,
            hot_reload,
        } => {
            let config = load_config(config.as_deref()).await?;
            serve(config, spec, hot_reload).await
        }
    };

    shutdown_telemetry().await;
    result
}

async fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = ConfigLoader::from_optional_file(path)
        .with_context(|| format!("Failed to load config from {:?}", path))?;
    init_telemetry(&config.telemetry).await?;
    Ok(config)
}

async fn generate(spec: &Path, output: &Path) -> anyhow::Result<()> {
    let report = SpecPipeline::new(Arc::new(TracingSink))
        .run(spec, output)
        .await
        .with_context(|| format!("Mock generation from {:?} failed", spec))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn serve(config: Config, spec: Option<PathBuf>, hot_reload: bool) -> anyhow::Result<()> {
    if let Some(spec) = spec {
        generate(&spec, &config.mock.root).await?;
    }

    let store = MockStore::new(&config.mock.root);
    store.ensure_dir(store.root()).await?;

    let router = Arc::new(RuntimeRouter::new(store, config.mock.max_request_events));
    router.start().await.context("Failed to start mock router")?;

    let registry = Arc::new(EndpointRegistry::new(
        router.clone(),
        config.server.base_url(),
        config.mock.example_param_value.clone(),
    ));

    if hot_reload {
        start_hot_reload(&config.mock.root, router.clone())?;
    }

    let server = run_server(config, registry).await?;

    info!("Mock server is running");
    info!("Press Ctrl+C to shutdown");

    let server_handle = server.handle();
    tokio::select! {
        result = server => {
            result.context("Server error")?;
            info!("Server stopped");
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            server_handle.stop(true).await;
            info!("Server shutdown complete");
        }
    }

    router.stop();
    Ok(())
}

#[cfg(feature = "hot-reload")]
fn start_hot_reload(root: &Path, router: Arc<RuntimeRouter>) -> anyhow::Result<()> {
    use notify::{EventKind, RecursiveMode, Watcher};
    use std::time::Duration;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let _ = tx.send(res);
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    info!(root = %root.display(), "Watching mock tree for changes");

    tokio::spawn(async move {
        let _watcher = watcher;
        while let Some(event) = rx.recv().await {
            match event {
                Ok(event) if matches!(event.kind, EventKind::Access(_)) => continue,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "File watch error");
                    continue;
                }
            }

            // Coalesce bursts such as a whole endpoint being written.
            tokio::time::sleep(Duration::from_millis(250)).await;
            while rx.try_recv().is_ok() {}

            match router.rehydrate().await {
                Ok(count) => info!(endpoints = count, "Mock tree rescanned"),
                Err(e) => tracing::error!(error = %e, "Failed to rescan mock tree"),
            }
        }
    });

    Ok(())
}

#[cfg(not(feature = "hot-reload"))]
fn start_hot_reload(_root: &Path, _router: Arc<RuntimeRouter>) -> anyhow::Result<()> {
    info!("Hot reload feature is not enabled");
    Ok(())
}
