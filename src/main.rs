// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use wikistore::api::router;
use wikistore::auth::Authenticator;
use wikistore::config::{LogFormat, WikiConfig};
use wikistore::logging;
use wikistore::publish::{spawn_workers, Publisher};
use wikistore::render::ComrakRenderer;
use wikistore::state::AppState;
use wikistore::storage::{title_hash, BareStore, CacheStack, FsObjectStore};
use wikistore::wiki::Wiki;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = logging::init(LogFormat::from_env()) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "wikistore exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = WikiConfig::from_env()?;
    info!(config = ?config, "Starting wikistore");

    let backend = Arc::new(FsObjectStore::open(&config.data_dir)?);
    let store = BareStore::new(backend, config.bucket.clone()).with_timeout(config.store_timeout);
    let stack = Arc::new(CacheStack::new(store, config.capacities));

    // Published artifacts are served from the bucket, so wiki links point
    // at the hashed page path.
    let secret = config.secret.clone();
    let renderer = ComrakRenderer::new().with_link_resolver(Arc::new(move |title: &str| {
        format!("/page/{}", title_hash(title, &secret))
    }));
    let publisher = Publisher::new(stack.clone(), Arc::new(renderer));

    let shutdown = CancellationToken::new();
    let (queue, workers) = spawn_workers(
        publisher.clone(),
        config.publish_workers,
        config.publish_queue_depth,
        shutdown.clone(),
    );

    let auth = Authenticator::new(stack.clone(), config.session_ttl);
    let wiki = Wiki::new(
        stack,
        publisher,
        queue,
        auth,
        config.secret.clone(),
        config.region.clone(),
    );
    let app = router(AppState::new(wiki));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "wikistore listening");

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Shutdown signal received");
        signal.cancel();
    });

    let serve_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { serve_shutdown.cancelled().await })
        .await?;

    shutdown.cancel();
    workers.join().await;
    info!("wikistore stopped");
    Ok(())
}
