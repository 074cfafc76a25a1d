mod agents;
mod config;
mod db;
mod error;
mod review;
mod shutdown;
mod source;
mod state;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use tracing::info;

use crate::agents::DeepSeekAgent;
use crate::db::PgStore;
use crate::review::{Dispatcher, Firing, ReviewWorkflow, Scheduler};
use crate::shutdown::ShutdownSignal;
use crate::source::{GitSourceFetcher, ReferencePolicy};
use crate::state::ReviewServices;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "code_mentor=info".into()),
        )
        .init();

    let config = config::Config::from_env()?;

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    db::run_migrations(&pool).await?;
    let store = Arc::new(PgStore::new(pool.clone()));

    let reviewer = DeepSeekAgent::new(
        config.deepseek_api_key.clone(),
        config.deepseek_api_url.clone(),
        config.deepseek_model.clone(),
        config.review.ai_timeout,
    )?;
    let fetcher = GitSourceFetcher::new(
        config.source.workspace_dir.clone(),
        config.source.extension.clone(),
        config.source.fetch_timeout,
    )?;
    let references = ReferencePolicy::new(&config.source.trusted_host)?;

    let services = ReviewServices {
        submissions: store.clone(),
        reviews: store.clone(),
        tasks: store.clone(),
        reviewer: Arc::new(reviewer),
        fetcher: Arc::new(fetcher),
    };
    let workflow = Arc::new(ReviewWorkflow::new(
        services,
        references,
        config.review.ai_timeout,
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        workflow,
        store,
        config.review.batch_size,
        config.review.max_concurrent,
        config.review.max_attempts,
    ));

    let mut shutdown = ShutdownSignal::install()?;
    let scheduler = Arc::new(Scheduler::new(dispatcher, config.review.interval));
    scheduler.start().await;
    info!(
        model = %config.deepseek_model,
        batch_size = config.review.batch_size,
        max_concurrent = config.review.max_concurrent,
        "Code mentor review worker started"
    );

    if config.review.run_on_start {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move {
            if let Firing::Completed(report) = scheduler.trigger().await {
                info!(reviewed = report.reviewed, "Startup review cycle finished");
            }
        });
    }

    shutdown.recv().await?;
    info!("Waiting for the running review cycle");

    scheduler.stop().await;
    pool.close().await;
    info!("Code mentor review worker stopped");

    Ok(())
}
