//! Serve command - install the current version and proxy requests

use crate::cli::args::ServeArgs;
use crate::config::Config;
use crate::error::StowawayResult;
use crate::network::{Fetcher, HttpFetcher};
use crate::server;
use crate::store::create_store;
use crate::ui::{self, TaskSpinner, UiContext};
use crate::worker::{Startup, Worker};
use std::sync::Arc;
use tracing::debug;

/// Execute the serve command
pub async fn execute(args: ServeArgs, config: &Config) -> StowawayResult<()> {
    let ctx = UiContext::detect();

    let mut config = config.clone();
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if let Some(upstream) = args.upstream {
        config.network.upstream = Some(upstream);
        // Reject a bad --upstream before anything is fetched
        config.upstream()?;
    }
    debug!("Serving with upstream {:?}", config.network.upstream);

    let store = create_store(&config.store);
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::from_config(&config)?);
    let version = config.worker.version.clone();

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Starting {}...", version));
    let (worker, startup) = match Worker::launch(&config, store, Arc::clone(&fetcher)).await {
        Ok(launched) => launched,
        Err(e) => {
            spinner.stop_error(&format!("Failed to start {}", version));
            return Err(e);
        }
    };

    match startup {
        Startup::Activated(report) => {
            spinner.stop(&format!("{} active", version));
            for name in &report.deleted {
                ui::step_ok_detail(&ctx, "Deleted stale namespace", name);
            }
            for (name, reason) in &report.failed {
                ui::step_warn_hint(&ctx, &format!("Could not delete {}", name), reason);
            }
        }
        Startup::Waiting => {
            spinner.stop(&format!("{} installed", version));
            ui::step_warn_hint(
                &ctx,
                &format!("{} is waiting; requests pass through", version),
                "Set worker.skip_waiting = true to take control on start",
            );
        }
        Startup::Resumed(error) => {
            spinner.stop(&format!("{} resumed from cache", version));
            ui::step_warn_hint(
                &ctx,
                "Install failed, serving the installed copy",
                &error.to_string(),
            );
        }
    }

    ui::key_value(&ctx, "origin", worker.dispatcher().origin().as_str());
    ui::key_value(&ctx, "listen", &config.server.listen);

    server::serve(&config.server.listen, Arc::new(worker), fetcher).await
}
