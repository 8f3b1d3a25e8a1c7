//! Fetch command - run one request through the worker

use super::build_worker;
use crate::cli::args::FetchArgs;
use crate::config::Config;
use crate::error::StowawayResult;
use crate::request::{resolve, Request};
use crate::store::create_store;
use crate::strategy::FetchOutcome;
use crate::ui::{self, UiContext};
use tracing::info;

/// Execute the fetch command
///
/// When the current namespace already exists the worker is treated as
/// having been installed and activated by an earlier run, so no network
/// I/O happens before the request itself. Otherwise it is started first.
pub async fn execute(args: FetchArgs, config: &Config) -> StowawayResult<()> {
    let ctx = UiContext::detect();
    let store = create_store(&config.store);
    let installed = store.namespaces().await?.contains(&config.worker.version);

    let (worker, fetcher) = build_worker(config, store)?;
    if installed {
        worker.resume().await?;
    } else {
        info!("{} not installed, starting it first", worker.version());
        worker.start().await?;
    }

    let url = resolve(worker.dispatcher().origin(), &args.path)?;
    let mut request = Request::get(url);
    if args.html {
        request = request.with_header("Accept", "text/html");
    }

    let route = worker.dispatcher().classify(&request);
    let (response, source) = match worker.fetch(request).await? {
        FetchOutcome::Served(served) => (served.response, served.source.to_string()),
        FetchOutcome::PassThrough(request) => {
            (fetcher.fetch(&request).await?, "passthrough".to_string())
        }
    };

    ui::key_value(&ctx, "route", &format!("{:?}", route));
    ui::key_value_status(
        &ctx,
        "status",
        &response.status.to_string(),
        response.is_success(),
    );
    ui::key_value(&ctx, "source", &source);
    ui::key_value(&ctx, "bytes", &response.body.len().to_string());

    if args.body {
        println!();
        println!("{}", String::from_utf8_lossy(&response.body));
    }

    Ok(())
}
