//! Install command - precache the manifest into the current namespace

use super::build_worker;
use crate::config::Config;
use crate::error::{StowawayError, StowawayResult};
use crate::store::create_store;
use crate::ui::{self, TaskSpinner, UiContext};
use crate::worker::{EventOutcome, WorkerEvent};

/// Execute the install command
pub async fn execute(config: &Config) -> StowawayResult<()> {
    let ctx = UiContext::detect();
    let (worker, _) = build_worker(config, create_store(&config.store))?;
    let manifest = worker.lifecycle().manifest();

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!(
        "Installing {} ({} resources)...",
        worker.version(),
        manifest.len()
    ));

    let report = match worker.handle(WorkerEvent::Install).await {
        Ok(EventOutcome::Installed(report)) => report,
        Ok(other) => {
            spinner.stop_error("Install failed");
            return Err(StowawayError::Internal(format!(
                "install produced {:?}",
                other
            )));
        }
        Err(e) => {
            spinner.stop_error("Install failed");
            return Err(e);
        }
    };

    spinner.stop(&format!(
        "Installed {} ({} cached)",
        report.version,
        report.cached.len()
    ));

    for key in &report.cached {
        ui::step_ok(&ctx, key.url.as_str());
    }

    if !config.worker.skip_waiting {
        ui::step_warn_hint(
            &ctx,
            &format!("{} is waiting", report.version),
            "Run: stowaway activate",
        );
    }

    Ok(())
}
