//! Activate command - delete stale cache namespaces

use super::build_worker;
use crate::config::Config;
use crate::error::{StowawayError, StowawayResult};
use crate::store::create_store;
use crate::ui::{self, UiContext};

/// Execute the activate command
///
/// Refuses to run before the current version has been installed, so the
/// last populated namespace is never the one thrown away.
pub async fn execute(config: &Config) -> StowawayResult<()> {
    let ctx = UiContext::detect();
    let store = create_store(&config.store);
    let version = &config.worker.version;

    if !store.namespaces().await?.contains(version) {
        return Err(StowawayError::InvalidState {
            expected: format!("{} installed", version),
            actual: "not installed".to_string(),
        });
    }

    let (worker, _) = build_worker(config, store)?;
    let report = worker.lifecycle().collect_garbage().await;

    ui::section(&ctx, &format!("Activated {}", report.version));
    if report.deleted.is_empty() && report.failed.is_empty() {
        ui::step_ok(&ctx, "No stale namespaces");
    }
    for name in &report.deleted {
        ui::step_ok_detail(&ctx, "Deleted", name);
    }
    for (name, reason) in &report.failed {
        ui::step_warn_hint(&ctx, &format!("Could not delete {}", name), reason);
    }

    Ok(())
}
