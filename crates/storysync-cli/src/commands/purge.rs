use storysync_core::TombstonePolicy;

use crate::commands::common::CliContext;
use crate::commands::sync::sync_with_options;
use crate::error::CliError;

pub async fn run_purge(ctx: &CliContext) -> Result<(), CliError> {
    let mut options = ctx.config.sync_options();
    options.tombstones = TombstonePolicy::PurgeConfirmed;

    let report = sync_with_options(ctx, options).await?;
    if report.purged.is_empty() {
        println!("No tombstones to purge.");
    }
    for id in &report.purged {
        println!("{id}");
    }
    Ok(())
}
