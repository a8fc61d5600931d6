use storysync_core::sync::SyncOptions;
use storysync_core::SyncReport;

use crate::commands::common::{format_sync_report_lines, story_to_list_item, CliContext};
use crate::error::CliError;

pub async fn run_sync(as_json: bool, ctx: &CliContext) -> Result<(), CliError> {
    let report = sync_with_options(ctx, ctx.config.sync_options()).await?;

    if as_json {
        let visible = report.visible.iter().map(story_to_list_item).collect::<Vec<_>>();
        let payload = serde_json::json!({
            "visible": visible,
            "pushed": report.pushed,
            "failed": report
                .failed
                .iter()
                .map(|failure| serde_json::json!({"id": failure.id, "error": failure.error}))
                .collect::<Vec<_>>(),
            "dropped_photos": report.dropped_photos,
            "purged": report.purged,
            "superseded": report.superseded,
            "needs_reauth": report.needs_reauth,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        for line in format_sync_report_lines(&report) {
            println!("{line}");
        }
    }

    if report.needs_reauth {
        eprintln!("The story service rejected the token for some stories. Update STORYSYNC_TOKEN and sync again.");
    }
    Ok(())
}

pub async fn sync_with_options(
    ctx: &CliContext,
    options: SyncOptions,
) -> Result<SyncReport, CliError> {
    let credential = ctx.credential()?;
    let db = ctx.open_database().await?;
    let coordinator = ctx.coordinator(&db, options)?;
    coordinator
        .sync(&credential)
        .await
        .map_err(CliError::from_core)
}
