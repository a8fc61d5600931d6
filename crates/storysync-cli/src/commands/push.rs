use storysync_core::edge::{EdgeCache, HttpFetcher, MemoryCacheStorage};

use crate::commands::common::CliContext;
use crate::error::CliError;
use crate::host::TerminalHost;

pub async fn run_push(payload: Option<&str>, click: bool, ctx: &CliContext) -> Result<(), CliError> {
    // Notifications never touch cached responses.
    let cache = EdgeCache::new(
        MemoryCacheStorage::new(),
        HttpFetcher::new(ctx.config.request_timeout())?,
        ctx.config.edge_config(),
    )?;
    let host = TerminalHost::new(ctx.config.edge.app_origin.clone());

    let notification = cache
        .handle_push(payload.map(str::as_bytes), &host)
        .await?;
    if click {
        cache.handle_notification_click(&notification, &host).await?;
    }
    Ok(())
}
