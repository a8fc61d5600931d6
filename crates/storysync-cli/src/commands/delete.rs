use storysync_core::StoryId;

use crate::commands::common::{normalize_story_identifier, CliContext};
use crate::error::CliError;

pub async fn run_delete(id: &str, ctx: &CliContext) -> Result<(), CliError> {
    let id = normalize_story_identifier(id)?.parse::<StoryId>()?;
    let credential = ctx.credential()?;

    let db = ctx.open_database().await?;
    let coordinator = ctx.coordinator(&db, ctx.config.sync_options())?;
    coordinator
        .delete_story(&credential, &id)
        .await
        .map_err(CliError::from_core)?;

    println!("{id}");
    Ok(())
}
