use crate::commands::common::{
    format_list_footer, format_story_lines, story_to_list_item, CliContext, StoryListItem,
};
use crate::error::CliError;

pub async fn run_list(pending_only: bool, as_json: bool, ctx: &CliContext) -> Result<(), CliError> {
    let db = ctx.open_database().await?;
    let coordinator = ctx.coordinator(&db, ctx.config.sync_options())?;
    let mut stories = coordinator.local_view().await.map_err(CliError::from_core)?;
    if pending_only {
        stories.retain(|story| !story.synced);
    }

    if as_json {
        let json_items = stories
            .iter()
            .map(story_to_list_item)
            .collect::<Vec<StoryListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if stories.is_empty() {
        println!("No stories yet.");
    } else {
        for line in format_story_lines(&stories) {
            println!("{line}");
        }
        let pending = coordinator
            .store()
            .count_pending()
            .await
            .map_err(CliError::from_core)?;
        println!("{}", format_list_footer(stories.len(), pending));
    }

    Ok(())
}
