use crate::cli::StoryArgs;
use crate::commands::common::{build_draft, CliContext};
use crate::error::CliError;

pub async fn run_add(args: &StoryArgs, ctx: &CliContext) -> Result<(), CliError> {
    let draft = build_draft(args)?;

    let db = ctx.open_database().await?;
    let coordinator = ctx.coordinator(&db, ctx.config.sync_options())?;
    let (story, _visible) = coordinator
        .add_story(draft)
        .await
        .map_err(CliError::from_core)?;

    println!("{}", story.id);
    Ok(())
}
