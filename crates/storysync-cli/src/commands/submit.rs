use storysync_core::SubmitOutcome;

use crate::cli::StoryArgs;
use crate::commands::common::{build_draft, CliContext};
use crate::error::CliError;

pub async fn run_submit(args: &StoryArgs, ctx: &CliContext) -> Result<(), CliError> {
    let draft = build_draft(args)?;
    let credential = ctx.credential()?;

    let db = ctx.open_database().await?;
    let coordinator = ctx.coordinator(&db, ctx.config.sync_options())?;

    let outcome = coordinator
        .submit_story(&credential, draft)
        .await
        .map_err(CliError::from_core)?;
    match outcome {
        SubmitOutcome::Published { photo_dropped } => {
            if photo_dropped {
                eprintln!("Photo could not be resized and was not uploaded");
            }
            println!("Story published");
        }
        SubmitOutcome::Queued { story, reason, .. } => {
            eprintln!("Could not reach the story service: {reason}");
            println!("Saved offline as {}; run `storysync sync` to retry", story.id);
        }
    }
    Ok(())
}
