//! `history`, `conversations` and `send` against a live backend.

use chatsync_core::{ConversationFilters, SyncSettings};
use chatsync_engine::SyncEngine;
use tracing::info;

use crate::bootstrap::bootstrap;
use crate::commands::RemoteArgs;
use crate::error::CliError;
use crate::presentation::{message_line, summary_line};

/// Load up to `pages` pages of history, newest first, and print them
/// oldest first.
pub async fn history(participant: &str, pages: u32, remote: &RemoteArgs) -> Result<(), CliError> {
    let engine = bootstrap(remote, SyncSettings::from_env()?)?;
    load_pages(&engine, participant, pages).await?;

    let view = engine.view();
    for message in &view.messages {
        println!("{}", message_line(message, engine.current_user_id()));
    }
    if view.pagination.has_more {
        println!("... older messages available (loaded {} pages)", view.pagination.page);
    }
    Ok(())
}

async fn load_pages(engine: &SyncEngine, participant: &str, pages: u32) -> Result<(), CliError> {
    engine.select_conversation(participant).await?;
    for _ in 1..pages.max(1) {
        if !engine.view().pagination.can_load_older() {
            break;
        }
        engine.load_older_messages().await?;
    }
    info!(
        participant_id = %participant,
        messages = engine.view().messages.len(),
        "History loaded"
    );
    Ok(())
}

pub async fn conversations(
    filters: &ConversationFilters,
    remote: &RemoteArgs,
) -> Result<(), CliError> {
    let engine = bootstrap(remote, SyncSettings::from_env()?)?;
    let n = engine.refresh_summaries(filters).await?;

    let view = engine.view();
    for summary in &view.summaries {
        println!("{}", summary_line(summary));
    }
    println!("{n} conversations, {} unread", view.total_unread());
    Ok(())
}

pub async fn send(participant: &str, body: &str, remote: &RemoteArgs) -> Result<(), CliError> {
    let engine = bootstrap(remote, SyncSettings::from_env()?)?;
    engine.select_conversation(participant).await?;
    let message = engine.send_message(body).await?;
    println!("{}", message_line(&message, engine.current_user_id()));
    Ok(())
}
