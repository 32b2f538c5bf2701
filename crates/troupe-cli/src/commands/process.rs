//! `troupe process` — one planned run against a stored conversation.
//!
//! Loads the conversation, appends the inquiry, streams the run, then
//! persists the updated log. Messages are printed as they are produced
//! so long runs are observable.

use std::sync::Arc;

use tokio_stream::StreamExt;

use troupe_core::{ChatHistory, CompletionClient, HistoryStore, Message};

pub async fn run(
    db_path: &str,
    team_path: &str,
    conversation: &str,
    message: &str,
    json: bool,
) -> Result<(), String> {
    let store = super::init_store(db_path)?;
    let definition = super::load_definition(team_path)?;
    let team = definition
        .build_planned(Arc::new(CompletionClient::new()))
        .map_err(|e| e.to_string())?;

    let mut history = store
        .load(conversation)
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_else(ChatHistory::new);

    history.push(Message::user("user", message));

    tracing::info!(
        "[Process] Running team '{}' on conversation '{}'",
        team.id,
        conversation
    );

    let run_result = {
        let mut stream = team.invoke(&mut history);
        let mut result = Ok(());
        while let Some(item) = stream.next().await {
            match item {
                Ok(msg) => print_message(&msg, json),
                Err(e) => {
                    result = Err(e.to_string());
                    break;
                }
            }
        }
        result
    };

    // Persist whatever the run produced, even on failure.
    store
        .save(conversation, &history)
        .await
        .map_err(|e| e.to_string())?;

    run_result?;

    println!();
    println!("Conversation: {}", conversation);
    Ok(())
}

fn print_message(message: &Message, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::to_string(message).unwrap_or_default()
        );
    } else {
        println!("[{}] {}", message.sender, message.content);
    }
}
