//! `troupe chat` — interactive session with a chat-mode team.
//!
//! REPL loop: each line is appended to the conversation as a user
//! message, the team runs until its termination strategy pauses for
//! input, and the updated log is persisted between turns.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use tokio_stream::StreamExt;

use troupe_core::{ChatHistory, CompletionClient, HistoryStore, Message};

pub async fn run(db_path: &str, team_path: &str, conversation: &str) -> Result<(), String> {
    let store = super::init_store(db_path)?;
    let definition = super::load_definition(team_path)?;
    let team = definition
        .build_chat(Arc::new(CompletionClient::new()))
        .map_err(|e| e.to_string())?;

    let mut history = store
        .load(conversation)
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_else(ChatHistory::new);

    println!("Troupe Chat");
    println!("══════════════════════════════════════");
    println!("Team: {} ({} workers)", team.id, team.roster().len());
    println!("Conversation: {}", conversation);
    println!("══════════════════════════════════════");
    println!();
    println!("Type your message and press Enter. Type /quit to exit.");
    println!();
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    let reader = stdin.lock();

    for line in reader.lines() {
        let line = line.map_err(|e| format!("Failed to read input: {}", e))?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            print!("> ");
            io::stdout().flush().ok();
            continue;
        }

        if matches!(trimmed, "/quit" | "/exit" | "/q") {
            println!("Goodbye!");
            break;
        }

        history.push(Message::user("user", trimmed));

        {
            let mut stream = team.invoke(&mut history);
            while let Some(item) = stream.next().await {
                match item {
                    Ok(msg) => println!("[{}] {}", msg.sender, msg.content),
                    Err(e) => {
                        println!("Run failed: {}", e);
                        break;
                    }
                }
            }
        }

        store
            .save(conversation, &history)
            .await
            .map_err(|e| e.to_string())?;

        print!("\n> ");
        io::stdout().flush().ok();
    }

    Ok(())
}
