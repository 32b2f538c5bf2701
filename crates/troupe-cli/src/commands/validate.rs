//! `troupe validate` — check a team definition without running it.

use troupe_core::TeamMode;

pub fn run(team_path: &str) -> Result<(), String> {
    let definition = super::load_definition(team_path)?;

    println!("Team definition OK: {}", team_path);
    println!("  id: {}", definition.id);
    if !definition.description.is_empty() {
        println!("  description: {}", definition.description);
    }
    println!(
        "  mode: {}",
        match definition.mode {
            TeamMode::Planned => "planned",
            TeamMode::Chat => "chat",
        }
    );
    println!("  workers: {}", definition.workers.len());
    for worker in &definition.workers {
        println!("    - {}: {}", worker.id, worker.description);
    }
    if let Some(chat) = &definition.chat {
        println!("  stop_after: {}", chat.stop_after.join(", "));
    }

    Ok(())
}
