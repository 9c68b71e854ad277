use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::kernel::event::{Event, UserCommand};

pub const HELP: &str = "Commands: /mic /screen /video /pause /connect /quit. Anything else is sent as text.";

/// Map one console line to a command. Blank lines and unknown slash commands yield `None`.
pub fn parse_command(line: &str) -> Option<UserCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if !line.starts_with('/') {
        return Some(UserCommand::SendText(line.to_string()));
    }
    match line.to_ascii_lowercase().as_str() {
        "/mic" => Some(UserCommand::ToggleMicrophone),
        "/screen" => Some(UserCommand::ToggleScreen),
        "/video" => Some(UserCommand::ToggleVideo),
        "/pause" => Some(UserCommand::PauseVideo),
        "/connect" => Some(UserCommand::Connect),
        "/quit" | "/exit" => Some(UserCommand::Quit),
        _ => None,
    }
}

/// Forward stdin lines to the reactor until stdin closes.
pub fn spawn_reader(tx: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();

        println!("{}", HELP);

        while let Ok(Some(line)) = lines.next_line().await {
            let Some(command) = parse_command(&line) else {
                if !line.trim().is_empty() {
                    warn!("Unknown command: {}", line.trim());
                    println!("{}", HELP);
                }
                continue;
            };
            info!("Console command: {:?}", command);
            if let Err(e) = tx.send(Event::Command(command)).await {
                error!("Failed to send command: {}", e);
                break;
            }
        }
    });
}
