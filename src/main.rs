use std::io::Write;

use clap::Parser;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use parley::cli::{Cli, Commands};
use parley::config::RelayConfig;
use parley::console;
use parley::driver::Driver;
use parley::kernel::event::{Event, UserCommand};
use parley::kernel::reactor::Reactor;
use parley::protocol::content::Content;
use parley::services::genai::{ChatSession, GenAiClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config = cli.config();

    match cli.command {
        None => live(config).await,
        Some(Commands::Ask { prompt, stream }) => ask(&config, &prompt, stream).await,
        Some(Commands::Chat { stream }) => chat(&config, stream).await,
    }
}

async fn live(config: RelayConfig) -> anyhow::Result<()> {
    tracing::info!("parley live session starting: {}", config.endpoint);

    let (tx, rx) = mpsc::channel(config.event_queue_capacity);
    let mut reactor = Reactor::new(rx, config.reactor());
    let mut driver = Driver::new(config.clone(), tx.clone());

    let mut startup = vec![UserCommand::Connect];
    if config.microphone_on_start {
        startup.push(UserCommand::ToggleMicrophone);
    }
    if config.screen_on_start {
        startup.push(UserCommand::ToggleScreen);
    }
    for command in startup {
        tx.send(Event::Command(command)).await?;
    }

    console::spawn_reader(tx.clone());

    let ctrl_c_tx = tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = ctrl_c_tx.send(Event::Command(UserCommand::Quit)).await;
        }
    });
    drop(tx);

    reactor.run(&mut driver).await;
    tracing::info!("Session ended with {} log entries", reactor.log.len());

    // The console reader sits in a blocking stdin read that would hold up runtime shutdown.
    std::process::exit(0)
}

async fn ask(config: &RelayConfig, prompt: &str, stream: bool) -> anyhow::Result<()> {
    let client = GenAiClient::from_config(config);
    let contents = [Content::text(prompt).with_role("user")];

    if !stream {
        let response = client.generate_content(&contents).await?;
        println!("{}", response.text());
        return Ok(());
    }

    let mut partials = client.generate_content_stream(&contents).await?;
    let mut stdout = std::io::stdout();
    while let Some(partial) = partials.next().await {
        write!(stdout, "{}", partial?.text())?;
        stdout.flush()?;
    }
    println!();
    Ok(())
}

async fn chat(config: &RelayConfig, stream: bool) -> anyhow::Result<()> {
    let client = GenAiClient::from_config(config);
    let mut session = client.start_chat();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Chatting with {}. Empty line to exit.", client.model());
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        let turn = if stream {
            stream_turn(&mut session, line).await
        } else {
            session.send_message(line).await.map(|response| println!("{}", response.text()))
        };
        if let Err(e) = turn {
            tracing::warn!("Chat turn failed: {}", e);
        }
    }
    Ok(())
}

async fn stream_turn(session: &mut ChatSession, line: &str) -> anyhow::Result<()> {
    let mut partials = session.send_message_stream(line).await?;
    let mut stdout = std::io::stdout();
    while let Some(partial) = partials.next().await {
        write!(stdout, "{}", partial?.text())?;
        stdout.flush()?;
    }
    println!();
    Ok(())
}
