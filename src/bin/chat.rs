//! Console chat loop against a streaming chat backend.
//!
//! Dispatched utterances are logged rather than rendered; this binary
//! exercises the full relay path end to end without an avatar session.

use mira::avatar::{AvatarEngine, AvatarState};
use mira::config::MiraConfig;
use mira::llm::LlmClient;
use mira::relay::SpeechRelay;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Avatar stand-in that logs speak calls instead of animating.
struct ConsoleAvatar;

impl AvatarEngine for ConsoleAvatar {
    fn speak(&self, markup: &str, is_first: bool, is_last: bool) {
        info!(is_first, is_last, "speak: {markup}");
    }

    fn interrupt(&self) {
        info!("interrupt requested");
    }

    fn state(&self) -> AvatarState {
        AvatarState::Idle
    }
}

#[tokio::main]
async fn main() -> mira::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = MiraConfig::default_config_path();
    let config = if config_path.exists() {
        MiraConfig::from_file(&config_path)?
    } else {
        MiraConfig::default()
    };

    let client = LlmClient::new(&config.llm)?;
    let language = config.llm.language.clone();
    let mut relay = SpeechRelay::new(config, Arc::new(ConsoleAvatar));

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    println!("mira console chat (Ctrl-C to quit)");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                if let Err(e) = run_one_turn(&client, &mut relay, text, &language).await {
                    eprintln!("turn failed: {e}");
                }
            }
        }
    }

    info!("shutting down");
    Ok(())
}

async fn run_one_turn(
    client: &LlmClient,
    relay: &mut SpeechRelay,
    text: &str,
    language: &str,
) -> mira::Result<()> {
    let stream = client.chat_stream(text, language).await?;
    let reply = relay.run_turn(text, stream).await?;
    println!("{reply}");
    Ok(())
}
