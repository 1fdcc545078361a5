//! Headless bot: logs in, joins a game, runs right and jumps now and then.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use shared::{DirectionKey, InputEvent, ServerMessage};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address
    #[clap(short, long, default_value = "127.0.0.1:8080")]
    server: String,
    /// Number of snapshots to play before leaving
    #[clap(short, long, default_value = "5000")]
    ticks: u64,
    /// Jump every this many snapshots
    #[clap(short, long, default_value = "250")]
    jump_every: u64,
}

async fn login(server: &str) -> Result<String, Box<dyn std::error::Error>> {
    let (mut ws, _) = connect_async(format!("ws://{}/login", server)).await?;
    while let Some(frame) = ws.next().await {
        if let Message::Text(text) = frame? {
            if let Ok(ServerMessage::Credential(grant)) = ServerMessage::from_json(&text) {
                return Ok(grant.token);
            }
        }
    }
    Err("login closed without a credential".into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let token = login(&args.server).await?;
    info!("Logged in");

    let url = format!("ws://{}/play?token={}", args.server, token);
    let (ws, _) = connect_async(url).await?;
    let (mut sink, mut source) = ws.split();
    sink.send(Message::Text(
        InputEvent::KeyDown(DirectionKey::Right).encode().to_string(),
    ))
    .await?;
    info!("Waiting for an opponent...");

    let mut slot = None;
    let mut score = 0;
    let mut frames = 0;
    while let Some(frame) = source.next().await {
        let text = match frame? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        match ServerMessage::from_json(&text) {
            Ok(ServerMessage::Slot(assignment)) => {
                slot = assignment.slot();
                info!("Playing as {}", assignment.message);
            }
            Ok(ServerMessage::Render(render)) => {
                frames += 1;
                if let Some(me) = slot.and_then(|slot| render.player(slot)) {
                    if me.score != score {
                        score = me.score;
                        info!("Score {} at {:?}", score, me.pos);
                    }
                }
                if args.jump_every > 0 && frames % args.jump_every == 0 {
                    for event in [InputEvent::JumpPressed, InputEvent::JumpReleased] {
                        sink.send(Message::Text(event.encode().to_string())).await?;
                    }
                }
                if frames >= args.ticks {
                    break;
                }
            }
            Ok(ServerMessage::Credential(_)) => {}
            Err(e) => warn!("Dropping unparsable message: {}", e),
        }
    }

    info!("Leaving after {} snapshots with score {}", frames, score);
    sink.close().await?;
    Ok(())
}
