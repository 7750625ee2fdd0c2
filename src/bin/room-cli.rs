use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser)]
#[command(name = "room-cli")]
#[command(about = "Join a gateway chat room from the terminal", long_about = None)]
struct Cli {
    /// Gateway base URL.
    #[arg(short, long, default_value = "ws://localhost:8080", env = "GATEWAY_WS_URL")]
    url: String,

    /// Sender name attached to every message.
    #[arg(short, long, default_value = "cli")]
    sender: String,

    /// Room to join.
    room: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let target = format!(
        "{}/api/v1/ws/rooms/{}",
        cli.url.trim_end_matches('/'),
        cli.room
    );

    let (socket, _) = tokio_tungstenite::connect_async(target.as_str()).await?;
    eprintln!("connected to {}", target);
    let (mut tx, mut rx) = socket.split();

    let printer = tokio::spawn(async move {
        while let Some(frame) = rx.next().await {
            match frame {
                Ok(Message::Text(text)) => println!("{}", text.as_str()),
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    eprintln!("read error: {}", e);
                    break;
                }
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let envelope = json!({ "message": line, "sender": cli.sender });
                tx.send(Message::Text(envelope.to_string().into())).await?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
        if printer.is_finished() {
            eprintln!("connection closed by gateway");
            break;
        }
    }

    let _ = tx.close().await;
    printer.abort();
    Ok(())
}
