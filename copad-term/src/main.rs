//! copad — terminal frontend for shared code-editing rooms.
//!
//! `copad join <room>` connects to a room server and mirrors the shared
//! document into the terminal, forwarding typed lines as edits.
//! `copad serve` runs the reference room server.

mod session;

use clap::{Parser, Subcommand};
use copad_sync::{RoomServer, ServerConfig};

#[derive(Parser)]
#[command(name = "copad", about = "Real-time collaborative code editing over shared rooms")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Join a room on a running server")]
    Join {
        #[arg(help = "Room identifier to join")]
        room_id: String,

        #[arg(help = "Display name announced to other members", short, long, default_value = "anonymous")]
        username: String,

        #[arg(help = "Room server URL", short, long, default_value = "ws://127.0.0.1:9600")]
        server: String,
    },

    #[command(about = "Run the reference room server")]
    Serve {
        #[arg(help = "Address to bind", long, default_value = "127.0.0.1:9600")]
        bind: String,

        #[arg(help = "Maximum members per room", long, default_value_t = 32)]
        room_capacity: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Join {
            room_id,
            username,
            server,
        } => session::run(&server, &room_id, &username).await,

        Commands::Serve {
            bind,
            room_capacity,
        } => {
            let server = RoomServer::new(ServerConfig {
                bind_addr: bind,
                max_members_per_room: room_capacity,
                ..ServerConfig::default()
            });
            server.run().await
        }
    }
}
