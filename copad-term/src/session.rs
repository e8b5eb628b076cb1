//! Interactive room session: stdin lines in, shared document out.
//!
//! Each typed line is appended to the shared document and broadcast;
//! inbound events redraw the document and print one-line notices.
//! Colon commands control the session:
//!
//! - `:w` / `:show` — print the document
//! - `:who` — list room members
//! - `:join <room>` — switch rooms over the same connection
//! - `:q` / `:quit` — leave and exit

use std::error::Error;

use copad_sync::{
    CollabClient, CursorPos, EditorSurface, RoomController, RoomState, SyncEvent, TextBuffer,
};
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(server_url: &str, room_id: &str, username: &str) -> Result<(), Box<dyn Error>> {
    let mut client = CollabClient::new(server_url);
    let mut events = client.take_event_rx().expect("fresh client owns its receiver");
    let mut controller = RoomController::new(room_id, username);
    let mut buffer = TextBuffer::new();

    let join = controller.join_request();
    client.connect().await?;
    client.send(&join).await?;

    // Initial presence announcement; peers see our caret before we type.
    announce_cursor(&client, &controller, &buffer).await;

    println!("joining {room_id} as {username}  (:q quits, :w shows the document, :who lists members)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SyncEvent::Connected) => log::debug!("channel to {server_url} established"),
                Some(SyncEvent::Disconnected) => {
                    println!("connection lost; rejoin to resume");
                    break;
                }
                Some(SyncEvent::Room(event)) => {
                    let was_joined = controller.state() == RoomState::Joined;
                    let prior_text = controller.content().to_owned();
                    controller.handle_event(event, &mut buffer);

                    for notice in controller.drain_notices() {
                        println!("* {notice}");
                    }
                    match controller.state() {
                        RoomState::Joined if !was_joined => {
                            println!(
                                "joined {} ({} member(s))",
                                controller.room_id(),
                                controller.session().len()
                            );
                            print_document(&buffer);
                        }
                        RoomState::Joined if controller.content() != prior_text => {
                            print_document(&buffer);
                        }
                        // A rejected join has nothing to tear down.
                        RoomState::Disconnected => return Ok(()),
                        _ => {}
                    }
                }
                None => break,
            },
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !handle_line(&line, &client, &mut controller, &mut buffer).await? {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    let leave = controller.leave(&mut buffer);
    let _ = client.send(&leave).await;
    client.close().await;
    println!("left {}", controller.room_id());
    Ok(())
}

/// Dispatch one typed line. Returns false when the session should end.
async fn handle_line(
    line: &str,
    client: &CollabClient,
    controller: &mut RoomController,
    buffer: &mut TextBuffer,
) -> Result<bool, Box<dyn Error>> {
    match line.trim_end() {
        ":q" | ":quit" => return Ok(false),
        ":w" | ":show" => print_document(buffer),
        ":who" => {
            for member in controller.session().members() {
                let you = if controller.session().is_local(member.session_id) {
                    "  (you)"
                } else {
                    ""
                };
                println!("  {}  {}{you}", member.color, member.username);
            }
        }
        cmd if cmd.starts_with(":join ") => {
            let room = cmd[":join ".len()..].trim().to_owned();
            if room.is_empty() {
                println!("usage: :join <room>");
            } else {
                let name = controller.username().to_owned();
                for event in controller.rebind(room, name, buffer) {
                    client.send(&event).await?;
                }
                announce_cursor(client, controller, buffer).await;
            }
        }
        typed => append_line(typed, client, controller, buffer).await?,
    }
    Ok(true)
}

/// Append one typed line to the shared document and broadcast the edit.
async fn append_line(
    line: &str,
    client: &CollabClient,
    controller: &mut RoomController,
    buffer: &mut TextBuffer,
) -> Result<(), Box<dyn Error>> {
    let mut text = buffer.text();
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(line);
    buffer.set_text(&text);

    let row = text.lines().count().max(1) as u32;
    let column = line.chars().count() as u32 + 1;
    buffer.move_cursor(CursorPos::new(row, column));

    if let Some(event) = controller.local_edit(&text) {
        client.send(&event).await?;
    }
    announce_cursor(client, controller, buffer).await;
    Ok(())
}

/// Broadcast the local caret position, if the session allows it.
async fn announce_cursor(client: &CollabClient, controller: &RoomController, buffer: &TextBuffer) {
    let position = buffer.cursor().unwrap_or(CursorPos::new(1, 1));
    if let Some(event) = controller.local_cursor(position) {
        if let Err(e) = client.send(&event).await {
            log::warn!("cursor announcement failed: {e}");
        }
    }
}

fn print_document(buffer: &TextBuffer) {
    let text = buffer.text();
    println!("── document ──────────────────────────────");
    for (n, line) in text.lines().enumerate() {
        println!("{:>3} │ {line}", n + 1);
    }
    if text.is_empty() {
        println!("    │ (empty)");
    }
    println!("──────────────────────────────────────────");
}
