// UI layer: runs the selected mode and prints the outcome for the user.
// Failed sends are reported on stdout and do not change the exit status;
// only a watcher that cannot start is returned as an error.

use crate::api::{self, TelegramClient, Update};
use crate::config::{Command, Settings};
use crate::watcher::{self, ChatPhotoSink};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Run one command. Blocks forever in watcher mode until Ctrl-C.
pub fn run(settings: Settings) -> Result<()> {
    let api = TelegramClient::from_env(&settings.bot_token)
        .context("Failed to build Telegram client")?;
    let mode = settings.command.mode();

    match settings.command {
        Command::GetChatId => {
            if let Err(e) = show_updates(&api) {
                println!("Error occurred in {}() -> {:#}", mode, e);
            }
        }
        Command::SendText { chat_id, text } => match api.send_text(&chat_id, &text) {
            Ok(()) => println!("Text sent"),
            Err(e) => println!("Error occurred in {}() -> {}", mode, e),
        },
        Command::SendPhoto {
            chat_id,
            path,
            caption,
        } => {
            let res = with_spinner(&path, || api.send_photo(&chat_id, &path, &caption));
            match res {
                Ok(()) => println!("Photo sent"),
                Err(e) => println!("Error occurred in {}() -> {}", mode, e),
            }
        }
        Command::SendVideo {
            chat_id,
            path,
            caption,
        } => {
            let res = with_spinner(&path, || api.send_video(&chat_id, &path, &caption));
            match res {
                Ok(()) => println!("Video sent"),
                Err(e) => println!("Error occurred in {}() -> {}", mode, e),
            }
        }
        Command::Watch {
            chat_id,
            dir,
            caption,
        } => {
            let sink = ChatPhotoSink::new(api, &chat_id);
            watcher::run(&dir, &sink, &caption)
                .with_context(|| format!("Failed to watch {}", dir.display()))?;
        }
    }
    Ok(())
}

/// Print pending updates as indented JSON followed by one line per chat,
/// which is what users need to fill in `--chat-id`.
fn show_updates(client: &TelegramClient) -> Result<()> {
    let updates = client.get_updates()?;
    println!("{}", api::updates_to_json(&updates)?);

    let chats = chat_summary(&updates);
    if chats.is_empty() {
        println!("No messages yet: send your bot a message and run getChatID again.");
    }
    for (id, name) in chats {
        println!("chat {} -> {}", id, name);
    }
    Ok(())
}

/// Distinct chats seen in the updates, keyed by id.
fn chat_summary(updates: &[Update]) -> BTreeMap<i64, String> {
    updates
        .iter()
        .filter_map(|u| u.message.as_ref())
        .map(|m| (m.chat.id, m.chat.display_name()))
        .collect()
}

/// Show a spinner while an upload is in flight.
fn with_spinner<T>(path: &Path, upload: impl FnOnce() -> T) -> T {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(format!("Uploading {}...", path.display()));
    spinner.enable_steady_tick(Duration::from_millis(100));
    let out = upload();
    spinner.finish_and_clear();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Chat, Message};

    fn update(id: i64, chat_id: i64, title: &str) -> Update {
        Update {
            update_id: id,
            message: Some(Message {
                message_id: id,
                chat: Chat {
                    id: chat_id,
                    kind: "group".into(),
                    title: Some(title.into()),
                    ..Default::default()
                },
                ..Default::default()
            }),
        }
    }

    #[test]
    fn chat_summary_dedupes_by_id() {
        let updates = vec![
            update(1, -100, "Garage"),
            update(2, 42, "Porch"),
            update(3, -100, "Garage"),
            Update {
                update_id: 4,
                message: None,
            },
        ];
        let chats = chat_summary(&updates);
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[&-100], "Garage");
        assert_eq!(chats[&42], "Porch");
    }

    #[test]
    fn spinner_returns_upload_result() {
        let out = with_spinner(Path::new("/tmp/clip.mp4"), || 7);
        assert_eq!(out, 7);
    }
}
