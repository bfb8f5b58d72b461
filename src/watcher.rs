// Directory watcher: forwards new `.jpg` files to a chat while a motion
// detector signals activity through a sentinel file.
//
// The arming logic lives in `Arming` and `drive`, which never touch the
// filesystem; `run` wires them to a `notify` watcher and blocks.

use crate::api::TelegramClient;
use crate::error::Result;
use log::{error, info, warn};
use notify::event::{ModifyKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

/// Marker file whose presence arms the watcher.
pub const SENTINEL_FILE: &str = "motionstarted";

/// Suffix of files forwarded while armed. Matched case-sensitively.
pub const IMAGE_SUFFIX: &str = ".jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Removed,
    Other,
}

/// One filesystem change for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl WatchEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        WatchEvent {
            path: path.into(),
            kind: ChangeKind::Created,
        }
    }

    pub fn removed(path: impl Into<PathBuf>) -> Self {
        WatchEvent {
            path: path.into(),
            kind: ChangeKind::Removed,
        }
    }

    /// Split a notify event into one `WatchEvent` per path.
    ///
    /// A file moved into the directory counts as created and one moved out
    /// counts as removed. The combined rename event is dropped so a move is
    /// not seen twice.
    pub fn from_notify(event: notify::Event) -> Vec<WatchEvent> {
        let kind = match event.kind {
            notify::EventKind::Create(_) => ChangeKind::Created,
            notify::EventKind::Remove(_) => ChangeKind::Removed,
            notify::EventKind::Modify(ModifyKind::Name(RenameMode::To)) => ChangeKind::Created,
            notify::EventKind::Modify(ModifyKind::Name(RenameMode::From)) => ChangeKind::Removed,
            _ => ChangeKind::Other,
        };
        event
            .paths
            .into_iter()
            .map(|path| WatchEvent { path, kind })
            .collect()
    }
}

/// What the watcher decided to do about one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    Armed,
    Disarmed,
    Upload(PathBuf),
    Ignore,
}

/// Armed/disarmed state for one watched directory.
#[derive(Debug)]
pub struct Arming {
    sentinel: PathBuf,
    armed: bool,
}

impl Arming {
    /// Starts disarmed.
    pub fn new(dir: &Path) -> Self {
        Arming {
            sentinel: dir.join(SENTINEL_FILE),
            armed: false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn sentinel(&self) -> &Path {
        &self.sentinel
    }

    pub fn observe(&mut self, event: &WatchEvent) -> Reaction {
        match event.kind {
            // Images are checked first: `motionstarted.jpg` is an image.
            ChangeKind::Created if is_image(&event.path) => {
                if self.armed {
                    Reaction::Upload(event.path.clone())
                } else {
                    Reaction::Ignore
                }
            }
            ChangeKind::Created if event.path == self.sentinel => {
                self.armed = true;
                Reaction::Armed
            }
            ChangeKind::Removed if event.path == self.sentinel => {
                self.armed = false;
                Reaction::Disarmed
            }
            _ => Reaction::Ignore,
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.to_string_lossy().ends_with(IMAGE_SUFFIX)
}

/// Destination for photos picked up by the watcher.
pub trait PhotoSink {
    fn send_photo(&self, path: &Path, caption: &str) -> Result<()>;
}

/// A Telegram client bound to the chat that receives the snapshots.
pub struct ChatPhotoSink {
    client: TelegramClient,
    chat_id: String,
}

impl ChatPhotoSink {
    pub fn new(client: TelegramClient, chat_id: &str) -> Self {
        ChatPhotoSink {
            client,
            chat_id: chat_id.to_string(),
        }
    }
}

impl PhotoSink for ChatPhotoSink {
    fn send_photo(&self, path: &Path, caption: &str) -> Result<()> {
        self.client.send_photo(&self.chat_id, path, caption)
    }
}

/// Feed events through the arming state, uploading synchronously.
/// A failed upload is reported and the next event is processed as usual.
pub fn drive<I>(arming: &mut Arming, events: I, sink: &dyn PhotoSink, caption: &str)
where
    I: IntoIterator<Item = WatchEvent>,
{
    for event in events {
        match arming.observe(&event) {
            Reaction::Armed => info!("armed"),
            Reaction::Disarmed => info!("disarmed"),
            Reaction::Upload(path) => {
                info!("file created: {}", path.display());
                match sink.send_photo(&path, caption) {
                    Ok(()) => println!("Photo sent"),
                    Err(e) => {
                        error!("upload of {} failed: {}", path.display(), e);
                        println!("Error occurred in watcher sendPhoto() -> {}", e);
                    }
                }
            }
            Reaction::Ignore => {}
        }
    }
}

enum LoopMessage {
    Fs(notify::Result<notify::Event>),
    Shutdown,
}

/// A live watch on one directory together with its arming state.
struct WatchSession {
    // Dropping the watcher ends the subscription.
    _watcher: RecommendedWatcher,
    tx: mpsc::Sender<LoopMessage>,
    rx: mpsc::Receiver<LoopMessage>,
    arming: Arming,
}

impl WatchSession {
    /// Subscribe to `dir`. The directory is canonicalized first: the
    /// backend reports absolute paths, and the sentinel has to compare equal
    /// to them even when `dir` was given relative to the working directory.
    fn open(dir: &Path) -> Result<Self> {
        let dir = std::fs::canonicalize(dir).map_err(notify::Error::io)?;
        let (tx, rx) = mpsc::channel();

        let fs_tx = tx.clone();
        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                if fs_tx.send(LoopMessage::Fs(res)).is_err() {
                    warn!("watch loop has stopped, dropping event");
                }
            })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        Ok(WatchSession {
            _watcher: watcher,
            tx,
            rx,
            arming: Arming::new(&dir),
        })
    }

    /// Handle one message. Returns `false` once the loop should stop.
    fn handle(&mut self, message: LoopMessage, sink: &dyn PhotoSink, caption: &str) -> bool {
        match message {
            LoopMessage::Fs(Ok(event)) => {
                drive(&mut self.arming, WatchEvent::from_notify(event), sink, caption);
                true
            }
            LoopMessage::Fs(Err(e)) => {
                error!("error: {}", e);
                true
            }
            LoopMessage::Shutdown => {
                info!("stopping watcher");
                false
            }
        }
    }
}

/// Watch `dir` until Ctrl-C.
///
/// Failing to set up the watch is returned as an error; errors reported by
/// the watcher afterwards are logged and the loop keeps going.
pub fn run(dir: &Path, sink: &dyn PhotoSink, caption: &str) -> Result<()> {
    let mut session = WatchSession::open(dir)?;

    let tx = session.tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = tx.send(LoopMessage::Shutdown);
    }) {
        warn!("could not install Ctrl-C handler: {}", e);
    }

    info!(
        "watching {} (arm with {})",
        dir.display(),
        session.arming.sentinel().display()
    );

    while let Ok(message) = session.rx.recv() {
        if !session.handle(message, sink, caption) {
            break;
        }
    }
    Ok(())
}
