// API client module: a small blocking HTTP client for the Telegram Bot API.
// Every call is one request with no retries; failures are handed straight
// back to the caller.

use crate::error::{Error, Result};
use log::{debug, warn};
use reqwest::blocking::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Public Bot API endpoint, overridable through `TELEGRAM_API_URL`.
pub const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

/// Blocking client bound to one bot token.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
    token: String,
}

/// Envelope every Bot API response is wrapped in.
#[derive(Deserialize, Debug, Default)]
pub struct Envelope<T> {
    pub ok: bool,
    #[serde(default)]
    pub result: T,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
}

/// One entry from `getUpdates`. Only plain messages are decoded; other
/// update types leave `message` empty.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct Update {
    pub update_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct Message {
    pub message_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    pub chat: Chat,
    pub date: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct User {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Chat {
    /// Human readable name: group title, then the person's full name,
    /// then the @username.
    pub fn display_name(&self) -> String {
        if let Some(title) = &self.title {
            return title.clone();
        }
        let full: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if !full.is_empty() {
            return full.join(" ");
        }
        match &self.username {
            Some(user) => format!("@{}", user),
            None => String::new(),
        }
    }
}

/// Indented JSON rendering of updates, as printed by `getChatID`.
pub fn updates_to_json(updates: &[Update]) -> Result<String> {
    Ok(serde_json::to_string_pretty(updates)?)
}

/// Which upload endpoint a file goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    fn method(self) -> &'static str {
        match self {
            MediaKind::Photo => "sendPhoto",
            MediaKind::Video => "sendVideo",
        }
    }

    fn field(self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
        }
    }
}

impl TelegramClient {
    /// Client against the public endpoint.
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    /// Create a client configured from the environment variable
    /// `TELEGRAM_API_URL` or fallback to the public endpoint.
    pub fn from_env(token: &str) -> Result<Self> {
        let base_url =
            std::env::var("TELEGRAM_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        Self::with_base_url(&base_url, token)
    }

    pub fn with_base_url(base_url: &str, token: &str) -> Result<Self> {
        let client = Client::builder().build().map_err(strip_url)?;
        Self::with_client(client, base_url, token)
    }

    /// Wrap an already configured reqwest client (timeouts, proxies).
    pub fn with_client(client: Client, base_url: &str, token: &str) -> Result<Self> {
        require(token, "bot token")?;
        Ok(TelegramClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Full URL of a Bot API method. Contains the token: never log it.
    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// Same as `method_url` with the token masked, for log lines.
    fn redacted_url(&self, method: &str) -> String {
        format!("{}/bot<token>/{}", self.base_url, method)
    }

    /// Fetch the bot's pending updates. Used to discover the numeric id of
    /// a chat the bot has been added to.
    pub fn get_updates(&self) -> Result<Vec<Update>> {
        debug!("GET {}", self.redacted_url("getUpdates"));
        let res = self
            .client
            .get(self.method_url("getUpdates"))
            .send()
            .map_err(strip_url)?;
        let envelope: Envelope<Vec<Update>> = decode_envelope(res)?;
        Ok(envelope.result)
    }

    /// Send a plain text message. Both parameters travel URL-encoded in the
    /// query string.
    pub fn send_text(&self, chat_id: &str, text: &str) -> Result<()> {
        require(chat_id, "chat id")?;
        require(text, "text")?;

        debug!("GET {}", self.redacted_url("sendMessage"));
        let res = self
            .client
            .get(self.method_url("sendMessage"))
            .query(&[("chat_id", chat_id), ("text", text)])
            .send()
            .map_err(strip_url)?;
        let _: Envelope<Message> = decode_envelope(res)?;
        Ok(())
    }

    /// Upload a photo with an optional (possibly empty) caption.
    pub fn send_photo(&self, chat_id: &str, path: &Path, caption: &str) -> Result<()> {
        self.send_media(MediaKind::Photo, chat_id, path, caption)
    }

    /// Upload a video with an optional (possibly empty) caption.
    pub fn send_video(&self, chat_id: &str, path: &Path, caption: &str) -> Result<()> {
        self.send_media(MediaKind::Video, chat_id, path, caption)
    }

    fn send_media(&self, kind: MediaKind, chat_id: &str, path: &Path, caption: &str) -> Result<()> {
        require(chat_id, "chat id")?;

        // The file is opened before anything touches the network.
        let part = multipart::Part::file(path).map_err(|source| Error::File {
            path: path.to_path_buf(),
            source,
        })?;
        // Parts go out in this order: file, chat_id, caption.
        let form = multipart::Form::new()
            .part(kind.field(), part)
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string());

        debug!("POST {} ({})", self.redacted_url(kind.method()), path.display());
        let res = self
            .client
            .post(self.method_url(kind.method()))
            .multipart(form)
            .send()
            .map_err(strip_url)?;
        let _: Envelope<Message> = decode_envelope(res)?;
        Ok(())
    }
}

fn require(value: &str, name: &'static str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::MissingField(name));
    }
    Ok(())
}

/// reqwest errors carry the request URL, which embeds the bot token.
fn strip_url(err: reqwest::Error) -> Error {
    Error::Http(err.without_url())
}

/// Decode a response envelope.
///
/// A body that is not valid JSON is logged and, for a 2xx status, replaced
/// by an empty envelope so the send still counts as done. A decoded
/// envelope with `ok: false` is always an error.
fn decode_envelope<T>(res: Response) -> Result<Envelope<T>>
where
    T: DeserializeOwned + Default,
{
    let status = res.status();
    let body = res.text().map_err(strip_url)?;

    match serde_json::from_str::<Envelope<T>>(&body) {
        Ok(envelope) if envelope.ok => Ok(envelope),
        Ok(envelope) => Err(Error::Api {
            code: envelope.error_code.unwrap_or(i64::from(status.as_u16())),
            description: envelope.description.unwrap_or_default(),
        }),
        Err(e) => {
            warn!("could not decode response ({}): {}", status, e);
            if status.is_success() {
                Ok(Envelope::default())
            } else {
                Err(Error::Status { status, body })
            }
        }
    }
}
