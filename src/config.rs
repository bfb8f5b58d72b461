// Command line definition and its resolution into validated settings.
// Flags keep the camelCase spellings existing scripts use as aliases, in
// both the `--botToken` and the single-dash `-botToken` form.

use clap::Parser;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Name of the file under the home directory that may hold the bot token.
pub const TOKEN_FILE: &str = ".telegram_notify_token";

#[derive(Parser, Debug, Default)]
#[command(name = "telegram-notify", version)]
#[command(about = "Relay texts, photos, videos and motion snapshots to a Telegram chat")]
pub struct Cli {
    /// One of getChatID, sendText, sendPhoto, sendVideo or watcher
    #[arg(long)]
    pub mode: Option<String>,

    /// Telegram bot API token
    #[arg(
        long = "bot-token",
        visible_alias = "botToken",
        env = "TELEGRAM_BOT_TOKEN",
        hide_env_values = true
    )]
    pub bot_token: Option<String>,

    /// Id of the chat messages are sent to
    #[arg(
        long = "chat-id",
        visible_alias = "chatID",
        env = "TELEGRAM_CHAT_ID",
        allow_hyphen_values = true
    )]
    pub chat_id: Option<String>,

    /// File to upload; for watcher mode, the directory to watch
    #[arg(long = "file-path", visible_alias = "filePath")]
    pub file_path: Option<PathBuf>,

    /// Message text, or caption for photos and videos
    #[arg(long, allow_hyphen_values = true)]
    pub text: Option<String>,
}

/// Long flags that may also be written with a single dash, the way the
/// `flag` style of command line spells them. All but `help` take a value.
const SINGLE_DASH_FLAGS: &[&str] = &[
    "mode",
    "botToken",
    "bot-token",
    "chatID",
    "chat-id",
    "filePath",
    "file-path",
    "text",
    "help",
];

impl Cli {
    /// Parse the process arguments, accepting `-mode` as well as `--mode`.
    pub fn parse_args() -> Self {
        Cli::parse_from(normalize_args(std::env::args_os()))
    }
}

/// Rewrite `-name` and `-name=value` into their `--` form for the flags in
/// `SINGLE_DASH_FLAGS`. Values following a flag are left alone, as is
/// everything after `--`.
pub fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut out = Vec::new();
    let mut expect_value = false;
    let mut passthrough = false;

    for (i, arg) in args.into_iter().enumerate() {
        if i == 0 || passthrough || expect_value {
            expect_value = false;
            out.push(arg);
            continue;
        }
        let Some(text) = arg.to_str() else {
            out.push(arg);
            continue;
        };
        if text == "--" {
            passthrough = true;
            out.push(arg);
            continue;
        }

        let long = text.strip_prefix("--");
        let single = text.strip_prefix('-').filter(|_| long.is_none());
        let (name, has_value) = match long.or(single) {
            Some(rest) => match rest.split_once('=') {
                Some((name, _)) => (name, true),
                None => (rest, false),
            },
            None => {
                out.push(arg);
                continue;
            }
        };
        if !SINGLE_DASH_FLAGS.contains(&name) {
            out.push(arg);
            continue;
        }

        expect_value = !has_value && name != "help";
        if single.is_some() {
            out.push(OsString::from(format!("-{}", text)));
        } else {
            out.push(arg);
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    GetChatId,
    SendText,
    SendPhoto,
    SendVideo,
    Watcher,
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "getChatID" => Ok(Mode::GetChatId),
            "sendText" => Ok(Mode::SendText),
            "sendPhoto" => Ok(Mode::SendPhoto),
            "sendVideo" => Ok(Mode::SendVideo),
            "watcher" => Ok(Mode::Watcher),
            other => Err(ConfigError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::GetChatId => "getChatID",
            Mode::SendText => "sendText",
            Mode::SendPhoto => "sendPhoto",
            Mode::SendVideo => "sendVideo",
            Mode::Watcher => "watcher",
        };
        f.write_str(name)
    }
}

/// Reasons the command line cannot be turned into `Settings`. The messages
/// are printed as-is to the user.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Must specify {0} flag!")]
    Missing(&'static str),

    #[error("invalid mode parameter. use -help to view available values.")]
    InvalidMode(String),
}

/// The operation to run together with the inputs it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    GetChatId,
    SendText {
        chat_id: String,
        text: String,
    },
    SendPhoto {
        chat_id: String,
        path: PathBuf,
        caption: String,
    },
    SendVideo {
        chat_id: String,
        path: PathBuf,
        caption: String,
    },
    Watch {
        chat_id: String,
        dir: PathBuf,
        caption: String,
    },
}

impl Command {
    pub fn mode(&self) -> Mode {
        match self {
            Command::GetChatId => Mode::GetChatId,
            Command::SendText { .. } => Mode::SendText,
            Command::SendPhoto { .. } => Mode::SendPhoto,
            Command::SendVideo { .. } => Mode::SendVideo,
            Command::Watch { .. } => Mode::Watcher,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bot_token: String,
    pub command: Command,
}

impl Settings {
    /// Validate the command line, falling back to the token file in the
    /// home directory when no token was given.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        Self::resolve(cli, load_token)
    }

    /// Same as `from_cli` with an explicit source for the fallback token.
    /// Empty flag values count as missing.
    pub fn resolve<F>(cli: Cli, stored_token: F) -> Result<Self, ConfigError>
    where
        F: FnOnce() -> Option<String>,
    {
        let mode = non_empty(cli.mode).ok_or(ConfigError::Missing("mode"))?;
        let bot_token = non_empty(cli.bot_token)
            .or_else(stored_token)
            .ok_or(ConfigError::Missing("botToken"))?;

        if mode == "getChatID" {
            return Ok(Settings {
                bot_token,
                command: Command::GetChatId,
            });
        }

        // Every other mode, known or not, needs a chat before the mode
        // name itself is checked.
        let chat_id = non_empty(cli.chat_id).ok_or(ConfigError::Missing("chatID"))?;
        let mode: Mode = mode.parse()?;
        let text = cli.text.unwrap_or_default();

        let command = match mode {
            Mode::SendText => {
                if text.is_empty() {
                    return Err(ConfigError::Missing("text"));
                }
                Command::SendText { chat_id, text }
            }
            Mode::SendPhoto => Command::SendPhoto {
                chat_id,
                path: required_path(cli.file_path)?,
                caption: text,
            },
            Mode::SendVideo => Command::SendVideo {
                chat_id,
                path: required_path(cli.file_path)?,
                caption: text,
            },
            Mode::Watcher => Command::Watch {
                chat_id,
                dir: required_path(cli.file_path)?,
                caption: text,
            },
            Mode::GetChatId => Command::GetChatId,
        };

        Ok(Settings { bot_token, command })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn required_path(path: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    path.filter(|p| !p.as_os_str().is_empty())
        .ok_or(ConfigError::Missing("filePath"))
}

/// Load the token from the user's home directory file.
fn load_token() -> Option<String> {
    let path = dirs::home_dir()?.join(TOKEN_FILE);
    let data = std::fs::read_to_string(path).ok()?;
    let token = data.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(mode: &str) -> Cli {
        Cli {
            mode: Some(mode.into()),
            bot_token: Some("T".into()),
            chat_id: Some("123".into()),
            ..Default::default()
        }
    }

    fn no_stored_token() -> Option<String> {
        None
    }

    #[test]
    fn missing_mode_is_reported_first() {
        let err = Settings::resolve(Cli::default(), no_stored_token).unwrap_err();
        assert_eq!(err, ConfigError::Missing("mode"));
        assert_eq!(err.to_string(), "Must specify mode flag!");
    }

    #[test]
    fn missing_token_is_reported() {
        let mut args = cli("sendText");
        args.bot_token = Some(String::new());
        let err = Settings::resolve(args, no_stored_token).unwrap_err();
        assert_eq!(err.to_string(), "Must specify botToken flag!");
    }

    #[test]
    fn stored_token_fills_in() {
        let mut args = cli("getChatID");
        args.bot_token = None;
        let settings = Settings::resolve(args, || Some("from-file".into())).unwrap();
        assert_eq!(settings.bot_token, "from-file");
        assert_eq!(settings.command, Command::GetChatId);
    }

    #[test]
    fn flag_token_wins_over_stored_token() {
        let settings = Settings::resolve(cli("getChatID"), || Some("from-file".into())).unwrap();
        assert_eq!(settings.bot_token, "T");
    }

    #[test]
    fn get_chat_id_needs_no_chat() {
        let mut args = cli("getChatID");
        args.chat_id = None;
        let settings = Settings::resolve(args, no_stored_token).unwrap();
        assert_eq!(settings.command.mode(), Mode::GetChatId);
    }

    #[test]
    fn send_modes_need_a_chat() {
        let mut args = cli("sendPhoto");
        args.chat_id = None;
        let err = Settings::resolve(args, no_stored_token).unwrap_err();
        assert_eq!(err.to_string(), "Must specify chatID flag!");
    }

    #[test]
    fn send_text_needs_text() {
        let err = Settings::resolve(cli("sendText"), no_stored_token).unwrap_err();
        assert_eq!(err, ConfigError::Missing("text"));

        let mut args = cli("sendText");
        args.text = Some("hello".into());
        let settings = Settings::resolve(args, no_stored_token).unwrap();
        assert_eq!(
            settings.command,
            Command::SendText {
                chat_id: "123".into(),
                text: "hello".into()
            }
        );
    }

    #[test]
    fn media_and_watcher_need_a_path() {
        for mode in ["sendPhoto", "sendVideo", "watcher"] {
            let err = Settings::resolve(cli(mode), no_stored_token).unwrap_err();
            assert_eq!(err.to_string(), "Must specify filePath flag!", "{}", mode);
        }
    }

    #[test]
    fn caption_defaults_to_empty() {
        let mut args = cli("watcher");
        args.file_path = Some("/var/lib/motion".into());
        let settings = Settings::resolve(args, no_stored_token).unwrap();
        assert_eq!(
            settings.command,
            Command::Watch {
                chat_id: "123".into(),
                dir: "/var/lib/motion".into(),
                caption: String::new(),
            }
        );
    }

    #[test]
    fn unknown_mode_without_chat_asks_for_chat() {
        let mut args = cli("bogus");
        args.chat_id = None;
        let err = Settings::resolve(args, no_stored_token).unwrap_err();
        assert_eq!(err, ConfigError::Missing("chatID"));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = Settings::resolve(cli("sendAudio"), no_stored_token).unwrap_err();
        assert_eq!(err, ConfigError::InvalidMode("sendAudio".into()));
        assert_eq!(
            err.to_string(),
            "invalid mode parameter. use -help to view available values."
        );
    }

    #[test]
    fn mode_names_round_trip() {
        for name in ["getChatID", "sendText", "sendPhoto", "sendVideo", "watcher"] {
            let mode: Mode = name.parse().unwrap();
            assert_eq!(mode.to_string(), name);
        }
    }

    #[test]
    fn camel_case_aliases_parse() {
        let args = Cli::try_parse_from([
            "telegram-notify",
            "--mode",
            "sendPhoto",
            "--botToken",
            "T",
            "--chatID",
            "-100123",
            "--filePath",
            "/tmp/snap.jpg",
            "--text",
            "porch",
        ])
        .unwrap();
        let settings = Settings::resolve(args, no_stored_token).unwrap();
        assert_eq!(
            settings.command,
            Command::SendPhoto {
                chat_id: "-100123".into(),
                path: "/tmp/snap.jpg".into(),
                caption: "porch".into(),
            }
        );
    }

    #[test]
    fn clap_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    fn os_args(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn single_dash_flags_parse() {
        let args = normalize_args(os_args(&[
            "telegram-notify",
            "-mode",
            "sendText",
            "-botToken",
            "T",
            "-chatID",
            "123",
            "-text",
            "hi",
        ]));
        let settings = Settings::resolve(Cli::try_parse_from(args).unwrap(), no_stored_token)
            .unwrap();
        assert_eq!(settings.bot_token, "T");
        assert_eq!(
            settings.command,
            Command::SendText {
                chat_id: "123".into(),
                text: "hi".into()
            }
        );
    }

    #[test]
    fn single_dash_with_equals_and_values_that_look_like_flags() {
        let args = normalize_args(os_args(&[
            "telegram-notify",
            "-mode=watcher",
            "-chatID",
            "-100123",
            "-filePath",
            "/var/lib/motion",
            "-text",
            "-mode",
            "--bot-token",
            "T",
        ]));
        assert_eq!(
            args,
            os_args(&[
                "telegram-notify",
                "--mode=watcher",
                "--chatID",
                "-100123",
                "--filePath",
                "/var/lib/motion",
                "--text",
                "-mode",
                "--bot-token",
                "T",
            ])
        );
        let settings = Settings::resolve(Cli::try_parse_from(args).unwrap(), no_stored_token)
            .unwrap();
        assert_eq!(
            settings.command,
            Command::Watch {
                chat_id: "-100123".into(),
                dir: "/var/lib/motion".into(),
                caption: "-mode".into(),
            }
        );
    }

    #[test]
    fn unknown_single_dash_args_are_untouched() {
        let args = os_args(&["telegram-notify", "-V", "-x", "--", "-mode"]);
        assert_eq!(normalize_args(args.clone()), args);
    }
}
