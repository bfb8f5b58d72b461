// Entrypoint for the CLI application.
// - Keeps `main` small: parse flags, validate them, hand off to `ui::run`.
// - Invalid flags print a message and exit normally; only a watcher that
//   cannot start makes the process fail.

use telegram_notify::config::{Cli, Settings};
use telegram_notify::ui;

fn main() -> anyhow::Result<()> {
    // `RUST_LOG` overrides the default `info` level.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = match Settings::from_cli(Cli::parse_args()) {
        Ok(settings) => settings,
        Err(e) => {
            println!("{}", e);
            return Ok(());
        }
    };

    ui::run(settings)
}
