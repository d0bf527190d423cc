pub mod commands;
pub mod config;

pub use commands::{run_clear, run_ledger, run_poll, run_signal, run_sources, run_watch};
pub use config::{default_profile_dir, CliConfig};

/// Print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value, pretty: bool) {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match rendered {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error: failed to render output: {}", e),
    }
}
