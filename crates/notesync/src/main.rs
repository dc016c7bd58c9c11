//! `notesync` replays scripted editing sessions against the sync engine.

/// CLI module - argument parsing and command handlers
mod cli;

fn main() {
    cli::run_cli();
}
