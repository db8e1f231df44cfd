//! netmon - network health daemon and CLI client

use clap::Parser;
use netmon::{app::App, cli::Cli, error::AppError};
use std::{error::Error, process};

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("netmon panic: {}", panic_info);
    }));

    let cli = Cli::parse();
    let use_color = cli.use_colors();

    let result = match App::new(cli) {
        Ok(app) => app.run().await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        print_error(&e, use_color);
        process::exit(e.exit_code());
    }
}

fn print_error(error: &AppError, use_color: bool) {
    eprintln!("Error: {}", error.format_for_console(use_color));

    if let Some(source) = error.source() {
        eprintln!("Caused by: {}", source);
    }

    if let Some((_, suggestion)) = error.user_friendly_message().split_once("\n\n") {
        eprintln!();
        eprintln!("{}", suggestion);
    }
}
