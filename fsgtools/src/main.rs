use clap::Parser;
use log::*;

mod command_def;
mod command_handler;
mod formatting;

use command_def::Arguments;
use command_handler::handle_command;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();
    let cli = Arguments::parse();
    trace!("🪛️ Running {:?}", cli.command);
    if let Err(e) = handle_command(cli.command, cli.json).await {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}
