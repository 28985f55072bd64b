use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about = "Operator tools for the Infortisa fulfillment gateway")]
pub struct Arguments {
    /// Print results as JSON instead of tables
    #[arg(short, long, global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the Infortisa status of an order and show how it would be reconciled
    Status {
        /// The CustomerReference the order was sent with
        #[arg(required = true, index = 1)]
        reference: String,
        /// Also print the raw response body
        #[arg(short, long)]
        raw: bool,
    },
    /// Parse a saved Infortisa status response without contacting Infortisa
    Parse {
        #[arg(required = true, index = 1)]
        file: PathBuf,
    },
    /// Ask Infortisa to hold the order
    Block {
        #[arg(required = true, index = 1)]
        reference: String,
    },
    /// Release a held order
    Unblock {
        #[arg(required = true, index = 1)]
        reference: String,
    },
    /// Cancel the order at Infortisa. This cannot be undone.
    Cancel {
        #[arg(required = true, index = 1)]
        reference: String,
    },
}
