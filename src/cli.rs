use clap::{Parser, Subcommand};

/// Framecast - personal media transcoding and streaming server.
#[derive(Parser)]
#[command(name = "framecast")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the server (default).
    Serve,

    /// Validate configuration and exit without binding a socket.
    CheckConfig,
}
