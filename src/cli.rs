//! Command line interface

use clap::Parser;

/// Streams Kubernetes resource changes to WebSocket clients
#[derive(Debug, Parser)]
#[command(name = "kubecast", version, about)]
pub struct Cli {
    /// Address to bind (overrides `server.host`)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides `server.port` and `PORT`)
    #[arg(short, long)]
    pub port: Option<u16>,
}
