use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

/// Echo RPC over an identity-authenticated overlay network
#[derive(Debug, Parser)]
#[command(name = "meshecho", version)]
pub struct Cli {
    /// Identity file (default is $HOME/.meshecho/identities/.identity.json)
    #[arg(long, global = true, visible_alias = "cIdentity")]
    pub config: Option<PathBuf>,

    /// Service to dial, or to host when no --hostedServices are given
    #[arg(long, global = true)]
    pub service: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send one greeting to a service and print the reply
    Client {
        /// Greeting to send
        #[arg(long = "clientEchoString", default_value = "world")]
        echo_string: String,

        /// Only reach the service hosted by this identity
        #[arg(long = "sIdentity")]
        server_identity: Option<String>,
    },

    /// Host one or more echo services until terminated
    Server {
        /// Service to host, as JSON: {"Name": "greeter", "AddressByIdentity": true}
        #[arg(long = "hostedServices")]
        hosted_services: Vec<String>,

        /// Make the --service listener addressable by identity
        #[arg(long = "addressByIdentity")]
        address_by_identity: bool,
    },

    /// Create an identity file and enroll it in a service directory
    Enroll {
        /// Display name of the new identity
        #[arg(long)]
        name: String,

        /// Shared service directory
        #[arg(long)]
        directory: PathBuf,

        /// Address QUIC endpoints bind on
        #[arg(long, default_value = "127.0.0.1")]
        bind_host: IpAddr,

        /// Where to write the identity file (default: --config or the default path)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}
