use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ledger-node")]
pub struct Opt {
    #[arg(
        long = "config",
        global = true,
        help = "TOML configuration file (environment variables still override it)"
    )]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "startnode", about = "Start a ledger node")]
    StartNode,
    #[command(name = "printchain", about = "Print all blocks in the local ledger")]
    Printchain,
    #[command(name = "send", about = "Mine a transfer into the local ledger")]
    Send {
        #[arg(help = "Sending party")]
        sender: String,
        #[arg(help = "Receiving party")]
        receiver: String,
        #[arg(help = "Amount to transfer")]
        amount: u64,
        #[arg(long = "key", help = "PKCS#8 key file to sign the transfer with")]
        key: Option<PathBuf>,
    },
    #[command(name = "genkey", about = "Generate an ECDSA P-256 signing key")]
    Genkey {
        #[arg(help = "Where to write the PKCS#8 key")]
        out: PathBuf,
    },
    #[command(name = "addpeer", about = "Add a peer address to the directory")]
    Addpeer {
        #[arg(help = "Peer address, host:port")]
        address: String,
    },
    #[command(name = "removepeer", about = "Remove a peer address from the directory")]
    Removepeer {
        #[arg(help = "Peer address, host:port")]
        address: String,
    },
    #[command(name = "listpeers", about = "Print known peers")]
    Listpeers,
    #[command(
        name = "synchronize",
        about = "Run one consensus round and adopt the agreed chain"
    )]
    Synchronize,
}
