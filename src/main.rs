// This is my entry point for the ledger node binary. Every command loads the
// same configuration, so a node started with --config and a printchain run
// with the same file look at the same database.
use clap::Parser;
use ledger_node::{
    utils::{new_key_pair, EcdsaSigner, Signer},
    Command, Config, LedgerNode, Opt, Transaction,
};
use log::{error, LevelFilter};
use std::fs;
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Info by default, RUST_LOG still wins
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt).await {
        error!("Error: {e}");
        process::exit(1);
    }
}

async fn run_command(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(opt.config.as_deref())?;

    match opt.command {
        Command::StartNode => {
            let node = Arc::new(LedgerNode::open(config)?);
            node.run().await?;
        }
        Command::Printchain => {
            let node = LedgerNode::open(config)?;
            for block in node.ledger().blocks()? {
                println!("{}", serde_json::to_string_pretty(&block)?);
            }
        }
        // I mine locally here; a running node takes transactions over POST /transactions
        Command::Send {
            sender,
            receiver,
            amount,
            key,
        } => {
            if amount == 0 {
                return Err("Amount must be positive".into());
            }
            let transaction = Transaction::transfer(&sender, &receiver, amount);
            let signature = match key {
                Some(path) => {
                    let signer = EcdsaSigner::from_pkcs8(&fs::read(&path)?)?;
                    Some(transaction.sign(&signer)?)
                }
                None => None,
            };

            let node = LedgerNode::open(config)?;
            let block = node.submit_transaction(transaction, signature).await?;
            println!("Mined block {} ({})", block.get_id(), block.get_hash());
        }
        Command::Genkey { out } => {
            let pkcs8 = new_key_pair()?;
            let signer = EcdsaSigner::from_pkcs8(&pkcs8)?;
            fs::write(&out, &pkcs8)?;
            println!("Wrote key to {}", out.display());
            println!("Public key: {}", signer.public_key());
        }
        Command::Addpeer { address } => {
            let node = LedgerNode::open(config)?;
            let outcome = node.directory().add(&address)?;
            println!("{address}: {outcome:?}");
        }
        Command::Removepeer { address } => {
            let node = LedgerNode::open(config)?;
            if node.directory().remove(&address)? {
                println!("Removed {address}");
            } else {
                println!("{address} was not a known peer");
            }
        }
        Command::Listpeers => {
            let node = LedgerNode::open(config)?;
            for peer in node.directory().list()? {
                println!("{peer}");
            }
        }
        Command::Synchronize => {
            let node = LedgerNode::open(config)?;
            let replaced = node.resolver().synchronize().await?;
            let len = node.ledger().len()?;
            if replaced {
                println!("Adopted consensus chain of {len} blocks");
            } else {
                println!("Local ledger of {len} blocks kept");
            }
        }
    }
    Ok(())
}
