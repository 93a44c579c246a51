// A LedgerNode is one running participant: its ledger, the peers it knows,
// the miner that extends the ledger and the resolver that reconciles it with
// everyone else. Everything is wired here once and shared behind Arcs with
// the HTTP handlers.

use crate::config::Config;
use crate::consensus::ConsensusResolver;
use crate::core::{Block, ChainValidator, Ledger, Miner, Transaction, TransactionSignature};
use crate::error::Result;
use crate::network::{
    routes, serve, AddOutcome, Gossip, HttpTransport, PeerAddress, PeerDirectory, PeerRequest,
    PeerTransport, SubmitTransaction,
};
use crate::storage::Stores;
use log::{debug, info, warn};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

pub struct LedgerNode {
    config: Config,
    address: PeerAddress,
    ledger: Arc<Ledger>,
    directory: Arc<PeerDirectory>,
    gossip: Arc<Gossip>,
    resolver: ConsensusResolver,
    miner: Miner,
}

impl LedgerNode {
    /// Node backed by its sled database and talking HTTP to peers
    pub fn open(config: Config) -> Result<LedgerNode> {
        let path = config.node_db_path();
        info!("Opening node database at {}", path.display());
        let stores = Stores::open(&path)?;
        let transport = Arc::new(HttpTransport::new(config.peer_timeout())?);
        Self::with_parts(config, stores, transport)
    }

    pub fn with_parts(
        config: Config,
        stores: Stores,
        transport: Arc<dyn PeerTransport>,
    ) -> Result<LedgerNode> {
        config.validate()?;
        let address = PeerAddress::parse(&config.node_addr)?;
        let validator = ChainValidator::with_ecdsa(config.difficulty()?);

        let ledger = Arc::new(Ledger::open(stores.ledger)?);
        let directory = Arc::new(PeerDirectory::open(stores.peers)?);
        let gossip = Arc::new(Gossip::new(
            Arc::clone(&directory),
            transport,
            address.clone(),
            config.peer_timeout(),
        ));
        let resolver = ConsensusResolver::new(
            Arc::clone(&gossip),
            validator.clone(),
            Arc::clone(&ledger),
            stores.consensus,
        );
        let miner = Miner::new(Arc::clone(&ledger), validator, config.max_mining_attempts);

        Ok(LedgerNode {
            config,
            address,
            ledger,
            directory,
            gossip,
            resolver,
            miner,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn address(&self) -> &PeerAddress {
        &self.address
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn directory(&self) -> &Arc<PeerDirectory> {
        &self.directory
    }

    pub fn gossip(&self) -> &Arc<Gossip> {
        &self.gossip
    }

    pub fn resolver(&self) -> &ConsensusResolver {
        &self.resolver
    }

    pub async fn submit_transaction(
        &self,
        transaction: Transaction,
        signature: Option<TransactionSignature>,
    ) -> Result<Block> {
        self.miner.mine_transaction(transaction, signature).await
    }

    /// Entry point for `POST /transactions`
    pub async fn submit(&self, request: SubmitTransaction) -> Result<Block> {
        let next_id = self.ledger.last_block()?.get_id() + 1;
        let (transaction, signature) = request.into_parts(next_id)?;
        self.submit_transaction(transaction, signature).await
    }

    /// Add `address` as a peer. When it is new it is announced to the other
    /// peers, and told about this node so it can start gossiping back.
    pub async fn join_network(&self, address: &str) -> Result<AddOutcome> {
        let peer = PeerAddress::parse(address)?;
        if peer == self.address {
            return Ok(AddOutcome::AlreadyKnown);
        }

        let outcome = self.directory.add_peer(&peer)?;
        if outcome == AddOutcome::Added {
            self.gossip.announce_peer(&peer).await?;
            let introduce =
                PeerRequest::post(routes::ADD_NODE, json!({ "nodeAddress": self.address }));
            if self.gossip.fan_out(&[peer.clone()], &introduce).await.is_empty() {
                warn!("{peer} did not acknowledge this node");
            }
        }
        Ok(outcome)
    }

    /// Join every configured bootstrap peer, then ask the network for more
    pub async fn bootstrap(&self) {
        for address in &self.config.bootstrap_peers {
            match self.join_network(address).await {
                Ok(outcome) => debug!("Bootstrap peer {address}: {outcome:?}"),
                Err(e) => warn!("Skipping bootstrap peer {address}: {e}"),
            }
        }
        if let Err(e) = self.gossip.discover_peers().await {
            warn!("Peer discovery failed: {e}");
        }
    }

    /// One background round: learn new peers, then synchronize
    pub async fn sync_round(&self) {
        match self.gossip.discover_peers().await {
            Ok(learned) if !learned.is_empty() => info!("Discovered {} new peers", learned.len()),
            Ok(_) => {}
            Err(e) => warn!("Peer discovery failed: {e}"),
        }

        match self.directory.is_empty() {
            Ok(true) => {
                debug!("No peers known, skipping synchronization");
                return;
            }
            Ok(false) => {}
            Err(e) => {
                warn!("Failed to read peer directory: {e}");
                return;
            }
        }

        match self.resolver.synchronize().await {
            Ok(true) => info!("Ledger replaced by consensus chain"),
            Ok(false) => debug!("Ledger already agrees with consensus"),
            Err(e) => warn!("Synchronization failed: {e}"),
        }
    }

    async fn background_rounds(self: Arc<Self>, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            self.sync_round().await;
        }
    }

    /// Serve on `listener` and run periodic rounds until `shutdown` resolves
    pub async fn run_until<F>(self: Arc<Self>, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.bootstrap().await;

        let background = self
            .config
            .consensus_interval()
            .map(|every| tokio::spawn(Arc::clone(&self).background_rounds(every)));

        let result = serve(listener, Arc::clone(&self), shutdown).await;

        if let Some(handle) = background {
            handle.abort();
        }
        result
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let listener = TcpListener::bind(&self.config.node_addr).await?;
        self.run_until(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {e}");
            }
            info!("Shutting down");
        })
        .await
    }
}
