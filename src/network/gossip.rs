use crate::error::Result;
use crate::network::{routes, AddOutcome, PeerAddress, PeerDirectory, PeerRequest, PeerTransport};
use futures::future::join_all;
use log::{debug, info, warn};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Fans requests out to every known peer and gathers whatever comes back.
///
/// A peer that times out, refuses, or answers garbage is logged and left out
/// of the result; it never fails the round.
pub struct Gossip {
    directory: Arc<PeerDirectory>,
    transport: Arc<dyn PeerTransport>,
    self_addr: PeerAddress,
    peer_timeout: Duration,
}

impl Gossip {
    pub fn new(
        directory: Arc<PeerDirectory>,
        transport: Arc<dyn PeerTransport>,
        self_addr: PeerAddress,
        peer_timeout: Duration,
    ) -> Gossip {
        Gossip {
            directory,
            transport,
            self_addr,
            peer_timeout,
        }
    }

    pub fn directory(&self) -> &Arc<PeerDirectory> {
        &self.directory
    }

    pub fn self_addr(&self) -> &PeerAddress {
        &self.self_addr
    }

    /// Send `request` to every peer in the refreshed directory, concurrently
    pub async fn broadcast(&self, request: &PeerRequest) -> Result<BTreeMap<PeerAddress, Value>> {
        self.directory.refresh()?;
        let peers: Vec<PeerAddress> = self
            .directory
            .list()?
            .into_iter()
            .filter(|peer| *peer != self.self_addr)
            .collect();
        Ok(self.fan_out(&peers, request).await)
    }

    /// Send `request` to `peers`; completes when every call answered or failed
    pub async fn fan_out(
        &self,
        peers: &[PeerAddress],
        request: &PeerRequest,
    ) -> BTreeMap<PeerAddress, Value> {
        debug!("Sending {} to {} peers", request.route, peers.len());
        let calls = peers.iter().map(|peer| async move {
            let outcome =
                tokio::time::timeout(self.peer_timeout, self.transport.send(peer, request)).await;
            (peer, outcome)
        });

        let mut responses = BTreeMap::new();
        for (peer, outcome) in join_all(calls).await {
            match outcome {
                Ok(Ok(body)) => {
                    responses.insert(peer.clone(), body);
                }
                Ok(Err(e)) => warn!("{} to {peer} failed: {e}", request.route),
                Err(_) => warn!(
                    "{} to {peer} timed out after {:?}",
                    request.route, self.peer_timeout
                ),
            }
        }
        responses
    }

    /// Tell every other known peer about `new_peer`. Each peer that did not
    /// know it relays it on, so the address spreads through the network.
    pub async fn announce_peer(&self, new_peer: &PeerAddress) -> Result<usize> {
        self.directory.refresh()?;
        let targets: Vec<PeerAddress> = self
            .directory
            .list()?
            .into_iter()
            .filter(|peer| peer != new_peer && *peer != self.self_addr)
            .collect();
        if targets.is_empty() {
            return Ok(0);
        }

        let request = PeerRequest::post(routes::ADD_NODE, json!({ "nodeAddress": new_peer }));
        let acked = self.fan_out(&targets, &request).await.len();
        info!("Announced {new_peer} to {acked}/{} peers", targets.len());
        Ok(acked)
    }

    /// Ask every peer for its peer list and adopt the addresses not seen yet.
    /// Returns the newly learned peers, each of which is announced onward.
    pub async fn discover_peers(&self) -> Result<Vec<PeerAddress>> {
        let responses = self.broadcast(&PeerRequest::get(routes::NODES)).await?;

        let mut learned = Vec::new();
        for (source, body) in responses {
            let Ok(addresses) = serde_json::from_value::<Vec<String>>(body) else {
                warn!("{source} answered {} with a malformed peer list", routes::NODES);
                continue;
            };
            for address in addresses {
                let peer = match PeerAddress::parse(&address) {
                    Ok(peer) => peer,
                    Err(e) => {
                        debug!("Ignoring peer from {source}: {e}");
                        continue;
                    }
                };
                if peer == self.self_addr {
                    continue;
                }
                if self.directory.add_peer(&peer)? == AddOutcome::Added {
                    learned.push(peer);
                }
            }
        }

        for peer in &learned {
            self.announce_peer(peer).await?;
        }
        Ok(learned)
    }
}
