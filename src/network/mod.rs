//! Peer-to-peer networking
//!
//! Nodes talk plain HTTP/JSON. This module owns peer addresses, the
//! persisted peer directory, the transport seam, the gossip fan-out and the
//! axum router that answers both peers and external callers.

pub mod address;
pub mod gossip;
pub mod peer_directory;
pub mod server;
pub mod transport;

pub use address::PeerAddress;
pub use gossip::Gossip;
pub use peer_directory::{AddOutcome, PeerDirectory};
pub use server::{router, serve, SubmitTransaction};
pub use transport::{HttpTransport, Method, PeerRequest, PeerTransport};

/// HTTP routes shared by the server and the gossip client
pub mod routes {
    pub const LEDGER: &str = "/ledger";
    pub const ADD_NODE: &str = "/add_node";
    pub const NODES: &str = "/nodes";
    pub const FORM_CONSENSUS: &str = "/form_consensus";
    pub const SYNCHRONIZE: &str = "/synchronize";
    pub const CONSENSUS: &str = "/consensus";
    pub const WALLET_AMOUNT: &str = "/wallet_amount/:user";
    pub const JOIN_NETWORK: &str = "/join_network";
    pub const TRANSACTIONS: &str = "/transactions";
}
