use crate::core::{Block, Transaction, TransactionSignature};
use crate::error::{LedgerError, Result};
use crate::network::{routes, AddOutcome, PeerAddress};
use crate::node::LedgerNode;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use data_encoding::HEXLOWER;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

type ApiError = (StatusCode, Json<Value>);
type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeAddressRequest {
    node_address: String,
}

#[derive(Debug, Serialize)]
struct WalletAmount {
    user: String,
    amount: i64,
}

/// Body of `POST /transactions`; the signature is hex encoded
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTransaction {
    pub transaction: Transaction,
    #[serde(default)]
    pub signer_public_key: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}

impl SubmitTransaction {
    pub fn unsigned(transaction: Transaction) -> SubmitTransaction {
        SubmitTransaction {
            transaction,
            signer_public_key: None,
            signature: None,
        }
    }

    pub fn signed(transaction: Transaction, signature: &TransactionSignature) -> SubmitTransaction {
        SubmitTransaction {
            transaction,
            signer_public_key: Some(signature.public_key.clone()),
            signature: Some(HEXLOWER.encode(&signature.signature)),
        }
    }

    /// Split into the transaction and its signature. `next_id` is the id
    /// the block would get, reported when only half a signature was sent.
    pub fn into_parts(self, next_id: u64) -> Result<(Transaction, Option<TransactionSignature>)> {
        let signature = match (self.signer_public_key, self.signature) {
            (None, None) => None,
            (Some(public_key), Some(hex)) => {
                let signature = HEXLOWER
                    .decode(hex.to_ascii_lowercase().as_bytes())
                    .map_err(|_| LedgerError::InvalidSignature { id: next_id })?;
                Some(TransactionSignature {
                    public_key,
                    signature,
                })
            }
            _ => return Err(LedgerError::InvalidSignature { id: next_id }),
        };
        Ok((self.transaction, signature))
    }
}

/// Routes answered by every node
pub fn router(node: Arc<LedgerNode>) -> Router {
    Router::new()
        .route(routes::LEDGER, get(ledger))
        .route(routes::ADD_NODE, post(add_node))
        .route(routes::NODES, get(nodes))
        .route(routes::FORM_CONSENSUS, get(form_consensus))
        .route(routes::SYNCHRONIZE, get(synchronize))
        .route(routes::CONSENSUS, get(consensus))
        .route(routes::WALLET_AMOUNT, get(wallet_amount))
        .route(routes::JOIN_NETWORK, post(join_network))
        .route(routes::TRANSACTIONS, post(submit_transaction))
        .with_state(node)
}

/// Serve `node` on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, node: Arc<LedgerNode>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local = listener.local_addr()?;
    info!("Node {} serving on {local}", node.address());
    axum::serve(listener, router(node))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

fn to_http_error(err: LedgerError) -> ApiError {
    let status = match &err {
        e if e.is_validation() => StatusCode::UNPROCESSABLE_ENTITY,
        LedgerError::MalformedAddress(_) | LedgerError::Serialization(_) => StatusCode::BAD_REQUEST,
        LedgerError::ConsensusUnreachable => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Request failed: {err}");
    }
    (status, Json(json!({ "error": err.to_string() })))
}

async fn ledger(State(node): State<Arc<LedgerNode>>) -> ApiResult<Vec<Block>> {
    node.ledger().blocks().map(Json).map_err(to_http_error)
}

/// Always 200; the outcome is in the body. A newly learned peer is relayed
/// to the rest of the network.
async fn add_node(State(node): State<Arc<LedgerNode>>, body: Bytes) -> Json<Value> {
    let request = match serde_json::from_slice::<NodeAddressRequest>(&body) {
        Ok(request) => request,
        Err(e) => return Json(json!({ "error": format!("Malformed request: {e}") })),
    };

    let peer = match PeerAddress::parse(&request.node_address) {
        Ok(peer) => peer,
        Err(e) => return Json(json!({ "error": e.to_string() })),
    };
    if peer == *node.address() {
        return Json(json!({ "status": "already known" }));
    }

    match node.directory().add_peer(&peer) {
        Ok(AddOutcome::Added) => {
            let relay = Arc::clone(&node);
            tokio::spawn(async move {
                if let Err(e) = relay.gossip().announce_peer(&peer).await {
                    warn!("Failed to relay {peer}: {e}");
                }
            });
            Json(json!({ "status": "added" }))
        }
        Ok(AddOutcome::AlreadyKnown) => Json(json!({ "status": "already known" })),
        Err(e) => Json(json!({ "error": e.to_string() })),
    }
}

async fn nodes(State(node): State<Arc<LedgerNode>>) -> ApiResult<Vec<PeerAddress>> {
    node.directory().list().map(Json).map_err(to_http_error)
}

async fn form_consensus(State(node): State<Arc<LedgerNode>>) -> Json<Value> {
    tokio::spawn(async move {
        if let Err(e) = node.resolver().form_consensus().await {
            warn!("Consensus round failed: {e}");
        }
    });
    Json(json!({ "message": "forming consensus..." }))
}

async fn synchronize(State(node): State<Arc<LedgerNode>>) -> Json<Value> {
    tokio::spawn(async move {
        if let Err(e) = node.resolver().synchronize().await {
            warn!("Synchronization failed: {e}");
        }
    });
    Json(json!({ "message": "synchronizing..." }))
}

async fn consensus(State(node): State<Arc<LedgerNode>>) -> ApiResult<Value> {
    match node.resolver().last_consensus().map_err(to_http_error)? {
        Some(chain) => Ok(Json(json!(chain))),
        None => Ok(Json(json!({ "message": "no consensus" }))),
    }
}

async fn wallet_amount(
    State(node): State<Arc<LedgerNode>>,
    Path(user): Path<String>,
) -> ApiResult<Value> {
    let amount = node.resolver().wallet_amount(&user).map_err(to_http_error)?;
    Ok(Json(json!(WalletAmount { user, amount })))
}

async fn join_network(
    State(node): State<Arc<LedgerNode>>,
    Json(request): Json<NodeAddressRequest>,
) -> ApiResult<Value> {
    let outcome = node
        .join_network(&request.node_address)
        .await
        .map_err(to_http_error)?;
    let status = match outcome {
        AddOutcome::Added => "added",
        AddOutcome::AlreadyKnown => "already known",
    };
    Ok(Json(json!({ "status": status })))
}

async fn submit_transaction(
    State(node): State<Arc<LedgerNode>>,
    Json(request): Json<SubmitTransaction>,
) -> ApiResult<Block> {
    node.submit(request).await.map(Json).map_err(to_http_error)
}
