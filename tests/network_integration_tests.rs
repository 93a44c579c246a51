//! Multi-node integration tests
//!
//! Real nodes on loopback ports, each with its own sled database, talking
//! to each other over HTTP exactly as they would in production.

use ledger_node::core::Transaction;
use ledger_node::network::{routes, PeerAddress, PeerRequest, SubmitTransaction};
use ledger_node::utils::EcdsaSigner;
use ledger_node::{Block, Config, LedgerNode};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct RunningNode {
    node: Arc<LedgerNode>,
    url: String,
    stop: Option<oneshot::Sender<()>>,
}

impl RunningNode {
    async fn start(data_dir: &Path) -> RunningNode {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let local = listener.local_addr().unwrap();

        let config = Config {
            node_addr: local.to_string(),
            data_dir: data_dir.to_path_buf(),
            difficulty: "00".to_string(),
            peer_timeout_ms: 1000,
            consensus_interval_secs: 0,
            ..Config::default()
        };
        let node = Arc::new(LedgerNode::open(config).unwrap());

        let (stop, stopped) = oneshot::channel::<()>();
        tokio::spawn(Arc::clone(&node).run_until(listener, async move {
            let _ = stopped.await;
        }));

        RunningNode {
            node,
            url: format!("http://{local}"),
            stop: Some(stop),
        }
    }

    fn address(&self) -> String {
        self.node.address().to_string()
    }
}

impl Drop for RunningNode {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

async fn get(client: &reqwest::Client, url: String) -> (u16, Value) {
    let response = client.get(url).send().await.unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

async fn post(client: &reqwest::Client, url: String, body: Value) -> (u16, Value) {
    let response = client.post(url).json(&body).send().await.unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

async fn wait_for_ledger_len(
    client: &reqwest::Client,
    node: &RunningNode,
    len: usize,
) -> Vec<Block> {
    for _ in 0..50 {
        let (_, body) = get(client, format!("{}{}", node.url, routes::LEDGER)).await;
        let chain: Vec<Block> = serde_json::from_value(body).unwrap();
        if chain.len() == len {
            return chain;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("ledger of {} never reached {len} blocks", node.url);
}

fn dir() -> TempDir {
    tempdir().unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_nodes_reach_the_same_ledger() {
    let (dir_a, dir_b) = (dir(), dir());
    let a = RunningNode::start(dir_a.path()).await;
    let b = RunningNode::start(dir_b.path()).await;
    let client = reqwest::Client::new();

    // A mines a signed transfer
    let signer = EcdsaSigner::generate().unwrap();
    let tx = Transaction::transfer("alice", "bob", 40);
    let request = SubmitTransaction::signed(tx.clone(), &tx.sign(&signer).unwrap());
    let (status, body) = post(
        &client,
        format!("{}{}", a.url, routes::TRANSACTIONS),
        serde_json::to_value(&request).unwrap(),
    )
    .await;
    assert_eq!(status, 200);
    let mined: Block = serde_json::from_value(body).unwrap();
    assert_eq!(mined.get_id(), 1);

    // B joins through A; A learns about B in return
    let (status, body) = post(
        &client,
        format!("{}{}", b.url, routes::JOIN_NETWORK),
        json!({ "nodeAddress": a.address() }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "status": "added" }));
    let (_, nodes) = get(&client, format!("{}{}", a.url, routes::NODES)).await;
    assert_eq!(nodes, json!([b.address()]));

    // B has no consensus yet, then synchronizes onto A's ledger
    let (_, body) = get(&client, format!("{}{}", b.url, routes::CONSENSUS)).await;
    assert_eq!(body, json!({ "message": "no consensus" }));

    let (status, _) = get(&client, format!("{}{}", b.url, routes::SYNCHRONIZE)).await;
    assert_eq!(status, 200);
    let chain = wait_for_ledger_len(&client, &b, 2).await;
    assert_eq!(chain[1], mined);

    let (_, body) = get(&client, format!("{}{}", b.url, routes::CONSENSUS)).await;
    let agreed: Vec<Block> = serde_json::from_value(body).unwrap();
    assert_eq!(agreed, chain);

    let (_, body) = get(&client, format!("{}/wallet_amount/bob", b.url)).await;
    assert_eq!(body, json!({ "user": "bob", "amount": 40 }));
    let (_, body) = get(&client, format!("{}/wallet_amount/alice", b.url)).await;
    assert_eq!(body, json!({ "user": "alice", "amount": -40 }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_bad_requests_are_answered() {
    let data = dir();
    let a = RunningNode::start(data.path()).await;
    let client = reqwest::Client::new();

    // /add_node always answers 200
    let (status, body) = post(
        &client,
        format!("{}{}", a.url, routes::ADD_NODE),
        json!({ "nodeAddress": "not-an-address" }),
    )
    .await;
    assert_eq!(status, 200);
    assert!(body.get("error").is_some());

    let (status, body) = post(
        &client,
        format!("{}{}", a.url, routes::ADD_NODE),
        json!({ "nodeAddress": "127.0.0.1:9" }),
    )
    .await;
    assert_eq!((status, body), (200, json!({ "status": "added" })));
    let (_, body) = post(
        &client,
        format!("{}{}", a.url, routes::ADD_NODE),
        json!({ "nodeAddress": "127.0.0.1:9" }),
    )
    .await;
    assert_eq!(body, json!({ "status": "already known" }));

    // Half a signature is rejected before any mining
    let mut request = SubmitTransaction::unsigned(Transaction::transfer("A", "B", 1));
    request.signature = Some("00ff".to_string());
    let (status, body) = post(
        &client,
        format!("{}{}", a.url, routes::TRANSACTIONS),
        serde_json::to_value(&request).unwrap(),
    )
    .await;
    assert_eq!(status, 422);
    assert!(body.get("error").is_some());
    assert_eq!(a.node.ledger().len().unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_broadcast_survives_a_silent_peer() {
    let (d1, d3, d_self) = (dir(), dir(), dir());
    let peer1 = RunningNode::start(d1.path()).await;
    let peer3 = RunningNode::start(d3.path()).await;

    // Accepts connections and never answers
    let silent = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let silent_addr = silent.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = silent.accept().await {
            held.push(socket);
        }
    });

    let me = RunningNode::start(d_self.path()).await;
    let directory = me.node.directory();
    directory.add(&peer1.address()).unwrap();
    directory.add(&silent_addr.to_string()).unwrap();
    directory.add(&peer3.address()).unwrap();

    let responses = me
        .node
        .gossip()
        .broadcast(&PeerRequest::get(routes::LEDGER))
        .await
        .unwrap();

    let mut expected = vec![
        PeerAddress::parse(&peer1.address()).unwrap(),
        PeerAddress::parse(&peer3.address()).unwrap(),
    ];
    expected.sort();
    assert_eq!(responses.keys().cloned().collect::<Vec<_>>(), expected);
}
