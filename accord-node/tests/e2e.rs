//! Two in-process nodes talking over the real JSON-RPC binding.

use std::time::Duration;

use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::ClientError;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;

use accord_crypto::canonical::{canonicalize, canonicalize_commit};
use accord_crypto::keys::NodeKey;
use accord_node::config::{NodeConfig, PeerConfig};
use accord_node::node::Node;
use accord_node::rpc::handlers::{AUTHENTICATION_ERROR, NOT_FOUND_ERROR, VALIDATION_ERROR};
use accord_node::rpc::types::{
    AccountInfo, AccountResponse, LedgerInfo, LedgerResponse, LedgerStatusInfo,
};
use accord_types::currency::Currency;
use accord_types::ledger::{AccountFields, LedgerFields};
use accord_types::message::{
    AccountProposal, Authentication, CommitMessage, CreateRequest, LedgerProposal,
    PrepareMessage,
};

struct Member {
    url: String,
    key: NodeKey,
    node: Node,
    client: HttpClient,
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

async fn cluster(dir: &tempfile::TempDir) -> (Member, Member) {
    let keys = [
        NodeKey::generate(1024).unwrap(),
        NodeKey::generate(1024).unwrap(),
    ];
    let urls = [
        format!("http://127.0.0.1:{}", free_port()),
        format!("http://127.0.0.1:{}", free_port()),
    ];
    let peers: Vec<PeerConfig> = urls
        .iter()
        .zip(keys.iter())
        .map(|(url, key)| PeerConfig {
            url: url.clone(),
            public_key: Some(key.public_key_pem().unwrap()),
            public_key_path: None,
        })
        .collect();

    let mut members = Vec::new();
    for (i, (url, key)) in urls.iter().zip(keys.iter()).enumerate() {
        let key_path = dir.path().join(format!("node-{}.pem", i));
        std::fs::write(&key_path, key.to_pem().unwrap()).unwrap();

        let mut config = NodeConfig::default();
        config.identity.url = url.clone();
        config.identity.private_key_path = key_path.to_string_lossy().into_owned();
        config.peers = peers.clone();
        config.storage.db_type = "memory".to_string();
        config.rpc.listen_addr = url.trim_start_matches("http://").to_string();
        config.broadcast.timeout_ms = 2000;

        let node = Node::new(config).await.unwrap();
        let client = HttpClientBuilder::default()
            .request_timeout(Duration::from_secs(10))
            .build(url)
            .unwrap();
        members.push(Member {
            url: url.clone(),
            key: key.clone(),
            node,
            client,
        });
    }
    let b = members.pop().unwrap();
    let a = members.pop().unwrap();
    (a, b)
}

fn moonbucks() -> LedgerProposal {
    LedgerProposal {
        ledger: LedgerFields {
            public_key: NodeKey::generate(1024).unwrap().public_key_pem().unwrap(),
            name: "Moonbucks".to_string(),
            url: "moonbucks.com".to_string(),
        },
        primary_account: AccountFields {
            public_key: NodeKey::generate(1024).unwrap().public_key_pem().unwrap(),
        },
    }
}

async fn get_ledger(client: &HttpClient, public_key: &str) -> Option<LedgerInfo> {
    client
        .request("accord_getLedger", rpc_params![public_key])
        .await
        .unwrap()
}

/// Poll until the ledger shows up with at least `prepared` confirmations.
async fn wait_for_ledger(client: &HttpClient, public_key: &str, prepared: usize) -> LedgerInfo {
    for _ in 0..100 {
        if let Some(info) = get_ledger(client, public_key).await {
            if info.prepared >= prepared {
                return info;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("ledger did not propagate");
}

fn commit_from(member: &Member, proposal: &LedgerProposal) -> CommitMessage {
    let signature = member
        .key
        .sign(&canonicalize_commit(proposal).unwrap())
        .unwrap();
    CommitMessage::new(
        proposal.clone(),
        Authentication {
            node: member.url.clone(),
            signature,
        },
    )
}

fn error_code(err: ClientError) -> i32 {
    match err {
        ClientError::Call(obj) => obj.code(),
        other => panic!("expected call error, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_create_propagates_and_commits() {
    let dir = tempfile::tempdir().unwrap();
    let (mut a, mut b) = cluster(&dir).await;
    let proposal = moonbucks();
    let public_key = proposal.ledger.public_key.clone();

    let request = CreateRequest {
        ledger: proposal.ledger.clone(),
        primary_account: Some(proposal.primary_account.clone()),
    };
    let created: LedgerResponse = a
        .client
        .request("accord_createLedger", rpc_params![request])
        .await
        .unwrap();
    assert_eq!(created.status, 201);
    assert_eq!(created.ledger.prepared, 2);
    assert_eq!(created.ledger.primary_account.balance, 0);

    let on_b = wait_for_ledger(&b.client, &public_key, 1).await;
    assert_eq!(on_b.name, "Moonbucks");
    assert_eq!(on_b.prepared, 1);
    assert_eq!(on_b.primary_account.code, created.ledger.primary_account.code);

    // B excludes A when forwarding, so A gains nothing from the round trip.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(get_ledger(&a.client, &public_key).await.unwrap().prepared, 2);

    for member in [&a, &b] {
        let response: LedgerResponse = member
            .client
            .request("accord_commitLedger", rpc_params![commit_from(&a, &proposal)])
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.ledger.committed, 1);
    }

    let status: LedgerStatusInfo = a
        .client
        .request("accord_getLedgerStatus", rpc_params![&public_key])
        .await
        .unwrap();
    assert_eq!(status.threshold, 2);
    assert_eq!(status.status, "prepared");

    let _: LedgerResponse = a
        .client
        .request("accord_commitLedger", rpc_params![commit_from(&b, &proposal)])
        .await
        .unwrap();
    let status: LedgerStatusInfo = a
        .client
        .request("accord_getLedgerStatus", rpc_params![&public_key])
        .await
        .unwrap();
    assert_eq!(status.status, "committed");

    let metrics: String = a
        .client
        .request("accord_getMetrics", rpc_params![])
        .await
        .unwrap();
    assert!(metrics.contains("accord_ledgers_created_total 1"));
    assert!(metrics.contains("accord_commits_recorded_total 2"));

    a.node.shutdown().await.unwrap();
    b.node.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rejections_over_rpc() {
    let dir = tempfile::tempdir().unwrap();
    let (mut a, mut b) = cluster(&dir).await;
    let proposal = moonbucks();

    let mut invalid = proposal.clone();
    invalid.ledger.public_key = "123".to_string();
    let err = a
        .client
        .request::<LedgerResponse, _>(
            "accord_createLedger",
            rpc_params![CreateRequest {
                ledger: invalid.ledger,
                primary_account: Some(invalid.primary_account),
            }],
        )
        .await
        .unwrap_err();
    assert_eq!(error_code(err), VALIDATION_ERROR);

    // Signed by A's key but claiming to be B.
    let forged = PrepareMessage::new(
        proposal.clone(),
        Authentication {
            node: b.url.clone(),
            signature: a.key.sign(&canonicalize(&proposal).unwrap()).unwrap(),
        },
    );
    let err = a
        .client
        .request::<LedgerResponse, _>("accord_prepareLedger", rpc_params![forged])
        .await
        .unwrap_err();
    assert_eq!(error_code(err), AUTHENTICATION_ERROR);
    assert!(get_ledger(&a.client, &proposal.ledger.public_key)
        .await
        .is_none());

    let err = b
        .client
        .request::<LedgerResponse, _>("accord_commitLedger", rpc_params![commit_from(&a, &proposal)])
        .await
        .unwrap_err();
    assert_eq!(error_code(err), NOT_FOUND_ERROR);

    assert_eq!(a.node.metrics().auth_failures.get(), 1);

    a.node.shutdown().await.unwrap();
    b.node.shutdown().await.unwrap();
}

async fn list_accounts(client: &HttpClient, ledger_public_key: &str) -> Vec<AccountInfo> {
    client
        .request("accord_listAccounts", rpc_params![ledger_public_key])
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_account_propagates_under_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let (mut a, mut b) = cluster(&dir).await;
    let proposal = moonbucks();
    let ledger_key = proposal.ledger.public_key.clone();

    let request = CreateRequest {
        ledger: proposal.ledger.clone(),
        primary_account: Some(proposal.primary_account.clone()),
    };
    let _: LedgerResponse = a
        .client
        .request("accord_createLedger", rpc_params![request])
        .await
        .unwrap();
    wait_for_ledger(&b.client, &ledger_key, 1).await;

    let account = AccountProposal {
        ledger: ledger_key.clone(),
        public_key: NodeKey::generate(1024).unwrap().public_key_pem().unwrap(),
    };
    let created: AccountResponse = a
        .client
        .request("accord_createAccount", rpc_params![account.clone()])
        .await
        .unwrap();
    assert_eq!(created.status, 201);
    assert_eq!(created.prepared, 1);
    assert_eq!(created.account.balance, 0);

    let mut on_b = list_accounts(&b.client, &ledger_key).await;
    for _ in 0..100 {
        if on_b.len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        on_b = list_accounts(&b.client, &ledger_key).await;
    }
    assert_eq!(on_b.len(), 2);
    assert!(on_b.contains(&created.account));

    // The secondary account leaves the ledger's own evidence alone.
    assert_eq!(get_ledger(&a.client, &ledger_key).await.unwrap().prepared, 2);
    assert_eq!(get_ledger(&b.client, &ledger_key).await.unwrap().prepared, 1);

    let err = a
        .client
        .request::<AccountResponse, _>("accord_createAccount", rpc_params![account])
        .await
        .unwrap_err();
    assert_eq!(error_code(err), VALIDATION_ERROR);

    // Replaying A's commit on A does not add a second vote.
    for _ in 0..2 {
        let response: LedgerResponse = a
            .client
            .request("accord_commitLedger", rpc_params![commit_from(&a, &proposal)])
            .await
            .unwrap();
        assert_eq!(response.ledger.committed, 1);
    }

    a.node.shutdown().await.unwrap();
    b.node.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_currency_registry_over_rpc() {
    let dir = tempfile::tempdir().unwrap();
    let (mut a, mut b) = cluster(&dir).await;
    let moonbucks = Currency {
        public_key: NodeKey::generate(1024).unwrap().public_key_pem().unwrap(),
        name: "moonbucks".to_string(),
        url: "moonbucks.com".to_string(),
    };

    let created: Currency = a
        .client
        .request("accord_createCurrency", rpc_params![moonbucks.clone()])
        .await
        .unwrap();
    assert_eq!(created, moonbucks);

    let found: Option<Currency> = a
        .client
        .request("accord_getCurrency", rpc_params!["moonbucks"])
        .await
        .unwrap();
    assert_eq!(found, Some(moonbucks.clone()));
    let listed: Vec<Currency> = a
        .client
        .request("accord_listCurrencies", rpc_params![])
        .await
        .unwrap();
    assert_eq!(listed, vec![moonbucks.clone()]);

    // Currencies stay on the node that registered them.
    let on_b: Option<Currency> = b
        .client
        .request("accord_getCurrency", rpc_params!["moonbucks"])
        .await
        .unwrap();
    assert!(on_b.is_none());

    let mut renamed = moonbucks.clone();
    renamed.public_key = NodeKey::generate(1024).unwrap().public_key_pem().unwrap();
    let err = a
        .client
        .request::<Currency, _>("accord_createCurrency", rpc_params![renamed])
        .await
        .unwrap_err();
    assert_eq!(error_code(err), VALIDATION_ERROR);

    a.node.shutdown().await.unwrap();
    b.node.shutdown().await.unwrap();
}
