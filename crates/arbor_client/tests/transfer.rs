use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::Path;
use std::time::Duration;

use arbor_client::{ClientConfig, ControlClient, TransferEngine, TransferError, TransferEvent};
use arbor_coordinator::{CoordinatorConfig, CoordinatorServer};
use arbor_core::codec::CodecKind;
use arbor_core::topology::{Cluster, NodeDirectory};
use arbor_core::{ChunkId, NodeId};
use arbor_node::{NodeServer, StorageNode};
use arbor_protocol::ControlRequest;
use arbor_storage::LocalStorage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;
use tokio::net::UdpSocket;

const NUM_NODES: u16 = 7;

struct TestCluster {
    coordinator: SocketAddr,
    cluster: Cluster,
    dir: TempDir,
}

/// Reserve `count` free UDP ports on localhost.
async fn free_addrs(count: u16) -> Vec<SocketAddrV4> {
    let mut sockets = Vec::new();
    for _ in 0..count {
        sockets.push(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    }
    sockets
        .iter()
        .map(|socket| match socket.local_addr().unwrap() {
            SocketAddr::V4(addr) => addr,
            SocketAddr::V6(addr) => panic!("unexpected IPv6 address {addr}"),
        })
        .collect()
}

async fn start_cluster(codec: CodecKind, with_nodes: bool) -> TestCluster {
    let dir = TempDir::new().unwrap();
    let cluster = Cluster::new(NUM_NODES, &NodeDirectory::Explicit(free_addrs(NUM_NODES).await))
        .unwrap();

    if with_nodes {
        for id in 0..NUM_NODES {
            let store = LocalStorage::new(dir.path().join(format!("CHUNK-{id}"))).unwrap();
            let node = StorageNode::new(NodeId(id), &cluster, store, codec.build()).unwrap();
            let addr = SocketAddr::V4(cluster.address(NodeId(id)).unwrap());
            let server = NodeServer::bind(node, addr).await.unwrap();
            tokio::spawn(server.run());
        }
    }

    let coordinator = CoordinatorServer::bind(CoordinatorConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        cluster: cluster.clone(),
    })
    .await
    .unwrap();
    let coordinator_addr = coordinator.local_addr().unwrap();
    tokio::spawn(coordinator.run());

    TestCluster {
        coordinator: coordinator_addr,
        cluster,
        dir,
    }
}

async fn client(cluster: &TestCluster, codec: CodecKind, ack_timeout: Duration) -> TransferEngine {
    TransferEngine::new(ClientConfig {
        coordinator_addr: cluster.coordinator,
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        codec,
        ack_timeout: Some(ack_timeout),
    })
    .await
    .unwrap()
}

fn write_random_file(path: &Path, size: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<u8> = (0..size).map(|_| rng.gen()).collect();
    std::fs::write(path, &data).unwrap();
    data
}

async fn roundtrip(codec: CodecKind, size: usize) {
    let cluster = start_cluster(codec, true).await;
    let engine = client(&cluster, codec, Duration::from_secs(2)).await;

    let input = cluster.dir.path().join("input.bin");
    let output = cluster.dir.path().join("output.bin");
    let data = write_random_file(&input, size, size as u64);

    let mut upload_events = Vec::new();
    let sent = engine
        .upload(&input, "f", |event| upload_events.push(event))
        .await
        .unwrap();
    assert_eq!(sent, size as u64);

    let mut download_events = Vec::new();
    let received = engine
        .download("f", &output, |event| download_events.push(event))
        .await
        .unwrap();
    assert_eq!(received, size as u64);
    assert_eq!(std::fs::read(&output).unwrap(), data);

    let chunks = size.div_ceil(8192) as u64;
    let progress = |events: &[TransferEvent]| -> Vec<u64> {
        events
            .iter()
            .filter_map(|event| match event {
                TransferEvent::Progress { done, total } => {
                    assert_eq!(*total, chunks);
                    Some(*done)
                }
                _ => None,
            })
            .collect()
    };
    let expected: Vec<u64> = (1..=chunks).collect();
    assert_eq!(progress(&upload_events), expected);
    assert_eq!(progress(&download_events), expected);

    assert_eq!(
        upload_events.last(),
        Some(&TransferEvent::Completed {
            file_id: "f".into(),
            bytes: size as u64
        })
    );
    assert!(upload_events.iter().all(|event| !matches!(
        event,
        TransferEvent::ChunkAcked {
            corrupted: true,
            ..
        }
    )));
}

#[tokio::test]
async fn test_upload_download_multi_chunk_file() {
    roundtrip(CodecKind::ReedSolomon, 20_000).await;
}

#[tokio::test]
async fn test_upload_download_with_parity_codec() {
    roundtrip(CodecKind::Parity, 3 * 8192).await;
}

#[tokio::test]
async fn test_upload_download_empty_file() {
    roundtrip(CodecKind::ReedSolomon, 0).await;
}

#[tokio::test]
async fn test_chunks_land_on_assigned_nodes() {
    let cluster = start_cluster(CodecKind::ReedSolomon, true).await;
    let engine = client(&cluster, CodecKind::ReedSolomon, Duration::from_secs(2)).await;

    let input = cluster.dir.path().join("input.bin");
    write_random_file(&input, 30_000, 1);

    let mut acks = Vec::new();
    engine
        .upload(&input, "placed", |event| {
            if let TransferEvent::ChunkAcked { chunk_id, next, .. } = event {
                acks.push((chunk_id, next));
            }
        })
        .await
        .unwrap();

    let metadata = ControlClient::connect(cluster.coordinator)
        .await
        .unwrap()
        .lookup("placed")
        .await
        .unwrap();
    assert_eq!(metadata.chunks.len(), 4);
    assert_eq!(acks.len(), 4);

    for (chunk, (acked_id, next)) in metadata.chunks.iter().zip(&acks) {
        assert_eq!(&chunk.chunk_id, acked_id);

        let location = chunk.locations[0];
        let id = (0..NUM_NODES)
            .map(NodeId)
            .find(|&id| cluster.cluster.address(id) == Some(location))
            .unwrap();
        assert!(cluster
            .dir
            .path()
            .join(format!("CHUNK-{}", id.0))
            .join(format!("{}.bin", chunk.chunk_id))
            .exists());
        assert_eq!(Some(*next), cluster.cluster.successor_address(id));
    }
}

#[tokio::test]
async fn test_reupload_replaces_previous_allocation() {
    let cluster = start_cluster(CodecKind::ReedSolomon, true).await;
    let engine = client(&cluster, CodecKind::ReedSolomon, Duration::from_secs(2)).await;

    let first = cluster.dir.path().join("first.bin");
    let second = cluster.dir.path().join("second.bin");
    let output = cluster.dir.path().join("output.bin");
    write_random_file(&first, 40_000, 2);
    let data = write_random_file(&second, 5_000, 3);

    engine.upload(&first, "doc", |_| {}).await.unwrap();
    engine.upload(&second, "doc", |_| {}).await.unwrap();
    engine.download("doc", &output, |_| {}).await.unwrap();

    assert_eq!(std::fs::read(&output).unwrap(), data);
}

#[tokio::test]
async fn test_download_unknown_file() {
    let cluster = start_cluster(CodecKind::ReedSolomon, true).await;
    let engine = client(&cluster, CodecKind::ReedSolomon, Duration::from_secs(2)).await;

    let result = engine
        .download("missing", &cluster.dir.path().join("out.bin"), |_| {})
        .await;
    match result {
        Err(TransferError::Coordinator(message)) => assert_eq!(message, "File not found"),
        other => panic!("expected coordinator error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_upload_times_out_without_nodes() {
    let cluster = start_cluster(CodecKind::ReedSolomon, false).await;
    let engine = client(&cluster, CodecKind::ReedSolomon, Duration::from_millis(200)).await;

    let input = cluster.dir.path().join("input.bin");
    write_random_file(&input, 100, 4);

    let result = engine.upload(&input, "lost", |_| {}).await;
    match result {
        Err(TransferError::Timeout { chunk_id, .. }) => {
            assert_eq!(chunk_id, ChunkId::new("lost", 0))
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_register_replica_through_control_client() {
    let cluster = start_cluster(CodecKind::ReedSolomon, false).await;
    let mut control = ControlClient::connect(cluster.coordinator).await.unwrap();

    let chunks = control.allocate("r", 10).await.unwrap();
    let replica = SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 20), 5000);
    control
        .register_replica(&chunks[0].chunk_id, replica)
        .await
        .unwrap();
    control
        .register_replica(&chunks[0].chunk_id, replica)
        .await
        .unwrap();

    let metadata = control.lookup("r").await.unwrap();
    assert_eq!(metadata.chunks[0].locations, vec![chunks[0].locations[0], replica]);

    let missing = control
        .register_replica(&ChunkId::new("nothing", 0), replica)
        .await;
    assert!(matches!(missing, Err(TransferError::Coordinator(_))));
}

#[tokio::test]
async fn test_invalid_file_id_never_reaches_coordinator() {
    let cluster = start_cluster(CodecKind::ReedSolomon, true).await;
    let engine = client(&cluster, CodecKind::ReedSolomon, Duration::from_secs(2)).await;

    let input = cluster.dir.path().join("input.bin");
    write_random_file(&input, 100, 5);
    engine.upload(&input, "kept", |_| {}).await.unwrap();

    let spaced = engine.upload(&input, "my file.txt", |_| {}).await;
    assert!(matches!(spaced, Err(TransferError::InvalidFileId { .. })));

    // Chunk ids of this file would not fit in a STORE packet
    let long_id = format!("kept{}", "x".repeat(300));
    let long = engine.upload(&input, &long_id, |_| {}).await;
    assert!(matches!(long, Err(TransferError::InvalidFileId { .. })));

    let output = cluster.dir.path().join("output.bin");
    engine.download("kept", &output, |_| {}).await.unwrap();
    assert_eq!(std::fs::read(&output).unwrap(), std::fs::read(&input).unwrap());

    let mut control = ControlClient::connect(cluster.coordinator).await.unwrap();
    let unallocated = control
        .request(ControlRequest::LookupFile { file_id: long_id })
        .await;
    match unallocated {
        Err(TransferError::Coordinator(message)) => assert_eq!(message, "File not found"),
        other => panic!("expected coordinator error, got {other:?}"),
    }
}
