//! Integration tests for first-fit placement and room reaping.

use std::sync::Arc;
use std::time::Duration;

use playpool_protocol::{JsonCodec, RoomId};
use playpool_room::{Directory, RoomConfig, RoomError};
use playpool_transport::memory::{self, MemoryConnection, MemoryPeer};
use rand::Rng;
use rand::seq::SliceRandom;

// =========================================================================
// Helpers
// =========================================================================

type TestDirectory = Directory<MemoryConnection, JsonCodec>;

fn directory(capacity: usize) -> TestDirectory {
    let config = RoomConfig {
        capacity,
        queue_size: 32,
        send_timeout_ms: 200,
    };
    Directory::new(config, JsonCodec)
}

async fn place(dir: &TestDirectory) -> (RoomId, MemoryPeer) {
    let (conn, peer) = memory::pair(64);
    let placement = dir.place(conn).await.expect("placement always succeeds");
    (placement.room_id, peer)
}

async fn members_of(dir: &TestDirectory, room_id: RoomId) -> usize {
    for handle in dir.rooms().await {
        if handle.room_id() == room_id {
            return handle.info().await.expect("room alive").members;
        }
    }
    panic!("room {room_id} not registered");
}

async fn wait_for_members(dir: &TestDirectory, room_id: RoomId, expected: usize) {
    for _ in 0..200 {
        if members_of(dir, room_id).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("room {room_id} never reached {expected} members");
}

// =========================================================================
// Placement
// =========================================================================

#[tokio::test]
async fn test_directory_starts_with_one_room() {
    let dir = directory(10);
    assert_eq!(dir.config().capacity, 10);
    assert_eq!(dir.room_count().await, 1);
    assert_eq!(dir.room_ids().await, vec![RoomId(1)]);
}

#[tokio::test]
async fn test_fills_first_room_before_creating_another() {
    let dir = directory(3);
    let mut peers = Vec::new();
    for _ in 0..3 {
        let (room, peer) = place(&dir).await;
        assert_eq!(room, RoomId(1));
        peers.push(peer);
    }
    assert_eq!(dir.room_count().await, 1);

    let (overflow, _peer) = place(&dir).await;
    assert_eq!(overflow, RoomId(2));
    assert_eq!(dir.room_count().await, 2);
}

#[tokio::test]
async fn test_uses_later_room_with_space_instead_of_creating() {
    let dir = directory(2);
    let mut peers = Vec::new();
    for _ in 0..3 {
        peers.push(place(&dir).await.1);
    }
    // Room 1 is full, room 2 has one member.
    let (room, _peer) = place(&dir).await;
    assert_eq!(room, RoomId(2));
    assert_eq!(dir.room_count().await, 2);
}

#[tokio::test]
async fn test_vacated_early_room_is_refilled_first() {
    let dir = directory(2);
    let (r1, mut first) = place(&dir).await;
    let (_, _second) = place(&dir).await;
    let (r2, _third) = place(&dir).await;
    assert_eq!((r1, r2), (RoomId(1), RoomId(2)));

    first.close();
    wait_for_members(&dir, r1, 1).await;

    let (room, _peer) = place(&dir).await;
    assert_eq!(room, RoomId(1), "first fit, not least loaded");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_placement_creates_just_enough_rooms() {
    for (capacity, connections) in [(4usize, 23usize), (10, 10), (3, 31), (1, 7)] {
        let dir = Arc::new(directory(capacity));

        // Randomized arrival order and jitter.
        let mut order: Vec<usize> = (0..connections).collect();
        let delays: Vec<u64> = {
            let mut rng = rand::rng();
            order.shuffle(&mut rng);
            order.iter().map(|_| rng.random_range(0..3)).collect()
        };

        let mut tasks = Vec::with_capacity(connections);
        for (i, delay) in order.iter().zip(delays) {
            let dir = Arc::clone(&dir);
            let index = *i;
            tasks.push(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                let (conn, peer) = memory::pair(64);
                let placement = dir.place(conn).await.expect("placed");
                (index, placement, peer)
            }));
        }

        let mut peers = Vec::with_capacity(connections);
        for task in tasks {
            let (_, placement, peer) = task.await.expect("task");
            peers.push((placement, peer));
        }

        let expected_rooms = connections.div_ceil(capacity).max(1);
        assert_eq!(dir.room_count().await, expected_rooms);

        let mut seated = 0;
        for handle in dir.rooms().await {
            let info = handle.info().await.unwrap();
            assert!(info.members <= capacity);
            seated += info.members;
        }
        assert_eq!(seated, connections, "every connection is admitted");

        dir.shutdown().await;
    }
}

// =========================================================================
// Reaping
// =========================================================================

#[tokio::test]
async fn test_empty_overflow_room_is_reaped() {
    let dir = directory(1);
    let (_, _first) = place(&dir).await;
    let (r2, mut second) = place(&dir).await;
    assert_eq!(dir.room_count().await, 2);

    second.close();
    wait_for_members(&dir, r2, 0).await;

    assert_eq!(dir.reap_empty_rooms().await, 1);
    assert_eq!(dir.room_ids().await, vec![RoomId(1)]);
}

#[tokio::test]
async fn test_reaping_keeps_at_least_one_room() {
    let dir = directory(1);
    let (r1, mut only) = place(&dir).await;
    only.close();
    wait_for_members(&dir, r1, 0).await;

    assert_eq!(dir.reap_empty_rooms().await, 0);
    assert_eq!(dir.room_ids().await, vec![r1]);

    // The surviving room takes the next connection.
    let (room, _peer) = place(&dir).await;
    assert_eq!(room, r1);
}

#[tokio::test]
async fn test_placement_reaps_before_scanning() {
    let dir = directory(1);
    let (_, _a) = place(&dir).await;
    let (r2, mut b) = place(&dir).await;
    let (_, _c) = place(&dir).await;
    assert_eq!(dir.room_count().await, 3);

    b.close();
    wait_for_members(&dir, r2, 0).await;

    // Room 2 is reaped, so the newcomer overflows into a fresh room.
    let (room, _d) = place(&dir).await;
    assert_eq!(room, RoomId(4));
    assert_eq!(dir.room_ids().await, vec![RoomId(1), RoomId(3), RoomId(4)]);
}

#[tokio::test]
async fn test_occupied_room_survives_reaping() {
    let dir = directory(2);
    let (r1, mut a) = place(&dir).await;
    let (_, _b) = place(&dir).await;
    let (r2, mut c) = place(&dir).await;

    c.close();
    wait_for_members(&dir, r2, 0).await;
    a.close();
    wait_for_members(&dir, r1, 1).await;

    // Goes to room 1 (reaping room 2 on the way).
    let (room, _d) = place(&dir).await;
    assert_eq!(room, r1);
    assert_eq!(dir.reap_empty_rooms().await, 0);
    assert_eq!(dir.room_ids().await, vec![r1]);
}

#[tokio::test]
async fn test_shutdown_closes_every_member() {
    let dir = directory(2);
    let mut peers = Vec::new();
    for _ in 0..5 {
        peers.push(place(&dir).await.1);
    }

    dir.shutdown().await;
    assert_eq!(dir.room_count().await, 0);

    for mut peer in peers {
        // Drain any join notices, then observe the close.
        while peer.recv_timeout(Duration::from_secs(1)).await.is_some() {}
        assert!(peer.is_closed_by_server());
    }
}

#[tokio::test]
async fn test_placement_after_shutdown_is_refused() {
    let dir = directory(1);
    let (_, _first) = place(&dir).await;
    dir.shutdown().await;

    let (conn, mut peer) = memory::pair(8);
    let result = dir.place(conn).await;
    assert!(matches!(result, Err(RoomError::Unavailable(_))));
    assert_eq!(dir.room_count().await, 0, "no room is created after shutdown");
    // Nothing is ever delivered to a refused connection.
    assert!(peer.recv_timeout(Duration::from_millis(200)).await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_placements_racing_shutdown_leave_no_rooms() {
    let dir = Arc::new(directory(1));
    let mut tasks = Vec::new();
    for _ in 0..20 {
        let dir = Arc::clone(&dir);
        tasks.push(tokio::spawn(async move {
            let (conn, peer) = memory::pair(8);
            let _ = dir.place(conn).await;
            peer
        }));
    }
    dir.shutdown().await;

    let mut peers = Vec::new();
    for task in tasks {
        peers.push(task.await.expect("task"));
    }
    assert_eq!(dir.room_count().await, 0);
}
