//! Room directory: places new connections into rooms, first fit.

use std::collections::HashSet;
use std::sync::Arc;

use playpool_protocol::{Codec, MemberId, RoomId};
use playpool_transport::Connection;
use tokio::sync::{mpsc, Mutex};

use crate::room::spawn_room;
use crate::{RoomConfig, RoomError, RoomHandle};

/// Where a connection ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// The room that accepted the connection.
    pub room_id: RoomId,
    /// The member id the room assigned.
    pub member_id: MemberId,
}

/// The registry of rooms, guarded by the directory lock.
struct Registry<C: Connection> {
    /// Rooms in creation order. Placement scans them front to back.
    rooms: Vec<RoomHandle<C>>,
    next_room_id: u64,
    /// Set by [`Directory::shutdown`]; no room is created afterwards.
    shut_down: bool,
    vacancies_tx: mpsc::UnboundedSender<RoomId>,
    vacancies_rx: mpsc::UnboundedReceiver<RoomId>,
}

/// Owns every room and decides which one a new connection joins.
///
/// Placement is first fit: rooms are tried in creation order and a new
/// room is created only when every existing one is full. The whole scan
/// runs under one lock, so two simultaneous connections can never both
/// decide to create the overflow room.
///
/// Rooms that empty out report themselves; the next placement (or an
/// explicit [`reap_empty_rooms`](Self::reap_empty_rooms)) shuts them down,
/// always keeping at least one room.
pub struct Directory<C: Connection, K: Codec> {
    config: RoomConfig,
    codec: K,
    registry: Mutex<Registry<C>>,
}

impl<C: Connection, K: Codec> Directory<C, K> {
    /// Creates a directory with one empty room ready. Must be called
    /// inside a Tokio runtime.
    pub fn new(config: RoomConfig, codec: K) -> Self {
        let (vacancies_tx, vacancies_rx) = mpsc::unbounded_channel();
        let mut registry = Registry {
            rooms: Vec::new(),
            next_room_id: 1,
            shut_down: false,
            vacancies_tx,
            vacancies_rx,
        };
        registry.create_room(&config, &codec);

        Self {
            config,
            codec,
            registry: Mutex::new(registry),
        }
    }

    /// The config every room is created with.
    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Seats `connection` in the first room with space, creating a room if
    /// all are full.
    ///
    /// # Errors
    /// [`RoomError::Unavailable`] once the directory has been shut down, or
    /// if a freshly created room's actor is already gone.
    pub async fn place(&self, connection: C) -> Result<Placement, RoomError> {
        let connection = Arc::new(connection);
        let conn_id = connection.id();
        let mut registry = self.registry.lock().await;

        if registry.shut_down {
            tracing::debug!(%conn_id, "directory shut down, refusing placement");
            return Err(RoomError::Unavailable(RoomId(registry.next_room_id)));
        }

        registry.reap().await;

        for handle in &registry.rooms {
            match handle.admit(Arc::clone(&connection)).await {
                Ok(member_id) => {
                    tracing::debug!(%conn_id, room_id = %handle.room_id(), %member_id, "placed");
                    return Ok(Placement {
                        room_id: handle.room_id(),
                        member_id,
                    });
                }
                Err(RoomError::RoomFull(_)) => continue,
                Err(e) => {
                    tracing::warn!(%conn_id, error = %e, "skipping room");
                    continue;
                }
            }
        }

        let handle = registry.create_room(&self.config, &self.codec);
        let member_id = handle.admit(connection).await?;
        tracing::info!(
            %conn_id,
            room_id = %handle.room_id(),
            %member_id,
            rooms = registry.rooms.len(),
            "all rooms full, placed in new room"
        );
        Ok(Placement {
            room_id: handle.room_id(),
            member_id,
        })
    }

    /// Shuts down rooms that have emptied out, keeping at least one room.
    ///
    /// Returns how many rooms were removed.
    pub async fn reap_empty_rooms(&self) -> usize {
        self.registry.lock().await.reap().await
    }

    /// Returns the number of registered rooms.
    pub async fn room_count(&self) -> usize {
        self.registry.lock().await.rooms.len()
    }

    /// Lists registered room ids in creation order.
    pub async fn room_ids(&self) -> Vec<RoomId> {
        self.registry
            .lock()
            .await
            .rooms
            .iter()
            .map(RoomHandle::room_id)
            .collect()
    }

    /// Returns cloned handles to every registered room.
    pub async fn rooms(&self) -> Vec<RoomHandle<C>> {
        self.registry.lock().await.rooms.clone()
    }

    /// Shuts down every room and empties the registry. Later placements
    /// fail with [`RoomError::Unavailable`].
    pub async fn shutdown(&self) {
        let rooms = {
            let mut registry = self.registry.lock().await;
            registry.shut_down = true;
            std::mem::take(&mut registry.rooms)
        };
        for handle in rooms {
            let _ = handle.shutdown().await;
        }
        tracing::info!("directory shut down");
    }
}

impl<C: Connection> Registry<C> {
    fn create_room<K: Codec>(&mut self, config: &RoomConfig, codec: &K) -> RoomHandle<C> {
        let room_id = RoomId(self.next_room_id);
        self.next_room_id += 1;
        let handle = spawn_room::<C, K>(
            room_id,
            config.clone(),
            codec.clone(),
            Some(self.vacancies_tx.clone()),
        );
        self.rooms.push(handle.clone());
        tracing::info!(%room_id, rooms = self.rooms.len(), "room created");
        handle
    }

    /// Drops rooms that reported a vacancy and are still empty.
    async fn reap(&mut self) -> usize {
        let mut vacated = HashSet::new();
        while let Ok(room_id) = self.vacancies_rx.try_recv() {
            vacated.insert(room_id);
        }
        if vacated.is_empty() {
            return 0;
        }

        let mut kept = Vec::with_capacity(self.rooms.len());
        let mut empty = Vec::new();
        for handle in std::mem::take(&mut self.rooms) {
            if !vacated.contains(&handle.room_id()) {
                kept.push(handle);
                continue;
            }
            match handle.info().await {
                Ok(info) if info.members > 0 => kept.push(handle),
                Ok(_) => empty.push(handle),
                // Actor already gone; nothing to shut down.
                Err(_) => {}
            }
        }

        // Never leave the registry without a room.
        if kept.is_empty() && !empty.is_empty() {
            kept.push(empty.remove(0));
        }
        self.rooms = kept;

        let reaped = empty.len();
        for handle in empty {
            let _ = handle.shutdown().await;
            tracing::info!(room_id = %handle.room_id(), "empty room reaped");
        }
        reaped
    }
}
