//! Room actor: an isolated Tokio task that owns one room's membership.
//!
//! Everything that touches the members goes through the actor's bounded
//! queue and is applied by the actor alone, in arrival order: admissions
//! from the directory, events from member reader tasks, and queries.
//! There is no lock around the roster because nothing else can reach it.

use std::collections::VecDeque;
use std::sync::Arc;

use playpool_protocol::{Codec, Envelope, EventKind, MemberId, RoomId};
use playpool_session::Session;
use playpool_transport::Connection;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};

use crate::fanout::Route;
use crate::roster::Roster;
use crate::{RoomConfig, RoomError};

/// Commands sent to a room actor through its queue.
pub(crate) enum RoomCommand<C: Connection> {
    /// Seat a new connection if there is space.
    Admit {
        connection: Arc<C>,
        reply: oneshot::Sender<Result<MemberId, RoomError>>,
    },

    /// A membership or gameplay event, usually from a reader task.
    Event(Envelope),

    /// Request the room's summary.
    Info { reply: oneshot::Sender<RoomInfo> },

    /// Request a per-member snapshot.
    Roster {
        reply: oneshot::Sender<Vec<MemberSnapshot>>,
    },

    /// Close every member and stop.
    Shutdown,
}

/// Lets session readers push envelopes straight into the queue.
impl<C: Connection> From<Envelope> for RoomCommand<C> {
    fn from(envelope: Envelope) -> Self {
        Self::Event(envelope)
    }
}

/// A summary of room metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    /// The room's id.
    pub room_id: RoomId,
    /// Members currently seated.
    pub members: usize,
    /// Maximum members.
    pub capacity: usize,
}

/// One member as seen at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSnapshot {
    /// Position in broadcast order. Shifts when earlier members leave.
    pub slot: usize,
    /// Stable identity.
    pub member_id: MemberId,
    /// Points scored so far.
    pub score: u64,
}

/// Handle to a running room actor.
///
/// Cheap to clone: it's an `mpsc::Sender` and an id.
pub struct RoomHandle<C: Connection> {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand<C>>,
}

impl<C: Connection> Clone for RoomHandle<C> {
    fn clone(&self) -> Self {
        Self {
            room_id: self.room_id,
            sender: self.sender.clone(),
        }
    }
}

impl<C: Connection> RoomHandle<C> {
    /// Spawns a standalone room actor. Must be called inside a Tokio
    /// runtime.
    pub fn spawn<K: Codec>(room_id: RoomId, config: RoomConfig, codec: K) -> Self {
        spawn_room(room_id, config, codec, None)
    }

    /// Returns the room's id.
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Asks the room to seat `connection`.
    ///
    /// On success the member is registered, its reader is running, and its
    /// `Joined` has already been fanned out.
    ///
    /// # Errors
    /// - [`RoomError::RoomFull`] if the room is at capacity (no mutation)
    /// - [`RoomError::Unavailable`] if the actor is gone
    pub async fn admit(&self, connection: Arc<C>) -> Result<MemberId, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Admit {
                connection,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    /// Queues an event as if a member's reader had sent it.
    pub async fn push(&self, envelope: Envelope) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Event(envelope))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Requests the current room info.
    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Info { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Requests a snapshot of every member in slot order.
    pub async fn roster(&self) -> Result<Vec<MemberSnapshot>, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Roster { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Tells the room to close its members and stop.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }
}

/// A seated member: its session plus the task reading from it.
struct Member<C: Connection, K: Codec> {
    session: Session<C, K>,
    reader: JoinHandle<()>,
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<C: Connection, K: Codec> {
    room_id: RoomId,
    config: RoomConfig,
    codec: K,
    roster: Roster<Member<C, K>>,
    receiver: mpsc::Receiver<RoomCommand<C>>,
    /// Handed (upgraded) to each reader. Weak so the actor alone doesn't
    /// keep its own queue open.
    queue: mpsc::WeakSender<RoomCommand<C>>,
    /// Told when the room becomes empty.
    vacancies: Option<mpsc::UnboundedSender<RoomId>>,
}

impl<C: Connection, K: Codec> RoomActor<C, K> {
    /// Runs the actor loop, processing commands until shutdown.
    async fn run(mut self) {
        tracing::info!(
            room_id = %self.room_id,
            capacity = self.config.capacity,
            "room actor started"
        );

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Admit { connection, reply } => {
                    let result = self.handle_admit(connection);
                    let joined = result.as_ref().ok().copied();
                    let _ = reply.send(result);
                    if let Some(member_id) = joined {
                        self.apply(Envelope::joined(member_id)).await;
                    }
                }
                RoomCommand::Event(envelope) => {
                    self.apply(envelope).await;
                }
                RoomCommand::Info { reply } => {
                    let _ = reply.send(self.info());
                }
                RoomCommand::Roster { reply } => {
                    let _ = reply.send(self.snapshot());
                }
                RoomCommand::Shutdown => {
                    tracing::info!(room_id = %self.room_id, "room shutting down");
                    break;
                }
            }
        }

        self.close_all().await;
        tracing::info!(room_id = %self.room_id, "room actor stopped");
    }

    fn handle_admit(&mut self, connection: Arc<C>) -> Result<MemberId, RoomError> {
        let events = self
            .queue
            .upgrade()
            .ok_or(RoomError::Unavailable(self.room_id))?;
        let codec = self.codec.clone();
        let session_config = self.config.session_config();

        let member_id = self
            .roster
            .admit(|member_id| {
                let session =
                    Session::new(member_id, connection, codec, session_config);
                let reader = session.spawn_reader(events);
                Member { session, reader }
            })
            .ok_or(RoomError::RoomFull(self.room_id))?;

        tracing::info!(
            room_id = %self.room_id,
            %member_id,
            members = self.roster.len(),
            "member joined"
        );
        Ok(member_id)
    }

    /// Applies one event and anything it sets off.
    ///
    /// Delivery failures discovered while fanning out become departures,
    /// handled here before the next queued command.
    async fn apply(&mut self, envelope: Envelope) {
        let mut pending = VecDeque::from([envelope]);

        while let Some(envelope) = pending.pop_front() {
            let source = envelope.source;
            match envelope.kind {
                EventKind::ScoreUpdate => {
                    match self.roster.credit(source) {
                        Some(score) => tracing::trace!(
                            room_id = %self.room_id,
                            member_id = %source,
                            score,
                            "score updated"
                        ),
                        None => self.ignore_stale(&envelope),
                    }
                    continue;
                }
                EventKind::Left => {
                    if !self.depart(source).await {
                        self.ignore_stale(&envelope);
                        continue;
                    }
                }
                EventKind::Joined | EventKind::Attack => {
                    if !self.roster.contains(source) {
                        self.ignore_stale(&envelope);
                        continue;
                    }
                }
            }

            let failed = self.broadcast(&envelope, Route::for_envelope(&envelope)).await;
            pending.extend(failed.into_iter().map(Envelope::left));
        }
    }

    /// Sends `envelope` to every member the route includes, in slot order.
    ///
    /// Returns the members whose delivery failed.
    async fn broadcast(&self, envelope: &Envelope, route: Route) -> Vec<MemberId> {
        let mut failed = Vec::new();
        let mut delivered = 0usize;

        for seat in self.roster.seats() {
            if !route.includes(seat.id) {
                continue;
            }
            match seat.occupant.session.send(envelope).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(
                        room_id = %self.room_id,
                        member_id = %seat.id,
                        error = %e,
                        "delivery failed, dropping member"
                    );
                    failed.push(seat.id);
                }
            }
        }

        tracing::debug!(
            room_id = %self.room_id,
            kind = %envelope.kind,
            source = %envelope.source,
            delivered,
            failed = failed.len(),
            "broadcast"
        );
        failed
    }

    /// Removes a member, stops its reader and closes its transport.
    ///
    /// Returns `false` if `member_id` was not seated.
    async fn depart(&mut self, member_id: MemberId) -> bool {
        let Some(seat) = self.roster.remove(member_id) else {
            return false;
        };
        let Member { session, reader } = seat.occupant;
        reader.abort();
        let conn_id = session.connection_id();

        // The close may have to flush into a wedged socket; the room moves on
        // without waiting for it.
        tokio::spawn(async move {
            if let Err(e) = session.close().await {
                tracing::debug!(%member_id, %conn_id, error = %e, "close on departure");
            }
        });

        tracing::info!(
            room_id = %self.room_id,
            %member_id,
            %conn_id,
            score = seat.score,
            members = self.roster.len(),
            "member left"
        );

        if self.roster.is_empty() {
            if let Some(vacancies) = &self.vacancies {
                let _ = vacancies.send(self.room_id);
            }
        }
        true
    }

    fn ignore_stale(&self, envelope: &Envelope) {
        tracing::debug!(
            room_id = %self.room_id,
            kind = %envelope.kind,
            source = %envelope.source,
            "event for a member no longer seated, ignored"
        );
    }

    /// Closes every member concurrently. Each close is bounded by the send
    /// timeout, so this returns within roughly one timeout.
    async fn close_all(&mut self) {
        let mut closing = JoinSet::new();
        for seat in self.roster.drain() {
            let Member { session, reader } = seat.occupant;
            reader.abort();
            closing.spawn(async move { session.close().await });
        }
        while let Some(result) = closing.join_next().await {
            if let Ok(Err(e)) = result {
                tracing::debug!(room_id = %self.room_id, error = %e, "close on shutdown");
            }
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room_id,
            members: self.roster.len(),
            capacity: self.roster.capacity(),
        }
    }

    fn snapshot(&self) -> Vec<MemberSnapshot> {
        self.roster
            .seats()
            .enumerate()
            .map(|(slot, seat)| MemberSnapshot {
                slot,
                member_id: seat.id,
                score: seat.score,
            })
            .collect()
    }
}

/// Spawns a new room actor task and returns a handle to communicate with it.
pub(crate) fn spawn_room<C: Connection, K: Codec>(
    room_id: RoomId,
    config: RoomConfig,
    codec: K,
    vacancies: Option<mpsc::UnboundedSender<RoomId>>,
) -> RoomHandle<C> {
    let (tx, rx) = mpsc::channel(config.queue_size.max(1));

    let actor = RoomActor::<C, K> {
        room_id,
        roster: Roster::new(config.capacity),
        config,
        codec,
        receiver: rx,
        queue: tx.downgrade(),
        vacancies,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}
