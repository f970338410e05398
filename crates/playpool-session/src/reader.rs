//! The inbound half of a session.

use std::sync::Arc;

use playpool_protocol::{ClientNotification, Codec, Envelope, EventKind, MemberId};
use playpool_transport::Connection;
use tokio::sync::mpsc;

/// Forwards client notifications into a room queue until the client leaves.
///
/// A frame that decodes becomes an envelope of the decoded kind. Anything
/// else (a receive error, a clean close, a frame that doesn't decode)
/// closes the transport and becomes a single synthetic `Left`. Nothing is
/// retried.
///
/// The push into `events` waits when the room queue is full; that is the
/// only backpressure a client sees.
pub(crate) async fn read_loop<C, K, T>(
    connection: Arc<C>,
    codec: K,
    member_id: MemberId,
    events: mpsc::Sender<T>,
) where
    C: Connection,
    K: Codec,
    T: From<Envelope> + Send + 'static,
{
    let conn_id = connection.id();

    loop {
        let (kind, failed) = match connection.recv().await {
            Ok(Some(frame)) => {
                match codec.decode::<ClientNotification>(&frame) {
                    Ok(note) => (note.kind, false),
                    Err(e) => {
                        tracing::debug!(
                            %conn_id, %member_id, error = %e,
                            "undecodable frame, dropping session"
                        );
                        (EventKind::Left, true)
                    }
                }
            }
            Ok(None) => {
                tracing::debug!(%conn_id, %member_id, "connection closed");
                (EventKind::Left, true)
            }
            Err(e) => {
                tracing::debug!(
                    %conn_id, %member_id, error = %e, "receive failed"
                );
                (EventKind::Left, true)
            }
        };

        if failed {
            if let Err(e) = connection.close().await {
                tracing::trace!(%conn_id, error = %e, "close after failure");
            }
        }

        tracing::trace!(%member_id, %kind, "forwarding client event");
        if events.send(Envelope::new(kind, member_id).into()).await.is_err() {
            tracing::debug!(%member_id, "room queue closed, reader stopping");
            break;
        }

        if kind == EventKind::Left {
            break;
        }
    }
}
