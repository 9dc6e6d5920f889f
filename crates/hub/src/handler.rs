//! Subscriber connection handler
//!
//! Runs for the lifetime of one subscriber connection. The write half of
//! the socket goes to the hub; the read half stays here for the control
//! protocol:
//!
//! - `PING` → `PONG`
//! - `QUIT` → disconnect
//! - anything else is ignored
//!
//! The handler exits on EOF, socket error, quit, or when the hub discards
//! the registration (displacement by a duplicate id, shutdown).

use std::sync::Arc;

use bytes::BytesMut;
use tokio::net::UnixStream;
use tracing::debug;

use recap_event::LineReader;

use crate::error::Result;
use crate::filter::EventFilter;
use crate::hub::Hub;

/// Register the connection with the hub and run its control loop
///
/// `leftover` carries any bytes the classifier read past the subscribe
/// line.
pub async fn serve_subscriber(
    hub: Arc<Hub>,
    stream: UnixStream,
    leftover: BytesMut,
    id: String,
    filter: EventFilter,
) -> Result<()> {
    let (read_half, write_half) = stream.into_split();
    let subscriber = hub.subscribe(id, write_half, filter);

    let ack = format!("SUBSCRIBED {}", subscriber.id());
    if subscriber.send_line(ack.as_bytes()).await.is_err() {
        hub.remove(&subscriber);
        return Ok(());
    }

    let mut lines = LineReader::from_parts(read_half, leftover);
    loop {
        tokio::select! {
            _ = subscriber.cancel_token().cancelled() => break,
            line = lines.read_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    // EOF or a broken control stream both end the session.
                    Ok(None) | Err(_) => break,
                };
                match std::str::from_utf8(&line).map(str::trim) {
                    Ok("PING") => {
                        if subscriber.send_line(b"PONG").await.is_err() {
                            break;
                        }
                    }
                    Ok("QUIT") => break,
                    _ => {}
                }
            }
        }
    }

    hub.remove(&subscriber);
    debug!(id = %subscriber.id(), "subscriber disconnected");
    Ok(())
}

#[cfg(test)]
#[path = "handler_test.rs"]
mod tests;
