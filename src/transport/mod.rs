//! Transport abstraction: USB, serial, and HTTP links share the packet
//! grammar in [`crate::proto::packet`]; each flavour's framing/sync quirks
//! live in its own module.
//!
//! Unlike a server that pipelines several outstanding calls per connection,
//! this dispatcher is strictly single-threaded per session and USB/serial
//! are lockstep request/response streams, so one task per link suffices.

pub mod http;
pub mod serial;
pub mod usb;

use std::sync::Arc;

use async_trait::async_trait;

use crate::dispatcher::Dispatcher;
use crate::session::Session;

/// One physical or logical connection to a single BBC, carrying framed
/// `(opcode, payload)` requests and responses (§4.1).
#[async_trait]
pub trait Link: Send {
    /// Identifies the session this link belongs to: a USB serial number, a
    /// serial port path, or (for HTTP, handled separately) a sender id.
    fn session_id(&self) -> &str;

    /// Reads the next complete request. `Ok(None)` means the link closed
    /// cleanly; link-internal resync (serial) is handled transparently and
    /// never surfaces here.
    async fn read_request(&mut self) -> std::io::Result<Option<(u8, Vec<u8>)>>;

    async fn write_response(&mut self, opcode: u8, payload: &[u8]) -> std::io::Result<()>;
}

/// Services one link to completion: read a request, dispatch it, write the
/// response, repeat (§4.2 "single-threaded per session").
pub async fn serve_link(mut link: impl Link, dispatcher: Arc<Dispatcher>) {
    let session_id = link.session_id().to_owned();
    tracing::info!(session_id, "link established");
    let mut session = Session::new();

    loop {
        let (opcode, payload) = match link.read_request().await {
            Ok(Some(request)) => request,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(session_id, %err, "link read failed");
                break;
            }
        };
        let (resp_opcode, resp_payload) = dispatcher.dispatch(&mut session, opcode, &payload).await;
        if let Err(err) = link.write_response(resp_opcode, &resp_payload).await {
            tracing::warn!(session_id, %err, "link write failed");
            break;
        }
    }

    tracing::info!(session_id, "link closed");
}
