//! WebSocket ingest endpoint for the streaming microphone.
//!
//! One session per accepted connection. The handler binds the output file
//! before the upgrade completes, so a failed handshake still truncates the
//! previous session's data; the device fleet is assumed to be a single board
//! reconnecting, not concurrent writers.

use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use actix::prelude::*;
use actix_http::ws::Item;
use actix_web::error::PayloadError;
use actix_web::http::header;
use actix_web::web::Bytes;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use futures_util::Stream;

use crate::config::ListenConfig;
use crate::sink::FrameSink;

/// Protocol-level cap on a single frame. The board sends I2S chunks of a few
/// KiB; this is never reached in practice.
const MAX_FRAME_BYTES: usize = 100 * 1024 * 1024;

/// One upgraded connection: owns the transport context and the output file
/// until the read loop ends for any reason.
pub struct IngestSession {
    sink: FrameSink,
    peer: Option<SocketAddr>,
    /// Accumulated size of an in-progress fragmented binary message; `None`
    /// while no binary fragmentation is in flight.
    fragment_bytes: Option<u64>,
}

impl IngestSession {
    fn new(sink: FrameSink, peer: Option<SocketAddr>) -> Self {
        Self {
            sink,
            peer,
            fragment_bytes: None,
        }
    }

    fn append(&mut self, payload: &[u8], ctx: &mut ws::WebsocketContext<Self>) {
        if let Err(e) = self.sink.append(payload) {
            tracing::error!(peer = ?self.peer, error = %e, "write to output file failed; closing session");
            ctx.stop();
        }
    }
}

impl Actor for IngestSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(peer = ?self.peer, "device connected");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            peer = ?self.peer,
            bytes = self.sink.bytes_written(),
            "session closed"
        );
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for IngestSession {
    fn handle(&mut self, item: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let msg = match item {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(peer = ?self.peer, error = %e, "read error");
                ctx.stop();
                return;
            }
        };
        match msg {
            ws::Message::Binary(bytes) => {
                tracing::info!(peer = ?self.peer, bytes = bytes.len(), "audio frame");
                self.append(&bytes, ctx);
            }
            // Non-binary payloads are persisted too, just not counted as audio.
            ws::Message::Text(text) => self.append(text.as_bytes(), ctx),
            // Fragmented messages are appended part by part; a binary one is
            // counted across its parts and logged as one reassembled frame.
            ws::Message::Continuation(part) => match part {
                Item::FirstBinary(bytes) => {
                    self.fragment_bytes = Some(bytes.len() as u64);
                    self.append(&bytes, ctx);
                }
                Item::FirstText(bytes) => {
                    self.fragment_bytes = None;
                    self.append(&bytes, ctx);
                }
                Item::Continue(bytes) => {
                    if let Some(total) = self.fragment_bytes.as_mut() {
                        *total += bytes.len() as u64;
                    }
                    self.append(&bytes, ctx);
                }
                Item::Last(bytes) => {
                    if let Some(total) = self.fragment_bytes.take() {
                        let total = total + bytes.len() as u64;
                        tracing::info!(peer = ?self.peer, bytes = total, "audio frame");
                    }
                    self.append(&bytes, ctx);
                }
            },
            ws::Message::Ping(bytes) => ctx.pong(&bytes),
            ws::Message::Pong(_) => {}
            ws::Message::Close(reason) => {
                tracing::info!(peer = ?self.peer, reason = ?reason, "device disconnected");
                ctx.stop();
            }
            ws::Message::Nop => {}
        }
    }
}

/// Payload wrapper that turns a transport error into end-of-stream.
///
/// An abrupt disconnect surfaces as a payload error, and the websocket stream
/// discards any bytes it has buffered when one propagates; ending the stream
/// instead lets frames that arrived ahead of the disconnect decode and reach
/// the session before it stops. Transport EOF is an orderly end here, the
/// same way the connection close is.
struct DrainingPayload {
    inner: web::Payload,
    peer: Option<SocketAddr>,
}

impl Stream for DrainingPayload {
    type Item = Result<Bytes, PayloadError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Err(e))) => {
                tracing::warn!(peer = ?self.peer, error = %e, "read error");
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

/// Catch-all upgrade handler.
///
/// Ordering matters here: the output file is created (truncating any previous
/// session's bytes) before the handshake is attempted.
pub async fn ingest_ws(
    req: HttpRequest,
    stream: web::Payload,
    cfg: web::Data<ListenConfig>,
) -> Result<HttpResponse, Error> {
    let sink = FrameSink::create(&cfg.output).map_err(|e| {
        tracing::error!(path = %cfg.output.display(), error = %e, "open output file failed");
        actix_web::error::ErrorInternalServerError("output file unavailable")
    })?;

    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok());
    if !cfg.origin_allowed(origin) {
        tracing::warn!(peer = ?req.peer_addr(), origin = ?origin, "origin rejected");
        return Err(actix_web::error::ErrorForbidden("origin not allowed"));
    }

    let peer = req.peer_addr();
    let payload = DrainingPayload {
        inner: stream,
        peer,
    };
    match ws::WsResponseBuilder::new(IngestSession::new(sink, peer), &req, payload)
        .frame_size(MAX_FRAME_BYTES)
        .start()
    {
        Ok(resp) => Ok(resp),
        Err(e) => {
            tracing::warn!(peer = ?peer, error = %e, "websocket upgrade failed");
            Err(e)
        }
    }
}
