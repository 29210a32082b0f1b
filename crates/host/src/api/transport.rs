// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-lines-over-TCP adapter for the north-bound API.
//!
//! One frame per line. Each accepted connection gets a reader task
//! feeding the run loop's event channel and a writer fed from a per
//! connection outbound channel. The engine never blocks on the socket;
//! a connection that cannot keep up is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vdcapi::frames::Frame;

/// Events the transport feeds into the run loop.
#[derive(Debug)]
pub enum TransportEvent {
    Connected { connection_id: u64 },
    Frame { connection_id: u64, frame: Frame },
    Disconnected { connection_id: u64 },
}

/// Outbound channels per connection, shared with the run loop.
pub type WriterMap = Arc<Mutex<HashMap<u64, mpsc::Sender<String>>>>;

/// Accept loop; runs until cancelled.
pub async fn serve(
    listener: TcpListener,
    events: mpsc::Sender<TransportEvent>,
    writers: WriterMap,
    shutdown: CancellationToken,
) {
    let next_id = Arc::new(AtomicU64::new(1));
    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        let (stream, peer) = match accepted {
            Ok(pair) => pair,
            Err(err) => {
                warn!(%err, "accept failed");
                continue;
            }
        };
        let connection_id = next_id.fetch_add(1, Ordering::Relaxed);
        info!(connection_id, %peer, "api connection");
        let (out_tx, mut out_rx) = mpsc::channel::<String>(64);
        writers.lock().await.insert(connection_id, out_tx);
        if events.send(TransportEvent::Connected { connection_id }).await.is_err() {
            break;
        }
        let events = events.clone();
        let writers = writers.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    outgoing = out_rx.recv() => {
                        match outgoing {
                            Some(mut line) => {
                                line.push('\n');
                                if write_half.write_all(line.as_bytes()).await.is_err() {
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                    read = lines.next_line() => {
                        match read {
                            Ok(Some(line)) => {
                                let line = line.trim();
                                if line.is_empty() {
                                    continue;
                                }
                                match serde_json::from_str::<Frame>(line) {
                                    Ok(frame) => {
                                        if events
                                            .send(TransportEvent::Frame { connection_id, frame })
                                            .await
                                            .is_err()
                                        {
                                            break;
                                        }
                                    }
                                    Err(err) => {
                                        debug!(connection_id, %err, "unparseable frame dropped");
                                    }
                                }
                            }
                            Ok(None) | Err(_) => break,
                        }
                    }
                }
            }
            writers.lock().await.remove(&connection_id);
            let _ = events.send(TransportEvent::Disconnected { connection_id }).await;
            debug!(connection_id, "api connection closed");
        });
    }
}
