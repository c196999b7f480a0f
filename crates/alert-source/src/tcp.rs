//! TCP JSON-Lines Listener

use chrono::Utc;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::payload::decode_alert;
use crate::{AlertSource, SourceError, SourceEvent};

/// Longest accepted alert line, newline included
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Pause after a failed accept, e.g. when out of file descriptors
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts connections and reads one JSON alert per line
pub struct TcpJsonSource {
    listen_addr: String,
}

impl TcpJsonSource {
    pub fn new(listen_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
        }
    }

    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }
}

#[async_trait::async_trait]
impl AlertSource for TcpJsonSource {
    async fn run(&self, events: mpsc::Sender<SourceEvent>) -> Result<(), SourceError> {
        let listener = TcpListener::bind(&self.listen_addr)
            .await
            .map_err(|source| SourceError::Bind {
                addr: self.listen_addr.clone(),
                source,
            })?;
        let local = listener.local_addr()?;
        info!("Alert listener bound to {}", local);

        if events
            .send(SourceEvent::Ready {
                endpoint: local.to_string(),
            })
            .await
            .is_err()
        {
            return Ok(());
        }

        loop {
            tokio::select! {
                _ = events.closed() => {
                    info!("Alert consumer closed, stopping listener on {}", local);
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("Accepted alert connection from {}", peer);
                        tokio::spawn(read_connection(stream, peer, events.clone()));
                    }
                    Err(e) => {
                        warn!("Failed to accept alert connection: {}", e);
                        let _ = events
                            .send(SourceEvent::Warning(format!("accept failed: {}", e)))
                            .await;
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }
    }
}

enum Line {
    Complete,
    TooLong,
    Eof,
}

/// Read one `\n`-terminated line into `buf`, at most [`MAX_LINE_BYTES`]
///
/// An oversized line is discarded up to and including its newline.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Line>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let read = (&mut *reader)
        .take(MAX_LINE_BYTES as u64)
        .read_until(b'\n', buf)
        .await?;

    if read == 0 {
        return Ok(Line::Eof);
    }
    if buf.last() == Some(&b'\n') || read < MAX_LINE_BYTES {
        return Ok(Line::Complete);
    }

    loop {
        let (consumed, done) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(Line::TooLong);
            }
            match available.iter().position(|b| *b == b'\n') {
                Some(end) => (end + 1, true),
                None => (available.len(), false),
            }
        };
        reader.consume(consumed);
        if done {
            return Ok(Line::TooLong);
        }
    }
}

async fn read_connection(stream: TcpStream, peer: SocketAddr, events: mpsc::Sender<SourceEvent>) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();

    loop {
        let event = match read_line(&mut reader, &mut buf).await {
            Ok(Line::Complete) => {
                let line = String::from_utf8_lossy(&buf);
                if line.trim().is_empty() {
                    continue;
                }
                match decode_alert(&line, Utc::now()) {
                    Ok(alert) => SourceEvent::Alert(alert),
                    Err(e) => SourceEvent::Warning(format!("{}: {}", peer, e)),
                }
            }
            Ok(Line::TooLong) => {
                warn!("Discarding line over {} bytes from {}", MAX_LINE_BYTES, peer);
                SourceEvent::Warning(format!(
                    "{}: line exceeds {} bytes, discarded",
                    peer, MAX_LINE_BYTES
                ))
            }
            Ok(Line::Eof) => {
                debug!("Alert connection from {} closed", peer);
                return;
            }
            Err(e) => {
                warn!("Read from {} failed: {}", peer, e);
                let _ = events
                    .send(SourceEvent::Warning(format!("{}: read failed: {}", peer, e)))
                    .await;
                return;
            }
        };

        if events.send(event).await.is_err() {
            return;
        }
    }
}
