//! The engine's single inbound event channel (component C). Per-stream
//! reader tasks do their own line-splitting (via [`crate::linebuf::LineBuffer`])
//! and forward discrete events here; the control loop is the only consumer
//! and the only place slot/registry state is mutated.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

use crate::analyzer::AnalyzedStream;
use crate::linebuf::LineBuffer;
use crate::linebuf::LineEvent;

#[derive(Debug)]
pub enum EngineEvent {
    Output { slot: usize, stream: AnalyzedStream, item: LineEvent },
    StreamEof { slot: usize, stream: AnalyzedStream },
}

/// Spawn the reader task for one child stream. Reads until EOF, line-splits
/// locally, and forwards each line (plus a final truncation/flush and an EOF
/// marker) to `tx`.
pub fn spawn_reader<R>(slot: usize, stream: AnalyzedStream, mut reader: R, tx: mpsc::UnboundedSender<EngineEvent>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; 8192];
        let mut lb = LineBuffer::new();
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    for item in lb.push(&buf[..n]) {
                        if tx.send(EngineEvent::Output { slot, stream, item }).is_err() {
                            return;
                        }
                    }
                }
                Err(_) => break,
            }
        }
        if let Some(item) = lb.flush() {
            let _ = tx.send(EngineEvent::Output { slot, stream, item });
        }
        let _ = tx.send(EngineEvent::StreamEof { slot, stream });
    });
}
