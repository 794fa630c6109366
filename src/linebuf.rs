//! Byte-chunk-to-line demultiplexing, independent of any process or channel.
//!
//! A [`LineBuffer`] holds at most one unterminated trailing fragment. Feeding
//! it a chunk of bytes yields zero or more [`LineEvent`]s; a fragment that
//! grows past [`MAX_RESIDUE`] without a newline is flushed as a truncated line
//! so a single runaway write can never grow memory without bound.

/// Lines longer than this are flushed without waiting for a terminator.
pub const MAX_RESIDUE: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// A complete, newline-terminated line (the newline is stripped).
    Line(String),
    /// A fragment flushed because it exceeded [`MAX_RESIDUE`] before a newline arrived.
    Truncated(String),
}

#[derive(Debug, Default)]
pub struct LineBuffer {
    residue: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning the complete lines and any truncation
    /// events produced. Call [`Self::flush`] at stream EOF to emit a final
    /// trailing fragment, if any.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<LineEvent> {
        let mut events = Vec::new();
        let mut start = 0;
        for (i, &b) in chunk.iter().enumerate() {
            if b == b'\n' {
                self.residue.extend_from_slice(&chunk[start..i]);
                events.push(LineEvent::Line(strip_cr(&self.residue)));
                self.residue.clear();
                start = i + 1;
            }
        }
        self.residue.extend_from_slice(&chunk[start..]);
        while self.residue.len() > MAX_RESIDUE {
            let tail = self.residue.split_off(MAX_RESIDUE);
            let flushed = std::mem::replace(&mut self.residue, tail);
            events.push(LineEvent::Truncated(String::from_utf8_lossy(&flushed).into_owned()));
        }
        events
    }

    /// Flush any remaining residue as a final (non-truncated) line, used at EOF.
    pub fn flush(&mut self) -> Option<LineEvent> {
        if self.residue.is_empty() {
            None
        } else {
            let residue = std::mem::take(&mut self.residue);
            Some(LineEvent::Line(strip_cr(&residue)))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.residue.is_empty()
    }
}

fn strip_cr(bytes: &[u8]) -> String {
    let s = String::from_utf8_lossy(bytes);
    s.strip_suffix('\r').map(str::to_string).unwrap_or_else(|| s.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_chunk_multiple_lines() {
        let mut buf = LineBuffer::new();
        let events = buf.push(b"one\ntwo\nthree");
        assert_eq!(
            events,
            vec![LineEvent::Line("one".into()), LineEvent::Line("two".into())]
        );
        assert_eq!(buf.flush(), Some(LineEvent::Line("three".into())));
    }

    #[test]
    fn split_across_chunks() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"hel").is_empty());
        assert!(buf.push(b"lo wor").is_empty());
        let events = buf.push(b"ld\n");
        assert_eq!(events, vec![LineEvent::Line("hello world".into())]);
    }

    #[test]
    fn crlf_is_stripped() {
        let mut buf = LineBuffer::new();
        let events = buf.push(b"hi\r\n");
        assert_eq!(events, vec![LineEvent::Line("hi".into())]);
    }

    #[test]
    fn exact_boundary_does_not_truncate() {
        let mut buf = LineBuffer::new();
        let chunk = vec![b'x'; MAX_RESIDUE];
        assert!(buf.push(&chunk).is_empty());
        assert!(!buf.is_empty());
    }

    #[test]
    fn residue_past_limit_is_truncated() {
        let mut buf = LineBuffer::new();
        let chunk = vec![b'x'; MAX_RESIDUE + 1];
        let events = buf.push(&chunk);
        assert_eq!(events.len(), 1);
        match &events[0] {
            LineEvent::Truncated(s) => assert_eq!(s.len(), MAX_RESIDUE),
            other => panic!("expected Truncated, got {other:?}"),
        }
        assert_eq!(buf.flush(), Some(LineEvent::Line("x".into())));
    }

    #[test]
    fn empty_push_is_noop() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"").is_empty());
        assert!(buf.flush().is_none());
    }
}
