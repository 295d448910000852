//! Upstream SSE → [`StreamEvent`] translation.
//!
//! The upstream body is consumed chunk by chunk; complete lines are parsed as
//! soon as they arrive so the first delta is forwarded without waiting for the
//! rest of the answer. Dropping the returned stream drops the upstream body,
//! which releases the connection.

use std::fmt::Display;

use futures::Stream;
use tokio_stream::StreamExt;
use tracing::{debug, trace, warn};

use crate::types::StreamEvent;

/// Prefix of every meaningful SSE line.
pub const DATA_PREFIX: &str = "data: ";
/// Literal end-of-stream marker.
pub const DONE_SENTINEL: &str = "[DONE]";
/// Longest line kept while waiting for its terminator. Longer lines are
/// dropped whole, like any other unparseable frame.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Accumulates raw bytes and hands out complete lines.
///
/// Splitting happens on bytes, so a multi-byte character cut in half by the
/// transport is only decoded once both halves are buffered.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
    /// Inside an oversized line; everything up to the next `\n` is dropped.
    discarding: bool,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) {
        let mut chunk = chunk;
        if self.discarding {
            match chunk.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    self.discarding = false;
                    chunk = &chunk[end + 1..];
                }
                None => return,
            }
        }
        self.buf.extend_from_slice(chunk);

        let pending = match self.buf.iter().rposition(|&b| b == b'\n') {
            Some(end) => self.buf.len() - end - 1,
            None => self.buf.len(),
        };
        if pending > MAX_LINE_BYTES {
            warn!("Dropping upstream line longer than {} bytes", MAX_LINE_BYTES);
            self.buf.truncate(self.buf.len() - pending);
            self.discarding = true;
        }
    }

    /// Next complete line without its terminator (`\n` or `\r\n`).
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.buf.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Whatever is left once the body has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        let text = String::from_utf8_lossy(&rest);
        Some(text.trim_end_matches('\r').to_string())
    }
}

/// Interpret one upstream line.
///
/// Returns `None` for anything that should be invisible to the client: blank
/// lines, non-data lines, unparseable JSON, and payloads without an answer.
pub fn parse_line(line: &str) -> Option<StreamEvent> {
    if line.trim().is_empty() {
        return None;
    }
    let data = line.strip_prefix(DATA_PREFIX)?;
    if data.trim() == DONE_SENTINEL {
        return Some(StreamEvent::Done);
    }

    let parsed: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            trace!("Skipping malformed frame: {}", e);
            return None;
        }
    };

    match parsed.get("answer").and_then(|a| a.as_str()) {
        Some(answer) if !answer.is_empty() => Some(StreamEvent::Delta(answer.to_string())),
        _ => None,
    }
}

/// Turn an upstream byte stream into ordered stream events.
///
/// Always ends with exactly one terminal event: `Done` for the sentinel or a
/// clean end of body, `Error` for a transport failure. Nothing follows it.
pub fn relay<S, B, E>(body: S) -> impl Stream<Item = StreamEvent> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    async_stream::stream! {
        tokio::pin!(body);
        let mut lines = LineBuffer::default();
        let mut deltas = 0usize;

        while let Some(chunk) = body.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(e) => {
                    yield StreamEvent::Error(format!("Stream read error: {}", e));
                    return;
                }
            };
            lines.push(bytes.as_ref());

            while let Some(line) = lines.next_line() {
                match parse_line(&line) {
                    Some(StreamEvent::Delta(text)) => {
                        deltas += 1;
                        yield StreamEvent::Delta(text);
                    }
                    Some(_) => {
                        debug!("Upstream sent end-of-stream after {} deltas", deltas);
                        yield StreamEvent::Done;
                        return;
                    }
                    None => {}
                }
            }
        }

        // Body closed without the sentinel; a trailing unterminated line still counts.
        if let Some(line) = lines.finish() {
            if let Some(StreamEvent::Delta(text)) = parse_line(&line) {
                deltas += 1;
                yield StreamEvent::Delta(text);
            }
        }
        debug!("Upstream closed after {} deltas", deltas);
        yield StreamEvent::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(chunks: Vec<&'static str>) -> Vec<StreamEvent> {
        let body = futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, std::io::Error>(c.as_bytes().to_vec())),
        );
        relay(body).collect().await
    }

    fn delta(s: &str) -> StreamEvent {
        StreamEvent::Delta(s.to_string())
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   "), None);
        assert_eq!(parse_line(": keep-alive"), None);
        assert_eq!(parse_line("event: message"), None);
        assert_eq!(parse_line("data: [DONE]"), Some(StreamEvent::Done));
        assert_eq!(parse_line("data: [DONE]  "), Some(StreamEvent::Done));
        assert_eq!(parse_line(r#"data: {"answer":"Hi"}"#), Some(delta("Hi")));
        assert_eq!(parse_line(r#"data: {"answer":""}"#), None);
        assert_eq!(parse_line(r#"data: {"event":"message_end"}"#), None);
        assert_eq!(parse_line(r#"data: {"answer":"#), None);
        // Prefix must include the space
        assert_eq!(parse_line(r#"data:{"answer":"Hi"}"#), None);
    }

    #[test]
    fn test_line_buffer_split_chunks() {
        let mut buf = LineBuffer::default();
        buf.push(b"data: {\"ans");
        assert_eq!(buf.next_line(), None);
        buf.push(b"wer\":\"x\"}\r\n\ndata: ");
        assert_eq!(buf.next_line().as_deref(), Some("data: {\"answer\":\"x\"}"));
        assert_eq!(buf.next_line().as_deref(), Some(""));
        assert_eq!(buf.next_line(), None);
        assert_eq!(buf.finish().as_deref(), Some("data: "));
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn test_line_buffer_drops_oversized_line() {
        let mut buf = LineBuffer::default();
        buf.push(b"data: {\"answer\":\"kept\"}\ndata: ");
        buf.push(&vec![b'x'; MAX_LINE_BYTES]);
        // Still within an oversized line: dropped until its terminator.
        buf.push(b"more");
        buf.push(b"tail\ndata: {\"answer\":\"after\"}\n");

        assert_eq!(
            parse_line(&buf.next_line().unwrap()),
            Some(delta("kept"))
        );
        assert_eq!(
            parse_line(&buf.next_line().unwrap()),
            Some(delta("after"))
        );
        assert_eq!(buf.next_line(), None);
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn test_line_buffer_split_multibyte() {
        let line = "data: {\"answer\":\"こんにちは\"}\n".as_bytes();
        // Cut inside the first multi-byte character
        let cut = line.iter().position(|&b| b >= 0x80).unwrap() + 1;

        let mut buf = LineBuffer::default();
        buf.push(&line[..cut]);
        assert_eq!(buf.next_line(), None);
        buf.push(&line[cut..]);
        assert_eq!(
            parse_line(&buf.next_line().unwrap()),
            Some(delta("こんにちは"))
        );
    }

    #[tokio::test]
    async fn test_relay_basic_sequence() {
        let events = collect(vec![
            "data: {\"answer\":\"Hi\"}\n\n",
            "data: {\"answer\":\" there\"}\n\n",
            "data: [DONE]\n\n",
        ])
        .await;
        assert_eq!(events, vec![delta("Hi"), delta(" there"), StreamEvent::Done]);
    }

    #[tokio::test]
    async fn test_relay_ignores_lines_after_sentinel() {
        let events = collect(vec![
            "data: {\"answer\":\"a\"}\n\ndata: [DONE]\n\ndata: {\"answer\":\"b\"}\n\n",
            "data: {\"answer\":\"c\"}\n\n",
        ])
        .await;
        assert_eq!(events, vec![delta("a"), StreamEvent::Done]);
    }

    #[tokio::test]
    async fn test_relay_skips_noise_and_malformed() {
        let events = collect(vec![
            ": ping\n\n",
            "event: message\n",
            "data: {\"answer\":\"one\"}\n\n",
            "data: {not json}\n\n",
            "\n\n",
            "data: {\"answer\":\"two\"}\n\n",
        ])
        .await;
        assert_eq!(events, vec![delta("one"), delta("two"), StreamEvent::Done]);
    }

    #[tokio::test]
    async fn test_relay_close_without_sentinel() {
        let events = collect(vec!["data: {\"answer\":\"a\"}\n\n", "data: {\"answer\":\"b\"}"]).await;
        assert_eq!(events, vec![delta("a"), delta("b"), StreamEvent::Done]);

        let events = collect(vec![]).await;
        assert_eq!(events, vec![StreamEvent::Done]);
    }

    #[tokio::test]
    async fn test_relay_transport_error_is_terminal() {
        let body = futures::stream::iter(vec![
            Ok(b"data: {\"answer\":\"a\"}\n\n".to_vec()),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
            Ok(b"data: {\"answer\":\"b\"}\n\n".to_vec()),
        ]);
        let events: Vec<StreamEvent> = relay(body).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], delta("a"));
        assert!(matches!(&events[1], StreamEvent::Error(msg) if msg.contains("reset")));
    }
}
