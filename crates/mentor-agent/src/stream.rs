use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use crate::types::StreamChunk;
use crate::Result;

// ─── StreamDecoder ────────────────────────────────────────────────────────

/// Incremental decoder for the mentor's line-delimited `data:` stream.
///
/// Bytes are buffered until a newline arrives, so a line split across
/// network chunks (including one split inside a multi-byte character) is
/// decoded once it is whole. Blank lines and `:` comments are skipped;
/// `data: [DONE]` ends the stream. A `data:` line whose JSON does not parse
/// is skipped and decoding continues with the next line.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
    done: bool,
}

enum Line {
    Fragment(String),
    Done,
    Skip,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` once `data: [DONE]` has been seen. Later input is ignored.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one network chunk; returns the content fragments it completed,
    /// in arrival order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut out = Vec::new();
        if self.done {
            return out;
        }
        self.buffer.extend_from_slice(chunk);
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            match decode_line(&raw[..raw.len() - 1]) {
                Line::Fragment(text) => out.push(text),
                Line::Done => {
                    self.done = true;
                    self.buffer.clear();
                    break;
                }
                Line::Skip => {}
            }
        }
        out
    }

    /// Decode whatever is left when the connection closes without a final
    /// newline.
    pub fn finish(&mut self) -> Vec<String> {
        if self.done || self.buffer.is_empty() {
            return Vec::new();
        }
        let raw = std::mem::take(&mut self.buffer);
        self.done = true;
        match decode_line(&raw) {
            Line::Fragment(text) => vec![text],
            Line::Done | Line::Skip => Vec::new(),
        }
    }
}

fn decode_line(raw: &[u8]) -> Line {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() || line.starts_with(':') {
        return Line::Skip;
    }
    let Some(payload) = line.strip_prefix("data:") else {
        // `event:` / `id:` / `retry:` fields carry nothing we use.
        return Line::Skip;
    };
    let payload = payload.trim_start();
    if payload == "[DONE]" {
        return Line::Done;
    }
    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => match chunk.content() {
            Some(text) if !text.is_empty() => Line::Fragment(text),
            _ => Line::Skip,
        },
        Err(e) => {
            tracing::debug!(error = %e, line = %payload, "skipping malformed stream line");
            Line::Skip
        }
    }
}

// ─── MentorStream ─────────────────────────────────────────────────────────

/// An async stream of content fragments from one mentor response.
///
/// A background task owns the HTTP response body, decodes it and forwards
/// fragments over a Tokio mpsc channel. Dropping `MentorStream` closes the
/// receiver; the task exits on its next send and drops the connection.
pub struct MentorStream {
    rx: mpsc::Receiver<Result<String>>,
}

impl MentorStream {
    pub(crate) fn new(response: reqwest::Response) -> Self {
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut decoder = StreamDecoder::new();

            while let Some(chunk) = body.next().await {
                let bytes = match chunk {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx.send(Err(e.into())).await;
                        return;
                    }
                };
                for fragment in decoder.feed(&bytes) {
                    if tx.send(Ok(fragment)).await.is_err() {
                        return; // Receiver dropped
                    }
                }
                if decoder.is_done() {
                    return;
                }
            }

            tracing::debug!("mentor stream closed without [DONE]");
            for fragment in decoder.finish() {
                if tx.send(Ok(fragment)).await.is_err() {
                    return;
                }
            }
        });

        Self { rx }
    }
}

impl Stream for MentorStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(chunks: &[&str]) -> (String, bool) {
        let mut decoder = StreamDecoder::new();
        let mut text = String::new();
        for chunk in chunks {
            for fragment in decoder.feed(chunk.as_bytes()) {
                text.push_str(&fragment);
            }
        }
        (text, decoder.is_done())
    }

    #[test]
    fn concatenates_fragments_until_done() {
        let (text, done) = feed_all(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n",
            "data: [DONE]\n",
        ]);
        assert_eq!(text, "Hi there");
        assert!(done);
    }

    #[test]
    fn line_split_across_chunks() {
        let (text, _) = feed_all(&[
            "data: {\"choices\":[{\"del",
            "ta\":{\"content\":\"Hel",
            "lo\"}}]}\n\ndata: [DO",
            "NE]\n",
        ]);
        assert_eq!(text, "Hello");
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"café\"}}]}\n";
        let bytes = line.as_bytes();
        let split = line.find('é').unwrap() + 1;
        let mut decoder = StreamDecoder::new();
        assert!(decoder.feed(&bytes[..split]).is_empty());
        assert_eq!(decoder.feed(&bytes[split..]), vec!["café".to_string()]);
    }

    #[test]
    fn skips_blank_comment_and_malformed_lines() {
        let (text, done) = feed_all(&[
            ": keep-alive\n",
            "\n",
            "event: message\n",
            "data: {not json}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n",
            "data: [DONE]\n",
        ]);
        assert_eq!(text, "ok");
        assert!(done);
    }

    #[test]
    fn crlf_line_endings() {
        let (text, done) = feed_all(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\r\n",
            "data: [DONE]\r\n",
        ]);
        assert_eq!(text, "a");
        assert!(done);
    }

    #[test]
    fn input_after_done_is_ignored() {
        let (text, _) = feed_all(&[
            "data: [DONE]\ndata: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n",
        ]);
        assert_eq!(text, "");
    }

    #[test]
    fn role_only_deltas_add_nothing() {
        let (text, _) = feed_all(&["data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n"]);
        assert_eq!(text, "");
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut decoder = StreamDecoder::new();
        assert!(decoder
            .feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}")
            .is_empty());
        assert_eq!(decoder.finish(), vec!["tail".to_string()]);
        assert!(decoder.finish().is_empty());
    }
}
