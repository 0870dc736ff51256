//! Newline-delimited JSON framing for the chat stream.
//!
//! `POST /chat/` answers with one protocol record per line and no end-of-stream
//! sentinel beyond the transport closing.  [`LineBuffer`] does the framing:
//! bytes go in as they arrive, complete lines come out, and a trailing partial
//! line waits for the next chunk.  Framing happens on bytes, so a multi-byte
//! character split across chunks is decoded only once its line is complete.
//! [`classify_line`] turns one line into a [`LineOutcome`], and
//! [`process_ndjson`] glues both onto a response body.

use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::observability::{STREAM_BYTES, STREAM_LINES};
use crate::types::{ProtocolRecord, Turn};
use crate::{Error, Result};

/// A response body as a stream of byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Accumulates bytes and splits them into complete lines.
#[derive(Debug, Default, Clone)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every line it completed, without the
    /// terminating `\n` (or `\r\n`).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(chunk);
        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };
        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);
        complete[..last_newline]
            .split(|b| *b == b'\n')
            .map(strip_carriage_return)
            .collect()
    }

    /// Takes the unterminated remainder, if any, leaving the buffer empty.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(strip_carriage_return(&std::mem::take(&mut self.pending)))
        }
    }

    /// Bytes held back waiting for a newline.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }
}

fn strip_carriage_return(line: &[u8]) -> Vec<u8> {
    line.strip_suffix(b"\r").unwrap_or(line).to_vec()
}

/// What a single line of the stream amounted to.
#[derive(Debug, Clone)]
pub enum LineOutcome {
    /// An empty or whitespace-only line.
    Blank,

    /// A `request` or `response` record, as a turn.
    Turn(Turn),

    /// A well-formed record of a kind this client does not display.
    Ignored {
        /// The record's kind, if it had one.
        kind: Option<String>,
    },

    /// A line that is not valid UTF-8 JSON.
    Malformed {
        /// Why the line was rejected.
        error: Error,
        /// The offending line, lossily decoded.
        line: String,
    },
}

/// Classifies one line of the stream.
pub fn classify_line(line: &[u8]) -> LineOutcome {
    STREAM_LINES.click();
    let text = match std::str::from_utf8(line) {
        Ok(text) => text,
        Err(err) => {
            return LineOutcome::Malformed {
                error: err.into(),
                line: String::from_utf8_lossy(line).into_owned(),
            };
        }
    };
    let text = text.trim();
    if text.is_empty() {
        return LineOutcome::Blank;
    }
    match ProtocolRecord::parse(text) {
        Ok(record) => {
            let kind = record.kind().map(str::to_string);
            match record.into_turn() {
                Some(turn) => LineOutcome::Turn(turn),
                None => LineOutcome::Ignored { kind },
            }
        }
        Err(error) => LineOutcome::Malformed {
            error,
            line: text.to_string(),
        },
    }
}

/// Line framing plus classification, fed one chunk at a time.
#[derive(Debug, Default, Clone)]
pub struct TurnDecoder {
    lines: LineBuffer,
}

impl TurnDecoder {
    /// Creates a decoder with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk; returns the outcomes of every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<LineOutcome> {
        self.lines
            .push(chunk)
            .iter()
            .map(|line| classify_line(line))
            .collect()
    }

    /// Classifies the unterminated remainder at end of stream.
    pub fn finish(&mut self) -> Option<LineOutcome> {
        self.lines.finish().map(|line| classify_line(&line))
    }
}

/// Process a stream of bytes into a stream of line outcomes.
///
/// A transport error is yielded once and ends the stream; whatever partial
/// line was buffered at that point is dropped.
pub fn process_ndjson<S>(byte_stream: S) -> impl Stream<Item = Result<LineOutcome>>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    let state = (byte_stream, TurnDecoder::new(), VecDeque::new(), false);
    stream::unfold(
        state,
        |(mut stream, mut decoder, mut ready, mut done)| async move {
            loop {
                if let Some(outcome) = ready.pop_front() {
                    return Some((Ok(outcome), (stream, decoder, ready, done)));
                }
                if done {
                    return None;
                }
                match stream.next().await {
                    Some(Ok(bytes)) => {
                        STREAM_BYTES.count(bytes.len() as u64);
                        ready.extend(decoder.push(&bytes));
                    }
                    Some(Err(e)) => {
                        done = true;
                        return Some((Err(e), (stream, decoder, ready, done)));
                    }
                    None => {
                        done = true;
                        ready.extend(decoder.finish());
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Part, Role};

    const HI_HELLO: &[u8] = b"{\"kind\":\"request\",\"parts\":[{\"part_kind\":\"text\",\"content\":\"hi\"}]}\n{\"kind\":\"response\",\"parts\":[{\"part_kind\":\"text\",\"content\":\"hello\"}]}\n";

    fn turns_of(outcomes: Vec<LineOutcome>) -> Vec<(Role, Vec<Part>)> {
        outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                LineOutcome::Turn(turn) => Some((turn.role, turn.parts)),
                _ => None,
            })
            .collect()
    }

    fn decode_chunks(chunks: &[&[u8]]) -> Vec<(Role, Vec<Part>)> {
        let mut decoder = TurnDecoder::new();
        let mut outcomes = Vec::new();
        for chunk in chunks {
            outcomes.extend(decoder.push(chunk));
        }
        outcomes.extend(decoder.finish());
        turns_of(outcomes)
    }

    #[test]
    fn line_buffer_retains_partial_line() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"abc").is_empty());
        assert_eq!(buffer.pending(), b"abc");
        assert_eq!(buffer.push(b"def\nghi"), vec![b"abcdef".to_vec()]);
        assert_eq!(buffer.pending(), b"ghi");
        assert_eq!(buffer.finish(), Some(b"ghi".to_vec()));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn line_buffer_splits_many_lines_and_crlf() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.push(b"one\r\n\ntwo\nthree\n");
        assert_eq!(
            lines,
            vec![b"one".to_vec(), Vec::new(), b"two".to_vec(), b"three".to_vec()]
        );
        assert!(buffer.pending().is_empty());
    }

    #[test]
    fn request_then_response() {
        let turns = decode_chunks(&[HI_HELLO]);
        assert_eq!(
            turns,
            vec![
                (Role::User, vec![Part::text("hi")]),
                (Role::Agent, vec![Part::text("hello")]),
            ]
        );
    }

    #[test]
    fn split_mid_line() {
        let turns = decode_chunks(&[b"{\"kind\":\"respo", b"nse\",\"parts\":[]}\n"]);
        assert_eq!(turns, vec![(Role::Agent, vec![])]);
    }

    #[test]
    fn chunk_boundaries_do_not_matter() {
        let expected = decode_chunks(&[HI_HELLO]);
        for i in 0..=HI_HELLO.len() {
            for j in i..=HI_HELLO.len() {
                let turns = decode_chunks(&[&HI_HELLO[..i], &HI_HELLO[i..j], &HI_HELLO[j..]]);
                assert_eq!(turns, expected, "split at {i}/{j}");
            }
        }
    }

    #[test]
    fn multibyte_characters_split_across_chunks() {
        let stream = "{\"kind\":\"response\",\"parts\":[{\"part_kind\":\"text\",\"content\":\"héllo ✓\"}]}\n";
        let bytes = stream.as_bytes();
        let expected = vec![(Role::Agent, vec![Part::text("héllo ✓")])];
        for i in 0..=bytes.len() {
            assert_eq!(decode_chunks(&[&bytes[..i], &bytes[i..]]), expected);
        }
    }

    #[test]
    fn blank_lines_contribute_nothing() {
        let mut decoder = TurnDecoder::new();
        let outcomes = decoder.push(
            b"{\"kind\":\"request\",\"parts\":[]}\n\n   \n{\"kind\":\"response\",\"parts\":[]}\n",
        );
        assert_eq!(outcomes.len(), 4);
        assert!(matches!(outcomes[1], LineOutcome::Blank));
        assert!(matches!(outcomes[2], LineOutcome::Blank));
        assert_eq!(turns_of(outcomes).len(), 2);
    }

    #[test]
    fn unhandled_kinds_are_ignored_and_decoding_continues() {
        let mut decoder = TurnDecoder::new();
        let outcomes = decoder.push(
            b"{\"parts\":[]}\n{\"kind\":\"tool\",\"parts\":[]}\n{\"kind\":\"response\",\"parts\":[]}\n",
        );
        assert!(matches!(&outcomes[0], LineOutcome::Ignored { kind: None }));
        assert!(
            matches!(&outcomes[1], LineOutcome::Ignored { kind: Some(kind) } if kind == "tool")
        );
        assert_eq!(turns_of(outcomes), vec![(Role::Agent, vec![])]);
    }

    #[test]
    fn malformed_lines_are_reported_and_skipped() {
        let mut decoder = TurnDecoder::new();
        let outcomes = decoder.push(b"what is the weather?\n\xff\xfe\n{\"kind\":\"request\"}\n");
        assert!(
            matches!(&outcomes[0], LineOutcome::Malformed { line, .. } if line == "what is the weather?")
        );
        assert!(matches!(
            &outcomes[1],
            LineOutcome::Malformed {
                error: Error::Encoding { .. },
                ..
            }
        ));
        assert_eq!(turns_of(outcomes), vec![(Role::User, vec![])]);
    }

    #[test]
    fn unterminated_final_line_is_flushed() {
        let turns = decode_chunks(&[b"{\"kind\":\"response\",\"parts\":[]}"]);
        assert_eq!(turns, vec![(Role::Agent, vec![])]);
    }

    #[tokio::test]
    async fn process_stream_in_order() {
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(&HI_HELLO[..10])),
            Ok(Bytes::from_static(&HI_HELLO[10..])),
        ];
        let outcomes: Vec<_> = process_ndjson(stream::iter(chunks)).collect().await;
        let outcomes: Vec<LineOutcome> = outcomes.into_iter().map(|o| o.unwrap()).collect();
        assert_eq!(turns_of(outcomes).len(), 2);
    }

    #[tokio::test]
    async fn transport_error_ends_stream() {
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"{\"kind\":\"request\",\"parts\":[]}\n{\"kind\":")),
            Err(Error::streaming("connection reset", None)),
            Ok(Bytes::from_static(b"\"response\"}\n")),
        ];
        let mut outcomes = Box::pin(process_ndjson(stream::iter(chunks)));
        assert!(matches!(
            outcomes.next().await,
            Some(Ok(LineOutcome::Turn(_)))
        ));
        assert!(matches!(outcomes.next().await, Some(Err(_))));
        assert!(outcomes.next().await.is_none());
    }
}
