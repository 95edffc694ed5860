//! Client-side codec: incremental parser for the server's byte stream.
//!
//! The parser is a small state machine driven by whatever bytes TCP
//! delivered so far:
//!
//! ```text
//!  AwaitingAuth ──"OK"──► AwaitingHeader ──"FRAME n"──► AwaitingPayload(n)
//!       │                     ▲    │ other line: ignored     │
//!       ▼ other line          │    ▼ (error in strict mode)  │
//!   AuthRejected              └──────────── n bytes ─────────┘
//! ```
//!
//! Frames are released only once all `n` payload bytes are buffered, so a
//! message split across arbitrary segments still yields exactly one frame.

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::take_line;
use crate::error::GlanceError;
use crate::protocol::{ClientLine, MAX_FRAME_SIZE, MAX_LINE_LENGTH, parse_frame_header};

/// Upper bound on a single buffer reservation while a payload trickles in.
const RESERVE_CHUNK: usize = 256 * 1024;

/// Something the parser completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The server accepted our AUTH line.
    Authenticated,
    /// One complete encoded frame.
    Frame(Bytes),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseMode {
    AwaitingAuth,
    AwaitingHeader,
    AwaitingPayload { expected: usize },
}

#[derive(Debug, Clone)]
pub struct ViewerCodec {
    mode: ParseMode,
    strict: bool,
    max_line: usize,
    max_frame: usize,
}

impl Default for ViewerCodec {
    fn default() -> Self {
        Self {
            mode: ParseMode::AwaitingAuth,
            strict: false,
            max_line: MAX_LINE_LENGTH,
            max_frame: MAX_FRAME_SIZE,
        }
    }
}

impl ViewerCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat unrecognised header lines as a protocol violation instead of
    /// skipping them.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Largest payload a `FRAME` header may announce.
    pub fn max_frame_size(mut self, max: usize) -> Self {
        self.max_frame = max;
        self
    }

    /// Whether the `OK` line has been seen.
    pub fn is_authenticated(&self) -> bool {
        self.mode != ParseMode::AwaitingAuth
    }

    /// Payload bytes still outstanding for the current frame, if any.
    pub fn expected_size(&self) -> Option<usize> {
        match self.mode {
            ParseMode::AwaitingPayload { expected } => Some(expected),
            _ => None,
        }
    }
}

impl Decoder for ViewerCodec {
    type Item = StreamEvent;
    type Error = GlanceError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.mode {
                ParseMode::AwaitingAuth => {
                    let Some(line) = take_line(src, self.max_line)? else {
                        return Ok(None);
                    };
                    if line != "OK" {
                        return Err(GlanceError::AuthRejected(line));
                    }
                    self.mode = ParseMode::AwaitingHeader;
                    return Ok(Some(StreamEvent::Authenticated));
                }
                ParseMode::AwaitingHeader => {
                    let Some(line) = take_line(src, self.max_line)? else {
                        return Ok(None);
                    };
                    match parse_frame_header(&line) {
                        Some(size) if size > self.max_frame => {
                            return Err(GlanceError::FrameTooLarge {
                                size,
                                max: self.max_frame,
                            });
                        }
                        Some(expected) => {
                            self.mode = ParseMode::AwaitingPayload { expected };
                        }
                        None if self.strict => {
                            return Err(GlanceError::ProtocolViolation(format!(
                                "unexpected header line {line:?}"
                            )));
                        }
                        None => {
                            tracing::debug!("ignoring unrecognised header {line:?}");
                        }
                    }
                }
                ParseMode::AwaitingPayload { expected } => {
                    if src.len() < expected {
                        src.reserve((expected - src.len()).min(RESERVE_CHUNK));
                        return Ok(None);
                    }
                    let frame = src.split_to(expected).freeze();
                    self.mode = ParseMode::AwaitingHeader;
                    return Ok(Some(StreamEvent::Frame(frame)));
                }
            }
        }
    }
}

impl Encoder<ClientLine> for ViewerCodec {
    type Error = GlanceError;

    fn encode(&mut self, item: ClientLine, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = item.to_string();
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    use futures::StreamExt;
    use tokio_util::codec::FramedRead;

    fn authenticated() -> (ViewerCodec, BytesMut) {
        let mut codec = ViewerCodec::new();
        let mut buf = BytesMut::from(&b"OK\n"[..]);
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(StreamEvent::Authenticated)
        );
        (codec, buf)
    }

    #[test]
    fn anything_but_ok_rejects_auth() {
        let mut codec = ViewerCodec::new();
        let mut buf = BytesMut::from(&b"FAIL\n"[..]);
        match codec.decode(&mut buf) {
            Err(GlanceError::AuthRejected(line)) => assert_eq!(line, "FAIL"),
            other => panic!("expected AuthRejected, got {other:?}"),
        }
        assert!(!codec.is_authenticated());
    }

    #[test]
    fn ok_and_frame_in_one_segment() {
        let mut codec = ViewerCodec::new();
        let mut buf = BytesMut::from(&b"OK\nFRAME 3\nabc"[..]);
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(StreamEvent::Authenticated)
        );
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(StreamEvent::Frame(Bytes::from_static(b"abc")))
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn payload_waits_for_all_bytes() {
        let (mut codec, mut buf) = authenticated();
        buf.extend_from_slice(b"FRAME 4\nab");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(codec.expected_size(), Some(4));

        buf.extend_from_slice(b"cdFRAME");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(StreamEvent::Frame(Bytes::from_static(b"abcd")))
        );
        assert_eq!(codec.expected_size(), None);
        assert_eq!(&buf[..], b"FRAME");
    }

    #[test]
    fn payload_may_contain_newlines() {
        let (mut codec, mut buf) = authenticated();
        buf.extend_from_slice(b"FRAME 3\n\n\n\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(StreamEvent::Frame(Bytes::from_static(b"\n\n\n")))
        );
    }

    #[test]
    fn unknown_headers_are_skipped() {
        let (mut codec, mut buf) = authenticated();
        buf.extend_from_slice(b"PING\nFRAME 0\nFRAME 2\nhi");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(StreamEvent::Frame(Bytes::from_static(b"hi")))
        );
    }

    #[test]
    fn strict_mode_rejects_unknown_headers() {
        let mut codec = ViewerCodec::new().strict(true);
        let mut buf = BytesMut::from(&b"OK\nPING\n"[..]);
        codec.decode(&mut buf).unwrap();
        assert!(matches!(
            codec.decode(&mut buf),
            Err(GlanceError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn oversized_frame_header_is_an_error() {
        let (mut codec, mut buf) = authenticated();
        buf.extend_from_slice(b"FRAME 18446744073709551615\nabc");
        match codec.decode(&mut buf) {
            Err(GlanceError::FrameTooLarge { size, max }) => {
                assert_eq!(size, usize::MAX);
                assert_eq!(max, MAX_FRAME_SIZE);
            }
            other => panic!("expected FrameTooLarge, got {other:?}"),
        }
        assert_eq!(codec.expected_size(), None);
    }

    #[test]
    fn frame_size_limit_is_inclusive() {
        let mut codec = ViewerCodec::new().max_frame_size(4);
        let mut buf = BytesMut::from(&b"OK\nFRAME 4\nabcdFRAME 5\n"[..]);
        codec.decode(&mut buf).unwrap();
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(StreamEvent::Frame(Bytes::from_static(b"abcd")))
        );
        assert!(matches!(
            codec.decode(&mut buf),
            Err(GlanceError::FrameTooLarge { size: 5, max: 4 })
        ));
    }

    #[test]
    fn large_payload_reserves_in_chunks() {
        let (mut codec, mut buf) = authenticated();
        buf.extend_from_slice(b"FRAME 33554432\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(codec.expected_size(), Some(32 * 1024 * 1024));
        assert!(buf.capacity() < 32 * 1024 * 1024);
    }

    #[test]
    fn encodes_control_lines() {
        let mut codec = ViewerCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(ClientLine::Auth("secret".into()), &mut buf).unwrap();
        codec.encode(ClientLine::SetFps(4), &mut buf).unwrap();
        assert_eq!(&buf[..], b"AUTH secret\nSET_FPS 4\n");
    }

    #[tokio::test]
    async fn frame_split_across_three_segments() {
        // Splits land mid-header and mid-payload.
        let stream = tokio_test::io::Builder::new()
            .read(b"OK\nFRA")
            .read(b"ME 10\n0123")
            .read(b"456789")
            .build();
        let mut framed = FramedRead::new(stream, ViewerCodec::new());

        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            StreamEvent::Authenticated
        );
        match framed.next().await.unwrap().unwrap() {
            StreamEvent::Frame(frame) => {
                assert_eq!(frame.len(), 10);
                assert_eq!(&frame[..], b"0123456789");
            }
            other => panic!("expected frame, got {other:?}"),
        }
        assert!(framed.next().await.is_none());
    }
}
