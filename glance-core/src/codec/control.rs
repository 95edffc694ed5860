//! Server-side codec: control lines in, `OK`/`FAIL`/`FRAME` out.

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::take_line;
use crate::error::GlanceError;
use crate::protocol::{ClientLine, MAX_LINE_LENGTH, ServerMessage};

#[derive(Debug, Clone)]
pub struct ControlCodec {
    max_line: usize,
}

impl Default for ControlCodec {
    fn default() -> Self {
        Self {
            max_line: MAX_LINE_LENGTH,
        }
    }
}

impl ControlCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a message into a standalone buffer.
    ///
    /// Broadcasts encode a frame once and write the same bytes to every
    /// client.
    pub fn envelope(message: ServerMessage) -> Bytes {
        let mut buf = BytesMut::new();
        match Self::new().encode(message, &mut buf) {
            Ok(()) => buf.freeze(),
            Err(_) => Bytes::new(),
        }
    }
}

impl Decoder for ControlCodec {
    type Item = ClientLine;
    type Error = GlanceError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(take_line(src, self.max_line)?.map(|line| ClientLine::parse(&line)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // An unterminated trailing line is not a command.
        let item = self.decode(src)?;
        if item.is_none() {
            src.clear();
        }
        Ok(item)
    }
}

impl Encoder<ServerMessage> for ControlCodec {
    type Error = GlanceError;

    fn encode(&mut self, item: ServerMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            ServerMessage::Ok => dst.put_slice(b"OK\n"),
            ServerMessage::Fail => dst.put_slice(b"FAIL\n"),
            ServerMessage::Frame(payload) => {
                let header = format!("FRAME {}\n", payload.len());
                dst.reserve(header.len() + payload.len());
                dst.put_slice(header.as_bytes());
                dst.put_slice(&payload);
            }
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_envelope_is_header_then_raw_bytes() {
        let payload = Bytes::from_static(&[0xFF, 0xD8, b'\n', 0x00, 0xD9]);
        let bytes = ControlCodec::envelope(ServerMessage::Frame(payload));
        assert_eq!(&bytes[..], b"FRAME 5\n\xFF\xD8\n\x00\xD9");
    }

    #[test]
    fn status_lines() {
        assert_eq!(&ControlCodec::envelope(ServerMessage::Ok)[..], b"OK\n");
        assert_eq!(&ControlCodec::envelope(ServerMessage::Fail)[..], b"FAIL\n");
    }

    #[test]
    fn decodes_several_lines_from_one_read() {
        let mut codec = ControlCodec::new();
        let mut buf = BytesMut::from(&b"AUTH secret\nSET_FPS 4\nSET_SC"[..]);
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(ClientLine::Auth("secret".into()))
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(ClientLine::SetFps(4)));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }
}
