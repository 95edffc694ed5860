//! `tokio_util` codecs for both ends of a Glance connection.
//!
//! - [`ControlCodec`]: server side, decodes control lines, encodes
//!   `OK`/`FAIL`/`FRAME` messages.
//! - [`ViewerCodec`]: client side, incremental frame-stream parser and
//!   control-line encoder.

pub mod control;
pub mod viewer;

use bytes::BytesMut;

use crate::error::GlanceError;

pub use control::ControlCodec;
pub use viewer::{StreamEvent, ViewerCodec};

/// Split one `\n`-terminated line off the front of `src`.
///
/// Returns `Ok(None)` while no terminator has arrived. A trailing `\r` is
/// dropped and invalid UTF-8 is replaced lossily.
pub(crate) fn take_line(src: &mut BytesMut, max: usize) -> Result<Option<String>, GlanceError> {
    let Some(pos) = src.iter().position(|&b| b == b'\n') else {
        if src.len() > max {
            return Err(GlanceError::LineTooLong {
                len: src.len(),
                max,
            });
        }
        return Ok(None);
    };
    if pos > max {
        return Err(GlanceError::LineTooLong { len: pos, max });
    }

    let line = src.split_to(pos + 1);
    let mut body = &line[..pos];
    if let [rest @ .., b'\r'] = body {
        body = rest;
    }
    Ok(Some(String::from_utf8_lossy(body).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waits_for_terminator() {
        let mut buf = BytesMut::from(&b"AUTH sec"[..]);
        assert_eq!(take_line(&mut buf, 64).unwrap(), None);
        assert_eq!(buf.len(), 8);

        buf.extend_from_slice(b"ret\r\nSET_FPS 1\n");
        assert_eq!(take_line(&mut buf, 64).unwrap().as_deref(), Some("AUTH secret"));
        assert_eq!(take_line(&mut buf, 64).unwrap().as_deref(), Some("SET_FPS 1"));
        assert!(buf.is_empty());
    }

    #[test]
    fn rejects_runaway_lines() {
        let mut buf = BytesMut::from(&[b'x'; 100][..]);
        assert!(matches!(
            take_line(&mut buf, 64),
            Err(GlanceError::LineTooLong { len: 100, max: 64 })
        ));
    }
}
