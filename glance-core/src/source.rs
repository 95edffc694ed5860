//! The frame source seam.
//!
//! Pixel capture and image encoding live outside this crate. The server
//! only needs something that, when asked, eventually hands back one
//! encoded still image or nothing.

use std::future::Future;

use async_trait::async_trait;
use bytes::Bytes;

use crate::protocol::CaptureSettings;

/// Supplies encoded frames on demand.
///
/// `None` or an empty buffer means "capture failed this tick"; the server
/// sends nothing and tries again on the next tick.
#[async_trait]
pub trait FrameSource: Send + Sync + 'static {
    async fn capture(&self, settings: CaptureSettings) -> Option<Bytes>;
}

/// Adapter turning an async closure into a [`FrameSource`].
pub struct FnFrameSource<F> {
    f: F,
}

/// Wrap `f` as a frame source.
///
/// ```no_run
/// # use bytes::Bytes;
/// let source = glance_core::source::from_fn(|_settings| async {
///     Some(Bytes::from_static(b"\xFF\xD8...\xFF\xD9"))
/// });
/// ```
pub fn from_fn<F, Fut>(f: F) -> FnFrameSource<F>
where
    F: Fn(CaptureSettings) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<Bytes>> + Send + 'static,
{
    FnFrameSource { f }
}

#[async_trait]
impl<F, Fut> FrameSource for FnFrameSource<F>
where
    F: Fn(CaptureSettings) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<Bytes>> + Send + 'static,
{
    async fn capture(&self, settings: CaptureSettings) -> Option<Bytes> {
        (self.f)(settings).await
    }
}
