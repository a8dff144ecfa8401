//! Frame sources: where a fold reads its frames from.
//!
//! The transport that opens the event stream lives outside this crate. It
//! only has to implement [`FrameSource`]; any `futures::Stream` of frames can
//! be wrapped with [`StreamSource`].

use std::collections::VecDeque;
use std::future::Future;

use futures::{Stream, StreamExt};

use crate::error::TransportError;
use crate::frame::RawFrame;

/// An asynchronous sequence of frames.
pub trait FrameSource: Send {
    /// Wait for the next frame.
    ///
    /// `None` means the stream is exhausted; `Some(Err(_))` means the
    /// transport failed and no further frames will follow.
    fn next_frame(&mut self) -> impl Future<Output = Option<Result<RawFrame, TransportError>>> + Send;
}

/// Adapter for any stream of frames.
pub struct StreamSource<S> {
    inner: S,
}

impl<S> StreamSource<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S> FrameSource for StreamSource<S>
where
    S: Stream<Item = Result<RawFrame, TransportError>> + Unpin + Send,
{
    fn next_frame(&mut self) -> impl Future<Output = Option<Result<RawFrame, TransportError>>> + Send {
        self.inner.next()
    }
}

/// In-memory recording, replayed in order.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    frames: VecDeque<Result<RawFrame, TransportError>>,
}

impl ReplaySource {
    pub fn new(frames: impl IntoIterator<Item = RawFrame>) -> Self {
        Self {
            frames: frames.into_iter().map(Ok).collect(),
        }
    }

    /// Make the transport fail after the recorded frames.
    pub fn then_fail(mut self, reason: impl Into<String>) -> Self {
        self.frames.push_back(Err(TransportError::new(reason)));
        self
    }
}

impl FrameSource for ReplaySource {
    fn next_frame(&mut self) -> impl Future<Output = Option<Result<RawFrame, TransportError>>> + Send {
        std::future::ready(self.frames.pop_front())
    }
}
