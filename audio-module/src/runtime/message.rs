use std::fmt;
use std::sync::Arc;

use super::fanout::FrameRelease;
use crate::data::AudioData;

/// Callback run once the consumer of a frame is done with it.
pub type ResponseCallback = Box<dyn FnOnce(&AudioData) + Send>;

pub(crate) enum Response {
    /// Supplied by external code through `data_tx`.
    Callback(ResponseCallback),
    /// Attached by fan-out; counts down the shared frame.
    Release(Arc<FrameRelease>),
}

/// The unit queued in a module FIFO.
///
/// A message is a scoped guard over its response: the response runs exactly
/// once, when the message is released or dropped, whichever comes first.
pub struct Message {
    pub audio_data: AudioData,
    /// Instance name of the sending module, `None` for external senders.
    pub tx_handle: Option<Arc<str>>,
    response: Option<Response>,
}

impl Message {
    pub fn new(audio_data: AudioData, tx_handle: Option<Arc<str>>, callback: Option<ResponseCallback>) -> Self {
        Message {
            audio_data,
            tx_handle,
            response: callback.map(Response::Callback),
        }
    }

    pub(crate) fn with_release(audio_data: AudioData, tx_handle: Arc<str>, release: Arc<FrameRelease>) -> Self {
        Message {
            audio_data,
            tx_handle: Some(tx_handle),
            response: Some(Response::Release(release)),
        }
    }

    /// Signal that the consumer is done with the frame.
    pub fn release(self) {}
}

impl Drop for Message {
    fn drop(&mut self) {
        match self.response.take() {
            Some(Response::Callback(callback)) => callback(&self.audio_data),
            Some(Response::Release(release)) => release.release(),
            None => {}
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("audio_data", &self.audio_data)
            .field("tx_handle", &self.tx_handle)
            .field("has_response", &self.response.is_some())
            .finish()
    }
}
