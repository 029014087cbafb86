//! In-memory channels for exercising sessions and the selector without sockets

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{Channel, ChannelError, ChannelFactory, ChannelResult};
use crate::protocol::Transport;

/// One scripted receive result
pub enum Reply {
    Data(Vec<u8>),
    Timeout,
    Closed,
}

/// Observations a test can make after the channel was moved into a session
#[derive(Clone, Default)]
pub struct Recorder {
    pub sent: Arc<Mutex<Vec<Vec<u8>>>>,
    pub closed: Arc<AtomicBool>,
    pub timeouts: Arc<Mutex<Vec<Option<Duration>>>>,
}

impl Recorder {
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn timeouts(&self) -> Vec<Option<Duration>> {
        self.timeouts.lock().unwrap().clone()
    }
}

pub struct ScriptedChannel {
    transport: Transport,
    replies: VecDeque<Reply>,
    recorder: Recorder,
}

impl ScriptedChannel {
    pub fn new(transport: Transport, replies: Vec<Reply>) -> (Self, Recorder) {
        let recorder = Recorder::default();
        let channel = Self {
            transport,
            replies: replies.into(),
            recorder: recorder.clone(),
        };
        (channel, recorder)
    }
}

#[async_trait]
impl Channel for ScriptedChannel {
    fn transport(&self) -> Transport {
        self.transport
    }

    async fn send(&mut self, bytes: &[u8]) -> ChannelResult<()> {
        self.recorder.sent.lock().unwrap().push(bytes.to_vec());
        Ok(())
    }

    async fn receive(&mut self, _max_bytes: usize, timeout: Option<Duration>) -> ChannelResult<Bytes> {
        self.recorder.timeouts.lock().unwrap().push(timeout);
        match self.replies.pop_front() {
            Some(Reply::Data(data)) => Ok(Bytes::from(data)),
            Some(Reply::Timeout) => Err(ChannelError::Timeout(
                timeout.unwrap_or(Duration::from_secs(2)),
            )),
            Some(Reply::Closed) | None => Err(ChannelError::Closed),
        }
    }

    async fn close(&mut self) -> ChannelResult<()> {
        self.recorder.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out at most one pre-built channel per transport
#[derive(Default)]
pub struct ScriptedFactory {
    stream: Mutex<Option<Box<dyn Channel>>>,
    datagram: Mutex<Option<Box<dyn Channel>>>,
    pub stream_opens: AtomicUsize,
    pub datagram_opens: AtomicUsize,
}

impl ScriptedFactory {
    pub fn with_stream(self, channel: impl Channel + 'static) -> Self {
        *self.stream.lock().unwrap() = Some(Box::new(channel));
        self
    }

    pub fn with_datagram(self, channel: impl Channel + 'static) -> Self {
        *self.datagram.lock().unwrap() = Some(Box::new(channel));
        self
    }

    pub fn stream_opens(&self) -> usize {
        self.stream_opens.load(Ordering::SeqCst)
    }

    pub fn datagram_opens(&self) -> usize {
        self.datagram_opens.load(Ordering::SeqCst)
    }
}

fn refused() -> ChannelError {
    ChannelError::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "connection refused",
    ))
}

#[async_trait]
impl ChannelFactory for ScriptedFactory {
    async fn open_stream(&self) -> ChannelResult<Box<dyn Channel>> {
        self.stream_opens.fetch_add(1, Ordering::SeqCst);
        self.stream.lock().unwrap().take().ok_or_else(refused)
    }

    async fn open_datagram(&self) -> ChannelResult<Box<dyn Channel>> {
        self.datagram_opens.fetch_add(1, Ordering::SeqCst);
        self.datagram.lock().unwrap().take().ok_or_else(refused)
    }
}
