//! Voice session client: one widget's handle on the remote agent.
//!
//! [`VoiceSessionClient`] wraps a [`VoiceTransport`] and owns at most one
//! live [`SessionHandle`].  Lifecycle signals (started / ended / error) come
//! back as [`SessionEvent`]s on the receiver returned by
//! [`VoiceSessionClient::new`]; each event carries the [`SessionId`] of the
//! start attempt it belongs to, so late events from a session that was
//! already stopped can be told apart and ignored.
//!
//! The client is scoped to the widget: dropping it stops the active session.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::audio::MicrophoneLease;
use crate::config::VoiceConfig;

use super::classify::RawFault;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Identifier of one start attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Lifecycle signal reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEventKind {
    Started,
    Ended,
    Error(RawFault),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub session: SessionId,
    pub kind: SessionEventKind,
}

/// Receiver side of the client's event stream.
pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;

/// Sender the transport uses to report lifecycle signals for one session.
#[derive(Debug, Clone)]
pub struct EventSink {
    session: SessionId,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn started(&self) {
        self.emit(SessionEventKind::Started);
    }

    pub fn ended(&self) {
        self.emit(SessionEventKind::Ended);
    }

    pub fn error(&self, fault: RawFault) {
        self.emit(SessionEventKind::Error(fault));
    }

    fn emit(&self, kind: SessionEventKind) {
        // The client (and its receiver) is gone after unmount.
        let _ = self.tx.send(SessionEvent {
            session: self.session,
            kind,
        });
    }
}

// ---------------------------------------------------------------------------
// Transport seam
// ---------------------------------------------------------------------------

/// What the transport needs to open a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    /// Caller-held client credential.
    pub public_key: String,
    /// Remote agent to talk to.
    pub assistant_id: String,
}

/// A live session with the remote agent.
pub trait SessionHandle: Send {
    /// End the session.  Called at most once per handle.
    fn stop(&mut self);
}

/// Provider of real-time voice sessions.
///
/// `connect` resolves once the session is negotiating (or has failed).  The
/// transport reports everything after that through `sink`.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn connect(
        &self,
        request: SessionRequest,
        microphone: MicrophoneLease,
        sink: EventSink,
    ) -> Result<Box<dyn SessionHandle>, RawFault>;
}

// ---------------------------------------------------------------------------
// VoiceSessionClient
// ---------------------------------------------------------------------------

/// Owns the widget's (single) voice session.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use voice_demo::config::VoiceConfig;
/// # use voice_demo::session::{VoiceSessionClient, VoiceTransport};
/// # async fn example(transport: Arc<dyn VoiceTransport>, mic: voice_demo::audio::MicrophoneLease) {
/// let (mut client, mut events) = VoiceSessionClient::new(transport, &VoiceConfig::default());
/// client.start("assistant-id", mic).await.ok();
/// while let Some(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// client.stop();
/// # }
/// ```
pub struct VoiceSessionClient {
    transport: Arc<dyn VoiceTransport>,
    public_key: String,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    current: Option<SessionId>,
    handle: Option<Box<dyn SessionHandle>>,
    next_id: u64,
}

impl VoiceSessionClient {
    pub fn new(transport: Arc<dyn VoiceTransport>, config: &VoiceConfig) -> (Self, SessionEvents) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let client = Self {
            transport,
            public_key: config.public_key.clone(),
            events_tx,
            current: None,
            handle: None,
            next_id: 1,
        };
        (client, events_rx)
    }

    /// Session whose events are currently relevant: the one being started or
    /// the one that is live.
    pub fn current_session(&self) -> Option<SessionId> {
        self.current
    }

    pub fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    /// Start a session with `assistant_id`, streaming `microphone`.
    ///
    /// Any previous session is stopped first so at most one handle exists.
    pub async fn start(&mut self, assistant_id: &str, microphone: MicrophoneLease) -> Result<SessionId, RawFault> {
        if self.handle.is_some() {
            log::warn!("voice client: start while a session is live, stopping it first");
            self.stop();
        }

        let id = SessionId(self.next_id);
        self.next_id += 1;
        self.current = Some(id);

        let request = SessionRequest {
            public_key: self.public_key.clone(),
            assistant_id: assistant_id.to_string(),
        };
        let sink = EventSink {
            session: id,
            tx: self.events_tx.clone(),
        };

        log::debug!("voice client: connecting {id}");
        match self.transport.connect(request, microphone, sink).await {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(id)
            }
            Err(fault) => {
                self.current = None;
                Err(fault)
            }
        }
    }

    /// Stop the live session, if any.  Idempotent.
    pub fn stop(&mut self) {
        self.current = None;
        if let Some(mut handle) = self.handle.take() {
            log::debug!("voice client: stopping session");
            handle.stop();
        }
    }

    /// Forget a session the provider already ended, without stopping it.
    pub fn release(&mut self) {
        self.current = None;
        self.handle = None;
    }
}

impl Drop for VoiceSessionClient {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandle(Arc<AtomicUsize>);

    impl SessionHandle for CountingHandle {
        fn stop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct MockTransport {
        stops: Arc<AtomicUsize>,
        fail_with: Option<RawFault>,
    }

    #[async_trait]
    impl VoiceTransport for MockTransport {
        async fn connect(
            &self,
            request: SessionRequest,
            _microphone: MicrophoneLease,
            sink: EventSink,
        ) -> Result<Box<dyn SessionHandle>, RawFault> {
            assert_eq!(request.public_key, "pk-test");
            if let Some(fault) = &self.fail_with {
                return Err(fault.clone());
            }
            sink.started();
            Ok(Box::new(CountingHandle(Arc::clone(&self.stops))))
        }
    }

    fn mic() -> MicrophoneLease {
        let (_tx, rx) = mpsc::unbounded_channel();
        MicrophoneLease::from_parts(rx, 16_000, 1)
    }

    fn client(fail_with: Option<RawFault>) -> (VoiceSessionClient, SessionEvents, Arc<AtomicUsize>) {
        let stops = Arc::new(AtomicUsize::new(0));
        let transport = Arc::new(MockTransport {
            stops: Arc::clone(&stops),
            fail_with,
        });
        let config = VoiceConfig {
            public_key: "pk-test".into(),
            ..VoiceConfig::default()
        };
        let (client, events) = VoiceSessionClient::new(transport, &config);
        (client, events, stops)
    }

    #[tokio::test]
    async fn start_tags_events_with_session_id() {
        let (mut client, mut events, _) = client(None);

        let id = client.start("asst", mic()).await.unwrap();
        assert_eq!(client.current_session(), Some(id));
        assert!(client.has_handle());

        let event = events.recv().await.unwrap();
        assert_eq!(event.session, id);
        assert_eq!(event.kind, SessionEventKind::Started);
    }

    #[tokio::test]
    async fn failed_start_keeps_no_handle() {
        let (mut client, _events, stops) = client(Some(RawFault::new("401")));

        let err = client.start("asst", mic()).await.unwrap_err();
        assert_eq!(err.detail, "401");
        assert!(client.current_session().is_none());
        assert!(!client.has_handle());

        client.stop();
        assert_eq!(stops.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (mut client, _events, stops) = client(None);
        client.start("asst", mic()).await.unwrap();

        client.stop();
        client.stop();
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert!(client.current_session().is_none());
    }

    #[tokio::test]
    async fn drop_stops_live_session() {
        let (mut client, _events, stops) = client(None);
        client.start("asst", mic()).await.unwrap();

        drop(client);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn restart_replaces_previous_handle() {
        let (mut client, _events, stops) = client(None);
        let first = client.start("asst", mic()).await.unwrap();
        let second = client.start("asst", mic()).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(client.current_session(), Some(second));
    }

    #[tokio::test]
    async fn release_forgets_without_stopping() {
        let (mut client, _events, stops) = client(None);
        client.start("asst", mic()).await.unwrap();

        client.release();
        drop(client);
        assert_eq!(stops.load(Ordering::SeqCst), 0);
    }
}
