//! Voice session module: state machine, error classification, session
//! client, realtime transport and the widget controller.
//!
//! # Architecture
//!
//! ```text
//! WidgetCommand (mpsc, from the UI)
//!        │
//!        ▼
//! VoiceWidget::run()  ← async tokio task
//!        │
//!        ├─ StartCall → MicrophoneGate::acquire → VoiceSessionClient::start
//!        │                                         └─ VoiceTransport::connect
//!        ├─ HangUp    → VoiceSessionClient::stop
//!        └─ Unmount   → stop + exit
//!
//! SessionEvent (mpsc, from the transport) → SessionState::next
//!
//! SharedWidgetState (Arc<Mutex<WidgetState>>) ←── read by egui update() each frame
//! ```

pub mod classify;
pub mod client;
pub mod state;
pub mod transport;
pub mod widget;

pub use classify::{classify, ErrorClassification, RawFault};
pub use client::{
    EventSink, SessionEvent, SessionEventKind, SessionEvents, SessionHandle, SessionId, SessionRequest,
    VoiceSessionClient, VoiceTransport,
};
pub use state::{new_shared_state, SessionState, SharedWidgetState, Trigger, WidgetState};
pub use transport::{TransportError, WebSocketTransport};
pub use widget::{VoiceWidget, WidgetCommand};
