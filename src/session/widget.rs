//! Voice widget controller: drives gate → session client → state machine.
//!
//! [`VoiceWidget`] owns the session client for the lifetime of one mounted
//! widget and responds to [`WidgetCommand`]s from the UI plus
//! [`SessionEvent`]s from the transport.
//!
//! # Flow
//!
//! ```text
//! StartCall   Idle → Connecting
//!   └─▶ gate.acquire ─▶ client.start          (commands still drained)
//!         ├─ Err  → classify, Connecting → Idle
//!         └─ Ok   → wait for provider events
//! Started     Connecting → Active, error cleared
//! Ended       Active/Connecting → Idle
//! Error       any → Idle, classified, handle stopped
//! HangUp      Active → Idle, handle stopped
//! Unmount     stop the session (also drops any in-flight start) and exit
//! ```

use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::audio::MicrophoneGate;
use crate::config::VoiceConfig;

use super::classify::{classify, ErrorClassification};
use super::client::{SessionEvent, SessionEventKind, SessionEvents, VoiceSessionClient, VoiceTransport};
use super::state::{SessionState, SharedWidgetState, Trigger};

// ---------------------------------------------------------------------------
// WidgetCommand
// ---------------------------------------------------------------------------

/// Commands sent from the UI to the widget controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetCommand {
    /// Start button pressed.
    StartCall,
    /// Hang-up button pressed.
    HangUp,
    /// The widget is going away; tear everything down.
    Unmount,
}

// ---------------------------------------------------------------------------
// VoiceWidget
// ---------------------------------------------------------------------------

/// Controller task for one mounted voice demo widget.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use voice_demo::audio::{CpalMicrophoneGate, LevelMeter};
/// use voice_demo::config::AppConfig;
/// use voice_demo::session::{new_shared_state, VoiceWidget, WebSocketTransport, WidgetCommand};
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let meter = LevelMeter::new();
/// let state = new_shared_state(meter.clone());
/// let widget = VoiceWidget::new(
///     state.clone(),
///     Arc::new(CpalMicrophoneGate::new(None, meter)),
///     Arc::new(WebSocketTransport::from_config(&config.voice, &config.audio)),
///     &config.voice,
/// );
///
/// let (tx, rx) = tokio::sync::mpsc::channel(16);
/// tokio::spawn(widget.run(rx));
/// tx.send(WidgetCommand::StartCall).await.ok();
/// # }
/// ```
pub struct VoiceWidget {
    state: SharedWidgetState,
    gate: Arc<dyn MicrophoneGate>,
    client: VoiceSessionClient,
    events: SessionEvents,
    assistant_id: String,
}

impl VoiceWidget {
    /// Mount the widget: the session client is constructed here and lives
    /// exactly as long as the controller.
    pub fn new(
        state: SharedWidgetState,
        gate: Arc<dyn MicrophoneGate>,
        transport: Arc<dyn VoiceTransport>,
        config: &VoiceConfig,
    ) -> Self {
        let (client, events) = VoiceSessionClient::new(transport, config);
        Self {
            state,
            gate,
            client,
            events,
            assistant_id: config.assistant_id.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until [`WidgetCommand::Unmount`] arrives or `commands` closes.
    ///
    /// Provider events are handled before queued commands so a hang-up or
    /// repeated start is always judged against the latest state.
    pub async fn run(mut self, mut commands: mpsc::Receiver<WidgetCommand>) {
        log::info!("voice widget mounted");

        loop {
            tokio::select! {
                biased;

                Some(event) = self.events.recv() => self.handle_event(event),

                command = commands.recv() => match command {
                    Some(WidgetCommand::StartCall) => {
                        if self.start_call(&mut commands).await.is_break() {
                            break;
                        }
                    }
                    Some(WidgetCommand::HangUp) => self.hang_up(),
                    Some(WidgetCommand::Unmount) | None => break,
                },
            }
        }

        self.unmount();
    }

    // -----------------------------------------------------------------------
    // Command handlers
    // -----------------------------------------------------------------------

    /// Gate, then session start.  Returns `Break` when the widget was
    /// unmounted while the start was in flight.
    async fn start_call(&mut self, commands: &mut mpsc::Receiver<WidgetCommand>) -> ControlFlow<()> {
        if !self.apply(Trigger::UserStart) {
            log::debug!("voice widget: start ignored, session already in progress");
            return ControlFlow::Continue(());
        }
        self.set_error(ErrorClassification::None);

        let outcome = {
            let gate = Arc::clone(&self.gate);
            let assistant_id = self.assistant_id.clone();
            let client = &mut self.client;

            let attempt = async move {
                let microphone = gate.acquire().await.map_err(|e| {
                    log::warn!("voice widget: microphone gate refused: {e}");
                    ErrorClassification::from(&e)
                })?;
                client.start(&assistant_id, microphone).await.map_err(|fault| {
                    log::warn!("voice widget: session start failed: {fault}");
                    classify(&fault)
                })
            };
            tokio::pin!(attempt);

            loop {
                tokio::select! {
                    biased;

                    result = &mut attempt => break Some(result),

                    command = commands.recv() => match command {
                        Some(WidgetCommand::Unmount) | None => break None,
                        Some(other) => log::debug!("voice widget: {other:?} ignored while connecting"),
                    },
                }
            }
        };

        match outcome {
            None => ControlFlow::Break(()),
            Some(Ok(id)) => {
                log::debug!("voice widget: {id} negotiating");
                ControlFlow::Continue(())
            }
            Some(Err(classification)) => {
                self.apply(Trigger::StartFailed);
                self.set_error(classification);
                self.reset_level();
                ControlFlow::Continue(())
            }
        }
    }

    fn hang_up(&mut self) {
        if self.apply(Trigger::UserHangUp) {
            self.client.stop();
            self.reset_level();
        } else {
            log::debug!("voice widget: hang-up ignored, no active call");
        }
    }

    fn unmount(&mut self) {
        log::info!("voice widget unmounting");
        self.client.stop();
        self.reset_level();
        if let Ok(mut st) = self.state.lock() {
            st.session = SessionState::Idle;
        }
    }

    // -----------------------------------------------------------------------
    // Provider events
    // -----------------------------------------------------------------------

    fn handle_event(&mut self, event: SessionEvent) {
        if self.client.current_session() != Some(event.session) {
            log::debug!("voice widget: dropping stale {:?} from {}", event.kind, event.session);
            return;
        }

        match event.kind {
            SessionEventKind::Started => {
                if self.apply(Trigger::ProviderStarted) {
                    self.set_error(ErrorClassification::None);
                }
            }
            SessionEventKind::Ended => {
                let was_connecting = self.session() == SessionState::Connecting;
                if self.apply(Trigger::ProviderEnded) {
                    self.client.release();
                    self.reset_level();
                    if was_connecting {
                        self.set_error(ErrorClassification::ConnectionFailed);
                    }
                }
            }
            SessionEventKind::Error(fault) => {
                let classification = classify(&fault);
                log::warn!("voice widget: provider error ({classification:?}): {fault}");
                self.apply(Trigger::ProviderError);
                self.set_error(classification);
                self.client.stop();
                self.reset_level();
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn session(&self) -> SessionState {
        self.state
            .lock()
            .map(|st| st.session)
            .unwrap_or_default()
    }

    /// Apply `trigger` to the shared state; `false` if it was ignored.
    fn apply(&self, trigger: Trigger) -> bool {
        let Ok(mut st) = self.state.lock() else {
            return false;
        };
        match st.session.next(trigger) {
            Some(next) => {
                log::debug!("voice widget: {:?} --{trigger:?}--> {next:?}", st.session);
                st.session = next;
                true
            }
            None => false,
        }
    }

    fn set_error(&self, error: ErrorClassification) {
        if let Ok(mut st) = self.state.lock() {
            st.error = error;
        }
    }

    fn reset_level(&self) {
        if let Ok(st) = self.state.lock() {
            st.level.reset();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::audio::{AcquireError, LevelMeter, MicrophoneLease};
    use crate::session::classify::RawFault;
    use crate::session::client::{EventSink, SessionHandle, SessionRequest};
    use crate::session::state::new_shared_state;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    struct Gate(Result<(), AcquireError>);

    #[async_trait]
    impl MicrophoneGate for Gate {
        async fn acquire(&self) -> Result<MicrophoneLease, AcquireError> {
            self.0.clone()?;
            let (_tx, rx) = mpsc::unbounded_channel();
            Ok(MicrophoneLease::from_parts(rx, 16_000, 1))
        }
    }

    struct Handle(Arc<AtomicUsize>);

    impl SessionHandle for Handle {
        fn stop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Records sinks so the test can emit provider events itself.
    #[derive(Default)]
    struct Transport {
        connects: AtomicUsize,
        stops: Arc<AtomicUsize>,
        sinks: Mutex<Vec<EventSink>>,
        fail_with: Option<RawFault>,
    }

    #[async_trait]
    impl VoiceTransport for Transport {
        async fn connect(
            &self,
            _request: SessionRequest,
            _microphone: MicrophoneLease,
            sink: EventSink,
        ) -> Result<Box<dyn SessionHandle>, RawFault> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if let Some(fault) = &self.fail_with {
                return Err(fault.clone());
            }
            self.sinks.lock().unwrap().push(sink);
            Ok(Box::new(Handle(Arc::clone(&self.stops))))
        }
    }

    fn widget(gate: Gate, transport: Arc<Transport>) -> (VoiceWidget, SharedWidgetState) {
        let state = new_shared_state(LevelMeter::new());
        let config = VoiceConfig {
            assistant_id: "asst".into(),
            ..VoiceConfig::default()
        };
        let widget = VoiceWidget::new(state.clone(), Arc::new(gate), transport, &config);
        (widget, state)
    }

    fn session(state: &SharedWidgetState) -> SessionState {
        state.lock().unwrap().session
    }

    fn error(state: &SharedWidgetState) -> ErrorClassification {
        state.lock().unwrap().error
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn start_enters_connecting_until_provider_starts() {
        let transport = Arc::new(Transport::default());
        let (mut widget, state) = widget(Gate(Ok(())), Arc::clone(&transport));
        let (_tx, mut rx) = mpsc::channel(4);

        assert!(widget.start_call(&mut rx).await.is_continue());
        assert_eq!(session(&state), SessionState::Connecting);

        transport.sinks.lock().unwrap()[0].started();
        let event = widget.events.recv().await.unwrap();
        widget.handle_event(event);
        assert_eq!(session(&state), SessionState::Active);
    }

    #[tokio::test]
    async fn denied_gate_returns_to_idle_without_connecting() {
        let transport = Arc::new(Transport::default());
        let (mut widget, state) = widget(
            Gate(Err(AcquireError::PermissionDenied("no".into()))),
            Arc::clone(&transport),
        );
        let (_tx, mut rx) = mpsc::channel(4);

        widget.start_call(&mut rx).await;

        assert_eq!(session(&state), SessionState::Idle);
        assert_eq!(error(&state), ErrorClassification::MicrophonePermissionDenied);
        assert_eq!(transport.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn busy_gate_reports_microphone_busy() {
        let transport = Arc::new(Transport::default());
        let (mut widget, state) = widget(
            Gate(Err(AcquireError::DeviceUnavailable("in use".into()))),
            transport,
        );
        let (_tx, mut rx) = mpsc::channel(4);

        widget.start_call(&mut rx).await;
        assert_eq!(error(&state), ErrorClassification::MicrophoneBusy);
    }

    #[tokio::test]
    async fn rejected_start_is_classified() {
        let transport = Arc::new(Transport {
            fail_with: Some(RawFault::new("HTTP 401")),
            ..Transport::default()
        });
        let (mut widget, state) = widget(Gate(Ok(())), transport);
        let (_tx, mut rx) = mpsc::channel(4);

        widget.start_call(&mut rx).await;
        assert_eq!(session(&state), SessionState::Idle);
        assert_eq!(error(&state), ErrorClassification::ConnectionFailed);
    }

    #[tokio::test]
    async fn provider_error_releases_handle_and_classifies() {
        let transport = Arc::new(Transport::default());
        let (mut widget, state) = widget(Gate(Ok(())), Arc::clone(&transport));
        let (_tx, mut rx) = mpsc::channel(4);

        widget.start_call(&mut rx).await;
        let sink = transport.sinks.lock().unwrap()[0].clone();
        sink.started();
        sink.error(RawFault::new(r#"{"error":{"name":"NotReadableError"}}"#));

        while let Ok(event) = widget.events.try_recv() {
            widget.handle_event(event);
        }

        assert_eq!(session(&state), SessionState::Idle);
        assert_eq!(error(&state), ErrorClassification::MicrophoneBusy);
        assert_eq!(transport.stops.load(Ordering::SeqCst), 1);
        assert!(!widget.client.has_handle());
    }

    #[tokio::test]
    async fn ended_before_start_is_a_connection_failure() {
        let transport = Arc::new(Transport::default());
        let (mut widget, state) = widget(Gate(Ok(())), Arc::clone(&transport));
        let (_tx, mut rx) = mpsc::channel(4);

        widget.start_call(&mut rx).await;
        transport.sinks.lock().unwrap()[0].ended();
        let event = widget.events.recv().await.unwrap();
        widget.handle_event(event);

        assert_eq!(session(&state), SessionState::Idle);
        assert_eq!(error(&state), ErrorClassification::ConnectionFailed);
    }

    #[tokio::test]
    async fn stale_events_are_ignored_after_hang_up() {
        let transport = Arc::new(Transport::default());
        let (mut widget, state) = widget(Gate(Ok(())), Arc::clone(&transport));
        let (_tx, mut rx) = mpsc::channel(4);

        widget.start_call(&mut rx).await;
        let sink = transport.sinks.lock().unwrap()[0].clone();
        sink.started();
        let event = widget.events.recv().await.unwrap();
        widget.handle_event(event);

        widget.hang_up();
        assert_eq!(session(&state), SessionState::Idle);

        // The provider reports its own error after the local hang-up.
        sink.error(RawFault::new("socket closed"));
        let event = widget.events.recv().await.unwrap();
        widget.handle_event(event);

        assert_eq!(error(&state), ErrorClassification::None);
        assert_eq!(transport.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn started_clears_previous_error() {
        let transport = Arc::new(Transport::default());
        let (mut widget, state) = widget(Gate(Ok(())), Arc::clone(&transport));
        let (_tx, mut rx) = mpsc::channel(4);

        state.lock().unwrap().error = ErrorClassification::ConnectionFailed;
        widget.start_call(&mut rx).await;
        assert_eq!(error(&state), ErrorClassification::None);

        state.lock().unwrap().error = ErrorClassification::MicrophoneBusy;
        transport.sinks.lock().unwrap()[0].started();
        let event = widget.events.recv().await.unwrap();
        widget.handle_event(event);
        assert_eq!(error(&state), ErrorClassification::None);
    }
}
