//! Session state machine and shared widget state.
//!
//! [`SessionState`] is the widget's single source of truth: every visible
//! affordance (button, ring, visualizer, headline) is derived from it, so no
//! separate "call in progress" flag exists.  [`SessionState::next`] is the
//! whole transition table.
//!
//! [`SharedWidgetState`] is an `Arc<Mutex<WidgetState>>`, written by the
//! [`VoiceWidget`](super::VoiceWidget) task, read by the egui update loop.

use std::sync::{Arc, Mutex};

use crate::audio::LevelMeter;

use super::classify::ErrorClassification;

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// Inputs that can move the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The visitor pressed the start button.
    UserStart,
    /// Microphone acquisition or session start failed.
    StartFailed,
    /// The provider reported the session as started.
    ProviderStarted,
    /// The provider reported the session as ended.
    ProviderEnded,
    /// The visitor pressed the hang-up button.
    UserHangUp,
    /// The provider reported a fatal error.
    ProviderError,
}

impl Trigger {
    pub const ALL: [Trigger; 6] = [
        Trigger::UserStart,
        Trigger::StartFailed,
        Trigger::ProviderStarted,
        Trigger::ProviderEnded,
        Trigger::UserHangUp,
        Trigger::ProviderError,
    ];
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// States of the voice demo widget.
///
/// ```text
/// Idle ──UserStart──▶ Connecting ──ProviderStarted──▶ Active
///                     │  StartFailed / ProviderEnded       │ ProviderEnded / UserHangUp
///                     ▼                                    ▼
///                    Idle ◀────────────────────────────── Idle
/// any state ──ProviderError──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Ready for the visitor to start a call.
    #[default]
    Idle,
    /// Microphone acquisition and session handshake in flight.
    Connecting,
    /// Talking to the agent.
    Active,
}

impl SessionState {
    /// Apply `trigger`.  `None` means the trigger is ignored in this state.
    ///
    /// ```
    /// use voice_demo::session::{SessionState, Trigger};
    ///
    /// assert_eq!(SessionState::Idle.next(Trigger::UserStart), Some(SessionState::Connecting));
    /// assert_eq!(SessionState::Idle.next(Trigger::ProviderStarted), None);
    /// assert_eq!(SessionState::Active.next(Trigger::UserStart), None);
    /// ```
    pub fn next(self, trigger: Trigger) -> Option<SessionState> {
        use SessionState::*;
        use Trigger::*;

        match (self, trigger) {
            (_, ProviderError) => Some(Idle),
            (Idle, UserStart) => Some(Connecting),
            (Connecting, StartFailed) => Some(Idle),
            (Connecting, ProviderStarted) => Some(Active),
            (Connecting, ProviderEnded) => Some(Idle),
            (Active, ProviderEnded) => Some(Idle),
            (Active, UserHangUp) => Some(Idle),
            _ => None,
        }
    }

    /// The start button accepts presses only when idle.
    pub fn start_enabled(self) -> bool {
        self == SessionState::Idle
    }

    /// The hang-up button replaces the start button while a call is live.
    pub fn shows_hang_up(self) -> bool {
        self == SessionState::Active
    }

    /// Pulsing ring around the button.
    pub fn shows_ring(self) -> bool {
        self == SessionState::Active
    }

    pub fn headline(self) -> &'static str {
        match self {
            SessionState::Active => "Agent Connected",
            _ => "Talk to our AI",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            SessionState::Active => "Tap the red button to hang up.",
            _ => "Tap the microphone to start.",
        }
    }

    /// Text under the button when no level bars are shown.
    pub fn status_label(self) -> &'static str {
        match self {
            SessionState::Idle => "Ready",
            SessionState::Connecting => "Connecting...",
            SessionState::Active => "Live",
        }
    }
}

// ---------------------------------------------------------------------------
// WidgetState
// ---------------------------------------------------------------------------

/// Everything the UI needs to render the voice demo.
#[derive(Debug, Default)]
pub struct WidgetState {
    /// Current session phase.
    pub session: SessionState,
    /// Classified error from the most recent failure, shown inline.
    pub error: ErrorClassification,
    /// Live microphone level, written by the capture thread.
    pub level: LevelMeter,
}

impl WidgetState {
    pub fn new(level: LevelMeter) -> Self {
        Self {
            session: SessionState::Idle,
            error: ErrorClassification::None,
            level,
        }
    }
}

/// Thread-safe handle to [`WidgetState`].
///
/// Lock for a short critical section; do **not** hold the lock across
/// `.await` points.
pub type SharedWidgetState = Arc<Mutex<WidgetState>>;

/// Construct a new [`SharedWidgetState`] around `level`.
pub fn new_shared_state(level: LevelMeter) -> SharedWidgetState {
    Arc::new(Mutex::new(WidgetState::new(level)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
