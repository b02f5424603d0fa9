//! Mapping raw provider/device errors to what the visitor is told.
//!
//! The transport reports stale device handles, OS exclusivity locks and
//! denied permissions as similarly shaped payloads.  [`classify`] pattern
//! matches those payloads into an [`ErrorClassification`].  The rules are
//! best-effort: provider wording changes between versions, and anything
//! unrecognised falls back to [`ErrorClassification::ConnectionFailed`].

use std::fmt;

use crate::audio::AcquireError;

// ---------------------------------------------------------------------------
// RawFault
// ---------------------------------------------------------------------------

/// Opaque error payload as received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFault {
    /// Error name when the source has one (e.g. `"NotReadableError"`).
    pub name: Option<String>,
    /// Message or serialized payload.
    pub detail: String,
}

impl RawFault {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            name: None,
            detail: detail.into(),
        }
    }

    pub fn named(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for RawFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}: {}", self.detail),
            None => f.write_str(&self.detail),
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorClassification
// ---------------------------------------------------------------------------

/// User-facing error category shown under the call button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorClassification {
    #[default]
    None,
    /// The input device is held by another application.
    MicrophoneBusy,
    /// The OS or the visitor denied microphone access.
    MicrophonePermissionDenied,
    /// Anything else that kept the session from starting or running.
    ConnectionFailed,
}

impl ErrorClassification {
    pub fn is_none(self) -> bool {
        self == ErrorClassification::None
    }

    /// Inline message, or `None` when there is nothing to show.
    pub fn message(self) -> Option<&'static str> {
        match self {
            ErrorClassification::None => None,
            ErrorClassification::MicrophoneBusy => Some("Microphone is busy. Close other apps."),
            ErrorClassification::MicrophonePermissionDenied => Some("Microphone permission denied."),
            ErrorClassification::ConnectionFailed => Some("Failed to connect. Check the logs."),
        }
    }
}

impl From<&AcquireError> for ErrorClassification {
    fn from(err: &AcquireError) -> Self {
        match err {
            AcquireError::PermissionDenied(_) => ErrorClassification::MicrophonePermissionDenied,
            AcquireError::DeviceUnavailable(_) => ErrorClassification::MicrophoneBusy,
        }
    }
}

// ---------------------------------------------------------------------------
// classify
// ---------------------------------------------------------------------------

/// Fault names the transport gives to network and HTTP failures.  Their
/// detail is provider text (status bodies, socket errors) and never describes
/// the local microphone.
pub const NETWORK_FAULTS: &[&str] = &[
    "HttpError",
    "SessionRejected",
    "MalformedReply",
    "WebSocketError",
    "TimeoutError",
];

const BUSY_MARKERS: &[&str] = &[
    "notreadableerror",
    "could not start audio source",
    "device in use",
];

const DENIED_MARKERS: &[&str] = &[
    "notallowederror",
    "permissiondenied",
    "permission denied",
];

/// Classify a raw transport error.
///
/// ```
/// use voice_demo::session::{classify, ErrorClassification, RawFault};
///
/// let fault = RawFault::new(r#"{"error":{"name":"NotReadableError"}}"#);
/// assert_eq!(classify(&fault), ErrorClassification::MicrophoneBusy);
/// ```
pub fn classify(fault: &RawFault) -> ErrorClassification {
    if let Some(name) = &fault.name {
        if NETWORK_FAULTS.contains(&name.as_str()) {
            return ErrorClassification::ConnectionFailed;
        }
    }

    let haystack = match &fault.name {
        Some(name) => format!("{name} {}", fault.detail),
        None => fault.detail.clone(),
    }
    .to_ascii_lowercase();

    let contains_any = |markers: &[&str]| markers.iter().any(|m| haystack.contains(m));

    if contains_any(BUSY_MARKERS) {
        ErrorClassification::MicrophoneBusy
    } else if contains_any(DENIED_MARKERS) {
        ErrorClassification::MicrophonePermissionDenied
    } else {
        ErrorClassification::ConnectionFailed
    }
}
