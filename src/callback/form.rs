//! Callback form model shared between the UI and the submitter.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::phone::PhoneField;
use super::submitter::SubmitError;

// ---------------------------------------------------------------------------
// CallbackRequest
// ---------------------------------------------------------------------------

/// Payload posted to the automation webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallbackRequest {
    pub name: String,
    pub address: String,
    pub phone: String,
}

impl CallbackRequest {
    /// Check required fields, reporting the first one that is missing.
    ///
    /// The phone needs at least one digit after its country-code token.
    pub fn validate(&self) -> Result<(), SubmitError> {
        if self.name.trim().is_empty() {
            return Err(SubmitError::Invalid("name"));
        }
        if self.address.trim().is_empty() {
            return Err(SubmitError::Invalid("address"));
        }
        let number = self
            .phone
            .trim()
            .split_once(' ')
            .map(|(_, rest)| rest)
            .unwrap_or_default();
        if !number.chars().any(|c| c.is_ascii_digit()) {
            return Err(SubmitError::Invalid("phone"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CallbackStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallbackStatus {
    #[default]
    Idle,
    Sending,
    Success,
    Error,
}

impl CallbackStatus {
    pub fn submit_enabled(self) -> bool {
        matches!(self, CallbackStatus::Idle | CallbackStatus::Error)
    }

    pub fn button_label(self) -> &'static str {
        match self {
            CallbackStatus::Sending => "Calling...",
            CallbackStatus::Success => "Request Sent",
            _ => "Call Me Now",
        }
    }

    pub fn message(self) -> Option<&'static str> {
        match self {
            CallbackStatus::Success => Some("Success! Expect a call in a few seconds."),
            CallbackStatus::Error => Some("Something went wrong. Please try again."),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// CallbackForm
// ---------------------------------------------------------------------------

/// Field values and submission status of the callback form.
#[derive(Debug, Clone)]
pub struct CallbackForm {
    pub name: String,
    pub address: String,
    pub phone: PhoneField,
    pub status: CallbackStatus,
    /// Description of the last failed submission.
    pub last_error: Option<String>,
}

impl CallbackForm {
    pub fn new(country_code: &str) -> Self {
        Self {
            name: String::new(),
            address: String::new(),
            phone: PhoneField::new(country_code),
            status: CallbackStatus::Idle,
            last_error: None,
        }
    }

    /// True when the submit button should accept a press.
    pub fn can_submit(&self) -> bool {
        self.status.submit_enabled()
            && !self.name.trim().is_empty()
            && !self.address.trim().is_empty()
            && self.phone.has_number()
    }

    /// Snapshot of the current fields as a request payload.
    pub fn request(&self) -> CallbackRequest {
        CallbackRequest {
            name: self.name.trim().to_string(),
            address: self.address.trim().to_string(),
            phone: self.phone.value().trim_end().to_string(),
        }
    }

    /// Failure detail shown under the error message.  Only present while the
    /// form is in the Error state.
    pub fn error_detail(&self) -> Option<&str> {
        match self.status {
            CallbackStatus::Error => self.last_error.as_deref(),
            _ => None,
        }
    }

    /// Reset the fields; the status is left alone.
    pub fn clear_fields(&mut self) {
        self.name.clear();
        self.address.clear();
        self.phone.clear();
    }
}

/// Thread-safe handle to [`CallbackForm`], shared by the UI and the
/// submitter.  Never held across `.await`.
pub type SharedCallbackForm = Arc<Mutex<CallbackForm>>;

pub fn new_shared_form(country_code: &str) -> SharedCallbackForm {
    Arc::new(Mutex::new(CallbackForm::new(country_code)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> CallbackForm {
        let mut form = CallbackForm::new("+1");
        form.name = " Ada ".into();
        form.address = "1 Main St".into();
        form.phone.edit("+1 555 123 4567 ");
        form
    }

    #[test]
    fn request_trims_fields() {
        let request = filled().request();
        assert_eq!(request.name, "Ada");
        assert_eq!(request.phone, "+1 555 123 4567");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn validate_reports_first_missing_field() {
        let mut request = filled().request();
        request.name = "  ".into();
        request.address.clear();
        assert_eq!(request.validate(), Err(SubmitError::Invalid("name")));

        let mut request = filled().request();
        request.address.clear();
        assert_eq!(request.validate(), Err(SubmitError::Invalid("address")));

        let mut request = filled().request();
        request.phone = "+1".into();
        assert_eq!(request.validate(), Err(SubmitError::Invalid("phone")));
    }

    #[test]
    fn submit_disabled_while_sending_or_after_success() {
        let mut form = filled();
        assert!(form.can_submit());

        form.status = CallbackStatus::Sending;
        assert!(!form.can_submit());
        form.status = CallbackStatus::Success;
        assert!(!form.can_submit());
        form.status = CallbackStatus::Error;
        assert!(form.can_submit());
    }

    #[test]
    fn incomplete_form_cannot_submit() {
        let mut form = filled();
        form.phone.clear();
        assert!(!form.can_submit());
    }

    #[test]
    fn clear_fields_keeps_status() {
        let mut form = filled();
        form.status = CallbackStatus::Success;
        form.clear_fields();
        assert!(form.name.is_empty());
        assert_eq!(form.phone.value(), "+1 ");
        assert_eq!(form.status, CallbackStatus::Success);
    }

    #[test]
    fn error_detail_only_while_in_error() {
        let mut form = filled();
        form.last_error = Some("webhook rejected request (500)".into());
        assert_eq!(form.error_detail(), None);

        form.status = CallbackStatus::Error;
        assert_eq!(form.error_detail(), Some("webhook rejected request (500)"));

        form.last_error = None;
        assert_eq!(form.error_detail(), None);
    }

    #[test]
    fn payload_serializes_three_fields() {
        let json = serde_json::to_value(filled().request()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "Ada", "address": "1 Main St", "phone": "+1 555 123 4567"})
        );
    }
}
