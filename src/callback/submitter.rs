//! Callback request submitter.
//!
//! Drives [`CallbackStatus`] through `Idle → Sending → Success | Error`.
//! After a success the fields are cleared and a delayed task reverts the
//! status to `Idle`; that task is aborted by the next submission or by
//! [`CallbackSubmitter::shutdown`].

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::CallbackConfig;

use super::endpoint::{CallbackEndpoint, CallbackError};
use super::form::{CallbackForm, CallbackStatus, SharedCallbackForm};

/// Why [`CallbackSubmitter::submit`] did not produce a success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// A submission is in flight or the success message is still showing.
    #[error("a callback request is already being handled")]
    Busy,

    /// A required field is empty.
    #[error("{0} is required")]
    Invalid(&'static str),

    #[error(transparent)]
    Failed(#[from] CallbackError),
}

struct Inner {
    form: SharedCallbackForm,
    endpoint: Arc<dyn CallbackEndpoint>,
    reset_after: Duration,
    revert: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.revert.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }
}

/// Submits the shared callback form to a [`CallbackEndpoint`].
///
/// Cheap to clone; the UI hands a clone to each spawned submission.
#[derive(Clone)]
pub struct CallbackSubmitter {
    inner: Arc<Inner>,
}

impl CallbackSubmitter {
    pub fn new(form: SharedCallbackForm, endpoint: Arc<dyn CallbackEndpoint>, reset_after: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                form,
                endpoint,
                reset_after,
                revert: Mutex::new(None),
            }),
        }
    }

    pub fn from_config(form: SharedCallbackForm, endpoint: Arc<dyn CallbackEndpoint>, config: &CallbackConfig) -> Self {
        Self::new(form, endpoint, Duration::from_secs(config.success_reset_secs))
    }

    pub fn form(&self) -> &SharedCallbackForm {
        &self.inner.form
    }

    /// Validate and post the current form contents.
    pub async fn submit(&self) -> Result<(), SubmitError> {
        let request = {
            let mut form = self.lock_form()?;
            if !form.status.submit_enabled() {
                return Err(SubmitError::Busy);
            }
            let request = form.request();
            request.validate()?;
            form.status = CallbackStatus::Sending;
            form.last_error = None;
            request
        };
        self.cancel_revert();

        log::info!("callback: submitting request");
        let outcome = self.inner.endpoint.post(&request).await;

        let mut form = self.lock_form()?;
        match outcome {
            Ok(()) => {
                form.clear_fields();
                form.status = CallbackStatus::Success;
                drop(form);
                self.schedule_revert();
                Ok(())
            }
            Err(e) => {
                log::warn!("callback: submission failed: {e}");
                form.status = CallbackStatus::Error;
                form.last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Cancel the pending revert.  Call when the form goes away.
    pub fn shutdown(&self) {
        self.cancel_revert();
    }

    fn schedule_revert(&self) {
        let form = Arc::clone(&self.inner.form);
        let delay = self.inner.reset_after;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Ok(mut form) = form.lock() {
                if form.status == CallbackStatus::Success {
                    log::debug!("callback: success message expired");
                    form.status = CallbackStatus::Idle;
                }
            }
        });

        if let Ok(mut slot) = self.inner.revert.lock() {
            if let Some(previous) = slot.replace(task) {
                previous.abort();
            }
        }
    }

    fn cancel_revert(&self) {
        if let Ok(mut slot) = self.inner.revert.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }

    fn lock_form(&self) -> Result<MutexGuard<'_, CallbackForm>, SubmitError> {
        self.inner
            .form
            .lock()
            .map_err(|_| SubmitError::Failed(CallbackError::Network("callback form state poisoned".into())))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::callback::form::{new_shared_form, CallbackRequest};

    struct MockEndpoint {
        calls: AtomicUsize,
        reply: Result<(), CallbackError>,
    }

    #[async_trait]
    impl CallbackEndpoint for MockEndpoint {
        async fn post(&self, _request: &CallbackRequest) -> Result<(), CallbackError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    fn submitter(reply: Result<(), CallbackError>) -> (CallbackSubmitter, Arc<MockEndpoint>) {
        let form = new_shared_form("+1");
        {
            let mut f = form.lock().unwrap();
            f.name = "Ada".into();
            f.address = "1 Main St".into();
            f.phone.edit("+1 555 123 4567");
        }
        let endpoint = Arc::new(MockEndpoint {
            calls: AtomicUsize::new(0),
            reply,
        });
        let submitter = CallbackSubmitter::new(form, endpoint.clone(), Duration::from_secs(5));
        (submitter, endpoint)
    }

    fn status(s: &CallbackSubmitter) -> CallbackStatus {
        s.form().lock().unwrap().status
    }

    #[tokio::test(start_paused = true)]
    async fn success_clears_fields_then_reverts_after_delay() {
        let (submitter, _) = submitter(Ok(()));

        submitter.submit().await.unwrap();
        {
            let form = submitter.form().lock().unwrap();
            assert_eq!(form.status, CallbackStatus::Success);
            assert!(form.name.is_empty());
            assert_eq!(form.phone.value(), "+1 ");
        }

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(status(&submitter), CallbackStatus::Success);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(status(&submitter), CallbackStatus::Idle);
    }

    #[tokio::test]
    async fn failure_keeps_fields() {
        let (submitter, _) = submitter(Err(CallbackError::Rejected(500)));

        let err = submitter.submit().await.unwrap_err();
        assert_eq!(err, SubmitError::Failed(CallbackError::Rejected(500)));

        let form = submitter.form().lock().unwrap();
        assert_eq!(form.status, CallbackStatus::Error);
        assert_eq!(form.name, "Ada");
        assert_eq!(form.phone.value(), "+1 555 123 4567");
        assert!(form.last_error.as_deref().unwrap().contains("500"));
    }

    #[tokio::test]
    async fn resubmit_blocked_while_success_is_showing() {
        let (submitter, endpoint) = submitter(Ok(()));
        submitter.submit().await.unwrap();

        assert_eq!(submitter.submit().await, Err(SubmitError::Busy));
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_allowed_after_error() {
        let (submitter, endpoint) = submitter(Err(CallbackError::Network("down".into())));
        submitter.submit().await.unwrap_err();
        submitter.submit().await.unwrap_err();
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalid_form_is_not_sent() {
        let (submitter, endpoint) = submitter(Ok(()));
        submitter.form().lock().unwrap().address.clear();

        assert_eq!(submitter.submit().await, Err(SubmitError::Invalid("address")));
        assert_eq!(status(&submitter), CallbackStatus::Idle);
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_revert() {
        let (submitter, _) = submitter(Ok(()));
        submitter.submit().await.unwrap();

        submitter.shutdown();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(status(&submitter), CallbackStatus::Success);
    }
}
