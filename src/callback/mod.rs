//! Callback request module: the "call me" form and its webhook submitter.
//!
//! Independent of the voice session; the two share no state.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voice_demo::callback::{new_shared_form, CallbackSubmitter, WebhookEndpoint};
//! use voice_demo::config::CallbackConfig;
//!
//! # async fn example() {
//! let config = CallbackConfig::default();
//! let form = new_shared_form(&config.country_code);
//! let submitter = CallbackSubmitter::from_config(
//!     form.clone(),
//!     Arc::new(WebhookEndpoint::from_config(&config)),
//!     &config,
//! );
//!
//! {
//!     let mut f = form.lock().unwrap();
//!     f.name = "Ada".into();
//!     f.address = "1 Main St".into();
//!     f.phone.edit("+1 555 123 4567");
//! }
//! if let Err(e) = submitter.submit().await {
//!     eprintln!("{e}");
//! }
//! # }
//! ```

pub mod endpoint;
pub mod form;
pub mod phone;
pub mod submitter;

pub use endpoint::{CallbackEndpoint, CallbackError, WebhookEndpoint};
pub use form::{new_shared_form, CallbackForm, CallbackRequest, CallbackStatus, SharedCallbackForm};
pub use phone::PhoneField;
pub use submitter::{CallbackSubmitter, SubmitError};
