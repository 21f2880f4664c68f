// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Form handlers: sign-in page, profile editor and the email-link landing page.

pub mod callback;
pub mod login;
pub mod profile;

pub use callback::{complete_callback, CallbackOutcome};
pub use login::{Credentials, LoginForm, SignUpOutcome};
pub use profile::ProfileForm;

use validator::ValidationErrors;

/// First validation message, checked in `fields` order.
pub(crate) fn first_message(errors: &ValidationErrors, fields: &[&str]) -> String {
    let field_errors = errors.field_errors();
    fields
        .iter()
        .filter_map(|field| field_errors.get(*field))
        .flat_map(|errs| errs.iter())
        .find_map(|err| err.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| errors.to_string())
}
