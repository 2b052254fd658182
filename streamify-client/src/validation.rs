//! Client-side form state and the mapping of 422 responses onto it.

use std::collections::BTreeMap;

use streamify_common::{OnboardingRequest, SigninRequest, SignupRequest, User};
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::error::{ApiError, ValidationErrors};
use crate::notify::Notifier;

pub const SERVER_ERROR_MESSAGE: &str =
    "Sorry we have problem in our server. Please try again later!";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldState {
    pub value: String,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormState {
    fields: BTreeMap<String, FieldState>,
}

impl FormState {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(|name| (name.into(), FieldState::default())).collect(),
        }
    }

    pub fn signup() -> Self {
        Self::new(["fullname", "email", "password"])
    }

    pub fn signin() -> Self {
        Self::new(["email", "password"])
    }

    pub fn onboarding() -> Self {
        Self::new(["fullname", "bio", "native_lng", "learning_lng", "location", "profile_pic"])
    }

    pub fn field(&self, name: &str) -> Option<&FieldState> {
        self.fields.get(name)
    }

    pub fn value(&self, name: &str) -> &str {
        self.fields.get(name).map_or("", |field| field.value.as_str())
    }

    pub fn error(&self, name: &str) -> Option<&str> {
        self.fields.get(name)?.error.as_deref()
    }

    /// Returns false for a field this form does not have.
    pub fn set_value(&mut self, name: &str, value: impl Into<String>) -> bool {
        match self.fields.get_mut(name) {
            Some(field) => {
                field.value = value.into();
                true
            }
            None => false,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.fields.values().any(|field| field.error.is_some())
    }

    pub fn clear_errors(&mut self) {
        for field in self.fields.values_mut() {
            field.error = None;
        }
    }

    /// Attaches the first message of each field this form knows. Messages for
    /// unknown fields are ignored and other fields are left untouched.
    /// Returns how many fields received an error.
    pub fn apply_validation_errors(&mut self, errors: &ValidationErrors) -> usize {
        let mut applied = 0;
        for (name, messages) in &errors.0 {
            let (Some(field), Some(message)) = (self.fields.get_mut(name), messages.first()) else {
                debug!(field = %name, "ignoring error for unknown field");
                continue;
            };
            field.error = Some(message.clone());
            applied += 1;
        }
        applied
    }

    pub fn signup_request(&self) -> SignupRequest {
        SignupRequest {
            fullname: self.value("fullname").to_string(),
            email: self.value("email").to_string(),
            password: self.value("password").to_string(),
        }
    }

    pub fn signin_request(&self) -> SigninRequest {
        SigninRequest {
            email: self.value("email").to_string(),
            password: self.value("password").to_string(),
        }
    }

    pub fn onboarding_request(&self) -> OnboardingRequest {
        OnboardingRequest {
            fullname: self.value("fullname").to_string(),
            bio: self.value("bio").to_string(),
            native_lng: self.value("native_lng").to_string(),
            learning_lng: self.value("learning_lng").to_string(),
            location: self.value("location").to_string(),
            profile_pic: self.value("profile_pic").to_string(),
        }
    }

    /// Routes a failed submission: validation errors go onto the form, any
    /// other failure becomes the generic server notification. The server's
    /// own text is only logged.
    pub fn absorb(&mut self, err: &ApiError, notifier: &dyn Notifier) {
        match err {
            ApiError::Validation(errors) => {
                self.apply_validation_errors(errors);
            }
            other => {
                warn!(err = %other, "form submission failed");
                notifier.error(SERVER_ERROR_MESSAGE);
            }
        }
    }
}

fn settle(
    result: Result<User, ApiError>,
    form: &mut FormState,
    notifier: &dyn Notifier,
) -> Option<User> {
    match result {
        Ok(user) => Some(user),
        Err(err) => {
            form.absorb(&err, notifier);
            None
        }
    }
}

pub async fn submit_signup(
    api: &ApiClient,
    form: &mut FormState,
    notifier: &dyn Notifier,
) -> Option<User> {
    form.clear_errors();
    let result = api.signup(&form.signup_request()).await;
    settle(result, form, notifier)
}

pub async fn submit_signin(
    api: &ApiClient,
    form: &mut FormState,
    notifier: &dyn Notifier,
) -> Option<User> {
    form.clear_errors();
    let result = api.signin(&form.signin_request()).await;
    settle(result, form, notifier)
}

pub async fn submit_onboarding(
    api: &ApiClient,
    form: &mut FormState,
    notifier: &dyn Notifier,
) -> Option<User> {
    form.clear_errors();
    let result = api.onboarding(&form.onboarding_request()).await;
    settle(result, form, notifier)
}
