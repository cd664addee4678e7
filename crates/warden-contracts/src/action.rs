//! Action input types.
//!
//! An action input is what the caller hands to the policy engine alongside
//! the action name. The engine never inspects it; it is passed through to
//! rule predicates and mask functions untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The four named parts of an action invocation.
///
/// Each part is generic so applications can use their own strongly typed
/// subjects and resources; the defaults are untyped JSON values.
///
/// Example: `ActionInput::new(user).resource(post).data(changes)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionInput<S = Value, R = Value, D = Value, C = Value> {
    /// The acting principal.
    pub subject: S,
    /// The target object. Absent for list-style actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<R>,
    /// Proposed mutation payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<D>,
    /// Free-form extra information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<C>,
}

impl<S, R, D, C> ActionInput<S, R, D, C> {
    /// An input with only a subject.
    pub fn new(subject: S) -> Self {
        Self {
            subject,
            resource: None,
            data: None,
            context: None,
        }
    }

    pub fn resource(mut self, resource: R) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn data(mut self, data: D) -> Self {
        self.data = Some(data);
        self
    }

    pub fn context(mut self, context: C) -> Self {
        self.context = Some(context);
        self
    }
}
