//! Completion payloads.
//!
//! When an action reaches a terminal result its owner receives an
//! [`ActionCompletion`]. This is the only data the execution engine
//! exposes upward to the behavior layer.

use serde::{Deserialize, Serialize};

use crate::enums::{ActionResult, ObjectInteractionResult};
use crate::ids::{ActionTag, ObjectId};

/// Maneuver-specific result data attached to a completion.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompletionPayload {
    /// The action carries no domain data.
    #[default]
    None,
    /// An object interaction finished.
    ObjectInteraction(ObjectInteractionCompleted),
}

impl CompletionPayload {
    /// The interaction payload, if this is one.
    pub const fn object_interaction(&self) -> Option<&ObjectInteractionCompleted> {
        match self {
            Self::ObjectInteraction(info) => Some(info),
            Self::None => None,
        }
    }
}

/// Which objects an interaction involved and how it ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInteractionCompleted {
    /// Objects involved, most relevant first.
    pub object_ids: Vec<ObjectId>,
    /// Domain-level diagnosis.
    pub result: ObjectInteractionResult,
}

/// Completion signal emitted when an action terminates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCompletion {
    /// Tag of the completed action.
    pub tag: ActionTag,
    /// Display name of the completed action.
    pub name: String,
    /// Terminal result.
    pub result: ActionResult,
    /// Maneuver-specific data.
    pub payload: CompletionPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_payload_is_empty() {
        assert!(CompletionPayload::default().object_interaction().is_none());
    }

    #[test]
    fn completion_serializes_to_json() {
        let id = ObjectId::new();
        let completion = ActionCompletion {
            tag: ActionTag(12),
            name: "PickupObject".to_owned(),
            result: ActionResult::Success,
            payload: CompletionPayload::ObjectInteraction(ObjectInteractionCompleted {
                object_ids: vec![id],
                result: ObjectInteractionResult::Success,
            }),
        };
        let json = serde_json::to_value(&completion).ok();
        let tag = json.as_ref().and_then(|v| v.get("tag")).and_then(serde_json::Value::as_u64);
        assert_eq!(tag, Some(12));
        let restored: Option<ActionCompletion> =
            json.and_then(|v| serde_json::from_value(v).ok());
        assert_eq!(restored, Some(completion));
    }
}
