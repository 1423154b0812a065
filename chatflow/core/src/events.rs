//! User Actions
//!
//! Inputs from the rendering surface to the controller. The surface turns
//! key presses, clicks and commands into these and hands them to
//! [`SessionController::handle_action`](crate::controller::SessionController::handle_action).

use serde::{Deserialize, Serialize};

/// Actions a user can take
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserAction {
    /// Ask a question in the active conversation
    Send {
        /// The question text
        text: String,
    },

    /// Open a prior conversation
    SwitchConversation {
        /// Backend conversation id
        conversation_id: String,
    },

    /// Start an empty conversation
    NewConversation,

    /// Re-fetch the conversation directory
    RefreshConversations,

    /// Stop the answer being streamed
    Cancel,

    /// Tear down the controller
    Dispose,
}

impl UserAction {
    /// Create a send action
    pub fn send(text: impl Into<String>) -> Self {
        Self::Send { text: text.into() }
    }

    /// Create a switch action
    pub fn switch(conversation_id: impl Into<String>) -> Self {
        Self::SwitchConversation {
            conversation_id: conversation_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_format() {
        let json = serde_json::to_value(UserAction::switch("c1")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "switch_conversation", "conversation_id": "c1" })
        );

        let action: UserAction = serde_json::from_str(r#"{"type":"cancel"}"#).unwrap();
        assert_eq!(action, UserAction::Cancel);
    }
}
