use serde::{Deserialize, Serialize};

/// Relationship between the viewer and a recommended user, derived once per
/// fetched record and never persisted.
#[derive(Eq, PartialEq, Hash, Clone, Copy, Debug, Serialize, Deserialize, Default)]
pub enum Relationship {
    #[default]
    Requestable,
    /// The viewer sent a request that is still waiting on the other user.
    AwaitingSentConfirmation,
    /// The other user sent the viewer a request.
    AwaitingIncomingResponse,
}

/// What a discovery card offers. Both awaiting states present the same way.
#[derive(Eq, PartialEq, Hash, Clone, Copy, Debug, Serialize, Deserialize)]
pub enum CardAction {
    SendFriendRequest,
    SeeNotification,
}

impl Relationship {
    pub fn is_requestable(&self) -> bool {
        matches!(self, Relationship::Requestable)
    }
    pub fn is_awaiting(&self) -> bool {
        !self.is_requestable()
    }
    pub fn card_action(&self) -> CardAction {
        match self {
            Relationship::Requestable => CardAction::SendFriendRequest,
            Relationship::AwaitingSentConfirmation | Relationship::AwaitingIncomingResponse => {
                CardAction::SeeNotification
            }
        }
    }
}

impl CardAction {
    pub fn label(&self) -> &'static str {
        match self {
            CardAction::SendFriendRequest => "Send Friend Request",
            CardAction::SeeNotification => "See Notification",
        }
    }
}
