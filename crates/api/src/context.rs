use stockbook_core::{ActorContext, UserId};

/// Identity of the caller for a request.
///
/// Inserted by the actor middleware; must be present for all document routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequestActor {
    user_id: UserId,
}

impl RequestActor {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Actor context stamped with the time the handler runs.
    pub fn context(&self) -> ActorContext {
        ActorContext::now(self.user_id)
    }
}
