use std::{cell::RefCell, rc::Rc};

/// The user id most recently announced by the page.
///
/// Clones share the same slot: the identity relay writes it and the track
/// source reads it when naming the database.
#[derive(Debug, Clone, Default)]
pub struct UserSession {
    user_id: Rc<RefCell<Option<String>>>,
}

impl UserSession {
    /// The current user id, if one was announced.
    pub fn user_id(&self) -> Option<String> {
        self.user_id.borrow().clone()
    }

    /// Remembers `user_id`, replacing any earlier one.
    pub fn set_user_id(&self, user_id: String) {
        *self.user_id.borrow_mut() = Some(user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn it_shares_the_user_id_between_clones() {
        let session = UserSession::default();
        let reader = session.clone();

        assert_eq!(reader.user_id(), None);

        session.set_user_id("1".to_string());
        session.set_user_id("2".to_string());

        assert_eq!(reader.user_id().as_deref(), Some("2"));
    }
}
