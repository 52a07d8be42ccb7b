use natours_auth::{Role, User, UserView};
use natours_core::UserId;

/// The account a verified session token resolved to.
///
/// Inserted into the request extensions by [`crate::middleware::protect`];
/// present for every route behind it.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn id(&self) -> UserId {
        self.0.id
    }

    pub fn role(&self) -> Role {
        self.0.role
    }

    pub fn view(&self) -> UserView {
        UserView::from(&self.0)
    }
}
