//! Account creation.

use serde_json::json;

use console_shared::constants::{PASSWORD_MAX_CHARS, PASSWORD_MIN_CHARS, USERNAME_MAX_CHARS};
use console_shared::error::{ConsoleError, Result};
use console_shared::protocol::Transport;
use console_shared::records::User;

use super::ListingView;
use crate::actions::notify_after_refresh;
use crate::notify::Notification;

/// The "add user" form. An empty display name defaults to the username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub display_name: String,
    pub password: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<()> {
        let username = self.username.trim().chars().count();
        if username == 0 || username > USERNAME_MAX_CHARS {
            return Err(ConsoleError::InvalidInput(format!(
                "username must be 1 to {USERNAME_MAX_CHARS} characters"
            )));
        }
        let password = self.password.chars().count();
        if !(PASSWORD_MIN_CHARS..=PASSWORD_MAX_CHARS).contains(&password) {
            return Err(ConsoleError::InvalidInput(format!(
                "password must be {PASSWORD_MIN_CHARS} to {PASSWORD_MAX_CHARS} characters"
            )));
        }
        Ok(())
    }
}

impl<T: Transport> ListingView<User, T> {
    pub async fn create_user(&self, user: NewUser) -> Result<()> {
        if let Err(e) = user.validate() {
            self.notifier().notify(Notification::error(e.user_message()));
            return Err(e);
        }

        let username = user.username.trim();
        let display_name = match user.display_name.trim() {
            "" => username,
            name => name,
        };
        let payload = json!({
            "username": username,
            "display_name": display_name,
            "password": user.password,
        });
        match self.store().create(payload).await {
            Ok(_) => {
                let message = format!("Created user {username}");
                notify_after_refresh(self.store(), self.notifier(), message).await;
                Ok(())
            }
            Err(e) => {
                self.notifier().notify(Notification::error(e.user_message()));
                Err(e)
            }
        }
    }
}
