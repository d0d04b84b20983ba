use perfdesk_core::types::{collections::USERS, User};
use serde_json::json;

use crate::codec;
use crate::error::{LogFailure, Result};
use crate::resolver::Resolver;

/// Accounts, keyed by the auth provider's user id.
#[derive(Clone)]
pub struct UserRepository {
    resolver: Resolver,
}

impl UserRepository {
    pub fn new(resolver: Resolver) -> Self {
        Self { resolver }
    }

    /// Write the account record for `user_id`, replacing any previous one.
    pub async fn create(&self, user_id: &str, user: User) -> Result<User> {
        let user = User {
            id: user_id.to_string(),
            ..user
        };
        let path = format!("{USERS}/{user_id}");
        self.resolver
            .store()
            .write(&path, codec::encode(&user)?)
            .await
            .log_failure(|| format!("Create {path}"))?;
        Ok(user)
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<User>> {
        self.resolver
            .get(USERS, user_id)
            .await?
            .map(|value| codec::decode(USERS, user_id, value))
            .transpose()
    }

    /// Accounts holding `role`.
    pub async fn with_role(&self, role: &str) -> Result<Vec<User>> {
        let records = self.resolver.scan_where(USERS, "role", &json!(role)).await?;
        Ok(codec::decode_list(USERS, records))
    }
}
