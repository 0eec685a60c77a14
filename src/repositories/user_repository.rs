use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::PaymentError;
use crate::models::User;

pub struct UserRepository {
    users: DashMap<Uuid, User>,
    by_email: DashMap<String, Uuid>,
}

impl UserRepository {
    pub fn new() -> Self {
        UserRepository {
            users: DashMap::new(),
            by_email: DashMap::new(),
        }
    }

    /// Email uniqueness is decided under the index entry lock.
    pub fn create(&self, email: &str, now: DateTime<Utc>) -> Result<User, PaymentError> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(PaymentError::Validation(format!(
                "invalid email address: {email}"
            )));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: email.clone(),
            kyc_verified: false,
            created_at: now,
        };

        match self.by_email.entry(email) {
            Entry::Occupied(_) => {
                return Err(PaymentError::Validation(
                    "email is already registered".into(),
                ));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(user.id);
            }
        }
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    pub fn find(&self, user_id: Uuid) -> Result<User, PaymentError> {
        self.users
            .get(&user_id)
            .map(|u| u.clone())
            .ok_or_else(|| PaymentError::NotFound(format!("user {user_id} not found")))
    }

    pub fn find_by_email(&self, email: &str) -> Result<User, PaymentError> {
        let email = normalize_email(email);
        let user_id = self
            .by_email
            .get(&email)
            .map(|id| *id)
            .ok_or_else(|| PaymentError::NotFound(format!("no user with email {email}")))?;
        self.find(user_id)
    }

    pub fn set_kyc_verified(
        &self,
        user_id: Uuid,
        verified: bool,
    ) -> Result<User, PaymentError> {
        let mut user = self
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PaymentError::NotFound(format!("user {user_id} not found")))?;
        user.kyc_verified = verified;
        Ok(user.clone())
    }
}

impl Default for UserRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
