use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::{AuthorizationToken, PinSecurityState};

/// PIN security records and outstanding authorization tokens. Attempt
/// counters are mutated under the entry lock, so two concurrent wrong
/// guesses cannot both read the same count.
pub struct PinRepository {
    states: DashMap<Uuid, PinSecurityState>,
    tokens: DashMap<Uuid, AuthorizationToken>,
    consumed_tokens: DashMap<Uuid, DateTime<Utc>>,
}

impl PinRepository {
    pub fn new() -> Self {
        PinRepository {
            states: DashMap::new(),
            tokens: DashMap::new(),
            consumed_tokens: DashMap::new(),
        }
    }

    pub fn upsert_state(&self, state: PinSecurityState) {
        self.states.insert(state.user_id, state);
    }

    pub fn find_state(&self, user_id: Uuid) -> Option<PinSecurityState> {
        self.states.get(&user_id).map(|s| s.clone())
    }

    /// Runs `mutate` on the user's record under the entry lock and returns
    /// the updated copy. `None` if the user has no PIN set.
    pub fn with_state_mut<F>(&self, user_id: Uuid, mutate: F) -> Option<PinSecurityState>
    where
        F: FnOnce(&mut PinSecurityState),
    {
        let mut entry = self.states.get_mut(&user_id)?;
        mutate(&mut entry);
        Some(entry.clone())
    }

    pub fn insert_token(&self, token: AuthorizationToken) {
        self.tokens.insert(token.id, token);
    }

    /// Removes the token if it belongs to `user_id`. Presenting someone
    /// else's token id does not burn it.
    pub fn take_token(&self, token_id: Uuid, user_id: Uuid) -> Option<AuthorizationToken> {
        let removed = self
            .tokens
            .remove_if(&token_id, |_, token| token.user_id == user_id);
        if let Some((id, token)) = removed {
            self.consumed_tokens.insert(id, token.expires_at);
            return Some(token);
        }
        None
    }

    pub fn was_consumed(&self, token_id: Uuid) -> bool {
        self.consumed_tokens.contains_key(&token_id)
    }

    /// Drops expired tokens and tombstones of consumed ones past expiry.
    pub fn purge_expired_tokens(&self, now: DateTime<Utc>) -> usize {
        let before = self.tokens.len() + self.consumed_tokens.len();
        self.tokens.retain(|_, token| token.expires_at > now);
        self.consumed_tokens.retain(|_, expires_at| *expires_at > now);
        before - (self.tokens.len() + self.consumed_tokens.len())
    }
}

impl Default for PinRepository {
    fn default() -> Self {
        Self::new()
    }
}
