use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::PaymentError;
use crate::models::{Reservation, Wallet, WalletType};

/// In-process wallet store. Each wallet sits behind its own mutex; two-wallet
/// operations take both locks in ascending wallet-id order so concurrent
/// opposite transfers cannot deadlock.
pub struct WalletRepository {
    wallets: RwLock<HashMap<Uuid, Arc<Mutex<Wallet>>>>,
    by_user: RwLock<HashMap<(Uuid, WalletType), Uuid>>,
    reservations: DashMap<Uuid, Reservation>,
}

fn lock_wallet(cell: &Arc<Mutex<Wallet>>) -> MutexGuard<'_, Wallet> {
    // A panicked holder leaves balances it already validated; keep serving.
    cell.lock().unwrap_or_else(PoisonError::into_inner)
}

impl WalletRepository {
    pub fn new() -> Self {
        WalletRepository {
            wallets: RwLock::new(HashMap::new()),
            by_user: RwLock::new(HashMap::new()),
            reservations: DashMap::new(),
        }
    }

    /// Creates the main and savings wallets a new account starts with.
    pub fn create_pair(
        &self,
        user_id: Uuid,
        savings_settlement_delay_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<(Wallet, Wallet), PaymentError> {
        let mut by_user = self
            .by_user
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if by_user.contains_key(&(user_id, WalletType::Main)) {
            return Err(PaymentError::InvalidState(format!(
                "wallets already exist for user {user_id}"
            )));
        }

        let main = Wallet::new(user_id, WalletType::Main, 0, now);
        let savings = Wallet::new(
            user_id,
            WalletType::Savings,
            savings_settlement_delay_minutes,
            now,
        );

        let mut wallets = self
            .wallets
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        wallets.insert(main.id, Arc::new(Mutex::new(main.clone())));
        wallets.insert(savings.id, Arc::new(Mutex::new(savings.clone())));
        by_user.insert((user_id, WalletType::Main), main.id);
        by_user.insert((user_id, WalletType::Savings), savings.id);

        Ok((main, savings))
    }

    fn handle(&self, wallet_id: Uuid) -> Result<Arc<Mutex<Wallet>>, PaymentError> {
        self.wallets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&wallet_id)
            .cloned()
            .ok_or_else(|| PaymentError::NotFound(format!("wallet {wallet_id} not found")))
    }

    pub fn find(&self, wallet_id: Uuid) -> Result<Wallet, PaymentError> {
        let cell = self.handle(wallet_id)?;
        let wallet = lock_wallet(&cell);
        Ok(wallet.clone())
    }

    pub fn find_by_user_and_type(
        &self,
        user_id: Uuid,
        wallet_type: WalletType,
    ) -> Result<Wallet, PaymentError> {
        let wallet_id = self
            .by_user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(user_id, wallet_type))
            .copied()
            .ok_or_else(|| {
                PaymentError::NotFound(format!("no {wallet_type} wallet for user {user_id}"))
            })?;
        self.find(wallet_id)
    }

    /// Main wallet first, then savings.
    pub fn list_for_user(&self, user_id: Uuid) -> Vec<Wallet> {
        [WalletType::Main, WalletType::Savings]
            .into_iter()
            .filter_map(|t| self.find_by_user_and_type(user_id, t).ok())
            .collect()
    }

    pub fn credit(
        &self,
        wallet_id: Uuid,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<Wallet, PaymentError> {
        if amount <= 0 {
            return Err(PaymentError::Validation(
                "credit amount must be positive".into(),
            ));
        }
        let cell = self.handle(wallet_id)?;
        let mut wallet = lock_wallet(&cell);
        wallet.balance += amount;
        wallet.available_balance += amount;
        wallet.updated_at = now;
        Ok(wallet.clone())
    }

    /// Immediate debit of settled, unheld funds.
    pub fn debit(
        &self,
        wallet_id: Uuid,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<Wallet, PaymentError> {
        if amount <= 0 {
            return Err(PaymentError::Validation(
                "debit amount must be positive".into(),
            ));
        }
        let cell = self.handle(wallet_id)?;
        let mut wallet = lock_wallet(&cell);
        check_outflow_allowed(&wallet, amount, now)?;
        wallet.balance -= amount;
        wallet.available_balance -= amount;
        wallet.updated_at = now;
        Ok(wallet.clone())
    }

    /// Moves funds between two wallets under both locks, so no interleaving
    /// can observe the money in neither wallet or in both.
    pub fn transfer(
        &self,
        from_wallet_id: Uuid,
        to_wallet_id: Uuid,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<(Wallet, Wallet), PaymentError> {
        if amount <= 0 {
            return Err(PaymentError::Validation(
                "transfer amount must be positive".into(),
            ));
        }
        if from_wallet_id == to_wallet_id {
            return Err(PaymentError::Validation(
                "cannot transfer a wallet to itself".into(),
            ));
        }

        let from_cell = self.handle(from_wallet_id)?;
        let to_cell = self.handle(to_wallet_id)?;

        // Ascending-id order; the source guard is whichever matches.
        let (first, second) = if from_wallet_id < to_wallet_id {
            (&from_cell, &to_cell)
        } else {
            (&to_cell, &from_cell)
        };
        let mut first_guard = lock_wallet(first);
        let mut second_guard = lock_wallet(second);
        let (from, to) = if from_wallet_id < to_wallet_id {
            (&mut *first_guard, &mut *second_guard)
        } else {
            (&mut *second_guard, &mut *first_guard)
        };

        check_outflow_allowed(from, amount, now)?;

        from.balance -= amount;
        from.available_balance -= amount;
        from.updated_at = now;
        to.balance += amount;
        to.available_balance += amount;
        to.updated_at = now;

        Ok((from.clone(), to.clone()))
    }

    /// Places a hold: available drops, balance stays until commit. Wallets
    /// with a settlement delay get an `earliest_commit_at` in the future.
    pub fn reserve(
        &self,
        wallet_id: Uuid,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<Reservation, PaymentError> {
        if amount <= 0 {
            return Err(PaymentError::Validation(
                "reservation amount must be positive".into(),
            ));
        }
        let cell = self.handle(wallet_id)?;
        let mut wallet = lock_wallet(&cell);
        check_outflow_allowed(&wallet, amount, now)?;

        wallet.available_balance -= amount;
        wallet.updated_at = now;

        let reservation = Reservation {
            id: Uuid::new_v4(),
            wallet_id,
            amount,
            earliest_commit_at: (wallet.settlement_delay_minutes > 0)
                .then(|| now + Duration::minutes(wallet.settlement_delay_minutes)),
            created_at: now,
        };
        self.reservations.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    pub fn find_reservation(&self, reservation_id: Uuid) -> Option<Reservation> {
        self.reservations.get(&reservation_id).map(|r| r.clone())
    }

    /// Settles a hold: the held amount leaves the balance. Fails closed if
    /// the settlement delay has not elapsed, leaving the hold in place.
    pub fn commit_reservation(
        &self,
        reservation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Wallet, PaymentError> {
        let reservation = self.find_reservation(reservation_id).ok_or_else(|| {
            PaymentError::NotFound(format!("reservation {reservation_id} not found"))
        })?;
        if let Some(earliest) = reservation.earliest_commit_at {
            if now < earliest {
                return Err(PaymentError::InvalidState(format!(
                    "reservation {reservation_id} settles at {earliest}"
                )));
            }
        }
        let (_, reservation) = self.reservations.remove(&reservation_id).ok_or_else(|| {
            PaymentError::NotFound(format!("reservation {reservation_id} not found"))
        })?;

        let cell = self.handle(reservation.wallet_id)?;
        let mut wallet = lock_wallet(&cell);
        wallet.balance -= reservation.amount;
        wallet.updated_at = now;
        Ok(wallet.clone())
    }

    /// Cancels a hold and restores the held amount to available.
    pub fn release_reservation(
        &self,
        reservation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Wallet, PaymentError> {
        let (_, reservation) = self.reservations.remove(&reservation_id).ok_or_else(|| {
            PaymentError::NotFound(format!("reservation {reservation_id} not found"))
        })?;

        let cell = self.handle(reservation.wallet_id)?;
        let mut wallet = lock_wallet(&cell);
        wallet.available_balance += reservation.amount;
        wallet.updated_at = now;
        Ok(wallet.clone())
    }

    /// Savings lock-in. An active lock can be extended, never shortened or
    /// cleared; it falls away on its own once the date passes.
    pub fn set_lock_in(
        &self,
        wallet_id: Uuid,
        until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Wallet, PaymentError> {
        let cell = self.handle(wallet_id)?;
        let mut wallet = lock_wallet(&cell);
        if wallet.wallet_type != WalletType::Savings {
            return Err(PaymentError::Validation(
                "lock-in applies to savings wallets only".into(),
            ));
        }
        if let Some(new_until) = until {
            if new_until <= now {
                return Err(PaymentError::Validation(
                    "lock-in date must be in the future".into(),
                ));
            }
            if wallet.is_locked_at(now) {
                if let Some(existing) = wallet.lock_in_until {
                    if new_until < existing {
                        return Err(PaymentError::InvalidState(
                            "an active lock-in cannot be shortened".into(),
                        ));
                    }
                }
            }
        } else if wallet.is_locked_at(now) {
            return Err(PaymentError::InvalidState(
                "an active lock-in cannot be cleared".into(),
            ));
        }
        wallet.lock_in_until = until;
        wallet.updated_at = now;
        Ok(wallet.clone())
    }
}

impl Default for WalletRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn check_outflow_allowed(
    wallet: &Wallet,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<(), PaymentError> {
    if wallet.is_locked_at(now) {
        let until = wallet.lock_in_until.unwrap_or(now);
        return Err(PaymentError::InvalidState(format!(
            "wallet {} is locked until {until}",
            wallet.id
        )));
    }
    if wallet.available_balance < amount {
        return Err(PaymentError::InsufficientFunds {
            wallet_id: wallet.id,
            available: wallet.available_balance,
            requested: amount,
        });
    }
    Ok(())
}
