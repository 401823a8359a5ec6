//! Sled-backed user store.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};

use crate::errors::{IdentityError, Result};

const USERS_TREE: &str = "users";

/// One registered identity. Created on registration, read on login,
/// never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub password_hash: String,
}

/// Sled-backed identity store, keyed by username.
pub struct UserStore {
    db: Db,
    users: Tree,
}

impl UserStore {
    pub fn open(db: Db) -> Result<Self> {
        let users = db.open_tree(USERS_TREE)?;
        Ok(Self { db, users })
    }

    /// Register a new identity.
    ///
    /// Insert-if-absent via compare-and-swap, so two concurrent
    /// registrations of the same username cannot both succeed. Nothing is
    /// persisted when registration fails.
    pub fn register(&self, username: &str, password: &str) -> Result<User> {
        let password_hash = hash_password(password)?;
        let user = User {
            id: self.db.generate_id()?,
            username: username.to_string(),
            password_hash,
        };
        let record = serde_json::to_vec(&user)?;

        let swapped = self
            .users
            .compare_and_swap(username.as_bytes(), None as Option<&[u8]>, Some(record))?;
        if swapped.is_err() {
            return Err(IdentityError::DuplicateUsername);
        }
        self.users.flush()?;
        Ok(user)
    }

    /// Verify a credential pair, returning the stored identity.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        let record = self
            .users
            .get(username.as_bytes())?
            .ok_or(IdentityError::InvalidCredential)?;
        let user: User = serde_json::from_slice(&record)?;

        if verify_password(password, &user.password_hash)? {
            Ok(user)
        } else {
            Err(IdentityError::InvalidCredential)
        }
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

/// Hash a password using Argon2 with a freshly generated salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| IdentityError::Crypto(format!("password hashing failed: {e}")))?;

    Ok(password_hash.to_string())
}

/// Verify a password against its stored hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| IdentityError::Crypto(format!("invalid hash format: {e}")))?;

    let argon2 = Argon2::default();
    Ok(argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_store() -> (tempfile::TempDir, UserStore) {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path().join("db")).unwrap();
        let store = UserStore::open(db).unwrap();
        (dir, store)
    }

    #[test]
    fn register_then_authenticate() {
        let (_dir, store) = scratch_store();
        store.register("ada", "s3cret").unwrap();

        let user = store.authenticate("ada", "s3cret").unwrap();
        assert_eq!(user.username, "ada");
    }

    #[test]
    fn wrong_password_is_invalid_credential() {
        let (_dir, store) = scratch_store();
        store.register("ada", "s3cret").unwrap();

        let err = store.authenticate("ada", "wrong").unwrap_err();
        assert!(matches!(err, IdentityError::InvalidCredential));
    }

    #[test]
    fn unknown_user_is_invalid_credential() {
        let (_dir, store) = scratch_store();
        let err = store.authenticate("nobody", "whatever").unwrap_err();
        assert!(matches!(err, IdentityError::InvalidCredential));
    }

    #[test]
    fn duplicate_registration_leaves_single_row() {
        let (_dir, store) = scratch_store();
        store.register("ada", "first").unwrap();

        let err = store.register("ada", "second").unwrap_err();
        assert!(matches!(err, IdentityError::DuplicateUsername));
        assert_eq!(store.user_count(), 1);

        // The original credential still works.
        assert!(store.authenticate("ada", "first").is_ok());
    }

    #[test]
    fn password_hashes_are_salted() {
        let first = hash_password("same").unwrap();
        let second = hash_password("same").unwrap();
        assert_ne!(first, second);
        assert!(verify_password("same", &first).unwrap());
        assert!(verify_password("same", &second).unwrap());
    }
}
