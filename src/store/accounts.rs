/// Registered accounts, rebuilt from the users log at startup.
use super::LogStore;
use crate::error::{AuthError, Result};
use crate::models::{Credentials, User};
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};

pub struct Accounts {
    users: RwLock<HashMap<String, User>>,
    /// Serializes registrations so the map lock is never held across a disk sync.
    registration: Mutex<()>,
    store: LogStore<User>,
}

impl Accounts {
    /// An empty account book writing to `store`, without replaying it.
    pub fn new(store: LogStore<User>) -> Self {
        Accounts {
            users: RwLock::new(HashMap::new()),
            registration: Mutex::new(()),
            store,
        }
    }

    /// Replay the users log. The first record for a username wins.
    pub fn load(store: LogStore<User>) -> Result<Self> {
        let mut accounts = Accounts::new(store);
        let records = accounts.store.read_all()?;
        let users = accounts.users.get_mut();
        for user in records {
            if users.contains_key(&user.username) {
                log::warn!("Ignoring duplicate user record for {}", user.username);
                continue;
            }
            users.insert(user.username.clone(), user);
        }
        log::info!(
            "Loaded {} user(s) from {}",
            users.len(),
            accounts.store.path().display()
        );
        Ok(accounts)
    }

    /// Create an account. The record is on disk before the username becomes visible.
    pub async fn register(&self, credentials: &Credentials) -> Result<User> {
        check_credentials(credentials)?;

        let _registering = self.registration.lock().await;
        if self.users.read().await.contains_key(&credentials.username) {
            return Err(AuthError::UsernameTaken.into());
        }

        let user = User::from_credentials(credentials);
        self.store.append(&user).await?;
        self.users
            .write()
            .await
            .insert(user.username.clone(), user.clone());
        log::info!("Registered user {}", user.username);
        Ok(user)
    }

    pub async fn verify(&self, credentials: &Credentials) -> std::result::Result<(), AuthError> {
        check_credentials(credentials)?;

        let users = self.users.read().await;
        match users.get(&credentials.username) {
            Some(user) if user.verify(&credentials.password) => Ok(()),
            _ => Err(AuthError::BadCredentials),
        }
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

fn check_credentials(credentials: &Credentials) -> std::result::Result<(), AuthError> {
    if credentials.username.trim().is_empty() {
        return Err(AuthError::EmptyUsername);
    }
    if credentials.password.is_empty() {
        return Err(AuthError::EmptyPassword);
    }
    Ok(())
}
