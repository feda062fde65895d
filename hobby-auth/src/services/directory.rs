use async_trait::async_trait;
use mongodb::{
    bson::doc,
    error::{ErrorKind as MongoErrorKind, WriteFailure},
    options::{ClientOptions, IndexOptions},
    Client as MongoClient, Collection, Database, IndexModel,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

use crate::models::User;
use crate::services::error::ServiceError;

const USERS_COLLECTION: &str = "users";
const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("user not found")]
    NotFound,

    #[error("email already exists")]
    DuplicateEmail,

    #[error("user directory backend failure: {0:#}")]
    Backend(#[from] anyhow::Error),
}

impl From<DirectoryError> for ServiceError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound => ServiceError::UserNotFound,
            DirectoryError::DuplicateEmail => ServiceError::EmailAlreadyExists,
            DirectoryError::Backend(cause) => ServiceError::Directory(cause),
        }
    }
}

/// Persistent store of user accounts keyed by unique email.
///
/// Lookups take an already normalised email. Uniqueness is enforced by the
/// store itself so concurrent registrations across processes stay correct.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<User, DirectoryError>;
    async fn find_by_email(&self, email: &str) -> Result<User, DirectoryError>;
    async fn create(&self, user: &User) -> Result<(), DirectoryError>;
    async fn update(&self, user: &User) -> Result<(), DirectoryError>;
    async fn health_check(&self) -> Result<(), DirectoryError>;
}

#[derive(Clone)]
pub struct MongoUserDirectory {
    client: MongoClient,
    db: Database,
}

impl MongoUserDirectory {
    pub async fn connect(uri: &str, database: &str, timeout: Duration) -> Result<Self, anyhow::Error> {
        tracing::info!(database = %database, "Connecting to MongoDB");

        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| anyhow::anyhow!("Invalid MongoDB URI: {}", e))?;
        options.app_name = Some("hobby-auth".to_string());
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);

        let client = MongoClient::with_options(options)
            .map_err(|e| anyhow::anyhow!("Failed to create MongoDB client: {}", e))?;
        let db = client.database(database);

        tracing::info!(database = %database, "MongoDB client ready");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), anyhow::Error> {
        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("email_unique".to_string())
                    .build(),
            )
            .build();

        self.users()
            .create_index(email_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create email index on users collection: {}", e);
                anyhow::anyhow!("Failed to create users.email index: {}", e)
            })?;
        tracing::info!("Created unique index on users.email");

        Ok(())
    }

    fn users(&self) -> Collection<User> {
        self.db.collection(USERS_COLLECTION)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        MongoErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY_CODE
    )
}

fn backend(context: &'static str) -> impl FnOnce(mongodb::error::Error) -> DirectoryError {
    move |e| DirectoryError::Backend(anyhow::Error::new(e).context(context))
}

#[async_trait]
impl UserDirectory for MongoUserDirectory {
    async fn find_by_id(&self, id: &str) -> Result<User, DirectoryError> {
        self.users()
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(backend("find user by id"))?
            .ok_or(DirectoryError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> Result<User, DirectoryError> {
        self.users()
            .find_one(doc! { "email": email }, None)
            .await
            .map_err(backend("find user by email"))?
            .ok_or(DirectoryError::NotFound)
    }

    async fn create(&self, user: &User) -> Result<(), DirectoryError> {
        match self.users().insert_one(user, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(DirectoryError::DuplicateEmail),
            Err(e) => Err(backend("create user")(e)),
        }
    }

    async fn update(&self, user: &User) -> Result<(), DirectoryError> {
        let result = match self
            .users()
            .replace_one(doc! { "_id": user.id.as_str() }, user, None)
            .await
        {
            Ok(result) => result,
            Err(e) if is_duplicate_key(&e) => return Err(DirectoryError::DuplicateEmail),
            Err(e) => return Err(backend("update user")(e)),
        };

        if result.matched_count == 0 {
            return Err(DirectoryError::NotFound);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), DirectoryError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                backend("ping")(e)
            })?;
        Ok(())
    }
}

/// Process-local directory with the same uniqueness contract as the Mongo
/// store. Used by tests and `MONGODB_URI=memory`.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: Mutex<HashMap<String, User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, User>>, DirectoryError> {
        self.users
            .lock()
            .map_err(|e| DirectoryError::Backend(anyhow::anyhow!("In-memory directory mutex poisoned: {}", e)))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|users| users.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, id: &str) -> Result<User, DirectoryError> {
        self.lock()?.get(id).cloned().ok_or(DirectoryError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> Result<User, DirectoryError> {
        self.lock()?
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }

    async fn create(&self, user: &User) -> Result<(), DirectoryError> {
        let mut users = self.lock()?;
        if users.values().any(|u| u.email == user.email) {
            return Err(DirectoryError::DuplicateEmail);
        }
        if users.contains_key(&user.id) {
            return Err(DirectoryError::Backend(anyhow::anyhow!("duplicate user id {}", user.id)));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<(), DirectoryError> {
        let mut users = self.lock()?;
        if !users.contains_key(&user.id) {
            return Err(DirectoryError::NotFound);
        }
        if users.values().any(|u| u.email == user.email && u.id != user.id) {
            return Err(DirectoryError::DuplicateEmail);
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), DirectoryError> {
        self.lock().map(|_| ())
    }
}

/// Directory whose first `find_by_email` misses even when the record
/// exists, reproducing a concurrent create landing between lookup and insert.
#[cfg(test)]
pub(crate) struct RacingUserDirectory {
    pub inner: InMemoryUserDirectory,
    misses: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl RacingUserDirectory {
    pub fn new(inner: InMemoryUserDirectory, misses: usize) -> Self {
        Self {
            inner,
            misses: std::sync::atomic::AtomicUsize::new(misses),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl UserDirectory for RacingUserDirectory {
    async fn find_by_id(&self, id: &str) -> Result<User, DirectoryError> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<User, DirectoryError> {
        use std::sync::atomic::Ordering;
        let missed = self
            .misses
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if missed {
            return Err(DirectoryError::NotFound);
        }
        self.inner.find_by_email(email).await
    }

    async fn create(&self, user: &User) -> Result<(), DirectoryError> {
        self.inner.create(user).await
    }

    async fn update(&self, user: &User) -> Result<(), DirectoryError> {
        self.inner.update(user).await
    }

    async fn health_check(&self) -> Result<(), DirectoryError> {
        self.inner.health_check().await
    }
}
