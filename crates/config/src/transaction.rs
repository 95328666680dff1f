//! Serialized load → mutate → save cycles against a [`ConfigStore`].
//!
//! Every writer goes through one process-wide lock regardless of which guild
//! or channel it touches. Writes are rare administrative actions, so the
//! single lock is the contention point to revisit if that stops holding.
//! Readers skip the lock.

use std::sync::Arc;

use {
    tokio::sync::Mutex,
    tracing::{debug, warn},
};

use crate::{
    Error, Result,
    record::PermissionConfig,
    store::{ConfigHandle, ConfigStore},
};

/// Gatekeeper for all permission-store mutations.
pub struct ConfigTransactor {
    store: Arc<dyn ConfigStore>,
    write_lock: Mutex<()>,
}

impl ConfigTransactor {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    /// Load a read-only snapshot without taking the write lock.
    pub async fn read(&self) -> Result<PermissionConfig> {
        ConfigHandle::load(Arc::clone(&self.store))
            .await
            .map(ConfigHandle::into_inner)
            .map_err(|e| Error::persistence("load", e))
    }

    /// Run `op` against a freshly loaded document under the write lock and
    /// persist the result.
    ///
    /// The lock is taken before loading so no other writer can save between
    /// our load and our save. If `op` fails nothing is saved; if the save
    /// fails the error is a [`Error::PersistenceFailure`] and the store keeps
    /// its previous contents.
    pub async fn mutate<R, F>(&self, operation: &'static str, op: F) -> Result<R>
    where
        F: FnOnce(&mut PermissionConfig) -> Result<R>,
    {
        let _guard = self.write_lock.lock().await;

        let mut handle = ConfigHandle::load(Arc::clone(&self.store))
            .await
            .map_err(|e| Error::persistence("load", e))?;

        let out = op(&mut *handle)?;

        if let Err(e) = handle.save().await {
            warn!(operation, error = %e, "permission store save failed, change discarded");
            return Err(Error::persistence("save", e));
        }
        debug!(operation, "permission store updated");
        Ok(out)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::store::MemoryStore,
        gamehall_common::{ChannelId, GuildId, RoleId, UserId},
    };

    const GUILD: GuildId = GuildId(10);

    async fn seeded() -> (Arc<MemoryStore>, ConfigTransactor) {
        let store = Arc::new(MemoryStore::new());
        let tx = ConfigTransactor::new(store.clone());
        tx.mutate("add_new_guild", |cfg| {
            Ok(cfg.add_new_guild(GUILD, UserId(1), "g"))
        })
        .await
        .unwrap();
        (store, tx)
    }

    #[tokio::test]
    async fn mutation_is_persisted() {
        let (_store, tx) = seeded().await;
        tx.mutate("set_admin", |cfg| cfg.set_guild_admin_role(GUILD, RoleId(5)))
            .await
            .unwrap();
        assert_eq!(tx.read().await.unwrap().admin_role(GUILD), Some(RoleId(5)));
    }

    #[tokio::test]
    async fn failed_save_keeps_prior_value() {
        let (store, tx) = seeded().await;
        tx.mutate("set_admin", |cfg| cfg.set_guild_admin_role(GUILD, RoleId(5)))
            .await
            .unwrap();

        store.set_fail_saves(true);
        let err = tx
            .mutate("set_admin", |cfg| cfg.set_guild_admin_role(GUILD, RoleId(6)))
            .await
            .unwrap_err();
        assert!(err.is_persistence_failure());

        store.set_fail_saves(false);
        assert_eq!(tx.read().await.unwrap().admin_role(GUILD), Some(RoleId(5)));
    }

    #[tokio::test]
    async fn failed_operation_saves_nothing() {
        let (_store, tx) = seeded().await;
        let err = tx
            .mutate("add_special", |cfg| {
                cfg.set_fancy_help(GUILD, true)?;
                cfg.add_special_user(ChannelId(404), UserId(2))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownChannel { .. }));
        assert_eq!(tx.read().await.unwrap().guild(GUILD).unwrap().fancy_help, None);
    }

    #[tokio::test]
    async fn load_failure_is_a_persistence_failure() {
        let (store, tx) = seeded().await;
        store.set_fail_loads(true);
        assert!(tx.read().await.unwrap_err().is_persistence_failure());
        assert!(
            tx.mutate("noop", |_| Ok(()))
                .await
                .unwrap_err()
                .is_persistence_failure()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_do_not_lose_updates() {
        let (_store, tx) = seeded().await;
        let tx = Arc::new(tx);
        tx.mutate("add_channel", |cfg| cfg.add_channel(GUILD, ChannelId(1)))
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for user in 0..32u64 {
            let tx = Arc::clone(&tx);
            tasks.push(tokio::spawn(async move {
                tx.mutate("add_special", |cfg| {
                    cfg.add_special_user(ChannelId(1), UserId(user))
                })
                .await
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().unwrap());
        }
        assert_eq!(tx.read().await.unwrap().special_users(ChannelId(1)).len(), 32);
    }
}
