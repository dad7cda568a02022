use std::collections::HashMap;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::Result;
use crate::identity::{create_external_contact, find_external_contact, get_user};
use crate::types::User;
use relay_core::types::UserId;

/// Maximum number of (channel, channel_native_id) → user_id pairs kept in
/// the in-process cache. Eviction: when full, drop the oldest half.
const CACHE_MAX: usize = 256;

/// Result of resolving a (channel, channel_native_id) pair.
#[derive(Debug)]
pub enum ResolvedContact {
    Known(User),
    /// Materialized on first inbound contact (§3 "externalContact... a
    /// synthetic user materialized on first inbound from WhatsApp/
    /// Instagram/Facebook").
    NewlyCreated(User),
}

impl ResolvedContact {
    pub fn user(&self) -> &User {
        match self {
            ResolvedContact::Known(u) => u,
            ResolvedContact::NewlyCreated(u) => u,
        }
    }
}

/// Translates external channel identities into first-class users.
/// Grounded on `UserResolver`'s shape: a `Mutex<Connection>` plus an
/// in-memory (channel, identifier) → user_id cache to avoid a DB round-trip
/// on every inbound channel message.
pub struct ContactResolver {
    db: Mutex<Connection>,
    cache: Mutex<HashMap<(String, String), UserId>>,
    cache_order: Mutex<Vec<(String, String)>>,
}

impl ContactResolver {
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            cache: Mutex::new(HashMap::new()),
            cache_order: Mutex::new(Vec::new()),
        })
    }

    /// Resolve a (channel, channel_native_id) pair to its externalContact
    /// user, auto-creating one on first contact.
    pub fn resolve(&self, channel: &str, channel_native_id: &str, display_name_hint: &str) -> Result<ResolvedContact> {
        let key = (channel.to_string(), channel_native_id.to_string());

        if let Some(user_id) = self.cache_lookup(&key) {
            debug!(channel, channel_native_id, %user_id, "external contact cache hit");
            let conn = self.db.lock().unwrap();
            if let Some(user) = get_user(&conn, &user_id)? {
                return Ok(ResolvedContact::Known(user));
            }
            drop(conn);
            self.cache_remove(&key);
        }

        let conn = self.db.lock().unwrap();
        if let Some(user) = find_external_contact(&conn, channel, channel_native_id)? {
            self.cache_insert(key, user.id.clone());
            return Ok(ResolvedContact::Known(user));
        }

        info!(channel, channel_native_id, "new external contact; materializing user");
        let user = create_external_contact(&conn, channel, channel_native_id, display_name_hint)?;
        self.cache_insert(key, user.id.clone());
        Ok(ResolvedContact::NewlyCreated(user))
    }

    pub fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        let conn = self.db.lock().unwrap();
        get_user(&conn, user_id)
    }

    /// Reverse lookup: the (channel, channel_native_id) an externalContact
    /// user was materialized from, if any. Used by the Router to dispatch an
    /// agent reply back to the originating channel adapter (§4.8 step 8).
    pub fn channel_of(&self, user_id: &UserId) -> Result<Option<(String, String)>> {
        let conn = self.db.lock().unwrap();
        conn.query_row(
            "SELECT channel, channel_native_id FROM external_contacts WHERE id = ?1",
            [user_id.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(crate::error::UserError::Database)
    }

    fn cache_lookup(&self, key: &(String, String)) -> Option<UserId> {
        self.cache.lock().unwrap().get(key).cloned()
    }

    fn cache_remove(&self, key: &(String, String)) {
        let mut cache = self.cache.lock().unwrap();
        let mut order = self.cache_order.lock().unwrap();
        cache.remove(key);
        order.retain(|k| k != key);
    }

    fn cache_insert(&self, key: (String, String), user_id: UserId) {
        let mut cache = self.cache.lock().unwrap();
        let mut order = self.cache_order.lock().unwrap();

        if cache.contains_key(&key) {
            cache.insert(key, user_id);
            return;
        }

        if cache.len() >= CACHE_MAX {
            let evict_count = CACHE_MAX / 2;
            let to_remove: Vec<_> = order.drain(..evict_count).collect();
            for k in to_remove {
                cache.remove(&k);
            }
        }

        order.push(key.clone());
        cache.insert(key, user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ContactResolver {
        ContactResolver::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn first_contact_materializes_a_new_external_user() {
        let r = resolver();
        let resolved = r.resolve("whatsapp_cloud", "15551234567", "Ana").unwrap();
        assert!(matches!(resolved, ResolvedContact::NewlyCreated(_)));
        assert_eq!(resolved.user().role, relay_core::types::UserRole::External);
    }

    #[test]
    fn repeat_contact_resolves_to_the_same_user() {
        let r = resolver();
        let first = r.resolve("whatsapp_cloud", "15551234567", "Ana").unwrap();
        let second = r.resolve("whatsapp_cloud", "15551234567", "Ana").unwrap();
        assert!(matches!(second, ResolvedContact::Known(_)));
        assert_eq!(first.user().id, second.user().id);
    }

    #[test]
    fn same_native_id_on_different_channels_are_distinct_users() {
        let r = resolver();
        let a = r.resolve("whatsapp_cloud", "123", "Ana").unwrap();
        let b = r.resolve("instagram", "123", "Ana").unwrap();
        assert_ne!(a.user().id, b.user().id);
    }
}
