//! Local mirror of the push subscription.
//!
//! Stands in for the remote application server that would normally receive
//! the subscription. At most one record is kept: saving a subscription
//! replaces whatever was mirrored before.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Keys a push service hands out with a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// A push delivery channel for one browser instance.
///
/// Serializes to the standard `{endpoint, keys, expirationTime}` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscriptionRecord {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
    pub expiration_time: Option<i64>,
}

impl CacheDb {
    /// Mirror a subscription, replacing any previous one.
    pub async fn save_subscription(&self, record: &PushSubscriptionRecord) -> Result<(), Error> {
        let record = record.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM push_subscriptions WHERE endpoint <> ?1", params![record.endpoint])?;
                tx.execute(
                    "INSERT INTO push_subscriptions (endpoint, p256dh, auth, expiration_time, stored_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(endpoint) DO UPDATE SET
                        p256dh = excluded.p256dh,
                        auth = excluded.auth,
                        expiration_time = excluded.expiration_time,
                        stored_at = excluded.stored_at",
                    params![
                        record.endpoint,
                        record.keys.p256dh,
                        record.keys.auth,
                        record.expiration_time,
                        chrono::Utc::now().to_rfc3339(),
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// The mirrored subscription, if any.
    pub async fn get_subscription(&self) -> Result<Option<PushSubscriptionRecord>, Error> {
        self.conn
            .call(|conn| -> Result<Option<PushSubscriptionRecord>, Error> {
                let result = conn.query_row(
                    "SELECT endpoint, p256dh, auth, expiration_time FROM push_subscriptions
                     ORDER BY stored_at DESC LIMIT 1",
                    [],
                    |row| {
                        Ok(PushSubscriptionRecord {
                            endpoint: row.get(0)?,
                            keys: SubscriptionKeys { p256dh: row.get(1)?, auth: row.get(2)? },
                            expiration_time: row.get(3)?,
                        })
                    },
                );

                match result {
                    Ok(record) => Ok(Some(record)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Drop the mirrored subscription.
    ///
    /// Returns the number of removed records.
    pub async fn remove_subscription(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM push_subscriptions", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
