// One-time passcodes and the pending state behind them
//
// Pending entries are keyed by purpose and email and live in an injected
// key-value store (in-process map or Redis). Expiry is evaluated lazily when
// a code is checked; store retention only bounds memory.
//
// Concurrent issue/verify for the same email is not synchronized: the last
// issue wins and a verify racing an overwrite may see either entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::auth::{
    email::{EmailMessage, Mailer, OtpPurpose},
    error::AuthError,
};

/// Codes expire 300 seconds after issue
pub const DEFAULT_OTP_TTL_SECONDS: i64 = 300;

/// How long the store keeps an entry around, expired or not
const STORE_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, thiserror::Error)]
#[error("key-value store error: {0}")]
pub struct StoreError(pub String);

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError(err.to_string())
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::StoreError(err.0)
    }
}

/// Minimal key-value contract the OTP flow needs
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: String, retention: Duration) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Process-local store, for single instance deployments and tests
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, deadline)| Instant::now() < *deadline)
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: String, retention: Duration) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        entries.retain(|_, (_, deadline)| now < *deadline);
        entries.insert(key.to_string(), (value, now + retention));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Shared store so several API instances see the same pending codes
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, retention: Duration) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(retention.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}

/// Account fields held back until the email address is confirmed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionalUser {
    pub username: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub phone: String,
}

/// An in-progress OTP challenge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingEntry {
    /// SHA-256 of the code, hex encoded
    pub code_hash: String,
    pub issued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<ProvisionalUser>,
}

/// Issues, checks and consumes email OTP codes
#[derive(Clone)]
pub struct OtpIssuer {
    store: Arc<dyn KeyValueStore>,
    mailer: Arc<dyn Mailer>,
    ttl: chrono::Duration,
}

impl OtpIssuer {
    pub fn new(store: Arc<dyn KeyValueStore>, mailer: Arc<dyn Mailer>, ttl_seconds: i64) -> Self {
        Self {
            store,
            mailer,
            ttl: chrono::Duration::seconds(ttl_seconds),
        }
    }

    /// Six decimal digits, 100000..=999999
    pub fn generate_code() -> String {
        rand::thread_rng().gen_range(100_000..=999_999).to_string()
    }

    fn hash_code(code: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(code.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn pending_key(purpose: OtpPurpose, email: &str) -> String {
        format!("otp:{}:{}", purpose.as_str(), email)
    }

    fn reservation_key(field: &str, value: &str) -> String {
        format!("otp:reserved:{}:{}", field, value)
    }

    pub fn is_expired(&self, entry: &PendingEntry, now: DateTime<Utc>) -> bool {
        now - entry.issued_at > self.ttl
    }

    /// Current pending entry for the email, expired or not
    pub async fn pending(
        &self,
        purpose: OtpPurpose,
        email: &str,
    ) -> Result<Option<PendingEntry>, AuthError> {
        let raw = self.store.get(&Self::pending_key(purpose, email)).await?;
        match raw {
            Some(raw) => match serde_json::from_str::<PendingEntry>(&raw) {
                Ok(entry) => Ok(Some(entry)),
                Err(e) => {
                    // Unreadable entries behave as absent
                    warn!(error = %e, %purpose, "discarding malformed pending OTP entry");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Generate a code, email it, then record it against the email
    ///
    /// Any previous pending entry for the same purpose and email is
    /// overwritten. The mail goes out first so that a delivery failure
    /// leaves no pending state behind.
    pub async fn issue(
        &self,
        purpose: OtpPurpose,
        email: &str,
        registration: Option<ProvisionalUser>,
    ) -> Result<String, AuthError> {
        let code = Self::generate_code();

        self.mailer
            .send(&EmailMessage::otp(email, &code, purpose))
            .await
            .map_err(|e| AuthError::EmailDelivery(e.to_string()))?;

        let entry = PendingEntry {
            code_hash: Self::hash_code(&code),
            issued_at: Utc::now(),
            registration,
        };
        self.write_entry(purpose, email, &entry).await?;

        debug!(%purpose, "issued OTP");
        Ok(code)
    }

    /// Issue a fresh code for an email that already has a pending entry
    ///
    /// Provisional registration fields carry over to the new entry.
    pub async fn resend(&self, purpose: OtpPurpose, email: &str) -> Result<String, AuthError> {
        let entry = self
            .pending(purpose, email)
            .await?
            .ok_or_else(|| AuthError::NotFound("Pending OTP for this email".to_string()))?;
        self.issue(purpose, email, entry.registration).await
    }

    /// Check a code without consuming it
    ///
    /// Expired entries are left in place so the caller can still resend.
    pub async fn check(
        &self,
        purpose: OtpPurpose,
        email: &str,
        code: &str,
    ) -> Result<PendingEntry, AuthError> {
        let entry = self
            .pending(purpose, email)
            .await?
            .ok_or_else(|| AuthError::NotFound("Pending OTP for this email".to_string()))?;

        if self.is_expired(&entry, Utc::now()) {
            return Err(AuthError::OtpExpired);
        }
        if Self::hash_code(code.trim()) != entry.code_hash {
            return Err(AuthError::OtpMismatch);
        }
        Ok(entry)
    }

    /// Delete the pending entry; codes are single-use
    pub async fn consume(&self, purpose: OtpPurpose, email: &str) -> Result<(), AuthError> {
        self.store
            .delete(&Self::pending_key(purpose, email))
            .await?;
        Ok(())
    }

    /// Check and consume in one step
    pub async fn verify(
        &self,
        purpose: OtpPurpose,
        email: &str,
        code: &str,
    ) -> Result<PendingEntry, AuthError> {
        let entry = self.check(purpose, email, code).await?;
        self.consume(purpose, email).await?;
        Ok(entry)
    }

    /// Hold a unique field (username, phone) for a pending registration
    pub async fn reserve(&self, field: &str, value: &str, email: &str) -> Result<(), AuthError> {
        self.store
            .set(
                &Self::reservation_key(field, value),
                email.to_string(),
                STORE_RETENTION,
            )
            .await?;
        Ok(())
    }

    /// Email of the unexpired pending registration holding `field = value`
    pub async fn reservation_holder(
        &self,
        field: &str,
        value: &str,
    ) -> Result<Option<String>, AuthError> {
        let Some(email) = self.store.get(&Self::reservation_key(field, value)).await? else {
            return Ok(None);
        };
        match self.pending(OtpPurpose::VerifyAccount, &email).await? {
            Some(entry) if !self.is_expired(&entry, Utc::now()) => {
                let still_holds = entry.registration.as_ref().is_some_and(|reg| match field {
                    "username" => reg.username == value,
                    "phone" => reg.phone == value,
                    _ => false,
                });
                Ok(still_holds.then_some(email))
            }
            _ => Ok(None),
        }
    }

    /// Drop the hold on `field = value` if `email` is still the one holding it
    pub async fn release(&self, field: &str, value: &str, email: &str) -> Result<(), AuthError> {
        let key = Self::reservation_key(field, value);
        if self.store.get(&key).await?.as_deref() == Some(email) {
            self.store.delete(&key).await?;
        }
        Ok(())
    }

    async fn write_entry(
        &self,
        purpose: OtpPurpose,
        email: &str,
        entry: &PendingEntry,
    ) -> Result<(), AuthError> {
        let raw = serde_json::to_string(entry).map_err(|e| AuthError::StoreError(e.to_string()))?;
        self.store
            .set(&Self::pending_key(purpose, email), raw, STORE_RETENTION)
            .await?;
        Ok(())
    }

    /// Move the issue time of a pending entry into the past
    #[cfg(test)]
    pub(crate) async fn backdate(&self, purpose: OtpPurpose, email: &str, seconds: i64) {
        let mut entry = self
            .pending(purpose, email)
            .await
            .unwrap()
            .expect("pending entry to backdate");
        entry.issued_at = entry.issued_at - chrono::Duration::seconds(seconds);
        self.write_entry(purpose, email, &entry).await.unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingMailer, RecordingMailer};

    fn issuer_with(mailer: Arc<dyn Mailer>) -> OtpIssuer {
        OtpIssuer::new(Arc::new(InMemoryStore::new()), mailer, DEFAULT_OTP_TTL_SECONDS)
    }

    #[test]
    fn test_generated_codes_are_six_digits() {
        for _ in 0..1000 {
            let code = OtpIssuer::generate_code();
            assert_eq!(code.len(), 6);
            let n: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&n));
        }
    }

    #[tokio::test]
    async fn test_issue_sends_mail_and_stores_hash() {
        let mailer = Arc::new(RecordingMailer::default());
        let issuer = issuer_with(mailer.clone());

        let code = issuer
            .issue(OtpPurpose::VerifyAccount, "bob@x.com", None)
            .await
            .unwrap();

        assert_eq!(mailer.last_code_for("bob@x.com"), Some(code.clone()));
        let entry = issuer
            .pending(OtpPurpose::VerifyAccount, "bob@x.com")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(entry.code_hash, code);
        assert_eq!(entry.code_hash.len(), 64);
    }

    #[tokio::test]
    async fn test_verify_is_single_use() {
        let issuer = issuer_with(Arc::new(RecordingMailer::default()));
        let code = issuer
            .issue(OtpPurpose::ResetPassword, "bob@x.com", None)
            .await
            .unwrap();

        assert!(issuer
            .verify(OtpPurpose::ResetPassword, "bob@x.com", &code)
            .await
            .is_ok());
        assert!(matches!(
            issuer.verify(OtpPurpose::ResetPassword, "bob@x.com", &code).await,
            Err(AuthError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_email_is_not_found() {
        let issuer = issuer_with(Arc::new(RecordingMailer::default()));
        assert!(matches!(
            issuer.verify(OtpPurpose::VerifyAccount, "nobody@x.com", "123456").await,
            Err(AuthError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mismatch_keeps_entry() {
        let issuer = issuer_with(Arc::new(RecordingMailer::default()));
        let code = issuer
            .issue(OtpPurpose::VerifyAccount, "bob@x.com", None)
            .await
            .unwrap();
        let wrong = if code == "111111" { "222222" } else { "111111" };

        assert!(matches!(
            issuer.verify(OtpPurpose::VerifyAccount, "bob@x.com", wrong).await,
            Err(AuthError::OtpMismatch)
        ));
        assert!(issuer
            .verify(OtpPurpose::VerifyAccount, "bob@x.com", &code)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_expired_code_is_rejected_and_kept() {
        let issuer = issuer_with(Arc::new(RecordingMailer::default()));
        let code = issuer
            .issue(OtpPurpose::VerifyAccount, "bob@x.com", None)
            .await
            .unwrap();
        issuer
            .backdate(OtpPurpose::VerifyAccount, "bob@x.com", 301)
            .await;

        assert!(matches!(
            issuer.verify(OtpPurpose::VerifyAccount, "bob@x.com", &code).await,
            Err(AuthError::OtpExpired)
        ));
        assert!(issuer
            .pending(OtpPurpose::VerifyAccount, "bob@x.com")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_code_inside_ttl_is_still_valid() {
        let issuer = issuer_with(Arc::new(RecordingMailer::default()));
        let code = issuer
            .issue(OtpPurpose::VerifyAccount, "bob@x.com", None)
            .await
            .unwrap();
        issuer
            .backdate(OtpPurpose::VerifyAccount, "bob@x.com", 290)
            .await;
        assert!(issuer
            .verify(OtpPurpose::VerifyAccount, "bob@x.com", &code)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_resend_overwrites_and_keeps_registration() {
        let mailer = Arc::new(RecordingMailer::default());
        let issuer = issuer_with(mailer.clone());
        let registration = ProvisionalUser {
            username: "bob".into(),
            password_hash: "hash".into(),
            full_name: None,
            phone: "0912345678".into(),
        };
        let first = issuer
            .issue(OtpPurpose::VerifyAccount, "bob@x.com", Some(registration.clone()))
            .await
            .unwrap();
        issuer
            .backdate(OtpPurpose::VerifyAccount, "bob@x.com", 400)
            .await;

        let second = issuer
            .resend(OtpPurpose::VerifyAccount, "bob@x.com")
            .await
            .unwrap();
        assert_eq!(mailer.sent().len(), 2);

        if first != second {
            assert!(matches!(
                issuer.check(OtpPurpose::VerifyAccount, "bob@x.com", &first).await,
                Err(AuthError::OtpMismatch)
            ));
        }
        let entry = issuer
            .verify(OtpPurpose::VerifyAccount, "bob@x.com", &second)
            .await
            .unwrap();
        assert_eq!(entry.registration, Some(registration));
    }

    #[tokio::test]
    async fn test_resend_without_pending_is_not_found() {
        let issuer = issuer_with(Arc::new(RecordingMailer::default()));
        assert!(matches!(
            issuer.resend(OtpPurpose::VerifyAccount, "bob@x.com").await,
            Err(AuthError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_purposes_are_isolated() {
        let issuer = issuer_with(Arc::new(RecordingMailer::default()));
        let code = issuer
            .issue(OtpPurpose::VerifyAccount, "bob@x.com", None)
            .await
            .unwrap();
        assert!(matches!(
            issuer.verify(OtpPurpose::ResetPassword, "bob@x.com", &code).await,
            Err(AuthError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mail_failure_leaves_no_pending_state() {
        let issuer = issuer_with(Arc::new(FailingMailer));
        assert!(matches!(
            issuer.issue(OtpPurpose::VerifyAccount, "bob@x.com", None).await,
            Err(AuthError::EmailDelivery(_))
        ));
        assert!(issuer
            .pending(OtpPurpose::VerifyAccount, "bob@x.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_in_memory_store_honours_retention() {
        let store = InMemoryStore::new();
        store
            .set("k", "v".to_string(), Duration::from_millis(0))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);

        store
            .set("k", "v".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_release_only_drops_own_reservation() {
        let issuer = issuer_with(Arc::new(RecordingMailer::default()));
        let registration = ProvisionalUser {
            username: "bob".into(),
            password_hash: "hash".into(),
            full_name: None,
            phone: "0912345678".into(),
        };
        issuer.reserve("username", "bob", "alice@x.com").await.unwrap();
        issuer
            .issue(OtpPurpose::VerifyAccount, "alice@x.com", Some(registration))
            .await
            .unwrap();

        issuer.release("username", "bob", "bob@x.com").await.unwrap();
        assert_eq!(
            issuer.reservation_holder("username", "bob").await.unwrap(),
            Some("alice@x.com".to_string())
        );

        issuer.release("username", "bob", "alice@x.com").await.unwrap();
        assert_eq!(issuer.reservation_holder("username", "bob").await.unwrap(), None);
    }
}
