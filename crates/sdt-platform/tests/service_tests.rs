//! Service Layer Tests
//!
//! Account resolution, provisioning (including the concurrent first-login
//! race), auth orchestration and ownership-scoped record operations, run
//! against in-memory SQLite and a fake identity service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Barrier;

use sdt_platform::client::{IdentityError, IdentityProvider, IssuedToken};
use sdt_platform::repository::{self, AccountStore, RecordStore, SqliteStorage, StorageError};
use sdt_platform::service::{AccountService, AuthService, RecordService};
use sdt_platform::{
    Account, AccountId, CallContext, ClaimValue, IdentityId, NewRecord, Record, RecordId,
    ServiceError, VerifiedClaims, DEFAULT_DAILY_LIMIT, IDENTITY_CLAIM,
};

// ============================================================================
// Fakes
// ============================================================================

/// In-process identity service keyed by email
#[derive(Default)]
struct FakeIdentity {
    users: Mutex<HashMap<String, (String, i64)>>,
    next_id: AtomicI64,
}

impl FakeIdentity {
    fn with_user(self, email: &str, password: &str, id: i64) -> Self {
        self.users
            .lock()
            .unwrap()
            .insert(email.to_string(), (password.to_string(), id));
        self.next_id.fetch_max(id, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn login(&self, email: &str, password: &str) -> Result<IssuedToken, IdentityError> {
        let users = self.users.lock().unwrap();
        match users.get(email) {
            Some((stored, id)) if stored == password => Ok(IssuedToken {
                token: format!("token-{}", id),
                identity_id: IdentityId(*id),
            }),
            _ => Err(IdentityError::UserNotFound),
        }
    }

    async fn register(&self, email: &str, password: &str) -> Result<IdentityId, IdentityError> {
        if password.is_empty() {
            return Err(IdentityError::InvalidArgument);
        }
        let mut users = self.users.lock().unwrap();
        if users.contains_key(email) {
            return Err(IdentityError::UserExists);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        users.insert(email.to_string(), (password.to_string(), id));
        Ok(IdentityId(id))
    }
}

/// Identity service that fails every call unexpectedly
struct BrokenIdentity;

#[async_trait]
impl IdentityProvider for BrokenIdentity {
    async fn login(&self, _email: &str, _password: &str) -> Result<IssuedToken, IdentityError> {
        Err(IdentityError::Unexpected("HTTP 500".to_string()))
    }

    async fn register(&self, _email: &str, _password: &str) -> Result<IdentityId, IdentityError> {
        Err(IdentityError::Unexpected("HTTP 500".to_string()))
    }
}

/// Identity service that never answers
struct HangingIdentity;

#[async_trait]
impl IdentityProvider for HangingIdentity {
    async fn login(&self, _email: &str, _password: &str) -> Result<IssuedToken, IdentityError> {
        std::future::pending().await
    }

    async fn register(&self, _email: &str, _password: &str) -> Result<IdentityId, IdentityError> {
        std::future::pending().await
    }
}

/// Counts every storage call before delegating
struct CountingStore {
    inner: Arc<SqliteStorage>,
    calls: AtomicUsize,
}

impl CountingStore {
    fn new(inner: Arc<SqliteStorage>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccountStore for CountingStore {
    async fn account_by_id(&self, id: AccountId) -> repository::Result<Account> {
        self.hit();
        self.inner.account_by_id(id).await
    }

    async fn account_by_identity_id(&self, identity_id: IdentityId) -> repository::Result<Account> {
        self.hit();
        self.inner.account_by_identity_id(identity_id).await
    }

    async fn save_account(&self, identity_id: IdentityId, daily_limit: i64) -> repository::Result<AccountId> {
        self.hit();
        self.inner.save_account(identity_id, daily_limit).await
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn record_by_id(&self, id: RecordId) -> repository::Result<Record> {
        self.hit();
        self.inner.record_by_id(id).await
    }

    async fn records_by_account(&self, account_id: AccountId, date: NaiveDate) -> repository::Result<Vec<Record>> {
        self.hit();
        self.inner.records_by_account(account_id, date).await
    }

    async fn save_record(&self, record: &NewRecord) -> repository::Result<RecordId> {
        self.hit();
        self.inner.save_record(record).await
    }

    async fn delete_record(&self, account_id: AccountId, record_id: RecordId) -> repository::Result<u64> {
        self.hit();
        self.inner.delete_record(account_id, record_id).await
    }
}

/// The first `racers` identity lookups all wait for each other and report
/// not-found, so every racer goes on to insert.
struct RacingStore {
    inner: Arc<SqliteStorage>,
    barrier: Barrier,
    racers: usize,
    lookups: AtomicUsize,
}

#[async_trait]
impl AccountStore for RacingStore {
    async fn account_by_id(&self, id: AccountId) -> repository::Result<Account> {
        self.inner.account_by_id(id).await
    }

    async fn account_by_identity_id(&self, identity_id: IdentityId) -> repository::Result<Account> {
        if self.lookups.fetch_add(1, Ordering::SeqCst) < self.racers {
            self.barrier.wait().await;
            return Err(StorageError::AccountNotFound);
        }
        self.inner.account_by_identity_id(identity_id).await
    }

    async fn save_account(&self, identity_id: IdentityId, daily_limit: i64) -> repository::Result<AccountId> {
        self.inner.save_account(identity_id, daily_limit).await
    }
}

/// Every insert fails
struct FailingInsertStore {
    inner: Arc<SqliteStorage>,
}

#[async_trait]
impl AccountStore for FailingInsertStore {
    async fn account_by_id(&self, id: AccountId) -> repository::Result<Account> {
        self.inner.account_by_id(id).await
    }

    async fn account_by_identity_id(&self, identity_id: IdentityId) -> repository::Result<Account> {
        self.inner.account_by_identity_id(identity_id).await
    }

    async fn save_account(&self, _identity_id: IdentityId, _daily_limit: i64) -> repository::Result<AccountId> {
        Err(StorageError::Corrupt("disk I/O error".to_string()))
    }
}

// ============================================================================
// Helpers
// ============================================================================

async fn storage() -> Arc<SqliteStorage> {
    let storage = SqliteStorage::in_memory().await.unwrap();
    storage.migrate().await.unwrap();
    Arc::new(storage)
}

async fn account_count(storage: &SqliteStorage) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
        .fetch_one(storage.pool())
        .await
        .unwrap()
}

fn claims_for(uid: i64) -> VerifiedClaims {
    VerifiedClaims::new().with(IDENTITY_CLAIM, ClaimValue::Integer(uid))
}

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

struct Harness {
    storage: Arc<SqliteStorage>,
    accounts: Arc<AccountService>,
    auth: AuthService,
    records: RecordService,
}

async fn harness(identity: FakeIdentity) -> Harness {
    let storage = storage().await;
    let accounts = Arc::new(AccountService::new(storage.clone()));
    let auth = AuthService::new(Arc::new(identity), accounts.clone());
    let records = RecordService::new(storage.clone(), accounts.clone());
    Harness {
        storage,
        accounts,
        auth,
        records,
    }
}

// ============================================================================
// Account Resolution
// ============================================================================

mod account_tests {
    use super::*;

    #[tokio::test]
    async fn test_claims_resolve_to_matching_account_only() {
        let h = harness(FakeIdentity::default()).await;
        let ctx = CallContext::background();
        let a = h.accounts.provision(&ctx, IdentityId(1)).await.unwrap();
        let b = h.accounts.provision(&ctx, IdentityId(2)).await.unwrap();

        let resolved = h.accounts.account_from_claims(&ctx, &claims_for(1)).await.unwrap();
        assert_eq!(resolved.id, a);
        assert_ne!(resolved.id, b);
        assert_eq!(resolved.identity_id, IdentityId(1));
    }

    #[tokio::test]
    async fn test_malformed_uid_is_invalid_credential() {
        let h = harness(FakeIdentity::default()).await;
        let ctx = CallContext::background();
        h.accounts.provision(&ctx, IdentityId(1)).await.unwrap();

        let shapes = vec![
            VerifiedClaims::new(),
            VerifiedClaims::new().with(IDENTITY_CLAIM, ClaimValue::Text("1".to_string())),
            VerifiedClaims::new().with(IDENTITY_CLAIM, ClaimValue::Null),
            VerifiedClaims::new().with(IDENTITY_CLAIM, ClaimValue::Float(1.5)),
        ];

        for claims in shapes {
            let err = h.accounts.account_from_claims(&ctx, &claims).await.unwrap_err();
            assert!(matches!(err, ServiceError::InvalidCredential { .. }), "{:?}", claims);
        }
    }

    #[tokio::test]
    async fn test_unknown_identity_is_not_found() {
        let h = harness(FakeIdentity::default()).await;
        let ctx = CallContext::background();

        let err = h.accounts.account_from_claims(&ctx, &claims_for(42)).await.unwrap_err();
        assert!(err.is_not_found());
        let err = h.accounts.account_by_id(&ctx, AccountId(42)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_provision_is_idempotent() {
        let h = harness(FakeIdentity::default()).await;
        let ctx = CallContext::background();

        let first = h.accounts.provision(&ctx, IdentityId(7)).await.unwrap();
        let second = h.accounts.provision(&ctx, IdentityId(7)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(account_count(&h.storage).await, 1);
        let account = h.accounts.account_by_id(&ctx, first).await.unwrap();
        assert_eq!(account.daily_limit, DEFAULT_DAILY_LIMIT);
    }

    #[tokio::test]
    async fn test_storage_failure_is_unexpected() {
        let storage = storage().await;
        let accounts = AccountService::new(Arc::new(FailingInsertStore { inner: storage }));

        let err = accounts
            .provision(&CallContext::background(), IdentityId(1))
            .await
            .unwrap_err();
        assert!(err.is_unexpected());
        assert!(err.to_string().starts_with("services.account.provision: "));
    }
}

// ============================================================================
// Auth Orchestration
// ============================================================================

mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn test_first_login_provisions_one_account() {
        let h = harness(FakeIdentity::default().with_user("a@example.com", "pw", 11)).await;
        let ctx = CallContext::background();

        let token = h.auth.login(&ctx, "a@example.com", "pw").await.unwrap();
        assert_eq!(token, "token-11");

        let account = h.accounts.account_by_identity_id(&ctx, IdentityId(11)).await.unwrap();
        assert_eq!(account.daily_limit, 2000);

        h.auth.login(&ctx, "a@example.com", "pw").await.unwrap();
        assert_eq!(account_count(&h.storage).await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_logins_create_one_account() {
        let storage = storage().await;
        let racing = Arc::new(RacingStore {
            inner: storage.clone(),
            barrier: Barrier::new(2),
            racers: 2,
            lookups: AtomicUsize::new(0),
        });
        let accounts = Arc::new(AccountService::new(racing));
        let identity = Arc::new(FakeIdentity::default().with_user("a@example.com", "pw", 5));
        let auth = Arc::new(AuthService::new(identity, accounts.clone()));

        let first = {
            let auth = auth.clone();
            tokio::spawn(async move { auth.login(&CallContext::background(), "a@example.com", "pw").await })
        };
        let second = {
            let auth = auth.clone();
            tokio::spawn(async move { auth.login(&CallContext::background(), "a@example.com", "pw").await })
        };

        assert_eq!(first.await.unwrap().unwrap(), "token-5");
        assert_eq!(second.await.unwrap().unwrap(), "token-5");
        assert_eq!(account_count(&storage).await, 1);
    }

    #[tokio::test]
    async fn test_wrong_password_is_identity_not_found() {
        let h = harness(FakeIdentity::default().with_user("a@example.com", "pw", 1)).await;

        let err = h
            .auth
            .login(&CallContext::background(), "a@example.com", "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::IdentityNotFound));
        assert_eq!(account_count(&h.storage).await, 0);
    }

    #[tokio::test]
    async fn test_register_provisions_account() {
        let h = harness(FakeIdentity::default()).await;
        let ctx = CallContext::background();

        h.auth.register(&ctx, "new@example.com", "pw").await.unwrap();
        assert_eq!(account_count(&h.storage).await, 1);

        let token = h.auth.login(&ctx, "new@example.com", "pw").await.unwrap();
        assert_eq!(token, "token-1");
        assert_eq!(account_count(&h.storage).await, 1);
    }

    #[tokio::test]
    async fn test_register_twice_is_already_exists() {
        let h = harness(FakeIdentity::default()).await;
        let ctx = CallContext::background();

        h.auth.register(&ctx, "dup@example.com", "pw").await.unwrap();
        let err = h.auth.register(&ctx, "dup@example.com", "pw").await.unwrap_err();

        assert!(matches!(err, ServiceError::AlreadyExists { .. }));
        assert_eq!(account_count(&h.storage).await, 1);
    }

    #[tokio::test]
    async fn test_register_invalid_argument() {
        let h = harness(FakeIdentity::default()).await;
        let err = h
            .auth
            .register(&CallContext::background(), "a@example.com", "")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_identity_failure_is_unexpected_with_operation() {
        let storage = storage().await;
        let accounts = Arc::new(AccountService::new(storage));
        let auth = AuthService::new(Arc::new(BrokenIdentity), accounts);

        let err = auth
            .login(&CallContext::background(), "a@example.com", "pw")
            .await
            .unwrap_err();
        assert!(err.is_unexpected());
        assert!(err.to_string().starts_with("services.auth.login: "));
    }

    #[tokio::test]
    async fn test_provisioning_failure_after_register_is_unexpected() {
        let storage = storage().await;
        let accounts = Arc::new(AccountService::new(Arc::new(FailingInsertStore { inner: storage })));
        let auth = AuthService::new(Arc::new(FakeIdentity::default()), accounts);

        let err = auth
            .register(&CallContext::background(), "a@example.com", "pw")
            .await
            .unwrap_err();
        assert!(err.is_unexpected());
    }

    #[tokio::test]
    async fn test_deadline_cancels_identity_call() {
        let storage = storage().await;
        let accounts = Arc::new(AccountService::new(storage));
        let auth = AuthService::new(Arc::new(HangingIdentity), accounts);

        let ctx = CallContext::with_timeout(Duration::from_millis(50));
        let err = auth.login(&ctx, "a@example.com", "pw").await.unwrap_err();
        assert!(matches!(err, ServiceError::Cancelled { op: "services.auth.login" }));
    }
}

// ============================================================================
// Records
// ============================================================================

mod record_tests {
    use super::*;

    #[tokio::test]
    async fn test_record_visible_to_owner_only() {
        let h = harness(FakeIdentity::default()).await;
        let ctx = CallContext::background();
        h.accounts.provision(&ctx, IdentityId(1)).await.unwrap();
        h.accounts.provision(&ctx, IdentityId(2)).await.unwrap();

        let id = h
            .records
            .create_for_caller(&ctx, &claims_for(1), day("2024-04-19"), 500)
            .await
            .unwrap();

        let for_a = h.records.list_for_caller(&ctx, &claims_for(1), day("2024-04-19")).await.unwrap();
        assert_eq!(for_a.len(), 1);
        assert_eq!(for_a[0].id, id);
        assert_eq!(for_a[0].value, 500);
        assert_eq!(for_a[0].date_record, day("2024-04-19"));

        let for_b = h.records.list_for_caller(&ctx, &claims_for(2), day("2024-04-19")).await.unwrap();
        assert!(for_b.is_empty());
    }

    #[tokio::test]
    async fn test_list_filters_by_day_newest_first() {
        let h = harness(FakeIdentity::default()).await;
        let ctx = CallContext::background();
        let account_id = h.accounts.provision(&ctx, IdentityId(1)).await.unwrap();
        let claims = claims_for(1);
        let now = chrono::Utc::now();

        let save = |value: i64, date_record: NaiveDate, date_created: chrono::DateTime<chrono::Utc>| {
            let storage = h.storage.clone();
            async move {
                storage
                    .save_record(&NewRecord {
                        account_id,
                        value,
                        date_record,
                        date_created,
                    })
                    .await
                    .unwrap()
            }
        };

        // ids run opposite to creation time
        let latest = save(100, day("2024-04-19"), now).await;
        let earliest = save(200, day("2024-04-19"), now - chrono::Duration::minutes(10)).await;
        let middle = save(300, day("2024-04-19"), now - chrono::Duration::minutes(5)).await;
        save(400, day("2024-04-20"), now).await;

        let listed = h.records.list_for_caller(&ctx, &claims, day("2024-04-19")).await.unwrap();
        let ids: Vec<RecordId> = listed.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![latest, middle, earliest]);
        assert!(listed.iter().all(|r| r.date_record == day("2024-04-19")));

        let empty = h.records.list_for_caller(&ctx, &claims, day("2024-01-01")).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_same_instant_records_newest_id_first() {
        let h = harness(FakeIdentity::default()).await;
        let ctx = CallContext::background();
        h.accounts.provision(&ctx, IdentityId(1)).await.unwrap();
        let claims = claims_for(1);

        let first = h.records.create_for_caller(&ctx, &claims, day("2024-04-19"), 100).await.unwrap();
        let second = h.records.create_for_caller(&ctx, &claims, day("2024-04-19"), 200).await.unwrap();

        let listed = h.records.list_for_caller(&ctx, &claims, day("2024-04-19")).await.unwrap();
        let ids: Vec<RecordId> = listed.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[tokio::test]
    async fn test_non_positive_value_rejected_before_storage() {
        let storage = storage().await;
        let counting = Arc::new(CountingStore::new(storage));
        let accounts = Arc::new(AccountService::new(counting.clone()));
        let records = RecordService::new(counting.clone(), accounts);

        for value in [0, -1, i64::MIN] {
            let err = records
                .create_for_caller(&CallContext::background(), &claims_for(1), day("2024-04-19"), value)
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::InvalidArgument { .. }));
        }
        assert_eq!(counting.calls(), 0);
    }

    #[tokio::test]
    async fn test_delete_foreign_record_is_silent_noop() {
        let h = harness(FakeIdentity::default()).await;
        let ctx = CallContext::background();
        h.accounts.provision(&ctx, IdentityId(1)).await.unwrap();
        h.accounts.provision(&ctx, IdentityId(2)).await.unwrap();

        let id = h
            .records
            .create_for_caller(&ctx, &claims_for(1), day("2024-04-19"), 500)
            .await
            .unwrap();

        h.records.delete_for_caller(&ctx, &claims_for(2), id).await.unwrap();
        assert!(h.storage.record_by_id(id).await.is_ok());

        h.records.delete_for_caller(&ctx, &claims_for(1), RecordId(9999)).await.unwrap();

        h.records.delete_for_caller(&ctx, &claims_for(1), id).await.unwrap();
        assert!(matches!(
            h.storage.record_by_id(id).await,
            Err(StorageError::RecordNotFound)
        ));
    }

    #[tokio::test]
    async fn test_unresolvable_caller_aborts_operation() {
        let h = harness(FakeIdentity::default()).await;
        let ctx = CallContext::background();

        let err = h
            .records
            .list_for_caller(&ctx, &VerifiedClaims::new(), day("2024-04-19"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredential { .. }));

        let err = h
            .records
            .create_for_caller(&ctx, &claims_for(77), day("2024-04-19"), 100)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_cancelled_context_stops_operation() {
        let h = harness(FakeIdentity::default()).await;
        h.accounts
            .provision(&CallContext::background(), IdentityId(1))
            .await
            .unwrap();

        let (ctx, handle) = CallContext::cancellable();
        handle.cancel();

        let err = h
            .records
            .create_for_caller(&ctx, &claims_for(1), day("2024-04-19"), 100)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Cancelled { .. }));
        let listed = h
            .records
            .list_for_caller(&CallContext::background(), &claims_for(1), day("2024-04-19"))
            .await
            .unwrap();
        assert!(listed.is_empty());
    }
}
