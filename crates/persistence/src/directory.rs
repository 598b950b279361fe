//! Tenant user directories
//!
//! Each tenant owns a CSV file at `{data_dir}/{tenant}/users.csv` with at
//! least the columns `id, phone_number, name, email`. The file is loaded
//! once per process into an immutable snapshot shared by every call of that
//! tenant. Updates replace the snapshot (copy-on-write) and are written back.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use call_agent_config::DirectoryConfig;
use call_agent_core::{CallerIdentity, TenantId, UserRecord};

use crate::PersistenceError;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .unwrap()
});

/// Loose syntactic email check
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

/// Tenant-scoped user directory
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// First record of `tenant` whose phone number equals `phone`
    async fn find_by_phone(
        &self,
        tenant: &TenantId,
        phone: &str,
    ) -> Result<Option<UserRecord>, PersistenceError>;

    /// Replace the email of the record keyed by `phone`, returning the
    /// record as it was before the change
    async fn update_email(
        &self,
        tenant: &TenantId,
        phone: &str,
        new_email: &str,
    ) -> Result<UserRecord, PersistenceError>;

    /// Resolve a caller to a record. Total: anything that cannot be resolved
    /// yields the anonymous record.
    async fn lookup_user(&self, tenant: &TenantId, caller: &CallerIdentity) -> UserRecord {
        let Some(phone) = caller.phone() else {
            return UserRecord::anonymous();
        };

        match self.find_by_phone(tenant, phone).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::debug!(tenant = %tenant, "Caller not in directory");
                UserRecord::anonymous()
            }
            Err(e) => {
                tracing::warn!(tenant = %tenant, error = %e, "Directory lookup failed, using anonymous record");
                UserRecord::anonymous()
            }
        }
    }
}

/// Columns mapped onto `UserRecord` fields
const ID_COL: &str = "id";
const PHONE_COL: &str = "phone_number";
const NAME_COL: &str = "name";
const EMAIL_COL: &str = "email";
const PIN_COL: &str = "pin";

/// One tenant's directory as loaded from disk
#[derive(Debug, Clone, Default)]
struct DirectorySnapshot {
    headers: Vec<String>,
    rows: Vec<BTreeMap<String, String>>,
}

impl DirectorySnapshot {
    fn parse(path: &Path, bytes: &[u8]) -> Result<Self, PersistenceError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| PersistenceError::parse(path, e))?
            .iter()
            .map(String::from)
            .collect();

        if !headers.iter().any(|h| h == PHONE_COL) {
            return Err(PersistenceError::parse(path, "missing phone_number column"));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| PersistenceError::parse(path, e))?;
            let row = headers
                .iter()
                .cloned()
                .zip(record.iter().map(String::from))
                .collect();
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    fn position(&self, phone: &str) -> Option<usize> {
        let phone = phone.trim();
        self.rows
            .iter()
            .position(|row| row.get(PHONE_COL).is_some_and(|p| p == phone))
    }

    fn record(&self, idx: usize) -> Option<UserRecord> {
        self.rows.get(idx).map(row_to_record)
    }

    fn to_csv(&self) -> Result<Vec<u8>, PersistenceError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        let encode = |e: csv::Error| PersistenceError::InvalidData(e.to_string());

        writer.write_record(&self.headers).map_err(encode)?;
        for row in &self.rows {
            writer
                .write_record(
                    self.headers
                        .iter()
                        .map(|h| row.get(h).map(String::as_str).unwrap_or("")),
                )
                .map_err(encode)?;
        }

        writer
            .into_inner()
            .map_err(|e| PersistenceError::InvalidData(e.to_string()))
    }
}

fn row_to_record(row: &BTreeMap<String, String>) -> UserRecord {
    let non_empty = |key: &str| row.get(key).filter(|v| !v.is_empty()).cloned();

    UserRecord {
        id: non_empty(ID_COL),
        phone_number: non_empty(PHONE_COL),
        name: non_empty(NAME_COL).unwrap_or_default(),
        email: non_empty(EMAIL_COL).unwrap_or_default(),
        pin: non_empty(PIN_COL),
        extra: row
            .iter()
            .filter(|(k, _)| ![ID_COL, PHONE_COL, NAME_COL, EMAIL_COL, PIN_COL].contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    }
}

/// CSV-backed directory with per-tenant snapshots
pub struct CsvUserDirectory {
    data_dir: PathBuf,
    users_file: String,
    load_timeout: Duration,
    snapshots: RwLock<HashMap<TenantId, Arc<DirectorySnapshot>>>,
    /// Serializes updates and write-back
    write_lock: tokio::sync::Mutex<()>,
}

impl CsvUserDirectory {
    pub fn new(data_dir: impl Into<PathBuf>, users_file: impl Into<String>, load_timeout: Duration) -> Self {
        Self {
            data_dir: data_dir.into(),
            users_file: users_file.into(),
            load_timeout,
            snapshots: RwLock::new(HashMap::new()),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self::new(&config.data_dir, &config.users_file, config.load_timeout())
    }

    fn path_for(&self, tenant: &TenantId) -> PathBuf {
        self.data_dir.join(tenant.as_str()).join(&self.users_file)
    }

    /// Cached snapshot, loading it on first use
    async fn snapshot(&self, tenant: &TenantId) -> Result<Arc<DirectorySnapshot>, PersistenceError> {
        if let Some(snapshot) = self.snapshots.read().get(tenant) {
            return Ok(snapshot.clone());
        }

        let loaded = Arc::new(self.load(tenant).await?);

        // A concurrent load or update may have won; keep whatever is there.
        let mut snapshots = self.snapshots.write();
        Ok(snapshots.entry(tenant.clone()).or_insert(loaded).clone())
    }

    async fn load(&self, tenant: &TenantId) -> Result<DirectorySnapshot, PersistenceError> {
        let path = self.path_for(tenant);
        let timeout_ms = self.load_timeout.as_millis() as u64;

        let read = tokio::time::timeout(self.load_timeout, tokio::fs::read(&path))
            .await
            .map_err(|_| PersistenceError::Timeout(timeout_ms))?;

        let bytes = match read {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(tenant = %tenant, path = %path.display(), "Directory file not found, tenant has no users");
                return Ok(DirectorySnapshot::default());
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot = DirectorySnapshot::parse(&path, &bytes)?;
        tracing::info!(tenant = %tenant, users = snapshot.rows.len(), "Loaded directory snapshot");
        Ok(snapshot)
    }

    async fn write_back(&self, tenant: &TenantId, snapshot: &DirectorySnapshot) -> Result<(), PersistenceError> {
        let path = self.path_for(tenant);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("csv.tmp");
        tokio::fs::write(&tmp, snapshot.to_csv()?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for CsvUserDirectory {
    async fn find_by_phone(
        &self,
        tenant: &TenantId,
        phone: &str,
    ) -> Result<Option<UserRecord>, PersistenceError> {
        let snapshot = self.snapshot(tenant).await?;
        Ok(snapshot.position(phone).and_then(|idx| snapshot.record(idx)))
    }

    async fn update_email(
        &self,
        tenant: &TenantId,
        phone: &str,
        new_email: &str,
    ) -> Result<UserRecord, PersistenceError> {
        if !is_valid_email(new_email) {
            return Err(PersistenceError::InvalidData(format!("invalid email '{}'", new_email)));
        }

        let _guard = self.write_lock.lock().await;
        let current = self.snapshot(tenant).await?;
        let idx = current
            .position(phone)
            .ok_or_else(|| PersistenceError::NotFound(format!("phone {}", phone)))?;
        let before = current
            .record(idx)
            .ok_or_else(|| PersistenceError::NotFound(format!("phone {}", phone)))?;

        let mut next = (*current).clone();
        if !next.headers.iter().any(|h| h == EMAIL_COL) {
            next.headers.push(EMAIL_COL.to_string());
        }
        if let Some(row) = next.rows.get_mut(idx) {
            row.insert(EMAIL_COL.to_string(), new_email.trim().to_string());
        }

        self.write_back(tenant, &next).await?;
        self.snapshots.write().insert(tenant.clone(), Arc::new(next));

        tracing::info!(tenant = %tenant, "Directory email updated");
        Ok(before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USERS: &str = "id,phone_number,name,email,pin,plan\n\
                         1,5551234567,Ada,ada@example.com,1234,gold\n\
                         2,5559876543,Grace,grace@example.com,,\n";

    fn tenant(id: &str) -> TenantId {
        TenantId::parse(id).unwrap()
    }

    fn open_directory(dir: &Path) -> CsvUserDirectory {
        CsvUserDirectory::new(dir, "users.csv", Duration::from_secs(1))
    }

    fn seed(dir: &Path, tenant: &str, contents: &str) {
        let tenant_dir = dir.join(tenant);
        std::fs::create_dir_all(&tenant_dir).unwrap();
        std::fs::write(tenant_dir.join("users.csv"), contents).unwrap();
    }

    #[tokio::test]
    async fn test_lookup_known_caller() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), "acme", USERS);
        let directory = open_directory(dir.path());

        let user = directory
            .lookup_user(&tenant("acme"), &CallerIdentity::parse("Call-5551234567"))
            .await;
        assert_eq!(user.name, "Ada");
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.pin.as_deref(), Some("1234"));
        assert_eq!(user.extra.get("plan").map(String::as_str), Some("gold"));
    }

    #[tokio::test]
    async fn test_lookup_is_total() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), "acme", USERS);
        seed(dir.path(), "broken", "no,phone,column\n1,2,3\n");
        let directory = open_directory(dir.path());

        for (t, room) in [
            ("acme", "Call-0000000000"),
            ("acme", "anonymous"),
            ("acme", ""),
            ("missing", "Call-5551234567"),
            ("broken", "Call-5551234567"),
        ] {
            let user = directory.lookup_user(&tenant(t), &CallerIdentity::parse(room)).await;
            assert_eq!(user, UserRecord::anonymous(), "{t} {room}");
        }
    }

    #[tokio::test]
    async fn test_directories_are_tenant_scoped() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), "acme", USERS);
        seed(dir.path(), "globex", "id,phone_number,name,email\n9,5550000001,Hank,hank@globex.com\n");
        let directory = open_directory(dir.path());

        let found = directory.find_by_phone(&tenant("globex"), "5551234567").await.unwrap();
        assert!(found.is_none());
        let found = directory.find_by_phone(&tenant("acme"), "5550000001").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_update_email_writes_back() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), "acme", USERS);
        let directory = open_directory(dir.path());
        let acme = tenant("acme");

        let before = directory
            .update_email(&acme, "5551234567", "ada@newmail.org")
            .await
            .unwrap();
        assert_eq!(before.email, "ada@example.com");

        let after = directory.find_by_phone(&acme, "5551234567").await.unwrap().unwrap();
        assert_eq!(after.email, "ada@newmail.org");

        // A fresh process sees the change
        let reloaded = open_directory(dir.path());
        let user = reloaded.find_by_phone(&acme, "5551234567").await.unwrap().unwrap();
        assert_eq!(user.email, "ada@newmail.org");
        assert_eq!(user.extra.get("plan").map(String::as_str), Some("gold"));
    }

    #[tokio::test]
    async fn test_update_email_rejections() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), "acme", USERS);
        let directory = open_directory(dir.path());
        let acme = tenant("acme");

        assert!(matches!(
            directory.update_email(&acme, "5551234567", "not-an-email").await,
            Err(PersistenceError::InvalidData(_))
        ));
        assert!(matches!(
            directory.update_email(&acme, "0000000000", "x@example.com").await,
            Err(PersistenceError::NotFound(_))
        ));
        let user = directory.find_by_phone(&acme, "5551234567").await.unwrap().unwrap();
        assert_eq!(user.email, "ada@example.com");
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("first.last+tag@mail.co.uk"));
        assert!(!is_valid_email("ada@"));
        assert!(!is_valid_email("ada example.com"));
        assert!(!is_valid_email("ada@example"));
    }
}
