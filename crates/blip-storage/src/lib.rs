//! Persistence seam for the import pipeline: the `CrmStore` trait, an
//! in-memory store, a JSON-file-backed workspace and the immutable archive
//! of raw import files.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use blip_core::{Company, Contact, Deal, NewCompany, NewContact, NewDeal, Seller, Stage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

pub const CRATE_NAME: &str = "blip-storage";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Mints the string identifier for a newly created entity.
pub fn new_entity_id() -> String {
    Uuid::new_v4().to_string()
}

/// Read/create access to the managed CRM backend, as consumed by the import
/// pipeline. Read methods return the current listing; create methods
/// persist a draft and return the new identifier.
#[async_trait]
pub trait CrmStore: Send + Sync {
    async fn list_companies(&self) -> Result<Vec<Company>, StoreError>;
    async fn list_contacts(&self) -> Result<Vec<Contact>, StoreError>;
    async fn list_stages(&self) -> Result<Vec<Stage>, StoreError>;
    async fn list_sellers(&self) -> Result<Vec<Seller>, StoreError>;
    async fn create_company(&self, draft: NewCompany) -> Result<String, StoreError>;
    async fn create_contact(&self, draft: NewContact) -> Result<String, StoreError>;
    async fn create_deal(&self, draft: NewDeal) -> Result<String, StoreError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    companies: Vec<Company>,
    contacts: Vec<Contact>,
    stages: Vec<Stage>,
    sellers: Vec<Seller>,
    deals: Vec<Deal>,
    reject_deal_names: Vec<String>,
}

/// In-memory store for tests and demos. Seed with the builder methods;
/// `reject_deals_named` makes `create_deal` fail for matching names so
/// persistence failure paths can be exercised.
#[derive(Debug, Default)]
pub struct InMemoryCrm {
    state: Mutex<MemoryState>,
}

impl InMemoryCrm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stages(mut self, stages: Vec<Stage>) -> Self {
        self.state.get_mut().stages = stages;
        self
    }

    pub fn with_sellers(mut self, sellers: Vec<Seller>) -> Self {
        self.state.get_mut().sellers = sellers;
        self
    }

    pub fn with_companies(mut self, companies: Vec<Company>) -> Self {
        self.state.get_mut().companies = companies;
        self
    }

    pub fn with_contacts(mut self, contacts: Vec<Contact>) -> Self {
        self.state.get_mut().contacts = contacts;
        self
    }

    pub fn reject_deals_named(mut self, name: &str) -> Self {
        self.state.get_mut().reject_deal_names.push(name.to_string());
        self
    }

    pub async fn companies(&self) -> Vec<Company> {
        self.state.lock().await.companies.clone()
    }

    pub async fn contacts(&self) -> Vec<Contact> {
        self.state.lock().await.contacts.clone()
    }

    pub async fn deals(&self) -> Vec<Deal> {
        self.state.lock().await.deals.clone()
    }
}

#[async_trait]
impl CrmStore for InMemoryCrm {
    async fn list_companies(&self) -> Result<Vec<Company>, StoreError> {
        Ok(self.state.lock().await.companies.clone())
    }

    async fn list_contacts(&self) -> Result<Vec<Contact>, StoreError> {
        Ok(self.state.lock().await.contacts.clone())
    }

    async fn list_stages(&self) -> Result<Vec<Stage>, StoreError> {
        Ok(self.state.lock().await.stages.clone())
    }

    async fn list_sellers(&self) -> Result<Vec<Seller>, StoreError> {
        Ok(self.state.lock().await.sellers.clone())
    }

    async fn create_company(&self, draft: NewCompany) -> Result<String, StoreError> {
        let mut state = self.state.lock().await;
        let id = new_entity_id();
        state.companies.push(Company {
            id: id.clone(),
            created_at: Utc::now(),
            draft,
        });
        Ok(id)
    }

    async fn create_contact(&self, draft: NewContact) -> Result<String, StoreError> {
        let mut state = self.state.lock().await;
        let id = new_entity_id();
        state.contacts.push(Contact {
            id: id.clone(),
            created_at: Utc::now(),
            draft,
        });
        Ok(id)
    }

    async fn create_deal(&self, draft: NewDeal) -> Result<String, StoreError> {
        let mut state = self.state.lock().await;
        if state
            .reject_deal_names
            .iter()
            .any(|name| name.eq_ignore_ascii_case(&draft.name))
        {
            return Err(StoreError::Message(format!(
                "negócio \"{}\" rejeitado pelo backend",
                draft.name
            )));
        }
        let id = new_entity_id();
        state.deals.push(Deal {
            id: id.clone(),
            created_at: Utc::now(),
            draft,
        });
        Ok(id)
    }
}

/// On-disk contents of a workspace data file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceData {
    #[serde(default)]
    pub companies: Vec<Company>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub sellers: Vec<Seller>,
    #[serde(default)]
    pub deals: Vec<Deal>,
}

/// Default pt-BR funnel seeded into a fresh workspace.
pub fn default_funnel() -> Vec<Stage> {
    let stage = |id: &str, name: &str, won: bool, lost: bool| Stage {
        id: id.to_string(),
        name: name.to_string(),
        funnel_id: "padrao".to_string(),
        won,
        lost,
    };
    vec![
        stage("contato-inicial", "Contato Inicial", false, false),
        stage("qualificacao", "Qualificação", false, false),
        stage("proposta", "Proposta", false, false),
        stage("negociacao", "Negociação", false, false),
        stage("ganho", "Ganho", true, false),
        stage("perdido", "Perdido", false, true),
    ]
}

/// File-backed store standing in for the managed relational backend. The
/// whole data set lives in one JSON file, loaded at open and rewritten
/// atomically (temp file + rename) after every create.
#[derive(Debug)]
pub struct JsonWorkspace {
    path: PathBuf,
    state: Mutex<WorkspaceData>,
}

impl JsonWorkspace {
    /// Opens an existing data file, or initializes a fresh workspace with
    /// the default funnel when the file does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let data = match fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => WorkspaceData {
                stages: default_funnel(),
                ..WorkspaceData::default()
            },
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", path.display()));
            }
        };
        Ok(Self {
            path,
            state: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn data(&self) -> WorkspaceData {
        self.state.lock().await.clone()
    }

    async fn save(&self, data: &WorkspaceData) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let bytes = serde_json::to_vec_pretty(data).context("serializing workspace data")?;
        let temp_path = self.path.with_extension(format!("{}.tmp", Uuid::new_v4()));

        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| format!("opening temp workspace file {}", temp_path.display()))?;
        file.write_all(&bytes)
            .await
            .with_context(|| format!("writing temp workspace file {}", temp_path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("flushing temp workspace file {}", temp_path.display()))?;
        drop(file);

        match fs::rename(&temp_path, &self.path).await {
            Ok(()) => Ok(()),
            Err(err) => {
                let _ = fs::remove_file(&temp_path).await;
                Err(err).with_context(|| {
                    format!(
                        "atomically renaming temp workspace {} -> {}",
                        temp_path.display(),
                        self.path.display()
                    )
                })
            }
        }
    }
}

#[async_trait]
impl CrmStore for JsonWorkspace {
    async fn list_companies(&self) -> Result<Vec<Company>, StoreError> {
        Ok(self.state.lock().await.companies.clone())
    }

    async fn list_contacts(&self) -> Result<Vec<Contact>, StoreError> {
        Ok(self.state.lock().await.contacts.clone())
    }

    async fn list_stages(&self) -> Result<Vec<Stage>, StoreError> {
        Ok(self.state.lock().await.stages.clone())
    }

    async fn list_sellers(&self) -> Result<Vec<Seller>, StoreError> {
        Ok(self.state.lock().await.sellers.clone())
    }

    async fn create_company(&self, draft: NewCompany) -> Result<String, StoreError> {
        let mut state = self.state.lock().await;
        let id = new_entity_id();
        state.companies.push(Company {
            id: id.clone(),
            created_at: Utc::now(),
            draft,
        });
        self.save(&state).await?;
        Ok(id)
    }

    async fn create_contact(&self, draft: NewContact) -> Result<String, StoreError> {
        let mut state = self.state.lock().await;
        let id = new_entity_id();
        state.contacts.push(Contact {
            id: id.clone(),
            created_at: Utc::now(),
            draft,
        });
        self.save(&state).await?;
        Ok(id)
    }

    async fn create_deal(&self, draft: NewDeal) -> Result<String, StoreError> {
        let mut state = self.state.lock().await;
        let id = new_entity_id();
        state.deals.push(Deal {
            id: id.clone(),
            created_at: Utc::now(),
            draft,
        });
        self.save(&state).await?;
        Ok(id)
    }
}

/// Record of an archived import file.
#[derive(Debug, Clone)]
pub struct ArchivedFile {
    pub content_hash: String,
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
    pub byte_size: usize,
    pub deduplicated: bool,
}

/// Immutable archive of raw import files, hash-addressed so re-importing
/// the same bytes never stores a second copy.
#[derive(Debug, Clone)]
pub struct ImportArchive {
    root: PathBuf,
}

impl ImportArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sha256_hex(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    /// Filesystem-safe label derived from the uploaded file name.
    pub fn sanitize_label(input: &str) -> String {
        let slug: String = input
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        let slug = slug
            .split('-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("-");
        if slug.is_empty() {
            "import".to_string()
        } else {
            slug
        }
    }

    pub fn relative_path(
        &self,
        imported_at: DateTime<Utc>,
        label: &str,
        content_hash: &str,
    ) -> PathBuf {
        let stamp = imported_at.format("%Y%m%d_%H%M%S").to_string();
        PathBuf::from(stamp)
            .join(Self::sanitize_label(label))
            .join(format!("{content_hash}.csv"))
    }

    /// Stores bytes immutably using a hash-addressed path and an atomic
    /// temp-file rename. Re-storing identical bytes under the same stamp
    /// and label reports `deduplicated` instead of writing again.
    pub async fn store(
        &self,
        imported_at: DateTime<Utc>,
        label: &str,
        bytes: &[u8],
    ) -> anyhow::Result<ArchivedFile> {
        let content_hash = Self::sha256_hex(bytes);
        let relative_path = self.relative_path(imported_at, label, &content_hash);
        let absolute_path = self.root.join(&relative_path);

        if let Some(parent) = absolute_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating archive directory {}", parent.display()))?;
        }

        if fs::try_exists(&absolute_path)
            .await
            .with_context(|| format!("checking archive path {}", absolute_path.display()))?
        {
            debug!(path = %absolute_path.display(), "import file already archived");
            return Ok(ArchivedFile {
                content_hash,
                relative_path,
                absolute_path,
                byte_size: bytes.len(),
                deduplicated: true,
            });
        }

        let temp_name = format!(".{}.{}.tmp", Uuid::new_v4(), bytes.len());
        let temp_path = absolute_path
            .parent()
            .expect("archive path always has parent")
            .join(temp_name);

        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| format!("opening temp archive file {}", temp_path.display()))?;
        file.write_all(bytes)
            .await
            .with_context(|| format!("writing temp archive file {}", temp_path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("flushing temp archive file {}", temp_path.display()))?;
        drop(file);

        match fs::rename(&temp_path, &absolute_path).await {
            Ok(()) => Ok(ArchivedFile {
                content_hash,
                relative_path,
                absolute_path,
                byte_size: bytes.len(),
                deduplicated: false,
            }),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                let _ = fs::remove_file(&temp_path).await;
                Ok(ArchivedFile {
                    content_hash,
                    relative_path,
                    absolute_path,
                    byte_size: bytes.len(),
                    deduplicated: true,
                })
            }
            Err(err) => {
                let _ = fs::remove_file(&temp_path).await;
                Err(err).with_context(|| {
                    format!(
                        "atomically renaming temp archive {} -> {}",
                        temp_path.display(),
                        absolute_path.display()
                    )
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn archive_hashing_is_stable() {
        let hash = ImportArchive::sha256_hex(b"hello world");
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn labels_are_sanitized_for_the_filesystem() {
        assert_eq!(ImportArchive::sanitize_label("Leads Julho.csv"), "leads-julho-csv");
        assert_eq!(ImportArchive::sanitize_label("///"), "import");
    }

    #[tokio::test]
    async fn archive_deduplicates_identical_bytes() {
        let dir = tempdir().expect("tempdir");
        let archive = ImportArchive::new(dir.path());
        let imported_at = DateTime::parse_from_rfc3339("2026-07-01T09:00:00Z")
            .expect("ts")
            .with_timezone(&Utc);

        let first = archive
            .store(imported_at, "leads.csv", b"nome,etapa\nA,Ganho")
            .await
            .expect("first store");
        let second = archive
            .store(imported_at, "leads.csv", b"nome,etapa\nA,Ganho")
            .await
            .expect("second store");

        assert!(!first.deduplicated);
        assert!(second.deduplicated);
        assert_eq!(first.content_hash, second.content_hash);
        assert_eq!(first.relative_path, second.relative_path);
        assert!(first.absolute_path.exists());
    }

    #[tokio::test]
    async fn in_memory_store_round_trips_creates() {
        let store = InMemoryCrm::new().with_stages(default_funnel());
        let company_id = store
            .create_company(NewCompany {
                name: "Acme".to_string(),
                ..NewCompany::default()
            })
            .await
            .expect("create company");

        let companies = store.list_companies().await.expect("list");
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].id, company_id);
        assert_eq!(companies[0].draft.name, "Acme");
        assert_eq!(store.list_stages().await.expect("stages").len(), 6);
    }

    #[tokio::test]
    async fn rejection_seed_fails_matching_deals() {
        let store = InMemoryCrm::new().reject_deals_named("Negócio B");
        let err = store
            .create_deal(NewDeal {
                name: "Negócio B".to_string(),
                ..NewDeal::default()
            })
            .await
            .expect_err("should reject");
        assert!(err.to_string().contains("rejeitado"));
        assert!(store.deals().await.is_empty());
    }

    #[tokio::test]
    async fn workspace_persists_across_reopen() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("crm.json");

        let workspace = JsonWorkspace::open(&path).await.expect("open fresh");
        assert_eq!(workspace.list_stages().await.expect("stages").len(), 6);
        workspace
            .create_company(NewCompany {
                name: "Acme".to_string(),
                ..NewCompany::default()
            })
            .await
            .expect("create");

        let reopened = JsonWorkspace::open(&path).await.expect("reopen");
        let companies = reopened.list_companies().await.expect("list");
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].draft.name, "Acme");
        assert!(!dir
            .path()
            .read_dir()
            .expect("read dir")
            .filter_map(|entry| entry.ok())
            .any(|entry| entry.file_name().to_string_lossy().ends_with(".tmp")));
    }
}
