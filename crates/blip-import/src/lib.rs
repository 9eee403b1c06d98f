//! Import pipeline orchestration: stage resolution, per-row entity
//! reconciliation, progress/result reporting and the end-to-end runner.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use blip_core::{
    Company, Contact, DealStatus, ImportField, ImportOutcome, NewCompany, NewContact, NewDeal,
    RowOutcome, RowValues, Seller, Stage,
};
use blip_ingest::{parse_sheet, ColumnMapping, HeaderSynonyms, ParseError};
use blip_storage::{CrmStore, ImportArchive, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{info_span, warn};
use uuid::Uuid;

pub const CRATE_NAME: &str = "blip-import";

/// Blocking conditions surfaced before any row is processed. Per-row
/// failures never take this path; they land in the outcome's error list.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("apenas arquivos .csv são suportados: {0}")]
    UnsupportedExtension(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("campos obrigatórios sem coluna mapeada: {0}")]
    IncompleteMapping(String),
}

const BUILTIN_STAGE_SYNONYMS: &[(&str, &[&str])] = &[
    (
        "ganho",
        &["venda", "vendido", "fechado", "fechamento", "ganhou", "won"],
    ),
    ("perdido", &["perda", "descartado", "lost"]),
    (
        "qualificação",
        &["qualificacao", "qualificado", "qualificar", "qualified"],
    ),
    (
        "proposta",
        &["orçamento", "orcamento", "proposta enviada", "proposal"],
    ),
    ("negociação", &["negociacao", "negociar", "negotiation"]),
    (
        "contato inicial",
        &["novo", "lead", "prospecção", "prospeccao", "primeiro contato", "new"],
    ),
];

/// Stage-name → informal-synonyms table, keyed by the lowercased display
/// name. Built once at startup; an overlay may extend it before first use,
/// never afterwards.
#[derive(Debug, Clone)]
pub struct StageSynonyms {
    map: HashMap<String, Vec<String>>,
}

impl Default for StageSynonyms {
    fn default() -> Self {
        let mut map = HashMap::with_capacity(BUILTIN_STAGE_SYNONYMS.len());
        for (name, synonyms) in BUILTIN_STAGE_SYNONYMS {
            map.insert(
                (*name).to_string(),
                synonyms.iter().map(|s| (*s).to_string()).collect(),
            );
        }
        Self { map }
    }
}

impl StageSynonyms {
    /// Synonyms registered for a stage, looked up by exact lowercased name.
    /// A tenant stage named outside the table simply has none.
    pub fn for_stage(&self, stage_name: &str) -> &[String] {
        self.map
            .get(&stage_name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn extend(&mut self, stage_name: &str, synonyms: Vec<String>) {
        let entry = self.map.entry(stage_name.to_lowercase()).or_default();
        for synonym in synonyms {
            let synonym = synonym.to_lowercase();
            if !entry.contains(&synonym) {
                entry.push(synonym);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageMatchError {
    #[error("etapa não informada; etapas válidas: {}", .valid.join(", "))]
    Missing { valid: Vec<String> },
    #[error("etapa \"{value}\" não encontrada; etapas válidas: {}", .valid.join(", "))]
    NotFound { value: String, valid: Vec<String> },
}

fn stage_names(stages: &[Stage]) -> Vec<String> {
    stages.iter().map(|stage| stage.name.clone()).collect()
}

/// Tiered, deterministic resolution of a free-text stage reference. Tier
/// order *is* the priority — there is no scoring across tiers:
/// trimmed-exact id, case-insensitive name, substring either direction,
/// synonym set. The substring tier takes the first stage in iteration
/// order even when several match.
pub fn resolve_stage(
    raw: &str,
    stages: &[Stage],
    synonyms: &StageSynonyms,
) -> Result<String, StageMatchError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(StageMatchError::Missing {
            valid: stage_names(stages),
        });
    }

    if let Some(stage) = stages.iter().find(|stage| stage.id == value) {
        return Ok(stage.id.clone());
    }

    let lower = value.to_lowercase();
    if let Some(stage) = stages.iter().find(|stage| stage.name.to_lowercase() == lower) {
        return Ok(stage.id.clone());
    }

    if let Some(stage) = stages.iter().find(|stage| {
        let name = stage.name.to_lowercase();
        name.contains(&lower) || lower.contains(&name)
    }) {
        return Ok(stage.id.clone());
    }

    for stage in stages {
        for synonym in synonyms.for_stage(&stage.name) {
            if synonym.contains(&lower) || lower.contains(synonym.as_str()) {
                return Ok(stage.id.clone());
            }
        }
    }

    Err(StageMatchError::NotFound {
        value: value.to_string(),
        valid: stage_names(stages),
    })
}

/// Seller references match by exact id first, then case-insensitive name.
/// An unmatched seller is treated as absent, never as an error.
pub fn resolve_seller(raw: &str, sellers: &[Seller]) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if let Some(seller) = sellers.iter().find(|seller| seller.id == value) {
        return Some(seller.id.clone());
    }
    let lower = value.to_lowercase();
    sellers
        .iter()
        .find(|seller| seller.name.to_lowercase() == lower)
        .map(|seller| seller.id.clone())
}

fn parse_f64_or_zero(raw: Option<&str>) -> f64 {
    raw.and_then(|value| value.trim().parse().ok()).unwrap_or(0.0)
}

fn parse_i32_or_zero(raw: Option<&str>) -> i32 {
    raw.and_then(|value| value.trim().parse().ok()).unwrap_or(0)
}

fn parse_i64_or_zero(raw: Option<&str>) -> i64 {
    raw.and_then(|value| value.trim().parse().ok()).unwrap_or(0)
}

#[derive(Debug, Error)]
enum RowFailure {
    #[error("deal name is required")]
    MissingDealName,
    #[error(transparent)]
    Stage(#[from] StageMatchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
struct ContactCandidate {
    id: String,
    email: Option<String>,
}

/// Dedup arena carried across one batch: candidate tables seeded from the
/// pre-batch snapshot and grown immediately after each successful create,
/// so later rows see entities created earlier in the same batch. The
/// persistence layer is never re-queried per row.
#[derive(Debug, Default)]
struct DedupArena {
    companies_by_name: HashMap<String, String>,
    contacts_by_name: HashMap<String, Vec<ContactCandidate>>,
}

impl DedupArena {
    fn seed(companies: &[Company], contacts: &[Contact]) -> Self {
        let mut arena = Self::default();
        for company in companies {
            arena
                .companies_by_name
                .entry(company.draft.name.to_lowercase())
                .or_insert_with(|| company.id.clone());
        }
        for contact in contacts {
            arena
                .contacts_by_name
                .entry(contact.draft.name.to_lowercase())
                .or_default()
                .push(ContactCandidate {
                    id: contact.id.clone(),
                    email: contact.draft.email.as_deref().map(str::to_lowercase),
                });
        }
        arena
    }

    fn find_company(&self, name: &str) -> Option<&str> {
        self.companies_by_name
            .get(&name.to_lowercase())
            .map(String::as_str)
    }

    fn insert_company(&mut self, name: &str, id: String) {
        self.companies_by_name.insert(name.to_lowercase(), id);
    }

    /// Name match alone suffices when the row carries no email; with an
    /// email, both must match.
    fn find_contact(&self, name: &str, email: Option<&str>) -> Option<&str> {
        let candidates = self.contacts_by_name.get(&name.to_lowercase())?;
        match email {
            Some(email) => {
                let email = email.to_lowercase();
                candidates
                    .iter()
                    .find(|candidate| candidate.email.as_deref() == Some(email.as_str()))
                    .map(|candidate| candidate.id.as_str())
            }
            None => candidates.first().map(|candidate| candidate.id.as_str()),
        }
    }

    fn insert_contact(&mut self, name: &str, email: Option<&str>, id: String) {
        self.contacts_by_name
            .entry(name.to_lowercase())
            .or_default()
            .push(ContactCandidate {
                id,
                email: email.map(str::to_lowercase),
            });
    }
}

/// Drives one batch as an explicit iterator: each `next_row` call
/// reconciles exactly one data row and yields its outcome. Rows run
/// strictly one at a time — creates from row *n* must land before row
/// *n+1* starts, because they may be dedup targets for later rows.
pub struct RowImporter<'a> {
    store: &'a dyn CrmStore,
    mapping: &'a ColumnMapping,
    rows: Vec<Vec<String>>,
    cursor: usize,
    stages: Vec<Stage>,
    sellers: Vec<Seller>,
    synonyms: &'a StageSynonyms,
    arena: DedupArena,
}

impl<'a> RowImporter<'a> {
    /// Loads the pre-batch snapshot (companies, contacts, stages, sellers)
    /// and positions the cursor on the first data row.
    pub async fn prepare(
        store: &'a dyn CrmStore,
        mapping: &'a ColumnMapping,
        rows: &[Vec<String>],
        has_header_row: bool,
        synonyms: &'a StageSynonyms,
    ) -> Result<RowImporter<'a>, StoreError> {
        let data_rows: Vec<Vec<String>> = if has_header_row {
            rows.iter().skip(1).cloned().collect()
        } else {
            rows.to_vec()
        };
        let companies = store.list_companies().await?;
        let contacts = store.list_contacts().await?;
        let stages = store.list_stages().await?;
        let sellers = store.list_sellers().await?;
        Ok(RowImporter {
            store,
            mapping,
            rows: data_rows,
            cursor: 0,
            stages,
            sellers,
            synonyms,
            arena: DedupArena::seed(&companies, &contacts),
        })
    }

    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn rows_processed(&self) -> usize {
        self.cursor
    }

    /// Reconciles the next data row; `None` once the batch is exhausted.
    /// Row indices in outcomes are 1-based over data rows (UI-facing).
    pub async fn next_row(&mut self) -> Option<RowOutcome> {
        if self.cursor >= self.rows.len() {
            return None;
        }
        let row = self.rows[self.cursor].clone();
        self.cursor += 1;
        let row_index = self.cursor;

        let values = self.mapping.resolve_row(&row);
        match self.reconcile(&values).await {
            Ok(deal_id) => Some(RowOutcome::Created {
                row: row_index,
                deal_id,
            }),
            Err(failure) => Some(RowOutcome::Skipped {
                row: row_index,
                message: failure.to_string(),
            }),
        }
    }

    async fn reconcile(&mut self, values: &RowValues) -> Result<String, RowFailure> {
        let deal_name = values
            .get_owned(ImportField::DealName)
            .ok_or(RowFailure::MissingDealName)?;

        let stage_id = resolve_stage(
            values.get(ImportField::DealStage).unwrap_or(""),
            &self.stages,
            self.synonyms,
        )?;

        let company_id = match values.get_owned(ImportField::CompanyName) {
            Some(name) => Some(self.resolve_company(&name, values).await?),
            None => None,
        };

        let contact_id = match values.get_owned(ImportField::ContactName) {
            Some(name) => Some(
                self.resolve_contact(&name, values, company_id.clone())
                    .await?,
            ),
            None => None,
        };

        let seller_id = values
            .get(ImportField::DealCreatedBy)
            .and_then(|raw| resolve_seller(raw, &self.sellers));

        let draft = NewDeal {
            name: deal_name,
            value: parse_f64_or_zero(values.get(ImportField::DealValue)),
            probability: parse_i32_or_zero(values.get(ImportField::DealProbability)),
            expected_close: values.get_owned(ImportField::DealExpectedClose),
            stage_id,
            company_id,
            contact_id,
            assigned_to: seller_id.clone(),
            created_by: seller_id,
            source: values.get_owned(ImportField::DealSource),
            status: DealStatus::classify(values.get(ImportField::DealStatus)),
            days_inactive: parse_i64_or_zero(values.get(ImportField::DealDaysInactive)),
            lost_reason: values.get_owned(ImportField::DealLostReason),
            closed_at: values.get_owned(ImportField::DealClosedAt),
        };
        Ok(self.store.create_deal(draft).await?)
    }

    /// Company resolution runs before contact resolution: a contact created
    /// in the same row may reference the company.
    async fn resolve_company(
        &mut self,
        name: &str,
        values: &RowValues,
    ) -> Result<String, RowFailure> {
        if let Some(id) = self.arena.find_company(name) {
            return Ok(id.to_string());
        }
        let draft = NewCompany {
            name: name.to_string(),
            cnpj: values.get_owned(ImportField::CompanyCnpj),
            phone: values.get_owned(ImportField::CompanyPhone),
            email: values.get_owned(ImportField::CompanyEmail),
            address: values.get_owned(ImportField::CompanyAddress),
            state: values.get_owned(ImportField::CompanyState),
            city: values.get_owned(ImportField::CompanyCity),
        };
        let id = self.store.create_company(draft).await?;
        self.arena.insert_company(name, id.clone());
        Ok(id)
    }

    async fn resolve_contact(
        &mut self,
        name: &str,
        values: &RowValues,
        company_id: Option<String>,
    ) -> Result<String, RowFailure> {
        let email = values.get_owned(ImportField::ContactEmail);
        if let Some(id) = self.arena.find_contact(name, email.as_deref()) {
            return Ok(id.to_string());
        }
        let draft = NewContact {
            name: name.to_string(),
            email: email.clone(),
            phone: values.get_owned(ImportField::ContactPhone),
            mobile: values.get_owned(ImportField::ContactMobile),
            position: values.get_owned(ImportField::ContactPosition),
            company_id,
        };
        let id = self.store.create_contact(draft).await?;
        self.arena.insert_contact(name, email.as_deref(), id.clone());
        Ok(id)
    }
}

/// Tracks batch progress (0–100, monotonically non-decreasing) and holds
/// the terminal outcome once the batch completes. A completed outcome is
/// final until `start` opens a new run.
#[derive(Debug, Default)]
pub struct ImportReporter {
    total: usize,
    processed: usize,
    outcome: Option<ImportOutcome>,
}

impl ImportReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, total: usize) {
        self.total = total;
        self.processed = 0;
        self.outcome = None;
    }

    pub fn row_done(&mut self) {
        if self.processed < self.total {
            self.processed += 1;
        }
    }

    /// Fraction complete as a percentage. An empty batch is complete the
    /// moment it starts.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.processed as f64 / self.total as f64) * 100.0
    }

    pub fn finish(&mut self, outcome: ImportOutcome) {
        self.processed = self.total;
        self.outcome = Some(outcome);
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<&ImportOutcome> {
        self.outcome.as_ref()
    }
}

/// Runs a whole batch: drives the row iterator, advances the reporter after
/// each row and accumulates the outcome. Nothing row-level escapes as an
/// error — every failure lands in the outcome's error list, so the caller
/// always receives a complete summary. Only a failed pre-batch snapshot
/// read aborts (the batch never started).
pub async fn import_rows(
    store: &dyn CrmStore,
    mapping: &ColumnMapping,
    rows: &[Vec<String>],
    has_header_row: bool,
    synonyms: &StageSynonyms,
    reporter: &mut ImportReporter,
) -> Result<ImportOutcome, StoreError> {
    let mut importer = RowImporter::prepare(store, mapping, rows, has_header_row, synonyms).await?;
    reporter.start(importer.total_rows());

    let mut outcome = ImportOutcome::default();
    while let Some(row_outcome) = importer.next_row().await {
        match &row_outcome {
            RowOutcome::Created { .. } => outcome.record_success(),
            RowOutcome::Skipped { row, message } => {
                warn!(row = *row, message = %message, "linha ignorada");
                outcome.record_error(*row, format!("Row {row}: {message}"));
            }
        }
        reporter.row_done();
    }

    reporter.finish(outcome.clone());
    Ok(outcome)
}

/// Runtime configuration, resolved from the environment with defaults that
/// work for a local workspace.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub workspace_file: PathBuf,
    pub archive_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub workspace_root: PathBuf,
    pub has_header_row: bool,
}

impl ImportConfig {
    pub fn from_env() -> Self {
        Self {
            workspace_file: std::env::var("BLIP_WORKSPACE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./crm.json")),
            archive_dir: std::env::var("BLIP_ARCHIVE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./archive")),
            reports_dir: std::env::var("BLIP_REPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./reports")),
            workspace_root: PathBuf::from("."),
            has_header_row: std::env::var("BLIP_HAS_HEADER")
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(true),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct OverlayFile {
    #[allow(dead_code)]
    #[serde(default)]
    version: u32,
    #[serde(default)]
    header_aliases: HashMap<String, String>,
    #[serde(default)]
    stage_synonyms: HashMap<String, Vec<String>>,
}

/// Optional `synonyms.yaml` at the workspace root extending the built-in
/// header and stage tables. Loaded once at startup; the merged tables are
/// immutable afterwards. A missing file means defaults only.
#[derive(Debug, Clone, Default)]
pub struct SynonymOverlay {
    header_aliases: Vec<(String, ImportField)>,
    stage_synonyms: Vec<(String, Vec<String>)>,
}

impl SynonymOverlay {
    pub fn from_workspace_root(root: &Path) -> anyhow::Result<Self> {
        let path = root.join("synonyms.yaml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let file: OverlayFile =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;

        let mut header_aliases = Vec::new();
        for (token, key) in file.header_aliases {
            let field = ImportField::from_key(&key).with_context(|| {
                format!("unknown field key \"{key}\" in {}", path.display())
            })?;
            header_aliases.push((token, field));
        }
        Ok(Self {
            header_aliases,
            stage_synonyms: file.stage_synonyms.into_iter().collect(),
        })
    }

    pub fn apply(&self, headers: &mut HeaderSynonyms, stages: &mut StageSynonyms) {
        for (token, field) in &self.header_aliases {
            headers.insert_alias(token, *field);
        }
        for (name, synonyms) in &self.stage_synonyms {
            stages.extend(name, synonyms.clone());
        }
    }
}

/// Summary of one import run.
#[derive(Debug, Clone, Serialize)]
pub struct ImportRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub file: String,
    pub total_rows: usize,
    pub success_count: u32,
    pub error_count: usize,
    pub archived_as: String,
    pub reports_dir: String,
}

/// End-to-end import execution: extension gate, parse, mapping (override
/// or auto), completeness gate, raw-file archival, the batch itself and
/// the per-run report files.
pub struct ImportRunner {
    config: ImportConfig,
    archive: ImportArchive,
    header_synonyms: HeaderSynonyms,
    stage_synonyms: StageSynonyms,
}

impl ImportRunner {
    pub fn new(config: ImportConfig) -> anyhow::Result<Self> {
        let overlay = SynonymOverlay::from_workspace_root(&config.workspace_root)?;
        let mut header_synonyms = HeaderSynonyms::default();
        let mut stage_synonyms = StageSynonyms::default();
        overlay.apply(&mut header_synonyms, &mut stage_synonyms);
        let archive = ImportArchive::new(config.archive_dir.clone());
        Ok(Self {
            config,
            archive,
            header_synonyms,
            stage_synonyms,
        })
    }

    pub fn header_synonyms(&self) -> &HeaderSynonyms {
        &self.header_synonyms
    }

    pub fn stage_synonyms(&self) -> &StageSynonyms {
        &self.stage_synonyms
    }

    pub async fn run_file(
        &self,
        store: &dyn CrmStore,
        path: &Path,
        mapping_override: Option<ColumnMapping>,
    ) -> anyhow::Result<(ImportRunSummary, ImportOutcome)> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        let span = info_span!("import_run", %run_id, file = %path.display());
        let _guard = span.enter();

        let extension_ok = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if !extension_ok {
            return Err(ImportError::UnsupportedExtension(path.display().to_string()).into());
        }

        let text = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let rows = parse_sheet(&text).map_err(ImportError::Parse)?;

        let mapping = match mapping_override {
            Some(mapping) => mapping,
            None => {
                let headers = if self.config.has_header_row {
                    rows[0].clone()
                } else {
                    Vec::new()
                };
                ColumnMapping::auto_map(&headers, &self.header_synonyms)
            }
        };

        let missing = mapping.missing_required();
        if !missing.is_empty() {
            let labels = missing
                .iter()
                .map(|field| field.label())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ImportError::IncompleteMapping(labels).into());
        }

        let label = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("import");
        let archived = self.archive.store(started_at, label, text.as_bytes()).await?;

        let mut reporter = ImportReporter::new();
        let outcome = import_rows(
            store,
            &mapping,
            &rows,
            self.config.has_header_row,
            &self.stage_synonyms,
            &mut reporter,
        )
        .await?;

        let finished_at = Utc::now();
        let total_rows = if self.config.has_header_row {
            rows.len().saturating_sub(1)
        } else {
            rows.len()
        };
        let mut summary = ImportRunSummary {
            run_id,
            started_at,
            finished_at,
            file: path.display().to_string(),
            total_rows,
            success_count: outcome.success_count,
            error_count: outcome.rows_failed(),
            archived_as: archived.relative_path.display().to_string(),
            reports_dir: String::new(),
        };
        let reports_dir = self.write_reports(&summary, &outcome).await?;
        summary.reports_dir = reports_dir.display().to_string();

        Ok((summary, outcome))
    }

    async fn write_reports(
        &self,
        summary: &ImportRunSummary,
        outcome: &ImportOutcome,
    ) -> anyhow::Result<PathBuf> {
        let reports_dir = self.config.reports_dir.join(summary.run_id.to_string());
        fs::create_dir_all(&reports_dir)
            .await
            .with_context(|| format!("creating {}", reports_dir.display()))?;

        let mut brief = format!(
            "# Resumo da importação\n\n- Run ID: `{}`\n- Arquivo: `{}`\n- Início: {}\n- Fim: {}\n- Linhas processadas: {}\n- Negócios criados: {}\n- Linhas com erro: {}\n",
            summary.run_id,
            summary.file,
            summary.started_at,
            summary.finished_at,
            summary.total_rows,
            summary.success_count,
            summary.error_count,
        );
        if !outcome.errors.is_empty() {
            brief.push_str("\n## Erros\n");
            for error in &outcome.errors {
                brief.push_str(&format!("- {}\n", error.message));
            }
        }
        fs::write(reports_dir.join("import_brief.md"), brief)
            .await
            .context("writing import_brief.md")?;

        let payload = serde_json::to_vec_pretty(&serde_json::json!({
            "summary": summary,
            "outcome": outcome,
        }))
        .context("serializing import outcome")?;
        fs::write(reports_dir.join("outcome.json"), payload)
            .await
            .context("writing outcome.json")?;

        Ok(reports_dir)
    }
}

/// Convenience entry point used by the CLI: env config + JSON workspace.
pub async fn run_import_from_env(
    file: &Path,
    mapping_override: Option<ColumnMapping>,
) -> anyhow::Result<(ImportRunSummary, ImportOutcome)> {
    let config = ImportConfig::from_env();
    let workspace = blip_storage::JsonWorkspace::open(config.workspace_file.clone()).await?;
    let runner = ImportRunner::new(config)?;
    runner.run_file(&workspace, file, mapping_override).await
}
