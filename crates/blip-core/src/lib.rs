//! Core domain model for the bulk lead import pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "blip-core";

/// Entity group a canonical import field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldGroup {
    Deal,
    Contact,
    Company,
}

/// Canonical attribute a CSV column can populate on a deal, contact or
/// company. The set is closed on purpose: consumers match over these
/// variants instead of probing arbitrary header strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportField {
    DealName,
    DealValue,
    DealStage,
    DealStatus,
    DealExpectedClose,
    DealClosedAt,
    DealSource,
    DealDaysInactive,
    DealCreatedBy,
    DealProbability,
    DealLostReason,
    ContactName,
    ContactEmail,
    ContactPhone,
    ContactMobile,
    ContactPosition,
    CompanyName,
    CompanyCnpj,
    CompanyPhone,
    CompanyEmail,
    CompanyAddress,
    CompanyState,
    CompanyCity,
}

impl ImportField {
    pub const ALL: [ImportField; 23] = [
        ImportField::DealName,
        ImportField::DealValue,
        ImportField::DealStage,
        ImportField::DealStatus,
        ImportField::DealExpectedClose,
        ImportField::DealClosedAt,
        ImportField::DealSource,
        ImportField::DealDaysInactive,
        ImportField::DealCreatedBy,
        ImportField::DealProbability,
        ImportField::DealLostReason,
        ImportField::ContactName,
        ImportField::ContactEmail,
        ImportField::ContactPhone,
        ImportField::ContactMobile,
        ImportField::ContactPosition,
        ImportField::CompanyName,
        ImportField::CompanyCnpj,
        ImportField::CompanyPhone,
        ImportField::CompanyEmail,
        ImportField::CompanyAddress,
        ImportField::CompanyState,
        ImportField::CompanyCity,
    ];

    /// Stable machine key; matches the serde representation.
    pub fn key(self) -> &'static str {
        match self {
            ImportField::DealName => "deal_name",
            ImportField::DealValue => "deal_value",
            ImportField::DealStage => "deal_stage",
            ImportField::DealStatus => "deal_status",
            ImportField::DealExpectedClose => "deal_expected_close",
            ImportField::DealClosedAt => "deal_closed_at",
            ImportField::DealSource => "deal_source",
            ImportField::DealDaysInactive => "deal_days_inactive",
            ImportField::DealCreatedBy => "deal_created_by",
            ImportField::DealProbability => "deal_probability",
            ImportField::DealLostReason => "deal_lost_reason",
            ImportField::ContactName => "contact_name",
            ImportField::ContactEmail => "contact_email",
            ImportField::ContactPhone => "contact_phone",
            ImportField::ContactMobile => "contact_mobile",
            ImportField::ContactPosition => "contact_position",
            ImportField::CompanyName => "company_name",
            ImportField::CompanyCnpj => "company_cnpj",
            ImportField::CompanyPhone => "company_phone",
            ImportField::CompanyEmail => "company_email",
            ImportField::CompanyAddress => "company_address",
            ImportField::CompanyState => "company_state",
            ImportField::CompanyCity => "company_city",
        }
    }

    /// Human label shown in mapping choices. The host product is pt-BR.
    pub fn label(self) -> &'static str {
        match self {
            ImportField::DealName => "Nome do negócio",
            ImportField::DealValue => "Valor",
            ImportField::DealStage => "Etapa do funil",
            ImportField::DealStatus => "Status",
            ImportField::DealExpectedClose => "Previsão de fechamento",
            ImportField::DealClosedAt => "Data de fechamento",
            ImportField::DealSource => "Origem",
            ImportField::DealDaysInactive => "Dias sem interação",
            ImportField::DealCreatedBy => "Vendedor responsável",
            ImportField::DealProbability => "Probabilidade",
            ImportField::DealLostReason => "Motivo da perda",
            ImportField::ContactName => "Nome do contato",
            ImportField::ContactEmail => "E-mail do contato",
            ImportField::ContactPhone => "Telefone do contato",
            ImportField::ContactMobile => "Celular do contato",
            ImportField::ContactPosition => "Cargo do contato",
            ImportField::CompanyName => "Nome da empresa",
            ImportField::CompanyCnpj => "CNPJ",
            ImportField::CompanyPhone => "Telefone da empresa",
            ImportField::CompanyEmail => "E-mail da empresa",
            ImportField::CompanyAddress => "Endereço",
            ImportField::CompanyState => "Estado",
            ImportField::CompanyCity => "Cidade",
        }
    }

    /// Only the deal name and the deal stage block an import when unmapped.
    pub fn required(self) -> bool {
        matches!(self, ImportField::DealName | ImportField::DealStage)
    }

    pub fn group(self) -> FieldGroup {
        match self {
            ImportField::DealName
            | ImportField::DealValue
            | ImportField::DealStage
            | ImportField::DealStatus
            | ImportField::DealExpectedClose
            | ImportField::DealClosedAt
            | ImportField::DealSource
            | ImportField::DealDaysInactive
            | ImportField::DealCreatedBy
            | ImportField::DealProbability
            | ImportField::DealLostReason => FieldGroup::Deal,
            ImportField::ContactName
            | ImportField::ContactEmail
            | ImportField::ContactPhone
            | ImportField::ContactMobile
            | ImportField::ContactPosition => FieldGroup::Contact,
            ImportField::CompanyName
            | ImportField::CompanyCnpj
            | ImportField::CompanyPhone
            | ImportField::CompanyEmail
            | ImportField::CompanyAddress
            | ImportField::CompanyState
            | ImportField::CompanyCity => FieldGroup::Company,
        }
    }

    pub fn from_key(key: &str) -> Option<ImportField> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }
}

/// Values of one data row after the column mapping is applied: canonical
/// field -> trimmed cell content. Recomputed per row; blank cells are
/// dropped so `get` returns `Some` only for real content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowValues {
    values: BTreeMap<ImportField, String>,
}

impl RowValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: ImportField, raw: &str) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            self.values.insert(field, trimmed.to_string());
        }
    }

    pub fn get(&self, field: ImportField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn get_owned(&self, field: ImportField) -> Option<String> {
        self.values.get(&field).cloned()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A named step of a sales funnel. Ids are plain strings because users
/// reference stages by free text in import files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: String,
    pub name: String,
    pub funnel_id: String,
    #[serde(default)]
    pub won: bool,
    #[serde(default)]
    pub lost: bool,
}

/// User eligible to be assigned to or recorded as creator of a deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seller {
    pub id: String,
    pub name: String,
}

/// Company creation payload assembled from the mapped company fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompany {
    pub name: String,
    pub cnpj: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
}

/// Contact creation payload. `company_id` carries the company resolved
/// earlier in the same row, when there is one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContact {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub position: Option<String>,
    pub company_id: Option<String>,
}

/// Deal lifecycle status derived from free text during import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    #[default]
    Open,
    Won,
    Lost,
}

impl DealStatus {
    /// Keyword classifier over free-text status values. Unknown or missing
    /// text stays open.
    pub fn classify(raw: Option<&str>) -> DealStatus {
        const WON: [&str; 5] = ["ganho", "won", "vendido", "venda", "fechado"];
        const LOST: [&str; 3] = ["perdido", "perda", "lost"];

        let Some(raw) = raw else {
            return DealStatus::Open;
        };
        let lower = raw.trim().to_lowercase();
        if WON.iter().any(|token| lower.contains(token)) {
            DealStatus::Won
        } else if LOST.iter().any(|token| lower.contains(token)) {
            DealStatus::Lost
        } else {
            DealStatus::Open
        }
    }
}

/// Deal creation payload. Company/contact/seller references are resolved
/// ids; date fields pass through as the raw cell text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewDeal {
    pub name: String,
    pub value: f64,
    pub probability: i32,
    pub expected_close: Option<String>,
    pub stage_id: String,
    pub company_id: Option<String>,
    pub contact_id: Option<String>,
    pub assigned_to: Option<String>,
    pub created_by: Option<String>,
    pub source: Option<String>,
    pub status: DealStatus,
    pub days_inactive: i64,
    pub lost_reason: Option<String>,
    pub closed_at: Option<String>,
}

/// Canonical persisted company representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub draft: NewCompany,
}

/// Canonical persisted contact representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub draft: NewContact,
}

/// Canonical persisted deal representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub draft: NewDeal,
}

/// Per-row error surfaced to the user. `row` is the 1-based data row index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

/// Result of one import execution: monotonically incremented success count
/// plus the append-only, ordered error list. Built fresh per run, never
/// merged across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub success_count: u32,
    pub errors: Vec<RowError>,
}

impl ImportOutcome {
    pub fn record_success(&mut self) {
        self.success_count += 1;
    }

    pub fn record_error(&mut self, row: usize, message: impl Into<String>) {
        self.errors.push(RowError {
            row,
            message: message.into(),
        });
    }

    pub fn rows_failed(&self) -> usize {
        self.errors.len()
    }
}

/// What happened to a single data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Created { row: usize, deal_id: String },
    Skipped { row: usize, message: String },
}

impl RowOutcome {
    pub fn row(&self) -> usize {
        match self {
            RowOutcome::Created { row, .. } | RowOutcome::Skipped { row, .. } => *row,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_deal_name_and_stage_are_required() {
        let required: Vec<_> = ImportField::ALL
            .into_iter()
            .filter(|field| field.required())
            .collect();
        assert_eq!(required, vec![ImportField::DealName, ImportField::DealStage]);
    }

    #[test]
    fn field_keys_round_trip() {
        for field in ImportField::ALL {
            assert_eq!(ImportField::from_key(field.key()), Some(field));
        }
        assert_eq!(ImportField::from_key("nonsense"), None);
    }

    #[test]
    fn field_groups_cover_all_three_entities() {
        assert_eq!(ImportField::DealProbability.group(), FieldGroup::Deal);
        assert_eq!(ImportField::ContactMobile.group(), FieldGroup::Contact);
        assert_eq!(ImportField::CompanyCnpj.group(), FieldGroup::Company);
    }

    #[test]
    fn row_values_trim_and_drop_blanks() {
        let mut values = RowValues::new();
        values.insert(ImportField::DealName, "  Negócio A  ");
        values.insert(ImportField::DealSource, "   ");
        assert_eq!(values.get(ImportField::DealName), Some("Negócio A"));
        assert_eq!(values.get(ImportField::DealSource), None);
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn status_classifier_keywords() {
        assert_eq!(DealStatus::classify(Some("Ganho")), DealStatus::Won);
        assert_eq!(DealStatus::classify(Some("venda realizada")), DealStatus::Won);
        assert_eq!(DealStatus::classify(Some("Perdido")), DealStatus::Lost);
        assert_eq!(DealStatus::classify(Some("em andamento")), DealStatus::Open);
        assert_eq!(DealStatus::classify(None), DealStatus::Open);
    }

    #[test]
    fn outcome_accumulates_in_order() {
        let mut outcome = ImportOutcome::default();
        outcome.record_success();
        outcome.record_error(2, "etapa inválida");
        outcome.record_success();
        assert_eq!(outcome.success_count, 2);
        assert_eq!(outcome.rows_failed(), 1);
        assert_eq!(outcome.errors[0].row, 2);
    }
}
