//! Delimited-text parsing and header-to-field mapping for import files.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use blip_core::{ImportField, RowValues};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CRATE_NAME: &str = "blip-ingest";

/// Byte-order mark some spreadsheet tools prepend to UTF-8 exports. Export
/// output carries it; input may or may not.
pub const UTF8_BOM: &str = "\u{feff}";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("o arquivo está vazio")]
    EmptyInput,
}

/// Splits raw file text into non-blank rows of trimmed fields.
///
/// The first row is the header candidate; whether it is actually treated as
/// a header is a pipeline-level option, not decided here.
pub fn parse_sheet(text: &str) -> Result<Vec<Vec<String>>, ParseError> {
    let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);
    let rows: Vec<Vec<String>> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(split_line)
        .collect();
    if rows.is_empty() {
        return Err(ParseError::EmptyInput);
    }
    Ok(rows)
}

/// Field splitter: single pass, one character of lookahead. A doubled quote
/// inside a quoted field emits one literal quote; an unterminated quote
/// consumes to end of line instead of failing.
pub fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// Quotes a field when it carries a comma, quote or line break, doubling
/// inner quotes (the spreadsheet-compatible escaping rule).
pub fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn to_csv(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|field| escape_field(field))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Export flavor: BOM-prefixed so spreadsheet tools detect UTF-8.
pub fn to_csv_with_bom(rows: &[Vec<String>]) -> String {
    format!("{UTF8_BOM}{}", to_csv(rows))
}

/// Lowercases, transliterates the accented characters common in pt-BR
/// headers, turns whitespace into underscores and strips everything else
/// outside `[a-z0-9_]`.
pub fn normalize_header(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

const BUILTIN_HEADER_SYNONYMS: &[(&str, ImportField)] = &[
    ("nome", ImportField::DealName),
    ("nome_do_negocio", ImportField::DealName),
    ("negocio", ImportField::DealName),
    ("titulo", ImportField::DealName),
    ("oportunidade", ImportField::DealName),
    ("deal", ImportField::DealName),
    ("deal_name", ImportField::DealName),
    ("name", ImportField::DealName),
    ("valor", ImportField::DealValue),
    ("valor_do_negocio", ImportField::DealValue),
    ("deal_value", ImportField::DealValue),
    ("value", ImportField::DealValue),
    ("amount", ImportField::DealValue),
    ("etapa", ImportField::DealStage),
    ("etapa_do_funil", ImportField::DealStage),
    ("estagio", ImportField::DealStage),
    ("fase", ImportField::DealStage),
    ("deal_stage", ImportField::DealStage),
    ("stage", ImportField::DealStage),
    ("status", ImportField::DealStatus),
    ("situacao", ImportField::DealStatus),
    ("deal_status", ImportField::DealStatus),
    ("previsao_de_fechamento", ImportField::DealExpectedClose),
    ("fechamento_previsto", ImportField::DealExpectedClose),
    ("data_prevista", ImportField::DealExpectedClose),
    ("deal_expected_close", ImportField::DealExpectedClose),
    ("expected_close", ImportField::DealExpectedClose),
    ("expected_close_date", ImportField::DealExpectedClose),
    ("data_de_fechamento", ImportField::DealClosedAt),
    ("fechado_em", ImportField::DealClosedAt),
    ("deal_closed_at", ImportField::DealClosedAt),
    ("closed_at", ImportField::DealClosedAt),
    ("origem", ImportField::DealSource),
    ("fonte", ImportField::DealSource),
    ("deal_source", ImportField::DealSource),
    ("source", ImportField::DealSource),
    ("dias_sem_interacao", ImportField::DealDaysInactive),
    ("dias_inativo", ImportField::DealDaysInactive),
    ("deal_days_inactive", ImportField::DealDaysInactive),
    ("days_inactive", ImportField::DealDaysInactive),
    ("vendedor", ImportField::DealCreatedBy),
    ("responsavel", ImportField::DealCreatedBy),
    ("criado_por", ImportField::DealCreatedBy),
    ("deal_created_by", ImportField::DealCreatedBy),
    ("created_by", ImportField::DealCreatedBy),
    ("owner", ImportField::DealCreatedBy),
    ("seller", ImportField::DealCreatedBy),
    ("probabilidade", ImportField::DealProbability),
    ("deal_probability", ImportField::DealProbability),
    ("probability", ImportField::DealProbability),
    ("motivo_da_perda", ImportField::DealLostReason),
    ("motivo_perda", ImportField::DealLostReason),
    ("deal_lost_reason", ImportField::DealLostReason),
    ("lost_reason", ImportField::DealLostReason),
    ("contato", ImportField::ContactName),
    ("nome_do_contato", ImportField::ContactName),
    ("contact", ImportField::ContactName),
    ("contact_name", ImportField::ContactName),
    ("email", ImportField::ContactEmail),
    ("email_do_contato", ImportField::ContactEmail),
    ("contact_email", ImportField::ContactEmail),
    ("telefone_do_contato", ImportField::ContactPhone),
    ("contact_phone", ImportField::ContactPhone),
    ("celular", ImportField::ContactMobile),
    ("whatsapp", ImportField::ContactMobile),
    ("contact_mobile", ImportField::ContactMobile),
    ("mobile", ImportField::ContactMobile),
    ("cargo", ImportField::ContactPosition),
    ("funcao", ImportField::ContactPosition),
    ("contact_position", ImportField::ContactPosition),
    ("position", ImportField::ContactPosition),
    ("empresa", ImportField::CompanyName),
    ("nome_da_empresa", ImportField::CompanyName),
    ("razao_social", ImportField::CompanyName),
    ("company", ImportField::CompanyName),
    ("company_name", ImportField::CompanyName),
    ("cnpj", ImportField::CompanyCnpj),
    ("cnpj_cpf", ImportField::CompanyCnpj),
    ("company_cnpj", ImportField::CompanyCnpj),
    ("tax_id", ImportField::CompanyCnpj),
    ("telefone", ImportField::CompanyPhone),
    ("telefone_da_empresa", ImportField::CompanyPhone),
    ("company_phone", ImportField::CompanyPhone),
    ("phone", ImportField::CompanyPhone),
    ("email_da_empresa", ImportField::CompanyEmail),
    ("company_email", ImportField::CompanyEmail),
    ("endereco", ImportField::CompanyAddress),
    ("company_address", ImportField::CompanyAddress),
    ("address", ImportField::CompanyAddress),
    ("estado", ImportField::CompanyState),
    ("uf", ImportField::CompanyState),
    ("company_state", ImportField::CompanyState),
    ("state", ImportField::CompanyState),
    ("cidade", ImportField::CompanyCity),
    ("municipio", ImportField::CompanyCity),
    ("company_city", ImportField::CompanyCity),
    ("city", ImportField::CompanyCity),
];

/// Many-to-one table from normalized header tokens to canonical fields.
/// Built once at startup; extra aliases may be merged in before first use,
/// never afterwards.
#[derive(Debug, Clone)]
pub struct HeaderSynonyms {
    map: HashMap<String, ImportField>,
}

impl Default for HeaderSynonyms {
    fn default() -> Self {
        let mut map = HashMap::with_capacity(BUILTIN_HEADER_SYNONYMS.len());
        for (token, field) in BUILTIN_HEADER_SYNONYMS {
            map.insert((*token).to_string(), *field);
        }
        Self { map }
    }
}

impl HeaderSynonyms {
    pub fn lookup(&self, normalized: &str) -> Option<ImportField> {
        self.map.get(normalized).copied()
    }

    /// Registers a user-supplied alias; the token goes through the same
    /// normalization as real headers.
    pub fn insert_alias(&mut self, token: &str, field: ImportField) {
        self.map.insert(normalize_header(token), field);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Where one CSV column feeds into, if anywhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnTarget {
    Field(ImportField),
    Ignored,
    #[default]
    Unset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedColumn {
    pub header: String,
    pub target: ColumnTarget,
}

/// Mapping from raw CSV headers to canonical fields, aligned by column
/// index. Created by `auto_map`, adjusted by explicit user overrides,
/// discarded when the file is re-selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub columns: Vec<MappedColumn>,
}

impl ColumnMapping {
    /// Suggests a target for every header. First match wins within the
    /// pass: a later header normalizing to an already-claimed field stays
    /// unset for manual resolution.
    pub fn auto_map(headers: &[String], synonyms: &HeaderSynonyms) -> ColumnMapping {
        let mut claimed: HashSet<ImportField> = HashSet::new();
        let columns = headers
            .iter()
            .map(|header| {
                let target = match synonyms.lookup(&normalize_header(header)) {
                    Some(field) if !claimed.contains(&field) => {
                        claimed.insert(field);
                        ColumnTarget::Field(field)
                    }
                    _ => ColumnTarget::Unset,
                };
                MappedColumn {
                    header: header.clone(),
                    target,
                }
            })
            .collect();
        ColumnMapping { columns }
    }

    fn mapped_fields(&self) -> impl Iterator<Item = ImportField> + '_ {
        self.columns.iter().filter_map(|column| match column.target {
            ColumnTarget::Field(field) => Some(field),
            _ => None,
        })
    }

    /// True when every required canonical field has a column. Ignored
    /// columns contribute nothing to the check.
    pub fn is_complete(&self) -> bool {
        self.missing_required().is_empty()
    }

    pub fn missing_required(&self) -> Vec<ImportField> {
        let mapped: HashSet<ImportField> = self.mapped_fields().collect();
        ImportField::ALL
            .into_iter()
            .filter(|field| field.required() && !mapped.contains(field))
            .collect()
    }

    /// Candidate fields for one column: everything not claimed by any
    /// *other* column. Advisory only — direct assignment can still force a
    /// duplicate, in which case the later column wins at resolution time.
    pub fn available_fields(&self, column: usize) -> Vec<ImportField> {
        let taken: HashSet<ImportField> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != column)
            .filter_map(|(_, mapped)| match mapped.target {
                ColumnTarget::Field(field) => Some(field),
                _ => None,
            })
            .collect();
        ImportField::ALL
            .into_iter()
            .filter(|field| !taken.contains(field))
            .collect()
    }

    pub fn assign(&mut self, column: usize, target: ColumnTarget) {
        if let Some(mapped) = self.columns.get_mut(column) {
            mapped.target = target;
        }
    }

    /// Applies the mapping to one parsed row. Unmapped and ignored columns
    /// contribute nothing; a short row simply misses its trailing columns.
    pub fn resolve_row(&self, row: &[String]) -> RowValues {
        let mut values = RowValues::new();
        for (index, column) in self.columns.iter().enumerate() {
            if let ColumnTarget::Field(field) = column.target {
                if let Some(cell) = row.get(index) {
                    values.insert(field, cell);
                }
            }
        }
        values
    }
}

/// Reads a mapping override produced elsewhere (JSON).
pub fn load_mapping_file(path: impl AsRef<Path>) -> Result<ColumnMapping> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

pub fn save_mapping_file(path: impl AsRef<Path>, mapping: &ColumnMapping) -> Result<()> {
    let path = path.as_ref();
    let data = serde_json::to_string_pretty(mapping).context("serializing column mapping")?;
    fs::write(path, data).with_context(|| format!("writing {}", path.display()))
}
