//! End-to-end runs over a real temp workspace: blocking conditions,
//! raw-file archival, report files and durable persistence.

use std::path::{Path, PathBuf};

use blip_core::ImportField;
use blip_import::{ImportConfig, ImportError, ImportRunner};
use blip_ingest::{ColumnMapping, ColumnTarget, MappedColumn, ParseError};
use blip_storage::{CrmStore, JsonWorkspace};
use tempfile::tempdir;

fn config_for(root: &Path) -> ImportConfig {
    ImportConfig {
        workspace_file: root.join("crm.json"),
        archive_dir: root.join("archive"),
        reports_dir: root.join("reports"),
        workspace_root: root.to_path_buf(),
        has_header_row: true,
    }
}

async fn write_file(path: &Path, content: &str) {
    tokio::fs::write(path, content).await.expect("write fixture");
}

#[tokio::test]
async fn import_run_archives_reports_and_persists() {
    let dir = tempdir().expect("tempdir");
    let csv_path = dir.path().join("leads.csv");
    write_file(
        &csv_path,
        "nome,etapa,empresa\nNegócio A,Qualificação,Acme\nNegócio B,Inexistente,Acme\n",
    )
    .await;

    let config = config_for(dir.path());
    let workspace = JsonWorkspace::open(config.workspace_file.clone())
        .await
        .expect("open workspace");
    let runner = ImportRunner::new(config).expect("runner");

    let (summary, outcome) = runner
        .run_file(&workspace, &csv_path, None)
        .await
        .expect("run");

    assert_eq!(summary.total_rows, 2);
    assert_eq!(summary.success_count, 1);
    assert_eq!(summary.error_count, 1);
    assert_eq!(outcome.errors[0].row, 2);

    // raw bytes are archived under the content hash
    let archived = dir.path().join("archive").join(&summary.archived_as);
    assert!(archived.exists());
    let archived_text = std::fs::read_to_string(archived).expect("archived bytes");
    assert!(archived_text.contains("Negócio A"));

    // report pair exists and the brief lists the failing row
    let reports_dir = PathBuf::from(&summary.reports_dir);
    let brief = std::fs::read_to_string(reports_dir.join("import_brief.md")).expect("brief");
    assert!(brief.contains("Negócios criados: 1"));
    assert!(brief.contains("Row 2:"));
    assert!(reports_dir.join("outcome.json").exists());

    // the workspace file on disk reflects the created entities
    let reopened = JsonWorkspace::open(dir.path().join("crm.json"))
        .await
        .expect("reopen");
    assert_eq!(reopened.list_companies().await.expect("companies").len(), 1);
    let deals = reopened.data().await.deals;
    assert_eq!(deals.len(), 1);
    assert_eq!(deals[0].draft.stage_id, "qualificacao");
}

#[tokio::test]
async fn non_csv_files_are_rejected_before_any_row_runs() {
    let dir = tempdir().expect("tempdir");
    let txt_path = dir.path().join("leads.txt");
    write_file(&txt_path, "nome,etapa\nNegócio A,Qualificação\n").await;

    let config = config_for(dir.path());
    let workspace = JsonWorkspace::open(config.workspace_file.clone())
        .await
        .expect("open workspace");
    let runner = ImportRunner::new(config).expect("runner");

    let err = runner
        .run_file(&workspace, &txt_path, None)
        .await
        .expect_err("should reject");
    assert!(matches!(
        err.downcast_ref::<ImportError>(),
        Some(ImportError::UnsupportedExtension(_))
    ));
    assert!(workspace.data().await.deals.is_empty());
}

#[tokio::test]
async fn unmapped_required_field_blocks_the_batch() {
    let dir = tempdir().expect("tempdir");
    let csv_path = dir.path().join("leads.csv");
    write_file(&csv_path, "nome,empresa\nNegócio A,Acme\n").await;

    let config = config_for(dir.path());
    let workspace = JsonWorkspace::open(config.workspace_file.clone())
        .await
        .expect("open workspace");
    let runner = ImportRunner::new(config).expect("runner");

    let err = runner
        .run_file(&workspace, &csv_path, None)
        .await
        .expect_err("should block");
    match err.downcast_ref::<ImportError>() {
        Some(ImportError::IncompleteMapping(missing)) => {
            assert!(missing.contains("Etapa do funil"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(workspace.data().await.deals.is_empty());
    assert!(workspace.data().await.companies.is_empty());
}

#[tokio::test]
async fn empty_file_is_a_blocking_error() {
    let dir = tempdir().expect("tempdir");
    let csv_path = dir.path().join("vazio.csv");
    write_file(&csv_path, "\n   \n").await;

    let config = config_for(dir.path());
    let workspace = JsonWorkspace::open(config.workspace_file.clone())
        .await
        .expect("open workspace");
    let runner = ImportRunner::new(config).expect("runner");

    let err = runner
        .run_file(&workspace, &csv_path, None)
        .await
        .expect_err("should block");
    assert!(matches!(
        err.downcast_ref::<ImportError>(),
        Some(ImportError::Parse(ParseError::EmptyInput))
    ));
}

#[tokio::test]
async fn mapping_override_replaces_auto_mapping() {
    let dir = tempdir().expect("tempdir");
    let csv_path = dir.path().join("leads.csv");
    write_file(&csv_path, "col_a,col_b\nNegócio A,Qualificação\n").await;

    let config = config_for(dir.path());
    let workspace = JsonWorkspace::open(config.workspace_file.clone())
        .await
        .expect("open workspace");
    let runner = ImportRunner::new(config).expect("runner");

    let mapping = ColumnMapping {
        columns: vec![
            MappedColumn {
                header: "col_a".to_string(),
                target: ColumnTarget::Field(ImportField::DealName),
            },
            MappedColumn {
                header: "col_b".to_string(),
                target: ColumnTarget::Field(ImportField::DealStage),
            },
        ],
    };

    let (summary, outcome) = runner
        .run_file(&workspace, &csv_path, Some(mapping))
        .await
        .expect("run");
    assert_eq!(summary.success_count, 1);
    assert!(outcome.errors.is_empty());
}

#[tokio::test]
async fn synonym_overlay_is_picked_up_from_the_workspace_root() {
    let dir = tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("synonyms.yaml"),
        "version: 1\nheader_aliases:\n  \"Oportunidade de Venda\": deal_name\nstage_synonyms:\n  \"Qualificação\":\n    - triagem\n",
    )
    .expect("write overlay");
    let csv_path = dir.path().join("leads.csv");
    write_file(&csv_path, "Oportunidade de Venda,etapa\nNegócio A,triagem\n").await;

    let config = config_for(dir.path());
    let workspace = JsonWorkspace::open(config.workspace_file.clone())
        .await
        .expect("open workspace");
    let runner = ImportRunner::new(config).expect("runner");

    let (summary, outcome) = runner
        .run_file(&workspace, &csv_path, None)
        .await
        .expect("run");
    assert_eq!(summary.success_count, 1, "errors: {:?}", outcome.errors);

    let deals = workspace.data().await.deals;
    assert_eq!(deals[0].draft.stage_id, "qualificacao");
}
