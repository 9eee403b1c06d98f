//! Batch reconciliation scenarios against the in-memory store.

use blip_core::{DealStatus, ImportOutcome, Seller, Stage};
use blip_import::{import_rows, ImportReporter, StageSynonyms};
use blip_ingest::{parse_sheet, ColumnMapping, HeaderSynonyms};
use blip_storage::InMemoryCrm;

fn known_stages() -> Vec<Stage> {
    vec![Stage {
        id: "s1".to_string(),
        name: "Qualificação".to_string(),
        funnel_id: "padrao".to_string(),
        won: false,
        lost: false,
    }]
}

async fn run(store: &InMemoryCrm, csv: &str) -> ImportOutcome {
    let rows = parse_sheet(csv).expect("parse");
    let mapping = ColumnMapping::auto_map(&rows[0], &HeaderSynonyms::default());
    assert!(mapping.is_complete(), "fixture headers must map");
    let synonyms = StageSynonyms::default();
    let mut reporter = ImportReporter::new();
    import_rows(store, &mapping, &rows, true, &synonyms, &mut reporter)
        .await
        .expect("batch")
}

#[tokio::test]
async fn partial_batch_creates_entities_and_reports_errors() {
    let store = InMemoryCrm::new().with_stages(known_stages());
    let csv = "nome,etapa,empresa\n\
               Negócio A,Qualificação,Acme\n\
               Negócio B,Inexistente,Acme\n\
               Negócio C,Qualificação,Acme\n";

    let outcome = run(&store, csv).await;

    assert_eq!(outcome.success_count, 2);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].row, 2);
    assert!(outcome.errors[0].message.contains("Inexistente"));
    assert!(outcome.errors[0].message.contains("não encontrada"));

    let companies = store.companies().await;
    assert_eq!(companies.len(), 1);
    assert_eq!(companies[0].draft.name, "Acme");

    let deals = store.deals().await;
    let names: Vec<_> = deals.iter().map(|deal| deal.draft.name.as_str()).collect();
    assert_eq!(names, vec!["Negócio A", "Negócio C"]);
    assert!(deals.iter().all(|deal| deal.draft.stage_id == "s1"));
    assert!(deals
        .iter()
        .all(|deal| deal.draft.company_id.as_deref() == Some(companies[0].id.as_str())));
}

#[tokio::test]
async fn importing_twice_never_duplicates_companies() {
    let store = InMemoryCrm::new().with_stages(known_stages());
    let csv = "nome,etapa,empresa\n\
               Negócio A,Qualificação,Acme\n\
               Negócio B,Qualificação,acme\n";

    run(&store, csv).await;
    assert_eq!(store.companies().await.len(), 1);

    run(&store, csv).await;
    assert_eq!(store.companies().await.len(), 1);
    assert_eq!(store.deals().await.len(), 4);
}

#[tokio::test]
async fn failed_deal_keeps_created_company_and_rerun_reuses_it() {
    let store = InMemoryCrm::new()
        .with_stages(known_stages())
        .reject_deals_named("Negócio B");
    let csv = "nome,etapa,empresa\nNegócio B,Qualificação,Beta Ltda\n";

    let outcome = run(&store, csv).await;
    assert_eq!(outcome.success_count, 0);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].message.starts_with("Row 1:"));
    assert!(outcome.errors[0].message.contains("rejeitado"));

    // no rollback: the company created earlier in the row stays persisted
    assert_eq!(store.companies().await.len(), 1);
    assert!(store.deals().await.is_empty());

    // a rerun finds the orphaned company instead of duplicating it
    run(&store, csv).await;
    assert_eq!(store.companies().await.len(), 1);
}

#[tokio::test]
async fn contact_dedup_uses_name_and_email_when_supplied() {
    let store = InMemoryCrm::new().with_stages(known_stages());
    let csv = "nome,etapa,contato,email\n\
               Negócio A,Qualificação,João Silva,joao@acme.com\n\
               Negócio B,Qualificação,joão silva,JOAO@ACME.COM\n\
               Negócio C,Qualificação,João Silva,outro@acme.com\n";

    let outcome = run(&store, csv).await;
    assert_eq!(outcome.success_count, 3);

    let contacts = store.contacts().await;
    assert_eq!(contacts.len(), 2);
}

#[tokio::test]
async fn contact_without_email_matches_by_name_alone() {
    let store = InMemoryCrm::new().with_stages(known_stages());
    let csv = "nome,etapa,contato,email,empresa\n\
               Negócio A,Qualificação,Ana,ana@acme.com,Acme\n\
               Negócio B,Qualificação,Ana,,\n";

    run(&store, csv).await;

    let contacts = store.contacts().await;
    assert_eq!(contacts.len(), 1);
    let companies = store.companies().await;
    assert_eq!(
        contacts[0].draft.company_id.as_deref(),
        Some(companies[0].id.as_str())
    );

    let deals = store.deals().await;
    assert!(deals
        .iter()
        .all(|deal| deal.draft.contact_id.as_deref() == Some(contacts[0].id.as_str())));
}

#[tokio::test]
async fn deal_fields_are_parsed_and_seller_resolved() {
    let store = InMemoryCrm::new()
        .with_stages(known_stages())
        .with_sellers(vec![Seller {
            id: "v1".to_string(),
            name: "Maria".to_string(),
        }]);
    let csv = "nome,etapa,valor,probabilidade,vendedor,status,origem,dias_sem_interacao\n\
               Negócio A,Qualificação,1500.50,80,maria,Ganho,Indicação,12\n";

    let outcome = run(&store, csv).await;
    assert_eq!(outcome.success_count, 1);

    let deals = store.deals().await;
    let draft = &deals[0].draft;
    assert_eq!(draft.value, 1500.50);
    assert_eq!(draft.probability, 80);
    assert_eq!(draft.assigned_to.as_deref(), Some("v1"));
    assert_eq!(draft.created_by.as_deref(), Some("v1"));
    assert_eq!(draft.status, DealStatus::Won);
    assert_eq!(draft.source.as_deref(), Some("Indicação"));
    assert_eq!(draft.days_inactive, 12);
}

#[tokio::test]
async fn unknown_seller_is_absent_not_an_error() {
    let store = InMemoryCrm::new().with_stages(known_stages());
    let csv = "nome,etapa,vendedor\nNegócio A,Qualificação,Fulano\n";

    let outcome = run(&store, csv).await;
    assert_eq!(outcome.success_count, 1);
    assert!(outcome.errors.is_empty());

    let deals = store.deals().await;
    assert_eq!(deals[0].draft.assigned_to, None);
    assert_eq!(deals[0].draft.created_by, None);
}

#[tokio::test]
async fn missing_deal_name_skips_the_row_without_creating_entities() {
    let store = InMemoryCrm::new().with_stages(known_stages());
    let csv = "nome,etapa,empresa\n,Qualificação,Acme\n";

    let outcome = run(&store, csv).await;
    assert_eq!(outcome.success_count, 0);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].message, "Row 1: deal name is required");

    // validation precedes company resolution, so nothing was created
    assert!(store.companies().await.is_empty());
    assert!(store.deals().await.is_empty());
}

#[tokio::test]
async fn bad_values_default_instead_of_failing_the_row() {
    let store = InMemoryCrm::new().with_stages(known_stages());
    let csv = "nome,etapa,valor,probabilidade\nNegócio A,Qualificação,R$ mil,alta\n";

    let outcome = run(&store, csv).await;
    assert_eq!(outcome.success_count, 1);

    let deals = store.deals().await;
    assert_eq!(deals[0].draft.value, 0.0);
    assert_eq!(deals[0].draft.probability, 0);
}
