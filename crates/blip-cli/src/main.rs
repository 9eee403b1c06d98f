use std::path::PathBuf;

use anyhow::Result;
use blip_core::ImportField;
use blip_import::{ImportConfig, ImportRunner};
use blip_ingest::{ColumnMapping, ColumnTarget};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "blip")]
#[command(about = "Bulk lead import command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run an import batch against the configured workspace.
    Import {
        file: PathBuf,
        /// JSON column-mapping override replacing auto-mapping.
        #[arg(long)]
        mapping: Option<PathBuf>,
    },
    /// Parse a file and preview the auto-mapping without importing.
    Inspect {
        file: PathBuf,
        /// Write the suggested mapping as JSON, for editing and replay
        /// through `import --mapping`.
        #[arg(long)]
        save_mapping: Option<PathBuf>,
    },
    /// List the canonical import fields.
    Fields,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Import { file, mapping } => {
            let mapping = match mapping {
                Some(path) => Some(blip_ingest::load_mapping_file(path)?),
                None => None,
            };
            let (summary, outcome) = blip_import::run_import_from_env(&file, mapping).await?;
            println!(
                "import complete: run_id={} rows={} created={} errors={} reports={}",
                summary.run_id,
                summary.total_rows,
                summary.success_count,
                summary.error_count,
                summary.reports_dir
            );
            for error in &outcome.errors {
                eprintln!("{}", error.message);
            }
        }
        Commands::Inspect { file, save_mapping } => {
            let text = tokio::fs::read_to_string(&file).await?;
            let rows = blip_ingest::parse_sheet(&text)?;
            let runner = ImportRunner::new(ImportConfig::from_env())?;
            let mapping = ColumnMapping::auto_map(&rows[0], runner.header_synonyms());

            if let Some(path) = save_mapping {
                blip_ingest::save_mapping_file(&path, &mapping)?;
                println!("mapeamento sugerido salvo em {}", path.display());
            }

            for column in &mapping.columns {
                match column.target {
                    ColumnTarget::Field(field) => {
                        println!("{} -> {} ({})", column.header, field.key(), field.label());
                    }
                    ColumnTarget::Ignored => println!("{} -> (ignorada)", column.header),
                    ColumnTarget::Unset => println!("{} -> (sem mapeamento)", column.header),
                }
            }

            let missing = mapping.missing_required();
            if missing.is_empty() {
                println!(
                    "mapeamento completo; {} linhas de dados",
                    rows.len().saturating_sub(1)
                );
            } else {
                let labels = missing
                    .iter()
                    .map(|field| field.label())
                    .collect::<Vec<_>>()
                    .join(", ");
                println!("campos obrigatórios pendentes: {labels}");
            }
        }
        Commands::Fields => {
            for field in ImportField::ALL {
                let required = if field.required() { " (obrigatório)" } else { "" };
                println!(
                    "{:<22} {:?}  {}{}",
                    field.key(),
                    field.group(),
                    field.label(),
                    required
                );
            }
        }
    }

    Ok(())
}
