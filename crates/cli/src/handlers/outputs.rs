//! `outputs list | show | star | delete | export`.

use anyhow::Result;
use horde_core::media::DownloadFormat;
use horde_core::registry::SortCriterion;
use horde_pipeline::export::{export_zip_file, write_image, ExportOptions};

use crate::cli::OutputsCommand;
use crate::context::AppContext;
use crate::presentation::{print_separator, truncate_string};

pub async fn execute(ctx: &AppContext, command: &OutputsCommand) -> Result<()> {
    match command {
        OutputsCommand::List { page, sort } => list(ctx, *page, sort.parse()?).await,
        OutputsCommand::Show { id } => {
            let record = ctx.store.get(*id).await?;
            let mut view = serde_json::to_value(&record)?;
            if let Some(image) = view.get_mut("image") {
                *image = format!("<{} base64 chars>", record.image.len()).into();
            }
            println!("{}", serde_json::to_string_pretty(&view)?);
            Ok(())
        }
        OutputsCommand::Star { id } => {
            let starred = ctx.store.toggle_star(*id).await?;
            println!("Output #{id} {}", if starred { "starred" } else { "unstarred" });
            Ok(())
        }
        OutputsCommand::Delete { ids } => {
            let removed = ctx.store.delete_many(ids).await?;
            println!("Deleted {} output(s). Remaining ids have been renumbered.", removed.len());
            Ok(())
        }
        OutputsCommand::Export {
            ids,
            output,
            zip,
            format,
            embed_metadata,
        } => {
            let options = ExportOptions {
                format: match format {
                    Some(f) => f.parse::<DownloadFormat>()?,
                    None => ctx.settings.download_format,
                },
                embed_metadata: embed_metadata.unwrap_or(ctx.settings.embed_metadata),
            };
            let records = if ids.is_empty() {
                ctx.store.snapshot().await
            } else {
                ctx.store.get_many(ids).await?
            };
            if records.is_empty() {
                println!("Nothing to export.");
                return Ok(());
            }

            if *zip {
                export_zip_file(output, &records, options)?;
                println!("Wrote {} output(s) to {}", records.len(), output.display());
            } else {
                for record in &records {
                    let path = write_image(output, record, options)?;
                    println!("{}", path.display());
                }
            }
            Ok(())
        }
    }
}

async fn list(ctx: &AppContext, page: usize, criterion: SortCriterion) -> Result<()> {
    let page_size = ctx.settings.page_size;
    let pages = ctx.store.page_count(page_size).await;
    if pages == 0 {
        println!("No outputs yet. Use 'horde generate <prompt>' to make some.");
        return Ok(());
    }

    let records = ctx.store.page(criterion, page, page_size).await;
    println!(
        "{:<5} {:<2} {:<12} {:<22} {:<20} Prompt",
        "ID", "*", "Seed", "Model", "Created"
    );
    print_separator(100);
    for record in &records {
        println!(
            "{:<5} {:<2} {:<12} {:<22} {:<20} {}",
            record.id,
            if record.starred { "*" } else { "" },
            truncate_string(&record.seed, 12),
            truncate_string(record.model.as_deref().unwrap_or("--"), 22),
            record.created_at.format("%Y-%m-%d %H:%M"),
            truncate_string(&record.prompt, 40),
        );
    }
    println!("\nPage {page} of {pages}");
    Ok(())
}
