//! Subcommands that operate on a page snapshot or the local mapping store.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use ezpass_config::Config;
use ezpass_core::{
    AssignOutcome, FieldMapper, FileKeyValueStore, FillEngine, FillOutcome, MappingStore,
    Placeholders, SaveFlow, SaveOutcome, SnapshotDocument, effective_origin, synthesize,
};
use ezpass_protocols::{Document, Element, FieldLocator, Role, UserPrompt};
use ezpass_sync::SyncChannel;

use crate::prompt::TerminalPrompt;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

async fn load_page(path: &Path) -> Result<Arc<SnapshotDocument>, Box<dyn std::error::Error>> {
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("Cannot read page {}: {}", path.display(), e))?;
    Ok(Arc::new(SnapshotDocument::from_json(&json)?))
}

async fn write_page(path: &Path, doc: &SnapshotDocument) -> CmdResult {
    let json = serde_json::to_string_pretty(&doc.to_snapshot())?;
    tokio::fs::write(path, json).await?;
    info!("Wrote filled page to {}", path.display());
    Ok(())
}

fn mapping_store(config: &Config) -> Arc<MappingStore> {
    let store = FileKeyValueStore::new(config.storage.path.clone());
    Arc::new(MappingStore::new(Arc::new(store)))
}

/// Force-fill a page snapshot.
pub(crate) async fn fill(config: &Config, page: &Path, write: bool) -> CmdResult {
    let doc = load_page(page).await?;
    let channel = Arc::new(SyncChannel::from_config(&config.sync)?);
    let prompt: Arc<dyn UserPrompt> = Arc::new(TerminalPrompt::stdin());
    let engine = FillEngine::new(doc.clone(), channel.clone(), prompt)
        .with_placeholders(Placeholders::from_config(&config.fill));

    let result = engine.refresh().await;
    channel.close().await;

    let outcome = result?;
    match &outcome {
        FillOutcome::Filled(report) => {
            for locator in &report.missing {
                warn!("No element matches {}", locator);
            }
            println!("Filled {} field(s):", report.filled.len());
        }
        FillOutcome::NothingToFill => println!("Nothing to fill for {}", engine.current_origin()),
        FillOutcome::Dismissed => println!("Account selection cancelled"),
        FillOutcome::Stale => println!("Page changed before the answer arrived"),
    }
    for (label, shown) in field_lines(&doc, &outcome) {
        println!("  {:<40} {}", label, shown);
    }

    if write {
        write_page(page, &doc).await?;
    }
    Ok(())
}

/// Locator and printable value of every input. Password fields are masked,
/// whether recognised by their type or by the role the fill gave them.
fn field_lines(doc: &SnapshotDocument, outcome: &FillOutcome) -> Vec<(String, String)> {
    let secret: Vec<FieldLocator> = match outcome {
        FillOutcome::Filled(report) => report
            .filled
            .iter()
            .chain(&report.skipped)
            .filter(|f| f.role == Role::Password)
            .map(|f| f.locator.clone())
            .collect(),
        _ => Vec::new(),
    };

    doc.inputs_flagged(&secret)
        .into_iter()
        .map(|(input, is_secret)| {
            let label = synthesize(input.as_ref())
                .map(|l| l.to_string())
                .unwrap_or_else(|| "<input>".to_string());
            let value = input.value();
            let masked = is_secret || input.input_type() == "password";
            let shown = if masked && !value.is_empty() {
                "********".to_string()
            } else {
                value
            };
            (label, shown)
        })
        .collect()
}

/// Apply a field assignment as if `role` was dropped onto `target`.
pub(crate) async fn map(config: &Config, page: &Path, target: &str, role: &str) -> CmdResult {
    let doc = load_page(page).await?;
    let target = doc
        .query(&FieldLocator::new(target))
        .ok_or_else(|| format!("No element matches {}", target))?;
    let channel = Arc::new(SyncChannel::from_config(&config.sync)?);
    let mapper = FieldMapper::new(doc.clone(), mapping_store(config), channel.clone());

    let result = mapper.assign(target, role).await;
    channel.close().await;

    match result? {
        AssignOutcome::Assigned {
            origin,
            role,
            locator,
            synced,
        } => {
            println!("{}: {} -> {}", origin, role, locator);
            if !synced {
                println!("(not mirrored to the credential service)");
            }
            Ok(())
        }
        AssignOutcome::InvalidPayload(payload) => Err(format!("Invalid role: {}", payload).into()),
        AssignOutcome::NoInput => Err("Target is not inside an input element".into()),
        AssignOutcome::Unmappable => Err("Cannot build a locator for the target".into()),
    }
}

/// Print the stored mappings, optionally only the one for `address`.
pub(crate) async fn mappings(config: &Config, address: Option<&str>) -> CmdResult {
    let store = mapping_store(config);
    match address {
        Some(address) => {
            let origin = effective_origin(address);
            let mapping = store.get(&origin).await;
            if mapping.is_empty() {
                println!("No mapping for {}", origin);
            } else {
                println!("{}", serde_json::to_string_pretty(&mapping)?);
            }
        }
        None => {
            let all = store.all().await?;
            println!("{}", serde_json::to_string_pretty(&all)?);
        }
    }
    Ok(())
}

/// Force-save the credentials typed into a page snapshot.
pub(crate) async fn save(config: &Config, page: &Path) -> CmdResult {
    let doc = load_page(page).await?;
    let channel = Arc::new(SyncChannel::from_config(&config.sync)?);
    let prompt: Arc<dyn UserPrompt> = Arc::new(TerminalPrompt::stdin());
    let fill = Arc::new(
        FillEngine::new(doc.clone(), channel.clone(), prompt.clone())
            .with_placeholders(Placeholders::from_config(&config.fill)),
    );
    let flow = SaveFlow::new(
        doc.clone(),
        mapping_store(config),
        channel.clone(),
        prompt,
        fill,
    );

    let origin = effective_origin(&doc.location());
    let result = flow.trigger(origin.clone()).await;
    channel.close().await;

    match result? {
        SaveOutcome::Saved { .. } => println!("Saved credentials for {}", origin),
        SaveOutcome::NotMapped => println!("No complete field mapping for {}", origin),
        SaveOutcome::Declined => println!("Not saved"),
        SaveOutcome::AlreadySaving => println!("A save is already in progress"),
        SaveOutcome::OriginMismatch { expected, current } => {
            println!("Page moved from {} to {}, not saved", expected, current)
        }
        SaveOutcome::MissingValues => println!("Not saved: a field is empty"),
        SaveOutcome::Failed(e) => return Err(e.into()),
    }
    Ok(())
}
