//! Plan command implementation.

use super::{connect, validate};
use crate::config::{CliError, RetryConfig, StoreArgs};
use skusync_engine::{PlanPreview, SyncConfig};
use skusync_model::{Operation, OutcomeStatus, SkipReason, Tier};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Runs the plan command.
pub async fn run(stores: &StoreArgs, page_size: u32, format: &str) -> Result<(), CliError> {
    let config = SyncConfig::new().with_page_size(page_size);
    let engine = connect(stores, config, RetryConfig::default())?;
    validate(&engine).await?;

    let preview = engine.plan().await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&preview)?),
        _ => print!("{}", render_plan(&preview)),
    }
    Ok(())
}

/// Renders a preview as text.
pub fn render_plan(preview: &PlanPreview) -> String {
    let mut out = String::new();

    if preview.is_empty() {
        out.push_str("Nothing to do.\n");
    }

    for tier in Tier::ALL {
        let ops: Vec<&Operation> = preview.plan.tier(tier).collect();
        if ops.is_empty() {
            continue;
        }
        let heading = match tier {
            Tier::Products => "Products",
            Tier::Collections => "Collections",
            Tier::Memberships => "Memberships",
        };
        let _ = writeln!(out, "{heading} ({}):", ops.len());
        for op in ops {
            let _ = writeln!(out, "  {}{}", op, describe(op));
        }
    }

    let mut skipped: BTreeMap<SkipReason, usize> = BTreeMap::new();
    for outcome in &preview.skipped {
        if let OutcomeStatus::Skipped(reason) = outcome.status {
            *skipped.entry(reason).or_default() += 1;
        }
    }
    if !skipped.is_empty() {
        let _ = writeln!(out, "Skipped:");
        for (reason, count) in skipped {
            let _ = writeln!(out, "  {reason}: {count}");
        }
    }

    out
}

fn describe(op: &Operation) -> String {
    match op {
        Operation::UpdateProduct { changes, .. } => {
            let mut fields = Vec::new();
            if changes.title.is_some() {
                fields.push("title");
            }
            if changes.description.is_some() {
                fields.push("description");
            }
            if changes.status.is_some() {
                fields.push("status");
            }
            if !changes.variant_updates.is_empty() {
                fields.push("variants");
            }
            if !changes.variant_creates.is_empty() {
                fields.push("new variants");
            }
            if changes.images.is_some() {
                fields.push("images");
            }
            format!(" ({})", fields.join(", "))
        }
        Operation::LinkCollectionMembership {
            product_id: None, ..
        } => " (after create)".to_string(),
        _ => String::new(),
    }
}
