//! Backfill command - re-fetch every account's history from the top
//!
//! Unlike sync, this ignores stored cursors and refetches up to one full
//! page per account. Existing rows are overwritten in place by the upserts.

use anyhow::Result;
use ledgerline_core::LogEvent;

use super::{get_context, get_logger, log_command, log_event};
use crate::output;

pub fn run(token: Option<String>, page_size: Option<usize>, json: bool) -> Result<()> {
    let logger = get_logger();
    log_command(&logger, "backfill");
    let ctx = get_context()?;

    let credential = ctx.credential(token.as_deref())?;
    let page_size = page_size.unwrap_or(ctx.config.page_size);

    let summary = match ctx.sync_service.run_full_sync(&credential, page_size) {
        Ok(summary) => summary,
        Err(e) => {
            log_event(
                &logger,
                LogEvent::new("backfill_failed")
                    .with_command("backfill")
                    .with_error(e.to_string()),
            );
            return Err(e.into());
        }
    };

    let counts = serde_json::json!({
        "accounts": summary.accounts,
        "transactions": summary.transactions,
        "failed_accounts": summary.errors.len(),
    });
    if summary.has_errors() {
        log_event(
            &logger,
            LogEvent::new("backfill_failed")
                .with_command("backfill")
                .with_error(format!("{} account(s) failed", summary.errors.len()))
                .with_error_details(counts.to_string()),
        );
    } else {
        log_event(
            &logger,
            LogEvent::new("backfill_completed")
                .with_command("backfill")
                .with_error_details(counts.to_string()),
        );
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if summary.has_errors() {
        output::warning("Backfill completed with errors");
    } else {
        output::success("Backfill complete");
    }
    output::print_sync_summary(&summary);

    Ok(())
}
