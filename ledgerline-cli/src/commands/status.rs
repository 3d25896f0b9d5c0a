//! Status command - show store summary and per-account cursors

use anyhow::Result;
use colored::Colorize;

use super::{get_context, get_logger, log_command};
use crate::output::create_table;

pub fn run(json: bool) -> Result<()> {
    let logger = get_logger();
    log_command(&logger, "status");
    let ctx = get_context()?;
    let status = ctx.status_service.get_status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Ledgerline Status".bold());
    println!();

    let mut table = create_table();
    table.add_row(vec!["Accounts", &status.total_accounts.to_string()]);
    table.add_row(vec!["Transactions", &status.total_transactions.to_string()]);
    table.add_row(vec!["Sync cursors", &status.total_cursors.to_string()]);
    println!("{}", table);
    println!();

    if let (Some(earliest), Some(latest)) = (&status.date_range.earliest, &status.date_range.latest)
    {
        println!("Date range: {} to {}", earliest, latest);
        println!();
    }

    if !status.institution_names.is_empty() {
        println!("{}", "Institutions".bold());
        for name in &status.institution_names {
            println!("  • {}", name);
        }
        println!();
    }

    if !status.accounts.is_empty() {
        println!("{}", "Accounts".bold());
        let mut table = create_table();
        table.set_header(vec![
            "Account",
            "Institution",
            "Last four",
            "Currency",
            "Cursor",
            "Updated",
        ]);
        for account in &status.accounts {
            table.add_row(vec![
                account.name.clone(),
                account.institution_name.clone(),
                account.last_four.clone().unwrap_or_default(),
                account.currency.clone(),
                account.cursor.clone().unwrap_or_else(|| "-".to_string()),
                account
                    .cursor_updated_at
                    .clone()
                    .unwrap_or_else(|| "-".to_string()),
            ]);
        }
        println!("{}", table);
    }

    Ok(())
}
