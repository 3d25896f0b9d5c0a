//! Setup command - store and verify the API access token

use anyhow::Result;
use dialoguer::Input;

use ledgerline_core::adapters::teller::TellerSource;
use ledgerline_core::ports::TransactionSource;
use ledgerline_core::{Credential, LogEvent};

use super::{get_context, get_ledgerline_dir, get_logger, log_command, log_event};
use crate::output;

pub fn run(token: Option<String>) -> Result<()> {
    let logger = get_logger();
    log_command(&logger, "setup");
    let ctx = get_context()?;

    let token = match token {
        Some(t) => t,
        None => Input::new()
            .with_prompt("Teller access token")
            .interact_text()?,
    };

    // Verify the token against the live API before saving it
    let mut credential = Credential::new(token.clone());
    if let Some(base_url) = &ctx.config.base_url {
        credential = credential.with_base_url(base_url.clone());
    }

    output::info("Verifying access token...");
    let accounts = match TellerSource::new().list_accounts(&credential) {
        Ok(accounts) => accounts,
        Err(e) => {
            log_event(
                &logger,
                LogEvent::new("setup_failed")
                    .with_command("setup")
                    .with_error(e.to_string()),
            );
            return Err(e.into());
        }
    };

    let mut config = ctx.config.clone();
    config.set_access_token(&token);
    config.save(&get_ledgerline_dir())?;

    log_event(
        &logger,
        LogEvent::new("setup_completed").with_command("setup"),
    );

    output::success("Access token saved");
    println!(
        "  {} account(s) visible. Run 'lgl backfill' to pull their history.",
        accounts.len()
    );

    Ok(())
}
