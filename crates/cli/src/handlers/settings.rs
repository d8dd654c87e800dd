//! `settings list | get | set`.

use anyhow::{Context, Result};
use horde_pipeline::settings::SETTING_KEYS;

use crate::cli::SettingsCommand;
use crate::context::AppContext;

pub async fn execute(ctx: &mut AppContext, command: &SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::List => {
            for key in SETTING_KEYS {
                println!("{key:<16} {}", display(ctx, key));
            }
        }
        SettingsCommand::Get { key } => {
            if !SETTING_KEYS.contains(&key.as_str()) {
                anyhow::bail!("Unknown setting '{key}'");
            }
            println!("{}", display(ctx, key));
        }
        SettingsCommand::Set { key, value } => {
            ctx.settings.set(key, value)?;
            ctx.settings
                .save(&ctx.pool)
                .await
                .context("Failed to save settings")?;
            tracing::info!(%key, "Setting saved");
            println!("{key} = {}", display(ctx, key));
        }
    }
    Ok(())
}

fn display(ctx: &AppContext, key: &str) -> String {
    match (key, ctx.settings.get(key)) {
        ("api_key", Some(_)) => "********".to_string(),
        (_, Some(value)) => value,
        (_, None) => "(unset)".to_string(),
    }
}
