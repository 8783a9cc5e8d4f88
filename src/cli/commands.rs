//! CLI command handlers.

use std::sync::Arc;

use crate::api::CrmClient;
use crate::auth::{StorageOption, TokenAcquirer, TokenStore};
use crate::config::ZcrmConfig;

use super::{RecordsArgs, TokenCommands};

/// Handle `zcrm records <module>`.
pub async fn handle_records(args: &RecordsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = ZcrmConfig::from_env()?;
    let acquirer: Arc<dyn TokenAcquirer> = if args.cache {
        let manager = Arc::new(config.cached_token_manager()?);
        manager.begin_flow().await?;
        manager
    } else {
        let manager = Arc::new(config.token_manager()?);
        manager.begin_flow(StorageOption::InMemory).await?;
        manager
    };

    let page = args.page.map(|p| p.to_string());
    let per_page = args.per_page.map(|p| p.to_string());
    let mut params = Vec::new();
    if let Some(page) = page.as_deref() {
        params.push(("page", page));
    }
    if let Some(per_page) = per_page.as_deref() {
        params.push(("per_page", per_page));
    }

    let client = CrmClient::new(acquirer).with_base_url(config.api_base_url());
    let page = client.get_page(&args.module, &params).await?;
    if page.data.is_empty() {
        println!("No records in {}", args.module);
        return Ok(());
    }

    for record in &page.data {
        println!("{}", record.id.as_deref().unwrap_or("<no id>"));
        if let Some(owner) = record.owner.as_ref().and_then(|o| o.name.as_deref()) {
            println!("  owner: {owner}");
        }
        for item in record.line_items.iter().flatten() {
            println!(
                "  {} x{} = {}",
                item.product.name.as_deref().unwrap_or("<product>"),
                item.quantity,
                item.net_total
            );
        }
        println!("  {} fields, {} properties", record.fields.len(), record.properties.len());
    }
    if let Some(info) = page.info.filter(|info| info.more_records) {
        println!("More records available after page {}", info.page.unwrap_or(1));
    }
    Ok(())
}

/// Handle `zcrm token status|clear`.
pub async fn handle_token(command: &TokenCommands) -> Result<(), Box<dyn std::error::Error>> {
    let config = ZcrmConfig::from_env()?;
    let client_id = config
        .client_id
        .clone()
        .ok_or("ZCRM_CLIENT_ID is not set")?;
    let store = config.token_store();

    match command {
        TokenCommands::Status => match store.load(&client_id)? {
            Some(pair) => {
                let state = if pair.expires_at > chrono::Utc::now() {
                    "valid"
                } else {
                    "expired"
                };
                println!("{client_id}: {state}, expires {}", pair.expires_at);
                println!("  file: {}", store.token_path(&client_id).display());
            }
            None => println!("{client_id}: no cached token"),
        },
        TokenCommands::Clear => {
            store.remove(&client_id)?;
            println!("Removed cached token for {client_id}");
        }
    }
    Ok(())
}
