use std::collections::BTreeSet;
use std::io::{self, Write};

use serde::Serialize;
use storysync_core::edge::{
    CacheStorage, EdgeCache, EdgeRequest, HttpFetcher, LibSqlCacheStorage, NamespaceState,
    ResponseSource,
};

use crate::cli::CacheCommands;
use crate::commands::common::CliContext;
use crate::error::CliError;
use crate::host::TerminalHost;

#[derive(Debug, Serialize)]
pub struct NamespaceItem {
    pub name: String,
    pub state: &'static str,
    pub entries: usize,
    pub current: bool,
}

pub async fn run_cache(command: &CacheCommands, ctx: &CliContext) -> Result<(), CliError> {
    let db = ctx.open_database().await?;
    let fetcher = HttpFetcher::new(ctx.config.request_timeout())?;
    let cache = EdgeCache::new(
        LibSqlCacheStorage::new(db.connection()),
        fetcher,
        ctx.config.edge_config(),
    )?;
    let host = TerminalHost::new(ctx.config.edge.app_origin.clone());

    match command {
        CacheCommands::Install => {
            let report = cache.install(&host).await?;
            for url in &report.cached {
                println!("cached  {url}");
            }
            for (url, reason) in &report.failed {
                println!("failed  {url}  ({reason})");
            }
            for name in &report.purged {
                println!("removed {name}");
            }
        }
        CacheCommands::Activate => {
            let removed = cache.activate(&host).await?;
            if removed.is_empty() {
                println!("No old caches to remove.");
            }
            for name in removed {
                println!("removed {name}");
            }
        }
        CacheCommands::Status { json } => {
            let items = namespace_items(&cache).await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                for item in items {
                    println!("{:<20}  {:<9}  {} entries", item.name, item.state, item.entries);
                }
            }
        }
        CacheCommands::Fetch { url, method } => {
            let request = EdgeRequest {
                method: method.to_ascii_uppercase(),
                ..EdgeRequest::get(url.clone())
            };
            let outcome = cache.handle_fetch(&request).await?;
            eprintln!(
                "{} ({})",
                outcome.response.status,
                source_label(outcome.source)
            );
            io::stdout().write_all(&outcome.response.body)?;
        }
    }

    Ok(())
}

async fn namespace_items(
    cache: &EdgeCache<LibSqlCacheStorage<'_>, HttpFetcher>,
) -> Result<Vec<NamespaceItem>, CliError> {
    let versions = cache.versions();
    let mut names = BTreeSet::from([versions.assets.clone(), versions.data.clone()]);
    names.extend(cache.storage().namespaces().await?);

    let mut items = Vec::with_capacity(names.len());
    for name in names {
        let state = cache.namespace_state(&name).await?;
        let entries = cache.storage().entry_count(&name).await?;
        items.push(NamespaceItem {
            current: versions.is_current(&name),
            state: state_label(state),
            entries,
            name,
        });
    }
    Ok(items)
}

pub const fn state_label(state: NamespaceState) -> &'static str {
    match state {
        NamespaceState::Empty => "empty",
        NamespaceState::Populated => "populated",
        NamespaceState::Stale => "stale",
        NamespaceState::Purged => "purged",
    }
}

pub const fn source_label(source: ResponseSource) -> &'static str {
    match source {
        ResponseSource::Network => "network",
        ResponseSource::Cache => "cache",
    }
}
