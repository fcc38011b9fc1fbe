use std::collections::HashSet;

use serde::Deserialize;
use tracing::{info, warn};

use super::client::{InfoTransport, RateLimitedClient};
use crate::models::request::InfoRequest;

#[derive(Debug, Deserialize)]
struct MetaResponse {
    universe: Vec<AssetMeta>,
}

#[derive(Debug, Deserialize)]
struct AssetMeta {
    name: String,
}

/// Current tradable coins, in upstream order without duplicates.
///
/// Any failure yields an empty list, which callers treat as nothing to fetch.
pub async fn resolve_universe<T: InfoTransport>(client: &RateLimitedClient<T>) -> Vec<String> {
    let meta: MetaResponse = match client.fetch_as(&InfoRequest::Meta).await {
        Some(meta) => meta,
        None => {
            warn!("Could not fetch the coin universe");
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let coins: Vec<String> = meta
        .universe
        .into_iter()
        .map(|asset| asset.name)
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .collect();

    info!("Found {} coins", coins.len());
    coins
}
