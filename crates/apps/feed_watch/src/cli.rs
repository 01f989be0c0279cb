use anyhow::{Context, bail};
use clap::Parser;
use foundation::{Category, GeoBounds, QueryParams, TimePreset, Timestamp, parse_timestamp};
use streaming::{FeedMode, SessionConfig};

#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Watch the disaster event feed from the terminal")]
pub struct Args {
    /// Base URL of the feed API (env: FEED_API_URL)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Comma-separated categories; empty selects nothing (default: all known)
    #[arg(long)]
    pub types: Option<String>,

    /// Lower time bound: 24h, 7d, 30d, an RFC 3339 timestamp or YYYY-MM-DD
    #[arg(long)]
    pub since: Option<String>,

    /// Bounding box: minLon,minLat,maxLon,maxLat
    #[arg(long, allow_hyphen_values = true)]
    pub bbox: Option<String>,

    /// Fetch one complete collection instead of streaming batches
    #[arg(long)]
    pub complete: bool,

    /// Result cap in complete mode, 1..=1000 (env: FEED_LIMIT)
    #[arg(long, requires = "complete")]
    pub limit: Option<u32>,

    /// Keep running and read commands from stdin
    #[arg(long)]
    pub follow: bool,
}

/// Environment lookup, injected so tests do not touch the process env.
pub type Env<'a> = &'a dyn Fn(&str) -> Option<String>;

fn env_var_u64(env: Env<'_>, key: &str) -> Option<u64> {
    env(key).and_then(|v| v.trim().parse().ok())
}

fn env_var_u32(env: Env<'_>, key: &str) -> Option<u32> {
    env(key).and_then(|v| v.trim().parse().ok())
}

impl Args {
    /// Defaults, then `FEED_*` environment variables, then flags.
    pub fn session_config(&self, env: Env<'_>) -> SessionConfig {
        let mut config = SessionConfig::default();
        if let Some(url) = env("FEED_API_URL").filter(|v| !v.trim().is_empty()) {
            config.api_url = url;
        }
        if let Some(ms) = env_var_u64(env, "FEED_DEBOUNCE_MS") {
            config.debounce_ms = ms;
        }
        config.request_timeout_ms = env_var_u64(env, "FEED_TIMEOUT_MS").filter(|ms| *ms > 0);

        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        if self.complete {
            let limit = self.limit.or_else(|| env_var_u32(env, "FEED_LIMIT"));
            config.mode = FeedMode::Complete { limit };
        }
        config
    }

    pub fn initial_params(&self, now: Timestamp) -> anyhow::Result<QueryParams> {
        let mut params = match &self.types {
            None => QueryParams::all_categories(),
            Some(list) => QueryParams::with_categories(parse_categories(list)),
        };
        if let Some(raw) = &self.since {
            params.since = parse_since(raw, now)?;
        }
        if let Some(raw) = &self.bbox {
            let bounds: GeoBounds = raw
                .parse()
                .with_context(|| format!("invalid --bbox {raw:?}"))?;
            params.viewport = Some(bounds);
        }
        Ok(params)
    }
}

pub fn parse_categories(list: &str) -> Vec<Category> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(Category::from)
        .collect()
}

/// A preset, a timestamp, or `none` to clear the bound.
pub fn parse_since(raw: &str, now: Timestamp) -> anyhow::Result<Option<Timestamp>> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    if let Ok(preset) = raw.parse::<TimePreset>() {
        return Ok(Some(preset.since(now)));
    }
    match parse_timestamp(raw) {
        Ok(ts) => Ok(Some(ts)),
        Err(err) => bail!("invalid since value {raw:?}: {err}"),
    }
}
