mod cli;
mod commands;

use std::env;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use runtime::Metrics;
use streaming::{FeedQuery, FeedSession, HttpTransport, QueryState, SessionHandle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::Args;
use commands::{HELP, Line, parse_line};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.session_config(&|key: &str| env::var(key).ok());
    let params = args.initial_params(Utc::now())?;
    let transport = Arc::new(HttpTransport::from_config(&config)?);

    info!("watching {}", FeedQuery::endpoint(&config.api_url));
    let handle = FeedSession::spawn(&config, transport, params);

    if args.follow {
        follow(handle).await
    } else {
        once(handle).await
    }
}

async fn once(mut handle: SessionHandle) -> anyhow::Result<()> {
    let state = handle
        .next_terminal(None)
        .await
        .context("feed session stopped before the query finished")?;
    print_features(&state);
    println!("{}", state.status_line());

    report(&handle.shutdown().await?);

    match state.status.error() {
        Some(message) => anyhow::bail!("{message}"),
        None => Ok(()),
    }
}

async fn follow(handle: SessionHandle) -> anyhow::Result<()> {
    let mut states = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprintln!("{HELP}");

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                print_status(&state);
            }
            line = lines.next_line() => {
                let Some(text) = line? else { break };
                match parse_line(&text, Utc::now()) {
                    Ok(Line::Intent(intent)) => handle.apply(intent).await?,
                    Ok(Line::Viewport(bounds)) => handle.viewport_changed(bounds).await?,
                    Ok(Line::Help) => eprintln!("{HELP}"),
                    Ok(Line::Blank) => {}
                    Ok(Line::Quit) => break,
                    Err(err) => eprintln!("{err:#}"),
                }
            }
        }
    }

    report(&handle.shutdown().await?);
    Ok(())
}

fn report(metrics: &Metrics) {
    for (name, value) in metrics.snapshot() {
        info!("{name} = {value}");
    }
    let sizes = metrics.batch_sizes();
    if sizes.count > 0 {
        info!(
            "batch sizes: {} batches, min {}, max {}, mean {:.1}",
            sizes.count,
            sizes.min,
            sizes.max,
            sizes.mean()
        );
    }
}

fn print_status(state: &QueryState) {
    let epoch = state.epoch.map(|e| e.to_string()).unwrap_or_default();
    let categories: Vec<&str> = state.categories.iter().map(|c| c.as_str()).collect();
    if categories.is_empty() {
        println!("{epoch} [{}] {}", state.status.label(), state.status_line());
    } else {
        println!(
            "{epoch} [{}] {} ({})",
            state.status.label(),
            state.status_line(),
            categories.join(", ")
        );
    }
}

fn print_features(state: &QueryState) {
    for feature in state.features.iter() {
        let props = &feature.properties;
        let geometry = &feature.geometry;
        let position = match (geometry.lon(), geometry.lat(), geometry.elevation()) {
            (Some(lon), Some(lat), Some(elevation)) => format!("{lat:.3},{lon:.3},{elevation}"),
            (Some(lon), Some(lat), None) => format!("{lat:.3},{lon:.3}"),
            _ => "-".to_string(),
        };
        println!(
            "{}\t{}\t{}\t{}\t{}",
            props.id,
            props.category,
            props.updated_at.format("%Y-%m-%d %H:%M"),
            position,
            props.title
        );
    }
}
