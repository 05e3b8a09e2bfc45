// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava activity export tool.
//!
//! Authenticates with Strava via a browser-based OAuth flow, drains the
//! paginated activities API and writes the raw records to a JSON export for
//! downstream analysis.

use std::process::ExitCode;

use strava_export::config::Config;
use strava_export::services::ingest;
use strava_export::services::strava::StravaClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    // Credentials are a hard precondition; fail before any network activity.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            eprintln!("Set STRAVA_CLIENT_ID and STRAVA_CLIENT_SECRET (a .env file works).");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(port = config.port, "Starting Strava export");

    let strava = StravaClient::new(
        config.strava_client_id.clone(),
        config.strava_client_secret.clone(),
    );

    let ingestor = match ingest::bind(config, strava).await {
        Ok(ingestor) => ingestor,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let auth_url = ingestor.authorize_url();
    println!("Opening browser for authorization...");
    if open::that(&auth_url).is_err() {
        println!("Could not open a browser. Please visit:");
    }
    println!("{auth_url}");
    println!("Waiting for the authorization callback...");

    match ingestor.wait_for_callback().await {
        Ok(report) => {
            println!();
            println!(
                "{} activities saved to {}",
                report.total,
                report.export_path.display()
            );
            println!("Activity summary by sport type:");
            for (category, count) in &report.by_category {
                println!("   {category}: {count}");
            }

            if let Some(err) = &report.pagination_error {
                eprintln!("Run completed partially: {err}");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Run failed: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize structured logging.
fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("strava_export=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
