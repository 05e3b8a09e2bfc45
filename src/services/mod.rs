// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod export;
pub mod ingest;
pub mod strava;

pub use export::JsonExportSink;
pub use ingest::{Ingestor, RunReport};
pub use strava::{FetchReport, StravaClient};
