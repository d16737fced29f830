// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line parser and command dispatch.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;

use paperwerk_core::config::ENV_DATA_DIR;
use paperwerk_core::error::Result;
use paperwerk_core::types::{DocumentNumber, PageRequest};

use crate::services::app_services::AppServices;

#[derive(Debug, Parser)]
#[command(name = "paperwerk")]
#[command(about = "Scanned document workflow: normalize pages, recognize text, search")]
#[command(version)]
pub struct Cli {
    /// Data directory holding config.json, the database, the index and the archive
    #[arg(long, short = 'd', global = true, env = ENV_DATA_DIR)]
    pub data_dir: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a document from page images and run it through the workflow
    Ingest {
        /// Document owner
        #[arg(long)]
        owner: String,
        /// Document title
        #[arg(long)]
        title: String,
        /// Document date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Return once the pages are stored instead of waiting for the workflow
        #[arg(long)]
        no_wait: bool,
        /// Page images, in page order
        files: Vec<PathBuf>,
    },

    /// Review documents and wait until the workflow settles
    Review {
        /// Document numbers (all documents if omitted)
        documents: Vec<u64>,
    },

    /// Print a document and its pages as JSON
    Show {
        /// Document number
        document: u64,
    },

    /// Full-text search over titles, owners and recognized text
    Search {
        /// Search terms; all must match
        query: Vec<String>,
        /// Number of hits to skip
        #[arg(long, default_value = "0")]
        offset: u64,
        /// Maximum number of hits
        #[arg(short, long, default_value = "20")]
        limit: u64,
    },

    /// Rebuild the search index from the document store
    Reindex,
}

/// Run `command` against `services`.
pub async fn run(command: Commands, services: AppServices) -> Result<()> {
    match command {
        Commands::Ingest {
            owner,
            title,
            date,
            no_wait,
            files,
        } => {
            let pages = files.len();
            let number = services.ingest(owner, title, date, files).await?;
            if !no_wait {
                services.wait_idle().await;
            }
            info!(document = %number, pages, "ingest finished");
            println!("{number}");
        }

        Commands::Review { documents } => {
            let numbers = documents.into_iter().map(DocumentNumber).collect();
            let reviewed = services.review(numbers).await?;
            services.wait_idle().await;
            println!("reviewed {reviewed} document(s)");
        }

        Commands::Show { document } => {
            let document = services.show(DocumentNumber(document)).await?;
            println!("{}", serde_json::to_string_pretty(&document)?);
        }

        Commands::Search { query, offset, limit } => {
            // Let a start-up reindex finish so the hit count is complete.
            services.wait_idle().await;
            let results = services
                .search(query.join(" "), PageRequest::new(offset, limit))
                .await?;
            for hit in &results.hits {
                let pages = hit.pages.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
                println!("{}\t{:.4}\t{pages}", hit.document_number, hit.score);
            }
            println!("{} of {} hit(s)", results.hits.len(), results.total);
        }

        Commands::Reindex => {
            services.wait_idle().await;
            let count = services.reindex().await?;
            println!("indexed {count} document(s)");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ingest_parses_date_and_files() {
        let cli = Cli::try_parse_from([
            "paperwerk",
            "--data-dir",
            "/tmp/pw",
            "ingest",
            "--owner",
            "alice",
            "--title",
            "tax",
            "--date",
            "2025-04-30",
            "a.png",
            "b.tiff",
        ])
        .expect("parse");

        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/pw")));
        match cli.command {
            Commands::Ingest {
                owner,
                date,
                files,
                no_wait,
                ..
            } => {
                assert_eq!(owner, "alice");
                assert_eq!(date, NaiveDate::from_ymd_opt(2025, 4, 30));
                assert_eq!(files, [PathBuf::from("a.png"), PathBuf::from("b.tiff")]);
                assert!(!no_wait);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn bad_date_is_rejected() {
        let parsed = Cli::try_parse_from([
            "paperwerk", "ingest", "--owner", "a", "--title", "t", "--date", "30.04.2025",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn search_defaults() {
        let cli = Cli::try_parse_from(["paperwerk", "search", "invoice", "4711"]).expect("parse");
        match cli.command {
            Commands::Search { query, offset, limit } => {
                assert_eq!(query, ["invoice", "4711"]);
                assert_eq!((offset, limit), (0, 20));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
