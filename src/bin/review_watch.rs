use chrono::NaiveDate;
use clap::Parser;
use std::{sync::Arc, time::Duration};

use worth_the_watch::{
    client::{
        HttpRevalidator, NoopRevalidator, Phase, ReviewApi, ReviewTracker, Revalidator, TitleRef,
        TrackerConfig,
    },
    logging,
    models::MediaType,
};

/// Start a review generation and follow it until it finishes
#[derive(Debug, Parser)]
#[command(name = "review-watch", version)]
struct Args {
    /// TMDB id of the movie or show
    tmdb_id: i64,

    #[arg(long, default_value = "movie")]
    media_type: MediaType,

    /// Replace an existing review with a fresh one
    #[arg(long)]
    regenerate: bool,

    /// Release date (YYYY-MM-DD); future dates are refused locally
    #[arg(long)]
    release_date: Option<NaiveDate>,

    #[arg(long, env = "REVIEW_API_URL", default_value = "http://127.0.0.1:8000")]
    api_url: String,

    #[arg(long, default_value_t = 2)]
    poll_interval_secs: u64,

    #[arg(long, default_value_t = 90)]
    max_polls: u32,

    /// Frontend endpoint to ping once the review is ready
    #[arg(long, env = "REVALIDATE_URL")]
    revalidate_url: Option<String>,

    #[arg(long, env = "REVALIDATE_SECRET", hide_env_values = true)]
    revalidate_secret: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing("warn");
    let args = Args::parse();

    let revalidator: Arc<dyn Revalidator> = match args.revalidate_url {
        Some(url) => Arc::new(HttpRevalidator::new(url, args.revalidate_secret)),
        None => Arc::new(NoopRevalidator),
    };
    let tracker = ReviewTracker::new(
        ReviewApi::new(args.api_url),
        revalidator,
        TrackerConfig {
            poll_interval: Duration::from_secs(args.poll_interval_secs.max(1)),
            max_polls: args.max_polls,
        },
    );

    let title = TitleRef {
        tmdb_id: args.tmdb_id,
        media_type: args.media_type,
        release_date: args.release_date,
    };
    let mut updates = tracker.subscribe();
    if args.regenerate {
        tracker.regenerate(title)?;
    } else {
        tracker.generate(title)?;
    }

    let mut last_label = String::new();
    loop {
        let state = updates.borrow_and_update().clone();
        if let Some(progress) = &state.progress {
            if progress.label != last_label {
                println!("[{:>3}%] {}", progress.percent, progress.label);
                last_label = progress.label.clone();
            }
        }
        if state.is_settled() {
            break;
        }
        if updates.changed().await.is_err() {
            break;
        }
    }

    let state = tracker.state();
    match state.phase {
        Phase::Completed => {
            if let Some(found) = state.review {
                match &found.review {
                    Some(review) => {
                        println!("\n{} ({})", found.movie.title, found.movie.year());
                        println!("Verdict: {}", review.verdict);
                        println!("\n{}", review.review_text);
                    }
                    None => println!("\n{}: no review available", found.movie.title),
                }
            }
            Ok(())
        }
        _ => {
            let message = state
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "generation did not finish".to_string());
            anyhow::bail!(message)
        }
    }
}
