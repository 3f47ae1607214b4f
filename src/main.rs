//! listing-tiers: clean rental listings and segment them into price tiers
//!
//! This is the main entrypoint that dispatches the batch run and the
//! inspection of a finished artifact.

use anyhow::{Context, Result};
use clap::Parser;
use listing_tiers::analysis::{community_scores, room_type_prices};
use listing_tiers::cli::{AnalyzeArgs, Args, Command, InspectArgs, RunArgs};
use listing_tiers::consumer::{read_enriched, summarize_tiers};
use listing_tiers::logging::init_logging;
use listing_tiers::pipeline;
use tracing::info;

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match &args.command {
        Command::Run(run) => run_pipeline(run),
        Command::Inspect(inspect) => run_inspect(inspect),
        Command::Analyze(analyze) => run_analyze(analyze),
    }
}

/// Run the full cleaning and clustering batch
fn run_pipeline(args: &RunArgs) -> Result<()> {
    let predict = args.parse_listing_values()?;
    let config = args.resolve_config().context("resolving configuration")?;

    let report = pipeline::run(&config)
        .with_context(|| format!("segmenting listings from {}", config.input.display()))?;

    let cleaning = &report.cleaning;
    println!("=== Cleaning ===");
    println!("Input listings:            {}", cleaning.input_rows);
    println!("After missing-price filter: {}", cleaning.after_price_filter);
    println!("After hyperlink filter:    {}", cleaning.after_link_filter);

    println!("\n=== Tiers ===");
    println!("  Tier      | Cluster | Listings |    Price | Rating | Capacity");
    println!("  ----------|---------|----------|----------|--------|---------");
    for profile in &report.tiers {
        let share = profile.size as f64 / report.clustered.max(1) as f64 * 100.0;
        println!(
            "  {:9} | {:7} | {:8} | {:8.2} | {:6.2} | {:8.2}   ({:.1}%)",
            profile.tier.as_str(),
            profile.cluster_id,
            profile.size,
            profile.price,
            profile.rating,
            profile.capacity,
            share
        );
    }
    println!("\nUnclustered (missing features): {}", report.unclustered);
    println!("Within-cluster sum of squares: {:.2}", report.inertia);
    println!("Silhouette score (sample): {:.3}", report.silhouette);

    if let Some(values) = predict {
        let tier = report.segmentation.predict_tier(&values)?;
        println!(
            "\nPredicted tier for price={}, rating={}, capacity={}: {}",
            values[0], values[1], values[2], tier
        );
    }

    info!(output = %config.output.display(), "enriched listings saved");
    Ok(())
}

/// Filter a finished artifact and print per-tier statistics
fn run_inspect(args: &InspectArgs) -> Result<()> {
    let filter = args.filter()?;
    let df = read_enriched(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let total = df.height();
    let filtered = filter.apply(df)?;

    println!("Matching listings: {} of {}", filtered.height(), total);
    for summary in summarize_tiers(&filtered)? {
        match summary.mean_price {
            Some(mean) => println!(
                "  {:9}: {:6} listings, mean price {:.2}",
                summary.tier.as_str(),
                summary.listings,
                mean
            ),
            None => println!("  {:9}: {:6} listings", summary.tier.as_str(), summary.listings),
        }
    }
    Ok(())
}

/// Print the neighborhood price table and community scores
fn run_analyze(args: &AnalyzeArgs) -> Result<()> {
    let df = read_enriched(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;

    println!("=== Median price by neighborhood and room type ===");
    for row in room_type_prices(&df)? {
        println!(
            "  {:24} | {:16} | {:5} listings | {:8.2}",
            row.neighborhood, row.room_type, row.listings, row.median_price
        );
    }

    if args.prices_only {
        return Ok(());
    }

    println!("\n=== Community score (>= {} reviews) ===", args.min_reviews);
    println!("  Neighborhood             | Listings | Mean price | Rating | Score");
    for row in community_scores(&df, args.min_reviews)? {
        println!(
            "  {:24} | {:8} | {:10.2} | {:6.2} | {:.3}",
            row.neighborhood, row.listings, row.mean_price, row.mean_rating, row.score
        );
    }
    Ok(())
}
