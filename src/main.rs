mod config;
mod display;
mod jobs;
mod models;
mod oracle;
mod pipeline;
mod store;

use anyhow::{Context, Result, ensure};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::jobs::{ApifyScraper, JobSource};
use crate::models::{ResultBundle, SearchRequest};
use crate::oracle::Oracle;
use crate::pipeline::GapPolicy;
use crate::store::{EvalResult, Store};

#[derive(Parser)]
#[command(name = "jobscout")]
#[command(about = "LLM-assisted job search triage - fetch postings, score them against a resume, surface the best matches")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and score postings using explicit search parameters
    Search {
        /// Path to local resume, plain text
        #[arg(short, long)]
        resume_path: PathBuf,

        /// The job title to search for
        #[arg(short = 'j', long)]
        job_title: String,

        /// The city to search in (only the city, not the state)
        #[arg(short, long, default_value = "Austin")]
        city: String,

        /// Maximum number of postings to fetch
        #[arg(short, long, default_value = "10")]
        limit: u32,

        /// Only include hybrid jobs
        #[arg(long)]
        hybrid: bool,

        /// How many top matches to display
        #[arg(short, long, default_value = "5")]
        top_n: usize,

        /// Feed only near misses above this score into the gap analysis
        /// (default: everything outside the top N; bare flag uses 7.0)
        #[arg(long, num_args = 0..=1, default_missing_value = "7.0")]
        gap_floor: Option<f64>,

        /// Where to write result files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Derive search parameters from a free-text prompt (validity-gated)
    Prompt {
        /// Path to local resume, plain text
        #[arg(short, long)]
        resume_path: PathBuf,

        /// Free-text description of the search, e.g.
        /// "10 hybrid data engineer jobs in Austin"
        text: String,

        /// How many top matches to display
        #[arg(short, long, default_value = "5")]
        top_n: usize,

        /// Feed only near misses above this score into the gap analysis
        /// (bare flag uses 7.0)
        #[arg(long, num_args = 0..=1, default_missing_value = "7.0")]
        gap_floor: Option<f64>,

        /// Where to write result files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Re-score a cached results file against a resume to gauge oracle
    /// consistency
    Eval {
        /// Path to local resume, plain text
        #[arg(short, long)]
        resume_path: PathBuf,

        /// The cached results file to test against
        #[arg(short, long)]
        cache_path: PathBuf,

        /// Scoring iterations per posting
        #[arg(short = 'n', long, default_value = "5")]
        iterations: u32,

        /// Where to write eval results
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jobscout=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Search {
            resume_path,
            job_title,
            city,
            limit,
            hybrid,
            top_n,
            gap_floor,
            output_dir,
        } => {
            let config = Config::from_env()?;
            let oracle = oracle::create_oracle(&config)?;
            let source = ApifyScraper::from_env()?;
            let resume = read_resume(&resume_path)?;
            tracing::info!("Got job search details looking for {job_title} jobs in {city}");

            let request = SearchRequest {
                keywords: job_title,
                city,
                limit,
                hybrid,
                resume: None,
            };
            run_workflow(
                oracle.as_ref(),
                &source,
                &resume,
                request,
                top_n,
                gap_policy(gap_floor),
                output_dir,
            )
        }

        Commands::Prompt {
            resume_path,
            text,
            top_n,
            gap_floor,
            output_dir,
        } => {
            let config = Config::from_env()?;
            let oracle = oracle::create_oracle(&config)?;
            let source = ApifyScraper::from_env()?;
            let resume = read_resume(&resume_path)?;

            let request = oracle::check_and_extract(oracle.as_ref(), &text)?;
            tracing::info!(
                "Extracted search for {} jobs in {}",
                request.keywords,
                request.city
            );
            run_workflow(
                oracle.as_ref(),
                &source,
                &resume,
                request,
                top_n,
                gap_policy(gap_floor),
                output_dir,
            )
        }

        Commands::Eval {
            resume_path,
            cache_path,
            iterations,
            output_dir,
        } => {
            let config = Config::from_env()?;
            let oracle = oracle::create_oracle(&config)?;
            let resume = read_resume(&resume_path)?;
            run_eval(oracle.as_ref(), &resume, &cache_path, iterations, output_dir)
        }
    }
}

fn read_resume(path: &PathBuf) -> Result<String> {
    tracing::info!("Reading resume from {}", path.display());
    let resume = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read resume file: {}", path.display()))?;
    ensure!(
        !resume.trim().is_empty(),
        "Resume file {} is empty",
        path.display()
    );
    Ok(resume)
}

fn gap_policy(gap_floor: Option<f64>) -> GapPolicy {
    match gap_floor {
        Some(floor) => GapPolicy::AboveFloor(floor),
        None => GapPolicy::BelowTopN,
    }
}

/// Fetch, score, rank, report, persist. One run, one bundle file.
fn run_workflow(
    oracle: &dyn Oracle,
    source: &dyn JobSource,
    resume: &str,
    request: SearchRequest,
    top_n: usize,
    policy: GapPolicy,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let postings = source.fetch(&request)?;
    if postings.is_empty() {
        tracing::error!("No job posts were returned from fetch. Exiting.");
        return Ok(());
    }
    tracing::info!("Fetched {} postings", postings.len());

    let scored = pipeline::score_postings(oracle, resume, postings);
    let ranked = pipeline::rank(scored, top_n);
    let gap_summary = pipeline::summarize_gaps(oracle, &ranked, policy);

    display::report(&ranked.top, &gap_summary);

    let stamp = store::timestamp();
    let bundle = ResultBundle {
        query_date: stamp.clone(),
        query_params: request.without_resume(),
        jobs: ranked.all(),
        areas_of_improvement: gap_summary,
    };
    let store = Store::open(output_dir.unwrap_or_else(config::default_results_dir))?;
    store.save_bundle(&bundle)?;
    store.save_overflow(&stamp, &ranked.remainder)?;

    tracing::info!("Workflow complete");
    Ok(())
}

/// Re-score every posting in a cached bundle N times against the given
/// resume and record the spread next to the original scores.
fn run_eval(
    oracle: &dyn Oracle,
    resume: &str,
    cache_path: &PathBuf,
    iterations: u32,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let bundle = store::load_bundle(cache_path)?;
    tracing::info!(
        "Re-evaluating {} cached postings, {} iterations each",
        bundle.jobs.len(),
        iterations
    );

    let mut results = Vec::with_capacity(bundle.jobs.len());
    for (i, job) in bundle.jobs.iter().enumerate() {
        let mut result = EvalResult {
            original_score: job.score(),
            original_explanation: job.explanation().to_string(),
            new_scores: Vec::new(),
            new_explanations: Vec::new(),
        };
        for _ in 0..iterations {
            match oracle.score_resume(resume, &job.posting.description) {
                Ok(score) => {
                    result.new_scores.push(score.score);
                    result.new_explanations.push(score.explanation);
                }
                Err(e) => {
                    tracing::error!("Failed to re-score posting {i}: {:#}", e);
                    result.new_scores.push(models::FAILED_SCORE);
                    result
                        .new_explanations
                        .push(models::FAILED_EXPLANATION.to_string());
                }
            }
        }
        display::eval_report(i, &result);
        results.push(result);
    }

    let store = Store::open(output_dir.unwrap_or_else(config::default_results_dir))?;
    store.save_eval(&store::timestamp(), &results)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobPosting, JobScore, PromptCheck};

    struct EmptySource;

    impl JobSource for EmptySource {
        fn fetch(&self, _request: &SearchRequest) -> Result<Vec<JobPosting>> {
            Ok(Vec::new())
        }
    }

    /// Oracle that must never be reached; the workflow is expected to stop
    /// before any scoring or gap call.
    struct UnreachableOracle;

    impl Oracle for UnreachableOracle {
        fn check_prompt(&self, _prompt: &str) -> Result<PromptCheck> {
            unreachable!("oracle called after an empty fetch")
        }

        fn extract_request(&self, _prompt: &str) -> Result<SearchRequest> {
            unreachable!("oracle called after an empty fetch")
        }

        fn score_resume(&self, _resume: &str, _job_description: &str) -> Result<JobScore> {
            unreachable!("oracle called after an empty fetch")
        }

        fn summarize_gaps(&self, _explanations: &[String]) -> Result<String> {
            unreachable!("oracle called after an empty fetch")
        }
    }

    #[test]
    fn test_empty_fetch_ends_run_cleanly_without_persistence() {
        let out_dir = std::env::temp_dir().join(format!(
            "jobscout-empty-run-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&out_dir);

        let request = SearchRequest {
            keywords: "Data Engineer".to_string(),
            city: "Austin".to_string(),
            limit: 5,
            hybrid: false,
            resume: None,
        };
        let result = run_workflow(
            &UnreachableOracle,
            &EmptySource,
            "Python developer, 5 years",
            request,
            5,
            GapPolicy::BelowTopN,
            Some(out_dir.clone()),
        );

        // Zero postings is a clean stop, not an error, and nothing is
        // written before the early return.
        assert!(result.is_ok());
        assert!(!out_dir.exists());
    }

    #[test]
    fn test_gap_floor_bare_flag_uses_default() {
        let cli = Cli::try_parse_from([
            "jobscout", "search", "-r", "resume.txt", "-j", "Engineer", "--gap-floor",
        ])
        .unwrap();
        match cli.command {
            Commands::Search { gap_floor, .. } => assert_eq!(gap_floor, Some(7.0)),
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn test_gap_floor_explicit_value_wins() {
        let cli = Cli::try_parse_from([
            "jobscout", "search", "-r", "resume.txt", "-j", "Engineer", "--gap-floor", "6.5",
        ])
        .unwrap();
        match cli.command {
            Commands::Search { gap_floor, .. } => {
                assert_eq!(gap_policy(gap_floor), GapPolicy::AboveFloor(6.5));
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn test_gap_floor_absent_means_below_top_n() {
        let cli = Cli::try_parse_from([
            "jobscout", "search", "-r", "resume.txt", "-j", "Engineer",
        ])
        .unwrap();
        match cli.command {
            Commands::Search { gap_floor, .. } => {
                assert_eq!(gap_policy(gap_floor), GapPolicy::BelowTopN);
            }
            _ => panic!("expected search command"),
        }
    }
}
