use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{ResultBundle, ScoredPosting};

/// UTC run stamp, second precision. Also used inside the bundle as
/// `query_date` so file name and content agree.
pub fn timestamp() -> String {
    Utc::now().format("%Y%m%d-%H%M%S").to_string()
}

/// Flat-file store for run output. One timestamped file per run, never
/// overwritten or appended; old runs accumulate.
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn open(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create results directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the full ranked result set as `jobs_<stamp>.json`.
    pub fn save_bundle(&self, bundle: &ResultBundle) -> Result<PathBuf> {
        let path = self.dir.join(format!("jobs_{}.json", bundle.query_date));
        let json = serde_json::to_string_pretty(bundle)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write results to {}", path.display()))?;
        tracing::info!("Saved results to {}", path.display());
        Ok(path)
    }

    /// Write the non-top-N postings to a separate `job_cache_<stamp>.json`
    /// for later reprocessing. Skipped when there is nothing to cache.
    pub fn save_overflow(
        &self,
        stamp: &str,
        remainder: &[ScoredPosting],
    ) -> Result<Option<PathBuf>> {
        if remainder.is_empty() {
            return Ok(None);
        }
        let path = self.dir.join(format!("job_cache_{stamp}.json"));
        let json = serde_json::to_string_pretty(&serde_json::json!({ "job_cache": remainder }))?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write overflow cache to {}", path.display()))?;
        tracing::info!("Cached {} non-top postings to {}", remainder.len(), path.display());
        Ok(Some(path))
    }

    pub fn save_eval(&self, stamp: &str, results: &[EvalResult]) -> Result<PathBuf> {
        let path = self.dir.join(format!("eval_results_{stamp}.json"));
        let json = serde_json::to_string_pretty(results)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write eval results to {}", path.display()))?;
        tracing::info!("Saved eval results to {}", path.display());
        Ok(path)
    }
}

/// Reload a previously persisted bundle, e.g. to re-evaluate cached
/// postings against a different resume.
pub fn load_bundle(path: &Path) -> Result<ResultBundle> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read cached results from {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Malformed results file {}", path.display()))
}

/// One posting's original score next to the scores a re-evaluation run
/// produced, for eyeballing oracle consistency.
#[derive(Debug, Serialize, Deserialize)]
pub struct EvalResult {
    pub original_score: f64,
    pub original_explanation: String,
    pub new_scores: Vec<f64>,
    pub new_explanations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobPosting, ScoreOutcome, SearchRequest};

    fn temp_store(tag: &str) -> Store {
        let dir = std::env::temp_dir().join(format!(
            "jobscout-store-test-{tag}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        Store::open(dir).unwrap()
    }

    fn scored(company: &str, score: f64) -> ScoredPosting {
        ScoredPosting {
            posting: JobPosting {
                company: company.to_string(),
                company_url: "url".to_string(),
                description: "desc".to_string(),
                is_verified: false,
                job_title: "Engineer".to_string(),
                job_url: "url".to_string(),
                location: "Austin".to_string(),
                work_type: "Remote".to_string(),
                posted_at: "2025-06-01".to_string(),
            },
            outcome: ScoreOutcome::Scored {
                score,
                explanation: format!("{company} explanation"),
            },
        }
    }

    fn bundle(stamp: &str) -> ResultBundle {
        ResultBundle {
            query_date: stamp.to_string(),
            query_params: SearchRequest {
                keywords: "Data Engineer".to_string(),
                city: "Austin".to_string(),
                limit: 10,
                hybrid: true,
                resume: None,
            },
            jobs: vec![scored("A", 8.5), scored("B", 3.0)],
            areas_of_improvement: "- learn Kafka".to_string(),
        }
    }

    #[test]
    fn test_bundle_round_trip_preserves_rank_order() {
        let store = temp_store("roundtrip");
        let bundle = bundle("20250601-120000");
        let path = store.save_bundle(&bundle).unwrap();

        let loaded = load_bundle(&path).unwrap();
        assert_eq!(loaded.query_date, "20250601-120000");
        assert_eq!(loaded.query_params.keywords, "Data Engineer");
        assert_eq!(loaded.jobs.len(), 2);
        assert_eq!(loaded.jobs[0].posting.company, "A");
        assert_eq!(loaded.jobs[0].score(), 8.5);
        assert_eq!(loaded.jobs[1].posting.company, "B");
        assert_eq!(loaded.areas_of_improvement, "- learn Kafka");

        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn test_distinct_stamps_produce_distinct_files() {
        let store = temp_store("distinct");
        let first = store.save_bundle(&bundle("20250601-120000")).unwrap();
        let second = store.save_bundle(&bundle("20250601-120001")).unwrap();
        assert_ne!(first, second);
        assert!(first.exists());
        assert!(second.exists());

        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn test_overflow_cache_skipped_when_empty() {
        let store = temp_store("overflow-empty");
        let path = store.save_overflow("20250601-120000", &[]).unwrap();
        assert!(path.is_none());

        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn test_overflow_cache_written_and_readable() {
        let store = temp_store("overflow");
        let remainder = vec![scored("C", 2.0)];
        let path = store
            .save_overflow("20250601-120000", &remainder)
            .unwrap()
            .unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let cached = json["job_cache"].as_array().unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0]["company"], "C");
        assert_eq!(cached[0]["score"], 2.0);

        let _ = fs::remove_dir_all(store.dir());
    }

    #[test]
    fn test_load_bundle_missing_file() {
        let result = load_bundle(Path::new("/nonexistent/jobs_nope.json"));
        assert!(result.is_err());
    }

    #[test]
    fn test_timestamp_shape() {
        let stamp = timestamp();
        // %Y%m%d-%H%M%S
        assert_eq!(stamp.len(), 15);
        assert_eq!(stamp.chars().nth(8), Some('-'));
    }
}
