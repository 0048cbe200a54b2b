use serde::{Deserialize, Serialize};

/// Reserved score meaning "scoring failed for this item", distinct from a
/// genuine low score of 0. Valid scores range 0-10.
pub const FAILED_SCORE: f64 = -1.0;
pub const FAILED_EXPLANATION: &str = "Comparison failed";

/// Parameters for a job board query, built from explicit CLI flags or
/// extracted from a free-text prompt by the oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub keywords: String,
    pub city: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub hybrid: bool,
    /// Resume text is supplied out-of-band (a local file). The prompt
    /// extractor is forbidden from filling this in; the gate strips it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume: Option<String>,
}

fn default_limit() -> u32 {
    20
}

impl SearchRequest {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.keywords.trim().is_empty() {
            anyhow::bail!("Search keywords must not be empty");
        }
        if self.city.trim().is_empty() {
            anyhow::bail!("Search city must not be empty");
        }
        if self.limit == 0 {
            anyhow::bail!("Result limit must be greater than zero");
        }
        Ok(())
    }

    /// Copy suitable for persisting as query metadata.
    pub fn without_resume(&self) -> SearchRequest {
        SearchRequest {
            resume: None,
            ..self.clone()
        }
    }
}

/// A single job advertisement as fetched from the job source. Immutable
/// once mapped; scores live in [`ScoredPosting`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub company: String,
    pub company_url: String,
    pub description: String,
    pub is_verified: bool,
    pub job_title: String,
    pub job_url: String,
    pub location: String,
    #[serde(default = "default_work_type")]
    pub work_type: String,
    pub posted_at: String,
}

fn default_work_type() -> String {
    "Remote".to_string()
}

/// Result of one scoring attempt. A failed oracle call is carried as its
/// own variant so ranking and display can treat it as "lowest priority,
/// investigate separately" instead of conflating it with a real low score.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    Scored { score: f64, explanation: String },
    Failed { reason: String },
}

impl ScoreOutcome {
    /// Projects the outcome onto the flat score scale used for ranking and
    /// the persisted schema. Failures map to the reserved -1 sentinel.
    pub fn score(&self) -> f64 {
        match self {
            ScoreOutcome::Scored { score, .. } => *score,
            ScoreOutcome::Failed { .. } => FAILED_SCORE,
        }
    }

    pub fn explanation(&self) -> &str {
        match self {
            ScoreOutcome::Scored { explanation, .. } => explanation,
            ScoreOutcome::Failed { .. } => FAILED_EXPLANATION,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ScoreOutcome::Failed { .. })
    }
}

/// A posting with its scoring outcome attached. Written exactly once by the
/// scoring pipeline, read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPosting {
    pub posting: JobPosting,
    pub outcome: ScoreOutcome,
}

impl ScoredPosting {
    pub fn score(&self) -> f64 {
        self.outcome.score()
    }

    pub fn explanation(&self) -> &str {
        self.outcome.explanation()
    }
}

/// Flat persisted form of a scored posting. Field names are stable across
/// runs so cached bundles can be reprocessed later.
#[derive(Serialize, Deserialize)]
struct ScoredPostingRecord {
    #[serde(flatten)]
    posting: JobPosting,
    #[serde(default)]
    score: f64,
    #[serde(default = "default_explanation")]
    explanation: String,
}

fn default_explanation() -> String {
    "None".to_string()
}

impl Serialize for ScoredPosting {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        ScoredPostingRecord {
            posting: self.posting.clone(),
            score: self.score(),
            explanation: self.explanation().to_string(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ScoredPosting {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let record = ScoredPostingRecord::deserialize(deserializer)?;
        let outcome = if record.score == FAILED_SCORE {
            ScoreOutcome::Failed {
                reason: record.explanation,
            }
        } else {
            ScoreOutcome::Scored {
                score: record.score,
                explanation: record.explanation,
            }
        };
        Ok(ScoredPosting {
            posting: record.posting,
            outcome,
        })
    }
}

/// Verdict of the prompt-validity gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptCheck {
    pub is_valid: bool,
    pub confidence: f64,
    pub rationale: String,
}

/// Oracle response when scoring a resume against one job description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobScore {
    pub score: f64,
    pub explanation: String,
}

/// Everything one run produces, persisted as a single timestamped JSON file.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResultBundle {
    pub query_date: String,
    pub query_params: SearchRequest,
    pub jobs: Vec<ScoredPosting>,
    pub areas_of_improvement: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting() -> JobPosting {
        JobPosting {
            company: "Acme".to_string(),
            company_url: "https://example.com/acme".to_string(),
            description: "Build things".to_string(),
            is_verified: true,
            job_title: "Engineer".to_string(),
            job_url: "https://example.com/job/1".to_string(),
            location: "Austin".to_string(),
            work_type: "Hybrid".to_string(),
            posted_at: "2025-06-01".to_string(),
        }
    }

    #[test]
    fn test_search_request_validation() {
        let req = SearchRequest {
            keywords: "Data Engineer".to_string(),
            city: "Austin".to_string(),
            limit: 10,
            hybrid: false,
            resume: None,
        };
        assert!(req.validate().is_ok());

        let mut empty_keywords = req.clone();
        empty_keywords.keywords = "  ".to_string();
        assert!(empty_keywords.validate().is_err());

        let mut empty_city = req.clone();
        empty_city.city = String::new();
        assert!(empty_city.validate().is_err());

        let mut zero_limit = req;
        zero_limit.limit = 0;
        assert!(zero_limit.validate().is_err());
    }

    #[test]
    fn test_search_request_defaults() {
        let req: SearchRequest =
            serde_json::from_str(r#"{"keywords": "SRE", "city": "Denver"}"#).unwrap();
        assert_eq!(req.limit, 20);
        assert!(!req.hybrid);
        assert!(req.resume.is_none());
    }

    #[test]
    fn test_without_resume_never_serializes_resume() {
        let req = SearchRequest {
            keywords: "SRE".to_string(),
            city: "Denver".to_string(),
            limit: 5,
            hybrid: true,
            resume: Some("secret resume text".to_string()),
        };
        let json = serde_json::to_string(&req.without_resume()).unwrap();
        assert!(!json.contains("resume"));
    }

    #[test]
    fn test_work_type_defaults_to_remote() {
        let job: JobPosting = serde_json::from_value(serde_json::json!({
            "company": "Acme",
            "company_url": "u",
            "description": "d",
            "is_verified": false,
            "job_title": "t",
            "job_url": "u",
            "location": "l",
            "posted_at": "p"
        }))
        .unwrap();
        assert_eq!(job.work_type, "Remote");
    }

    #[test]
    fn test_failed_outcome_projects_sentinel() {
        let outcome = ScoreOutcome::Failed {
            reason: "timeout".to_string(),
        };
        assert_eq!(outcome.score(), FAILED_SCORE);
        assert_eq!(outcome.explanation(), FAILED_EXPLANATION);
        assert!(outcome.is_failed());
    }

    #[test]
    fn test_scored_posting_round_trip() {
        let scored = ScoredPosting {
            posting: posting(),
            outcome: ScoreOutcome::Scored {
                score: 8.5,
                explanation: "Strong match".to_string(),
            },
        };
        let json = serde_json::to_string(&scored).unwrap();
        let back: ScoredPosting = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scored);
    }

    #[test]
    fn test_failed_posting_round_trip_keeps_sentinel() {
        let scored = ScoredPosting {
            posting: posting(),
            outcome: ScoreOutcome::Failed {
                reason: "oracle unreachable".to_string(),
            },
        };
        let json = serde_json::to_string(&scored).unwrap();
        // The wire form carries the sentinel and the fixed text, not the
        // original failure reason.
        assert!(json.contains("-1"));
        assert!(json.contains(FAILED_EXPLANATION));

        let back: ScoredPosting = serde_json::from_str(&json).unwrap();
        assert!(back.outcome.is_failed());
        assert_eq!(back.score(), FAILED_SCORE);
    }
}
