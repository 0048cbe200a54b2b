use std::cmp::Ordering;

use crate::models::{JobPosting, ScoreOutcome, ScoredPosting};
use crate::oracle::Oracle;

/// Score every posting against the resume, one oracle call each. A failure
/// on one posting is recorded as a [`ScoreOutcome::Failed`] and never aborts
/// the batch. Output length and order always match the input; postings are
/// independent, so nothing here shares state across iterations.
pub fn score_postings(
    oracle: &dyn Oracle,
    resume: &str,
    postings: Vec<JobPosting>,
) -> Vec<ScoredPosting> {
    let total = postings.len();
    postings
        .into_iter()
        .enumerate()
        .map(|(i, posting)| {
            let outcome = match oracle.score_resume(resume, &posting.description) {
                Ok(result) => {
                    tracing::info!(
                        "Scored posting {}/{} ({}): {:.1}",
                        i + 1,
                        total,
                        posting.company,
                        result.score
                    );
                    ScoreOutcome::Scored {
                        score: result.score,
                        explanation: result.explanation,
                    }
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to score posting {}/{} ({}): {:#}",
                        i + 1,
                        total,
                        posting.company,
                        e
                    );
                    ScoreOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            ScoredPosting { posting, outcome }
        })
        .collect()
}

/// Scored postings split around the top-N cut. `top` and `remainder`
/// together hold the full ranked sequence, descending by score.
#[derive(Debug)]
pub struct Ranked {
    pub top: Vec<ScoredPosting>,
    pub remainder: Vec<ScoredPosting>,
}

impl Ranked {
    /// The full ranked sequence, best first.
    pub fn all(&self) -> Vec<ScoredPosting> {
        self.top.iter().chain(self.remainder.iter()).cloned().collect()
    }
}

/// Sort descending by projected score and split off the top N. The sort is
/// stable, so equal scores keep their original fetch order. Failed outcomes
/// project to -1 and sink to the bottom.
pub fn rank(mut scored: Vec<ScoredPosting>, top_n: usize) -> Ranked {
    scored.sort_by(|a, b| {
        b.score()
            .partial_cmp(&a.score())
            .unwrap_or(Ordering::Equal)
    });
    let remainder = scored.split_off(top_n.min(scored.len()));
    Ranked {
        top: scored,
        remainder,
    }
}

/// Which explanations feed the gap summary. The reference behavior was
/// ambiguous between these two readings, so the policy is explicit and
/// selectable instead of hard-baked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GapPolicy {
    /// Every successfully scored posting outside the top N.
    BelowTopN,
    /// Near misses: outside the top N but scoring above this floor.
    AboveFloor(f64),
}

/// Explanations eligible for gap analysis under the policy. Failed
/// outcomes carry no real explanation and are always excluded.
pub fn gap_candidates(ranked: &Ranked, policy: GapPolicy) -> Vec<String> {
    ranked
        .remainder
        .iter()
        .filter(|sp| !sp.outcome.is_failed())
        .filter(|sp| match policy {
            GapPolicy::BelowTopN => true,
            GapPolicy::AboveFloor(floor) => sp.score() > floor,
        })
        .map(|sp| sp.explanation().to_string())
        .collect()
}

/// Best-effort second oracle pass: condense the near-miss explanations into
/// a prose list of missing skills. Never aborts the run; a failed call
/// yields a clearly marked failure string instead.
pub fn summarize_gaps(oracle: &dyn Oracle, ranked: &Ranked, policy: GapPolicy) -> String {
    let explanations = gap_candidates(ranked, policy);
    if explanations.is_empty() {
        tracing::info!("No postings eligible for gap analysis");
        return "No postings outside the top matches to analyze.".to_string();
    }

    tracing::info!("Summarizing gaps from {} explanations", explanations.len());
    match oracle.summarize_gaps(&explanations) {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("Failed to identify resume gaps: {:#}", e);
            format!("Unable to analyze gaps: {e}")
        }
    }
}
