use crate::models::ScoredPosting;
use crate::store::EvalResult;

const WRAP_WIDTH: usize = 100;

/// Print the top matches followed by the gap summary. The postings arrive
/// already ranked; nothing is re-sorted here.
pub fn report(top: &[ScoredPosting], gap_summary: &str) {
    for job in top {
        println!();
        println!("{}", job.posting.company);
        println!("{}, score: {}", job.posting.job_title, job.score());
        println!("{}", textwrap::fill(job.explanation(), WRAP_WIDTH));
    }
    println!();
    println!("Areas of improvement");
    println!("{}", textwrap::fill(gap_summary, WRAP_WIDTH));
}

/// Print one cached posting's original score next to its re-evaluated
/// scores.
pub fn eval_report(index: usize, result: &EvalResult) {
    println!();
    println!("Result {index}");
    println!(
        "  original: {} - {}",
        result.original_score,
        textwrap::fill(&result.original_explanation, WRAP_WIDTH).trim_end()
    );
    for (score, explanation) in result.new_scores.iter().zip(&result.new_explanations) {
        println!(
            "  rescored: {score} - {}",
            textwrap::fill(explanation, WRAP_WIDTH).trim_end()
        );
    }
}
