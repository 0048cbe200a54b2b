use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use std::env;
use std::time::Duration;

use crate::models::{JobPosting, SearchRequest};

/// Placeholder for fields the scraper did not return.
pub const NOT_SPECIFIED: &str = "Not Specified";

/// Fetching a scrape run can take a while; the actor only returns once the
/// dataset is complete.
const FETCH_TIMEOUT: Duration = Duration::from_secs(300);

/// Swappable network client for a job board. The workflow only ever sees
/// mapped [`JobPosting`] records.
pub trait JobSource {
    fn fetch(&self, request: &SearchRequest) -> Result<Vec<JobPosting>>;
}

// --- Apify LinkedIn jobs scraper ---

const APIFY_BASE_URL: &str = "https://api.apify.com/v2";
const APIFY_ACTOR: &str = "apimaestro~linkedin-jobs-scraper-api";

pub struct ApifyScraper {
    api_key: String,
    client: reqwest::blocking::Client,
}

impl ApifyScraper {
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("APIFY_API_KEY")
            .context("APIFY_API_KEY environment variable not set. Set it with: export APIFY_API_KEY=your-key-here")?;
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { api_key, client })
    }

    fn run_input(request: &SearchRequest) -> Value {
        let mut input = json!({
            // only show results from last week
            "date_posted": "week",
            "keywords": request.keywords,
            "limit": request.limit,
            "location": request.city,
        });
        if request.hybrid {
            input["remote"] = json!("hybrid");
        }
        input
    }
}

impl JobSource for ApifyScraper {
    fn fetch(&self, request: &SearchRequest) -> Result<Vec<JobPosting>> {
        request.validate()?;

        tracing::info!(
            "Fetching up to {} '{}' postings in {}",
            request.limit,
            request.keywords,
            request.city
        );

        let url = format!("{APIFY_BASE_URL}/acts/{APIFY_ACTOR}/run-sync-get-dataset-items");
        let response = self
            .client
            .post(&url)
            .query(&[("token", self.api_key.as_str())])
            .json(&Self::run_input(request))
            .send()
            .context("Failed to send request to the Apify scraper")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "Apify scraper request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let items: Vec<Value> = response
            .json()
            .context("Failed to parse Apify dataset response")?;

        Ok(map_items(&items))
    }
}

/// Map raw scraper records into postings. Missing fields get the
/// "Not Specified" placeholder; a record that is not even an object is
/// logged and dropped rather than failing the batch.
pub fn map_items(items: &[Value]) -> Vec<JobPosting> {
    let mut jobs = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match map_item(item) {
            Some(job) => jobs.push(job),
            None => tracing::warn!("Unable to unpack returned item {i}, dropping it"),
        }
    }
    jobs
}

fn map_item(item: &Value) -> Option<JobPosting> {
    let obj = item.as_object()?;

    let text = |key: &str| -> String {
        obj.get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| NOT_SPECIFIED.to_string())
    };

    Some(JobPosting {
        company: text("company"),
        company_url: text("company_url"),
        description: text("description"),
        is_verified: obj.get("is_verified").and_then(Value::as_bool).unwrap_or(false),
        job_title: text("job_title"),
        job_url: text("job_url"),
        location: text("location"),
        work_type: text("work_type"),
        posted_at: text("posted_at"),
    })
}
