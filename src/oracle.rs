use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

use crate::config::{Backend, Config};
use crate::models::{JobScore, PromptCheck, SearchRequest};

/// Per-call HTTP timeout. The reference behavior had none; an unbounded
/// hang on one posting would stall the whole run.
const ORACLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Gate rejects anything below this confidence, strictly.
pub const CONFIDENCE_THRESHOLD: f64 = 0.7;

// --- Oracle trait ---

/// The four LLM call shapes the workflow needs. Everything behind this
/// trait is an opaque network round trip; backend choice is wiring, not
/// pipeline logic.
pub trait Oracle {
    /// Validity check: does this free text describe a job search?
    fn check_prompt(&self, prompt: &str) -> Result<PromptCheck>;

    /// Extract structured search parameters from free text. Implementations
    /// may return a populated `resume` field if the model misbehaves; the
    /// gate strips it.
    fn extract_request(&self, prompt: &str) -> Result<SearchRequest>;

    /// Score a resume against one job description, 0-10.
    fn score_resume(&self, resume: &str, job_description: &str) -> Result<JobScore>;

    /// Condense scoring explanations into a bullet list of missing skills.
    fn summarize_gaps(&self, explanations: &[String]) -> Result<String>;
}

pub fn create_oracle(config: &Config) -> Result<Box<dyn Oracle>> {
    match config.backend {
        Backend::OpenAi => {
            let oracle = OpenAiOracle::new(config.openai_api_key()?.to_string())?;
            Ok(Box::new(oracle))
        }
        Backend::Ollama => {
            let oracle = OllamaOracle::new(config.ollama_host.clone())?;
            Ok(Box::new(oracle))
        }
    }
}

// --- Prompt-validity gate ---

/// Front door for free-text input: reject low-confidence prompts outright,
/// then extract the structured request. The resume is always supplied
/// out-of-band, so anything the extractor put there is a defect and gets
/// stripped.
pub fn check_and_extract(oracle: &dyn Oracle, prompt: &str) -> Result<SearchRequest> {
    tracing::info!("Checking prompt validity");
    let check = oracle.check_prompt(prompt)?;
    if !check.is_valid || check.confidence < CONFIDENCE_THRESHOLD {
        bail!(
            "Prompt rejected by the validity gate (confidence {:.2}): {}",
            check.confidence,
            check.rationale
        );
    }

    tracing::info!("Gate passed, extracting search parameters");
    let mut request = oracle.extract_request(prompt)?;
    if request.resume.take().is_some() {
        tracing::warn!("Extractor tried to populate the resume field; stripped");
    }
    request.validate()?;
    Ok(request)
}

// --- Prompts shared by both backends ---

const CHECK_SYSTEM_PROMPT: &str = "You are a helpful assistant designed to validate job search \
    prompts for relevance and data quality. Analyze the prompt to determine if it contains \
    keywords indicative of a job search query, a city, and optionally a result limit and hybrid \
    status. Respond with a boolean indicating the presence of these elements, a confidence score \
    between 0 and 1, and a concise rationale supporting the confidence score.";

const EXTRACT_SYSTEM_PROMPT: &str = "You are a helpful assistant designed to extract job search \
    information from the prompt. Extract: the job title keywords, the city (only the city, not \
    the state), optionally a limit on results, and optionally a hybrid status. You are FORBIDDEN \
    from filling in the resume field.";

const SCORE_SYSTEM_PROMPT: &str = "You are an expert resume evaluator. Your task is to score a \
    resume's suitability for a given job description on a scale of 0 to 10. A score of 10 \
    indicates a perfect fit, and 0 indicates no fit. Be harsh but fair. Consider all aspects: \
    skills, experience, qualifications, and alignment with the role's responsibilities. Provide \
    the numerical score as a float and a short explanation (<100 words).";

const GAP_SYSTEM_PROMPT: &str = "You are an expert at identifying and articulating missing \
    skills and experiences. Analyze a list of rationales, each describing aspects of a \
    candidate's profile in relation to a job. From these rationales, extract only the specific \
    skills or experiences that are identified as missing or could be improved upon for a higher \
    suitability score. Respond with a concise list of bullet points, each clearly stating a \
    missing skill or experience. Do not include any introductory or concluding remarks.";

fn score_user_prompt(resume: &str, job_description: &str) -> String {
    format!(
        "Resume:\n---\n{resume}\n---\n\n\
         Job Description:\n---\n{job_description}\n---\n\n\
         Score this resume against the job description (0-10):"
    )
}

fn gap_user_prompt(explanations: &[String]) -> String {
    let numbered: Vec<String> = explanations
        .iter()
        .enumerate()
        .map(|(i, x)| format!("Rationale {i}: {x}"))
        .collect();
    format!(
        "Analyze the following rationales to identify missing skills or experiences:\n{}\n--\n\n\
         List the identified gaps:",
        numbered.join("\n--\n")
    )
}

// --- JSON schemas for structured responses ---

fn prompt_check_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "is_valid": { "type": "boolean" },
            "confidence": { "type": "number" },
            "rationale": { "type": "string" }
        },
        "required": ["is_valid", "confidence", "rationale"],
        "additionalProperties": false
    })
}

fn search_request_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "keywords": { "type": "string" },
            "city": { "type": "string" },
            "limit": { "type": ["integer", "null"] },
            "hybrid": { "type": ["boolean", "null"] },
            "resume": { "type": ["string", "null"] }
        },
        "required": ["keywords", "city", "limit", "hybrid", "resume"],
        "additionalProperties": false
    })
}

fn job_score_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "score": { "type": "number" },
            "explanation": { "type": "string" }
        },
        "required": ["score", "explanation"],
        "additionalProperties": false
    })
}

/// Extraction wire form: every field the model may omit or null out is an
/// Option here, with defaults applied on conversion.
#[derive(Debug, Deserialize)]
struct ExtractedRequest {
    keywords: String,
    city: String,
    limit: Option<u32>,
    hybrid: Option<bool>,
    resume: Option<String>,
}

impl From<ExtractedRequest> for SearchRequest {
    fn from(wire: ExtractedRequest) -> Self {
        SearchRequest {
            keywords: wire.keywords,
            city: wire.city,
            limit: wire.limit.unwrap_or(20),
            hybrid: wire.hybrid.unwrap_or(false),
            resume: wire.resume,
        }
    }
}

// --- OpenAI backend (hosted) ---

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENAI_MODEL: &str = "gpt-4.1-mini-2025-04-14";

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug)]
pub struct OpenAiOracle {
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl OpenAiOracle {
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(ORACLE_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            api_key,
            model: OPENAI_MODEL.to_string(),
            client,
        })
    }

    fn chat(
        &self,
        system: &str,
        user: &str,
        temperature: f64,
        schema: Option<(&str, Value)>,
    ) -> Result<String> {
        let mut body = json!({
            "model": self.model,
            "temperature": temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ]
        });
        if let Some((name, schema)) = schema {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": { "name": name, "schema": schema, "strict": true }
            });
        }

        let response = self
            .client
            .post(OPENAI_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .context("Failed to send request to OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "OpenAI API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: OpenAiResponse = response
            .json()
            .context("Failed to parse OpenAI API response")?;

        api_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("No choices in OpenAI API response"))
    }
}

impl Oracle for OpenAiOracle {
    fn check_prompt(&self, prompt: &str) -> Result<PromptCheck> {
        let content = self.chat(
            CHECK_SYSTEM_PROMPT,
            prompt,
            1.0,
            Some(("prompt_check", prompt_check_schema())),
        )?;
        serde_json::from_str(&content).context("Malformed prompt-check response")
    }

    fn extract_request(&self, prompt: &str) -> Result<SearchRequest> {
        let content = self.chat(
            EXTRACT_SYSTEM_PROMPT,
            prompt,
            0.0,
            Some(("search_request", search_request_schema())),
        )?;
        let wire: ExtractedRequest =
            serde_json::from_str(&content).context("Malformed extraction response")?;
        Ok(wire.into())
    }

    fn score_resume(&self, resume: &str, job_description: &str) -> Result<JobScore> {
        let content = self.chat(
            SCORE_SYSTEM_PROMPT,
            &score_user_prompt(resume, job_description),
            0.0,
            Some(("job_score", job_score_schema())),
        )?;
        serde_json::from_str(&content).context("Malformed scoring response")
    }

    fn summarize_gaps(&self, explanations: &[String]) -> Result<String> {
        self.chat(GAP_SYSTEM_PROMPT, &gap_user_prompt(explanations), 0.0, None)
    }
}

// --- Ollama backend (local) ---

const OLLAMA_MODEL: &str = "gemma3:1b";

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

#[derive(Debug)]
pub struct OllamaOracle {
    host: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl OllamaOracle {
    pub fn new(host: String) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(ORACLE_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            model: OLLAMA_MODEL.to_string(),
            client,
        })
    }

    fn chat(&self, system: &str, user: &str, format: Option<Value>) -> Result<String> {
        let mut body = json!({
            "model": self.model,
            "stream": false,
            "options": { "temperature": 0.0 },
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ]
        });
        if let Some(format) = format {
            body["format"] = format;
        }

        let url = format!("{}/api/chat", self.host);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .with_context(|| format!("Failed to reach Ollama at {}", self.host))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "Ollama request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: OllamaResponse =
            response.json().context("Failed to parse Ollama response")?;
        Ok(api_response.message.content)
    }
}

impl Oracle for OllamaOracle {
    fn check_prompt(&self, prompt: &str) -> Result<PromptCheck> {
        let content = self.chat(CHECK_SYSTEM_PROMPT, prompt, Some(prompt_check_schema()))?;
        serde_json::from_str(&content).context("Malformed prompt-check response")
    }

    fn extract_request(&self, prompt: &str) -> Result<SearchRequest> {
        let content = self.chat(EXTRACT_SYSTEM_PROMPT, prompt, Some(search_request_schema()))?;
        let wire: ExtractedRequest =
            serde_json::from_str(&content).context("Malformed extraction response")?;
        Ok(wire.into())
    }

    fn score_resume(&self, resume: &str, job_description: &str) -> Result<JobScore> {
        let content = self.chat(
            SCORE_SYSTEM_PROMPT,
            &score_user_prompt(resume, job_description),
            Some(job_score_schema()),
        )?;
        serde_json::from_str(&content).context("Malformed scoring response")
    }

    fn summarize_gaps(&self, explanations: &[String]) -> Result<String> {
        self.chat(GAP_SYSTEM_PROMPT, &gap_user_prompt(explanations), None)
    }
}
