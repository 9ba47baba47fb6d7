//! Resume tailoring: rewrites a stored resume for one job description, reports the
//! skills gap, and drafts a cover letter. Also scores a resume against a job description
//! and produces general improvement suggestions.
//!
//! `AppState` carries an `Arc<dyn Tailor>`. `LlmTailor` is the production implementation;
//! tests swap in a canned one.

pub mod analysis;
pub mod handlers;
pub mod prompts;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::llm_client::LlmClient;
use prompts::{build_analyze_prompt, build_suggestions_prompt, build_tailor_prompt};

const TAILOR_SYSTEM: &str = "You are an expert resume writer and career coach. \
    You tailor resumes truthfully to a target role. \
    You MUST respond with valid JSON only. \
    Do NOT use markdown code fences.";

pub const MAX_JOB_DESCRIPTION_CHARS: usize = 20_000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillsGap {
    #[serde(default)]
    pub matched: Vec<String>,
    #[serde(default)]
    pub missing: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TailoredResume {
    pub rewritten_resume: String,
    #[serde(default)]
    pub skills_gap: SkillsGap,
    pub cover_letter: String,
}

/// The model's side of a match analysis. Scores are computed locally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchInsights {
    #[serde(default)]
    pub matched_skills: Vec<String>,
    #[serde(default)]
    pub missing_skills: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SuggestionList {
    #[serde(default)]
    suggestions: Vec<String>,
}

#[async_trait]
pub trait Tailor: Send + Sync {
    async fn tailor(
        &self,
        resume_text: &str,
        job_description: &str,
    ) -> Result<TailoredResume, AppError>;

    async fn analyze(
        &self,
        resume_text: &str,
        job_description: &str,
    ) -> Result<MatchInsights, AppError>;

    async fn suggest(&self, resume_text: &str) -> Result<Vec<String>, AppError>;
}

pub struct LlmTailor {
    llm: LlmClient,
}

impl LlmTailor {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Tailor for LlmTailor {
    async fn tailor(
        &self,
        resume_text: &str,
        job_description: &str,
    ) -> Result<TailoredResume, AppError> {
        let prompt = build_tailor_prompt(resume_text, job_description);
        let raw: TailoredResume = self
            .llm
            .call_json(&prompt, TAILOR_SYSTEM)
            .await
            .map_err(|e| AppError::Llm(format!("Tailoring LLM call failed: {e}")))?;

        let tailored = clean_output(raw)?;
        info!(
            matched = tailored.skills_gap.matched.len(),
            missing = tailored.skills_gap.missing.len(),
            "Resume tailored"
        );
        Ok(tailored)
    }

    async fn analyze(
        &self,
        resume_text: &str,
        job_description: &str,
    ) -> Result<MatchInsights, AppError> {
        let prompt = build_analyze_prompt(resume_text, job_description);
        let raw: MatchInsights = self
            .llm
            .call_json(&prompt, TAILOR_SYSTEM)
            .await
            .map_err(|e| AppError::Llm(format!("Match analysis LLM call failed: {e}")))?;
        Ok(clean_insights(raw))
    }

    async fn suggest(&self, resume_text: &str) -> Result<Vec<String>, AppError> {
        let prompt = build_suggestions_prompt(resume_text);
        let raw: SuggestionList = self
            .llm
            .call_json(&prompt, TAILOR_SYSTEM)
            .await
            .map_err(|e| AppError::Llm(format!("Suggestions LLM call failed: {e}")))?;
        Ok(dedup_case_insensitive(raw.suggestions))
    }
}

/// Rejects an empty job description and trims it.
pub fn check_job_description(raw: &str) -> Result<&str, AppError> {
    let jd = raw.trim();
    if jd.is_empty() {
        return Err(AppError::Validation(
            "job_description must not be empty".to_string(),
        ));
    }
    if jd.chars().count() > MAX_JOB_DESCRIPTION_CHARS {
        return Err(AppError::Validation(format!(
            "job_description exceeds {MAX_JOB_DESCRIPTION_CHARS} characters"
        )));
    }
    Ok(jd)
}

/// Trims and de-duplicates the model's lists, and drops from `missing` anything it also
/// reported as matched.
fn clean_output(mut out: TailoredResume) -> Result<TailoredResume, AppError> {
    out.rewritten_resume = out.rewritten_resume.trim().to_string();
    out.cover_letter = out.cover_letter.trim().to_string();
    if out.rewritten_resume.is_empty() {
        return Err(AppError::Llm("LLM returned an empty rewritten resume".to_string()));
    }

    let gap = &mut out.skills_gap;
    gap.matched = dedup_case_insensitive(std::mem::take(&mut gap.matched));
    let matched: HashSet<String> = gap.matched.iter().map(|s| s.to_lowercase()).collect();
    gap.missing = dedup_case_insensitive(std::mem::take(&mut gap.missing))
        .into_iter()
        .filter(|s| !matched.contains(&s.to_lowercase()))
        .collect();
    gap.recommendations = dedup_case_insensitive(std::mem::take(&mut gap.recommendations));
    Ok(out)
}

fn clean_insights(mut out: MatchInsights) -> MatchInsights {
    out.matched_skills = dedup_case_insensitive(std::mem::take(&mut out.matched_skills));
    let matched: HashSet<String> = out.matched_skills.iter().map(|s| s.to_lowercase()).collect();
    out.missing_skills = dedup_case_insensitive(std::mem::take(&mut out.missing_skills))
        .into_iter()
        .filter(|s| !matched.contains(&s.to_lowercase()))
        .collect();
    out.suggestions = dedup_case_insensitive(std::mem::take(&mut out.suggestions));
    out
}

fn dedup_case_insensitive(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
        .collect()
}
