// Prompt builders for resume tailoring, match analysis and suggestions.
// Inputs are spliced in a single format! pass, so user text is never re-scanned for placeholders.

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;

pub fn build_tailor_prompt(resume_text: &str, job_description: &str) -> String {
    format!(
        r#"{json_only}

You are tailoring a candidate's resume to one job description.

Return a JSON object with this EXACT schema (no extra fields):
{{
  "rewritten_resume": "the full resume as plain text, reordered and reworded for this role",
  "skills_gap": {{
    "matched": ["skills the job asks for that the resume already shows"],
    "missing": ["skills the job asks for that the resume does not show"],
    "recommendations": ["short, concrete actions to close the gap"]
  }},
  "cover_letter": "a cover letter of three to five short paragraphs"
}}

Rules:
- Only use facts present in the resume. Do NOT invent employers, titles, dates, or metrics.
- Put the experience most relevant to the job first and mirror the job's terminology where the resume supports it.
- A skill appears in at most one of "matched" and "missing".
- The cover letter must not claim any skill listed in "missing".

RESUME:
{resume_text}

JOB DESCRIPTION:
{job_description}"#,
        json_only = JSON_ONLY_SYSTEM,
        resume_text = resume_text,
        job_description = job_description,
    )
}

pub fn build_analyze_prompt(resume_text: &str, job_description: &str) -> String {
    format!(
        r#"{json_only}

Compare the candidate's resume with one job description.

Return a JSON object with this EXACT schema (no extra fields):
{{
  "matched_skills": ["skills the job asks for that the resume shows"],
  "missing_skills": ["skills the job asks for that the resume does not show"],
  "suggestions": ["five specific, actionable edits that would improve this resume for this job"]
}}

Rules:
- Judge only from the resume text. Do NOT assume unstated experience.
- A skill appears in at most one of "matched_skills" and "missing_skills".

RESUME:
{resume_text}

JOB DESCRIPTION:
{job_description}"#,
        json_only = JSON_ONLY_SYSTEM,
        resume_text = resume_text,
        job_description = job_description,
    )
}

pub fn build_suggestions_prompt(resume_text: &str) -> String {
    format!(
        r#"{json_only}

Review the candidate's resume for a general professional audience.

Return a JSON object with this EXACT schema (no extra fields):
{{
  "suggestions": ["five specific, actionable improvements to wording, structure, or evidence of impact"]
}}

RESUME:
{resume_text}"#,
        json_only = JSON_ONLY_SYSTEM,
        resume_text = resume_text,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_fills_every_placeholder() {
        let prompt = build_tailor_prompt("Jane Doe, Rust engineer", "Senior Rust role");
        assert!(prompt.contains("Jane Doe, Rust engineer"));
        assert!(prompt.contains("Senior Rust role"));
        assert!(prompt.contains(r#""rewritten_resume":"#));
        assert!(!prompt.contains("{resume_text}"));
        assert!(!prompt.contains("{json_only}"));
    }

    #[test]
    fn test_placeholder_text_in_resume_stays_literal() {
        let resume = "Templating: wrote {job_description} and {json_only} engines";
        let prompt = build_tailor_prompt(resume, "Senior Rust role");
        assert!(prompt.contains(resume));
        assert_eq!(prompt.matches("Senior Rust role").count(), 1);

        let analyze = build_analyze_prompt(resume, "Senior Rust role");
        assert!(analyze.contains(resume));
        assert_eq!(analyze.matches("Senior Rust role").count(), 1);
    }

    #[test]
    fn test_suggestions_prompt_carries_resume() {
        let prompt = build_suggestions_prompt("Jane Doe");
        assert!(prompt.ends_with("Jane Doe"));
        assert!(prompt.contains(r#""suggestions":"#));
    }
}
