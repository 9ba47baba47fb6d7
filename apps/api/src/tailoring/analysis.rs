//! Deterministic keyword analysis of a resume against a job description.
//! Runs before the LLM call and needs no network.

use std::collections::{BTreeMap, HashMap};

/// How many of the job description's most frequent terms are scored.
const TOP_KEYWORDS: usize = 20;

const STOP_WORDS: &[&str] = &[
    "about", "and", "are", "but", "can", "for", "from", "has", "have", "into", "its", "our",
    "that", "the", "their", "them", "they", "this", "was", "were", "will", "with", "you",
    "your", "who", "what", "when", "where", "which", "while", "all", "any", "not", "more",
    "must", "should", "would", "able", "also", "etc", "within", "across", "such", "other",
];

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordReport {
    /// Share of the top job keywords that appear in the resume, 0..=100.
    pub match_score: u8,
    /// Keyword -> occurrences per hundred resume words, two decimals.
    pub keyword_density: BTreeMap<String, f64>,
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn top_keywords(job_description: &str) -> Vec<String> {
    let mut freq: HashMap<String, usize> = HashMap::new();
    for word in tokenize(job_description) {
        if word.chars().count() > 2 && !STOP_WORDS.contains(&word.as_str()) {
            *freq.entry(word).or_default() += 1;
        }
    }
    let mut ranked: Vec<(String, usize)> = freq.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(TOP_KEYWORDS)
        .map(|(word, _)| word)
        .collect()
}

pub fn keyword_report(resume_text: &str, job_description: &str) -> KeywordReport {
    let keywords = top_keywords(job_description);
    let resume_words = tokenize(resume_text);
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for word in &resume_words {
        *counts.entry(word.as_str()).or_default() += 1;
    }

    let mut keyword_density = BTreeMap::new();
    let mut present = 0usize;
    for keyword in keywords.iter() {
        let count = counts.get(keyword.as_str()).copied().unwrap_or(0);
        if count > 0 {
            present += 1;
        }
        let density = if resume_words.is_empty() {
            0.0
        } else {
            (count as f64 / resume_words.len() as f64 * 10_000.0).round() / 100.0
        };
        keyword_density.insert(keyword.clone(), density);
    }

    let match_score = if keywords.is_empty() {
        0
    } else {
        ((present as f64 / keywords.len() as f64) * 100.0).round() as u8
    };

    KeywordReport {
        match_score,
        keyword_density,
    }
}
