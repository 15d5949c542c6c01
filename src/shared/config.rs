use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_SAMPLE_FILE: &str = "dummy_excel_assessment_data.xlsx";

/// Process-wide settings, built once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub api_base: Url,
    pub model: String,
    pub request_timeout: Duration,
    pub report_dir: PathBuf,
    pub sample_file: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let api_key = env_fallback("OPENAI_SERVICE_ACCOUNT_KEY", "OPENAI_API_KEY").context(
            "OPENAI_SERVICE_ACCOUNT_KEY is required (OPENAI_API_KEY is accepted as a fallback)",
        )?;

        let api_base_raw = env::var("EXCEL_INTERVIEWER_API_BASE")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let api_base = parse_api_base(&api_base_raw)?;

        let model = env::var("EXCEL_INTERVIEWER_MODEL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let timeout_secs: u64 = env::var("EXCEL_INTERVIEWER_TIMEOUT_SECS")
            .ok()
            .and_then(|val| val.parse().ok())
            .unwrap_or(120);

        let report_dir = env::var("EXCEL_INTERVIEWER_REPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));
        let sample_file = env::var("EXCEL_INTERVIEWER_SAMPLE_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SAMPLE_FILE));

        Ok(Self {
            api_key,
            api_base,
            model,
            request_timeout: Duration::from_secs(timeout_secs.max(5)),
            report_dir,
            sample_file,
        })
    }

    /// Credential with everything but the edges hidden, for startup logs.
    pub fn masked_api_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.len() > 12 {
            let head: String = chars[..6].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{}...{}", head, tail)
        } else {
            "<too-short>".to_string()
        }
    }
}

fn parse_api_base(raw: &str) -> Result<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).with_context(|| format!("invalid API base URL '{}'", raw))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        bail!("API base URL must use http or https, got '{}'", url.scheme());
    }
    Ok(url)
}

fn env_fallback(primary: &str, secondary: &str) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| env::var(secondary).ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
impl Config {
    pub fn for_tests(api_base: &str) -> Self {
        Self {
            api_key: "sk-test-0123456789abcdef".to_string(),
            api_base: parse_api_base(api_base).expect("valid test base url"),
            model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(5),
            report_dir: PathBuf::from("."),
            sample_file: PathBuf::from(DEFAULT_SAMPLE_FILE),
        }
    }
}
