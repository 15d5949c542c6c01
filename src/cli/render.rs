use crate::assessment::evaluation::{EvaluationRecord, MAX_SCORE};
use crate::assessment::tasks::DownloadHelp;

/// Plain-text score breakdown printed after an evaluation tool call.
pub fn evaluation_breakdown(record: &EvaluationRecord) -> String {
    let mut out = String::from("\n=== Evaluation ===\n");
    let score = record.score.unwrap_or(0);
    match record.grade.as_deref() {
        Some(grade) => out.push_str(&format!("Overall score: {}/{} ({})\n", score, MAX_SCORE, grade)),
        None => out.push_str(&format!("Overall score: {}/{}\n", score, MAX_SCORE)),
    }
    for category in record.category_scores() {
        out.push_str(&format!(
            "  {:<18} {:>2}/{}\n",
            format!("{}:", category.label),
            category.score,
            category.max
        ));
    }
    if let Some(feedback) = record.feedback.as_deref().filter(|f| !f.trim().is_empty()) {
        out.push_str(&format!("\nFeedback: {}\n", feedback.trim()));
    }
    let recommendations = record.recommendations();
    if !recommendations.is_empty() {
        out.push_str("\nRecommendations:\n");
        for (index, item) in recommendations.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", index + 1, item));
        }
    }
    out
}

pub fn download_instructions(help: &DownloadHelp) -> String {
    let mut out = String::from("\n=== Download instructions ===\n");
    out.push_str(&format!("File name: {}\n", help.sample_file_name));
    out.push_str(&format!("Location:  {}\n", help.location));
    out.push_str(&format!("Contents:  {}\n\nNext steps:\n", help.contents));
    for (index, step) in help.steps.iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", index + 1, step));
    }
    out
}
