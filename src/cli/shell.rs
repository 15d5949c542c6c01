use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{info, warn};

use crate::assessment::conversation::{Conversation, ConversationDriver};
use crate::assessment::tasks::download_help;
use crate::assessment::upload::{detect_upload_intent, load_workbook, UploadedFile};
use crate::cli::render;

const BANNER: &str = "=== Excel Interview Agent ===\n\
Welcome! I can help assess your Excel skills.\n\
You can upload Excel files by typing 'upload' or mentioning file upload.\n\
Type 'help' for sample file instructions, 'exit' to quit.\n";

async fn prompt<R, W>(lines: &mut Lines<R>, out: &mut W, text: &str) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    write!(out, "{}", text)?;
    out.flush()?;
    lines.next_line().await.context("Failed to read input")
}

/// Asks for a workbook path until one loads or the user cancels.
/// Returns `None` on `cancel` or end of input.
pub async fn prompt_for_upload<R, W>(lines: &mut Lines<R>, out: &mut W) -> Result<Option<UploadedFile>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    loop {
        let Some(raw) = prompt(
            lines,
            out,
            "\nPlease enter the path to your Excel file (or 'cancel' to go back): ",
        )
        .await?
        else {
            return Ok(None);
        };

        let path = raw.trim().trim_matches(|c| c == '"' || c == '\'');
        if path.eq_ignore_ascii_case("cancel") {
            return Ok(None);
        }

        match load_workbook(Path::new(path)) {
            Ok(file) => {
                writeln!(
                    out,
                    "File '{}' uploaded successfully! ({:.1} KB)",
                    file.filename,
                    file.size_kb()
                )?;
                return Ok(Some(file));
            }
            Err(e) => {
                warn!(path, error = %e, "Upload rejected");
                writeln!(out, "{}", e)?;
            }
        }
    }
}

/// Interactive loop: one conversation per process.
pub async fn run_shell<R, W>(driver: &ConversationDriver, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write + Send,
{
    let mut lines = input.lines();
    let mut conversation = Conversation::new();
    info!(session = %conversation.id(), "Interactive session started");

    writeln!(out, "{}", BANNER)?;

    loop {
        let Some(line) = prompt(&mut lines, out, "Enter your query: ").await? else {
            writeln!(out)?;
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") {
            break;
        }
        if query.eq_ignore_ascii_case("help") {
            write!(out, "{}", render::download_instructions(&download_help()))?;
            continue;
        }

        let mut upload = None;
        if detect_upload_intent(query) {
            info!("Upload intent detected");
            writeln!(out, "\nIt looks like you want to upload an Excel file!")?;
            match prompt_for_upload(&mut lines, out).await? {
                Some(file) => {
                    writeln!(out, "Continuing with your uploaded file: {}", file.filename)?;
                    upload = Some(file);
                }
                None => {
                    writeln!(out, "Upload cancelled. You can try again anytime.")?;
                    continue;
                }
            }
        }

        let result = driver
            .respond_with_progress(&mut conversation, query, upload, |_| {
                if let Err(e) = writeln!(out, "AI: Processing...") {
                    warn!(error = %e, "Failed to write progress line");
                }
            })
            .await;

        match result {
            Ok(outcome) => {
                for evaluation in &outcome.evaluations {
                    write!(out, "{}", render::evaluation_breakdown(evaluation))?;
                }
                match outcome.reply.as_deref() {
                    Some(reply) => writeln!(out, "AI: {}", reply)?,
                    None => writeln!(out, "AI: (No response)")?,
                }
            }
            Err(e) => {
                writeln!(
                    out,
                    "AI: Sorry, I couldn't reach the interview service ({}). Please try again.",
                    e
                )?;
            }
        }
    }

    writeln!(out, "Goodbye! Thanks for taking the Excel assessment.")?;
    info!(
        session = %conversation.id(),
        transcript_len = conversation.transcript().len(),
        "Interactive session ended"
    );
    Ok(())
}
