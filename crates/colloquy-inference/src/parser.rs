//! Insight response parser: raw analysis payload → typed candidates.
//!
//! The payload is semi-structured text from an unreliable model. The parser
//! is tolerant per-field — a block missing a subsection yields empty/default
//! values — and fatal only when a non-empty payload produces no blocks at
//! all, which distinguishes "nothing to say" from "unparseable output".

use chrono::Utc;
use tracing::trace;

use colloquy_core::defaults::{
    INSIGHT_BLOCK_DELIMITER, INSIGHT_CONTEXT_LABEL, INSIGHT_TAGS_LABEL,
};
use colloquy_core::{Error, InsightCandidate, Result};

/// Parse a raw analysis payload into insight candidates.
///
/// Blocks are separated by a line containing exactly `---`. An empty input
/// yields an empty list; a non-empty input that yields zero blocks is a
/// `Parse` error, never an empty success.
pub fn parse(raw_text: &str) -> Result<Vec<InsightCandidate>> {
    if raw_text.is_empty() {
        return Ok(Vec::new());
    }

    let blocks = split_blocks(raw_text);
    if blocks.is_empty() {
        return Err(Error::Parse(
            "no insight blocks found in non-empty payload".to_string(),
        ));
    }

    // One timestamp per batch; the index keeps ids unique within it.
    let batch_millis = Utc::now().timestamp_millis();

    Ok(blocks
        .iter()
        .enumerate()
        .map(|(index, block)| parse_block(block, index, batch_millis))
        .collect())
}

/// Split the payload on standalone delimiter lines, dropping blank blocks.
fn split_blocks(raw_text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();

    for line in raw_text.lines() {
        if line.trim() == INSIGHT_BLOCK_DELIMITER {
            if !current.trim().is_empty() {
                blocks.push(current.clone());
            }
            current.clear();
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    if !current.trim().is_empty() {
        blocks.push(current);
    }

    blocks
}

/// Parse one block into a candidate. Never fails: missing subsections fall
/// back to defaults.
fn parse_block(block: &str, index: usize, batch_millis: i64) -> InsightCandidate {
    let mut title: Option<String> = None;
    let mut tags: Vec<String> = Vec::new();
    let mut body_lines: Vec<String> = Vec::new();
    let mut in_context = false;

    for line in block.lines() {
        let trimmed = line.trim();

        if title.is_none() && trimmed.starts_with('#') {
            let text = trimmed.trim_start_matches('#').trim();
            if !text.is_empty() {
                title = Some(text.to_string());
            }
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix(INSIGHT_TAGS_LABEL) {
            in_context = false;
            tags = rest
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix(INSIGHT_CONTEXT_LABEL) {
            in_context = true;
            let rest = rest.trim();
            if !rest.is_empty() {
                body_lines.push(rest.to_string());
            }
            continue;
        }

        if in_context {
            body_lines.push(demote_heading(line));
        }
    }

    let title = title.unwrap_or_else(|| format!("Insight {}", index + 1));
    let content = body_lines.join("\n").trim().to_string();

    trace!(
        index,
        title = %title,
        tag_count = tags.len(),
        "Parsed insight block"
    );

    InsightCandidate {
        id: format!("{}-{}", batch_millis, index),
        title,
        content,
        tags,
    }
}

/// Demote a nested heading one level so block titles stay outermost when
/// rendered downstream.
fn demote_heading(line: &str) -> String {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        format!("#{}", trimmed)
    } else {
        line.to_string()
    }
}
