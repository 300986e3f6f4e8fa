// Metadata block extraction.
//
// Two grammars:
// - JS:  every line of the block is a `//` comment, delimited by
//        `// ==UserScript==` and `// ==/UserScript==`.
// - CSS: the block lives inside a single `/* ... */` comment, delimited by
//        bare `==UserStyle==` and `==/UserStyle==` lines.
//
// Parsing is line-oriented. Anything outside the delimiters is ignored, and a
// missing block is a normal result (`None`), not an error.

use super::metadata_models::{MetadataBlock, ScriptLanguage};
use std::borrow::Cow;

const SCRIPT_OPEN: &str = "==UserScript==";
const SCRIPT_CLOSE: &str = "==/UserScript==";
const STYLE_OPEN: &str = "==UserStyle==";
const STYLE_CLOSE: &str = "==/UserStyle==";

/// A located metadata block: line indices of both delimiters plus the raw
/// `(key, value)` pairs found between them.
#[derive(Debug)]
struct BlockSpan {
    open_line: usize,
    close_line: usize,
    pairs: Vec<(String, String)>,
}

/// Extract the metadata block from `code`.
///
/// Returns `None` if there is no complete block or it does not declare a
/// non-empty `@name`.
pub fn extract(code: &str, language: ScriptLanguage) -> Option<MetadataBlock> {
    let span = locate(code, language)?;
    MetadataBlock::from_pairs(span.pairs)
}

/// Return `code` with the metadata block lines removed.
///
/// Used for content fingerprints, so a copy that only rewrites its header
/// still compares equal. Code without a block is returned untouched.
pub fn strip_metadata(code: &str, language: ScriptLanguage) -> Cow<'_, str> {
    let Some(span) = locate(code, language) else {
        return Cow::Borrowed(code);
    };

    let body: Vec<&str> = code
        .lines()
        .enumerate()
        .filter(|(idx, _)| *idx < span.open_line || *idx > span.close_line)
        .map(|(_, line)| line)
        .collect();

    Cow::Owned(body.join("\n"))
}

fn locate(code: &str, language: ScriptLanguage) -> Option<BlockSpan> {
    let lines: Vec<&str> = code.lines().collect();
    match language {
        ScriptLanguage::Js => locate_script_block(&lines),
        ScriptLanguage::Css => locate_style_block(&lines),
    }
}

// ============================================================================
// JS GRAMMAR
// ============================================================================

/// Content of a `//` comment line, trimmed. `None` for any other line.
fn line_comment(line: &str) -> Option<&str> {
    line.trim().strip_prefix("//").map(str::trim)
}

fn locate_script_block(lines: &[&str]) -> Option<BlockSpan> {
    let open_line = lines
        .iter()
        .position(|line| line_comment(line) == Some(SCRIPT_OPEN))?;

    let close_offset = lines[open_line + 1..]
        .iter()
        .position(|line| line_comment(line) == Some(SCRIPT_CLOSE))?;
    let close_line = open_line + 1 + close_offset;

    let pairs = lines[open_line + 1..close_line]
        .iter()
        .filter_map(|line| line_comment(line))
        .filter_map(parse_entry)
        .collect();

    Some(BlockSpan {
        open_line,
        close_line,
        pairs,
    })
}

// ============================================================================
// CSS GRAMMAR
// ============================================================================

fn locate_style_block(lines: &[&str]) -> Option<BlockSpan> {
    let open_line = find_style_open(lines)?;

    let mut pairs = Vec::new();
    for (idx, line) in lines.iter().enumerate().skip(open_line + 1) {
        let (inner, comment_ends) = match line.find("*/") {
            Some(pos) => (line[..pos].trim(), true),
            None => (line.trim(), false),
        };

        if inner == STYLE_CLOSE {
            return Some(BlockSpan {
                open_line,
                close_line: idx,
                pairs,
            });
        }

        if comment_ends {
            // Comment closed before `==/UserStyle==`.
            return None;
        }

        if let Some(pair) = parse_entry(inner) {
            pairs.push(pair);
        }
    }

    None
}

/// Find the `==UserStyle==` line, which must sit inside a `/* */` comment.
fn find_style_open(lines: &[&str]) -> Option<usize> {
    let mut in_comment = false;

    for (idx, line) in lines.iter().enumerate() {
        let mut body = line.trim();

        if !in_comment {
            match body.find("/*") {
                Some(pos) => {
                    in_comment = true;
                    body = body[pos + 2..].trim_start();
                }
                None => continue,
            }
        }

        let inner = match body.find("*/") {
            Some(pos) => {
                in_comment = false;
                body[..pos].trim()
            }
            None => body.trim(),
        };

        // A block opened and closed on the same line has no room for metadata.
        if inner == STYLE_OPEN && in_comment {
            return Some(idx);
        }
    }

    None
}

// ============================================================================
// SHARED
// ============================================================================

/// Parse `@key value` (value optional, surrounding whitespace trimmed).
fn parse_entry(content: &str) -> Option<(String, String)> {
    let rest = content.trim().strip_prefix('@')?;

    let (key, value) = match rest.find(char::is_whitespace) {
        Some(pos) => (&rest[..pos], rest[pos..].trim()),
        None => (rest, ""),
    };

    if key.is_empty() {
        return None;
    }

    Some((key.to_lowercase(), value.to_string()))
}
