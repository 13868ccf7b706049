//! Splitting of rendered documents that exceed the Memos content cap.

use chrono::{DateTime, Duration, FixedOffset};

/// Maximum content length the Memos create endpoint accepts.
pub const MAX_MEMO_LEN: usize = 8192;

/// Reserved for the numbered title line and continuation markers.
const HEADROOM: usize = 200;

const TRAILING_MARKER: &str = "\n\n...";
const LEADING_MARKER: &str = "...\n\n";

/// One chunk of a split document, dispatched as an independent memo.
pub struct MemoPart {
    pub content: String,
    pub created: DateTime<FixedOffset>,
}

/// Split `content` into ordered parts, each within the length cap. Cuts
/// land on the last newline at or before the safe boundary (hard cut if a
/// line is longer than the boundary), and leading whitespace of each new
/// remainder is skipped. Parts are retitled `title (i/n)`, linked with
/// ellipsis markers, and timestamped 5 s apart to keep their order.
pub fn split_content(
    content: &str,
    title: &str,
    created: DateTime<FixedOffset>,
) -> Vec<MemoPart> {
    let safe_chunk = MAX_MEMO_LEN - HEADROOM;

    let mut chunks = Vec::new();
    let mut remaining = content;

    while remaining.len() > safe_chunk {
        let boundary = floor_char_boundary(remaining, safe_chunk);
        let cut = match remaining[..boundary].rfind('\n') {
            Some(nl) if nl > 0 => nl,
            _ => boundary,
        };

        chunks.push(&remaining[..cut]);
        remaining = remaining[cut..].trim_start_matches(['\n', ' ']);
    }
    if !remaining.is_empty() {
        chunks.push(remaining);
    }

    let total = chunks.len();
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let part_title = format!("{} ({}/{})", title, i + 1, total);
            let body = strip_title_line(chunk);

            let mut content = format!("# {part_title}\n\n");
            if i > 0 {
                content.push_str(LEADING_MARKER);
            }
            content.push_str(body);
            if i < total - 1 {
                content.push_str(TRAILING_MARKER);
            }

            MemoPart {
                content,
                created: created + Duration::seconds(5 * i as i64),
            }
        })
        .collect()
}

/// Drop the original `# title` line so the numbered title replaces it.
fn strip_title_line(chunk: &str) -> &str {
    if let Some(rest) = chunk.strip_prefix("# ") {
        match rest.find('\n') {
            Some(nl) => rest[nl + 1..].trim_start_matches('\n'),
            None => "",
        }
    } else {
        chunk
    }
}

/// Largest index `<= at` that sits on a UTF-8 character boundary.
fn floor_char_boundary(s: &str, at: usize) -> usize {
    let mut at = at.min(s.len());
    while !s.is_char_boundary(at) {
        at -= 1;
    }
    at
}
