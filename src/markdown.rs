//! Pure conversion of Notion blocks into Memos-flavored Markdown.

use chrono::DateTime;

use crate::notion::{Block, BlockContent, RichText};

/// Render blocks to a single Markdown document. Layout: title heading,
/// tag line, hidden creation-time comment, then one block per paragraph.
/// Headings shift one level deeper to make room for the title at level 1.
pub fn blocks_to_markdown(
    blocks: &[Block],
    created_time: &str,
    title: &str,
    tags: &[String],
) -> String {
    let mut md = String::new();

    if !title.is_empty() {
        md.push_str("# ");
        md.push_str(title);
        md.push_str("\n\n");
    }

    if !tags.is_empty() {
        for tag in tags {
            md.push('#');
            md.push_str(&sanitize_tag(tag));
            md.push(' ');
        }
        md.push_str("\n\n");
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(created_time) {
        md.push_str(&format!(
            "<!-- Created: {} -->\n\n",
            parsed.format("%Y-%m-%d %H:%M:%S")
        ));
    }

    for block in blocks {
        let block_md = block_to_markdown(block);
        if !block_md.is_empty() {
            md.push_str(&block_md);
            md.push('\n');
        }
    }

    md.trim().to_string()
}

fn block_to_markdown(block: &Block) -> String {
    match &block.content {
        BlockContent::Paragraph { paragraph } => {
            let text = rich_text_to_markdown(&paragraph.rich_text);
            if text.is_empty() {
                String::new()
            } else {
                format!("{text}\n")
            }
        }
        BlockContent::Heading1 { heading_1 } => {
            format!("## {}\n", rich_text_to_markdown(&heading_1.rich_text))
        }
        BlockContent::Heading2 { heading_2 } => {
            format!("### {}\n", rich_text_to_markdown(&heading_2.rich_text))
        }
        BlockContent::Heading3 { heading_3 } => {
            format!("#### {}\n", rich_text_to_markdown(&heading_3.rich_text))
        }
        BlockContent::BulletedListItem { bulleted_list_item } => {
            format!("- {}\n", rich_text_to_markdown(&bulleted_list_item.rich_text))
        }
        BlockContent::NumberedListItem { numbered_list_item } => {
            // Literal "1." for every item; Memos renumbers on display.
            format!("1. {}\n", rich_text_to_markdown(&numbered_list_item.rich_text))
        }
        BlockContent::ToDo { to_do } => {
            let checkbox = if to_do.checked { "- [x]" } else { "- [ ]" };
            format!("{checkbox} {}\n", rich_text_to_markdown(&to_do.rich_text))
        }
        BlockContent::Code { code } => {
            let lang = if code.language.is_empty() {
                "text"
            } else {
                &code.language
            };
            format!("```{lang}\n{}\n```\n", rich_text_to_plain(&code.rich_text))
        }
        BlockContent::Unsupported => String::new(),
    }
}

/// Concatenate runs with annotation markup. Nesting is fixed: inline code
/// innermost, then bold, italic, strikethrough; a link wrapper goes last.
/// The run-level href wins over a link embedded in the text payload.
fn rich_text_to_markdown(runs: &[RichText]) -> String {
    let mut out = String::new();

    for rt in runs {
        if rt.plain_text.is_empty() {
            continue;
        }
        let mut text = rt.plain_text.clone();

        if let Some(a) = &rt.annotations {
            if a.code {
                text = format!("`{text}`");
            }
            if a.bold {
                text = format!("**{text}**");
            }
            if a.italic {
                text = format!("*{text}*");
            }
            if a.strikethrough {
                text = format!("~~{text}~~");
            }
        }

        if let Some(href) = rt.href.as_deref().filter(|h| !h.is_empty()) {
            text = format!("[{text}]({href})");
        } else if let Some(link) = rt.text.as_ref().and_then(|t| t.link.as_ref()) {
            text = format!("[{text}]({})", link.url);
        }

        out.push_str(&text);
    }

    out
}

/// Plain concatenation, used for code blocks where markup would corrupt
/// the content.
fn rich_text_to_plain(runs: &[RichText]) -> String {
    runs.iter().map(|rt| rt.plain_text.as_str()).collect()
}

/// Memos tags allow `[A-Za-z0-9_-]` only: whitespace and '.' map to '_',
/// everything else outside that set is dropped. Idempotent.
pub fn sanitize_tag(tag: &str) -> String {
    tag.chars()
        .filter_map(|c| match c {
            ' ' | '.' => Some('_'),
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notion::Block;

    fn block(json: serde_json::Value) -> Block {
        serde_json::from_value(json).unwrap()
    }

    fn paragraph(text: &str) -> Block {
        block(serde_json::json!({
            "id": "b",
            "type": "paragraph",
            "paragraph": { "rich_text": [{ "plain_text": text }] }
        }))
    }

    #[test]
    fn groceries_scenario() {
        let blocks = vec![paragraph("Milk"), paragraph("Eggs")];
        let md = blocks_to_markdown(&blocks, "2024-03-01T10:00:00Z", "Groceries", &[]);
        assert_eq!(
            md,
            "# Groceries\n\n<!-- Created: 2024-03-01 10:00:00 -->\n\nMilk\n\nEggs"
        );
    }

    #[test]
    fn tags_render_sanitized_on_own_line() {
        let blocks = vec![paragraph("body")];
        let tags = vec!["My Tag.".to_string(), "work".to_string()];
        let md = blocks_to_markdown(&blocks, "", "T", &tags);
        assert!(md.starts_with("# T\n\n#My_Tag_ #work \n\nbody"));
    }

    #[test]
    fn invalid_timestamp_is_omitted() {
        let md = blocks_to_markdown(&[paragraph("x")], "not-a-date", "T", &[]);
        assert!(!md.contains("Created:"));
    }

    #[test]
    fn headings_shift_one_level() {
        let blocks = vec![
            block(serde_json::json!({
                "id": "h1",
                "type": "heading_1",
                "heading_1": { "rich_text": [{ "plain_text": "Top" }] }
            })),
            block(serde_json::json!({
                "id": "h3",
                "type": "heading_3",
                "heading_3": { "rich_text": [{ "plain_text": "Deep" }] }
            })),
        ];
        let md = blocks_to_markdown(&blocks, "", "T", &[]);
        assert!(md.contains("## Top"));
        assert!(md.contains("#### Deep"));
    }

    #[test]
    fn list_items_render() {
        let blocks = vec![
            block(serde_json::json!({
                "id": "b1",
                "type": "bulleted_list_item",
                "bulleted_list_item": { "rich_text": [{ "plain_text": "a" }] }
            })),
            block(serde_json::json!({
                "id": "n1",
                "type": "numbered_list_item",
                "numbered_list_item": { "rich_text": [{ "plain_text": "b" }] }
            })),
            block(serde_json::json!({
                "id": "n2",
                "type": "numbered_list_item",
                "numbered_list_item": { "rich_text": [{ "plain_text": "c" }] }
            })),
            block(serde_json::json!({
                "id": "t1",
                "type": "to_do",
                "to_do": { "rich_text": [{ "plain_text": "d" }], "checked": true }
            })),
            block(serde_json::json!({
                "id": "t2",
                "type": "to_do",
                "to_do": { "rich_text": [{ "plain_text": "e" }], "checked": false }
            })),
        ];
        let md = blocks_to_markdown(&blocks, "", "T", &[]);
        assert!(md.contains("- a"));
        // Numbered items stay literal "1.".
        assert!(md.contains("1. b"));
        assert!(md.contains("1. c"));
        assert!(!md.contains("2. c"));
        assert!(md.contains("- [x] d"));
        assert!(md.contains("- [ ] e"));
    }

    #[test]
    fn code_block_defaults_to_text_and_skips_formatting() {
        let blocks = vec![block(serde_json::json!({
            "id": "c1",
            "type": "code",
            "code": {
                "rich_text": [{
                    "plain_text": "let x = 1;",
                    "annotations": { "bold": true }
                }],
                "language": ""
            }
        }))];
        let md = blocks_to_markdown(&blocks, "", "T", &[]);
        assert!(md.contains("```text\nlet x = 1;\n```"));
        assert!(!md.contains("**"));
    }

    #[test]
    fn annotations_nest_in_fixed_order() {
        let runs: Vec<RichText> = serde_json::from_value(serde_json::json!([{
            "plain_text": "x",
            "annotations": {
                "bold": true,
                "italic": true,
                "strikethrough": true,
                "code": true
            }
        }]))
        .unwrap();
        assert_eq!(rich_text_to_markdown(&runs), "~~***`x`***~~");
    }

    #[test]
    fn href_wins_over_embedded_link() {
        let runs: Vec<RichText> = serde_json::from_value(serde_json::json!([{
            "plain_text": "site",
            "href": "https://a.example.com",
            "text": { "link": { "url": "https://b.example.com" } }
        }]))
        .unwrap();
        assert_eq!(
            rich_text_to_markdown(&runs),
            "[site](https://a.example.com)"
        );
    }

    #[test]
    fn embedded_link_used_when_no_href() {
        let runs: Vec<RichText> = serde_json::from_value(serde_json::json!([{
            "plain_text": "site",
            "text": { "link": { "url": "https://b.example.com" } }
        }]))
        .unwrap();
        assert_eq!(
            rich_text_to_markdown(&runs),
            "[site](https://b.example.com)"
        );
    }

    #[test]
    fn empty_paragraph_and_unsupported_are_skipped() {
        let blocks = vec![
            paragraph("before"),
            block(serde_json::json!({
                "id": "e",
                "type": "paragraph",
                "paragraph": { "rich_text": [] }
            })),
            block(serde_json::json!({
                "id": "img",
                "type": "image",
                "image": {}
            })),
            paragraph("after"),
        ];
        let md = blocks_to_markdown(&blocks, "", "T", &[]);
        assert_eq!(md, "# T\n\nbefore\n\nafter");
    }

    #[test]
    fn sanitize_maps_space_and_dot() {
        assert_eq!(sanitize_tag("My Tag."), "My_Tag_");
    }

    #[test]
    fn sanitize_drops_other_characters() {
        assert_eq!(sanitize_tag("a/b(c)ü!"), "abc");
        assert_eq!(sanitize_tag("keep_this-one2"), "keep_this-one2");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for raw in ["My Tag.", "08.12. Something", "ä b c", "tab\there"] {
            let once = sanitize_tag(raw);
            assert_eq!(sanitize_tag(&once), once);
        }
    }
}
