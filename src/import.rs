//! Best-effort splitting of a pasted block of text into title/body entries.
//!
//! This is a heuristic, not a grammar: text that happens to contain one of
//! the delimiters will be split on it.

/// Sniffed in this order; the first one present in a line wins.
pub const DELIMITERS: [&str; 3] = [" :: ", " | ", " - "];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    pub title: String,
    pub body: String,
}

/// Blank-line separated blocks when any blank line is present, otherwise
/// one entry per non-empty line.
pub fn parse_entries(raw: &str) -> Vec<ImportEntry> {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = normalized.lines().collect();

    let has_blank_separator = {
        let first = lines.iter().position(|l| !l.trim().is_empty());
        let last = lines.iter().rposition(|l| !l.trim().is_empty());
        match (first, last) {
            (Some(first), Some(last)) => lines[first..=last].iter().any(|l| l.trim().is_empty()),
            _ => false,
        }
    };

    let blocks: Vec<Vec<&str>> = if has_blank_separator {
        lines
            .split(|line| line.trim().is_empty())
            .filter(|block| !block.is_empty())
            .map(|block| block.to_vec())
            .collect()
    } else {
        lines
            .iter()
            .filter(|line| !line.trim().is_empty())
            .map(|line| vec![*line])
            .collect()
    };

    blocks.into_iter().filter_map(|block| entry_from_block(&block)).collect()
}

fn strip_bullet(line: &str) -> &str {
    let trimmed = line.trim();
    for marker in ["- ", "* ", "• "] {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            return rest.trim_start();
        }
    }

    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &trimmed[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest.trim_start();
        }
    }
    trimmed
}

pub fn split_title_body(line: &str) -> (String, String) {
    for delimiter in DELIMITERS {
        if let Some((title, body)) = line.split_once(delimiter) {
            let (title, body) = (title.trim(), body.trim());
            if !title.is_empty() {
                return (title.to_string(), body.to_string());
            }
        }
    }
    (line.trim().to_string(), String::new())
}

fn entry_from_block(block: &[&str]) -> Option<ImportEntry> {
    let (first, rest) = block.split_first()?;
    let first = strip_bullet(first);
    let (title, mut body) = split_title_body(first);

    let continuation: Vec<&str> = rest
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect();
    if !continuation.is_empty() {
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str(&continuation.join("\n"));
    }

    if title.is_empty() && body.is_empty() {
        return None;
    }
    Some(ImportEntry { title, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, body: &str) -> ImportEntry {
        ImportEntry {
            title: title.into(),
            body: body.into(),
        }
    }

    #[test]
    fn blank_line_blocks_with_delimiters() {
        let entries = parse_entries("Idea A - Body A\n\nIdea B :: Body B");
        assert_eq!(entries, vec![entry("Idea A", "Body A"), entry("Idea B", "Body B")]);
    }

    #[test]
    fn single_lines_without_blank_separator() {
        let entries = parse_entries("- First | one\n* Second\n\n");
        assert_eq!(entries, vec![entry("First", "one"), entry("Second", "")]);
    }

    #[test]
    fn multi_line_block_uses_first_line_as_title() {
        let entries = parse_entries("Launch caption\nMeet the serum.\nOut now.\n\n\n2) Hook :: Glow up");
        assert_eq!(
            entries,
            vec![
                entry("Launch caption", "Meet the serum.\nOut now."),
                entry("Hook", "Glow up"),
            ]
        );
    }

    #[test]
    fn double_colon_wins_over_dash() {
        assert_eq!(
            split_title_body("Self-care - daily :: keep it short"),
            ("Self-care - daily".to_string(), "keep it short".to_string())
        );
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(parse_entries("  \n\r\n ").is_empty());
    }
}
