//! Prompt-ready context blocks built from recall results.
//!
//! Matches are grouped under their first tag (untagged ones under `General`),
//! groups appear in the order of their best match, and the whole block never
//! exceeds the caller's character budget.

use super::types::RecallMatch;

pub const CONTEXT_HEADING: &str = "# Relevant Memory Context";
pub const UNTAGGED_GROUP: &str = "General";
/// Lines shown per group.
pub const MAX_PER_GROUP: usize = 5;

struct Group<'a> {
    label: &'a str,
    lines: Vec<String>,
}

fn group_label(m: &RecallMatch) -> &str {
    m.tags.iter().next().map(String::as_str).unwrap_or(UNTAGGED_GROUP)
}

/// Render `matches` (best first) as a markdown block of at most `max_chars`
/// characters. Returns an empty string when nothing fits.
///
/// A line that would overflow the budget is skipped, so a shorter line further
/// down can still make it in. A group heading is only written together with
/// its first line.
pub fn render(matches: &[RecallMatch], max_chars: usize) -> String {
    let mut groups: Vec<Group<'_>> = Vec::new();
    for m in matches {
        let label = group_label(m);
        let position = match groups.iter().position(|g| g.label == label) {
            Some(position) => position,
            None => {
                groups.push(Group {
                    label,
                    lines: Vec::new(),
                });
                groups.len() - 1
            }
        };
        let group = &mut groups[position];
        if group.lines.len() < MAX_PER_GROUP {
            group.lines.push(format!("- {}", m.text));
        }
    }

    let mut out = String::from(CONTEXT_HEADING);
    let mut used = CONTEXT_HEADING.chars().count();
    if used > max_chars {
        return String::new();
    }
    let mut wrote_any = false;

    for group in &groups {
        let heading = format!("\n\n## {}", group.label);
        let heading_len = heading.chars().count();
        let mut opened = false;
        for line in &group.lines {
            // newline before each bullet
            let line_len = line.chars().count() + 1;
            let needed = line_len + if opened { 0 } else { heading_len };
            if used + needed > max_chars {
                continue;
            }
            if !opened {
                out.push_str(&heading);
                opened = true;
            }
            out.push('\n');
            out.push_str(line);
            used += needed;
            wrote_any = true;
        }
    }

    if wrote_any {
        out
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::Importance;

    fn m(text: &str, tags: &[&str]) -> RecallMatch {
        RecallMatch {
            id: 0,
            text: text.to_string(),
            score: 0.8,
            importance: Importance::Normal,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn groups_by_first_tag_in_rank_order() {
        let matches = vec![
            m("Sarah's birthday is March 5th", &["family"]),
            m("dentist on Tuesday", &[]),
            m("Sarah likes tulips", &["family", "preferences"]),
        ];
        let block = render(&matches, 1_000);
        assert_eq!(
            block,
            "# Relevant Memory Context\n\n## family\n- Sarah's birthday is March 5th\n- Sarah likes tulips\n\n## General\n- dentist on Tuesday"
        );
    }

    #[test]
    fn respects_budget_and_skips_long_lines() {
        let matches = vec![
            m(&"x".repeat(200), &["notes"]),
            m("short one", &["notes"]),
        ];
        let block = render(&matches, 60);
        assert!(block.chars().count() <= 60, "{block}");
        assert!(block.contains("- short one"));
        assert!(!block.contains("xxx"));
    }

    #[test]
    fn nothing_fits_renders_empty() {
        assert_eq!(render(&[], 1_000), "");
        assert_eq!(render(&[m("anything", &[])], 10), "");
        assert_eq!(render(&[m("anything at all", &[])], CONTEXT_HEADING.len() + 5), "");
    }

    #[test]
    fn caps_lines_per_group() {
        let matches: Vec<RecallMatch> = (0..8).map(|i| m(&format!("fact {i}"), &["work"])).collect();
        let block = render(&matches, 10_000);
        assert_eq!(block.matches("\n- ").count(), MAX_PER_GROUP);
    }
}
