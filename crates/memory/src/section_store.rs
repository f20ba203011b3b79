//! C8 — Size-Bounded Memory Store.
//!
//! The global memory file is a flat Markdown document made of `##`-headed
//! sections. Facts are appended under a caller-supplied heading with
//! Levenshtein-based duplicate filtering, then the whole document is kept
//! under a hard byte ceiling by evicting lines from its largest section.

const MAX_BYTES: usize = 50 * 1024;
const SIMILARITY_THRESHOLD: f64 = 0.9;
const MAX_PRUNE_ITERATIONS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub header: String,
    pub lines: Vec<String>,
}

impl Section {
    fn render(&self) -> String {
        let mut out = String::new();
        if !self.header.is_empty() {
            out.push_str(&self.header);
            out.push('\n');
        }
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    fn non_blank_line_count(&self) -> usize {
        self.lines.iter().filter(|l| !l.trim().is_empty()).count()
    }
}

/// Parse `content` into an ordered list of sections. Lines before the first
/// `##` heading form a pseudo-section with an empty header.
pub fn parse_sections(content: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current = Section { header: String::new(), lines: Vec::new() };

    for line in content.lines() {
        if line.starts_with("## ") || line == "##" {
            sections.push(current);
            current = Section { header: line.to_string(), lines: Vec::new() };
        } else {
            current.lines.push(line.to_string());
        }
    }
    sections.push(current);
    sections
}

/// Re-render `sections` back into a document ending in exactly one newline.
pub fn render_sections(sections: &[Section]) -> String {
    let mut out = String::new();
    for section in sections {
        out.push_str(&section.render());
    }
    let trimmed = out.trim_end_matches('\n');
    format!("{trimmed}\n")
}

fn normalize_for_comparison(line: &str) -> String {
    let lowered = line.trim().to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_duplicate(candidate: &str, existing: &str) -> bool {
    let a = normalize_for_comparison(candidate);
    let b = normalize_for_comparison(existing);
    if a.is_empty() || b.is_empty() {
        return a == b;
    }
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return true;
    }
    let distance = strsim::levenshtein(&a, &b);
    let similarity = 1.0 - (distance as f64 / max_len as f64);
    similarity >= SIMILARITY_THRESHOLD
}

fn find_or_create_section<'a>(sections: &'a mut Vec<Section>, heading: &str) -> &'a mut Section {
    if let Some(index) = sections.iter().position(|s| s.header == heading) {
        return &mut sections[index];
    }
    sections.push(Section { header: heading.to_string(), lines: Vec::new() });
    sections.last_mut().expect("just pushed")
}

/// Result of appending a batch of new facts to the store.
#[derive(Debug, Clone, Default)]
pub struct AppendOutcome {
    pub accepted: usize,
    pub duplicates_filtered: usize,
}

/// Append `facts` under `heading` (created at the end of the document if
/// absent), dropping any fact that duplicates an existing non-blank line or
/// a fact already accepted earlier in this same call (§4.8 self-dedup).
pub fn append_facts(content: &str, heading: &str, facts: &[String]) -> (String, AppendOutcome) {
    let mut sections = parse_sections(content);
    let mut outcome = AppendOutcome::default();

    let existing_lines: Vec<String> = sections
        .iter()
        .flat_map(|s| s.lines.iter())
        .filter(|l| !l.trim().is_empty())
        .cloned()
        .collect();

    let mut accepted_this_call: Vec<String> = Vec::new();

    for fact in facts {
        if fact.trim().is_empty() {
            continue;
        }
        let is_dup = existing_lines.iter().any(|existing| is_duplicate(fact, existing))
            || accepted_this_call.iter().any(|accepted| is_duplicate(fact, accepted));

        if is_dup {
            outcome.duplicates_filtered += 1;
            continue;
        }

        accepted_this_call.push(fact.clone());
        outcome.accepted += 1;
    }

    if !accepted_this_call.is_empty() {
        let section = find_or_create_section(&mut sections, heading);
        section.lines.extend(accepted_this_call);
    }

    (render_sections(&sections), outcome)
}

/// Prune `content` until it fits under [`MAX_BYTES`], by repeatedly trimming
/// lines from the top of the non-header section with the most non-blank
/// lines (§4.8). Returns the possibly-pruned content.
pub fn enforce_size_limit(content: &str) -> String {
    let mut sections = parse_sections(content);
    let mut rendered = render_sections(&sections);

    if rendered.len() <= MAX_BYTES {
        return rendered;
    }

    for _ in 0..MAX_PRUNE_ITERATIONS {
        if rendered.len() <= MAX_BYTES {
            break;
        }

        let overage = rendered.len() - MAX_BYTES;
        let to_remove = ((overage as f64 / 100.0).ceil() as usize).max(1);

        let Some((index, count)) = sections
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.header.is_empty() || sections.len() == 1)
            .map(|(i, s)| (i, s.non_blank_line_count()))
            .max_by_key(|(_, count)| *count)
        else {
            tracing::warn!("size enforcement cannot find a prunable section; stopping");
            break;
        };

        if count == 0 {
            tracing::warn!("memory file exceeds size limit but no section has prunable lines");
            break;
        }

        let cap = (count / 10).max(1);
        let remove_count = to_remove.min(cap);

        let section = &mut sections[index];
        let mut removed = 0;
        while removed < remove_count {
            if section.lines.is_empty() {
                break;
            }
            let first_non_blank = section.lines.iter().position(|l| !l.trim().is_empty());
            match first_non_blank {
                Some(pos) => {
                    section.lines.remove(pos);
                    removed += 1;
                }
                None => break,
            }
        }

        let new_rendered = render_sections(&sections);
        if new_rendered.len() >= rendered.len() {
            tracing::warn!("size enforcement made no progress; stopping");
            break;
        }
        rendered = new_rendered;
    }

    rendered
}

/// Combined append-then-enforce, the operation C9's sandbox commit step
/// performs against the sandboxed file content (§4.9 step 5).
pub fn append_and_enforce(content: &str, heading: &str, facts: &[String]) -> (String, AppendOutcome) {
    let (appended, outcome) = append_facts(content, heading, facts);
    (enforce_size_limit(&appended), outcome)
}

/// Reconcile a sandbox file back into the committed memory document
/// (§4.9 step 5, §11's `duplicatesFiltered` resolution): lines present in
/// `sandbox` sections that were not already present verbatim in the
/// corresponding `original` section are candidate new facts. Each is run
/// through the same near-duplicate filter C8's append uses before being
/// folded into `original`'s matching section (created if the sandbox
/// introduced a new heading). The result is then size-enforced.
pub fn reconcile_sandbox(original: &str, sandbox: &str) -> (String, AppendOutcome) {
    let mut base_sections = parse_sections(original);
    let new_sections = parse_sections(sandbox);

    let existing_lines: Vec<String> = base_sections
        .iter()
        .flat_map(|s| s.lines.iter())
        .filter(|l| !l.trim().is_empty())
        .cloned()
        .collect();

    let mut outcome = AppendOutcome::default();
    let mut accepted_overall: Vec<String> = Vec::new();

    for new_section in &new_sections {
        let base_lines: Vec<String> = base_sections
            .iter()
            .find(|s| s.header == new_section.header)
            .map(|s| s.lines.clone())
            .unwrap_or_default();

        let mut accepted_for_section = Vec::new();

        for line in &new_section.lines {
            if line.trim().is_empty() || base_lines.contains(line) {
                continue;
            }

            let is_dup = existing_lines.iter().any(|existing| is_duplicate(line, existing))
                || accepted_overall.iter().any(|accepted| is_duplicate(line, accepted));

            if is_dup {
                outcome.duplicates_filtered += 1;
                continue;
            }

            accepted_for_section.push(line.clone());
            accepted_overall.push(line.clone());
            outcome.accepted += 1;
        }

        if !accepted_for_section.is_empty() {
            let section = find_or_create_section(&mut base_sections, &new_section.header);
            section.lines.extend(accepted_for_section);
        }
    }

    (enforce_size_limit(&render_sections(&base_sections)), outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sections_groups_lines_under_headers() {
        let content = "preamble\n\n## Facts\nline one\nline two\n## Notes\nline three\n";
        let sections = parse_sections(content);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].header, "");
        assert_eq!(sections[1].header, "## Facts");
        assert_eq!(sections[1].lines, vec!["line one".to_string(), "line two".to_string()]);
        assert_eq!(sections[2].header, "## Notes");
    }

    #[test]
    fn render_sections_ends_with_exactly_one_newline() {
        let sections = vec![Section { header: "## Facts".to_string(), lines: vec!["a".to_string()] }];
        let rendered = render_sections(&sections);
        assert!(rendered.ends_with("a\n"));
        assert!(!rendered.ends_with("a\n\n"));
    }

    #[test]
    fn append_creates_missing_heading_at_end() {
        let content = "## Facts\nexisting\n";
        let (out, outcome) = append_facts(content, "## New Section", &["new fact".to_string()]);
        assert_eq!(outcome.accepted, 1);
        assert_eq!(outcome.duplicates_filtered, 0);
        assert!(out.trim_end().ends_with("new fact"));
        assert!(out.contains("## New Section"));
    }

    #[test]
    fn append_filters_near_duplicate_against_existing_line() {
        let content = "## Facts\nThe user prefers dark mode.\n";
        let (out, outcome) = append_facts(content, "## Facts", &["the user prefers dark mode".to_string()]);
        assert_eq!(outcome.accepted, 0);
        assert_eq!(outcome.duplicates_filtered, 1);
        assert_eq!(out.matches("prefers dark mode").count(), 1);
    }

    #[test]
    fn append_filters_duplicate_within_the_same_batch() {
        let content = "## Facts\n";
        let facts = vec!["The user likes tea.".to_string(), "the user likes tea".to_string()];
        let (_, outcome) = append_facts(content, "## Facts", &facts);
        assert_eq!(outcome.accepted, 1);
        assert_eq!(outcome.duplicates_filtered, 1);
    }

    #[test]
    fn append_skips_blank_facts() {
        let content = "## Facts\n";
        let (_, outcome) = append_facts(content, "## Facts", &["   ".to_string()]);
        assert_eq!(outcome.accepted, 0);
        assert_eq!(outcome.duplicates_filtered, 0);
    }

    #[test]
    fn size_enforcement_is_a_no_op_under_the_limit() {
        let content = "## Facts\nshort\n";
        let out = enforce_size_limit(content);
        assert_eq!(out, "## Facts\nshort\n");
    }

    #[test]
    fn size_enforcement_prunes_the_largest_section_until_under_limit() {
        let mut content = String::from("## Small\nkeep me\n## Big\n");
        for i in 0..2000 {
            content.push_str(&format!("fact number {i} takes up meaningful space in this section\n"));
        }
        let out = enforce_size_limit(&content);
        assert!(out.len() <= MAX_BYTES);
        assert!(out.contains("keep me"));
    }

    #[test]
    fn reconcile_folds_genuinely_new_lines_into_their_matching_section() {
        let original = "## Facts\nuser likes chess\n";
        let sandbox = "## Facts\nuser likes chess\nuser dislikes tea\n";
        let (out, outcome) = reconcile_sandbox(original, sandbox);
        assert_eq!(outcome.accepted, 1);
        assert_eq!(outcome.duplicates_filtered, 0);
        assert!(out.contains("user dislikes tea"));
        assert_eq!(out.matches("user likes chess").count(), 1);
    }

    #[test]
    fn reconcile_drops_near_duplicates_of_existing_content() {
        let original = "## Facts\nThe user prefers dark mode.\n";
        let sandbox = "## Facts\nThe user prefers dark mode.\nthe user prefers dark mode\n";
        let (out, outcome) = reconcile_sandbox(original, sandbox);
        assert_eq!(outcome.accepted, 0);
        assert_eq!(outcome.duplicates_filtered, 1);
        assert_eq!(out.matches("prefers dark mode").count(), 1);
    }

    #[test]
    fn reconcile_creates_a_new_section_introduced_by_the_sandbox() {
        let original = "## Facts\nexisting\n";
        let sandbox = "## Facts\nexisting\n## Preferences\nlikes tea\n";
        let (out, outcome) = reconcile_sandbox(original, sandbox);
        assert_eq!(outcome.accepted, 1);
        assert!(out.contains("## Preferences"));
        assert!(out.contains("likes tea"));
    }

    #[test]
    fn output_always_ends_with_exactly_one_newline() {
        let (out, _) = append_and_enforce("## Facts\n", "## Facts", &["one fact".to_string()]);
        assert!(out.ends_with('\n'));
        assert!(!out.ends_with("\n\n"));
    }
}
