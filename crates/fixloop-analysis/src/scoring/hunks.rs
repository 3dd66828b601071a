//! Unified-diff hunk parsing.

use fixloop_core::errors::ScoringError;

/// A parsed `@@ -start,count +start,count @@` header. Omitted counts are 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkHeader {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
}

impl HunkHeader {
    pub fn parse(line: &str) -> Result<Self, ScoringError> {
        let malformed = || ScoringError::MalformedHunkHeader(line.to_string());
        let body = line
            .trim_start()
            .strip_prefix("@@ ")
            .ok_or_else(malformed)?;
        let end = body.find(" @@").ok_or_else(malformed)?;
        let mut ranges = body[..end].split_whitespace();
        let old = ranges
            .next()
            .and_then(|r| r.strip_prefix('-'))
            .ok_or_else(malformed)?;
        let new = ranges
            .next()
            .and_then(|r| r.strip_prefix('+'))
            .ok_or_else(malformed)?;
        if ranges.next().is_some() {
            return Err(malformed());
        }
        let (old_start, old_count) = parse_range(old).ok_or_else(malformed)?;
        let (new_start, new_count) = parse_range(new).ok_or_else(malformed)?;
        Ok(Self {
            old_start,
            old_count,
            new_start,
            new_count,
        })
    }

    /// Whether `line` falls inside either side of the hunk, as
    /// `[start, start + max(count - 1, 0)]`.
    pub fn anchors(&self, line: u32) -> bool {
        within(line, self.old_start, self.old_count) || within(line, self.new_start, self.new_count)
    }
}

fn parse_range(range: &str) -> Option<(u32, u32)> {
    match range.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}

fn within(line: u32, start: u32, count: u32) -> bool {
    let last = start.saturating_add(count.saturating_sub(1));
    (start..=last).contains(&line)
}

/// One body line of a hunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    Context(String),
    Removed(String),
    Added(String),
}

/// A hunk header plus its body lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHunk {
    pub header: HunkHeader,
    pub lines: Vec<DiffLine>,
}

impl ParsedHunk {
    /// Parse one hunk string. File headers (`---`/`+++`) before the `@@`
    /// line are skipped; `\ No newline at end of file` markers are ignored.
    pub fn parse(text: &str) -> Result<Self, ScoringError> {
        let mut lines = text.lines().skip_while(|l| !l.starts_with("@@"));
        let header_line = lines
            .next()
            .ok_or_else(|| ScoringError::MalformedHunkHeader(first_line(text)))?;
        let header = HunkHeader::parse(header_line)?;
        let mut body = Vec::new();
        for line in lines {
            if line.starts_with('\\') {
                continue;
            }
            let parsed = match line.chars().next() {
                Some('-') => DiffLine::Removed(line[1..].to_string()),
                Some('+') => DiffLine::Added(line[1..].to_string()),
                Some(' ') => DiffLine::Context(line[1..].to_string()),
                None => DiffLine::Context(String::new()),
                Some(_) => DiffLine::Context(line.to_string()),
            };
            body.push(parsed);
        }
        Ok(Self {
            header,
            lines: body,
        })
    }

    pub fn removed(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|l| match l {
            DiffLine::Removed(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn added(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|l| match l {
            DiffLine::Added(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn has_changes(&self) -> bool {
        self.lines
            .iter()
            .any(|l| !matches!(l, DiffLine::Context(_)))
    }

    /// Source text before the change: context and removed lines.
    pub fn before_text(&self) -> String {
        join_lines(self.lines.iter().filter_map(|l| match l {
            DiffLine::Context(s) | DiffLine::Removed(s) => Some(s.as_str()),
            DiffLine::Added(_) => None,
        }))
    }

    /// Source text after the change: context and added lines.
    pub fn after_text(&self) -> String {
        join_lines(self.lines.iter().filter_map(|l| match l {
            DiffLine::Context(s) | DiffLine::Added(s) => Some(s.as_str()),
            DiffLine::Removed(_) => None,
        }))
    }
}

fn join_lines<'a>(lines: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().to_string()
}

/// Parse every hunk, skipping malformed ones.
pub fn parse_hunks(hunks: &[String]) -> Vec<ParsedHunk> {
    hunks
        .iter()
        .filter_map(|h| match ParsedHunk::parse(h) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed hunk");
                None
            }
        })
        .collect()
}

/// True when `line` is anchored by at least one well-formed hunk header.
pub fn is_anchored(line: u32, hunks: &[String]) -> bool {
    hunks.iter().any(|h| {
        h.lines()
            .filter(|l| l.starts_with("@@"))
            .filter_map(|l| HunkHeader::parse(l).ok())
            .any(|header| header.anchors(line))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_with_omitted_counts_defaults_to_one() {
        let h = HunkHeader::parse("@@ -7 +7 @@ fn main()").unwrap();
        assert_eq!((h.old_count, h.new_count), (1, 1));
        assert!(h.anchors(7));
        assert!(!h.anchors(8));
    }

    #[test]
    fn anchoring_is_inclusive_of_the_last_line() {
        let h = HunkHeader::parse("@@ -10,3 +10,4 @@").unwrap();
        assert!(h.anchors(10));
        assert!(h.anchors(12));
        assert!(h.anchors(13));
        assert!(!h.anchors(14));
        assert!(!h.anchors(9));
    }

    #[test]
    fn zero_count_anchors_only_the_start() {
        let h = HunkHeader::parse("@@ -5,0 +6,2 @@").unwrap();
        assert!(h.anchors(5));
        assert!(h.anchors(7));
        assert!(!h.anchors(4));
    }

    #[test]
    fn garbage_header_is_rejected() {
        assert!(HunkHeader::parse("@@ nonsense @@").is_err());
        assert!(HunkHeader::parse("diff --git a b").is_err());
    }

    #[test]
    fn hunk_body_splits_into_sides() {
        let hunk = ParsedHunk::parse("@@ -1,2 +1,2 @@\n keep\n-x = eval(s)\n+x = literal_eval(s)\n")
            .unwrap();
        assert_eq!(hunk.removed().collect::<Vec<_>>(), vec!["x = eval(s)"]);
        assert_eq!(hunk.before_text(), "keep\nx = eval(s)\n");
        assert_eq!(hunk.after_text(), "keep\nx = literal_eval(s)\n");
        assert!(hunk.has_changes());
    }
}
