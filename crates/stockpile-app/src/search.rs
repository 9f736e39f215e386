// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use regex::{Regex, RegexBuilder};
use std::time::{Duration, Instant};
use tracing::warn;

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(100);

/// A compiled search query. Every character of the query is matched
/// literally and case-insensitively; surrounding whitespace is ignored.
#[derive(Debug, Clone)]
pub struct SearchPattern {
    query: String,
    regex: Option<Regex>,
}

impl SearchPattern {
    pub fn new(query: &str) -> Self {
        let query = query.trim().to_owned();
        if query.is_empty() {
            return Self { query, regex: None };
        }

        let regex = match RegexBuilder::new(&regex::escape(&query))
            .case_insensitive(true)
            .build()
        {
            Ok(regex) => Some(regex),
            Err(error) => {
                warn!(%error, "search pattern rejected; falling back to substring match");
                None
            }
        };
        Self { query, regex }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_empty()
    }

    pub fn matches(&self, text: &str) -> bool {
        if self.query.is_empty() {
            return true;
        }
        match &self.regex {
            Some(regex) => regex.is_match(text),
            None => text.to_lowercase().contains(&self.query.to_lowercase()),
        }
    }

    /// Marks every match in `plain`. The input is always treated as
    /// unmarked text, so marks never nest.
    pub fn highlight(&self, plain: &str) -> Highlight {
        let Some(regex) = &self.regex else {
            return Highlight::plain(plain);
        };

        let mut segments = Vec::new();
        let mut cursor = 0usize;
        for found in regex.find_iter(plain) {
            if found.start() > cursor {
                segments.push(Segment::new(&plain[cursor..found.start()], false));
            }
            segments.push(Segment::new(found.as_str(), true));
            cursor = found.end();
        }
        if cursor < plain.len() {
            segments.push(Segment::new(&plain[cursor..], false));
        }
        Highlight { segments }
    }
}

pub fn matches(query: &str, row_text: &str) -> bool {
    SearchPattern::new(query).matches(row_text)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub marked: bool,
}

impl Segment {
    fn new(text: &str, marked: bool) -> Self {
        Self {
            text: text.to_owned(),
            marked,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Highlight {
    segments: Vec<Segment>,
}

impl Highlight {
    pub fn plain(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }
        Self {
            segments: vec![Segment::new(text, false)],
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn plain_text(&self) -> String {
        self.segments
            .iter()
            .map(|segment| segment.text.as_str())
            .collect()
    }

    pub fn has_marks(&self) -> bool {
        self.segments.iter().any(|segment| segment.marked)
    }

    pub fn marked_texts(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter(|segment| segment.marked)
            .map(|segment| segment.text.as_str())
            .collect()
    }

    pub fn rehighlight(&self, pattern: &SearchPattern) -> Self {
        pattern.highlight(&self.plain_text())
    }
}

/// Coalesces bursts of values: only the latest value is released, and only
/// once no new value has arrived for a full window.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.window));
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let due = matches!(&self.pending, Some((_, deadline)) if *deadline <= now);
        if !due {
            return None;
        }
        self.pending.take().map(|(value, _)| value)
    }
}

#[cfg(test)]
mod tests {
    use super::{Debouncer, Highlight, SearchPattern, matches};
    use std::time::{Duration, Instant};

    #[test]
    fn matching_is_case_insensitive() {
        assert!(matches("widget", "Blue WIDGET"));
        assert!(matches("WiDg", "widget"));
        assert!(!matches("gizmo", "widget"));
    }

    #[test]
    fn pattern_characters_match_literally() {
        assert!(matches("a.b", "xa.by"));
        assert!(!matches("a.b", "axb"));
        assert!(matches("(1+1)*", "calc (1+1)* done"));
        assert!(!matches("^w", "widget"));
        assert!(matches("$5|", "cost $5|each"));
        assert!(matches("[", "bracket [ open"));
        assert!(matches("\\d", "literal \\d"));
        assert!(!matches("\\d", "digit 7"));
    }

    #[test]
    fn blank_query_matches_everything() {
        assert!(matches("", "anything"));
        assert!(matches("   ", ""));
        assert!(SearchPattern::new("  ").is_empty());
    }

    #[test]
    fn query_is_trimmed() {
        let pattern = SearchPattern::new("  pro ");
        assert_eq!(pattern.query(), "pro");
        assert!(pattern.matches("Widget Pro"));
    }

    #[test]
    fn highlight_marks_every_match() {
        let highlight = SearchPattern::new("ab").highlight("Abc cab");
        assert_eq!(highlight.marked_texts(), vec!["Ab", "ab"]);
        assert_eq!(highlight.plain_text(), "Abc cab");
    }

    #[test]
    fn highlight_of_blank_query_has_no_marks() {
        let highlight = SearchPattern::new("").highlight("Widget");
        assert!(!highlight.has_marks());
        assert_eq!(highlight, Highlight::plain("Widget"));
    }

    #[test]
    fn rehighlight_never_compounds_marks() {
        let plain = "Widget Pro widget";
        let first = SearchPattern::new("widget").highlight(plain);
        let second = first.rehighlight(&SearchPattern::new("pro"));
        assert_eq!(second, SearchPattern::new("pro").highlight(plain));
        assert_eq!(second.marked_texts(), vec!["Pro"]);

        let again = second.rehighlight(&SearchPattern::new("pro"));
        assert_eq!(again, second);
    }

    #[test]
    fn highlight_handles_multibyte_text() {
        let highlight = SearchPattern::new("ñ").highlight("Piña ÑAM");
        assert_eq!(highlight.marked_texts(), vec!["ñ", "Ñ"]);
        assert_eq!(highlight.plain_text(), "Piña ÑAM");
    }

    #[test]
    fn debouncer_releases_only_after_quiet_window() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(100));

        debouncer.push("w", start);
        debouncer.push("wi", start + Duration::from_millis(40));
        debouncer.push("wid", start + Duration::from_millis(80));

        assert_eq!(debouncer.poll(start + Duration::from_millis(150)), None);
        assert_eq!(
            debouncer.poll(start + Duration::from_millis(180)),
            Some("wid")
        );
        assert_eq!(debouncer.poll(start + Duration::from_millis(500)), None);
    }
}
