use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Semantic slice of an AI-generated productivity report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SectionKey {
    Overview,
    Timing,
    Content,
    Suggestions,
    Strategy,
}

impl SectionKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionKey::Overview => "overview",
            SectionKey::Timing => "timing",
            SectionKey::Content => "content",
            SectionKey::Suggestions => "suggestions",
            SectionKey::Strategy => "strategy",
        }
    }
}

pub type ReportSections = HashMap<SectionKey, String>;

#[derive(Debug, Clone, Copy)]
struct SectionRule {
    glyph: &'static str,
    keyword: &'static str,
    key: SectionKey,
    flushes_previous: bool,
}

/// Ordered marker vocabulary, evaluated top to bottom per line. A line opens a
/// section when it contains both the glyph and the keyword. The overview rule
/// restarts the buffer without flushing it, which drops whatever accumulated
/// since the previous header; reports generated upstream rely on that shape.
static SECTION_RULES: [SectionRule; 5] = [
    SectionRule {
        glyph: "\u{1F50D}",
        keyword: "Productivity",
        key: SectionKey::Overview,
        flushes_previous: false,
    },
    SectionRule {
        glyph: "\u{23F1}\u{FE0F}",
        keyword: "Timing",
        key: SectionKey::Timing,
        flushes_previous: true,
    },
    SectionRule {
        glyph: "\u{1F4CA}",
        keyword: "Content",
        key: SectionKey::Content,
        flushes_previous: true,
    },
    SectionRule {
        glyph: "\u{1F4A1}",
        keyword: "Actionable",
        key: SectionKey::Suggestions,
        flushes_previous: true,
    },
    SectionRule {
        glyph: "\u{1F3AF}",
        keyword: "Focus",
        key: SectionKey::Strategy,
        flushes_previous: true,
    },
];

fn matching_rule(line: &str) -> Option<&'static SectionRule> {
    SECTION_RULES
        .iter()
        .find(|rule| line.contains(rule.glyph) && line.contains(rule.keyword))
}

/// Partitions a report into labeled sections. Total over any input: lines
/// before the first header accumulate under `overview`, empty buffers are never
/// flushed, so absent sections simply do not appear and the empty input yields
/// the empty mapping.
pub fn split_report_sections(report: &str) -> ReportSections {
    let mut sections = ReportSections::new();
    let mut current_key = SectionKey::Overview;
    let mut buffer = String::new();

    for line in report.lines() {
        match matching_rule(line) {
            Some(rule) => {
                if rule.flushes_previous && !buffer.is_empty() {
                    sections.insert(current_key, buffer.clone());
                }
                buffer.clear();
                buffer.push_str(line);
                buffer.push('\n');
                current_key = rule.key;
            }
            None => {
                buffer.push_str(line);
                buffer.push('\n');
            }
        }
    }

    if !buffer.is_empty() {
        sections.insert(current_key, buffer);
    }
    sections
}

/// Memoizes the split by input identity, the report text only changes when a
/// new analysis comes back from the backend.
#[derive(Debug, Default)]
pub struct SectionSplitCache {
    last: Mutex<Option<(String, ReportSections)>>,
}

impl SectionSplitCache {
    pub fn sections(&self, report: &str) -> ReportSections {
        let Ok(mut last) = self.last.lock() else {
            return split_report_sections(report);
        };
        if let Some((cached_report, cached_sections)) = last.as_ref() {
            if cached_report == report {
                return cached_sections.clone();
            }
        }
        let sections = split_report_sections(report);
        *last = Some((report.to_string(), sections.clone()));
        sections
    }
}
