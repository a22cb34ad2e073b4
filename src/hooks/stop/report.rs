//! User-visible learning feedback formatting.

use crate::config::Verbosity;
use crate::models::LearningStats;

/// The fallback hint appended to any learn failure.
pub const MANUAL_CAPTURE_HINT: &str = "   You can manually capture with: /ace-learn";

/// Formats learning statistics into message lines for the configured
/// verbosity.
///
/// Compact mode is a single counter line; detailed mode is a short block
/// with patterns, quality, sections, and timing. Empty statistics collapse
/// to the bare confirmation in both modes.
#[must_use]
pub fn format_learning_message(stats: Option<&LearningStats>, verbosity: Verbosity) -> Vec<String> {
    let Some(stats) = stats else {
        return vec!["✅ [ACE] Learning captured!".to_string()];
    };

    match verbosity {
        Verbosity::Compact => format_compact(stats),
        Verbosity::Detailed => format_detailed(stats),
    }
}

fn format_compact(stats: &LearningStats) -> Vec<String> {
    let mut parts = Vec::new();
    if stats.patterns_created > 0 {
        parts.push(format!("📚 +{} patterns", stats.patterns_created));
    }
    let merged = stats.patterns_merged + stats.patterns_updated;
    if merged > 0 {
        parts.push(format!("🔄 {merged} merged"));
    }
    if stats.average_confidence > 0.0 {
        parts.push(format!(
            "⭐ {}% quality",
            (stats.average_confidence * 100.0) as i64
        ));
    }

    if parts.is_empty() {
        vec!["✅ [ACE] Learning captured!".to_string()]
    } else {
        vec![format!("✅ [ACE] {}", parts.join(" "))]
    }
}

fn format_detailed(stats: &LearningStats) -> Vec<String> {
    let mut lines = vec!["✅ [ACE] Learning captured!".to_string()];

    let has_detail = stats.patterns_created > 0
        || stats.patterns_updated > 0
        || stats.patterns_pruned > 0
        || stats.average_confidence > 0.0
        || stats.analysis_time_seconds > 0.0;
    if !has_detail {
        return lines;
    }

    lines.push(String::new());
    lines.push("📚 ACE Learning:".to_string());

    let mut pattern_parts = Vec::new();
    if stats.patterns_created > 0 {
        pattern_parts.push(format!("📝 +{} new", stats.patterns_created));
    }
    if stats.patterns_updated > 0 {
        pattern_parts.push(format!("🔄 {} updated", stats.patterns_updated));
    }
    if stats.patterns_pruned > 0 {
        pattern_parts.push(format!("🧹 {} pruned", stats.patterns_pruned));
    }
    if !pattern_parts.is_empty() {
        lines.push(format!("   {}", pattern_parts.join("  ")));
    }

    let mut quality_parts = Vec::new();
    if stats.average_confidence > 0.0 {
        quality_parts.push(format!(
            "⭐ {}% quality",
            (stats.average_confidence * 100.0) as i64
        ));
    }
    if stats.helpful_delta != 0 {
        let sign = if stats.helpful_delta > 0 { "+" } else { "" };
        quality_parts.push(format!("👍 {sign}{} helpful", stats.helpful_delta));
    }
    if !quality_parts.is_empty() {
        lines.push(format!("   {}", quality_parts.join("  ")));
    }

    let sections: Vec<String> = stats
        .by_section
        .iter()
        .filter(|&(_, &count)| count > 0)
        .map(|(name, _)| title_case(name.split('_').next().unwrap_or(name)))
        .collect();
    if !sections.is_empty() {
        lines.push(format!("   📂 {}", sections.join(", ")));
    }

    if stats.analysis_time_seconds > 0.0 {
        lines.push(format!("   ⏱️ {:.1}s analysis", stats.analysis_time_seconds));
    }

    lines
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().collect::<String>() + chars.as_str()
    })
}

/// Failure message lines for a failed or timed-out learn call.
#[must_use]
pub fn format_learn_failure(reason: &str) -> Vec<String> {
    vec![
        format!("⚠️ [ACE] Learning capture failed: {reason}"),
        MANUAL_CAPTURE_HINT.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> LearningStats {
        LearningStats {
            patterns_created: 2,
            patterns_updated: 1,
            patterns_pruned: 1,
            average_confidence: 0.85,
            helpful_delta: 3,
            by_section: [("strategies_core".to_string(), 2), ("empty".to_string(), 0)]
                .into_iter()
                .collect(),
            analysis_time_seconds: 4.2,
            ..LearningStats::default()
        }
    }

    #[test]
    fn test_compact_single_line() {
        let lines = format_learning_message(Some(&stats()), Verbosity::Compact);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("+2 patterns"));
        assert!(lines[0].contains("1 merged"));
        assert!(lines[0].contains("85% quality"));
    }

    #[test]
    fn test_detailed_block() {
        let lines = format_learning_message(Some(&stats()), Verbosity::Detailed);
        let joined = lines.join("\n");
        assert!(joined.starts_with("✅ [ACE] Learning captured!"));
        assert!(joined.contains("+2 new"));
        assert!(joined.contains("1 updated"));
        assert!(joined.contains("1 pruned"));
        assert!(joined.contains("+3 helpful"));
        assert!(joined.contains("Strategies"));
        assert!(!joined.contains("Empty"));
        assert!(joined.contains("4.2s analysis"));
    }

    #[test]
    fn test_empty_stats_collapse() {
        let empty = LearningStats::default();
        assert_eq!(
            format_learning_message(Some(&empty), Verbosity::Detailed),
            vec!["✅ [ACE] Learning captured!"]
        );
        assert_eq!(
            format_learning_message(None, Verbosity::Compact),
            vec!["✅ [ACE] Learning captured!"]
        );
    }

    #[test]
    fn test_failure_lines_carry_hint() {
        let lines = format_learn_failure("connection refused");
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("/ace-learn"));
    }
}
