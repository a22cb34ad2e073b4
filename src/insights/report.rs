//! Renders analysis output as a plain-text report or a standalone HTML
//! page. Both renderers are pure string builders over the aggregate
//! structs; neither touches the filesystem.

use super::{Helpfulness, PatternUsage, SessionReport, Trends};
use std::fmt::Write;

/// Formats a duration for human eyes: `< 1m`, `14m 0s`, `2h 15m`, `3d 5h`.
fn format_duration(seconds: i64) -> String {
    if seconds <= 0 {
        return "< 1m".to_string();
    }
    if seconds < 3600 {
        return format!("{}m {}s", seconds / 60, seconds % 60);
    }
    if seconds < 86400 {
        return format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60);
    }
    format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn title_case_metric(metric: &str) -> String {
    metric
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds the multi-line plain-text report.
#[must_use]
pub fn format_insights_report(
    sessions: &SessionReport,
    helpfulness: &Helpfulness,
    top_patterns: &[PatternUsage],
    trends: &Trends,
) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push("ACE Insights Report".to_string());
    lines.push("=".repeat(40));
    lines.push(String::new());

    if sessions.total_sessions == 0 {
        lines.push("Sessions: No data available".to_string());
    } else {
        lines.push(format!(
            "Sessions: {} total, {} active (with task execution)",
            sessions.total_sessions, sessions.active_sessions
        ));
        lines.push(String::new());

        for s in &sessions.sessions {
            let status = match s.success {
                Some(true) => "OK",
                Some(false) => "FAIL",
                None => "---",
            };
            let agent_tag = if s.agent_type == "main" {
                String::new()
            } else {
                format!(" [{}]", s.agent_type)
            };
            let short_sid: String = s.session_id.chars().take(12).collect();
            lines.push(format!(
                "  [{status}]{agent_tag} {short_sid}... ({})",
                format_duration(s.duration_seconds)
            ));

            let mut prompts = s
                .user_prompts
                .iter()
                .take(2)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            if s.user_prompts.len() > 2 {
                prompts.push_str("...");
            }
            if !prompts.is_empty() {
                lines.push(format!("         Task: {prompts}"));
            }
            lines.push(format!(
                "         Patterns: {} injected, {} used | Tools: {} | Domains: {}",
                s.patterns_injected,
                s.patterns_used,
                s.tools_executed,
                s.domains.join(", ")
            ));
        }
    }

    lines.push(String::new());
    lines.push("Pattern Helpfulness".to_string());
    lines.push("-".repeat(40));

    if helpfulness.tasks_with_patterns == 0 && helpfulness.tasks_without_patterns == 0 {
        lines.push("  No task execution data available".to_string());
    } else {
        lines.push(format!(
            "  Tasks with patterns:    {} (success: {}%)",
            helpfulness.tasks_with_patterns, helpfulness.success_rate_with_patterns
        ));
        lines.push(format!(
            "  Tasks without patterns: {} (success: {}%)",
            helpfulness.tasks_without_patterns, helpfulness.success_rate_without_patterns
        ));
        let sign = if helpfulness.pattern_advantage >= 0.0 {
            "+"
        } else {
            ""
        };
        lines.push(format!(
            "  Pattern advantage:      {sign}{}pp",
            helpfulness.pattern_advantage
        ));
        lines.push(format!(
            "  Avg patterns/task:      {}",
            helpfulness.avg_patterns_per_task
        ));
        lines.push(format!(
            "  Avg confidence:         {:.1}%",
            helpfulness.avg_confidence * 100.0
        ));
    }

    lines.push(String::new());
    lines.push("Top Patterns".to_string());
    lines.push("-".repeat(40));

    if top_patterns.is_empty() {
        lines.push("  No pattern usage data available".to_string());
    } else {
        for (i, p) in top_patterns.iter().take(10).enumerate() {
            let plural = if p.sessions == 1 { "" } else { "s" };
            lines.push(format!(
                "  {}. {} (used {}x across {} session{plural})",
                i + 1,
                p.pattern_id,
                p.usage_count,
                p.sessions
            ));
        }
    }

    lines.push(String::new());
    lines.push("Trends (current vs previous period)".to_string());
    lines.push("-".repeat(40));

    let curr = &trends.current_period;
    let rows: [(&str, String, &str, &str); 4] = [
        (
            "searches",
            curr.searches.to_string(),
            "",
            &trends.changes.searches,
        ),
        ("tasks", curr.tasks.to_string(), "", &trends.changes.tasks),
        (
            "success_rate",
            curr.success_rate.to_string(),
            "%",
            &trends.changes.success_rate,
        ),
        (
            "patterns_injected",
            curr.patterns_injected.to_string(),
            "",
            &trends.changes.patterns_injected,
        ),
    ];
    for (metric, value, unit, change) in rows {
        let indicator = if change == "N/A" {
            ""
        } else if change.starts_with('+') {
            " ^"
        } else if change.starts_with('-') {
            " v"
        } else {
            ""
        };
        lines.push(format!(
            "  {}: {value}{unit} ({change}){indicator}",
            title_case_metric(metric)
        ));
    }

    lines.push(String::new());
    lines.join("\n")
}

/// Builds a self-contained HTML report suitable for opening in a browser
/// or sharing. No external assets beyond a web font.
#[must_use]
pub fn format_insights_html(
    sessions: &SessionReport,
    helpfulness: &Helpfulness,
    top_patterns: &[PatternUsage],
    trends: &Trends,
    hours: i64,
) -> String {
    let mut session_rows = String::new();
    for s in &sessions.sessions {
        let (status_class, status_text) = match s.success {
            Some(true) => ("status-ok", "OK"),
            Some(false) => ("status-fail", "FAIL"),
            None => ("status-pending", "---"),
        };
        let prompts = if s.user_prompts.is_empty() {
            "<em>No prompt recorded</em>".to_string()
        } else {
            s.user_prompts
                .iter()
                .take(2)
                .map(|p| {
                    let truncated: String = p.chars().take(80).collect();
                    html_escape(&truncated)
                })
                .collect::<Vec<_>>()
                .join(", ")
        };
        let domains = if s.domains.is_empty() {
            "none".to_string()
        } else {
            s.domains
                .iter()
                .map(|d| html_escape(d))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let short_sid: String = s.session_id.chars().take(16).collect();
        let learning = if s.learning_sent { "Yes" } else { "No" };
        let _ = write!(
            session_rows,
            r#"
      <div class="session-card">
        <div class="session-header">
          <span class="session-status {status_class}">{status_text}</span>
          <span class="agent-badge">{agent}</span>
          <span class="session-id">{sid}...</span>
          <span class="session-duration">{duration}</span>
        </div>
        <div class="session-task">{prompts}</div>
        <div class="session-metrics">
          <span>Patterns: {injected} injected, {used} used</span>
          <span>Tools: {tools}</span>
          <span>Domains: {domains}</span>
          <span>Learning: {learning}</span>
        </div>
      </div>"#,
            agent = html_escape(&s.agent_type),
            sid = html_escape(&short_sid),
            duration = format_duration(s.duration_seconds),
            injected = s.patterns_injected,
            used = s.patterns_used,
            tools = s.tools_executed,
        );
    }
    if session_rows.is_empty() {
        session_rows = r#"<div class="empty">No session data yet</div>"#.to_string();
    }

    let mut pattern_rows = String::new();
    let max_usage = top_patterns.first().map_or(1, |p| p.usage_count.max(1));
    for p in top_patterns.iter().take(10) {
        let pct = p.usage_count * 100 / max_usage;
        let _ = write!(
            pattern_rows,
            r#"
      <div class="bar-row">
        <span class="bar-label">{name}</span>
        <div class="bar-track"><div class="bar-fill" style="width:{pct}%"></div></div>
        <span class="bar-value">{count}x</span>
        <span class="bar-sessions">{sessions}s</span>
      </div>"#,
            name = html_escape(&p.pattern_name),
            count = p.usage_count,
            sessions = p.sessions,
        );
    }
    if pattern_rows.is_empty() {
        pattern_rows = r#"<div class="empty">No pattern usage data yet</div>"#.to_string();
    }

    let trend_cell = |change: &str| -> String {
        if change == "N/A" {
            r#"<span class="trend-na">N/A</span>"#.to_string()
        } else if change.starts_with('+') {
            format!(r#"<span class="trend-up">{}</span>"#, html_escape(change))
        } else if change.starts_with('-') {
            format!(r#"<span class="trend-down">{}</span>"#, html_escape(change))
        } else {
            format!("<span>{}</span>", html_escape(change))
        }
    };

    let advantage = helpfulness.pattern_advantage;
    let (adv_class, adv_label) = if advantage > 10.0 {
        ("adv-positive", "Strong positive impact")
    } else if advantage > 0.0 {
        ("adv-positive", "Positive impact")
    } else if advantage == 0.0 {
        ("adv-neutral", "Neutral")
    } else {
        ("adv-negative", "Needs improvement")
    };
    let adv_sign = if advantage >= 0.0 { "+" } else { "" };

    let generated = chrono::Utc::now().format("%Y-%m-%d %H:%M UTC");
    let curr = &trends.current_period;

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>ACE Insights</title>
  <style>
    * {{ box-sizing: border-box; margin: 0; padding: 0; }}
    body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; background: #f8fafc; color: #334155; line-height: 1.65; padding: 48px 24px; }}
    .container {{ max-width: 800px; margin: 0 auto; }}
    h1 {{ font-size: 32px; font-weight: 700; color: #0f172a; margin-bottom: 8px; }}
    h2 {{ font-size: 20px; font-weight: 600; color: #0f172a; margin-top: 48px; margin-bottom: 16px; }}
    .subtitle {{ color: #64748b; font-size: 15px; margin-bottom: 32px; }}
    .stat-grid {{ display: grid; grid-template-columns: repeat(4, 1fr); gap: 16px; }}
    .stat-card {{ background: #fff; border: 1px solid #e2e8f0; border-radius: 12px; padding: 20px; }}
    .stat-value {{ font-size: 28px; font-weight: 700; color: #0f172a; }}
    .stat-label {{ font-size: 13px; color: #64748b; }}
    .advantage {{ border-radius: 12px; padding: 20px; margin-top: 16px; font-weight: 600; }}
    .adv-positive {{ background: #ecfdf5; color: #047857; }}
    .adv-neutral {{ background: #f1f5f9; color: #475569; }}
    .adv-negative {{ background: #fef2f2; color: #b91c1c; }}
    .session-card {{ background: #fff; border: 1px solid #e2e8f0; border-radius: 12px; padding: 16px 20px; margin-bottom: 12px; }}
    .session-header {{ display: flex; gap: 12px; align-items: center; margin-bottom: 8px; }}
    .session-status {{ font-weight: 700; font-size: 13px; padding: 2px 8px; border-radius: 6px; }}
    .status-ok {{ background: #ecfdf5; color: #047857; }}
    .status-fail {{ background: #fef2f2; color: #b91c1c; }}
    .status-pending {{ background: #f1f5f9; color: #64748b; }}
    .agent-badge {{ font-size: 12px; background: #eef2ff; color: #4338ca; padding: 2px 8px; border-radius: 6px; }}
    .session-id {{ font-family: ui-monospace, monospace; font-size: 13px; color: #64748b; }}
    .session-duration {{ margin-left: auto; font-size: 13px; color: #64748b; }}
    .session-task {{ font-size: 14px; margin-bottom: 8px; }}
    .session-metrics {{ display: flex; gap: 16px; flex-wrap: wrap; font-size: 13px; color: #64748b; }}
    .bar-row {{ display: flex; align-items: center; gap: 12px; margin-bottom: 8px; }}
    .bar-label {{ width: 220px; font-size: 13px; overflow: hidden; text-overflow: ellipsis; white-space: nowrap; }}
    .bar-track {{ flex: 1; height: 10px; background: #e2e8f0; border-radius: 5px; overflow: hidden; }}
    .bar-fill {{ height: 100%; background: #6366f1; }}
    .bar-value, .bar-sessions {{ font-size: 13px; color: #64748b; width: 40px; }}
    .trend-up {{ color: #047857; font-weight: 600; }}
    .trend-down {{ color: #b91c1c; font-weight: 600; }}
    .trend-na {{ color: #94a3b8; }}
    .empty {{ color: #94a3b8; font-size: 14px; padding: 16px 0; }}
    .footer {{ margin-top: 48px; font-size: 13px; color: #94a3b8; }}
  </style>
</head>
<body>
  <div class="container">
    <h1>ACE Insights</h1>
    <div class="subtitle">Last {hours} hours &middot; {total} sessions, {active} active</div>

    <h2>Pattern Helpfulness</h2>
    <div class="stat-grid">
      <div class="stat-card"><div class="stat-value">{tasks_with}</div><div class="stat-label">Tasks with patterns ({rate_with}% success)</div></div>
      <div class="stat-card"><div class="stat-value">{tasks_without}</div><div class="stat-label">Tasks without patterns ({rate_without}% success)</div></div>
      <div class="stat-card"><div class="stat-value">{avg_ppt}</div><div class="stat-label">Avg patterns per task</div></div>
      <div class="stat-card"><div class="stat-value">{avg_conf:.1}%</div><div class="stat-label">Avg confidence</div></div>
    </div>
    <div class="advantage {adv_class}">{adv_label}: {adv_sign}{advantage}pp pattern advantage</div>

    <h2>Sessions</h2>
    {session_rows}

    <h2>Top Patterns</h2>
    {pattern_rows}

    <h2>Trends</h2>
    <div class="stat-grid">
      <div class="stat-card"><div class="stat-value">{searches}</div><div class="stat-label">Searches {searches_change}</div></div>
      <div class="stat-card"><div class="stat-value">{tasks}</div><div class="stat-label">Tasks {tasks_change}</div></div>
      <div class="stat-card"><div class="stat-value">{success_rate}%</div><div class="stat-label">Success rate {rate_change}</div></div>
      <div class="stat-card"><div class="stat-value">{injected}</div><div class="stat-label">Patterns injected {injected_change}</div></div>
    </div>

    <div class="footer">Generated {generated}</div>
  </div>
</body>
</html>
"#,
        total = sessions.total_sessions,
        active = sessions.active_sessions,
        tasks_with = helpfulness.tasks_with_patterns,
        tasks_without = helpfulness.tasks_without_patterns,
        rate_with = helpfulness.success_rate_with_patterns,
        rate_without = helpfulness.success_rate_without_patterns,
        avg_ppt = helpfulness.avg_patterns_per_task,
        avg_conf = helpfulness.avg_confidence * 100.0,
        searches = curr.searches,
        tasks = curr.tasks,
        success_rate = curr.success_rate,
        injected = curr.patterns_injected,
        searches_change = trend_cell(&trends.changes.searches),
        tasks_change = trend_cell(&trends.changes.tasks),
        rate_change = trend_cell(&trends.changes.success_rate),
        injected_change = trend_cell(&trends.changes.patterns_injected),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::{analyze_sessions, calculate_helpfulness, calculate_trends, get_top_patterns};
    use chrono::{TimeZone, Utc};

    fn sample_entries() -> Vec<serde_json::Value> {
        vec![
            serde_json::json!({
                "event": "search", "timestamp": "2026-02-02T10:00:00Z",
                "session_id": "S1", "user_prompt": "fix the auth bug",
                "patterns_injected": 3, "avg_confidence": 0.82,
                "domains": ["auth"],
                "top_patterns": [{"id": "ctx-jwt", "confidence": 0.9, "helpful": 4,
                                  "harmful": 0, "domain": "auth", "section": "strategies"}]
            }),
            serde_json::json!({
                "event": "execution", "timestamp": "2026-02-02T10:05:00Z",
                "session_id": "S1", "patterns_used_count": 1, "pattern_ids": ["ctx-jwt"],
                "tools_executed": 6, "state_changing_tools": 3, "success": true,
                "execution_time_seconds": 40.0, "learning_sent": true, "agent_type": "main"
            }),
        ]
    }

    #[test]
    fn test_text_report_sections() {
        let entries = sample_entries();
        let now = Utc.with_ymd_and_hms(2026, 2, 2, 12, 0, 0).unwrap();
        let report = format_insights_report(
            &analyze_sessions(&entries),
            &calculate_helpfulness(&entries),
            &get_top_patterns(&entries, 10),
            &calculate_trends(&entries, 24, 24, now),
        );

        assert!(report.contains("ACE Insights Report"));
        assert!(report.contains("Sessions: 1 total, 1 active (with task execution)"));
        assert!(report.contains("Task: fix the auth bug"));
        assert!(report.contains("Patterns: 3 injected, 1 used | Tools: 6 | Domains: auth"));
        assert!(report.contains("1. ctx-jwt (used 1x across 1 session)"));
        assert!(report.contains("Success Rate: 100%"));
    }

    #[test]
    fn test_text_report_empty_log() {
        let now = Utc.with_ymd_and_hms(2026, 2, 2, 12, 0, 0).unwrap();
        let report = format_insights_report(
            &analyze_sessions(&[]),
            &calculate_helpfulness(&[]),
            &get_top_patterns(&[], 10),
            &calculate_trends(&[], 24, 24, now),
        );
        assert!(report.contains("Sessions: No data available"));
        assert!(report.contains("No task execution data available"));
        assert!(report.contains("No pattern usage data available"));
        assert!(report.contains("(N/A)"));
    }

    #[test]
    fn test_html_report_escapes_and_renders() {
        let mut entries = sample_entries();
        entries[0]["user_prompt"] = serde_json::json!("fix <script>alert(1)</script>");
        let now = Utc.with_ymd_and_hms(2026, 2, 2, 12, 0, 0).unwrap();

        let html = format_insights_html(
            &analyze_sessions(&entries),
            &calculate_helpfulness(&entries),
            &get_top_patterns(&entries, 10),
            &calculate_trends(&entries, 24, 24, now),
            24,
        );
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("auth / strategies"));
        assert!(html.contains("Last 24 hours"));
    }

    #[test]
    fn test_format_duration_buckets() {
        assert_eq!(format_duration(0), "< 1m");
        assert_eq!(format_duration(59), "0m 59s");
        assert_eq!(format_duration(840), "14m 0s");
        assert_eq!(format_duration(8100), "2h 15m");
        assert_eq!(format_duration(277_200), "3d 5h");
    }
}
