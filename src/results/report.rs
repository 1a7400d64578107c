//! HTML report generation

use std::fmt::Write;

use crate::models::SuiteRun;

/// Report generator
pub struct ReportGenerator;

impl ReportGenerator {
    /// Render the standalone HTML report for a run
    pub fn html(run: &SuiteRun) -> String {
        let summary = &run.summary;
        let mut output = String::new();

        let _ = writeln!(
            output,
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Test Report - {title}</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 40px; background: #f5f5f5; }}
        .container {{ max-width: 1200px; margin: 0 auto; background: white; padding: 40px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }}
        h1 {{ color: #333; border-bottom: 2px solid #007bff; padding-bottom: 10px; }}
        h2 {{ color: #555; margin-top: 30px; }}
        table {{ width: 100%; border-collapse: collapse; margin: 20px 0; }}
        th, td {{ padding: 12px; text-align: left; border-bottom: 1px solid #ddd; vertical-align: top; }}
        th {{ background: #007bff; color: white; }}
        .passed {{ color: #28a745; font-weight: bold; }}
        .failed {{ color: #dc3545; font-weight: bold; }}
        .skipped {{ color: #6c757d; font-weight: bold; }}
        .stat-card {{ display: inline-block; background: #f8f9fa; padding: 20px; margin: 10px; border-radius: 8px; min-width: 120px; text-align: center; }}
        .stat-value {{ font-size: 24px; font-weight: bold; color: #007bff; }}
        .stat-label {{ color: #666; font-size: 14px; }}
        pre {{ white-space: pre-wrap; margin: 0; font-size: 12px; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>{title}</h1>

        <h2>Summary</h2>"#,
            title = escape_html(&summary.suite_name),
        );

        for (value, label) in [
            (summary.total.to_string(), "Total"),
            (summary.passed.to_string(), "Passed"),
            (summary.failed.to_string(), "Failed"),
            (summary.skipped.to_string(), "Skipped"),
            (format!("{:.1}%", summary.pass_rate()), "Pass Rate"),
            (summary.duration_display(), "Duration"),
        ] {
            let _ = writeln!(
                output,
                r#"        <div class="stat-card">
            <div class="stat-value">{value}</div>
            <div class="stat-label">{label}</div>
        </div>"#
            );
        }

        let _ = writeln!(
            output,
            r#"
        <h2>Test Results</h2>
        <table>
            <tr>
                <th>Section</th>
                <th>Test</th>
                <th>Case</th>
                <th>Outcome</th>
                <th>Duration</th>
                <th>Message</th>
            </tr>"#
        );

        for result in &run.results {
            let case = result
                .case_id
                .map(|id| format!("C{id}"))
                .unwrap_or_default();
            let message = result.message.as_deref().map(escape_html).unwrap_or_default();
            let _ = writeln!(
                output,
                r#"            <tr>
                <td>{}</td>
                <td>{}</td>
                <td>{}</td>
                <td class="{}">{}</td>
                <td>{}ms</td>
                <td><pre>{}</pre></td>
            </tr>"#,
                escape_html(&result.section),
                escape_html(&result.name),
                case,
                result.outcome.as_str(),
                result.outcome,
                result.duration_ms,
                message
            );
        }

        let _ = writeln!(
            output,
            r#"        </table>

        <h2>Run Details</h2>
        <table>
            <tr><th>Property</th><th>Value</th></tr>
            <tr><td>Run ID</td><td><code>{}</code></td></tr>
            <tr><td>Build Version</td><td>{}</td></tr>
            <tr><td>Branch</td><td>{}</td></tr>
            <tr><td>Triggered By</td><td>{}</td></tr>
            <tr><td>Executed</td><td>{}</td></tr>
            <tr><td>Tool Version</td><td>{}</td></tr>
        </table>
    </div>
</body>
</html>"#,
            summary.run_id,
            escape_html(&summary.build_version),
            escape_html(&summary.branch),
            escape_html(&summary.triggered_by),
            summary.execution_date(),
            env!("CARGO_PKG_VERSION")
        );

        output
    }
}

fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
