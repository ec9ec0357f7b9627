use super::types::{LogStatus, ReportDocument, ReportEntry};
use crate::error::Result;
use std::path::Path;

pub fn write(document: &ReportDocument, path: &Path) -> Result<()> {
    std::fs::write(path, generate_html(document))?;
    log::info!("HTML report saved to: {}", path.display());
    Ok(())
}

fn status_class(status: LogStatus) -> &'static str {
    match status {
        LogStatus::Pass => "pass",
        LogStatus::Fail => "fail",
        LogStatus::Skip => "skip",
        LogStatus::Warning => "warning",
        LogStatus::Info => "info",
    }
}

fn entry_html(entry: &ReportEntry) -> String {
    let status = entry.status();

    let mut logs_html = String::new();
    for line in &entry.logs {
        logs_html.push_str(&format!(
            r#"
                <div class="log {class}">
                    <span class="time">{time}</span>
                    <span class="badge">{label}</span>
                    <span class="message">{message}</span>
                </div>"#,
            class = status_class(line.status),
            time = html_escape(&line.timestamp),
            label = line.status.label(),
            message = html_escape(&line.message),
        ));
    }

    let mut shots_html = String::new();
    for shot in &entry.screenshots {
        let escaped = html_escape(shot);
        shots_html.push_str(&format!(
            r##"<a href="#" class="screenshot-link" onclick="showScreenshot('{escaped}')">📸 {escaped}</a>"##
        ));
    }

    format!(
        r#"
        <div class="entry {class}">
            <div class="entry-header">
                <h3>{name}</h3>
                <span class="badge">{label}</span>
            </div>
            <div class="logs">{logs_html}
            </div>
            <div class="screenshots">{shots_html}</div>
        </div>"#,
        class = status_class(status),
        name = html_escape(&entry.test_name),
        label = status.label(),
    )
}

pub fn generate_html(document: &ReportDocument) -> String {
    let summary = &document.summary;
    let pass_rate = if summary.total > 0 {
        (summary.passed as f64 / summary.total as f64 * 100.0) as u32
    } else {
        0
    };

    let entries_html: String = document.entries.iter().map(entry_html).collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Test Run Report</title>
    <style>
        :root {{
            --bg: #0f172a;
            --card: #1e293b;
            --border: #334155;
            --text: #f1f5f9;
            --muted: #94a3b8;
            --green: #22c55e;
            --red: #ef4444;
            --amber: #f59e0b;
            --blue: #3b82f6;
        }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: var(--bg);
            color: var(--text);
            margin: 0;
            padding: 2rem;
        }}
        .container {{ max-width: 1100px; margin: 0 auto; }}
        header {{ display: flex; justify-content: space-between; align-items: flex-end; margin-bottom: 2rem; }}
        h1 {{ margin: 0; font-size: 2rem; }}
        .summary {{ display: grid; grid-template-columns: repeat(4, 1fr); gap: 1rem; margin-bottom: 1.5rem; }}
        .stat {{ background: var(--card); border: 1px solid var(--border); border-radius: 0.75rem; padding: 1rem; text-align: center; }}
        .stat-value {{ font-size: 1.75rem; font-weight: 700; }}
        .stat-label {{ color: var(--muted); font-size: 0.8rem; text-transform: uppercase; }}
        .stat.pass .stat-value {{ color: var(--green); }}
        .stat.fail .stat-value {{ color: var(--red); }}
        .stat.skip .stat-value {{ color: var(--amber); }}
        .progress-bar {{ height: 0.5rem; background: var(--border); border-radius: 9999px; overflow: hidden; margin-bottom: 2rem; }}
        .progress-fill {{ height: 100%; background: var(--green); }}
        .entry {{ background: var(--card); border: 1px solid var(--border); border-left: 4px solid var(--muted); border-radius: 0.75rem; margin-bottom: 1rem; padding: 1rem 1.25rem; }}
        .entry.pass {{ border-left-color: var(--green); }}
        .entry.fail {{ border-left-color: var(--red); }}
        .entry.skip, .entry.warning {{ border-left-color: var(--amber); }}
        .entry-header {{ display: flex; justify-content: space-between; align-items: center; }}
        .entry-header h3 {{ margin: 0; font-size: 1.05rem; }}
        .log {{ display: flex; gap: 0.75rem; padding: 0.35rem 0; font-size: 0.875rem; }}
        .time {{ color: var(--muted); font-family: monospace; }}
        .badge {{ font-size: 0.7rem; font-weight: 700; padding: 0.1rem 0.5rem; border-radius: 9999px; background: var(--border); }}
        .pass > .badge, .log.pass .badge {{ background: rgba(34, 197, 94, 0.2); color: var(--green); }}
        .fail > .badge, .log.fail .badge {{ background: rgba(239, 68, 68, 0.2); color: var(--red); }}
        .log.skip .badge, .log.warning .badge {{ background: rgba(245, 158, 11, 0.2); color: var(--amber); }}
        .entry-header .badge {{ font-size: 0.75rem; }}
        .screenshot-link {{ display: inline-block; margin-top: 0.5rem; margin-right: 1rem; color: var(--blue); font-size: 0.8rem; text-decoration: none; }}
        .meta {{ margin-top: 3rem; color: var(--muted); font-size: 0.8rem; text-align: center; }}
        #modal {{ display: none; position: fixed; inset: 0; background: rgba(0, 0, 0, 0.9); align-items: center; justify-content: center; }}
        #modal.active {{ display: flex; }}
        #modal img {{ max-width: 90%; max-height: 90%; border-radius: 0.5rem; }}
    </style>
</head>
<body>
    <div class="container">
        <header>
            <h1>Test Run Report</h1>
            <div>{duration}</div>
        </header>

        <div class="summary">
            <div class="stat"><div class="stat-value">{total}</div><div class="stat-label">Tests</div></div>
            <div class="stat pass"><div class="stat-value">{passed}</div><div class="stat-label">Passed</div></div>
            <div class="stat fail"><div class="stat-value">{failed}</div><div class="stat-label">Failed</div></div>
            <div class="stat skip"><div class="stat-value">{skipped}</div><div class="stat-label">Skipped</div></div>
        </div>

        <div class="progress-bar"><div class="progress-fill" style="width: {pass_rate}%"></div></div>
        {entries_html}

        <div class="meta">Run {run_id} · Generated {generated}</div>
    </div>

    <div id="modal" onclick="this.classList.remove('active')">
        <img id="modal-img" src="" alt="Screenshot">
    </div>

    <script>
        function showScreenshot(path) {{
            document.getElementById('modal-img').src = path;
            document.getElementById('modal').classList.add('active');
            event.preventDefault();
        }}
    </script>
</body>
</html>"#,
        duration = format_duration(summary.duration_ms),
        total = summary.total,
        passed = summary.passed,
        failed = summary.failed,
        skipped = summary.skipped,
        run_id = html_escape(&document.run_id),
        generated = html_escape(&document.generated_at),
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}m {}s", ms / 60_000, (ms % 60_000) / 1000)
    }
}
