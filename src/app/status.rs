use crate::store::{CopyRecord, RunRecord};
use crate::ui::style;

fn copy_line(copy: &CopyRecord) -> String {
    format!(
        "    {:<16} {:<14} {:<8} {}",
        copy.kind,
        copy.category,
        style::cyan(&copy.host),
        copy.location
    )
}

pub fn render_run(run: &RunRecord) -> String {
    let mut lines = vec![
        style::header(format!("◆ Run {}", run.run_id())),
        String::new(),
        format!("  status       {}", run.processing_status),
        format!("  started      {}", run.start_time.to_rfc3339()),
        format!(
            "  processed    {} on {}",
            run.processing_time
                .map_or_else(|| "-".to_string(), |t| t.to_rfc3339()),
            run.processing_host.as_deref().unwrap_or("-")
        ),
        String::new(),
        format!("  active copies ({})", run.active_copies.len()),
    ];
    lines.extend(run.active_copies.iter().map(copy_line));

    lines.push(String::new());
    lines.push(format!("  deleted copies ({})", run.deleted_copies.len()));
    for copy in &run.deleted_copies {
        lines.push(style::dim(format!(
            "    {:<16} {:<14} {:<8} removed {} by {}",
            copy.kind,
            copy.category,
            copy.host,
            copy.removed_at
                .map_or_else(|| "?".to_string(), |t| t.to_rfc3339()),
            copy.removed_by.as_deref().unwrap_or("?")
        )));
    }

    lines.join("\n")
}
