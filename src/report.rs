use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{DepartmentSummary, EscalationRecord};

const UNASSIGNED: &str = "Unassigned";

pub fn summarize_by_department(records: &[EscalationRecord]) -> Vec<DepartmentSummary> {
    let mut map: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    for record in records {
        let department = record.department_name.as_deref().unwrap_or(UNASSIGNED);
        *map.entry(department.to_string()).or_insert(0) += 1;
    }

    let mut summaries: Vec<DepartmentSummary> = map
        .into_iter()
        .map(|(department, count)| DepartmentSummary { department, count })
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.department.cmp(&b.department)));
    summaries
}

pub fn build_report(
    since: DateTime<Utc>,
    records: &[EscalationRecord],
    pending_overdue: i64,
) -> String {
    let summaries = summarize_by_department(records);

    let mut output = String::new();

    let _ = writeln!(output, "# SLA Escalation Report");
    let _ = writeln!(
        output,
        "Automatic escalations since {} ({} total, {} overdue awaiting the next sweep)",
        since.format("%Y-%m-%d %H:%M UTC"),
        records.len(),
        pending_overdue
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Escalations by Department");

    if summaries.is_empty() {
        let _ = writeln!(output, "No escalations recorded for this window.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(output, "- {}: {} escalations", summary.department, summary.count);
        }
    }

    let mut recent = records.to_vec();
    recent.sort_by(|a, b| b.escalated_at.cmp(&a.escalated_at));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Escalations");

    if recent.is_empty() {
        let _ = writeln!(output, "No escalations recorded for this window.");
    } else {
        for record in recent.iter().take(10) {
            let from = record
                .from_status
                .map(|status| status.as_str())
                .unwrap_or("UNKNOWN");
            let _ = writeln!(
                output,
                "- {} [{}] ({}) escalated from {} on {}",
                record.title,
                record.grievance_id,
                record.department_name.as_deref().unwrap_or(UNASSIGNED),
                from,
                record.escalated_at.format("%Y-%m-%d %H:%M")
            );
        }
    }

    output
}
