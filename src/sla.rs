use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::{GrievanceStatus, SlaRule};

/// True when a grievance is past its deadline and still open for escalation.
pub fn qualifies_for_escalation(
    status: GrievanceStatus,
    sla_due_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    match sla_due_at {
        Some(due) => due < now && !status.is_sweep_excluded(),
        None => false,
    }
}

/// Picks the rule for a new grievance: subcategory before category, and a
/// department-specific rule before a global one.
pub fn resolve_rule<'a>(
    rules: &'a [SlaRule],
    category: &str,
    subcategory: Option<&str>,
    department_id: Option<Uuid>,
) -> Option<&'a SlaRule> {
    subcategory
        .and_then(|key| best_match(rules, key, department_id))
        .or_else(|| best_match(rules, category, department_id))
}

fn best_match<'a>(
    rules: &'a [SlaRule],
    key: &str,
    department_id: Option<Uuid>,
) -> Option<&'a SlaRule> {
    let mut candidates = rules.iter().filter(|rule| {
        rule.category == key
            && (rule.department_id.is_none() || rule.department_id == department_id)
    });

    let first = candidates.next()?;
    if first.department_id.is_some() {
        return Some(first);
    }
    candidates
        .find(|rule| rule.department_id.is_some())
        .or(Some(first))
}

pub fn compute_sla_due_at(
    rules: &[SlaRule],
    category: &str,
    subcategory: Option<&str>,
    department_id: Option<Uuid>,
    filed_at: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let rule = resolve_rule(rules, category, subcategory, department_id)?;
    Duration::try_seconds(rule.duration_seconds)
        .and_then(|window| filed_at.checked_add_signed(window))
}

/// Longest SLA window a rule may define.
pub const MAX_SLA_SECONDS: i64 = 366 * 24 * 3600;

/// Seconds for an imported rule duration. Must be positive and at most
/// [`MAX_SLA_SECONDS`].
pub fn rule_duration_seconds(unit: DurationUnit, value: i64) -> anyhow::Result<i64> {
    let seconds = unit
        .to_seconds(value)
        .ok_or_else(|| anyhow::anyhow!("duration {value} {unit:?} is out of range"))?;
    if seconds <= 0 {
        anyhow::bail!("duration must be positive");
    }
    if seconds > MAX_SLA_SECONDS {
        anyhow::bail!("duration of {seconds}s exceeds the {MAX_SLA_SECONDS}s limit");
    }
    Ok(seconds)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationUnit {
    Seconds,
    Minutes,
    Hours,
}

impl DurationUnit {
    pub fn to_seconds(self, value: i64) -> Option<i64> {
        match self {
            DurationUnit::Seconds => Some(value),
            DurationUnit::Minutes => value.checked_mul(60),
            DurationUnit::Hours => value.checked_mul(3600),
        }
    }
}

impl FromStr for DurationUnit {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "SECONDS" => Ok(DurationUnit::Seconds),
            "MINUTES" => Ok(DurationUnit::Minutes),
            "HOURS" => Ok(DurationUnit::Hours),
            other => anyhow::bail!("unknown duration unit: {other}"),
        }
    }
}

pub fn format_duration(seconds: i64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours}h {minutes}m {secs}s")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EscalationRole, Priority};

    fn rule(category: &str, department_id: Option<Uuid>, duration_seconds: i64) -> SlaRule {
        SlaRule {
            id: Uuid::new_v4(),
            category: category.to_string(),
            priority: Priority::Normal,
            duration_seconds,
            escalation_role: EscalationRole::DeptHead,
            department_id,
        }
    }

    #[test]
    fn breach_requires_past_deadline_and_open_status() {
        let now = Utc::now();
        let past = Some(now - Duration::hours(1));
        let future = Some(now + Duration::hours(1));

        assert!(qualifies_for_escalation(GrievanceStatus::InProgress, past, now));
        assert!(qualifies_for_escalation(GrievanceStatus::Submitted, past, now));
        assert!(!qualifies_for_escalation(GrievanceStatus::InProgress, future, now));
        assert!(!qualifies_for_escalation(GrievanceStatus::InProgress, None, now));
        assert!(!qualifies_for_escalation(GrievanceStatus::Resolved, past, now));
        assert!(!qualifies_for_escalation(GrievanceStatus::Closed, past, now));
        assert!(!qualifies_for_escalation(GrievanceStatus::Escalated, past, now));
    }

    #[test]
    fn deadline_equal_to_now_is_not_breached() {
        let now = Utc::now();
        assert!(!qualifies_for_escalation(GrievanceStatus::Assigned, Some(now), now));
    }

    #[test]
    fn subcategory_rule_wins_over_category() {
        let rules = vec![rule("Roads", None, 3600), rule("Potholes", None, 600)];
        let found = resolve_rule(&rules, "Roads", Some("Potholes"), None).unwrap();
        assert_eq!(found.duration_seconds, 600);

        let fallback = resolve_rule(&rules, "Roads", Some("Signage"), None).unwrap();
        assert_eq!(fallback.duration_seconds, 3600);
    }

    #[test]
    fn department_rule_wins_over_global() {
        let dept = Uuid::new_v4();
        let other = Uuid::new_v4();
        let rules = vec![
            rule("Water", None, 7200),
            rule("Water", Some(other), 60),
            rule("Water", Some(dept), 1800),
        ];

        let found = resolve_rule(&rules, "Water", None, Some(dept)).unwrap();
        assert_eq!(found.duration_seconds, 1800);

        let global = resolve_rule(&rules, "Water", None, None).unwrap();
        assert_eq!(global.duration_seconds, 7200);
    }

    #[test]
    fn no_rule_means_no_deadline() {
        let rules = vec![rule("Water", None, 7200)];
        let filed_at = Utc::now();
        assert!(compute_sla_due_at(&rules, "Electricity", None, None, filed_at).is_none());
        assert_eq!(
            compute_sla_due_at(&rules, "Water", None, None, filed_at),
            Some(filed_at + Duration::seconds(7200))
        );
    }

    #[test]
    fn durations_convert_and_format() {
        assert_eq!("minutes".parse::<DurationUnit>().unwrap().to_seconds(5), Some(300));
        assert_eq!(DurationUnit::Hours.to_seconds(2), Some(7200));
        assert!("DAYS".parse::<DurationUnit>().is_err());
        assert_eq!(format_duration(7505), "2h 5m 5s");
        assert_eq!(format_duration(45), "0h 0m 45s");
    }

    #[test]
    fn oversized_durations_are_rejected_on_import() {
        assert_eq!(DurationUnit::Hours.to_seconds(3_000_000_000_000_000), None);
        assert!(rule_duration_seconds(DurationUnit::Hours, 3_000_000_000_000_000).is_err());
        assert!(rule_duration_seconds(DurationUnit::Seconds, 1_000_000_000_000_000).is_err());
        assert!(rule_duration_seconds(DurationUnit::Minutes, 0).is_err());
        assert!(rule_duration_seconds(DurationUnit::Minutes, -5).is_err());
        assert_eq!(rule_duration_seconds(DurationUnit::Hours, 24).unwrap(), 86_400);
        assert_eq!(
            rule_duration_seconds(DurationUnit::Seconds, MAX_SLA_SECONDS).unwrap(),
            MAX_SLA_SECONDS
        );
    }

    #[test]
    fn out_of_range_rule_yields_no_deadline_instead_of_panicking() {
        let filed_at = Utc::now();
        let rules = vec![
            rule("Water", None, 1_000_000_000_000_000),
            rule("Roads", None, i64::MAX),
        ];
        assert!(compute_sla_due_at(&rules, "Water", None, None, filed_at).is_none());
        assert!(compute_sla_due_at(&rules, "Roads", None, None, filed_at).is_none());
    }
}
