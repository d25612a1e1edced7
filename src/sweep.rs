use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::models::{
    AuditLogEntry, GrievanceStatus, Notification, NotificationKind, OverdueGrievance, Priority,
    StatusHistoryEntry,
};
use crate::store::SweepStore;

pub const ESCALATION_NOTE: &str = "Automatically escalated due to SLA breach.";
pub const BREACH_ALERT_TITLE: &str = "SLA BREACH ALERT!";
pub const AUDIT_ACTION: &str = "UPDATE_GRIEVANCE_STATUS";
pub const AUDIT_ENTITY: &str = "Grievance";
pub const BREACH_REASON: &str = "SLA_BREACH";

#[derive(Debug, Error)]
#[error("SLA sweep failed{}", grievance_suffix(.grievance_id))]
pub struct SweepError {
    pub grievance_id: Option<Uuid>,
    #[source]
    pub source: anyhow::Error,
}

fn grievance_suffix(grievance_id: &Option<Uuid>) -> String {
    match grievance_id {
        Some(id) => format!(" while escalating grievance {id}"),
        None => " while selecting overdue grievances".to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub selected: usize,
    pub escalated: usize,
    /// Grievances whose status changed between selection and update.
    pub skipped: usize,
    pub notified: usize,
}

/// Every write one breached grievance needs, committed together by the store.
#[derive(Debug, Clone)]
pub struct Escalation {
    pub grievance_id: Uuid,
    pub expected_status: GrievanceStatus,
    /// Sweep time; the deadline must still be before it when the update runs.
    pub as_of: DateTime<Utc>,
    pub new_status: GrievanceStatus,
    pub new_priority: Priority,
    pub history: StatusHistoryEntry,
    pub notification: Option<Notification>,
    pub audit: AuditLogEntry,
}

impl Escalation {
    pub fn for_breach(
        grievance: &OverdueGrievance,
        department_head: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        let history = StatusHistoryEntry {
            id: Uuid::new_v4(),
            grievance_id: grievance.id,
            from_status: Some(grievance.status),
            to_status: GrievanceStatus::Escalated,
            changed_by: None,
            note: ESCALATION_NOTE.to_string(),
            created_at: now,
        };

        let notification = department_head.map(|user_id| Notification {
            id: Uuid::new_v4(),
            user_id,
            title: BREACH_ALERT_TITLE.to_string(),
            message: format!(
                "Grievance \"{}\" has breached its SLA and is now ESCALATED.",
                grievance.title
            ),
            kind: NotificationKind::Urgent,
            grievance_id: Some(grievance.id),
            is_read: false,
            created_at: now,
        });

        let audit = AuditLogEntry {
            id: Uuid::new_v4(),
            action: AUDIT_ACTION.to_string(),
            entity_type: AUDIT_ENTITY.to_string(),
            entity_id: grievance.id,
            metadata: json!({
                "reason": BREACH_REASON,
                "oldStatus": grievance.status,
                "newStatus": GrievanceStatus::Escalated,
            }),
            actor_id: None,
            created_at: now,
        };

        Self {
            grievance_id: grievance.id,
            expected_status: grievance.status,
            as_of: now,
            new_status: GrievanceStatus::Escalated,
            new_priority: Priority::Urgent,
            history,
            notification,
            audit,
        }
    }
}

/// Escalates every breached grievance once, one record at a time.
///
/// Stops at the first failing record. Records escalated before the failure
/// stay escalated.
pub async fn sweep_once<S>(store: &S, now: DateTime<Utc>) -> Result<SweepReport, SweepError>
where
    S: SweepStore + ?Sized,
{
    let overdue = store
        .fetch_overdue(now)
        .await
        .map_err(|source| SweepError {
            grievance_id: None,
            source,
        })?;

    let mut report = SweepReport {
        selected: overdue.len(),
        ..SweepReport::default()
    };

    if overdue.is_empty() {
        return Ok(report);
    }

    for grievance in &overdue {
        let grievance_id = grievance.id;

        let head = match grievance.department_id {
            Some(department_id) => store
                .department_head(department_id)
                .await
                .map_err(|source| SweepError {
                    grievance_id: Some(grievance_id),
                    source,
                })?,
            None => None,
        };

        let escalation = Escalation::for_breach(grievance, head, now);
        let notifies = escalation.notification.is_some();

        let applied = store
            .apply_escalation(&escalation)
            .await
            .map_err(|source| SweepError {
                grievance_id: Some(grievance_id),
                source,
            })?;

        if applied {
            report.escalated += 1;
            if notifies {
                report.notified += 1;
            }
            info!(
                grievance_id = %grievance_id,
                from = %grievance.status,
                priority = %grievance.priority,
                due = %grievance.sla_due_at,
                notified = notifies,
                "escalated grievance after SLA breach"
            );
        } else {
            report.skipped += 1;
            debug!(
                grievance_id = %grievance_id,
                "grievance changed since selection, skipping"
            );
        }
    }

    Ok(report)
}

/// Runs one sweep and logs the outcome. Never fails.
pub async fn run_sla_sweep<S>(store: &S, now: DateTime<Utc>)
where
    S: SweepStore + ?Sized,
{
    match sweep_once(store, now).await {
        Ok(report) if report.selected == 0 => debug!("no overdue grievances"),
        Ok(report) => info!(
            selected = report.selected,
            escalated = report.escalated,
            skipped = report.skipped,
            notified = report.notified,
            "SLA sweep finished"
        ),
        Err(err) => match err.grievance_id {
            Some(grievance_id) => {
                error!(grievance_id = %grievance_id, error = ?err.source, "{err}")
            }
            None => error!(error = ?err.source, "{err}"),
        },
    }
}
