use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::OverdueGrievance;
use crate::sweep::Escalation;

/// Storage operations the SLA sweep depends on.
#[async_trait]
pub trait SweepStore: Send + Sync {
    /// Grievances with a deadline before `now` that are not escalated,
    /// resolved or closed, in processing order.
    async fn fetch_overdue(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<OverdueGrievance>>;

    /// Head of the department, if the department exists and has one.
    async fn department_head(&self, department_id: Uuid) -> anyhow::Result<Option<Uuid>>;

    /// Writes the status change and its history, notification and audit rows
    /// as one unit. The status change only applies while the grievance still
    /// holds `escalation.expected_status` and its deadline is before
    /// `escalation.as_of`; otherwise nothing is written and `false` is
    /// returned.
    async fn apply_escalation(&self, escalation: &Escalation) -> anyhow::Result<bool>;
}
