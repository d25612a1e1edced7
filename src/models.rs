use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrievanceStatus {
    Submitted,
    Assigned,
    InProgress,
    Resolved,
    Closed,
    Escalated,
}

impl GrievanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GrievanceStatus::Submitted => "SUBMITTED",
            GrievanceStatus::Assigned => "ASSIGNED",
            GrievanceStatus::InProgress => "IN_PROGRESS",
            GrievanceStatus::Resolved => "RESOLVED",
            GrievanceStatus::Closed => "CLOSED",
            GrievanceStatus::Escalated => "ESCALATED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, GrievanceStatus::Resolved | GrievanceStatus::Closed)
    }

    /// Statuses the SLA sweep never selects.
    pub fn is_sweep_excluded(self) -> bool {
        self.is_terminal() || self == GrievanceStatus::Escalated
    }
}

impl fmt::Display for GrievanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrievanceStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "SUBMITTED" => Ok(GrievanceStatus::Submitted),
            "ASSIGNED" => Ok(GrievanceStatus::Assigned),
            "IN_PROGRESS" => Ok(GrievanceStatus::InProgress),
            "RESOLVED" => Ok(GrievanceStatus::Resolved),
            "CLOSED" => Ok(GrievanceStatus::Closed),
            "ESCALATED" => Ok(GrievanceStatus::Escalated),
            other => anyhow::bail!("unknown grievance status: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Normal => "NORMAL",
            Priority::High => "HIGH",
            Priority::Urgent => "URGENT",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "LOW" => Ok(Priority::Low),
            "NORMAL" => Ok(Priority::Normal),
            "HIGH" => Ok(Priority::High),
            "URGENT" => Ok(Priority::Urgent),
            other => anyhow::bail!("unknown priority: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Info,
    Warning,
    Urgent,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Info => "INFO",
            NotificationKind::Warning => "WARNING",
            NotificationKind::Urgent => "URGENT",
        }
    }
}

/// Role an SLA rule escalates to once breached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscalationRole {
    Officer,
    DeptHead,
    Admin,
    SuperAdmin,
}

impl EscalationRole {
    pub fn as_str(self) -> &'static str {
        match self {
            EscalationRole::Officer => "OFFICER",
            EscalationRole::DeptHead => "DEPT_HEAD",
            EscalationRole::Admin => "ADMIN",
            EscalationRole::SuperAdmin => "SUPER_ADMIN",
        }
    }
}

impl FromStr for EscalationRole {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "OFFICER" => Ok(EscalationRole::Officer),
            "DEPT_HEAD" => Ok(EscalationRole::DeptHead),
            "ADMIN" => Ok(EscalationRole::Admin),
            "SUPER_ADMIN" => Ok(EscalationRole::SuperAdmin),
            other => anyhow::bail!("unknown escalation role: {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Grievance {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub status: GrievanceStatus,
    pub priority: Priority,
    pub sla_due_at: Option<DateTime<Utc>>,
    pub department_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Projection returned by the sweep's selection query.
#[derive(Debug, Clone)]
pub struct OverdueGrievance {
    pub id: Uuid,
    pub department_id: Option<Uuid>,
    pub title: String,
    pub status: GrievanceStatus,
    pub priority: Priority,
    pub sla_due_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub grievance_id: Uuid,
    pub from_status: Option<GrievanceStatus>,
    pub to_status: GrievanceStatus,
    /// `None` marks a system-initiated change.
    pub changed_by: Option<Uuid>,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub grievance_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub metadata: serde_json::Value,
    pub actor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Department {
    pub id: Uuid,
    pub head_user_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct SlaRule {
    pub id: Uuid,
    pub category: String,
    pub priority: Priority,
    pub duration_seconds: i64,
    pub escalation_role: EscalationRole,
    pub department_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct EscalationRecord {
    pub grievance_id: Uuid,
    pub title: String,
    pub department_name: Option<String>,
    pub from_status: Option<GrievanceStatus>,
    pub escalated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DepartmentSummary {
    pub department: String,
    pub count: usize,
}
