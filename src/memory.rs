//! In-memory `SweepStore` used by the sweep tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    AuditLogEntry, Department, Grievance, GrievanceStatus, Notification, OverdueGrievance,
    StatusHistoryEntry,
};
use crate::sla;
use crate::store::SweepStore;
use crate::sweep::Escalation;

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

type ConcurrentChange = Box<dyn FnOnce(&mut Grievance) + Send>;

#[derive(Default)]
struct State {
    grievances: Vec<Grievance>,
    departments: HashMap<Uuid, Department>,
    history: Vec<StatusHistoryEntry>,
    notifications: Vec<Notification>,
    audit_log: Vec<AuditLogEntry>,
    fail_selection: bool,
    fail_apply: Option<Uuid>,
    concurrent_change: Option<(Uuid, ConcurrentChange)>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn insert_grievance(&self, grievance: Grievance) {
        self.lock().grievances.push(grievance);
    }

    pub fn insert_department(&self, department: Department) {
        self.lock().departments.insert(department.id, department);
    }

    pub fn grievance(&self, id: Uuid) -> Option<Grievance> {
        self.lock().grievances.iter().find(|g| g.id == id).cloned()
    }

    pub fn history(&self) -> Vec<StatusHistoryEntry> {
        self.lock().history.clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().notifications.clone()
    }

    pub fn audit_log(&self) -> Vec<AuditLogEntry> {
        self.lock().audit_log.clone()
    }

    pub fn fail_selection(&self) {
        self.lock().fail_selection = true;
    }

    pub fn fail_apply_for(&self, id: Uuid) {
        self.lock().fail_apply = Some(id);
    }

    /// Simulates another writer moving the grievance to `status` after the
    /// sweep selected it.
    pub fn change_status_before_apply(&self, id: Uuid, status: GrievanceStatus) {
        self.change_before_apply(id, move |g| g.status = status);
    }

    /// Simulates another writer moving the deadline after selection.
    pub fn move_deadline_before_apply(&self, id: Uuid, sla_due_at: Option<DateTime<Utc>>) {
        self.change_before_apply(id, move |g| g.sla_due_at = sla_due_at);
    }

    fn change_before_apply(&self, id: Uuid, change: impl FnOnce(&mut Grievance) + Send + 'static) {
        self.lock().concurrent_change = Some((id, Box::new(change)));
    }
}

#[async_trait]
impl SweepStore for MemoryStore {
    async fn fetch_overdue(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<OverdueGrievance>> {
        let state = self.lock();
        if state.fail_selection {
            anyhow::bail!("grievance store unavailable");
        }

        let mut overdue: Vec<OverdueGrievance> = state
            .grievances
            .iter()
            .filter(|g| sla::qualifies_for_escalation(g.status, g.sla_due_at, now))
            .filter_map(|g| {
                g.sla_due_at.map(|sla_due_at| OverdueGrievance {
                    id: g.id,
                    department_id: g.department_id,
                    title: g.title.clone(),
                    status: g.status,
                    priority: g.priority,
                    sla_due_at,
                })
            })
            .collect();
        overdue.sort_by(|a, b| a.sla_due_at.cmp(&b.sla_due_at).then(a.id.cmp(&b.id)));
        Ok(overdue)
    }

    async fn department_head(&self, department_id: Uuid) -> anyhow::Result<Option<Uuid>> {
        Ok(self
            .lock()
            .departments
            .get(&department_id)
            .and_then(|d| d.head_user_id))
    }

    async fn apply_escalation(&self, escalation: &Escalation) -> anyhow::Result<bool> {
        let mut state = self.lock();
        if state.fail_apply == Some(escalation.grievance_id) {
            anyhow::bail!("write to grievance {} failed", escalation.grievance_id);
        }

        if let Some((id, change)) = state.concurrent_change.take() {
            if let Some(g) = state.grievances.iter_mut().find(|g| g.id == id) {
                change(g);
            }
        }

        let Some(grievance) = state
            .grievances
            .iter_mut()
            .find(|g| {
                g.id == escalation.grievance_id
                    && g.status == escalation.expected_status
                    && sla::qualifies_for_escalation(g.status, g.sla_due_at, escalation.as_of)
            })
        else {
            return Ok(false);
        };

        grievance.status = escalation.new_status;
        grievance.priority = escalation.new_priority;

        state.history.push(escalation.history.clone());
        if let Some(notification) = &escalation.notification {
            state.notifications.push(notification.clone());
        }
        state.audit_log.push(escalation.audit.clone());
        Ok(true)
    }
}
