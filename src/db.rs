use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    Department, EscalationRecord, EscalationRole, Grievance, GrievanceStatus, OverdueGrievance,
    Priority, SlaRule,
};
use crate::sla::{self, DurationUnit};
use crate::store::SweepStore;
use crate::sweep::Escalation;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SweepStore for PgStore {
    async fn fetch_overdue(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<OverdueGrievance>> {
        let rows = sqlx::query(
            r#"
            SELECT id, department_id, title, status, priority, sla_due_at
            FROM grievance_portal.grievances
            WHERE sla_due_at IS NOT NULL
              AND sla_due_at < $1
              AND status NOT IN ('ESCALATED', 'RESOLVED', 'CLOSED')
            ORDER BY sla_due_at, id
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .context("failed to select overdue grievances")?;

        let mut overdue = Vec::with_capacity(rows.len());
        for row in rows {
            overdue.push(OverdueGrievance {
                id: row.get("id"),
                department_id: row.get("department_id"),
                title: row.get("title"),
                status: row.get::<String, _>("status").parse()?,
                priority: row.get::<String, _>("priority").parse()?,
                sla_due_at: row.get("sla_due_at"),
            });
        }

        Ok(overdue)
    }

    async fn department_head(&self, department_id: Uuid) -> anyhow::Result<Option<Uuid>> {
        let row = sqlx::query("SELECT head_id FROM grievance_portal.departments WHERE id = $1")
            .bind(department_id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to look up department {department_id}"))?;

        Ok(row.and_then(|row| row.get::<Option<Uuid>, _>("head_id")))
    }

    async fn apply_escalation(&self, escalation: &Escalation) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE grievance_portal.grievances
            SET status = $3, priority = $4, updated_at = $5
            WHERE id = $1 AND status = $2 AND sla_due_at < $6
            "#,
        )
        .bind(escalation.grievance_id)
        .bind(escalation.expected_status.as_str())
        .bind(escalation.new_status.as_str())
        .bind(escalation.new_priority.as_str())
        .bind(escalation.history.created_at)
        .bind(escalation.as_of)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let history = &escalation.history;
        sqlx::query(
            r#"
            INSERT INTO grievance_portal.grievance_status_history
            (id, grievance_id, from_status, to_status, changed_by, note, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(history.id)
        .bind(history.grievance_id)
        .bind(history.from_status.map(GrievanceStatus::as_str))
        .bind(history.to_status.as_str())
        .bind(history.changed_by)
        .bind(&history.note)
        .bind(history.created_at)
        .execute(&mut *tx)
        .await?;

        if let Some(notification) = &escalation.notification {
            sqlx::query(
                r#"
                INSERT INTO grievance_portal.notifications
                (id, user_id, title, message, kind, grievance_id, is_read, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(notification.id)
            .bind(notification.user_id)
            .bind(&notification.title)
            .bind(&notification.message)
            .bind(notification.kind.as_str())
            .bind(notification.grievance_id)
            .bind(notification.is_read)
            .bind(notification.created_at)
            .execute(&mut *tx)
            .await?;
        }

        let audit = &escalation.audit;
        sqlx::query(
            r#"
            INSERT INTO grievance_portal.audit_logs
            (id, action, entity_type, entity_id, grievance_id, metadata, actor_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(audit.id)
        .bind(&audit.action)
        .bind(&audit.entity_type)
        .bind(audit.entity_id)
        .bind(escalation.grievance_id)
        .bind(&audit.metadata)
        .bind(audit.actor_id)
        .bind(audit.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}

pub async fn fetch_sla_rules(pool: &PgPool) -> anyhow::Result<Vec<SlaRule>> {
    let rows = sqlx::query(
        r#"
        SELECT id, category, priority, duration_seconds, escalation_role, department_id
        FROM grievance_portal.sla_rules
        ORDER BY category, department_id NULLS LAST, created_at
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut rules = Vec::new();
    for row in rows {
        rules.push(SlaRule {
            id: row.get("id"),
            category: row.get("category"),
            priority: row.get::<String, _>("priority").parse()?,
            duration_seconds: row.get("duration_seconds"),
            escalation_role: row.get::<String, _>("escalation_role").parse()?,
            department_id: row.get("department_id"),
        });
    }

    Ok(rules)
}

pub async fn department_by_code(pool: &PgPool, code: &str) -> anyhow::Result<Option<Department>> {
    let row = sqlx::query("SELECT id, head_id FROM grievance_portal.departments WHERE code = $1")
        .bind(code)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| Department {
        id: row.get("id"),
        head_user_id: row.get("head_id"),
    }))
}

pub async fn count_overdue(pool: &PgPool, now: DateTime<Utc>) -> anyhow::Result<i64> {
    let count: i64 = sqlx::query(
        r#"
        SELECT COUNT(*) AS overdue
        FROM grievance_portal.grievances
        WHERE sla_due_at IS NOT NULL
          AND sla_due_at < $1
          AND status NOT IN ('ESCALATED', 'RESOLVED', 'CLOSED')
        "#,
    )
    .bind(now)
    .fetch_one(pool)
    .await?
    .get("overdue");

    Ok(count)
}

pub async fn fetch_escalations(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> anyhow::Result<Vec<EscalationRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT h.grievance_id, g.title, d.name AS department_name, h.from_status, h.created_at
        FROM grievance_portal.grievance_status_history h
        JOIN grievance_portal.grievances g ON g.id = h.grievance_id
        LEFT JOIN grievance_portal.departments d ON d.id = g.department_id
        WHERE h.changed_by IS NULL
          AND h.to_status = 'ESCALATED'
          AND h.created_at >= $1
        ORDER BY h.created_at DESC
        "#,
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    let mut records = Vec::new();
    for row in rows {
        let from_status = row
            .get::<Option<String>, _>("from_status")
            .map(|value| value.parse::<GrievanceStatus>())
            .transpose()?;

        records.push(EscalationRecord {
            grievance_id: row.get("grievance_id"),
            title: row.get("title"),
            department_name: row.get("department_name"),
            from_status,
            escalated_at: row.get("created_at"),
        });
    }

    Ok(records)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let head_id = Uuid::parse_str("6f1d2c9a-4a57-4c1e-9a43-1b2f0f6d8e21")?;
    sqlx::query(
        r#"
        INSERT INTO grievance_portal.users (id, full_name, email, role)
        VALUES ($1, $2, $3, 'DEPT_HEAD')
        ON CONFLICT (email) DO UPDATE SET full_name = EXCLUDED.full_name
        "#,
    )
    .bind(head_id)
    .bind("Meera Rao")
    .bind("meera.rao@municipal.example")
    .execute(pool)
    .await?;

    let departments = vec![
        (
            Uuid::parse_str("a3c4e0b1-7d52-4f0c-8a61-5b0e2c7b9f10")?,
            "WATER",
            "Water Supply & Sewerage",
            Some(head_id),
        ),
        (
            Uuid::parse_str("c81e3b27-9f4d-4d6a-b2a5-0e7f6a1c3d44")?,
            "ROADS",
            "Roads & Infrastructure",
            None,
        ),
    ];

    for (id, code, name, head) in departments {
        sqlx::query(
            r#"
            INSERT INTO grievance_portal.departments (id, code, name, head_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (code) DO UPDATE
            SET name = EXCLUDED.name, head_id = EXCLUDED.head_id
            "#,
        )
        .bind(id)
        .bind(code)
        .bind(name)
        .bind(head)
        .execute(pool)
        .await?;
    }

    let water = department_by_code(pool, "WATER")
        .await?
        .context("seeded WATER department missing")?;
    let roads = department_by_code(pool, "ROADS")
        .await?
        .context("seeded ROADS department missing")?;

    let rules = vec![
        (
            Uuid::parse_str("1b0f6a52-38c1-4e0e-9d7c-2f4b8e6a0c11")?,
            "Water",
            Priority::High,
            Duration::hours(48).num_seconds(),
            None,
        ),
        (
            Uuid::parse_str("2c1a7b63-49d2-4f1f-8e8d-3a5c9f7b1d22")?,
            "Water",
            Priority::High,
            Duration::hours(24).num_seconds(),
            Some(water.id),
        ),
        (
            Uuid::parse_str("3d2b8c74-5ae3-4a2a-9f9e-4b6d0a8c2e33")?,
            "Potholes",
            Priority::Normal,
            Duration::hours(72).num_seconds(),
            None,
        ),
        (
            Uuid::parse_str("4e3c9d85-6bf4-4b3b-8a0f-5c7e1b9d3f44")?,
            "Sanitation",
            Priority::Normal,
            Duration::hours(12).num_seconds(),
            None,
        ),
    ];

    for (id, category, priority, duration_seconds, department_id) in rules {
        sqlx::query(
            r#"
            INSERT INTO grievance_portal.sla_rules
            (id, category, priority, duration_seconds, escalation_role, department_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(category)
        .bind(priority.as_str())
        .bind(duration_seconds)
        .bind(EscalationRole::DeptHead.as_str())
        .bind(department_id)
        .execute(pool)
        .await?;
    }

    let rules = fetch_sla_rules(pool).await?;
    let now = Utc::now();
    let grievances = vec![
        (
            "seed-g1",
            "Contaminated water supply in Ward 12",
            "Water",
            None,
            Some(water.id),
            GrievanceStatus::InProgress,
            30,
        ),
        (
            "seed-g2",
            "Pothole near the central bus depot",
            "Roads",
            Some("Potholes"),
            Some(roads.id),
            GrievanceStatus::Assigned,
            80,
        ),
        (
            "seed-g3",
            "Broken streetlight on MG Road",
            "Electricity",
            None,
            None,
            GrievanceStatus::Submitted,
            100,
        ),
        (
            "seed-g4",
            "Low water pressure in Block C",
            "Water",
            None,
            Some(water.id),
            GrievanceStatus::Submitted,
            2,
        ),
        (
            "seed-g5",
            "Drain blockage behind the market",
            "Sanitation",
            None,
            None,
            GrievanceStatus::Resolved,
            200,
        ),
    ];

    for (seed_key, title, category, subcategory, department_id, status, hours_ago) in grievances {
        let created_at = now - Duration::hours(hours_ago);
        let grievance = Grievance {
            id: Uuid::new_v4(),
            title: title.to_string(),
            category: category.to_string(),
            subcategory: subcategory.map(str::to_string),
            status,
            priority: Priority::Normal,
            sla_due_at: sla::compute_sla_due_at(
                &rules,
                category,
                subcategory,
                department_id,
                created_at,
            ),
            department_id,
            created_at,
        };

        sqlx::query(
            r#"
            INSERT INTO grievance_portal.grievances
            (id, title, category, subcategory, status, priority, sla_due_at,
             department_id, seed_key, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            ON CONFLICT (seed_key) DO NOTHING
            "#,
        )
        .bind(grievance.id)
        .bind(&grievance.title)
        .bind(&grievance.category)
        .bind(&grievance.subcategory)
        .bind(grievance.status.as_str())
        .bind(grievance.priority.as_str())
        .bind(grievance.sla_due_at)
        .bind(grievance.department_id)
        .bind(seed_key)
        .bind(grievance.created_at)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn import_rules(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        category: String,
        priority: String,
        duration_value: i64,
        duration_unit: String,
        escalation_role: String,
        department_code: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let line = index + 2;

        let priority: Priority = row
            .priority
            .parse()
            .with_context(|| format!("line {line}: invalid priority"))?;
        let unit: DurationUnit = row
            .duration_unit
            .parse()
            .with_context(|| format!("line {line}: invalid duration unit"))?;
        let escalation_role: EscalationRole = row
            .escalation_role
            .parse()
            .with_context(|| format!("line {line}: invalid escalation role"))?;
        let duration_seconds = sla::rule_duration_seconds(unit, row.duration_value)
            .with_context(|| format!("line {line}: invalid duration"))?;

        let department_id = match row.department_code.as_deref().filter(|c| !c.is_empty()) {
            Some(code) => Some(
                department_by_code(pool, code)
                    .await?
                    .with_context(|| format!("line {line}: unknown department {code}"))?
                    .id,
            ),
            None => None,
        };

        let result = sqlx::query(
            r#"
            INSERT INTO grievance_portal.sla_rules
            (id, category, priority, duration_seconds, escalation_role, department_id)
            SELECT $1, $2, $3, $4, $5, $6
            WHERE NOT EXISTS (
                SELECT 1 FROM grievance_portal.sla_rules
                WHERE category = $2 AND department_id IS NOT DISTINCT FROM $6
            )
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.category)
        .bind(priority.as_str())
        .bind(duration_seconds)
        .bind(escalation_role.as_str())
        .bind(department_id)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}
