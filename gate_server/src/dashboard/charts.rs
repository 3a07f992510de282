//! Workflow count charts for the dashboard.

use chrono::{DateTime, Datelike, Duration, Utc};
use diesel::sql_types::{BigInt, Text};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;

use crate::models::workflow::Workflow;

/// Months covered by the month chart, including the current one.
pub const MONTH_CHART_SPAN: u32 = 12;
/// Days covered by the person chart.
pub const PERSON_CHART_DAYS: i64 = 30;

/// Workflows created in one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, diesel::QueryableByName)]
pub struct MonthCount {
    #[diesel(sql_type = Text)]
    pub month: String,
    #[diesel(sql_type = BigInt)]
    pub count: i64,
}

/// Workflows submitted by one engineer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, diesel::QueryableByName)]
pub struct PersonCount {
    #[diesel(sql_type = Text)]
    pub engineer: String,
    #[diesel(sql_type = BigInt)]
    pub count: i64,
}

pub async fn query_month_counts(conn: &mut AsyncPgConnection) -> anyhow::Result<Vec<MonthCount>> {
    let results = diesel::sql_query(format!(
        "SELECT to_char(date_trunc('month', create_time), 'YYYY-MM') AS month, COUNT(*) AS count \
         FROM sql_workflow \
         WHERE create_time >= date_trunc('month', NOW()) - INTERVAL '{} months' \
         GROUP BY 1 \
         ORDER BY 1 ASC",
        MONTH_CHART_SPAN - 1
    ))
    .load(conn)
    .await?;
    Ok(results)
}

pub async fn query_person_counts(conn: &mut AsyncPgConnection) -> anyhow::Result<Vec<PersonCount>> {
    let results = diesel::sql_query(format!(
        "SELECT engineer, COUNT(*) AS count \
         FROM sql_workflow \
         WHERE create_time >= NOW() - INTERVAL '{PERSON_CHART_DAYS} days' \
         GROUP BY engineer \
         ORDER BY count DESC, engineer ASC"
    ))
    .load(conn)
    .await?;
    Ok(results)
}

/// Month chart computed over workflows already in memory.
pub fn month_counts<'a>(
    workflows: impl IntoIterator<Item = &'a Workflow>,
    now: DateTime<Utc>,
) -> Vec<MonthCount> {
    let current = now.year() * 12 + now.month0() as i32;
    let first = current - (MONTH_CHART_SPAN as i32 - 1);

    let mut counts = std::collections::BTreeMap::<String, i64>::new();
    for wf in workflows {
        let index = wf.create_time.year() * 12 + wf.create_time.month0() as i32;
        if index >= first && index <= current {
            let key = format!("{:04}-{:02}", wf.create_time.year(), wf.create_time.month());
            *counts.entry(key).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .map(|(month, count)| MonthCount { month, count })
        .collect()
}

/// Person chart computed over workflows already in memory.
pub fn person_counts<'a>(
    workflows: impl IntoIterator<Item = &'a Workflow>,
    now: DateTime<Utc>,
) -> Vec<PersonCount> {
    let cutoff = now - Duration::days(PERSON_CHART_DAYS);

    let mut counts = std::collections::HashMap::<String, i64>::new();
    for wf in workflows.into_iter().filter(|wf| wf.create_time >= cutoff) {
        *counts.entry(wf.engineer.clone()).or_default() += 1;
    }
    let mut result: Vec<PersonCount> = counts
        .into_iter()
        .map(|(engineer, count)| PersonCount { engineer, count })
        .collect();
    result.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.engineer.cmp(&b.engineer)));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::workflow::{sample_workflow, WorkflowStatus};
    use chrono::TimeZone;

    fn created(engineer: &str, at: DateTime<Utc>) -> Workflow {
        let mut wf = sample_workflow(1, WorkflowStatus::Completed, "bob", "[]");
        wf.engineer = engineer.to_string();
        wf.create_time = at;
        wf
    }

    #[test]
    fn month_chart_covers_last_twelve_months_ascending() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let workflows = vec![
            created("a", Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()),
            created("a", Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap()),
            created("b", Utc.with_ymd_and_hms(2023, 4, 30, 0, 0, 0).unwrap()),
            created("b", Utc.with_ymd_and_hms(2023, 3, 31, 0, 0, 0).unwrap()),
        ];
        let chart = month_counts(&workflows, now);
        assert_eq!(
            chart,
            vec![
                MonthCount { month: "2023-04".to_string(), count: 1 },
                MonthCount { month: "2024-03".to_string(), count: 2 },
            ]
        );
    }

    #[test]
    fn person_chart_orders_by_count_then_name() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap();
        let recent = Utc.with_ymd_and_hms(2024, 3, 20, 0, 0, 0).unwrap();
        let old = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let workflows = vec![
            created("carol", recent),
            created("bob", recent),
            created("bob", recent),
            created("alice", recent),
            created("alice", old),
        ];
        let chart = person_counts(&workflows, now);
        let names: Vec<_> = chart.iter().map(|p| (p.engineer.as_str(), p.count)).collect();
        assert_eq!(names, vec![("bob", 2), ("alice", 1), ("carol", 1)]);
    }
}
