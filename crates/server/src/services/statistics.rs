use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    db::models::{Task, TaskStatus, TaskType},
    error::Result,
    services::task_metadata::{metadata_attachments, parse_responses, parse_timestamp},
};

/// Response times at or beyond a year are treated as bad data.
const MAX_RESPONSE_HOURS: f64 = 365.0 * 24.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStatistics {
    pub total_tasks: usize,
    pub tasks_by_status: BTreeMap<&'static str, usize>,
    pub tasks_by_type: BTreeMap<&'static str, usize>,
    pub total_responses: usize,
    pub tasks_with_responses: usize,
    pub tasks_without_responses: usize,
    pub average_response_time_hours: f64,
    pub total_attachments: usize,
}

pub fn compute(tasks: &[Task]) -> Result<TaskStatistics> {
    let mut tasks_by_status: BTreeMap<&'static str, usize> =
        TaskStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    let mut tasks_by_type: BTreeMap<&'static str, usize> =
        TaskType::ALL.iter().map(|t| (t.as_str(), 0)).collect();

    let mut total_responses = 0;
    let mut total_attachments = 0;
    let mut tasks_with_responses = 0;
    let mut response_hours = Vec::new();

    for task in tasks {
        let status = TaskStatus::from_stored(&task.status)?;
        let task_type = TaskType::from_stored(&task.task_type)?;
        *tasks_by_status.entry(status.as_str()).or_default() += 1;
        *tasks_by_type.entry(task_type.as_str()).or_default() += 1;

        let metadata = task.metadata_json();
        let responses = parse_responses(&metadata, &task.created_at);
        total_responses += responses.len();
        total_attachments += metadata_attachments(&metadata).len();

        if responses.is_empty() {
            continue;
        }
        tasks_with_responses += 1;

        if status != TaskStatus::Completed || task.completed_at.is_none() {
            continue;
        }
        let first = parse_timestamp(&responses[0].created_at);
        let created = parse_timestamp(&task.created_at);
        if let (Some(first), Some(created)) = (first, created) {
            let hours = (first - created).num_seconds() as f64 / 3600.0;
            if hours > 0.0 && hours < MAX_RESPONSE_HOURS {
                response_hours.push(hours);
            }
        }
    }

    let average = if response_hours.is_empty() {
        0.0
    } else {
        response_hours.iter().sum::<f64>() / response_hours.len() as f64
    };

    Ok(TaskStatistics {
        total_tasks: tasks.len(),
        tasks_by_status,
        tasks_by_type,
        total_responses,
        tasks_with_responses,
        tasks_without_responses: tasks.len() - tasks_with_responses,
        average_response_time_hours: (average * 10.0).round() / 10.0,
        total_attachments,
    })
}
