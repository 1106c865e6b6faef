//! Types for stored tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A stored task document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Assigned by the store on first write when absent.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner: String,
    /// Whitespace-separated program and arguments.
    #[serde(default)]
    pub command: String,
    /// Execution history, oldest first.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub task_executions: Vec<TaskExecution>,
}

impl Task {
    pub fn new(
        name: impl Into<String>,
        owner: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            owner: owner.into(),
            command: command.into(),
            task_executions: Vec::new(),
        }
    }

    /// Case-insensitive substring match on `name`. An empty fragment matches.
    pub fn name_contains_ignore_case(&self, fragment: &str) -> bool {
        self.name
            .to_lowercase()
            .contains(&fragment.to_lowercase())
    }
}

/// One run of a task's command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskExecution {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Merged stdout and stderr.
    pub output: String,
}

/// Treat an explicit JSON `null` history the same as a missing one.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<TaskExecution>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<TaskExecution>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_defaults_missing_fields() {
        let task: Task = serde_json::from_str(r#"{"name":"t"}"#).unwrap();
        assert_eq!(task.id, None);
        assert_eq!(task.name, "t");
        assert_eq!(task.owner, "");
        assert_eq!(task.command, "");
        assert!(task.task_executions.is_empty());
    }

    #[test]
    fn test_null_history_becomes_empty() {
        let task: Task =
            serde_json::from_str(r#"{"name":"t","taskExecutions":null}"#).unwrap();
        assert!(task.task_executions.is_empty());
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let task: Task =
            serde_json::from_str(r#"{"name":"t","priority":3,"command":"ls"}"#).unwrap();
        assert_eq!(task.command, "ls");
    }

    #[test]
    fn test_serialized_shape_is_camel_case() {
        let start = "2024-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let mut task = Task::new("t", "o", "echo hi");
        task.id = Some("abc".to_string());
        task.task_executions.push(TaskExecution {
            start_time: start,
            end_time: start,
            output: "hi\n".to_string(),
        });

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["id"], "abc");
        let exec = &json["taskExecutions"][0];
        assert_eq!(exec["startTime"], "2024-01-01T00:00:00Z");
        assert_eq!(exec["endTime"], "2024-01-01T00:00:00Z");
        assert_eq!(exec["output"], "hi\n");
    }

    #[test]
    fn test_name_contains_ignore_case() {
        let task = Task::new("beta-ALPHA", "o", "ls");
        assert!(task.name_contains_ignore_case("alpha"));
        assert!(task.name_contains_ignore_case("Beta"));
        assert!(task.name_contains_ignore_case(""));
        assert!(!task.name_contains_ignore_case("gamma"));
    }
}
