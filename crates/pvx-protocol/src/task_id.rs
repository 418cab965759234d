//! Task identifiers: `queryId.stageId.stageExecutionId.taskId[.attemptNumber]`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskIdError {
    #[error("Malformed task id '{0}': expected 4 or 5 dot-separated parts")]
    Malformed(String),
    #[error("Malformed task id '{id}': {part} is not a number")]
    NotANumber { id: String, part: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId {
    pub query_id: String,
    pub stage_id: i32,
    pub stage_execution_id: i32,
    pub id: i32,
    pub attempt_number: i32,
}

impl TaskId {
    pub fn parse(text: &str) -> Result<Self, TaskIdError> {
        let parts: Vec<&str> = text.split('.').collect();
        if !(4..=5).contains(&parts.len()) || parts[0].is_empty() {
            return Err(TaskIdError::Malformed(text.to_string()));
        }
        let number = |index: usize, part: &'static str| -> Result<i32, TaskIdError> {
            parts[index].parse().map_err(|_| TaskIdError::NotANumber {
                id: text.to_string(),
                part,
            })
        };
        Ok(TaskId {
            query_id: parts[0].to_string(),
            stage_id: number(1, "stage id")?,
            stage_execution_id: number(2, "stage execution id")?,
            id: number(3, "task id")?,
            attempt_number: if parts.len() == 5 {
                number(4, "attempt number")?
            } else {
                0
            },
        })
    }
}

impl FromStr for TaskId {
    type Err = TaskIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskId::parse(s)
    }
}

impl TryFrom<String> for TaskId {
    type Error = TaskIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TaskId::parse(&value)
    }
}

impl From<TaskId> for String {
    fn from(value: TaskId) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}.{}",
            self.query_id, self.stage_id, self.stage_execution_id, self.id, self.attempt_number
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_four_parts() {
        let id = TaskId::parse("20201107_130540_00011_wrpkw.1.0.7").unwrap();
        assert_eq!(id.query_id, "20201107_130540_00011_wrpkw");
        assert_eq!(id.stage_id, 1);
        assert_eq!(id.stage_execution_id, 0);
        assert_eq!(id.id, 7);
        assert_eq!(id.attempt_number, 0);
    }

    #[test]
    fn test_parse_with_attempt() {
        let id: TaskId = "q.3.0.12.2".parse().unwrap();
        assert_eq!(id.stage_id, 3);
        assert_eq!(id.id, 12);
        assert_eq!(id.attempt_number, 2);
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(
            TaskId::parse("q.1.0"),
            Err(TaskIdError::Malformed("q.1.0".into()))
        );
        assert!(matches!(
            TaskId::parse("q.x.0.1"),
            Err(TaskIdError::NotANumber { part: "stage id", .. })
        ));
    }
}
