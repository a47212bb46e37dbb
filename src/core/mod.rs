pub mod list;
pub mod task;
pub mod user;

use crate::error::ClientError;

pub type ListId = i64;
pub type TaskId = i64;

/// Trim a list or task name and reject it if nothing is left.
pub fn validate_name(kind: &str, name: &str) -> Result<String, ClientError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ClientError::Validation(format!("{} name is required", kind)));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(validate_name("List", "  Groceries \n").unwrap(), "Groceries");
    }

    #[test]
    fn rejects_empty_and_blank() {
        assert!(matches!(validate_name("List", ""), Err(ClientError::Validation(_))));
        assert!(matches!(validate_name("Task", " \t "), Err(ClientError::Validation(_))));
    }
}
