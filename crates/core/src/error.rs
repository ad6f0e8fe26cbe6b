use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Inconsistent wiring tables: {0}")]
    InvalidTables(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CoreError::UnknownStage("Deploy".to_string());
        assert!(error.to_string().contains("Deploy"));
    }
}
