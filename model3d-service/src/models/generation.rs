use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use super::memory::MemoryRecord;

/// Maximum length accepted for `memory_id` and `user_id`.
pub const MAX_IDENTIFIER_LEN: u64 = 128;

/// Caller-supplied parameters for `POST /generate-3d`.
#[derive(Debug, Clone, Default, Validate)]
pub struct GenerateRequest {
    #[validate(length(max = MAX_IDENTIFIER_LEN, message = "user_id is too long"))]
    pub user_id: Option<String>,

    #[validate(length(min = 1, max = MAX_IDENTIFIER_LEN, message = "memory_id is required"))]
    pub memory_id: String,

    pub enable_pbr: bool,
}

impl GenerateRequest {
    /// Trim identifiers and treat a blank `user_id` as absent.
    pub fn normalized(mut self) -> Self {
        self.memory_id = self.memory_id.trim().to_string();
        self.user_id = self
            .user_id
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        self
    }

    /// Length checks plus the identifier character set.
    pub fn validate_all(&self) -> Result<(), ValidationErrors> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(e) => e,
        };

        if !self.memory_id.is_empty() && !is_identifier(&self.memory_id) {
            errors.add("memory_id", identifier_error("Invalid memory_id format"));
        }
        if let Some(user_id) = &self.user_id {
            if !is_identifier(user_id) {
                errors.add("user_id", identifier_error("Invalid user_id format"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn identifier_error(message: &'static str) -> ValidationError {
    let mut error = ValidationError::new("identifier");
    error.message = Some(message.into());
    error
}

/// `[A-Za-z0-9_-]+`
pub fn is_identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Success body of `POST /generate-3d`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub status: String,
    pub message: String,
    pub stl_url: String,
    pub stl_storage_path: String,
    pub filename: String,
    pub updated_memory: Option<MemoryRecord>,
}

/// Provider-side job state, observed by polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// A generated file listed in a finished job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultFile {
    pub file_type: Option<String>,
    pub url: Option<String>,
}

/// One observation of a provider job.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub job_id: String,
    pub status: JobStatus,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub files: Vec<ResultFile>,
}

impl GenerationJob {
    /// URL of the STL output, falling back to the first file with any URL.
    pub fn artifact_url(&self) -> Option<&str> {
        self.files
            .iter()
            .find(|f| {
                f.file_type
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case("stl"))
                    && f.url.as_deref().is_some_and(|u| !u.is_empty())
            })
            .or_else(|| {
                self.files
                    .iter()
                    .find(|f| f.url.as_deref().is_some_and(|u| !u.is_empty()))
            })
            .and_then(|f| f.url.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(memory_id: &str, user_id: Option<&str>) -> GenerateRequest {
        GenerateRequest {
            memory_id: memory_id.to_string(),
            user_id: user_id.map(str::to_string),
            enable_pbr: false,
        }
    }

    #[test]
    fn accepts_well_formed_identifiers() {
        assert!(request("mem_01-a", Some("user-9")).validate_all().is_ok());
        assert!(request("mem", None).validate_all().is_ok());
    }

    #[test]
    fn missing_memory_id_is_rejected() {
        let errors = request("", None).validate_all().unwrap_err();
        assert!(errors.field_errors().contains_key("memory_id"));
    }

    #[test]
    fn path_like_identifiers_are_rejected() {
        let errors = request("../etc", Some("a/b")).validate_all().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("memory_id"));
        assert!(fields.contains_key("user_id"));
    }

    #[test]
    fn identifier_length_limit_is_inclusive() {
        let max = "a".repeat(MAX_IDENTIFIER_LEN as usize);
        assert!(request(&max, Some(&max)).validate_all().is_ok());

        let long = "a".repeat(MAX_IDENTIFIER_LEN as usize + 1);
        let errors = request(&long, Some(&long)).validate_all().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("memory_id"));
        assert!(fields.contains_key("user_id"));
    }

    #[test]
    fn normalization_drops_blank_user_id() {
        let normalized = request(" mem ", Some("  ")).normalized();
        assert_eq!(normalized.memory_id, "mem");
        assert_eq!(normalized.user_id, None);
    }

    #[test]
    fn artifact_url_prefers_stl_entry() {
        let job = GenerationJob {
            job_id: "job".into(),
            status: JobStatus::Succeeded,
            error_code: None,
            error_message: None,
            files: vec![
                ResultFile {
                    file_type: Some("GIF".into()),
                    url: Some("https://cdn/preview.gif".into()),
                },
                ResultFile {
                    file_type: Some("stl".into()),
                    url: Some("https://cdn/model.stl".into()),
                },
            ],
        };
        assert_eq!(job.artifact_url(), Some("https://cdn/model.stl"));
    }

    #[test]
    fn artifact_url_falls_back_to_first_url() {
        let job = GenerationJob {
            job_id: "job".into(),
            status: JobStatus::Succeeded,
            error_code: None,
            error_message: None,
            files: vec![
                ResultFile {
                    file_type: Some("STL".into()),
                    url: None,
                },
                ResultFile {
                    file_type: None,
                    url: Some("https://cdn/out.bin".into()),
                },
            ],
        };
        assert_eq!(job.artifact_url(), Some("https://cdn/out.bin"));
    }

    #[test]
    fn artifact_url_none_without_files() {
        let job = GenerationJob {
            job_id: "job".into(),
            status: JobStatus::Succeeded,
            error_code: None,
            error_message: None,
            files: vec![],
        };
        assert_eq!(job.artifact_url(), None);
    }
}
