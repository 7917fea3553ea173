use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// A single position held, rendered in the "Professional Experience" section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub period: String,
    #[serde(default)]
    pub duties: Vec<String>,
}

/// The résumé as submitted by the builder frontend.
///
/// Only `name` is structurally required; every other field defaults to empty so
/// partially filled drafts can still be exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeRecord {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone1: String,
    #[serde(default)]
    pub phone2: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub statement: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub interests: Vec<String>,
}

impl ResumeRecord {
    /// Rejects records that cannot produce a meaningful document.
    /// Runs before any rendering or I/O.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::InvalidInput("name cannot be empty".to_string()));
        }

        let email = self.email.trim();
        if !email.is_empty() && !email.contains('@') {
            return Err(AppError::InvalidInput(format!(
                "email '{email}' is not a valid address"
            )));
        }

        for (index, entry) in self.experience.iter().enumerate() {
            if entry.title.trim().is_empty() {
                return Err(AppError::InvalidInput(format!(
                    "experience[{index}].title cannot be empty"
                )));
            }
            if entry.company.trim().is_empty() {
                return Err(AppError::InvalidInput(format!(
                    "experience[{index}].company cannot be empty"
                )));
            }
        }

        Ok(())
    }

    /// Contact fields that are filled in, in display order.
    pub fn contact_lines(&self) -> Vec<&str> {
        [&self.address, &self.phone1, &self.phone2, &self.email]
            .into_iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[cfg(test)]
pub(crate) fn sample_record() -> ResumeRecord {
    ResumeRecord {
        name: "Ada Lovelace".to_string(),
        address: "12 St James's Square, London".to_string(),
        phone1: "+44 20 7946 0000".to_string(),
        phone2: String::new(),
        email: "ada@example.com".to_string(),
        statement: "Analyst of engines, both difference and analytical.".to_string(),
        skills: vec!["Mathematics".to_string(), "Programming".to_string()],
        experience: vec![Experience {
            title: "Collaborator".to_string(),
            company: "Analytical Engine Project".to_string(),
            period: "1842 - 1843".to_string(),
            duties: vec![
                "Translated Menabrea's memoir".to_string(),
                "Wrote the first published algorithm".to_string(),
            ],
        }],
        interests: vec!["Poetical science".to_string()],
    }
}
