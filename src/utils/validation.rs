use crate::domain::model::CourseCode;
use crate::utils::error::{CheckInError, Result};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap())
}

/// Course codes are exactly six ASCII digits. Anything else is rejected
/// before any network traffic happens.
pub fn validate_course_code(raw: &str) -> Result<CourseCode> {
    CourseCode::parse(raw).ok_or_else(|| CheckInError::Validation {
        message: format!(
            "Course code must be exactly {} digits, got {:?}",
            CourseCode::LENGTH,
            raw.trim()
        ),
    })
}

/// The portal only accepts university addresses.
pub fn validate_email(email: &str) -> Result<String> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(CheckInError::Validation {
            message: "E-mail address is required".to_string(),
        });
    }

    if !email_regex().is_match(trimmed) {
        return Err(CheckInError::Validation {
            message: format!("Invalid e-mail format: {}", trimmed),
        });
    }

    if !trimmed.ends_with("@ogr.deu.edu.tr") && !trimmed.ends_with("@deu.edu.tr") {
        return Err(CheckInError::Validation {
            message: "A valid DEU university e-mail is required".to_string(),
        });
    }

    Ok(trimmed.to_string())
}

pub fn validate_password(password: &str) -> Result<String> {
    let trimmed = password.trim();

    if trimmed.is_empty() {
        return Err(CheckInError::Validation {
            message: "Password cannot be empty".to_string(),
        });
    }

    if trimmed.len() < 3 {
        return Err(CheckInError::Validation {
            message: "Password must be at least 3 characters".to_string(),
        });
    }

    Ok(trimmed.to_string())
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(CheckInError::InvalidConfigValue {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(CheckInError::InvalidConfigValue {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(CheckInError::InvalidConfigValue {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_positive_number(field_name: &str, value: u32, min_value: u32) -> Result<()> {
    if value < min_value {
        return Err(CheckInError::InvalidConfigValue {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_course_code() {
        assert!(validate_course_code("123456").is_ok());
        assert!(validate_course_code(" 654321 ").is_ok());
        assert!(validate_course_code("12345").is_err());
        assert!(validate_course_code("abcdef").is_err());
        assert!(validate_course_code("").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ali.veli@ogr.deu.edu.tr").is_ok());
        assert!(validate_email("hoca@deu.edu.tr").is_ok());
        assert!(validate_email("someone@gmail.com").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_validate_email_trims_whitespace() {
        assert_eq!(
            validate_email("  ali@ogr.deu.edu.tr  ").unwrap(),
            "ali@ogr.deu.edu.tr"
        );
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("abc").is_ok());
        assert!(validate_password("ab").is_err());
        assert!(validate_password("   ").is_err());
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("portal_url", "https://deysis.deu.edu.tr").is_ok());
        assert!(validate_url("portal_url", "").is_err());
        assert!(validate_url("portal_url", "ftp://example.com").is_err());
        assert!(validate_url("portal_url", "not a url").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("max_attempts", 3, 1).is_ok());
        assert!(validate_positive_number("max_attempts", 0, 1).is_err());
    }
}
