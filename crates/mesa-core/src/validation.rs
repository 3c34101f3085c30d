//! # Validation Module
//!
//! Input validation run before any transaction is opened.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Web form                                                     │
//! │  └── Required fields, immediate feedback                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Request DTO → typed request (mesa-billing)                   │
//! │  └── THIS MODULE: field rules (reason length, tip range, evidence)     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Unit of work (re-validated under the transaction)            │
//! │  └── order still ready, no active ticket, method in accepted domain    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: SQLite                                                       │
//! │  └── CHECK on payment_method, one active ticket per order              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;

use crate::config::EvidenceRules;
use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Requires a non-blank value and returns it trimmed.
///
/// ## Example
/// ```rust
/// use mesa_core::validation::validate_required;
///
/// assert_eq!(validate_required("cashier_id", "  u-1 ").unwrap(), "u-1");
/// assert!(validate_required("cashier_id", "   ").is_err());
/// ```
pub fn validate_required<'a>(field: &str, value: &'a str) -> ValidationResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(trimmed)
}

/// Validates a cancellation reason and returns it trimmed.
///
/// ## Rules
/// - Must not be blank
/// - At least `min_len` characters after trimming
pub fn validate_cancellation_reason(reason: &str, min_len: usize) -> ValidationResult<String> {
    let trimmed = validate_required("cancellation_reason", reason)?;
    if trimmed.chars().count() < min_len {
        return Err(ValidationError::TooShort {
            field: "cancellation_reason".to_string(),
            min: min_len,
        });
    }
    Ok(trimmed.to_string())
}

/// Validates a payment evidence file against the deployment rules.
///
/// Returns the lower-cased extension.
pub fn validate_evidence_file(
    file_name: &str,
    size_bytes: u64,
    rules: &EvidenceRules,
) -> ValidationResult<String> {
    let name = validate_required("evidence_file", file_name)?;

    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
        .ok_or_else(|| ValidationError::InvalidFormat {
            field: "evidence_file".to_string(),
            reason: "file has no extension".to_string(),
        })?;

    if !rules.allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(&extension)) {
        return Err(ValidationError::NotAllowed {
            field: "evidence_file".to_string(),
            allowed: rules.allowed_extensions.clone(),
        });
    }

    if size_bytes == 0 || size_bytes > rules.max_bytes {
        return Err(ValidationError::OutOfRange {
            field: "evidence_size".to_string(),
            min: 1,
            max: rules.max_bytes as i64,
        });
    }

    Ok(extension)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a tip percentage in basis points: (0%, 100%].
pub fn validate_tip_percentage_bps(bps: u32) -> ValidationResult<()> {
    if bps == 0 || bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "tip_percentage".to_string(),
            min: 1,
            max: 10_000,
        });
    }
    Ok(())
}

/// Validates a flat tip amount.
pub fn validate_tip_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "tip_amount".to_string(),
        });
    }
    Ok(())
}

/// Validates an inclusive report range.
pub fn validate_date_range(from: NaiveDate, to: NaiveDate) -> ValidationResult<()> {
    if from > to {
        return Err(ValidationError::InvalidFormat {
            field: "date_range".to_string(),
            reason: format!("start {} is after end {}", from, to),
        });
    }
    Ok(())
}

// =============================================================================
// ID Validators
// =============================================================================

/// Validates a UUID string.
///
/// ## Example
/// ```rust
/// use mesa_core::validation::validate_uuid;
///
/// assert!(validate_uuid("order_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("order_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    let id = validate_required(field, id)?;
    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_reason() {
        assert_eq!(
            validate_cancellation_reason("  customer disputed the bill  ", 10).unwrap(),
            "customer disputed the bill"
        );
        assert!(matches!(
            validate_cancellation_reason("  too short ", 10),
            Err(ValidationError::TooShort { min: 10, .. })
        ));
        assert!(matches!(
            validate_cancellation_reason("   ", 10),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_evidence_file() {
        let rules = EvidenceRules::default();
        assert_eq!(validate_evidence_file("voucher.PNG", 2048, &rules).unwrap(), "png");
        assert!(matches!(
            validate_evidence_file("voucher.exe", 2048, &rules),
            Err(ValidationError::NotAllowed { .. })
        ));
        assert!(matches!(
            validate_evidence_file("voucher", 2048, &rules),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(matches!(
            validate_evidence_file("voucher.pdf", rules.max_bytes + 1, &rules),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_tip_rules() {
        assert!(validate_tip_percentage_bps(1000).is_ok());
        assert!(validate_tip_percentage_bps(0).is_err());
        assert!(validate_tip_percentage_bps(10_001).is_err());
        assert!(validate_tip_amount(2000).is_ok());
        assert!(validate_tip_amount(0).is_err());
        assert!(validate_tip_amount(-1).is_err());
    }

    #[test]
    fn test_date_range() {
        let a = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
        let b = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert!(validate_date_range(a, b).is_ok());
        assert!(validate_date_range(a, a).is_ok());
        assert!(validate_date_range(b, a).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", &uuid::Uuid::new_v4().to_string()).is_ok());
        assert!(validate_uuid("id", "").is_err());
    }
}
