//! Scoping: qualify plain string values with an administrative scope

use crate::attribute::AttributeValue;

use super::{expect_string, TransformError};

/// Attach a static scope to each string value.
///
/// Already-scoped and binary values are rejected: a scoped definition fed
/// anything but plain strings is misconfigured, and silently re-scoping
/// would corrupt the released attribute.
pub fn attach_scope(
    values: &[AttributeValue],
    scope: &str,
) -> Result<Vec<AttributeValue>, TransformError> {
    values
        .iter()
        .map(|value| {
            let local = expect_string(value)?;
            Ok(AttributeValue::Scoped {
                value: local.to_string(),
                scope: scope.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attaches_scope_to_every_value() {
        let values = vec![AttributeValue::from("member"), AttributeValue::from("staff")];
        let scoped = attach_scope(&values, "example.org").unwrap();
        let rendered: Vec<String> = scoped.iter().map(|v| v.to_string()).collect();
        assert_eq!(rendered, vec!["member@example.org", "staff@example.org"]);
    }

    #[test]
    fn rejects_already_scoped_values() {
        let values = vec![AttributeValue::scoped("member", "example.org")];
        assert!(matches!(
            attach_scope(&values, "other.org"),
            Err(TransformError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn rejects_bytes() {
        let values = vec![AttributeValue::Bytes(vec![0x00])];
        assert!(matches!(
            attach_scope(&values, "example.org"),
            Err(TransformError::TypeMismatch { .. })
        ));
    }
}
