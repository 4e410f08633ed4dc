use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wrapper for contact details (phone numbers, email addresses) that hides
/// the value in Debug/Display output so it cannot leak through log macros
/// like tracing::info!("{:?}", booking). Serialization keeps the real value:
/// API responses and outbox payloads need it.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct Contact(pub String);

impl fmt::Debug for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.masked())
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.masked())
    }
}

impl Serialize for Contact {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl From<String> for Contact {
    fn from(value: String) -> Self {
        Contact(value)
    }
}

impl Contact {
    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Keep the last two characters visible so an operator can still match
    /// a record against what a caller reads out.
    fn masked(&self) -> String {
        let len = self.0.chars().count();
        if len <= 2 {
            return "****".to_string();
        }
        let tail: String = self.0.chars().skip(len - 2).collect();
        format!("****{}", tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_output_is_masked() {
        let phone = Contact("9876543210".to_string());
        assert_eq!(format!("{:?}", phone), "****10");
        assert_eq!(format!("{}", phone), "****10");
    }

    #[test]
    fn test_serialization_keeps_value() {
        let phone = Contact("9876543210".to_string());
        let json = serde_json::to_string(&phone).unwrap();
        assert_eq!(json, "\"9876543210\"");
    }

    #[test]
    fn test_short_values_fully_masked() {
        let phone = Contact("12".to_string());
        assert_eq!(format!("{}", phone), "****");
    }
}
