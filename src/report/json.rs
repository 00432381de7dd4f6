//! JSON output for scan reports and stored statuses.
//!
//! Serializes to pretty JSON for scripting and piping.

use serde::Serialize;

use crate::error::Result;

pub fn render<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ArtifactKind;
    use crate::store::BackupStatus;

    #[test]
    fn status_serializes_with_upper_case_kind() {
        let json = render(&BackupStatus::missing("ACME")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["client_id"], "ACME");
        assert_eq!(value["kind"], ArtifactKind::None.as_str());
        assert_eq!(value["uploaded_at"], serde_json::Value::Null);
        assert_eq!(value["is_current"], false);
    }
}
