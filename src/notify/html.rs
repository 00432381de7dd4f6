//! HTML rendering of the stale-client report.

use crate::reconcile::StaleEntry;

pub fn render(entries: &[StaleEntry]) -> String {
    let mut rows = String::new();
    for entry in entries {
        let uploaded = entry
            .uploaded_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());

        rows.push_str(&format!(
            "      <tr>\n        <td>{}</td>\n        <td>{}</td>\n        <td>{}</td>\n      </tr>\n",
            escape(&entry.client_id),
            escape(&entry.file_name),
            uploaded
        ));
    }

    format!(
        "<h2>Stale backups</h2>\n\
         <p>The following clients have no recent backup:</p>\n\
         <table border=\"1\" cellpadding=\"5\" cellspacing=\"0\">\n\
         \x20 <thead>\n\
         \x20   <tr>\n\
         \x20     <th>Client</th>\n\
         \x20     <th>File</th>\n\
         \x20     <th>Uploaded</th>\n\
         \x20   </tr>\n\
         \x20 </thead>\n\
         \x20 <tbody>\n\
         {rows}\
         \x20 </tbody>\n\
         </table>\n\
         <p>Please contact these clients to bring their backups up to date.</p>\n"
    )
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn renders_one_row_per_entry() {
        let entries = vec![
            StaleEntry {
                client_id: "ACME".into(),
                file_name: "notes.txt".into(),
                uploaded_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
            },
            StaleEntry {
                client_id: "EMPTY".into(),
                file_name: "no backups found".into(),
                uploaded_at: None,
            },
        ];

        let html = render(&entries);
        assert_eq!(html.matches("<tr>").count(), 3);
        assert!(html.contains("<td>ACME</td>"));
        assert!(html.contains("2024-05-01 12:00:00 UTC"));
        assert!(html.contains("<td>never</td>"));
    }

    #[test]
    fn interpolated_text_is_escaped() {
        let entries = vec![StaleEntry {
            client_id: "<script>".into(),
            file_name: "a&b \"c\".zip".into(),
            uploaded_at: None,
        }];

        let html = render(&entries);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("a&amp;b &quot;c&quot;.zip"));
    }
}
