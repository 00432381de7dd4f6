use chrono::{DateTime, Duration, Utc};

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Coarse age for tables: days once past a day, hours past an hour, else minutes.
pub fn format_age(age: Duration) -> String {
    if age < Duration::zero() {
        return "future".to_string();
    }

    if age.num_days() >= 1 {
        format!("{}d", age.num_days())
    } else if age.num_hours() >= 1 {
        format!("{}h", age.num_hours())
    } else {
        format!("{}m", age.num_minutes())
    }
}
