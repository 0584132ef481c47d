use chrono::Local;

/// Date key for today's attendance document, `YYYY-MM-DD` in local time.
pub fn today_date_id() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}
