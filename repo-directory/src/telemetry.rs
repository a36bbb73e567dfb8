use metrics::{counter, gauge, histogram};

pub struct DirectoryTelemetry;

impl DirectoryTelemetry {
    pub fn record_refresh_success(entries: usize, duration_secs: f64) {
        counter!("repository_directory_refreshes_total", "outcome" => "success").increment(1);
        histogram!("repository_directory_refresh_duration_seconds").record(duration_secs);
        gauge!("repository_directory_entries").set(entries as f64);
    }

    pub fn record_refresh_failure(duration_secs: f64) {
        counter!("repository_directory_refreshes_total", "outcome" => "failure").increment(1);
        histogram!("repository_directory_refresh_duration_seconds").record(duration_secs);
    }

    pub fn record_lookup(hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        counter!("repository_directory_lookups_total", "result" => result).increment(1);
    }
}
