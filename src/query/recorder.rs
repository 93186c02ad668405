use chrono::{DateTime, Utc};

use super::types::QueryTemplate;

/// Apply one successful execution to a template's statistics.
///
/// Not atomic: concurrent callers holding copies of the same template race and
/// the last write wins. Persistent registries apply [`next_average`] in a
/// single UPDATE instead.
pub fn record_execution(template: &mut QueryTemplate, elapsed_ms: f64, at: DateTime<Utc>) {
    let elapsed_ms = if elapsed_ms.is_finite() { elapsed_ms.max(0.0) } else { 0.0 };

    template.execution_count += 1;
    template.last_executed = Some(match template.last_executed {
        Some(previous) if previous > at => previous,
        _ => at,
    });
    template.average_execution_time = next_average(template.average_execution_time, elapsed_ms);
}

/// Two-point running average. Over-weights recent samples; kept as-is because
/// stored averages were computed this way.
pub fn next_average(previous: f64, elapsed_ms: f64) -> f64 {
    if previous == 0.0 {
        elapsed_ms
    } else {
        (previous + elapsed_ms) / 2.0
    }
}
