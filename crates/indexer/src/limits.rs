const MAX_SCAN_CONCURRENCY: usize = 32;
const SCAN_CONCURRENCY_ENV: &str = "CONTEXT_SCAN_CONCURRENCY";

fn default_scan_concurrency() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    // Listing is I/O bound: two permits per core, capped at 16.
    (cpus * 2).clamp(2, 16)
}

pub(crate) fn parse_scan_concurrency(raw: Option<&str>, default_value: usize) -> usize {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default_value)
        .clamp(1, MAX_SCAN_CONCURRENCY)
}

/// Scan worker-pool size: `CONTEXT_SCAN_CONCURRENCY` when set, otherwise
/// derived from the available cores. Always within `1..=32`.
pub fn scan_concurrency_from_env() -> usize {
    let raw = std::env::var(SCAN_CONCURRENCY_ENV).ok();
    parse_scan_concurrency(raw.as_deref(), default_scan_concurrency())
}

pub fn clamp_scan_concurrency(value: usize) -> usize {
    value.clamp(1, MAX_SCAN_CONCURRENCY)
}
