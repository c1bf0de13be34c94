use std::{
    sync::{
        OnceLock,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Returns a process-unique connection id for log correlation.
///
/// Seeded from the wall clock so ids from consecutive runs rarely overlap in aggregated logs.
pub fn conn_id() -> u64 {
    static COUNTER: OnceLock<AtomicU64> = OnceLock::new();
    let counter = COUNTER.get_or_init(|| AtomicU64::new(now_millis()));
    counter.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_ids_are_drawn_then_they_are_strictly_increasing() {
        let a = conn_id();
        let b = conn_id();
        assert!(b > a);
    }
}
