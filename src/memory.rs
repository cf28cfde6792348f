use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sysinfo::{Pid, System};

use crate::cache::CacheRegistry;

const SAMPLE_INTERVAL: Duration = Duration::from_secs(30);

/// The priority order in which caches are drained under memory pressure,
/// matching §9's "transcripts first, search pages next, metadata last, token
/// cache last": transcript results (largest, most re-fetchable) drain first,
/// then the churny pagination caches, then the smaller metadata lookups,
/// leaving the token-count cache for last since it is cheapest to keep and
/// costs a tokenizer pass to repopulate.
const PRESSURE_CLEAR_PRIORITY: &[&str] = &[
    "transcript.positive",
    "transcript.negative",
    "api.playlist_items",
    "api.search_page",
    "api.video",
    "api.channel",
    "api.playlist_meta",
    "token.count",
];

/// Samples process RSS at a fixed interval and, when usage crosses a
/// high-water mark, invokes the Cache Registry's `pressure_clear` (§4.8).
/// Runs as a background task; `stop()` (or dropping the returned handle)
/// ends it, corresponding to "stops when the process enters shutdown".
pub struct MemoryMonitor {
    shutdown: Arc<AtomicBool>,
}

impl MemoryMonitor {
    /// Spawns the monitor task. `soft_cap_bytes` and `high_water_fraction`
    /// come from `IngestConfig`; `registry` is cleared, in priority order,
    /// whenever sampled RSS exceeds `soft_cap_bytes * high_water_fraction`.
    pub fn spawn(
        registry: Arc<CacheRegistry>,
        soft_cap_bytes: u64,
        high_water_fraction: f64,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let task_shutdown = shutdown.clone();

        tokio::spawn(async move {
            let mut system = System::new();
            let pid = Pid::from_u32(std::process::id());
            let high_water_mark = (soft_cap_bytes as f64 * high_water_fraction) as u64;

            while !task_shutdown.load(Ordering::Relaxed) {
                tokio::time::sleep(SAMPLE_INTERVAL).await;
                if task_shutdown.load(Ordering::Relaxed) {
                    break;
                }

                system.refresh_process(pid);
                let Some(process) = system.process(pid) else {
                    continue;
                };
                let resident_bytes = process.memory();

                if resident_bytes > high_water_mark {
                    log::warn!(
                        "memory monitor: rss {resident_bytes}B exceeds high-water mark {high_water_mark}B, clearing caches"
                    );
                    let mut sample = System::new();
                    let abated = || {
                        sample.refresh_process(pid);
                        sample
                            .process(pid)
                            .map(|p| p.memory() <= high_water_mark)
                            .unwrap_or(true)
                    };
                    registry.pressure_clear(PRESSURE_CLEAR_PRIORITY, abated);
                }
            }
        });

        Self { shutdown }
    }

    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

impl Drop for MemoryMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
