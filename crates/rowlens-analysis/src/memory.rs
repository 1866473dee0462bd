//! Peak resident-set-size sampling for the current process.
//!
//! A dedicated OS thread samples RSS every 100 ms between `start()` and
//! `stop()`, keeping a monotonically non-decreasing peak in an atomic so
//! reads never block the analyzer. An initial sample is taken before the
//! thread starts and a final one right before it exits.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use sysinfo::{Pid, System};

const SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Samples the current process RSS on a background thread.
///
/// Peak storage is a single `AtomicU64` of bytes; zero means no sample has
/// succeeded yet, in which case [`MemorySampler::peak_mb`] returns `None`
/// instead of fabricating a value.
pub struct MemorySampler {
    peak_bytes: Arc<AtomicU64>,
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

fn current_rss_bytes(system: &mut System, pid: Pid) -> Option<u64> {
    if !system.refresh_process(pid) {
        return None;
    }
    system.process(pid).map(|p| p.memory())
}

fn record_sample(system: &mut System, pid: Pid, peak: &AtomicU64) {
    if let Some(rss) = current_rss_bytes(system, pid) {
        peak.fetch_max(rss, Ordering::Relaxed);
    }
}

impl MemorySampler {
    /// Start sampling. Takes one sample synchronously before the thread spins
    /// up so short-lived analyses still observe a peak.
    pub fn start() -> Self {
        let peak_bytes = Arc::new(AtomicU64::new(0));
        let stop_flag = Arc::new(AtomicBool::new(false));
        let pid = Pid::from_u32(std::process::id());

        let mut system = System::new();
        record_sample(&mut system, pid, &peak_bytes);

        let peak = Arc::clone(&peak_bytes);
        let stop = Arc::clone(&stop_flag);
        let handle = std::thread::Builder::new()
            .name("rowlens-mem-sampler".to_string())
            .spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    std::thread::sleep(SAMPLE_INTERVAL);
                    record_sample(&mut system, pid, &peak);
                }
                // Final sample on the way out.
                record_sample(&mut system, pid, &peak);
            })
            .ok();

        if handle.is_none() {
            tracing::warn!("Failed to spawn memory sampler thread; peak memory will be partial");
        }

        MemorySampler {
            peak_bytes,
            stop_flag,
            handle,
        }
    }

    /// Running peak in MB. `None` until a sample has succeeded.
    pub fn peak_mb(&self) -> Option<f64> {
        let bytes = self.peak_bytes.load(Ordering::Relaxed);
        if bytes == 0 {
            None
        } else {
            Some(bytes as f64 / (1024.0 * 1024.0))
        }
    }

    /// Stop the sampling thread and return the final peak. The thread exits
    /// within one sampling interval.
    pub fn stop(mut self) -> Option<f64> {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Memory sampler thread panicked");
            }
        }
        self.peak_mb()
    }
}

impl Drop for MemorySampler {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn reports_a_positive_peak_for_a_live_process() {
        let sampler = MemorySampler::start();
        std::thread::sleep(Duration::from_millis(150));
        let peak = sampler.stop();
        // RSS of a running test binary is always nonzero on supported platforms.
        let peak = peak.expect("expected at least one RSS sample");
        assert!(peak > 0.0);
    }

    #[test]
    fn peak_is_non_decreasing_while_running() {
        let sampler = MemorySampler::start();
        let first = sampler.peak_mb().unwrap_or(0.0);
        std::thread::sleep(Duration::from_millis(120));
        let second = sampler.peak_mb().unwrap_or(0.0);
        assert!(second >= first);
        sampler.stop();
    }

    #[test]
    fn stop_returns_within_one_interval() {
        let sampler = MemorySampler::start();
        let started = Instant::now();
        sampler.stop();
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
