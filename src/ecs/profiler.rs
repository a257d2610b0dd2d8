use bevy_ecs::prelude::Resource;
use std::collections::HashMap;
use std::time::Instant;

#[derive(Clone, Copy, Debug)]
pub struct SystemTimingSummary {
    pub name: &'static str,
    pub last_ms: f32,
    pub average_ms: f32,
    pub max_ms: f32,
    pub samples: u64,
}

#[derive(Default)]
struct SystemTiming {
    last_ms: f32,
    total_ms: f64,
    max_ms: f32,
    samples: u64,
}

impl SystemTiming {
    fn summary(&self, name: &'static str) -> SystemTimingSummary {
        let average_ms = if self.samples == 0 { 0.0 } else { (self.total_ms / self.samples as f64) as f32 };
        SystemTimingSummary { name, last_ms: self.last_ms, average_ms, max_ms: self.max_ms, samples: self.samples }
    }
}

/// Wall-clock cost of each sprite system, keyed by system name.
#[derive(Resource, Default)]
pub struct SystemProfiler {
    timings: HashMap<&'static str, SystemTiming>,
}

impl SystemProfiler {
    /// Times everything until the returned guard is dropped.
    pub fn scope(&mut self, name: &'static str) -> SystemProfileScope<'_> {
        SystemProfileScope { name, profiler: self, start: Instant::now() }
    }

    fn record(&mut self, name: &'static str, duration_ms: f32) {
        let entry = self.timings.entry(name).or_default();
        entry.last_ms = duration_ms;
        entry.max_ms = entry.max_ms.max(duration_ms);
        entry.total_ms += f64::from(duration_ms);
        entry.samples += 1;
    }

    /// Most expensive system (by last sample) first.
    pub fn summaries(&self) -> Vec<SystemTimingSummary> {
        let mut out: Vec<_> = self.timings.iter().map(|(&name, timing)| timing.summary(name)).collect();
        out.sort_by(|a, b| b.last_ms.total_cmp(&a.last_ms));
        out
    }
}

pub struct SystemProfileScope<'a> {
    name: &'static str,
    profiler: &'a mut SystemProfiler,
    start: Instant,
}

impl Drop for SystemProfileScope<'_> {
    fn drop(&mut self) {
        let duration_ms = self.start.elapsed().as_secs_f32() * 1000.0;
        self.profiler.record(self.name, duration_ms);
    }
}
