//! Inter-source delay.
//!
//! ```text
//! delay = base * memory_factor * time_of_day_factor + jitter
//! ```
//!
//! Each factor is >= 1.0, so pressure signals only ever lengthen the delay.

use std::sync::Arc;
use std::time::Duration;

use chrono::Timelike;
use rand::Rng;

use crate::models::RateLimitConfig;
use crate::utils::memory::{MemoryPressureSignal, PressureLevel};

pub struct AdaptiveRateLimiter {
    config: RateLimitConfig,
    pressure: Arc<dyn MemoryPressureSignal>,
}

impl AdaptiveRateLimiter {
    pub fn new(config: RateLimitConfig, pressure: Arc<dyn MemoryPressureSignal>) -> Self {
        Self { config, pressure }
    }

    pub fn memory_factor(&self, level: PressureLevel) -> f64 {
        match level {
            PressureLevel::Normal => 1.0,
            PressureLevel::Warning => self.config.warning_factor,
            PressureLevel::Critical | PressureLevel::Emergency => self.config.critical_factor,
        }
    }

    /// Peak factor when `hour` falls in the inclusive peak window.
    pub fn time_of_day_factor(&self, hour: u32) -> f64 {
        let (start, end) = (self.config.peak_start_hour, self.config.peak_end_hour);
        let in_peak = if start <= end {
            (start..=end).contains(&hour)
        } else {
            // Window wraps past midnight
            hour >= start || hour <= end
        };
        if in_peak { self.config.peak_factor } else { 1.0 }
    }

    /// Delay before jitter.
    pub fn scaled_base(&self, level: PressureLevel, hour: u32) -> Duration {
        let factor = self.memory_factor(level) * self.time_of_day_factor(hour);
        Duration::from_millis((self.config.base_delay_ms as f64 * factor).round() as u64)
    }

    /// Deterministic delay for the given inputs. `jitter_ms` is clamped to the
    /// configured maximum.
    pub fn delay_for(&self, level: PressureLevel, hour: u32, jitter_ms: u64) -> Duration {
        self.scaled_base(level, hour) + Duration::from_millis(jitter_ms.min(self.config.jitter_max_ms))
    }

    /// Delay for the current memory pressure, local hour and a random jitter.
    pub fn next_delay(&self) -> Duration {
        let jitter = match self.config.jitter_max_ms {
            0 => 0,
            max => rand::thread_rng().gen_range(0..=max),
        };
        let level = self.pressure.level();
        let hour = chrono::Local::now().hour();
        let delay = self.delay_for(level, hour, jitter);
        log::debug!("Rate limit delay {delay:?} (pressure {level:?}, hour {hour})");
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory::FixedPressure;

    fn limiter(level: PressureLevel) -> AdaptiveRateLimiter {
        AdaptiveRateLimiter::new(RateLimitConfig::default(), Arc::new(FixedPressure(level)))
    }

    #[test]
    fn test_factors() {
        let l = limiter(PressureLevel::Normal);
        assert_eq!(l.memory_factor(PressureLevel::Normal), 1.0);
        assert_eq!(l.memory_factor(PressureLevel::Warning), 1.5);
        assert_eq!(l.memory_factor(PressureLevel::Critical), 2.0);
        assert_eq!(l.memory_factor(PressureLevel::Emergency), 2.0);
        assert_eq!(l.time_of_day_factor(17), 1.0);
        assert_eq!(l.time_of_day_factor(18), 1.3);
        assert_eq!(l.time_of_day_factor(23), 1.3);
        assert_eq!(l.time_of_day_factor(0), 1.0);
    }

    #[test]
    fn test_delay_for_is_deterministic() {
        let l = limiter(PressureLevel::Normal);
        assert_eq!(l.delay_for(PressureLevel::Normal, 10, 0), Duration::from_millis(2000));
        assert_eq!(l.delay_for(PressureLevel::Warning, 10, 250), Duration::from_millis(3250));
        assert_eq!(l.delay_for(PressureLevel::Critical, 20, 0), Duration::from_millis(5200));
        // Jitter beyond the maximum is clamped
        assert_eq!(l.delay_for(PressureLevel::Normal, 10, 5000), Duration::from_millis(3000));
    }

    #[test]
    fn test_next_delay_bounds() {
        for level in [
            PressureLevel::Normal,
            PressureLevel::Warning,
            PressureLevel::Critical,
            PressureLevel::Emergency,
        ] {
            let l = limiter(level);
            let low = l.scaled_base(level, 10);
            let high = l.scaled_base(level, 20) + Duration::from_millis(1000);
            for _ in 0..50 {
                let delay = l.next_delay();
                assert!(delay >= low && delay <= high, "{delay:?} outside [{low:?}, {high:?}]");
            }
        }
    }

    #[test]
    fn test_wrapping_peak_window() {
        let config = RateLimitConfig {
            peak_start_hour: 22,
            peak_end_hour: 2,
            ..RateLimitConfig::default()
        };
        let l = AdaptiveRateLimiter::new(config, Arc::new(FixedPressure(PressureLevel::Normal)));
        assert_eq!(l.time_of_day_factor(23), 1.3);
        assert_eq!(l.time_of_day_factor(1), 1.3);
        assert_eq!(l.time_of_day_factor(12), 1.0);
    }
}
