use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
    time::{Duration, Instant},
};

use crate::error::{AppError, AppResult};

const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Limits applied to expensive on-demand work
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub per_ip_per_hour: u32,
    pub per_ip_per_day: u32,
    /// Global cap on review generations per 24h window
    pub daily_generations: u32,
}

/// What a request is being charged for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charge {
    /// Counts against the per-IP limits and the global generation cap
    Generation,
    /// Counts against the per-IP limits only
    OnDemand,
}

#[derive(Default)]
struct Windows {
    hourly: HashMap<String, VecDeque<Instant>>,
    daily: HashMap<String, VecDeque<Instant>>,
    generations: u32,
    generations_since: Option<Instant>,
    last_sweep: Option<Instant>,
}

impl Windows {
    /// Forgets addresses with no requests left in their windows
    fn sweep(&mut self, now: Instant) {
        self.hourly.retain(|_, entries| {
            prune(entries, HOUR, now);
            !entries.is_empty()
        });
        self.daily.retain(|_, entries| {
            prune(entries, DAY, now);
            !entries.is_empty()
        });
        self.last_sweep = Some(now);
    }
}

/// In-process sliding window limiter keyed by client IP
///
/// Suitable for a single-instance deployment; state is lost on restart.
pub struct RateLimiter {
    limits: RateLimits,
    windows: Mutex<Windows>,
}

fn prune(entries: &mut VecDeque<Instant>, window: Duration, now: Instant) {
    while let Some(&oldest) = entries.front() {
        if now.saturating_duration_since(oldest) >= window {
            entries.pop_front();
        } else {
            break;
        }
    }
}

impl RateLimiter {
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            windows: Mutex::new(Windows::default()),
        }
    }

    /// Checks every applicable limit and records the request if none is exceeded
    pub fn check(&self, ip: &str, charge: Charge) -> AppResult<()> {
        self.check_at(ip, charge, Instant::now())
    }

    fn check_at(&self, ip: &str, charge: Charge, now: Instant) -> AppResult<()> {
        let mut windows = self
            .windows
            .lock()
            .map_err(|_| AppError::Internal("rate limiter lock poisoned".to_string()))?;

        let last_sweep = *windows.last_sweep.get_or_insert(now);
        if now.saturating_duration_since(last_sweep) >= SWEEP_INTERVAL {
            windows.sweep(now);
        }

        let window_start = *windows.generations_since.get_or_insert(now);
        if now.saturating_duration_since(window_start) >= DAY {
            windows.generations = 0;
            windows.generations_since = Some(now);
        }

        if charge == Charge::Generation && windows.generations >= self.limits.daily_generations {
            tracing::warn!(
                limit = self.limits.daily_generations,
                "Global daily generation limit reached"
            );
            return Err(AppError::RateLimited(
                "Daily generation limit reached. Try again tomorrow.".to_string(),
            ));
        }

        let used_hour = windows
            .hourly
            .get_mut(ip)
            .map_or(0, |entries| {
                prune(entries, HOUR, now);
                entries.len()
            });
        if used_hour >= self.limits.per_ip_per_hour as usize {
            return Err(AppError::RateLimited(format!(
                "Rate limit exceeded. Max {} requests per hour.",
                self.limits.per_ip_per_hour
            )));
        }

        let used_day = windows
            .daily
            .get_mut(ip)
            .map_or(0, |entries| {
                prune(entries, DAY, now);
                entries.len()
            });
        if used_day >= self.limits.per_ip_per_day as usize {
            return Err(AppError::RateLimited(format!(
                "Daily rate limit exceeded. Max {} requests per day.",
                self.limits.per_ip_per_day
            )));
        }

        windows.hourly.entry(ip.to_string()).or_default().push_back(now);
        windows.daily.entry(ip.to_string()).or_default().push_back(now);
        if charge == Charge::Generation {
            windows.generations += 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn limiter(hour: u32, day: u32, global: u32) -> RateLimiter {
        RateLimiter::new(RateLimits {
            per_ip_per_hour: hour,
            per_ip_per_day: day,
            daily_generations: global,
        })
    }

    #[test]
    fn test_hourly_limit_per_ip() {
        let limiter = limiter(2, 30, 200);
        let now = Instant::now();

        assert!(limiter.check_at("1.1.1.1", Charge::OnDemand, now).is_ok());
        assert!(limiter.check_at("1.1.1.1", Charge::OnDemand, now).is_ok());
        let err = limiter
            .check_at("1.1.1.1", Charge::OnDemand, now)
            .unwrap_err();
        assert!(matches!(err, AppError::RateLimited(_)));

        // Another address has its own budget
        assert!(limiter.check_at("2.2.2.2", Charge::OnDemand, now).is_ok());
    }

    #[test]
    fn test_hourly_window_slides() {
        let limiter = limiter(1, 30, 200);
        let start = Instant::now();

        assert_ok!(limiter.check_at("ip", Charge::OnDemand, start));
        assert_err!(limiter.check_at("ip", Charge::OnDemand, start));
        assert_ok!(limiter.check_at(
            "ip",
            Charge::OnDemand,
            start + HOUR + Duration::from_secs(1)
        ));
    }

    #[test]
    fn test_daily_limit_per_ip() {
        let limiter = limiter(10, 3, 200);
        let start = Instant::now();

        for i in 0..3 {
            let at = start + HOUR * i;
            assert!(limiter.check_at("ip", Charge::OnDemand, at).is_ok());
        }
        let err = limiter
            .check_at("ip", Charge::OnDemand, start + HOUR * 4)
            .unwrap_err();
        assert!(err.to_string().contains("per day"));
    }

    #[test]
    fn test_global_generation_cap_ignores_on_demand() {
        let limiter = limiter(10, 30, 1);
        let now = Instant::now();

        assert_ok!(limiter.check_at("a", Charge::Generation, now));
        assert_err!(limiter.check_at("b", Charge::Generation, now));
        assert_ok!(limiter.check_at("b", Charge::OnDemand, now));
    }

    #[test]
    fn test_idle_addresses_are_forgotten() {
        let busy = limiter(10, 30, 200);
        let strict = limiter(0, 30, 200);
        let start = Instant::now();

        for i in 0..50 {
            assert_ok!(busy.check_at(&format!("10.0.0.{}", i), Charge::OnDemand, start));
        }
        // Rejections leave no trace for addresses never seen before
        assert_err!(strict.check_at("10.9.9.9", Charge::OnDemand, start));
        assert!(strict.windows.lock().unwrap().hourly.is_empty());

        let later = start + DAY + SWEEP_INTERVAL;
        assert_ok!(busy.check_at("192.0.2.1", Charge::OnDemand, later));

        let windows = busy.windows.lock().unwrap();
        assert_eq!(windows.hourly.len(), 1);
        assert_eq!(windows.daily.len(), 1);
        assert!(windows.daily.contains_key("192.0.2.1"));
    }

    #[test]
    fn test_rejected_requests_are_not_recorded() {
        let limiter = limiter(1, 30, 0);
        let now = Instant::now();

        assert!(limiter.check_at("ip", Charge::Generation, now).is_err());
        assert!(limiter.check_at("ip", Charge::OnDemand, now).is_ok());
    }
}
