//! Spending limits over rolling time windows.
//!
//! [`BudgetController::check`] answers whether a payment may proceed and never changes
//! state; [`BudgetController::record_payment`] is called only after a payment settled.
//! [`BudgetController::reserve`] combines both for callers that pay concurrently: the amount
//! counts against the limits while the payment is in flight.

use std::{collections::VecDeque, sync::Arc};

use bon::Builder;
use parking_lot::Mutex;

use crate::{
    clock::{Clock, SystemClock},
    errors::{Error, LimitType, Result},
};

/// One hour in milliseconds.
pub const HOUR_MS: u64 = 3_600_000;
/// One day in milliseconds, also the longest window tracked.
pub const DAY_MS: u64 = 86_400_000;

/// Spending limits, in satoshis.
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
pub struct BudgetConfig {
    /// Largest single payment.
    #[builder(default = 1_000)]
    pub max_per_request: u64,
    /// Largest total over any trailing hour.
    #[builder(default = 10_000)]
    pub max_per_hour: u64,
    /// Largest total over any trailing day.
    #[builder(default = 50_000)]
    pub max_per_day: u64,
    /// If set, only these domains may be paid (compared case-insensitively).
    pub allowed_domains: Option<Vec<String>>,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        BudgetConfig::builder().build()
    }
}

/// Budget setting of a client: explicit limits, or no budget enforcement at all.
///
/// The default applies [`BudgetConfig::default`]. `Disabled` skips checking and recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BudgetPolicy {
    Limits(BudgetConfig),
    Disabled,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        BudgetPolicy::Limits(BudgetConfig::default())
    }
}

impl From<BudgetConfig> for BudgetPolicy {
    fn from(config: BudgetConfig) -> Self {
        BudgetPolicy::Limits(config)
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    timestamp_ms: u64,
    amount: u64,
}

#[derive(Debug, Default)]
struct Window {
    // Ordered by insertion time, which is also timestamp order.
    entries: VecDeque<WindowEntry>,
    // Sum of outstanding reservations.
    reserved: u64,
}

/// Rolling-window rate limiter for payments.
pub struct BudgetController {
    config: BudgetConfig,
    clock: Arc<dyn Clock>,
    window: Mutex<Window>,
}

impl std::fmt::Debug for BudgetController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BudgetController")
            .field("config", &self.config)
            .field("entries", &self.window.lock().entries.len())
            .finish()
    }
}

impl BudgetController {
    pub fn new(config: BudgetConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: BudgetConfig, clock: Arc<dyn Clock>) -> Self {
        BudgetController {
            config,
            clock,
            window: Mutex::new(Window::default()),
        }
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    /// Check whether a payment of `amount` sats to `domain` is within budget.
    ///
    /// Checks run in a fixed order: domain allow-list, per-request, per-hour, per-day.
    /// The first violation is returned. Outstanding reservations count as spent.
    pub fn check(&self, amount: u64, domain: Option<&str>) -> Result<()> {
        let window = self.window.lock();
        self.evaluate(&window, amount, domain)
    }

    /// Check and hold `amount` against the limits until the reservation is committed or
    /// dropped.
    pub fn reserve(&self, amount: u64, domain: Option<&str>) -> Result<Reservation<'_>> {
        let mut window = self.window.lock();
        self.evaluate(&window, amount, domain)?;
        window.reserved = window.reserved.saturating_add(amount);
        Ok(Reservation {
            budget: self,
            amount,
            released: false,
        })
    }

    fn evaluate(&self, window: &Window, amount: u64, domain: Option<&str>) -> Result<()> {
        if let Some(allowed) = &self.config.allowed_domains {
            let permitted = domain
                .is_some_and(|d| allowed.iter().any(|a| a.eq_ignore_ascii_case(d)));
            if !permitted {
                return Err(Error::DomainNotAllowed {
                    domain: domain.unwrap_or_default().to_string(),
                });
            }
        }

        if amount > self.config.max_per_request {
            return Err(Error::BudgetExceeded {
                limit_type: LimitType::PerRequest,
                limit: self.config.max_per_request,
                current: 0,
                requested: amount,
            });
        }

        let now = self.clock.now_ms();
        let hour = sum_since(&window.entries, now, HOUR_MS).saturating_add(window.reserved);
        let day = sum_since(&window.entries, now, DAY_MS).saturating_add(window.reserved);

        if hour.saturating_add(amount) > self.config.max_per_hour {
            return Err(Error::BudgetExceeded {
                limit_type: LimitType::PerHour,
                limit: self.config.max_per_hour,
                current: hour,
                requested: amount,
            });
        }

        if day.saturating_add(amount) > self.config.max_per_day {
            return Err(Error::BudgetExceeded {
                limit_type: LimitType::PerDay,
                limit: self.config.max_per_day,
                current: day,
                requested: amount,
            });
        }

        Ok(())
    }

    /// Record a settled payment at the current time.
    pub fn record_payment(&self, amount: u64) {
        let now = self.clock.now_ms();
        let mut window = self.window.lock();
        prune(&mut window.entries, now);
        window.entries.push_back(WindowEntry {
            timestamp_ms: now,
            amount,
        });
    }

    fn release(&self, amount: u64, settled: bool) {
        let now = self.clock.now_ms();
        let mut window = self.window.lock();
        window.reserved = window.reserved.saturating_sub(amount);
        if settled {
            prune(&mut window.entries, now);
            window.entries.push_back(WindowEntry {
                timestamp_ms: now,
                amount,
            });
        }
    }

    /// Total settled in the trailing hour.
    pub fn spent_last_hour(&self) -> u64 {
        self.spent_within(HOUR_MS)
    }

    /// Total settled in the trailing day.
    pub fn spent_last_day(&self) -> u64 {
        self.spent_within(DAY_MS)
    }

    fn spent_within(&self, span_ms: u64) -> u64 {
        let now = self.clock.now_ms();
        let mut window = self.window.lock();
        prune(&mut window.entries, now);
        sum_since(&window.entries, now, span_ms)
    }
}

/// Budget held for a payment in flight.
///
/// [`commit`](Reservation::commit) records the payment; dropping it uncommitted gives the
/// amount back.
#[derive(Debug)]
#[must_use = "dropping a reservation releases it"]
pub struct Reservation<'a> {
    budget: &'a BudgetController,
    amount: u64,
    released: bool,
}

impl Reservation<'_> {
    pub fn amount(&self) -> u64 {
        self.amount
    }

    /// Record the reserved amount as a settled payment.
    pub fn commit(mut self) {
        self.released = true;
        self.budget.release(self.amount, true);
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.budget.release(self.amount, false);
        }
    }
}

/// Sum of entries with `timestamp > now - span`.
fn sum_since(window: &VecDeque<WindowEntry>, now: u64, span_ms: u64) -> u64 {
    let cutoff = now.saturating_sub(span_ms);
    window
        .iter()
        .rev()
        .take_while(|e| e.timestamp_ms > cutoff)
        .fold(0u64, |acc, e| acc.saturating_add(e.amount))
}

/// Drop entries that fell out of the longest window.
fn prune(window: &mut VecDeque<WindowEntry>, now: u64) {
    let cutoff = now.saturating_sub(DAY_MS);
    while window.front().is_some_and(|e| e.timestamp_ms <= cutoff) {
        window.pop_front();
    }
}
