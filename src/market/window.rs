use crate::market::types::{DisplayRange, Observation};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::VecDeque;

pub const DEFAULT_WINDOW_SECS: u64 = 1_200;
pub const DEFAULT_Y_TICK: f64 = 250.0;

/// Time-ordered price history bounded by a trailing window.
///
/// Until the oldest retained point is `window` old, the x range is anchored at
/// that point (`[first, first + window]`) so the chart fills before it scrolls.
/// After that it slides as `[now - window, now]`.
#[derive(Debug, Clone)]
pub struct WindowAggregator {
    history: VecDeque<Observation>,
    window: TimeDelta,
    y_tick: f64,
}

impl WindowAggregator {
    pub fn new(window: TimeDelta, y_tick: f64) -> Self {
        Self {
            history: VecDeque::new(),
            window,
            y_tick,
        }
    }

    pub fn window(&self) -> TimeDelta {
        self.window
    }

    pub fn y_tick(&self) -> f64 {
        self.y_tick
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn first(&self) -> Option<&Observation> {
        self.history.front()
    }

    pub fn latest(&self) -> Option<&Observation> {
        self.history.back()
    }

    /// Appends in arrival order. A wall-clock step backwards is clamped to the
    /// previous timestamp so the history stays non-decreasing: the stored
    /// timestamp can therefore be later than the one the feed stamped.
    pub fn append(&mut self, mut observation: Observation) {
        if let Some(last) = self.history.back() {
            observation.timestamp = observation.timestamp.max(last.timestamp);
        }
        self.history.push_back(observation);
    }

    /// X-axis range for `now`, derived from the oldest retained point.
    pub fn x_range(&self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = self.first()?.timestamp;
        if now - first < self.window {
            Some((first, first + self.window))
        } else {
            Some((now - self.window, now))
        }
    }

    /// Drops every leading point older than the x-range start for `now`.
    pub fn trim(&mut self, now: DateTime<Utc>) -> usize {
        match self.x_range(now) {
            Some((x_start, _)) => self.trim_before(x_start),
            None => 0,
        }
    }

    fn trim_before(&mut self, x_start: DateTime<Utc>) -> usize {
        let stale = self
            .history
            .iter()
            .take_while(|observation| observation.timestamp < x_start)
            .count();
        self.history.drain(..stale);
        stale
    }

    /// Trims, then derives both axes from what remains. The x range is computed
    /// once, before trimming, so the trim and the returned range always agree.
    pub fn compute_display_range(&mut self, now: DateTime<Utc>) -> Option<DisplayRange> {
        let (x_start, x_end) = self.x_range(now)?;
        self.trim_before(x_start);

        let (min_price, max_price) = self.price_bounds()?;
        let (y_min, y_max) = y_axis_bounds(min_price, max_price, self.y_tick);

        Some(DisplayRange {
            x_start,
            x_end,
            y_min,
            y_max,
        })
    }

    fn price_bounds(&self) -> Option<(f64, f64)> {
        self.history.iter().fold(None, |bounds, observation| {
            let price = observation.price;
            Some(match bounds {
                None => (price, price),
                Some((low, high)) => (f64::min(low, price), f64::max(high, price)),
            })
        })
    }

    /// Contiguous view of the retained series, oldest first.
    pub fn series(&mut self) -> &[Observation] {
        self.history.make_contiguous()
    }
}

/// Gridline-aligned y bounds with at least one empty tick above and below.
pub fn y_axis_bounds(min_price: f64, max_price: f64, y_tick: f64) -> (f64, f64) {
    let low = ((min_price - y_tick) / y_tick).floor() * y_tick;
    let high = ((max_price + y_tick) / y_tick).ceil() * y_tick;
    (low, high)
}
