const DEFAULT_AUTO_APPROVE_THRESHOLD: f64 = 65.0;
const DEFAULT_PREEMPTION_MARGIN: f64 = 15.0;
const DEFAULT_MODIFICATION_WINDOW_HOURS: i64 = 24;

/// Dials used by the resolver and the modification path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllocationPolicy {
    auto_approve_threshold: f64,
    preemption_margin: f64,
    modification_window_hours: i64,
}

impl AllocationPolicy {
    /// Out-of-range values fall back to the defaults.
    pub fn new(
        auto_approve_threshold: f64,
        preemption_margin: f64,
        modification_window_hours: i64,
    ) -> Self {
        let auto_approve_threshold =
            if auto_approve_threshold.is_finite() && (0.0..=100.0).contains(&auto_approve_threshold) {
                auto_approve_threshold
            } else {
                DEFAULT_AUTO_APPROVE_THRESHOLD
            };
        let preemption_margin = if preemption_margin.is_finite() && preemption_margin >= 0.0 {
            preemption_margin
        } else {
            DEFAULT_PREEMPTION_MARGIN
        };
        let modification_window_hours = if modification_window_hours >= 0 {
            modification_window_hours
        } else {
            DEFAULT_MODIFICATION_WINDOW_HOURS
        };

        Self {
            auto_approve_threshold,
            preemption_margin,
            modification_window_hours,
        }
    }

    pub fn auto_approve_threshold(&self) -> f64 {
        self.auto_approve_threshold
    }

    pub fn preemption_margin(&self) -> f64 {
        self.preemption_margin
    }

    pub fn modification_window_hours(&self) -> i64 {
        self.modification_window_hours
    }
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_AUTO_APPROVE_THRESHOLD,
            DEFAULT_PREEMPTION_MARGIN,
            DEFAULT_MODIFICATION_WINDOW_HOURS,
        )
    }
}
