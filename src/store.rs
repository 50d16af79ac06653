//! Variable identities shared between the model builder and the
//! relax-and-fix loop, the append-only store of values fixed by earlier
//! windows, and the policies deciding how each variable is instantiated
//! in a given build.

use std::collections::HashMap;

/// Every kind of decision variable in the formulation. One column per
/// (kind, reservoir, step, slot) tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKind {
    /// Stored volume at the end of a step.
    Volume,
    /// Total flow entering the reservoir at a step.
    Inflow,
    /// Flow released through the channel at a step.
    Outflow,
    /// Flow reaching the turbines, the lag-averaged released flow.
    Turbined,
    /// Generated power at a step.
    Power,
    /// Signed released-flow change against the previous step.
    FlowChange,
    /// Indicator of an upward flow change.
    UpChange,
    /// Indicator of a downward flow change.
    DownChange,
    /// Segment indicator of the power-curve encoding. Slot is the
    /// 1-based segment id, with the two phantom ids 0 and n pinned off.
    PqIndicator,
    /// Convex weight of a power-curve breakpoint. Slot is 0-based.
    PqWeight,
    /// Segment indicator of the volume/max-flow curve encoding.
    VqIndicator,
    /// Convex weight of a volume/max-flow breakpoint.
    VqWeight,
    /// Interpolated volume-dependent flow cap.
    FlowCap,
    /// Terminal volume above its target.
    PositiveDeviation,
    /// Terminal volume below its target.
    NegativeDeviation,
    /// Net income of the terminal-volume deviation.
    DeviationIncome,
    /// Number of steps spent inside a limit zone over the horizon.
    LimitZoneCount,
    /// Indicator that a step entered the given power band from below.
    Startup,
    /// Number of startups over the horizon.
    StartupCount,
    /// Energy revenue of the reservoir over the horizon.
    Revenue,
}

impl VarKind {
    /// Whether columns of this kind are the binary decisions driven by
    /// the relax-and-fix windows.
    pub fn is_decision_indicator(self) -> bool {
        matches!(
            self,
            Self::UpChange
                | Self::DownChange
                | Self::PqIndicator
                | Self::VqIndicator
                | Self::Startup
        )
    }
}

/// Identity of a single column, stable across window rebuilds.
///
/// `slot` disambiguates columns that come in families per (reservoir,
/// step): breakpoint position for the curve encodings, target band for
/// startups, the smoothing lag otherwise unused. Per-reservoir scalars
/// use step 0, slot 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarKey {
    pub kind: VarKind,
    pub reservoir: usize,
    pub step: usize,
    pub slot: usize,
}

impl VarKey {
    pub fn new(kind: VarKind, reservoir: usize, step: usize) -> Self {
        Self {
            kind,
            reservoir,
            step,
            slot: 0,
        }
    }

    pub fn slotted(
        kind: VarKind,
        reservoir: usize,
        step: usize,
        slot: usize,
    ) -> Self {
        Self {
            kind,
            reservoir,
            step,
            slot,
        }
    }
}

/// Values fixed by completed windows. Append-only: a window never
/// revisits a decision an earlier window committed to.
#[derive(Debug, Clone, Default)]
pub struct FixedValueStore {
    values: HashMap<VarKey, f64>,
}

impl FixedValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fix(&mut self, key: VarKey, value: f64) {
        let previous = self.values.insert(key, value);
        debug_assert!(previous.is_none(), "variable fixed twice: {:?}", key);
    }

    pub fn get(&self, key: VarKey) -> Option<f64> {
        self.values.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Complete variable assignment captured from the last window's solve,
/// used to pin the validation model.
#[derive(Debug, Clone, Default)]
pub struct SolvedValues {
    values: HashMap<VarKey, f64>,
}

impl SolvedValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: VarKey, value: f64) {
        self.values.insert(key, value);
    }

    pub fn get(&self, key: VarKey) -> Option<f64> {
        self.values.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// How a decision indicator is instantiated in one model build.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorSpec {
    /// Integer column in [0, 1].
    Binary,
    /// Continuous column in [0, 1].
    Relaxed,
    /// Continuous column with both bounds at the given value.
    Fixed(f64),
}

/// Decides, per column, how the builder instantiates it. The same
/// assembly routine serves every window and the final validation by
/// swapping the policy.
pub trait VariablePolicy {
    /// Instantiation of a decision indicator column.
    fn indicator(&self, key: VarKey) -> IndicatorSpec;

    /// Pinned value for a continuous column, when the build should
    /// reproduce a known assignment instead of optimizing it.
    fn pinned(&self, key: VarKey) -> Option<f64>;
}

/// Policy of one relax-and-fix window: indicators fixed by earlier
/// windows are pinned, those inside the window are binary, later ones
/// are relaxed. Continuous columns stay free.
pub struct WindowPolicy<'a> {
    window_start: usize,
    window_end: usize,
    store: &'a FixedValueStore,
}

impl<'a> WindowPolicy<'a> {
    /// `window_start..window_end` are the steps whose indicators are
    /// kept integer in this build.
    pub fn new(
        window_start: usize,
        window_end: usize,
        store: &'a FixedValueStore,
    ) -> Self {
        Self {
            window_start,
            window_end,
            store,
        }
    }
}

impl VariablePolicy for WindowPolicy<'_> {
    fn indicator(&self, key: VarKey) -> IndicatorSpec {
        if let Some(value) = self.store.get(key) {
            return IndicatorSpec::Fixed(value);
        }
        if key.step >= self.window_start && key.step < self.window_end {
            IndicatorSpec::Binary
        } else {
            IndicatorSpec::Relaxed
        }
    }

    fn pinned(&self, _key: VarKey) -> Option<f64> {
        None
    }
}

/// Policy of the validation build: every column reproduces the value
/// captured from the last window. Feasibility of the pinned model is
/// the proof that the stitched schedule satisfies the full formulation.
pub struct PinnedPolicy<'a> {
    values: &'a SolvedValues,
}

impl<'a> PinnedPolicy<'a> {
    pub fn new(values: &'a SolvedValues) -> Self {
        Self { values }
    }
}

impl VariablePolicy for PinnedPolicy<'_> {
    fn indicator(&self, key: VarKey) -> IndicatorSpec {
        match self.values.get(key) {
            Some(value) => IndicatorSpec::Fixed(value),
            None => IndicatorSpec::Relaxed,
        }
    }

    fn pinned(&self, key: VarKey) -> Option<f64> {
        self.values.get(key)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_decision_indicator_kinds() {
        assert!(VarKind::PqIndicator.is_decision_indicator());
        assert!(VarKind::Startup.is_decision_indicator());
        assert!(!VarKind::PqWeight.is_decision_indicator());
        assert!(!VarKind::Volume.is_decision_indicator());
    }

    #[test]
    fn test_store_round_trip() {
        let mut store = FixedValueStore::new();
        let key = VarKey::slotted(VarKind::PqIndicator, 0, 2, 1);
        assert!(store.get(key).is_none());
        store.fix(key, 1.0);
        assert_eq!(store.get(key), Some(1.0));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_window_policy_splits_horizon() {
        let mut store = FixedValueStore::new();
        store.fix(VarKey::new(VarKind::UpChange, 0, 0), 1.0);
        let policy = WindowPolicy::new(1, 3, &store);

        let fixed = policy.indicator(VarKey::new(VarKind::UpChange, 0, 0));
        assert_eq!(fixed, IndicatorSpec::Fixed(1.0));
        let inside = policy.indicator(VarKey::new(VarKind::UpChange, 0, 2));
        assert_eq!(inside, IndicatorSpec::Binary);
        let beyond = policy.indicator(VarKey::new(VarKind::UpChange, 0, 3));
        assert_eq!(beyond, IndicatorSpec::Relaxed);
        assert!(policy.pinned(VarKey::new(VarKind::Volume, 0, 1)).is_none());
    }

    #[test]
    fn test_pinned_policy_reproduces_assignment() {
        let mut values = SolvedValues::new();
        let volume = VarKey::new(VarKind::Volume, 1, 3);
        let indicator = VarKey::slotted(VarKind::PqIndicator, 1, 3, 2);
        values.insert(volume, 48_000.0);
        values.insert(indicator, 1.0);
        let policy = PinnedPolicy::new(&values);

        assert_eq!(policy.pinned(volume), Some(48_000.0));
        assert_eq!(policy.indicator(indicator), IndicatorSpec::Fixed(1.0));
    }
}
