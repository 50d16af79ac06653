//! Assembles the cascade scheduling MILP: one column per `VarKey`, one
//! pass over every constraint family. The same routine serves every
//! relax-and-fix window and the final validation, parametrized by the
//! `VariablePolicy` that decides how each decision indicator is
//! instantiated.

use crate::curve::EncodedCurves;
use crate::instance::Instance;
use crate::scheduler::ScheduleConfig;
use crate::solver::Problem;
use crate::store::{IndicatorSpec, VarKey, VarKind, VariablePolicy};

/// Column indices of the assembled problem, positionally addressable
/// by (reservoir, step, slot), plus the key registry used for fixing
/// and capture.
#[derive(Debug, Clone)]
pub struct ModelVars {
    /// Stored volume, `[reservoir][step]`.
    pub vol: Vec<Vec<usize>>,
    /// Total inflow, `[reservoir][step]`.
    pub inflow: Vec<Vec<usize>>,
    /// Released flow, `[reservoir][step]`.
    pub outflow: Vec<Vec<usize>>,
    /// Lag-averaged turbined flow, `[reservoir][step]`.
    pub turbined: Vec<Vec<usize>>,
    /// Generated power, `[reservoir][step]`.
    pub power: Vec<Vec<usize>>,
    /// Signed released-flow change, `[reservoir][step]`.
    pub flow_change: Vec<Vec<usize>>,
    pub up_change: Vec<Vec<usize>>,
    pub down_change: Vec<Vec<usize>>,
    /// Power-curve segment indicators, `[reservoir][step][0..=n]`.
    pub pq_indicator: Vec<Vec<Vec<usize>>>,
    /// Power-curve breakpoint weights, `[reservoir][step][0..n]`.
    pub pq_weight: Vec<Vec<Vec<usize>>>,
    /// Volume/max-flow segment indicators, absent without a limit curve.
    pub vq_indicator: Vec<Option<Vec<Vec<usize>>>>,
    pub vq_weight: Vec<Option<Vec<Vec<usize>>>>,
    /// Volume-dependent flow cap, `[reservoir][step]`.
    pub flow_cap: Vec<Option<Vec<usize>>>,
    /// Startup indicators, `[reservoir][step][target band - 1]`.
    pub startup: Vec<Vec<Vec<usize>>>,
    pub positive_deviation: Vec<usize>,
    pub negative_deviation: Vec<usize>,
    pub deviation_income: Vec<usize>,
    pub limit_zone_count: Vec<usize>,
    pub startup_count: Vec<usize>,
    pub revenue: Vec<usize>,
    registry: Vec<(VarKey, usize)>,
}

impl ModelVars {
    /// Every column of the problem with its stable identity.
    pub fn registry(&self) -> &[(VarKey, usize)] {
        &self.registry
    }
}

fn continuous(
    problem: &mut Problem,
    policy: &dyn VariablePolicy,
    registry: &mut Vec<(VarKey, usize)>,
    key: VarKey,
    cost: f64,
    lower: f64,
    upper: f64,
) -> usize {
    let (lower, upper) = match policy.pinned(key) {
        Some(value) => (value, value),
        None => (lower, upper),
    };
    let col = problem.add_column(cost, lower..=upper);
    registry.push((key, col));
    col
}

fn indicator(
    problem: &mut Problem,
    policy: &dyn VariablePolicy,
    registry: &mut Vec<(VarKey, usize)>,
    key: VarKey,
) -> usize {
    let col = match policy.indicator(key) {
        IndicatorSpec::Binary => problem.add_integer_column(0.0, 0.0..=1.0),
        IndicatorSpec::Relaxed => problem.add_column(0.0, 0.0..=1.0),
        IndicatorSpec::Fixed(value) => problem.add_column(0.0, value..=value),
    };
    registry.push((key, col));
    col
}

/// The full formulation over the impact horizon, ready to optimise.
#[derive(Debug)]
pub struct CascadeModel {
    pub problem: Problem,
    pub vars: ModelVars,
}

impl CascadeModel {
    pub fn build(
        instance: &Instance,
        config: &ScheduleConfig,
        curves: &[EncodedCurves],
        policy: &dyn VariablePolicy,
    ) -> Self {
        let reservoir_count = instance.reservoir_count();
        let horizon = instance.impact_horizon;
        let delta = instance.time_step_seconds;
        let hours = instance.hours_per_step();

        let mut problem = Problem::new();
        let mut registry: Vec<(VarKey, usize)> = Vec::new();

        let mut vol = Vec::with_capacity(reservoir_count);
        let mut inflow = Vec::with_capacity(reservoir_count);
        let mut outflow = Vec::with_capacity(reservoir_count);
        let mut turbined = Vec::with_capacity(reservoir_count);
        let mut power = Vec::with_capacity(reservoir_count);
        let mut flow_change = Vec::with_capacity(reservoir_count);
        let mut up_change = Vec::with_capacity(reservoir_count);
        let mut down_change = Vec::with_capacity(reservoir_count);
        let mut pq_indicator = Vec::with_capacity(reservoir_count);
        let mut pq_weight = Vec::with_capacity(reservoir_count);
        let mut vq_indicator = Vec::with_capacity(reservoir_count);
        let mut vq_weight = Vec::with_capacity(reservoir_count);
        let mut flow_cap = Vec::with_capacity(reservoir_count);
        let mut startup = Vec::with_capacity(reservoir_count);
        let mut positive_deviation = Vec::with_capacity(reservoir_count);
        let mut negative_deviation = Vec::with_capacity(reservoir_count);
        let mut deviation_income = Vec::with_capacity(reservoir_count);
        let mut limit_zone_count = Vec::with_capacity(reservoir_count);
        let mut startup_count = Vec::with_capacity(reservoir_count);
        let mut revenue = Vec::with_capacity(reservoir_count);

        // Columns
        for (r, reservoir) in instance.reservoirs.iter().enumerate() {
            let encoded = &curves[r];
            let n = encoded.power_curve.len();
            let units = encoded.bands.len() - 1;

            let mut vol_r = Vec::with_capacity(horizon);
            let mut inflow_r = Vec::with_capacity(horizon);
            let mut outflow_r = Vec::with_capacity(horizon);
            let mut turbined_r = Vec::with_capacity(horizon);
            let mut power_r = Vec::with_capacity(horizon);
            let mut flow_change_r = Vec::with_capacity(horizon);
            let mut up_change_r = Vec::with_capacity(horizon);
            let mut down_change_r = Vec::with_capacity(horizon);
            let mut pq_indicator_r = Vec::with_capacity(horizon);
            let mut pq_weight_r = Vec::with_capacity(horizon);
            let mut startup_r = Vec::with_capacity(horizon);
            let mut vq_indicator_r = encoded
                .flow_limit
                .as_ref()
                .map(|_| Vec::with_capacity(horizon));
            let mut vq_weight_r = encoded
                .flow_limit
                .as_ref()
                .map(|_| Vec::with_capacity(horizon));
            let mut flow_cap_r = encoded
                .flow_limit
                .as_ref()
                .map(|_| Vec::with_capacity(horizon));

            for t in 0..horizon {
                vol_r.push(continuous(
                    &mut problem,
                    policy,
                    &mut registry,
                    VarKey::new(VarKind::Volume, r, t),
                    0.0,
                    reservoir.min_volume,
                    reservoir.max_volume,
                ));
                inflow_r.push(continuous(
                    &mut problem,
                    policy,
                    &mut registry,
                    VarKey::new(VarKind::Inflow, r, t),
                    0.0,
                    0.0,
                    f64::INFINITY,
                ));
                outflow_r.push(continuous(
                    &mut problem,
                    policy,
                    &mut registry,
                    VarKey::new(VarKind::Outflow, r, t),
                    0.0,
                    0.0,
                    reservoir.max_channel_flow,
                ));
                turbined_r.push(continuous(
                    &mut problem,
                    policy,
                    &mut registry,
                    VarKey::new(VarKind::Turbined, r, t),
                    0.0,
                    0.0,
                    f64::INFINITY,
                ));
                power_r.push(continuous(
                    &mut problem,
                    policy,
                    &mut registry,
                    VarKey::new(VarKind::Power, r, t),
                    0.0,
                    0.0,
                    f64::INFINITY,
                ));
                flow_change_r.push(continuous(
                    &mut problem,
                    policy,
                    &mut registry,
                    VarKey::new(VarKind::FlowChange, r, t),
                    0.0,
                    f64::NEG_INFINITY,
                    f64::INFINITY,
                ));
                up_change_r.push(indicator(
                    &mut problem,
                    policy,
                    &mut registry,
                    VarKey::new(VarKind::UpChange, r, t),
                ));
                down_change_r.push(indicator(
                    &mut problem,
                    policy,
                    &mut registry,
                    VarKey::new(VarKind::DownChange, r, t),
                ));

                let mut w_t = Vec::with_capacity(n + 1);
                for j in 0..=n {
                    w_t.push(indicator(
                        &mut problem,
                        policy,
                        &mut registry,
                        VarKey::slotted(VarKind::PqIndicator, r, t, j),
                    ));
                }
                pq_indicator_r.push(w_t);
                let mut z_t = Vec::with_capacity(n);
                for k in 0..n {
                    z_t.push(continuous(
                        &mut problem,
                        policy,
                        &mut registry,
                        VarKey::slotted(VarKind::PqWeight, r, t, k),
                        0.0,
                        0.0,
                        f64::INFINITY,
                    ));
                }
                pq_weight_r.push(z_t);

                if let Some(limit) = encoded.flow_limit.as_ref() {
                    let m = limit.len();
                    let mut wv_t = Vec::with_capacity(m + 1);
                    for j in 0..=m {
                        wv_t.push(indicator(
                            &mut problem,
                            policy,
                            &mut registry,
                            VarKey::slotted(VarKind::VqIndicator, r, t, j),
                        ));
                    }
                    vq_indicator_r.as_mut().unwrap().push(wv_t);
                    let mut zv_t = Vec::with_capacity(m);
                    for k in 0..m {
                        zv_t.push(continuous(
                            &mut problem,
                            policy,
                            &mut registry,
                            VarKey::slotted(VarKind::VqWeight, r, t, k),
                            0.0,
                            0.0,
                            f64::INFINITY,
                        ));
                    }
                    vq_weight_r.as_mut().unwrap().push(zv_t);
                    flow_cap_r.as_mut().unwrap().push(continuous(
                        &mut problem,
                        policy,
                        &mut registry,
                        VarKey::new(VarKind::FlowCap, r, t),
                        0.0,
                        0.0,
                        f64::INFINITY,
                    ));
                }

                let mut startup_t = Vec::with_capacity(units);
                for band in 1..=units {
                    startup_t.push(indicator(
                        &mut problem,
                        policy,
                        &mut registry,
                        VarKey::slotted(VarKind::Startup, r, t, band),
                    ));
                }
                startup_r.push(startup_t);
            }

            positive_deviation.push(continuous(
                &mut problem,
                policy,
                &mut registry,
                VarKey::new(VarKind::PositiveDeviation, r, 0),
                0.0,
                0.0,
                f64::INFINITY,
            ));
            negative_deviation.push(continuous(
                &mut problem,
                policy,
                &mut registry,
                VarKey::new(VarKind::NegativeDeviation, r, 0),
                0.0,
                0.0,
                f64::INFINITY,
            ));
            deviation_income.push(continuous(
                &mut problem,
                policy,
                &mut registry,
                VarKey::new(VarKind::DeviationIncome, r, 0),
                1.0,
                f64::NEG_INFINITY,
                f64::INFINITY,
            ));
            limit_zone_count.push(continuous(
                &mut problem,
                policy,
                &mut registry,
                VarKey::new(VarKind::LimitZoneCount, r, 0),
                -config.limit_zone_penalty,
                0.0,
                f64::INFINITY,
            ));
            startup_count.push(continuous(
                &mut problem,
                policy,
                &mut registry,
                VarKey::new(VarKind::StartupCount, r, 0),
                -config.startup_penalty,
                0.0,
                f64::INFINITY,
            ));
            revenue.push(continuous(
                &mut problem,
                policy,
                &mut registry,
                VarKey::new(VarKind::Revenue, r, 0),
                1.0,
                f64::NEG_INFINITY,
                f64::INFINITY,
            ));

            vol.push(vol_r);
            inflow.push(inflow_r);
            outflow.push(outflow_r);
            turbined.push(turbined_r);
            power.push(power_r);
            flow_change.push(flow_change_r);
            up_change.push(up_change_r);
            down_change.push(down_change_r);
            pq_indicator.push(pq_indicator_r);
            pq_weight.push(pq_weight_r);
            vq_indicator.push(vq_indicator_r);
            vq_weight.push(vq_weight_r);
            flow_cap.push(flow_cap_r);
            startup.push(startup_r);
        }

        // Rows
        for (r, reservoir) in instance.reservoirs.iter().enumerate() {
            let encoded = &curves[r];
            let n = encoded.power_curve.len();
            let units = encoded.bands.len() - 1;

            // volume balance, deliberately one-sided: spilling stored
            // water without releasing it through the channel is allowed
            for t in 0..horizon {
                if t == 0 {
                    problem.add_row(
                        ..=reservoir.initial_volume,
                        [
                            (vol[r][0], 1.0),
                            (inflow[r][0], -delta),
                            (outflow[r][0], delta),
                        ],
                    );
                } else {
                    problem.add_row(
                        ..=0.0,
                        [
                            (vol[r][t], 1.0),
                            (vol[r][t - 1], -1.0),
                            (inflow[r][t], -delta),
                            (outflow[r][t], delta),
                        ],
                    );
                }
            }

            // inflow composition: exogenous flows plus, downstream, the
            // upstream turbined flow
            for t in 0..horizon {
                let unregulated = reservoir.unregulated_flows[t];
                if r == 0 {
                    problem.add_row(
                        {
                            let total = instance.incoming_flows[t] + unregulated;
                            total..=total
                        },
                        [(inflow[r][t], 1.0)],
                    );
                } else {
                    problem.add_row(
                        unregulated..=unregulated,
                        [(inflow[r][t], 1.0), (turbined[r - 1][t], -1.0)],
                    );
                }
            }

            // turbined flow as the mean of the released flow over the
            // verification lags; released flow before the horizon comes
            // from the recorded lag history
            let lags = &reservoir.verification_lags;
            let share = 1.0 / lags.len() as f64;
            for t in 0..horizon {
                let mut factors = vec![(turbined[r][t], 1.0)];
                let mut history = 0.0;
                for &lag in lags {
                    if t >= lag {
                        factors.push((outflow[r][t - lag], -share));
                    } else {
                        history += share * reservoir.initial_lags[lag - 1 - t];
                    }
                }
                problem.add_row(history..=history, factors);
            }

            // power-curve encoding (lambda method): convex breakpoint
            // weights tied to one active segment indicator
            for t in 0..horizon {
                let points = encoded.power_curve.points();
                let mut power_factors = vec![(power[r][t], 1.0)];
                let mut flow_factors = vec![(turbined[r][t], 1.0)];
                for (k, point) in points.iter().enumerate() {
                    power_factors.push((pq_weight[r][t][k], -point.y));
                    flow_factors.push((pq_weight[r][t][k], -point.x));
                }
                problem.add_row(0.0..=0.0, power_factors);
                problem.add_row(0.0..=0.0, flow_factors);

                problem.add_row(0.0..=0.0, [(pq_indicator[r][t][0], 1.0)]);
                problem.add_row(0.0..=0.0, [(pq_indicator[r][t][n], 1.0)]);
                for bp in 1..=n {
                    problem.add_row(
                        ..=0.0,
                        [
                            (pq_weight[r][t][bp - 1], 1.0),
                            (pq_indicator[r][t][bp - 1], -1.0),
                            (pq_indicator[r][t][bp], -1.0),
                        ],
                    );
                }
                problem.add_row(
                    1.0..=1.0,
                    (0..n).map(|k| (pq_weight[r][t][k], 1.0)),
                );
                problem.add_row(
                    1.0..=1.0,
                    (1..=n).map(|j| (pq_indicator[r][t][j], 1.0)),
                );
            }

            // volume-dependent flow cap, interpolated at the volume the
            // step starts from
            if let Some(limit) = encoded.flow_limit.as_ref() {
                let m = limit.len();
                let wv = vq_indicator[r].as_ref().unwrap();
                let zv = vq_weight[r].as_ref().unwrap();
                let cap = flow_cap[r].as_ref().unwrap();
                for t in 0..horizon {
                    let points = limit.points();
                    let mut cap_factors = vec![(cap[t], 1.0)];
                    for (k, point) in points.iter().enumerate() {
                        cap_factors.push((zv[t][k], -point.y));
                    }
                    problem.add_row(0.0..=0.0, cap_factors);

                    if t == 0 {
                        problem.add_row(
                            {
                                let v0 = reservoir.initial_volume;
                                v0..=v0
                            },
                            points
                                .iter()
                                .enumerate()
                                .map(|(k, point)| (zv[t][k], point.x)),
                        );
                    } else {
                        let mut volume_factors = vec![(vol[r][t - 1], 1.0)];
                        for (k, point) in points.iter().enumerate() {
                            volume_factors.push((zv[t][k], -point.x));
                        }
                        problem.add_row(0.0..=0.0, volume_factors);
                    }

                    problem.add_row(0.0..=0.0, [(wv[t][0], 1.0)]);
                    problem.add_row(0.0..=0.0, [(wv[t][m], 1.0)]);
                    for bp in 1..=m {
                        problem.add_row(
                            ..=0.0,
                            [
                                (zv[t][bp - 1], 1.0),
                                (wv[t][bp - 1], -1.0),
                                (wv[t][bp], -1.0),
                            ],
                        );
                    }
                    problem.add_row(
                        1.0..=1.0,
                        (0..m).map(|k| (zv[t][k], 1.0)),
                    );
                    problem.add_row(
                        1.0..=1.0,
                        (1..=m).map(|j| (wv[t][j], 1.0)),
                    );

                    problem.add_row(
                        ..=0.0,
                        [(outflow[r][t], 1.0), (cap[t], -1.0)],
                    );
                }
            }

            // released-flow change and its sign indicators
            let cap = reservoir.max_channel_flow;
            for t in 0..horizon {
                if t == 0 {
                    let previous = reservoir.initial_lags[0];
                    problem.add_row(
                        -previous..=-previous,
                        [(flow_change[r][0], 1.0), (outflow[r][0], -1.0)],
                    );
                } else {
                    problem.add_row(
                        0.0..=0.0,
                        [
                            (flow_change[r][t], 1.0),
                            (outflow[r][t], -1.0),
                            (outflow[r][t - 1], 1.0),
                        ],
                    );
                }
                problem.add_row(
                    ..=0.0,
                    [(flow_change[r][t], 1.0), (up_change[r][t], -cap)],
                );
                problem.add_row(
                    ..=0.0,
                    [(flow_change[r][t], -1.0), (down_change[r][t], -cap)],
                );
                problem.add_row(
                    ..=1.0,
                    [(up_change[r][t], 1.0), (down_change[r][t], 1.0)],
                );
                // no reversal within the smoothing window
                for k in 1..=config.flow_smoothing {
                    if t >= k {
                        problem.add_row(
                            ..=1.0,
                            [(up_change[r][t], 1.0), (down_change[r][t - k], 1.0)],
                        );
                        problem.add_row(
                            ..=1.0,
                            [(down_change[r][t], 1.0), (up_change[r][t - k], 1.0)],
                        );
                    }
                }
            }

            // energy revenue over the horizon
            let mut revenue_factors = vec![(revenue[r], 1.0)];
            for t in 0..horizon {
                revenue_factors
                    .push((power[r][t], -instance.prices[t] * hours));
            }
            problem.add_row(0.0..=0.0, revenue_factors);

            // terminal volume against its target, at the last decided
            // step; the trailing lag-impact steps carry no target
            let target = config.volume_targets[r];
            problem.add_row(
                target..=target,
                [
                    (vol[r][instance.decision_horizon - 1], 1.0),
                    (positive_deviation[r], -1.0),
                    (negative_deviation[r], 1.0),
                ],
            );
            problem.add_row(
                0.0..=0.0,
                [
                    (deviation_income[r], 1.0),
                    (positive_deviation[r], -config.volume_exceedance_bonus),
                    (negative_deviation[r], config.volume_shortage_penalty),
                ],
            );

            // steps spent in a limit zone
            let mut zone_factors = vec![(limit_zone_count[r], 1.0)];
            for t in 0..horizon {
                for &zone in encoded.limit_zones.iter() {
                    zone_factors.push((pq_indicator[r][t][zone], -1.0));
                }
            }
            problem.add_row(0.0..=0.0, zone_factors);

            // a startup into band g+1 happens when the previous step sat
            // in band g and the current step sits above it; the first
            // step never counts as a startup
            for band in 0..units {
                let current = &encoded.bands.bands[band].indicators;
                let above = encoded.bands.above(band);
                for t in 1..horizon {
                    let mut upper_factors: Vec<(usize, f64)> = current
                        .iter()
                        .map(|&j| (pq_indicator[r][t - 1][j], 1.0))
                        .chain(
                            above
                                .iter()
                                .map(|&j| (pq_indicator[r][t][j], 1.0)),
                        )
                        .collect();
                    let mut lower_factors = upper_factors.clone();
                    upper_factors.push((startup[r][t][band], -1.0));
                    problem.add_row(..=1.0, upper_factors);
                    lower_factors.push((startup[r][t][band], -2.0));
                    problem.add_row(0.0.., lower_factors);
                }
            }
            for band in 0..units {
                problem.add_row(0.0..=0.0, [(startup[r][0][band], 1.0)]);
            }
            let mut startup_factors = vec![(startup_count[r], 1.0)];
            for t in 0..horizon {
                for band in 0..units {
                    startup_factors.push((startup[r][t][band], -1.0));
                }
            }
            problem.add_row(0.0..=0.0, startup_factors);
        }

        let vars = ModelVars {
            vol,
            inflow,
            outflow,
            turbined,
            power,
            flow_change,
            up_change,
            down_change,
            pq_indicator,
            pq_weight,
            vq_indicator,
            vq_weight,
            flow_cap,
            startup,
            positive_deviation,
            negative_deviation,
            deviation_income,
            limit_zone_count,
            startup_count,
            revenue,
            registry,
        };
        Self { problem, vars }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::curve::EncodedCurves;
    use crate::store::{
        FixedValueStore, PinnedPolicy, SolvedValues, WindowPolicy,
    };

    fn encode_all(instance: &Instance) -> Vec<EncodedCurves> {
        instance
            .reservoirs
            .iter()
            .map(|reservoir| {
                EncodedCurves::encode(
                    &reservoir.power_curve,
                    &reservoir.startup_flows,
                    &reservoir.shutdown_flows,
                    reservoir.flow_limit_curve.as_ref(),
                )
            })
            .collect()
    }

    fn full_window(instance: &Instance) -> (FixedValueStore, usize) {
        (FixedValueStore::new(), instance.impact_horizon)
    }

    #[test]
    fn test_column_registry_covers_problem() {
        let instance = Instance::default();
        let config = ScheduleConfig::default_for(&instance);
        let curves = encode_all(&instance);
        let (store, horizon) = full_window(&instance);
        let policy = WindowPolicy::new(0, horizon, &store);
        let cascade = CascadeModel::build(&instance, &config, &curves, &policy);

        assert_eq!(cascade.problem.num_col, cascade.vars.registry().len());
        // 15 step columns per reservoir and step, 6 extra for the
        // downstream flow-limit encoding, 1 startup indicator per step,
        // 6 per-reservoir scalars
        assert_eq!(cascade.problem.num_col, 202);
    }

    #[test]
    fn test_full_window_marks_every_indicator_integer() {
        let instance = Instance::default();
        let config = ScheduleConfig::default_for(&instance);
        let curves = encode_all(&instance);
        let (store, horizon) = full_window(&instance);
        let policy = WindowPolicy::new(0, horizon, &store);
        let cascade = CascadeModel::build(&instance, &config, &curves, &policy);

        let mut indicators = 0;
        for &(key, col) in cascade.vars.registry() {
            if key.kind.is_decision_indicator() {
                assert_eq!(cascade.problem.integrality[col], 1);
                indicators += 1;
            } else {
                assert_eq!(cascade.problem.integrality[col], 0);
            }
        }
        assert_eq!(indicators, 85);
    }

    #[test]
    fn test_fixed_store_pins_indicator_bounds() {
        let instance = Instance::default();
        let config = ScheduleConfig::default_for(&instance);
        let curves = encode_all(&instance);
        let mut store = FixedValueStore::new();
        let key = VarKey::slotted(VarKind::PqIndicator, 0, 1, 2);
        store.fix(key, 1.0);
        let policy = WindowPolicy::new(2, instance.impact_horizon, &store);
        let cascade = CascadeModel::build(&instance, &config, &curves, &policy);

        let col = cascade.vars.pq_indicator[0][1][2];
        assert_eq!(cascade.problem.col_lower[col], 1.0);
        assert_eq!(cascade.problem.col_upper[col], 1.0);
        assert_eq!(cascade.problem.integrality[col], 0);
    }

    #[test]
    fn test_pinned_policy_pins_continuous_columns() {
        let instance = Instance::default();
        let config = ScheduleConfig::default_for(&instance);
        let curves = encode_all(&instance);
        let mut values = SolvedValues::new();
        let key = VarKey::new(VarKind::Volume, 1, 3);
        values.insert(key, 48_000.0);
        let policy = PinnedPolicy::new(&values);
        let cascade = CascadeModel::build(&instance, &config, &curves, &policy);

        let col = cascade.vars.vol[1][3];
        assert_eq!(cascade.problem.col_lower[col], 48_000.0);
        assert_eq!(cascade.problem.col_upper[col], 48_000.0);
    }

    #[test]
    fn test_flow_limit_columns_only_where_curve_exists() {
        let instance = Instance::default();
        let config = ScheduleConfig::default_for(&instance);
        let curves = encode_all(&instance);
        let (store, horizon) = full_window(&instance);
        let policy = WindowPolicy::new(0, horizon, &store);
        let cascade = CascadeModel::build(&instance, &config, &curves, &policy);

        assert!(cascade.vars.vq_indicator[0].is_none());
        assert!(cascade.vars.flow_cap[0].is_none());
        assert!(cascade.vars.vq_indicator[1].is_some());
        assert_eq!(
            cascade.vars.flow_cap[1].as_ref().unwrap().len(),
            instance.impact_horizon
        );
    }
}
