//! Validated schedule extracted from a solved model, plus an
//! independent re-check of the physical bounds it must respect.

use serde::Serialize;
use thiserror::Error;

use crate::instance::Instance;
use crate::store::{SolvedValues, VarKey, VarKind};

/// Numerical slack granted to solver output when re-checking bounds.
const TOLERANCE: f64 = 1e-4;

#[derive(Debug, Error)]
pub enum BoundsError {
    #[error("schedule covers {actual} reservoirs, instance has {expected}")]
    ReservoirCount { expected: usize, actual: usize },
    #[error(
        "reservoir {reservoir}: volume {value} outside [{lower}, {upper}] at step {step}"
    )]
    Volume {
        reservoir: String,
        step: usize,
        value: f64,
        lower: f64,
        upper: f64,
    },
    #[error(
        "reservoir {reservoir}: flow {value} outside [0, {upper}] at step {step}"
    )]
    Flow {
        reservoir: String,
        step: usize,
        value: f64,
        upper: f64,
    },
    #[error(
        "reservoir {reservoir}: flow {value} exceeds the volume-dependent cap {cap} at step {step}"
    )]
    FlowCap {
        reservoir: String,
        step: usize,
        value: f64,
        cap: f64,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ReservoirSchedule {
    pub id: String,
    /// Released flow per step over the impact horizon.
    pub flows: Vec<f64>,
    /// Stored volume at the end of each step.
    pub volumes: Vec<f64>,
    /// Generated power per step.
    pub powers: Vec<f64>,
    pub startups: f64,
    pub limit_zone_steps: f64,
    pub positive_deviation: f64,
    pub negative_deviation: f64,
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Schedule {
    pub reservoirs: Vec<ReservoirSchedule>,
    pub prices: Vec<f64>,
    /// Objective value of the validation solve.
    pub objective: f64,
}

impl Schedule {
    pub fn from_values(
        instance: &Instance,
        values: &SolvedValues,
        objective: f64,
    ) -> Self {
        let horizon = instance.impact_horizon;
        let reservoirs = instance
            .reservoirs
            .iter()
            .enumerate()
            .map(|(r, reservoir)| {
                let series = |kind: VarKind| -> Vec<f64> {
                    (0..horizon)
                        .map(|t| {
                            values
                                .get(VarKey::new(kind, r, t))
                                .unwrap_or(0.0)
                        })
                        .collect()
                };
                let scalar = |kind: VarKind| -> f64 {
                    values.get(VarKey::new(kind, r, 0)).unwrap_or(0.0)
                };
                ReservoirSchedule {
                    id: reservoir.id.clone(),
                    flows: series(VarKind::Outflow),
                    volumes: series(VarKind::Volume),
                    powers: series(VarKind::Power),
                    startups: scalar(VarKind::StartupCount),
                    limit_zone_steps: scalar(VarKind::LimitZoneCount),
                    positive_deviation: scalar(VarKind::PositiveDeviation),
                    negative_deviation: scalar(VarKind::NegativeDeviation),
                    revenue: scalar(VarKind::Revenue),
                }
            })
            .collect();
        Self {
            reservoirs,
            prices: instance.prices.clone(),
            objective,
        }
    }

    pub fn reservoir(&self, id: &str) -> Option<&ReservoirSchedule> {
        self.reservoirs.iter().find(|reservoir| reservoir.id == id)
    }

    /// Re-checks the physical bounds against the instance without going
    /// through the solver: volume bounds, hard channel cap and the
    /// volume-dependent cap interpolated at the volume each step
    /// starts from.
    pub fn verify_bounds(&self, instance: &Instance) -> Result<(), BoundsError> {
        if self.reservoirs.len() != instance.reservoir_count() {
            return Err(BoundsError::ReservoirCount {
                expected: instance.reservoir_count(),
                actual: self.reservoirs.len(),
            });
        }
        for (scheduled, physical) in
            self.reservoirs.iter().zip(instance.reservoirs.iter())
        {
            for (step, &volume) in scheduled.volumes.iter().enumerate() {
                if volume < physical.min_volume - TOLERANCE
                    || volume > physical.max_volume + TOLERANCE
                {
                    return Err(BoundsError::Volume {
                        reservoir: scheduled.id.clone(),
                        step,
                        value: volume,
                        lower: physical.min_volume,
                        upper: physical.max_volume,
                    });
                }
            }
            for (step, &flow) in scheduled.flows.iter().enumerate() {
                if flow < -TOLERANCE
                    || flow > physical.max_channel_flow + TOLERANCE
                {
                    return Err(BoundsError::Flow {
                        reservoir: scheduled.id.clone(),
                        step,
                        value: flow,
                        upper: physical.max_channel_flow,
                    });
                }
                if let Some(curve) = physical.flow_limit_curve.as_ref() {
                    let basis = if step == 0 {
                        physical.initial_volume
                    } else {
                        scheduled.volumes[step - 1]
                    };
                    let cap = curve.interpolate(basis);
                    if flow > cap + TOLERANCE {
                        return Err(BoundsError::FlowCap {
                            reservoir: scheduled.id.clone(),
                            step,
                            value: flow,
                            cap,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    fn steady_schedule(instance: &Instance) -> Schedule {
        let horizon = instance.impact_horizon;
        let reservoirs = instance
            .reservoirs
            .iter()
            .map(|reservoir| ReservoirSchedule {
                id: reservoir.id.clone(),
                flows: vec![6.0; horizon],
                volumes: vec![reservoir.initial_volume; horizon],
                powers: vec![4.6; horizon],
                startups: 0.0,
                limit_zone_steps: 0.0,
                positive_deviation: 0.0,
                negative_deviation: 0.0,
                revenue: 287.5,
            })
            .collect();
        Schedule {
            reservoirs,
            prices: instance.prices.clone(),
            objective: 575.0,
        }
    }

    #[test]
    fn test_extraction_from_solved_values() {
        let instance = Instance::default();
        let mut values = SolvedValues::new();
        values.insert(VarKey::new(VarKind::Outflow, 0, 0), 6.0);
        values.insert(VarKey::new(VarKind::Volume, 1, 2), 48_000.0);
        values.insert(VarKey::new(VarKind::StartupCount, 1, 0), 1.0);
        let schedule = Schedule::from_values(&instance, &values, 575.0);

        assert_eq!(schedule.reservoirs.len(), 2);
        assert_eq!(schedule.reservoirs[0].flows[0], 6.0);
        assert_eq!(schedule.reservoirs[0].flows[1], 0.0);
        assert_eq!(schedule.reservoirs[1].volumes[2], 48_000.0);
        assert_eq!(schedule.reservoirs[1].startups, 1.0);
        assert_eq!(schedule.prices, instance.prices);
    }

    #[test]
    fn test_query_by_reservoir_id() {
        let instance = Instance::default();
        let schedule = steady_schedule(&instance);
        assert!(schedule.reservoir("dam2").is_some());
        assert!(schedule.reservoir("dam9").is_none());
    }

    #[test]
    fn test_steady_schedule_passes_bounds() {
        let instance = Instance::default();
        let schedule = steady_schedule(&instance);
        assert!(schedule.verify_bounds(&instance).is_ok());
    }

    #[test]
    fn test_volume_outside_bounds_is_rejected() {
        let instance = Instance::default();
        let mut schedule = steady_schedule(&instance);
        schedule.reservoirs[0].volumes[3] = 120_000.0;
        assert!(matches!(
            schedule.verify_bounds(&instance),
            Err(BoundsError::Volume { step: 3, .. })
        ));
    }

    #[test]
    fn test_flow_above_volume_dependent_cap_is_rejected() {
        let instance = Instance::default();
        let mut schedule = steady_schedule(&instance);
        // dam2's cap at 50000 m3 interpolates to 12 m3/s
        schedule.reservoirs[1].flows[2] = 15.0;
        assert!(matches!(
            schedule.verify_bounds(&instance),
            Err(BoundsError::FlowCap { step: 2, .. })
        ));
    }

    #[test]
    fn test_flow_above_hard_cap_is_rejected() {
        let instance = Instance::default();
        let mut schedule = steady_schedule(&instance);
        schedule.reservoirs[0].flows[0] = 25.0;
        assert!(matches!(
            schedule.verify_bounds(&instance),
            Err(BoundsError::Flow { step: 0, .. })
        ));
    }
}
