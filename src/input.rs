use std::collections::HashMap;
use std::fs;

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::curve::Curve;
use crate::instance::{Instance, InstanceError, Reservoir};
use crate::scheduler::ScheduleConfig;

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Deserialize)]
pub struct CurveInput {
    pub observed_flows: Vec<f64>,
    pub observed_powers: Vec<f64>,
}

#[derive(Deserialize)]
pub struct FlowLimitInput {
    pub exists: bool,
    #[serde(default)]
    pub observed_volumes: Vec<f64>,
    #[serde(default)]
    pub observed_flows: Vec<f64>,
}

#[derive(Deserialize)]
pub struct ReservoirInput {
    pub id: String,
    pub min_volume: f64,
    pub max_volume: f64,
    pub max_channel_flow: f64,
    pub initial_volume: f64,
    pub relevant_lags: Vec<usize>,
    pub verification_lags: Vec<usize>,
    pub startup_flows: Vec<f64>,
    pub shutdown_flows: Vec<f64>,
    pub power_curve: CurveInput,
    pub flow_limit: Option<FlowLimitInput>,
    pub initial_lags: Vec<f64>,
    pub unregulated_flows: Vec<f64>,
}

#[derive(Deserialize)]
pub struct DatetimeInput {
    pub start: String,
    pub end_decisions: String,
}

#[derive(Deserialize)]
pub struct InstanceInput {
    pub time_step_minutes: u32,
    pub datetime: DatetimeInput,
    pub incoming_flows: Vec<f64>,
    pub energy_prices: Vec<f64>,
    pub dams: Vec<ReservoirInput>,
}

pub fn read_instance_input(filepath: &str) -> InstanceInput {
    let contents = fs::read_to_string(filepath)
        .expect("Error while reading instance file");
    let parsed: InstanceInput = serde_json::from_str(&contents)
        .expect("Error while parsing instance file");
    parsed
}

#[derive(Deserialize)]
pub struct ConfigInput {
    /// Terminal volume target per reservoir id.
    pub volume_objectives: HashMap<String, f64>,
    pub volume_shortage_penalty: f64,
    pub volume_exceedance_bonus: f64,
    pub startups_penalty: f64,
    pub limit_zones_penalty: f64,
    pub mip_gap: f64,
    pub time_budget_seconds: f64,
    pub flow_smoothing: usize,
    pub block_size: usize,
}

pub fn read_config_input(filepath: &str) -> ConfigInput {
    let contents =
        fs::read_to_string(filepath).expect("Error while reading config file");
    let parsed: ConfigInput = serde_json::from_str(&contents)
        .expect("Error while parsing config file");
    parsed
}

impl InstanceInput {
    /// Number of steps whose release is decided, from the decision
    /// datetime range (both endpoints included).
    fn decision_horizon(&self) -> Result<usize, InstanceError> {
        let start = NaiveDateTime::parse_from_str(
            &self.datetime.start,
            DATETIME_FORMAT,
        )?;
        let end = NaiveDateTime::parse_from_str(
            &self.datetime.end_decisions,
            DATETIME_FORMAT,
        )?;
        if end < start {
            return Err(InstanceError::DecisionWindowOrder {
                start: self.datetime.start.clone(),
                end: self.datetime.end_decisions.clone(),
            });
        }
        let step_seconds = i64::from(self.time_step_minutes) * 60;
        let elapsed = (end - start).num_seconds();
        Ok((elapsed / step_seconds) as usize + 1)
    }

    pub fn build_instance(&self) -> Result<Instance, InstanceError> {
        let decision_horizon = self.decision_horizon()?;
        let reservoirs = self
            .dams
            .iter()
            .map(|dam| {
                let power_curve = Curve::new(
                    &dam.power_curve.observed_flows,
                    &dam.power_curve.observed_powers,
                )
                .map_err(|source| InstanceError::Curve {
                    reservoir: dam.id.clone(),
                    source,
                })?;
                let flow_limit_curve = match dam.flow_limit.as_ref() {
                    Some(limit) if limit.exists => Some(
                        Curve::new(
                            &limit.observed_volumes,
                            &limit.observed_flows,
                        )
                        .map_err(|source| InstanceError::Curve {
                            reservoir: dam.id.clone(),
                            source,
                        })?,
                    ),
                    _ => None,
                };
                Ok(Reservoir {
                    id: dam.id.clone(),
                    min_volume: dam.min_volume,
                    max_volume: dam.max_volume,
                    max_channel_flow: dam.max_channel_flow,
                    initial_volume: dam.initial_volume,
                    relevant_lags: dam.relevant_lags.clone(),
                    verification_lags: dam.verification_lags.clone(),
                    startup_flows: dam.startup_flows.clone(),
                    shutdown_flows: dam.shutdown_flows.clone(),
                    power_curve,
                    flow_limit_curve,
                    initial_lags: dam.initial_lags.clone(),
                    unregulated_flows: dam.unregulated_flows.clone(),
                })
            })
            .collect::<Result<Vec<Reservoir>, InstanceError>>()?;
        Instance::new(
            reservoirs,
            f64::from(self.time_step_minutes) * 60.0,
            decision_horizon,
            self.incoming_flows.clone(),
            self.energy_prices.clone(),
        )
    }
}

impl ConfigInput {
    pub fn build_schedule_config(
        &self,
        instance: &Instance,
    ) -> Result<ScheduleConfig, InstanceError> {
        let volume_targets = instance
            .reservoirs
            .iter()
            .map(|reservoir| {
                self.volume_objectives
                    .get(&reservoir.id)
                    .copied()
                    .ok_or_else(|| {
                        InstanceError::MissingVolumeTarget(
                            reservoir.id.clone(),
                        )
                    })
            })
            .collect::<Result<Vec<f64>, InstanceError>>()?;
        Ok(ScheduleConfig {
            volume_targets,
            volume_shortage_penalty: self.volume_shortage_penalty,
            volume_exceedance_bonus: self.volume_exceedance_bonus,
            startup_penalty: self.startups_penalty,
            limit_zone_penalty: self.limit_zones_penalty,
            mip_gap: self.mip_gap,
            time_budget_seconds: self.time_budget_seconds,
            flow_smoothing: self.flow_smoothing,
            block_size: self.block_size,
        })
    }
}

pub struct Input {
    pub instance: InstanceInput,
    pub config: ConfigInput,
}

impl Input {
    pub fn build(path: &str) -> Self {
        let instance =
            read_instance_input(&(path.to_owned() + "/instance.json"));
        let config = read_config_input(&(path.to_owned() + "/config.json"));
        Self { instance, config }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_instance() {
        let filepath = "demos/instance.json";
        let instance_input = read_instance_input(filepath);
        assert_eq!(instance_input.time_step_minutes, 15);
        assert_eq!(instance_input.dams.len(), 2);
    }

    #[test]
    fn test_build_instance() {
        let filepath = "demos/instance.json";
        let instance = read_instance_input(filepath).build_instance().unwrap();
        assert_eq!(instance.decision_horizon, 4);
        assert_eq!(instance.impact_horizon, 5);
        assert!(instance.reservoirs[0].flow_limit_curve.is_none());
        assert!(instance.reservoirs[1].flow_limit_curve.is_some());
    }

    #[test]
    fn test_read_config() {
        let filepath = "demos/config.json";
        let config = read_config_input(filepath);
        assert_eq!(config.volume_shortage_penalty, 3.0);
        assert_eq!(config.block_size, 4);
    }

    #[test]
    fn test_build_schedule_config() {
        let input = Input::build("demos");
        let instance = input.instance.build_instance().unwrap();
        let config = input.config.build_schedule_config(&instance).unwrap();
        assert_eq!(config.volume_targets, vec![50_000.0, 50_000.0]);
        assert_eq!(config.flow_smoothing, 2);
    }

    #[test]
    fn test_missing_volume_objective_is_rejected() {
        let input = Input::build("demos");
        let instance = input.instance.build_instance().unwrap();
        let mut config = input.config;
        config.volume_objectives.remove("dam2");
        let result = config.build_schedule_config(&instance);
        assert!(matches!(
            result,
            Err(InstanceError::MissingVolumeTarget(id)) if id == "dam2"
        ));
    }

    #[test]
    fn test_reversed_decision_window_is_rejected() {
        let filepath = "demos/instance.json";
        let mut instance_input = read_instance_input(filepath);
        instance_input.datetime.end_decisions =
            "2021-03-31 23:00".to_string();
        assert!(matches!(
            instance_input.build_instance(),
            Err(InstanceError::DecisionWindowOrder { .. })
        ));
    }

    #[test]
    fn test_invalid_datetime_is_rejected() {
        let filepath = "demos/instance.json";
        let mut instance_input = read_instance_input(filepath);
        instance_input.datetime.start = "01/04/2021 00:00".to_string();
        assert!(matches!(
            instance_input.build_instance(),
            Err(InstanceError::Datetime(_))
        ));
    }
}
