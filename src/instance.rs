//! Immutable, validated view over one scheduling problem instance:
//! cascade topology, physical curves, forecasts and initial state.

use crate::curve::{Curve, CurveError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("reservoir {reservoir}: {source}")]
    Curve {
        reservoir: String,
        source: CurveError,
    },
    #[error("reservoir {0}: relevant lag set is empty")]
    EmptyLags(String),
    #[error("reservoir {0}: lags must be at least one step")]
    ZeroLag(String),
    #[error("reservoir {0}: verification lags are not a subset of relevant lags")]
    VerificationLagsNotSubset(String),
    #[error("reservoir {0}: {1} thresholds are not strictly ascending")]
    ThresholdsNotAscending(String, &'static str),
    #[error("reservoir {reservoir}: {series} has length {actual}, expected {expected}")]
    SeriesLength {
        reservoir: String,
        series: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("reservoir {reservoir}: lag history has {actual} entries, needs {needed}")]
    LagHistoryTooShort {
        reservoir: String,
        needed: usize,
        actual: usize,
    },
    #[error("reservoir {0}: volume bounds are inverted")]
    InvertedVolumeBounds(String),
    #[error("instance has no reservoirs")]
    NoReservoirs,
    #[error("decision horizon must have at least one step")]
    EmptyHorizon,
    #[error("{series} has length {actual}, expected the impact horizon {expected}")]
    ExogenousSeriesLength {
        series: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("no volume target configured for reservoir {0}")]
    MissingVolumeTarget(String),
    #[error("decision window ends ({end}) before it starts ({start})")]
    DecisionWindowOrder { start: String, end: String },
    #[error("invalid datetime in instance: {0}")]
    Datetime(#[from] chrono::ParseError),
}

#[derive(Debug, Clone)]
pub struct Reservoir {
    pub id: String,
    pub min_volume: f64,
    pub max_volume: f64,
    pub max_channel_flow: f64,
    pub initial_volume: f64,
    /// Delays (in time steps) with which released flow becomes turbined
    /// flow downstream. Non-empty.
    pub relevant_lags: Vec<usize>,
    /// Subset of the relevant lags used for the turbined-flow mean.
    pub verification_lags: Vec<usize>,
    /// Ascending turbined flows at which an additional unit starts.
    pub startup_flows: Vec<f64>,
    /// Ascending turbined flows below which a unit shuts down.
    pub shutdown_flows: Vec<f64>,
    /// Observed turbined flow -> power.
    pub power_curve: Curve,
    /// Observed volume -> maximum allowed flow, when the channel has a
    /// volume-dependent limit besides the hard cap.
    pub flow_limit_curve: Option<Curve>,
    /// Flow through the channel at steps -1, -2, ... before the horizon.
    pub initial_lags: Vec<f64>,
    pub unregulated_flows: Vec<f64>,
}

impl Reservoir {
    pub fn max_lag(&self) -> usize {
        self.relevant_lags.iter().copied().max().unwrap_or(0)
    }

    fn validate(&self, impact_horizon: usize) -> Result<(), InstanceError> {
        if self.relevant_lags.is_empty() || self.verification_lags.is_empty() {
            return Err(InstanceError::EmptyLags(self.id.clone()));
        }
        if self.relevant_lags.contains(&0) {
            return Err(InstanceError::ZeroLag(self.id.clone()));
        }
        if !self
            .verification_lags
            .iter()
            .all(|lag| self.relevant_lags.contains(lag))
        {
            return Err(InstanceError::VerificationLagsNotSubset(self.id.clone()));
        }
        for (name, thresholds) in [
            ("startup", &self.startup_flows),
            ("shutdown", &self.shutdown_flows),
        ] {
            if thresholds.windows(2).any(|pair| pair[1] <= pair[0]) {
                return Err(InstanceError::ThresholdsNotAscending(
                    self.id.clone(),
                    name,
                ));
            }
        }
        if self.max_volume <= self.min_volume {
            return Err(InstanceError::InvertedVolumeBounds(self.id.clone()));
        }
        if self.unregulated_flows.len() != impact_horizon {
            return Err(InstanceError::SeriesLength {
                reservoir: self.id.clone(),
                series: "unregulated_flows",
                expected: impact_horizon,
                actual: self.unregulated_flows.len(),
            });
        }
        let needed = self.max_lag();
        if self.initial_lags.len() < needed {
            return Err(InstanceError::LagHistoryTooShort {
                reservoir: self.id.clone(),
                needed,
                actual: self.initial_lags.len(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Instance {
    /// Cascade order: the outflow of reservoir k feeds reservoir k+1.
    pub reservoirs: Vec<Reservoir>,
    pub time_step_seconds: f64,
    /// Steps whose release is optimized.
    pub decision_horizon: usize,
    /// Decision horizon plus the largest relevant lag: released flow
    /// still earns revenue downstream after decisions end.
    pub impact_horizon: usize,
    /// Flow entering the first reservoir, length = impact horizon.
    pub incoming_flows: Vec<f64>,
    /// Energy price per step, length = impact horizon.
    pub prices: Vec<f64>,
}

impl Instance {
    pub fn new(
        mut reservoirs: Vec<Reservoir>,
        time_step_seconds: f64,
        decision_horizon: usize,
        incoming_flows: Vec<f64>,
        prices: Vec<f64>,
    ) -> Result<Self, InstanceError> {
        if reservoirs.is_empty() {
            return Err(InstanceError::NoReservoirs);
        }
        if decision_horizon == 0 {
            return Err(InstanceError::EmptyHorizon);
        }
        let impact_buffer = reservoirs.iter().map(|r| r.max_lag()).max().unwrap_or(0);
        let impact_horizon = decision_horizon + impact_buffer;
        for reservoir in reservoirs.iter_mut() {
            reservoir.validate(impact_horizon)?;
            reservoir.initial_volume = reservoir
                .initial_volume
                .clamp(reservoir.min_volume, reservoir.max_volume);
        }
        if incoming_flows.len() != impact_horizon {
            return Err(InstanceError::ExogenousSeriesLength {
                series: "incoming_flows",
                expected: impact_horizon,
                actual: incoming_flows.len(),
            });
        }
        if prices.len() != impact_horizon {
            return Err(InstanceError::ExogenousSeriesLength {
                series: "energy_prices",
                expected: impact_horizon,
                actual: prices.len(),
            });
        }
        Ok(Self {
            reservoirs,
            time_step_seconds,
            decision_horizon,
            impact_horizon,
            incoming_flows,
            prices,
        })
    }

    pub fn reservoir_count(&self) -> usize {
        self.reservoirs.len()
    }

    pub fn hours_per_step(&self) -> f64 {
        self.time_step_seconds / 3600.0
    }

    /// Small two-reservoir cascade over a 4-step decision horizon;
    /// releasing the incoming 6 m3/s throughout keeps every volume at
    /// its target.
    pub fn default() -> Self {
        let power_curve = Curve::new(&[0.0, 5.0, 10.0], &[0.0, 4.0, 7.0]).unwrap();
        let upstream = Reservoir {
            id: "dam1".to_string(),
            min_volume: 0.0,
            max_volume: 100_000.0,
            max_channel_flow: 20.0,
            initial_volume: 50_000.0,
            relevant_lags: vec![1],
            verification_lags: vec![1],
            startup_flows: vec![5.0],
            shutdown_flows: vec![5.0],
            power_curve: power_curve.clone(),
            flow_limit_curve: None,
            initial_lags: vec![6.0],
            unregulated_flows: vec![0.0; 5],
        };
        let downstream = Reservoir {
            id: "dam2".to_string(),
            flow_limit_curve: Some(
                Curve::new(&[0.0, 100_000.0], &[4.0, 20.0]).unwrap(),
            ),
            ..upstream.clone()
        };

        Self::new(
            vec![upstream, downstream],
            900.0,
            4,
            vec![6.0; 5],
            vec![50.0; 5],
        )
        .unwrap()
    }
}
