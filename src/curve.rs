//! Piecewise-linear encoding of the observed nonlinear curves
//! (turbined flow -> power, volume -> maximum flow) as breakpoint
//! sequences, together with the power-band partition and limit-zone
//! tagging derived from the startup/shutdown thresholds.

use thiserror::Error;

/// Thresholds closer than this to a curve breakpoint are snapped onto it,
/// so that two independently-sourced constants agree bit-for-bit.
pub const SNAP_TOLERANCE: f64 = 0.1;

#[derive(Debug, Error, PartialEq)]
pub enum CurveError {
    #[error("curve has {xs} abscissae but {ys} ordinates")]
    LengthMismatch { xs: usize, ys: usize },
    #[error("curve needs at least 2 breakpoints, got {0}")]
    TooFewPoints(usize),
    #[error("curve abscissae must be strictly increasing at index {0}")]
    NotIncreasing(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    pub x: f64,
    pub y: f64,
}

/// An observed monotone relationship sampled at strictly-increasing
/// abscissae. Interpolated values lie on the piecewise-linear
/// interpolant between observed points.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    points: Vec<Breakpoint>,
}

impl Curve {
    pub fn new(xs: &[f64], ys: &[f64]) -> Result<Self, CurveError> {
        if xs.len() != ys.len() {
            return Err(CurveError::LengthMismatch {
                xs: xs.len(),
                ys: ys.len(),
            });
        }
        if xs.len() < 2 {
            return Err(CurveError::TooFewPoints(xs.len()));
        }
        for i in 1..xs.len() {
            if xs[i] <= xs[i - 1] {
                return Err(CurveError::NotIncreasing(i));
            }
        }
        let points = xs
            .iter()
            .zip(ys.iter())
            .map(|(&x, &y)| Breakpoint { x, y })
            .collect();
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Breakpoint] {
        &self.points
    }

    /// Piecewise-linear interpolation, clamped to the sampled range.
    pub fn interpolate(&self, x: f64) -> f64 {
        let first = self.points.first().unwrap();
        let last = self.points.last().unwrap();
        if x <= first.x {
            return first.y;
        }
        if x >= last.x {
            return last.y;
        }
        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if x <= b.x {
                let fraction = (x - a.x) / (b.x - a.x);
                return a.y + fraction * (b.y - a.y);
            }
        }
        last.y
    }

    /// Moves every threshold that lies within `SNAP_TOLERANCE` of a
    /// breakpoint abscissa exactly onto it.
    pub fn snap_thresholds(&self, thresholds: &[f64]) -> Vec<f64> {
        thresholds
            .iter()
            .map(|&threshold| {
                for point in self.points.iter() {
                    if (threshold - point.x).abs() <= SNAP_TOLERANCE {
                        return point.x;
                    }
                }
                threshold
            })
            .collect()
    }
}

/// A band of the power curve operated with a fixed number of active
/// power-group units. `indicators` holds the 1-based segment-indicator
/// ids of the lambda encoding that belong to this band.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerBand {
    pub unit: usize,
    pub indicators: Vec<usize>,
}

/// Ordered partition of the power-curve indicators into bands, each
/// bounded below by a startup threshold. Band 0 is the idle band.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerBands {
    pub bands: Vec<PowerBand>,
}

impl PowerBands {
    /// Partitions the curve indicators by the (already snapped) startup
    /// thresholds. The final breakpoint belongs to no band: it only
    /// closes the last segment.
    pub fn partition(curve: &Curve, startup_flows: &[f64]) -> Self {
        let n = curve.len();
        let mut bands = vec![PowerBand {
            unit: 0,
            indicators: vec![1],
        }];
        let units = startup_flows.len();
        for unit in 1..=units {
            let lower = startup_flows[unit - 1];
            let upper = startup_flows.get(unit).copied();
            let mut indicators = Vec::new();
            for (position, point) in curve.points().iter().enumerate() {
                let id = position + 1;
                let above_lower = point.x >= lower;
                let below_upper = upper.map(|u| point.x < u).unwrap_or(true);
                if above_lower && below_upper && id != n {
                    indicators.push(id);
                }
            }
            bands.push(PowerBand { unit, indicators });
        }
        Self { bands }
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Indicator ids of every band strictly above the given one.
    pub fn above(&self, band: usize) -> Vec<usize> {
        self.bands[band + 1..]
            .iter()
            .flat_map(|b| b.indicators.iter().copied())
            .collect()
    }
}

/// Indicator ids whose breakpoint abscissa equals a shutdown threshold,
/// skipping the first match (the segment before the first startup is
/// not a limit zone).
pub fn limit_zone_indicators(curve: &Curve, shutdown_flows: &[f64]) -> Vec<usize> {
    let mut zones: Vec<usize> = curve
        .points()
        .iter()
        .enumerate()
        .filter(|(_, point)| shutdown_flows.contains(&point.x))
        .map(|(position, _)| position + 1)
        .collect();
    if !zones.is_empty() {
        zones.remove(0);
    }
    zones
}

/// Per-reservoir encoder output consumed by the model builder: the
/// power curve with snapped thresholds, its band partition and limit
/// zones, and the optional volume -> max-flow curve.
#[derive(Debug, Clone)]
pub struct EncodedCurves {
    pub power_curve: Curve,
    pub bands: PowerBands,
    pub limit_zones: Vec<usize>,
    pub flow_limit: Option<Curve>,
}

impl EncodedCurves {
    pub fn encode(
        power_curve: &Curve,
        startup_flows: &[f64],
        shutdown_flows: &[f64],
        flow_limit: Option<&Curve>,
    ) -> Self {
        let snapped_startups = power_curve.snap_thresholds(startup_flows);
        let snapped_shutdowns = power_curve.snap_thresholds(shutdown_flows);
        let bands = PowerBands::partition(power_curve, &snapped_startups);
        let limit_zones = limit_zone_indicators(power_curve, &snapped_shutdowns);
        Self {
            power_curve: power_curve.clone(),
            bands,
            limit_zones,
            flow_limit: flow_limit.cloned(),
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    fn power_curve() -> Curve {
        Curve::new(&[0.0, 5.0, 10.0], &[0.0, 4.0, 9.0]).unwrap()
    }

    #[test]
    fn test_rejects_mismatched_lengths() {
        let result = Curve::new(&[0.0, 1.0], &[0.0]);
        assert_eq!(
            result.unwrap_err(),
            CurveError::LengthMismatch { xs: 2, ys: 1 }
        );
    }

    #[test]
    fn test_rejects_non_increasing_abscissae() {
        let result = Curve::new(&[0.0, 1.0, 1.0], &[0.0, 1.0, 2.0]);
        assert_eq!(result.unwrap_err(), CurveError::NotIncreasing(2));
    }

    #[test]
    fn test_interpolation_reproduces_breakpoints_exactly() {
        let curve = power_curve();
        for point in curve.points() {
            assert_eq!(curve.interpolate(point.x), point.y);
        }
    }

    #[test]
    fn test_interpolation_between_breakpoints() {
        let curve = power_curve();
        assert_eq!(curve.interpolate(2.5), 2.0);
        assert_eq!(curve.interpolate(7.5), 6.5);
    }

    #[test]
    fn test_interpolation_clamps_outside_range() {
        let curve = power_curve();
        assert_eq!(curve.interpolate(-1.0), 0.0);
        assert_eq!(curve.interpolate(20.0), 9.0);
    }

    #[test]
    fn test_snapping_moves_close_thresholds_onto_breakpoints() {
        let curve = power_curve();
        let snapped = curve.snap_thresholds(&[4.95, 9.92, 7.5]);
        assert_eq!(snapped, vec![5.0, 10.0, 7.5]);
    }

    #[test]
    fn test_band_partition_with_single_startup() {
        let curve = power_curve();
        let bands = PowerBands::partition(&curve, &[5.0]);
        assert_eq!(bands.len(), 2);
        assert_eq!(bands.bands[0].indicators, vec![1]);
        assert_eq!(bands.bands[1].indicators, vec![2]);
        assert_eq!(bands.above(0), vec![2]);
        assert!(bands.above(1).is_empty());
    }

    #[test]
    fn test_band_partition_with_two_startups() {
        let curve =
            Curve::new(&[0.0, 5.0, 10.0, 15.0], &[0.0, 4.0, 9.0, 13.0]).unwrap();
        let bands = PowerBands::partition(&curve, &[5.0, 10.0]);
        assert_eq!(bands.len(), 3);
        assert_eq!(bands.bands[1].indicators, vec![2]);
        assert_eq!(bands.bands[2].indicators, vec![3]);
        assert_eq!(bands.above(0), vec![2, 3]);
    }

    #[test]
    fn test_limit_zones_skip_first_shutdown() {
        let curve =
            Curve::new(&[0.0, 5.0, 10.0, 15.0], &[0.0, 4.0, 9.0, 13.0]).unwrap();
        let zones = limit_zone_indicators(&curve, &[5.0, 10.0]);
        assert_eq!(zones, vec![3]);
    }

    #[test]
    fn test_limit_zones_empty_when_no_threshold_matches() {
        let curve = power_curve();
        assert!(limit_zone_indicators(&curve, &[7.3]).is_empty());
    }

    #[test]
    fn test_encode_snaps_before_partitioning() {
        let curve = power_curve();
        let encoded = EncodedCurves::encode(&curve, &[5.05], &[5.05], None);
        assert_eq!(encoded.bands.bands[1].indicators, vec![2]);
        // single shutdown threshold: its zone is the skipped first match
        assert!(encoded.limit_zones.is_empty());
    }
}
