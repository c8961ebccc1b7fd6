// ─────────────────────────────────────────────────────────────────────
// SeisLoc — Synthetic Network Fixtures
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Homogeneous half-space travel times and a noiseless station network.
#![allow(dead_code)]

use seisloc_core::covariance::Variogram;
use seisloc_core::stations::SingleLinkageOrdering;
use seisloc_core::travel_time::{NoCorrection, TravelTime, TravelTimeModel};
use seisloc_core::LocatorServices;
use seisloc_math::geodesy::point_at;
use seisloc_types::constants::DEG2KM;
use seisloc_types::state::{Event, Hypocentre, LocationInstructions, Phase, Station};

/// Straight-ray P and S in a homogeneous half-space.
#[derive(Debug, Clone, Copy)]
pub struct HalfSpace {
    pub vp: f64,
    pub vs: f64,
}

impl Default for HalfSpace {
    fn default() -> Self {
        Self { vp: 6.0, vs: 3.5 }
    }
}

impl TravelTimeModel for HalfSpace {
    fn predict(&self, phase: &str, delta: f64, depth: f64) -> Option<TravelTime> {
        let v = match phase {
            "P" => self.vp,
            "S" => self.vs,
            _ => return None,
        };
        let x = delta * DEG2KM;
        let r = (x * x + depth * depth).sqrt().max(1e-6);
        Some(TravelTime {
            time: r / v,
            dtdd: x / (r * v) * DEG2KM,
            dtdh: depth / (r * v),
            bounce_delta: None,
        })
    }
}

pub const TRUTH: Hypocentre = Hypocentre {
    origin_time: 1000.0,
    lat: 10.0,
    lon: 20.0,
    depth: 15.0,
};

/// Deliberately off the true hypocentre.
pub const SEED: Hypocentre = Hypocentre {
    origin_time: 1001.0,
    lat: 10.1,
    lon: 19.95,
    depth: 5.0,
};

/// Epicentral distances (deg) of the synthetic stations.
pub const DISTANCES: [f64; 10] = [0.06, 0.12, 0.18, 0.3, 0.5, 0.8, 1.1, 1.4, 1.7, 2.0];

pub fn stations_around(hypo: &Hypocentre, distances: &[f64]) -> Vec<Station> {
    distances
        .iter()
        .enumerate()
        .map(|(i, &delta)| {
            let azimuth = (i as f64 * 137.5 + 10.0) % 360.0;
            let (lat, lon) = point_at(hypo.lat, hypo.lon, delta, azimuth);
            Station::new(&format!("ST{i:02}"), lat, lon)
        })
        .collect()
}

/// One reading per station with exact P (and S when `with_s`) times.
pub fn noiseless_phases(
    model: &dyn TravelTimeModel,
    hypo: &Hypocentre,
    stations: &[Station],
    with_s: bool,
) -> Vec<Phase> {
    let mut phases = Vec::new();
    for (i, sta) in stations.iter().enumerate() {
        let (delta, _, _) = seisloc_math::geodesy::delaz(hypo.lat, hypo.lon, sta.lat, sta.lon);
        let reading = i as u64 + 1;
        let names: &[&str] = if with_s { &["P", "S"] } else { &["P"] };
        for (k, name) in names.iter().enumerate() {
            let tt = model.predict(name, delta, hypo.depth).map_or(0.0, |t| t.time);
            phases.push(Phase::new(
                reading * 10 + k as u64,
                reading,
                "SYN",
                i,
                name,
                hypo.origin_time + tt,
            ));
        }
    }
    phases
}

pub fn synthetic_event(model: &HalfSpace, truth: &Hypocentre, distances: &[f64]) -> Event {
    let stations = stations_around(truth, distances);
    let phases = noiseless_phases(model, truth, &stations, true);
    Event {
        id: 1,
        stations,
        phases,
        reported: Vec::new(),
        instructions: LocationInstructions::default(),
    }
}

pub fn variogram() -> Variogram {
    Variogram::exponential(0.5, 80.0)
}

pub fn services<'a>(model: &'a HalfSpace, variogram: &'a Variogram) -> LocatorServices<'a> {
    LocatorServices {
        model,
        correction: &NoCorrection,
        variogram,
        ordering: &SingleLinkageOrdering,
    }
}
