// SimulatedSource - board stand-in for demos and dry runs
//
// Produces samples scattered around a centre per kind. Seeded sources are
// reproducible, which keeps CLI demos and tests stable.

use std::collections::HashMap;

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::SensorError;
use crate::reading::{RawSample, SensorKind};
use crate::sensor::{SensorHandle, SensorPins, SensorSource};

/// Creates simulated boards
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    centres: HashMap<SensorKind, f64>,
    jitter: f64,
    seed: Option<u64>,
    initializations: u32,
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SimulatedSource {
    /// Centres follow the values the dashboard falls back to when the
    /// board is unreachable.
    pub fn new(seed: Option<u64>) -> Self {
        let centres = HashMap::from([
            (SensorKind::SoilMoisture, 0.5),
            (SensorKind::AirTemperature, 0.5),
            (SensorKind::AirFlow, 0.2),
            (SensorKind::AirLight, 0.5),
        ]);
        Self {
            centres,
            jitter: 0.05,
            seed,
            initializations: 0,
        }
    }

    pub fn with_centre(mut self, kind: SensorKind, centre: f64) -> Self {
        self.centres.insert(kind, centre.clamp(0.0, 1.0));
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.abs();
        self
    }

    /// How many boards have been handed out
    pub fn initializations(&self) -> u32 {
        self.initializations
    }
}

impl SensorSource for SimulatedSource {
    type Handle = SimulatedBoard;

    fn initialize(&mut self, port: &str, pins: &SensorPins) -> Result<Self::Handle, SensorError> {
        self.initializations += 1;
        let rng = match self.seed {
            // Offset per board so a reconnect does not replay the same values
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(u64::from(self.initializations))),
            None => StdRng::from_entropy(),
        };
        info!("[Simulated] board #{} on {}", self.initializations, port);

        Ok(SimulatedBoard {
            rng,
            pins: *pins,
            centres: self.centres.clone(),
            jitter: self.jitter,
            open: true,
        })
    }
}

/// One simulated board handle
#[derive(Debug)]
pub struct SimulatedBoard {
    rng: StdRng,
    pins: SensorPins,
    centres: HashMap<SensorKind, f64>,
    jitter: f64,
    open: bool,
}

impl SensorHandle for SimulatedBoard {
    fn read(&mut self, kind: SensorKind) -> Result<Option<RawSample>, SensorError> {
        if !self.open {
            return Err(SensorError::NotInitialized);
        }
        if self.pins.pin(kind).is_none() {
            return Err(SensorError::UnknownPin { kind });
        }

        let Some(centre) = self.centres.get(&kind).copied() else {
            return Ok(None);
        };
        let offset = if self.jitter > 0.0 {
            self.rng.gen_range(-self.jitter..=self.jitter)
        } else {
            0.0
        };
        Ok(Some((centre + offset).clamp(0.0, 1.0)))
    }

    fn close(&mut self) {
        self.open = false;
    }
}
