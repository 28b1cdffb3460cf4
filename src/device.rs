//! Device-parameter provider.
//!
//! The network encoder never models device physics. It asks a provider for
//! the per-junction parameters of a tile under a given illumination and gets
//! back a plain `DeviceConfig` whose `jsc` already reflects that light.

use crate::config::DeviceConfig;
use crate::error::{PvError, Result};

/// Light falling on one tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Illumination<'a> {
    /// Concentration relative to the reference spectrum, summed over the
    /// tile's photoactive pixels.
    Concentration(f64),
    /// Per-wavelength concentration, summed over the tile's photoactive
    /// pixels.
    Spectrum(&'a [f64]),
}

/// Supplies per-junction device parameters for an illumination.
pub trait DeviceParameterProvider: Send + Sync {
    /// Number of stacked junctions this device has.
    fn junctions(&self) -> usize;

    fn parameters(&self, illumination: Illumination<'_>) -> Result<DeviceConfig>;
}

/// Scales the configured short-circuit current linearly with illumination.
///
/// With a spectral response set, each junction's current is the response-
/// weighted sum over the spectrum; without one, a spectrum is reduced to its
/// mean concentration.
#[derive(Debug, Clone)]
pub struct ScaledProvider {
    base: DeviceConfig,
    spectral_response: Option<Vec<Vec<f64>>>,
}

impl ScaledProvider {
    pub fn new(base: DeviceConfig) -> Result<Self> {
        base.validate()?;
        Ok(Self {
            base,
            spectral_response: None,
        })
    }

    /// Weights per junction per wavelength slice, in A/m^2 per unit
    /// concentration.
    pub fn with_spectral_response(mut self, response: Vec<Vec<f64>>) -> Result<Self> {
        if response.len() != self.base.junctions() {
            return Err(PvError::Device(format!(
                "spectral response covers {} junctions, device has {}",
                response.len(),
                self.base.junctions()
            )));
        }
        self.spectral_response = Some(response);
        Ok(self)
    }

    pub fn base(&self) -> &DeviceConfig {
        &self.base
    }
}

impl DeviceParameterProvider for ScaledProvider {
    fn junctions(&self) -> usize {
        self.base.junctions()
    }

    fn parameters(&self, illumination: Illumination<'_>) -> Result<DeviceConfig> {
        let mut params = self.base.clone();
        match (illumination, &self.spectral_response) {
            (Illumination::Concentration(x), _) => {
                params.jsc.iter_mut().for_each(|j| *j *= x);
            }
            (Illumination::Spectrum(spectrum), Some(response)) => {
                for (jsc, weights) in params.jsc.iter_mut().zip(response) {
                    if weights.len() != spectrum.len() {
                        return Err(PvError::Device(format!(
                            "spectrum has {} slices, response has {}",
                            spectrum.len(),
                            weights.len()
                        )));
                    }
                    *jsc = weights.iter().zip(spectrum).map(|(w, s)| w * s).sum();
                }
            }
            (Illumination::Spectrum(spectrum), None) => {
                if spectrum.is_empty() {
                    return Err(PvError::Device("empty illumination spectrum".into()));
                }
                let mean = spectrum.iter().sum::<f64>() / spectrum.len() as f64;
                params.jsc.iter_mut().for_each(|j| *j *= mean);
            }
        }
        Ok(params)
    }
}
