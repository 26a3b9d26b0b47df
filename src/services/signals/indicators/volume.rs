//! Volume ratio indicator.

/// Volume relative to the average of the preceding `period` bars.
///
/// The current bar is excluded from its own baseline, so a single volume
/// spike reads as a ratio well above 1.
pub struct VolumeRatio {
    period: usize,
}

impl Default for VolumeRatio {
    fn default() -> Self {
        Self { period: 5 }
    }
}

impl VolumeRatio {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }

    pub fn calculate(&self, volumes: &[f64]) -> Vec<Option<f64>> {
        (0..volumes.len())
            .map(|i| {
                if i < self.period {
                    return None;
                }
                let baseline =
                    volumes[i - self.period..i].iter().sum::<f64>() / self.period as f64;
                if baseline > 0.0 {
                    Some(volumes[i] / baseline)
                } else {
                    None
                }
            })
            .collect()
    }
}
