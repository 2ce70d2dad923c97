//! DDIM noise scheduler matching the Stable Diffusion 1.5 training setup.

use ndarray::Array4;

use crate::error::{Error, Result};

/// Number of diffusion steps the model was trained with.
const TRAIN_TIMESTEPS: usize = 1000;

/// Scaled-linear beta schedule bounds.
const BETA_START: f64 = 0.000_85;
const BETA_END: f64 = 0.012;

/// Offset added to every inference timestep.
const STEPS_OFFSET: usize = 1;

/// Largest step count whose offset timesteps stay distinct and in range.
#[allow(clippy::cast_possible_truncation)]
pub const MAX_INFERENCE_STEPS: u32 = (TRAIN_TIMESTEPS - STEPS_OFFSET) as u32;

/// Deterministic (eta = 0) DDIM scheduler.
#[derive(Debug, Clone)]
pub struct DdimScheduler {
    alphas_cumprod: Vec<f64>,
    timesteps: Vec<usize>,
    step_ratio: usize,
}

impl DdimScheduler {
    /// Build a scheduler for the given number of inference steps.
    ///
    /// # Errors
    ///
    /// Returns an error if `num_steps` is zero or above [`MAX_INFERENCE_STEPS`].
    pub fn new(num_steps: u32) -> Result<Self> {
        if num_steps == 0 || num_steps > MAX_INFERENCE_STEPS {
            return Err(Error::InvalidParameter {
                name: "num_steps".to_string(),
                reason: format!("must be between 1 and {MAX_INFERENCE_STEPS}"),
            });
        }
        let steps = num_steps as usize;

        let alphas_cumprod = alphas_cumprod();
        let step_ratio = TRAIN_TIMESTEPS / steps;
        let timesteps = (0..steps)
            .rev()
            .map(|i| i * step_ratio + STEPS_OFFSET)
            .collect();

        Ok(Self {
            alphas_cumprod,
            timesteps,
            step_ratio,
        })
    }

    /// Timesteps to visit, from noisiest to cleanest.
    #[must_use]
    pub fn timesteps(&self) -> &[usize] {
        &self.timesteps
    }

    /// Standard deviation of the initial noise.
    #[must_use]
    pub const fn init_noise_sigma(&self) -> f32 {
        1.0
    }

    /// Cumulative alpha product at a training timestep.
    #[must_use]
    pub fn alpha_cumprod(&self, timestep: usize) -> f64 {
        self.alphas_cumprod[timestep.min(TRAIN_TIMESTEPS - 1)]
    }

    /// Compute the sample at the previous timestep from a noise prediction.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn step(&self, noise_pred: &Array4<f32>, timestep: usize, sample: &Array4<f32>) -> Array4<f32> {
        let alpha_t = self.alpha_cumprod(timestep);
        // The final step lands on alpha_cumprod[0] rather than 1.0.
        let alpha_prev = timestep
            .checked_sub(self.step_ratio)
            .map_or(self.alphas_cumprod[0], |prev| self.alpha_cumprod(prev));

        let sqrt_alpha_t = alpha_t.sqrt() as f32;
        let sqrt_one_minus_t = (1.0 - alpha_t).sqrt() as f32;
        let sqrt_alpha_prev = alpha_prev.sqrt() as f32;
        let sqrt_one_minus_prev = (1.0 - alpha_prev).sqrt() as f32;

        let pred_original = (sample - &(noise_pred * sqrt_one_minus_t)) / sqrt_alpha_t;
        pred_original * sqrt_alpha_prev + noise_pred * sqrt_one_minus_prev
    }
}

#[allow(clippy::cast_precision_loss)]
fn alphas_cumprod() -> Vec<f64> {
    let (start, end) = (BETA_START.sqrt(), BETA_END.sqrt());
    let last = (TRAIN_TIMESTEPS - 1) as f64;

    let mut product = 1.0;
    (0..TRAIN_TIMESTEPS)
        .map(|i| {
            let beta = (start + (end - start) * i as f64 / last).powi(2);
            product *= 1.0 - beta;
            product
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timesteps_for_default_steps() {
        let scheduler = DdimScheduler::new(20).unwrap();
        let timesteps = scheduler.timesteps();

        assert_eq!(timesteps.len(), 20);
        assert_eq!(timesteps[0], 951);
        assert_eq!(timesteps[19], 1);
        assert!(timesteps.windows(2).all(|w| w[0] - w[1] == 50));
    }

    #[test]
    fn test_invalid_step_counts() {
        assert!(DdimScheduler::new(0).is_err());
        assert!(DdimScheduler::new(1000).is_err());
        assert!(DdimScheduler::new(MAX_INFERENCE_STEPS).is_ok());
    }

    #[test]
    fn test_max_steps_timesteps_are_distinct() {
        let scheduler = DdimScheduler::new(MAX_INFERENCE_STEPS).unwrap();
        let timesteps = scheduler.timesteps();

        assert_eq!(timesteps.len(), 999);
        assert_eq!(timesteps[0], 999);
        assert_eq!(timesteps[998], 1);
        assert!(timesteps.windows(2).all(|w| w[0] == w[1] + 1));
    }

    #[test]
    fn test_alphas_decrease() {
        let scheduler = DdimScheduler::new(10).unwrap();
        let first = scheduler.alpha_cumprod(0);
        let last = scheduler.alpha_cumprod(999);

        assert!(first < 1.0 && first > 0.99);
        assert!(last > 0.0 && last < 0.01);
        assert!(scheduler.alpha_cumprod(500) < first);
    }

    #[test]
    #[allow(clippy::cast_possible_truncation)]
    fn test_step_follows_exact_noise() {
        // With a perfect noise prediction, one step moves the sample onto the
        // previous timestep's noise level for the same clean image.
        let scheduler = DdimScheduler::new(20).unwrap();
        let t = scheduler.timesteps()[5];
        let prev = t - 50;

        let x0 = Array4::<f32>::from_elem((1, 4, 2, 2), 0.3);
        let eps = Array4::<f32>::from_elem((1, 4, 2, 2), -0.7);

        let mix = |alpha: f64| {
            &x0 * alpha.sqrt() as f32 + &eps * (1.0 - alpha).sqrt() as f32
        };

        let sample = mix(scheduler.alpha_cumprod(t));
        let stepped = scheduler.step(&eps, t, &sample);
        let expected = mix(scheduler.alpha_cumprod(prev));

        for (a, b) in stepped.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-4, "{a} != {b}");
        }
    }
}
