use nalgebra::DVector;
use serde::{Serialize, Deserialize};

/// Moving-average filter over measured generalized velocities.  Holds a fixed-capacity
/// window of the most recent samples; `average` is the arithmetic mean of whatever is
/// currently in the window.
///
/// The raw velocity measurement never reaches the task builder directly; everything
/// downstream of the filter (Jacobian-derivative products, derivative gains) consumes
/// the windowed mean.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VelocityFilter {
    window_size: usize,
    dimension: usize,
    samples: Vec<DVector<f64>>,
    cursor: usize,
    average: DVector<f64>
}
impl VelocityFilter {
    pub fn new(window_size: usize, dimension: usize) -> Self {
        assert!(window_size > 0);
        Self {
            window_size,
            dimension,
            samples: Vec::with_capacity(window_size),
            cursor: 0,
            average: DVector::zeros(dimension)
        }
    }
    /// Appends the newest sample, evicting the oldest one once the window is full.
    pub fn add_sample(&mut self, sample: &DVector<f64>) {
        assert_eq!(sample.len(), self.dimension);

        if self.samples.len() < self.window_size {
            self.samples.push(sample.clone());
        } else {
            self.samples[self.cursor] = sample.clone();
        }
        self.cursor = (self.cursor + 1) % self.window_size;

        let mut sum = DVector::zeros(self.dimension);
        for s in &self.samples { sum += s; }
        self.average = sum / self.samples.len() as f64;
    }
    /// Arithmetic mean of all samples currently held.  Zero before the first sample.
    pub fn average(&self) -> &DVector<f64> {
        &self.average
    }
    pub fn num_samples_held(&self) -> usize {
        self.samples.len()
    }
    pub fn window_size(&self) -> usize {
        self.window_size
    }
    pub fn reset(&mut self) {
        self.samples.clear();
        self.cursor = 0;
        self.average = DVector::zeros(self.dimension);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_input_average_is_exact() {
        let mut filter = VelocityFilter::new(4, 3);
        let sample = DVector::from_vec(vec![1.5, -2.0, 0.25]);
        for _ in 0..10 {
            filter.add_sample(&sample);
        }
        assert_eq!(filter.num_samples_held(), 4);
        assert_eq!(filter.average(), &sample);
    }

    #[test]
    fn test_partial_window_average() {
        let mut filter = VelocityFilter::new(4, 1);
        filter.add_sample(&DVector::from_vec(vec![1.0]));
        filter.add_sample(&DVector::from_vec(vec![3.0]));
        assert!((filter.average()[0] - 2.0).abs() < 1e-15);
    }

    #[test]
    fn test_oldest_sample_is_evicted() {
        let mut filter = VelocityFilter::new(2, 1);
        filter.add_sample(&DVector::from_vec(vec![10.0]));
        filter.add_sample(&DVector::from_vec(vec![2.0]));
        filter.add_sample(&DVector::from_vec(vec![4.0]));
        assert!((filter.average()[0] - 3.0).abs() < 1e-15);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut filter = VelocityFilter::new(3, 2);
        filter.add_sample(&DVector::from_vec(vec![1.0, 1.0]));
        filter.reset();
        assert_eq!(filter.num_samples_held(), 0);
        assert_eq!(filter.average(), &DVector::zeros(2));
    }
}
