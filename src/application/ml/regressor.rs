/// A trained model mapping one normalized window to the next normalized value.
pub trait SequenceRegressor: Send + Sync {
    /// Predict the normalized value following `window` (oldest value first).
    fn predict(&self, window: &[f64]) -> Result<f64, String>;

    /// Predict every window in order.
    fn predict_batch(&self, windows: &[Vec<f64>]) -> Result<Vec<f64>, String> {
        windows.iter().map(|w| self.predict(w)).collect()
    }

    /// Get model name/type
    fn name(&self) -> &str;
}

/// Adapts a plain function into a regressor. Used for baselines and tests.
pub struct FnRegressor<F> {
    name: String,
    f: F,
}

impl<F> FnRegressor<F>
where
    F: Fn(&[f64]) -> Result<f64, String> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> SequenceRegressor for FnRegressor<F>
where
    F: Fn(&[f64]) -> Result<f64, String> + Send + Sync,
{
    fn predict(&self, window: &[f64]) -> Result<f64, String> {
        (self.f)(window)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
