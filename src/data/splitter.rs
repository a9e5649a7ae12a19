// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Shuffles turns with a seeded RNG and cuts them into a training
// and a validation part. The same seed always yields the same
// split, so a resumed run validates on the same turns.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with `seed` and split into (train, validation).
///
/// `train_fraction` is clamped to `[0, 1]`; the training part gets
/// `round(len × train_fraction)` items.
pub fn split_train_val<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let fraction = train_fraction.clamp(0.0, 1.0);
    let split_at = ((total as f64) * fraction).round() as usize;
    let val      = samples.split_off(split_at.min(total));

    tracing::debug!("Dataset split: {} training, {} validation", samples.len(), val.len());
    (samples, val)
}
