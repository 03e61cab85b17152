mod test_classify;
mod test_evaluation;
mod test_operators;
mod test_pipeline;
mod test_scoring;

use crate::config::MiningConfig;

/// Installs `env_logger` once per test binary.
pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Small-vocabulary defaults: no threshold surprises, tiny batches.
pub fn test_config() -> MiningConfig {
    MiningConfig {
        top_k: 5,
        similarity_threshold: 0.0,
        batch_size: 4,
        flush_every: 2,
        ..Default::default()
    }
}
