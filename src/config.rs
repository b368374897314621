//! Pipeline configuration — bundles every detector's tunables behind one
//! `Default` impl, the way the teacher's `ValidatorConfig` bundles its own
//! velocity/risk thresholds.

use crate::cycle_detector::CycleDetectorConfig;
use crate::shell_detector::ShellDetectorConfig;
use crate::smurfing_detector::SmurfingDetectorConfig;

/// Every threshold the analysis pipeline needs, gathered in one place so a
/// caller can override a single detector's behavior without touching the
/// others.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub cycle: CycleDetectorConfig,
    pub smurfing: SmurfingDetectorConfig,
    pub shell: ShellDetectorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cycle: CycleDetectorConfig::default(),
            smurfing: SmurfingDetectorConfig::default(),
            shell: ShellDetectorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_each_detectors_own_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.cycle.max_length, crate::cycle_detector::DEFAULT_MAX_LENGTH);
        assert_eq!(
            config.smurfing.window_hours,
            crate::smurfing_detector::DEFAULT_WINDOW_HOURS
        );
        assert_eq!(
            config.shell.max_chain_length,
            crate::shell_detector::DEFAULT_MAX_CHAIN_LENGTH
        );
    }
}
