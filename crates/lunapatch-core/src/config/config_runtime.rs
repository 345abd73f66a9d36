//! Runtime adjustments for configuration defaults.

use tracing::warn;

use super::Config;

impl Config {
    pub(super) fn apply_runtime_defaults(&mut self) {
        let installer = &mut self.installer;
        if installer.step_delay_min_ms > installer.step_delay_max_ms {
            warn!(
                min = installer.step_delay_min_ms,
                max = installer.step_delay_max_ms,
                "step delay window is inverted; swapping bounds"
            );
            std::mem::swap(
                &mut installer.step_delay_min_ms,
                &mut installer.step_delay_max_ms,
            );
        }
        if installer.download_timeout_secs == 0 {
            warn!("download timeout of 0s is not usable; falling back to 120s");
            installer.download_timeout_secs = 120;
        }
        if let Some(level) = self.general.log_level.as_ref() {
            if level.trim().is_empty() {
                self.general.log_level = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverted_delay_window_is_swapped() {
        let config = Config::from_toml(
            "[installer]\nstep_delay_min_ms = 900\nstep_delay_max_ms = 100\n",
        )
        .expect("parse");
        assert_eq!(config.installer.step_delay_min_ms, 100);
        assert_eq!(config.installer.step_delay_max_ms, 900);
    }

    #[test]
    fn zero_timeout_and_blank_log_level_fall_back() {
        let config = Config::from_toml(
            "[general]\nlog_level = \" \"\n[installer]\ndownload_timeout_secs = 0\n",
        )
        .expect("parse");
        assert_eq!(config.installer.download_timeout_secs, 120);
        assert_eq!(config.general.log_level, None);
    }
}
