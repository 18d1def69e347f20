use std::time::Duration;

use crate::error::{Error, Result};

/// Entry page for one supported prefecture.
#[derive(Debug, Clone, Copy)]
pub struct PrefectureTarget {
    pub name: &'static str,
    pub entry_url: &'static str,
}

/// The fixed set of prefectures the directory covers. Anything else is a
/// configuration error, not a scrape failure.
pub const PREFECTURES: &[PrefectureTarget] = &[
    PrefectureTarget {
        name: "埼玉県",
        entry_url: "https://ajsm.club/saitama.html",
    },
    PrefectureTarget {
        name: "千葉県",
        entry_url: "https://ajsm.club/chiba.html",
    },
    PrefectureTarget {
        name: "東京都",
        entry_url: "https://ajsm.club/tokyo.html",
    },
    PrefectureTarget {
        name: "神奈川県",
        entry_url: "https://ajsm.club/kanagawa.html",
    },
];

const BASE_URL: &str = "https://ajsm.club";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Everything timing- and site-related in one place so tests can override
/// delays without touching globals.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub base_url: String,
    pub user_agent: String,
    /// Upper bound on the poll-wait for the document root.
    pub load_timeout: Duration,
    /// Fixed grace period after the root is ready; dynamically injected
    /// content is not covered by the readiness condition.
    pub settle_delay: Duration,
    /// Wait for the ad dismissal animation to finish.
    pub ad_dismiss_delay: Duration,
    /// Pause between municipalities to bound the request rate.
    pub pace_delay: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            user_agent: USER_AGENT.to_string(),
            load_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_secs(3),
            ad_dismiss_delay: Duration::from_secs(1),
            pace_delay: Duration::from_secs(2),
        }
    }
}

impl ScraperConfig {
    /// Entry URL for a prefecture, or a hard error when it is outside the
    /// supported set.
    pub fn entry_url(&self, prefecture: &str) -> Result<&'static str> {
        PREFECTURES
            .iter()
            .find(|p| p.name == prefecture)
            .map(|p| p.entry_url)
            .ok_or_else(|| Error::UnsupportedPrefecture(prefecture.to_string()))
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_url_for_supported_prefecture() {
        let config = ScraperConfig::default();
        assert_eq!(
            config.entry_url("埼玉県").unwrap(),
            "https://ajsm.club/saitama.html"
        );
    }

    #[test]
    fn entry_url_rejects_unknown_prefecture() {
        let config = ScraperConfig::default();
        let err = config.entry_url("北海道").unwrap_err();
        assert!(matches!(err, Error::UnsupportedPrefecture(p) if p == "北海道"));
    }

    #[test]
    fn defaults_match_site_pacing() {
        let config = ScraperConfig::default();
        assert_eq!(config.load_timeout, Duration::from_secs(10));
        assert_eq!(config.settle_delay, Duration::from_secs(3));
        assert_eq!(config.pace_delay, Duration::from_secs(2));
    }
}
