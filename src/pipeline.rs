use std::path::PathBuf;

use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::ScraperConfig;
use crate::error::Result;
use crate::extract::municipalities::extract_municipalities;
use crate::extract::stores::extract_stores;
use crate::fetcher::{BrowserSession, PageFetcher};
use crate::output::{append_store, StoreRecord};

/// Counters for one prefecture run.
#[derive(Debug)]
pub struct ScrapeOutcome {
    pub output: PathBuf,
    pub municipalities: usize,
    pub stores_saved: usize,
    pub municipalities_skipped: usize,
}

/// Scrape every municipality of a prefecture, persisting each store as it
/// is extracted. A municipality whose page cannot be loaded is logged and
/// skipped with no retry; the run is still a success with whatever partial
/// data made it to disk. There is no checkpointing: dedup-on-append makes
/// a restart idempotent, it just starts over from the first municipality.
pub async fn scrape_prefecture<S: BrowserSession>(
    fetcher: &PageFetcher<S>,
    config: &ScraperConfig,
    prefecture: &str,
    output: Option<PathBuf>,
) -> Result<ScrapeOutcome> {
    let entry_url = config.entry_url(prefecture)?;
    let output = output.unwrap_or_else(|| default_output(prefecture));

    let municipalities = match fetcher.load(entry_url).await {
        Ok(doc) => extract_municipalities(&doc.html, &config.base_url),
        Err(e) => {
            warn!("could not load prefecture page {entry_url}: {e}");
            Vec::new()
        }
    };
    let total = municipalities.len();
    info!("{prefecture}: {total} municipalities");

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let mut stores_saved = 0usize;
    let mut skipped = 0usize;

    for (i, municipality) in municipalities.iter().enumerate() {
        info!("processing: {} ({}/{})", municipality.name, i + 1, total);

        match fetcher.load(&municipality.url).await {
            Ok(doc) => {
                for store in extract_stores(&doc.html, &config.base_url) {
                    let record = StoreRecord {
                        prefecture: prefecture.to_string(),
                        municipality: municipality.name.clone(),
                        store_name: store.store_name,
                        store_url: store.store_url,
                        opening_date: store.opening_date,
                    };
                    if append_store(&record, &output) {
                        stores_saved += 1;
                    }
                }
            }
            Err(e) => {
                warn!("skipping {}: {e}", municipality.name);
                skipped += 1;
            }
        }

        pb.inc(1);
        // Bound the request rate regardless of how long extraction took.
        sleep(config.pace_delay).await;
    }

    pb.finish_and_clear();
    info!(
        "{prefecture}: saved {stores_saved} stores across {} municipalities ({skipped} skipped)",
        total - skipped
    );

    Ok(ScrapeOutcome {
        output,
        municipalities: total,
        stores_saved,
        municipalities_skipped: skipped,
    })
}

fn default_output(prefecture: &str) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    PathBuf::from(format!("ajsm_data_{prefecture}_{timestamp}.csv"))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;
    use crate::error::Error;
    use crate::output::load_records;

    /// Serves canned HTML for known URLs; navigation to anything else fails
    /// the way a dead page load would.
    struct FixtureSession {
        pages: HashMap<String, String>,
        current: Mutex<Option<String>>,
    }

    impl FixtureSession {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(url, fixture)| {
                        let html = std::fs::read_to_string(format!(
                            "tests/fixtures/{fixture}.html"
                        ))
                        .unwrap();
                        (url.to_string(), html)
                    })
                    .collect(),
                current: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl BrowserSession for FixtureSession {
        async fn navigate(&self, url: &str) -> crate::error::Result<()> {
            if self.pages.contains_key(url) {
                *self.current.lock().await = Some(url.to_string());
                Ok(())
            } else {
                Err(Error::Session(format!("no fixture for {url}")))
            }
        }

        async fn exists(&self, selector: &str) -> bool {
            selector == "body"
        }

        async fn click(&self, selector: &str) -> crate::error::Result<()> {
            Err(Error::ElementNotFound(selector.to_string()))
        }

        async fn enter_frame(&self, _selector: &str) -> crate::error::Result<()> {
            Ok(())
        }

        async fn exit_frame(&self) {}

        async fn content(&self) -> crate::error::Result<String> {
            let current = self.current.lock().await;
            current
                .as_ref()
                .and_then(|url| self.pages.get(url))
                .cloned()
                .ok_or_else(|| Error::Session("no page loaded".to_string()))
        }

        async fn current_url(&self) -> Option<String> {
            self.current.lock().await.clone()
        }

        async fn close(&mut self) {}
    }

    fn test_config() -> ScraperConfig {
        ScraperConfig {
            load_timeout: Duration::from_millis(10),
            settle_delay: Duration::ZERO,
            ad_dismiss_delay: Duration::ZERO,
            pace_delay: Duration::ZERO,
            ..ScraperConfig::default()
        }
    }

    fn saitama_fetcher() -> PageFetcher<FixtureSession> {
        let session = FixtureSession::new(&[
            ("https://ajsm.club/saitama.html", "saitama"),
            ("https://ajsm.club/ShopArea11201.html", "kawagoe"),
        ]);
        PageFetcher::new(session, test_config())
    }

    #[tokio::test]
    async fn full_run_persists_every_store_once() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("saitama.csv");
        let fetcher = saitama_fetcher();
        let config = test_config();

        let outcome = scrape_prefecture(&fetcher, &config, "埼玉県", Some(output.clone()))
            .await
            .unwrap();
        assert_eq!(outcome.municipalities, 1);
        assert_eq!(outcome.stores_saved, 3);
        assert_eq!(outcome.municipalities_skipped, 0);

        let rows = load_records(&output).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].prefecture, "埼玉県");
        assert_eq!(rows[0].municipality, "川越市");
        assert_eq!(rows[0].store_name, "マルエツ 川越店");
        assert_eq!(rows[0].opening_date, "2020年1月15日");
        assert_eq!(rows[2].opening_date, "");
    }

    #[tokio::test]
    async fn rerun_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("saitama.csv");
        let fetcher = saitama_fetcher();
        let config = test_config();

        scrape_prefecture(&fetcher, &config, "埼玉県", Some(output.clone()))
            .await
            .unwrap();
        scrape_prefecture(&fetcher, &config, "埼玉県", Some(output.clone()))
            .await
            .unwrap();

        assert_eq!(load_records(&output).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn failed_municipality_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("saitama.csv");
        // Prefecture page loads, but the municipality page does not.
        let session = FixtureSession::new(&[("https://ajsm.club/saitama.html", "saitama")]);
        let fetcher = PageFetcher::new(session, test_config());
        let config = test_config();

        let outcome = scrape_prefecture(&fetcher, &config, "埼玉県", Some(output.clone()))
            .await
            .unwrap();
        assert_eq!(outcome.municipalities, 1);
        assert_eq!(outcome.municipalities_skipped, 1);
        assert_eq!(outcome.stores_saved, 0);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn dead_prefecture_page_means_empty_run_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("saitama.csv");
        let session = FixtureSession::new(&[]);
        let fetcher = PageFetcher::new(session, test_config());
        let config = test_config();

        let outcome = scrape_prefecture(&fetcher, &config, "埼玉県", Some(output))
            .await
            .unwrap();
        assert_eq!(outcome.municipalities, 0);
        assert_eq!(outcome.stores_saved, 0);
    }

    #[tokio::test]
    async fn unsupported_prefecture_is_a_hard_error() {
        let fetcher = saitama_fetcher();
        let config = test_config();

        let err = scrape_prefecture(&fetcher, &config, "大阪府", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedPrefecture(p) if p == "大阪府"));
    }
}
