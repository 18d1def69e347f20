use scraper::Html;
use tracing::debug;

use super::{element_text, join_url, ANCHOR, AREA_TOKEN, MARKER_DIV};

/// A sub-region of a prefecture, listing one or more stores. `store_count`
/// mirrors the source listing and starts at zero; nothing downstream reads
/// it before the stores themselves are fetched.
#[derive(Debug, Clone)]
pub struct Municipality {
    pub name: String,
    pub url: String,
    pub store_count: u32,
}

/// Pull municipality area links out of a rendered prefecture page.
///
/// Containers without an anchor are skipped, as are links whose target
/// lacks the area path token. Document order is preserved and a page with
/// no matching containers is a legitimate empty result, not an error.
pub fn extract_municipalities(html: &str, base_url: &str) -> Vec<Municipality> {
    let doc = Html::parse_document(html);
    let mut municipalities = Vec::new();

    for div in doc.select(&MARKER_DIV) {
        let Some(link) = div.select(&ANCHOR).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if !href.contains(AREA_TOKEN) {
            continue;
        }
        municipalities.push(Municipality {
            name: element_text(link),
            url: join_url(base_url, href),
            store_count: 0,
        });
    }

    debug!("extracted {} municipalities", municipalities.len());
    municipalities
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://ajsm.club";

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{name}.html")).unwrap()
    }

    #[test]
    fn prefecture_page_yields_area_links_only() {
        let html = fixture("saitama");
        let municipalities = extract_municipalities(&html, BASE);
        // Two linked containers on the page, but only one carries the area
        // token; the linkless container is skipped outright.
        assert_eq!(municipalities.len(), 1);
        assert_eq!(municipalities[0].name, "川越市");
        assert_eq!(municipalities[0].url, "https://ajsm.club/ShopArea11201.html");
        assert_eq!(municipalities[0].store_count, 0);
    }

    #[test]
    fn page_without_marker_containers_is_empty_not_an_error() {
        let municipalities =
            extract_municipalities("<html><body><p>メンテナンス中</p></body></html>", BASE);
        assert!(municipalities.is_empty());
    }

    #[test]
    fn store_listing_page_has_no_municipalities() {
        let html = fixture("kawagoe");
        assert!(extract_municipalities(&html, BASE).is_empty());
    }
}
