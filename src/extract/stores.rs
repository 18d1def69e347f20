use scraper::Html;
use tracing::debug;

use super::{element_text, join_url, next_marker_sibling, ANCHOR, MARKER_DIV};

/// A store listing as laid out on a municipality page.
#[derive(Debug, Clone)]
pub struct Store {
    pub store_name: String,
    pub store_url: String,
    /// Free-form text taken from the adjacent container; empty when the
    /// listing has no successor.
    pub opening_date: String,
}

/// Pull store links out of a rendered municipality page.
///
/// Unlike municipality extraction there is no path-token filter; store
/// links do not carry one. The opening date is not an attribute of the
/// store's own container: the site puts it in the next sibling container
/// of the same marker class. A container that fails to yield a usable
/// link is skipped on its own, never the whole page.
pub fn extract_stores(html: &str, base_url: &str) -> Vec<Store> {
    let doc = Html::parse_document(html);
    let mut stores = Vec::new();

    for div in doc.select(&MARKER_DIV) {
        let Some(link) = div.select(&ANCHOR).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            debug!("store container with an href-less anchor, skipping");
            continue;
        };
        let opening_date = next_marker_sibling(div)
            .map(element_text)
            .unwrap_or_default();
        stores.push(Store {
            store_name: element_text(link),
            store_url: join_url(base_url, href),
            opening_date,
        });
    }

    stores
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
    fn municipality_page_yields_all_linked_containers() {
        let html = fixture("kawagoe");
        let stores = extract_stores(&html, BASE);
        assert_eq!(stores.len(), 3);
        assert_eq!(stores[0].store_name, "マルエツ 川越店");
        assert_eq!(stores[0].store_url, "https://ajsm.club/Shop112010001.html");
    }

    #[test]
    fn opening_date_comes_from_next_sibling_container() {
        let html = fixture("kawagoe");
        let stores = extract_stores(&html, BASE);
        assert_eq!(stores[0].opening_date, "2020年1月15日");
        assert_eq!(stores[1].opening_date, "2018年6月3日");
    }

    #[test]
    fn missing_sibling_means_empty_opening_date() {
        let html = fixture("kawagoe");
        let stores = extract_stores(&html, BASE);
        assert_eq!(stores.last().unwrap().opening_date, "");
    }

    #[test]
    fn no_path_token_filter_on_store_links() {
        // The same prefecture fixture where municipality extraction keeps
        // only the area link: store extraction keeps both linked containers.
        let html = fixture("saitama");
        let stores = extract_stores(&html, BASE);
        assert_eq!(stores.len(), 2);
    }

    #[test]
    fn empty_page_is_empty_result() {
        assert!(extract_stores("<html><body></body></html>", BASE).is_empty());
    }
}
