pub mod municipalities;
pub mod stores;

use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

/// The source site lays out both municipality links and store links with
/// the same recurring container class; page context and the `Area` path
/// token are all that tell them apart.
static MARKER_DIV: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.fr").unwrap());
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

/// Path token distinguishing municipality area links from other links on
/// the same prefecture page.
const AREA_TOKEN: &str = "Area";

/// Join a relative href onto the site base, normalizing the `./` prefix.
fn join_url(base: &str, href: &str) -> String {
    format!("{}{}", base, href.replace("./", "/"))
}

/// Next sibling container with the marker class, skipping text nodes and
/// unrelated elements in between.
fn next_marker_sibling(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|s| s.value().name() == "div" && s.value().classes().any(|c| c == "fr"))
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_normalizes_relative_prefix() {
        assert_eq!(
            join_url("https://ajsm.club", "./ShopArea11201.html"),
            "https://ajsm.club/ShopArea11201.html"
        );
    }

    #[test]
    fn join_keeps_rooted_paths() {
        assert_eq!(
            join_url("https://ajsm.club", "/Shop112010001.html"),
            "https://ajsm.club/Shop112010001.html"
        );
    }
}
