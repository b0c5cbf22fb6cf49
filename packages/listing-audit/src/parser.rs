//! Image URL extraction from listing markup.
//!
//! Listing pages mark their gallery photos as lazily loaded:
//! `<img class="lazyload" data-src="https://...">`. Only those elements are
//! considered; eagerly loaded `src` images are logos and icons.

use indexmap::IndexSet;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::types::ImageReference;

const DEFERRED_SOURCE_ATTR: &str = "data-src";

lazy_static! {
    static ref LAZY_IMAGE_SELECTOR: Selector = Selector::parse("img.lazyload").unwrap();
}

/// Extract distinct image URLs in first-occurrence order.
///
/// Markup is tokenized permissively; anything the selector cannot match
/// simply yields no URLs.
pub fn parse_image_urls(markup: &str) -> Vec<String> {
    let document = Html::parse_document(markup);

    let urls: IndexSet<String> = document
        .select(&LAZY_IMAGE_SELECTOR)
        .filter_map(|el| el.value().attr(DEFERRED_SOURCE_ATTR))
        .map(str::trim)
        .filter(|src| is_absolute_http_url(src))
        .map(str::to_string)
        .collect();

    debug!(count = urls.len(), "Extracted image URLs");

    urls.into_iter().collect()
}

/// Same as [`parse_image_urls`], with dense positions assigned after dedup.
pub fn image_references(markup: &str) -> Vec<ImageReference> {
    parse_image_urls(markup)
        .into_iter()
        .enumerate()
        .map(|(position, url)| ImageReference::new(position, url))
        .collect()
}

fn is_absolute_http_url(candidate: &str) -> bool {
    Url::parse(candidate)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}
