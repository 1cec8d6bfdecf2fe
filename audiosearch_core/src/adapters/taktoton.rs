//! Taktoton.com used-equipment category.
//!
//! The shop has no search for its used stock, so the adapter walks the
//! `/begagnat` category pages and filters products locally. Each page is
//! pushed as soon as it is parsed; a failure on a later page leaves the
//! earlier pages in the sink.

use std::collections::HashSet;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::parse::parse_off_thread;
use super::{fetch_html, http_client, AdapterQuery, ListingSink};
use crate::error::AdapterError;
use crate::listing::Listing;
use crate::utils::{collapse_whitespace, extract_price, matches_all_terms, normalize_url};
use crate::Adapter;

pub const BASE_URL: &str = "https://taktoton.com";
const CATEGORY_PATH: &str = "/begagnat";
const MAX_PAGES: u32 = 10;

fn sel(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static PRODUCT: Lazy<Selector> = Lazy::new(|| sel("li.product-item"));
static PRODUCT_LINK: Lazy<Selector> = Lazy::new(|| sel("a.product-item-link"));
static PRICE: Lazy<Selector> = Lazy::new(|| sel("span.price"));
static PHOTO: Lazy<Selector> = Lazy::new(|| sel("img.product-image-photo"));
static DISCOUNT: Lazy<Selector> = Lazy::new(|| sel(".product-item-discount"));
static NEXT_PAGE: Lazy<Selector> =
    Lazy::new(|| sel(r#".pages a.next, .pages a[title*="Nästa"]"#));

/// One parsed category page.
#[derive(Debug, Default)]
pub struct CategoryPage {
    /// Every product on the page, unfiltered
    pub listings: Vec<Listing>,
    pub has_next: bool,
}

pub struct TaktotonAdapter {
    client: reqwest::Client,
    base: Url,
}

impl TaktotonAdapter {
    pub fn new(user_agent: &str) -> Result<Self, AdapterError> {
        Self::with_base_url(user_agent, BASE_URL)
    }

    pub fn with_base_url(user_agent: &str, base_url: &str) -> Result<Self, AdapterError> {
        let base = Url::parse(base_url)
            .map_err(|e| AdapterError::Other(format!("invalid base url {}: {}", base_url, e)))?;
        Ok(Self {
            client: http_client(user_agent)?,
            base,
        })
    }

    fn page_url(&self, page: u32) -> Result<Url, AdapterError> {
        let mut url = self
            .base
            .join(CATEGORY_PATH)
            .map_err(|e| AdapterError::Other(format!("bad category path: {}", e)))?;
        if page > 1 {
            url.query_pairs_mut().append_pair("p", &page.to_string());
        }
        Ok(url)
    }
}

#[async_trait]
impl Adapter for TaktotonAdapter {
    fn id(&self) -> &'static str {
        "taktoton"
    }

    fn display_name(&self) -> &'static str {
        "Taktoton"
    }

    fn description(&self) -> &'static str {
        "Used hifi from the Taktoton shop (taktoton.com/begagnat)"
    }

    async fn search(&self, query: &AdapterQuery, sink: &mut ListingSink) -> Result<(), AdapterError> {
        let mut seen = HashSet::new();

        for page in 1..=MAX_PAGES {
            let url = self.page_url(page)?;
            let html = fetch_html(&self.client, url.as_str()).await?;
            let base = self.base.clone();
            let parsed =
                parse_off_thread(self.id(), html, move |html| parse_category_page(html, &base))
                    .await?;

            if parsed.listings.is_empty() {
                if page == 1 {
                    return Err(AdapterError::Structure(
                        "no li.product-item on the first category page".to_string(),
                    ));
                }
                break;
            }

            let on_page = parsed.listings.len();
            let mut kept = 0usize;
            for listing in parsed.listings {
                if !listing_matches(&listing, query) || !seen.insert(listing.url.clone()) {
                    continue;
                }
                if sink.push(listing) {
                    kept += 1;
                }
            }
            debug!(target: "audiosearch.adapter.taktoton", page, on_page, kept, "category page done");

            if !parsed.has_next {
                break;
            }
        }
        Ok(())
    }
}

fn listing_matches(listing: &Listing, query: &AdapterQuery) -> bool {
    let haystack = format!(
        "{} {}",
        listing.title,
        listing.description.as_deref().unwrap_or_default()
    );
    matches_all_terms(&haystack, &query.terms) && query.price_in_bounds(listing.price_amount())
}

/// Parse one Magento category page.
pub fn parse_category_page(html: &str, base: &Url) -> CategoryPage {
    let document = Html::parse_document(html);
    let listings = document
        .select(&PRODUCT)
        .filter_map(|node| parse_product(node, base))
        .collect();
    CategoryPage {
        listings,
        has_next: document.select(&NEXT_PAGE).next().is_some(),
    }
}

fn text_of(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

fn parse_product(node: ElementRef<'_>, base: &Url) -> Option<Listing> {
    let link = node.select(&PRODUCT_LINK).next()?;
    let title = text_of(link);
    let href = link.value().attr("href").unwrap_or_default();

    let price = node
        .select(&PRICE)
        .next()
        .and_then(|el| extract_price(&text_of(el)));
    let mut listing =
        Listing::new("taktoton", title, normalize_url(base, href)).with_price_amount(price);

    if let Some(image) = node.select(&PHOTO).next().and_then(|img| {
        img.value()
            .attr("src")
            .or_else(|| img.value().attr("data-src"))
    }) {
        listing = listing.with_image_url(normalize_url(base, image));
    }

    if let Some(discount) = node
        .select(&DISCOUNT)
        .next()
        .map(text_of)
        .filter(|t| !t.is_empty())
    {
        listing = listing.with_description(discount);
    }

    Some(listing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse(BASE_URL).unwrap()
    }

    fn product(href: &str, title: &str, price: &str) -> String {
        let slug = href.trim_start_matches("/begagnat/").trim_end_matches(".html");
        format!(
            r#"<li class="item product product-item">
                 <img class="product-image-photo" src="/media/catalog/product/{slug}.jpg">
                 <a class="product-item-link" href="{href}"> {title} </a>
                 <span class="price-container"><span class="price">{price}</span></span>
               </li>"#
        )
    }

    fn page(products: &[String], next: bool) -> String {
        let pager = if next {
            r#"<div class="pages"><a class="action next" href="?p=2" title="Nästa">Nästa</a></div>"#
        } else {
            r#"<div class="pages"></div>"#
        };
        format!(
            r#"<html><body><ol class="products product-items">{}</ol>{}</body></html>"#,
            products.join(""),
            pager
        )
    }

    #[test]
    fn test_parse_category_page() {
        let html = page(
            &[
                product("/begagnat/hegel-h90.html", "Hegel H90", "9 995 kr"),
                product("/begagnat/rega-planar-3.html", "Rega Planar 3", "Pris på begäran"),
            ],
            true,
        );
        let parsed = parse_category_page(&html, &base());

        assert!(parsed.has_next);
        assert_eq!(parsed.listings.len(), 2);
        let first = &parsed.listings[0];
        assert_eq!(first.title, "Hegel H90");
        assert_eq!(first.url, "https://taktoton.com/begagnat/hegel-h90.html");
        assert_eq!(first.price_amount(), Some(9995.0));
        assert_eq!(
            first.image_url.as_deref(),
            Some("https://taktoton.com/media/catalog/product/hegel-h90.jpg")
        );
        assert_eq!(parsed.listings[1].price_amount(), None);
    }

    #[test]
    fn test_discount_becomes_description() {
        let html = r#"<html><body><ol>
            <li class="product-item">
              <a class="product-item-link" href="/begagnat/a.html">NAD C 356BEE</a>
              <span class="price">4 995 kr</span>
              <div class="product-item-discount">-30%</div>
            </li>
            <li class="product-item"><span class="price">100 kr</span></li>
          </ol></body></html>"#;
        let parsed = parse_category_page(html, &base());

        assert!(!parsed.has_next);
        assert_eq!(parsed.listings.len(), 1);
        assert_eq!(parsed.listings[0].description.as_deref(), Some("-30%"));
    }

    #[test]
    fn test_listing_filter_uses_words_and_price_bounds() {
        let query = AdapterQuery::new(vec!["hegel h90".into()]).with_param("max_price", "10000");
        let h90 = Listing::new("taktoton", "Hegel H90", "https://a").with_price_amount(Some(9995.0));
        let h900 = Listing::new("taktoton", "Hegel H900", "https://b").with_price_amount(Some(5000.0));
        let pricey = Listing::new("taktoton", "Hegel H90 demo", "https://c").with_price_amount(Some(12000.0));
        let unpriced = Listing::new("taktoton", "Hegel H90", "https://d");

        assert!(listing_matches(&h90, &query));
        assert!(!listing_matches(&h900, &query));
        assert!(!listing_matches(&pricey, &query));
        assert!(listing_matches(&unpriced, &query));
    }

    #[test]
    fn test_page_urls() {
        let adapter = TaktotonAdapter::new("test-agent").unwrap();
        assert_eq!(adapter.page_url(1).unwrap().as_str(), "https://taktoton.com/begagnat");
        assert_eq!(adapter.page_url(3).unwrap().as_str(), "https://taktoton.com/begagnat?p=3");
    }
}
