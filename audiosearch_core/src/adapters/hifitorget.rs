//! HifiTorget.se classifieds.
//!
//! The site has moved its search endpoint more than once, so the adapter asks
//! `/sok` first and falls back to `/annonser`. Card markup is not stable
//! either; cards are located by trying selector strategies in order.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::parse::parse_off_thread;
use super::{fetch_html, http_client, AdapterQuery, ListingSink};
use crate::error::AdapterError;
use crate::listing::Listing;
use crate::utils::{
    collapse_whitespace, extract_price, extract_tagged_price, normalize_url, truncate_chars,
};
use crate::Adapter;

pub const BASE_URL: &str = "https://www.hifitorget.se";

/// Cards beyond this are mostly sidebar and "similar ads" noise.
const MAX_CARDS: usize = 50;
const MAX_DESCRIPTION_CHARS: usize = 500;

const SWEDISH_CITIES: &[&str] = &[
    "Stockholm",
    "Göteborg",
    "Malmö",
    "Uppsala",
    "Västerås",
    "Örebro",
    "Linköping",
    "Helsingborg",
    "Jönköping",
    "Norrköping",
    "Lund",
    "Umeå",
    "Gävle",
    "Borås",
    "Eskilstuna",
    "Södertälje",
    "Karlstad",
    "Växjö",
    "Halmstad",
    "Sundsvall",
    "Luleå",
    "Trollhättan",
    "Östersund",
];

fn sel(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

/// Card selectors, tried in order; the first that matches anything wins.
static CARD_STRATEGIES: Lazy<Vec<Selector>> = Lazy::new(|| {
    vec![
        sel(r#"article[class*="listing"], article[class*="item"], article[class*="annons"], article[class~="ad"]"#),
        sel(r#"div[class*="listing"], div[class*="annons"], div[class*="product"], div[class*="item"], div[class~="ad"]"#),
        sel(r#"div[data-testid*="listing"], div[data-testid*="item"], div[data-testid*="annons"]"#),
        sel(r#"li[class*="listing"], li[class*="item"], li[class*="annons"]"#),
        sel(r#"a[href*="/annons"], a[href*="/produkt"], a[href*="/listing"]"#),
    ]
});

static AD_LINK: Lazy<Selector> = Lazy::new(|| {
    sel(r#"a[href*="/annons"], a[href*="/produkt"], a[href*="/item"], a[href*="/listing"]"#)
});
static ANY_LINK: Lazy<Selector> = Lazy::new(|| sel("a[href]"));
static HEADING: Lazy<Selector> = Lazy::new(|| sel("h1, h2, h3, h4"));
static TITLE_CLASS: Lazy<Selector> =
    Lazy::new(|| sel(r#"[class*="title"], [class*="heading"], [class*="name"]"#));
static PRICE_CLASS: Lazy<Selector> =
    Lazy::new(|| sel(r#"[class*="price"], [class*="pris"], [class*="cost"]"#));
static DESCRIPTION_CLASS: Lazy<Selector> = Lazy::new(|| {
    sel(r#"[class*="description"], [class*="text"], [class*="beskrivning"], [class*="excerpt"]"#)
});
static DATE_CLASS: Lazy<Selector> = Lazy::new(|| {
    sel(r#"[class*="date"], [class*="datum"], [class*="time"], [class*="posted"], time"#)
});
static IMAGE: Lazy<Selector> = Lazy::new(|| sel("img"));

static KR_AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\d+[\s.,]*\d*\s*kr").unwrap());
static LONG_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{3,}").unwrap());
static DATE_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}|\d{1,2}[/-]\d{1,2}[/-]\d{2,4}|\d+\s+\w+\s+\d{4}").unwrap()
});
static LOCATION_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i:plats|stad|location|från)[: \t]+(\p{Lu}\p{Ll}+(?:[ \t]+\p{Lu}\p{Ll}+)*)")
        .unwrap()
});
static CITY_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    SWEDISH_CITIES
        .iter()
        .map(|city| {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(city));
            (*city, Regex::new(&pattern).unwrap())
        })
        .collect()
});

pub struct HifiTorgetAdapter {
    client: reqwest::Client,
    base: Url,
}

impl HifiTorgetAdapter {
    pub fn new(user_agent: &str) -> Result<Self, AdapterError> {
        Self::with_base_url(user_agent, BASE_URL)
    }

    /// Point the adapter at another host, e.g. a local fixture server.
    pub fn with_base_url(user_agent: &str, base_url: &str) -> Result<Self, AdapterError> {
        let base = Url::parse(base_url)
            .map_err(|e| AdapterError::Other(format!("invalid base url {}: {}", base_url, e)))?;
        Ok(Self {
            client: http_client(user_agent)?,
            base,
        })
    }

    fn search_url(&self, path: &str, query: &AdapterQuery) -> Result<Url, AdapterError> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| AdapterError::Other(format!("bad search path {}: {}", path, e)))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", &query.text());
            if let Some(min) = query.min_price() {
                pairs.append_pair("min_pris", &(min as i64).to_string());
            }
            if let Some(max) = query.max_price() {
                pairs.append_pair("max_pris", &(max as i64).to_string());
            }
        }
        Ok(url)
    }

    async fn fetch_results_page(&self, query: &AdapterQuery) -> Result<String, AdapterError> {
        let primary = self.search_url("/sok", query)?;
        match fetch_html(&self.client, primary.as_str()).await {
            Ok(body) if !body.trim().is_empty() => return Ok(body),
            Err(AdapterError::Blocked) => return Err(AdapterError::Blocked),
            Ok(_) => {
                debug!(target: "audiosearch.adapter.hifitorget", url = %primary, "empty page, trying /annonser");
            }
            Err(err) => {
                debug!(target: "audiosearch.adapter.hifitorget", url = %primary, error = %err, "search endpoint failed, trying /annonser");
            }
        }
        let fallback = self.search_url("/annonser", query)?;
        fetch_html(&self.client, fallback.as_str()).await
    }
}

#[async_trait]
impl Adapter for HifiTorgetAdapter {
    fn id(&self) -> &'static str {
        "hifitorget"
    }

    fn display_name(&self) -> &'static str {
        "HifiTorget"
    }

    fn description(&self) -> &'static str {
        "Swedish hifi classifieds (hifitorget.se)"
    }

    async fn search(&self, query: &AdapterQuery, sink: &mut ListingSink) -> Result<(), AdapterError> {
        let html = self.fetch_results_page(query).await?;
        let base = self.base.clone();
        let now = Utc::now();
        let listings =
            parse_off_thread(self.id(), html, move |html| parse_search_page(html, &base, now))
                .await?;

        let found = listings.len();
        for listing in listings {
            if query.price_in_bounds(listing.price_amount()) {
                sink.push(listing);
            }
        }
        debug!(
            target: "audiosearch.adapter.hifitorget",
            found,
            kept = sink.len(),
            "parsed search page"
        );
        Ok(())
    }
}

/// Parse a HifiTorget search page into listings, in page order.
///
/// Cards without a recognisable title are skipped.
pub fn parse_search_page(html: &str, base: &Url, now: DateTime<Utc>) -> Vec<Listing> {
    let document = Html::parse_document(html);
    find_cards(&document)
        .into_iter()
        .filter_map(|card| parse_card(card, base, now))
        .collect()
}

fn find_cards(document: &Html) -> Vec<ElementRef<'_>> {
    let mut cards: Vec<ElementRef<'_>> = CARD_STRATEGIES
        .iter()
        .map(|selector| document.select(selector).collect::<Vec<_>>())
        .find(|found| !found.is_empty())
        .unwrap_or_default();

    if cards.is_empty() {
        // Nearest block around each ad link.
        let mut seen = HashSet::new();
        for link in document.select(&AD_LINK) {
            if let Some(parent) = enclosing(link, &["article", "div", "li"]) {
                if seen.insert(parent.id()) {
                    cards.push(parent);
                }
            }
        }
    }

    if cards.is_empty() {
        // Last resort: whatever block holds a "... kr" text.
        let mut seen = HashSet::new();
        for node in document.root_element().descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            if !KR_AMOUNT.is_match(text) {
                continue;
            }
            let parent = node
                .ancestors()
                .filter_map(ElementRef::wrap)
                .find(|el| matches!(el.value().name(), "article" | "div" | "li" | "a"));
            if let Some(parent) = parent {
                if seen.insert(parent.id()) {
                    cards.push(parent);
                }
            }
        }
    }

    cards.truncate(MAX_CARDS);
    cards
}

fn enclosing<'a>(el: ElementRef<'a>, tags: &[&str]) -> Option<ElementRef<'a>> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|parent| tags.contains(&parent.value().name()))
}

fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

fn first_link(card: ElementRef<'_>) -> Option<ElementRef<'_>> {
    if card.value().name() == "a" && card.value().attr("href").is_some() {
        return Some(card);
    }
    card.select(&ANY_LINK).next()
}

fn parse_card(card: ElementRef<'_>, base: &Url, now: DateTime<Utc>) -> Option<Listing> {
    let (title, url) = card_title_and_url(card, base);
    let title = title.filter(|t| !t.is_empty())?;
    let url = url.unwrap_or_else(|| base.to_string());

    let mut listing = Listing::new("hifitorget", title.clone(), url).with_price_amount(card_price(card));

    if let Some(image) = card_image(card) {
        listing = listing.with_image_url(normalize_url(base, &image));
    }
    if let Some(description) = card_description(card, &title) {
        listing = listing.with_description(description);
    }
    if let Some(posted) = card_date_text(card) {
        listing = listing.with_posted_text(posted, now);
    }
    if let Some(location) = card_location(card) {
        listing = listing.with_location(location);
    }
    Some(listing)
}

fn card_title_and_url(card: ElementRef<'_>, base: &Url) -> (Option<String>, Option<String>) {
    let href_of = |link: ElementRef<'_>| link.value().attr("href").map(|h| normalize_url(base, h));

    if let Some(link) = first_link(card) {
        let title = element_text(link);
        if !title.is_empty() {
            return (Some(title), href_of(link));
        }
    }

    if let Some(heading) = card.select(&HEADING).next() {
        let title = element_text(heading);
        if !title.is_empty() {
            let link = heading.select(&ANY_LINK).next().or_else(|| first_link(card));
            return (Some(title), link.and_then(href_of));
        }
    }

    let title = card.select(&TITLE_CLASS).next().map(element_text);
    (title, first_link(card).and_then(href_of))
}

fn card_price(card: ElementRef<'_>) -> Option<f64> {
    if let Some(price) = card.text().find_map(extract_tagged_price) {
        return Some(price);
    }

    if let Some(price) = card
        .select(&PRICE_CLASS)
        .next()
        .and_then(|el| extract_price(&element_text(el)))
    {
        return Some(price);
    }

    // A long number is only a price when its surroundings say so.
    for node in card.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        if !LONG_NUMBER.is_match(text) {
            continue;
        }
        let context = node
            .parent()
            .and_then(ElementRef::wrap)
            .map(element_text)
            .unwrap_or_else(|| text.to_string())
            .to_lowercase();
        if context.contains("kr") || context.contains("pris") {
            if let Some(price) = extract_price(text) {
                return Some(price);
            }
        }
    }
    None
}

fn card_image(card: ElementRef<'_>) -> Option<String> {
    let img = card.select(&IMAGE).next()?;
    ["src", "data-src", "data-lazy-src", "data-original"]
        .iter()
        .filter_map(|attr| img.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

fn card_description(card: ElementRef<'_>, title: &str) -> Option<String> {
    let text = match card.select(&DESCRIPTION_CLASS).next() {
        Some(el) => element_text(el),
        None => {
            let all = element_text(card);
            let rest = all.replacen(title, "", 1);
            truncate_chars(rest.trim(), MAX_DESCRIPTION_CHARS)
        }
    };
    (!text.is_empty()).then_some(text)
}

fn card_date_text(card: ElementRef<'_>) -> Option<String> {
    if let Some(m) = card.text().find_map(|t| DATE_TEXT.find(t)) {
        return Some(m.as_str().trim().to_string());
    }
    card.select(&DATE_CLASS)
        .map(element_text)
        .find(|t| !t.is_empty())
}

fn card_location(card: ElementRef<'_>) -> Option<String> {
    let text = card
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if let Some((city, _)) = CITY_PATTERNS.iter().find(|(_, re)| re.is_match(&text)) {
        return Some((*city).to_string());
    }
    LOCATION_LABEL
        .captures(&text)
        .map(|caps| caps[1].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    fn base() -> Url {
        Url::parse(BASE_URL).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 17, 15, 30, 0).unwrap()
    }

    const ARTICLE_PAGE: &str = r#"
        <html><body>
          <header class="site-header"><a href="/">HifiTorget</a></header>
          <article class="listing-card">
            <a href="/annons/12345-yamaha-rx-v685"><h3>Yamaha RX-V685 receiver</h3></a>
            <img data-src="/media/12345.jpg">
            <span class="listing-price">3 500 kr</span>
            <p class="listing-description">Fint skick, fjärrkontroll medföljer.</p>
            <span class="listing-date">2025-10-12</span>
            <span>Göteborg</span>
          </article>
          <article class="listing-card">
            <a href="https://www.hifitorget.se/annons/777"><h3>Yamaha NS-1000M</h3></a>
            <span class="listing-price">Pris: 12.500:-</span>
            <span class="meta">Plats: Karlskrona</span>
          </article>
          <article class="listing-card">
            <span class="listing-price">900 kr</span>
          </article>
        </body></html>
    "#;

    #[test]
    fn test_parse_article_cards() {
        let listings = parse_search_page(ARTICLE_PAGE, &base(), now());
        assert_eq!(listings.len(), 2);

        let first = &listings[0];
        assert_eq!(first.source, "hifitorget");
        assert_eq!(first.title, "Yamaha RX-V685 receiver");
        assert_eq!(first.url, "https://www.hifitorget.se/annons/12345-yamaha-rx-v685");
        assert_eq!(first.price_amount(), Some(3500.0));
        assert_eq!(
            first.image_url.as_deref(),
            Some("https://www.hifitorget.se/media/12345.jpg")
        );
        assert_eq!(
            first.description.as_deref(),
            Some("Fint skick, fjärrkontroll medföljer.")
        );
        assert_eq!(first.location.as_deref(), Some("Göteborg"));
        let posted = first.posted_at.unwrap();
        assert_eq!((posted.year(), posted.month(), posted.day()), (2025, 10, 12));
        assert_eq!(first.posted_raw.as_deref(), Some("2025-10-12"));

        let second = &listings[1];
        assert_eq!(second.price_amount(), Some(12500.0));
        assert_eq!(second.location.as_deref(), Some("Karlskrona"));
        assert!(second.posted_at.is_none());
    }

    #[test]
    fn test_falls_back_to_blocks_around_ad_links() {
        let html = r#"
            <html><body>
              <section>
                <div><a href="/item/55">Rega Planar 3</a><span>2 000 kr</span></div>
                <div><a href="/item/56">Pro-Ject Debut</a></div>
              </section>
            </body></html>
        "#;
        let listings = parse_search_page(html, &base(), now());
        let titles: Vec<_> = listings.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["Rega Planar 3", "Pro-Ject Debut"]);
        assert_eq!(listings[0].price_amount(), Some(2000.0));
        assert_eq!(listings[1].price_amount(), None);
    }

    #[test]
    fn test_long_number_needs_price_context() {
        let html = r#"
            <html><body>
              <li class="item-row">
                <h2>Hegel H190</h2>
                <p class="spec">Modell 2019</p>
              </li>
            </body></html>
        "#;
        let listings = parse_search_page(html, &base(), now());
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].title, "Hegel H190");
        assert_eq!(listings[0].url, BASE_URL.to_string() + "/");
        assert_eq!(listings[0].price_amount(), None);
    }

    #[test]
    fn test_card_limit() {
        let cards: String = (0..80)
            .map(|i| format!(r#"<article class="listing"><a href="/annons/{i}">Ad {i}</a></article>"#))
            .collect();
        let html = format!("<html><body>{}</body></html>", cards);
        let listings = parse_search_page(&html, &base(), now());
        assert_eq!(listings.len(), MAX_CARDS);
        assert_eq!(listings[49].title, "Ad 49");
    }

    #[test]
    fn test_empty_page_has_no_listings() {
        let listings = parse_search_page("<html><body><p>Inga annonser</p></body></html>", &base(), now());
        assert!(listings.is_empty());
    }

    #[test]
    fn test_search_url_carries_price_bounds() {
        let adapter = HifiTorgetAdapter::new("test-agent").unwrap();
        let query = AdapterQuery::new(vec!["yamaha".into(), "receiver".into()])
            .with_param("min_price", "1000")
            .with_param("max_price", "4999.9");
        let url = adapter.search_url("/sok", &query).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.hifitorget.se/sok?q=yamaha+receiver&min_pris=1000&max_pris=4999"
        );
    }
}
