//! Rule-driven lookups over page markup, shared by both strategies.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::error::ExtractionError;
use super::models::{ExtractionRules, Observation};
use super::normalize::normalize_price;

/// What the rules found in a document, before normalisation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSnapshot {
    pub price_text: Option<String>,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub unavailable: bool,
}

/// Applies the ruleset's selectors to an HTML document
pub fn inspect_html(html: &str, rules: &ExtractionRules) -> Result<PageSnapshot, ExtractionError> {
    let price_selector = parse_selector(rules.price_selector())?;
    let name_selector = parse_selector(rules.name_selector())?;
    let image_selector = parse_selector(rules.image_selector())?;
    let unavailable_selector = parse_selector(rules.availability_selector())?;

    let document = Html::parse_document(html);

    let price_text = document.select(&price_selector).next().and_then(price_text);

    let name = document
        .select(&name_selector)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty());

    let image_url = document.select(&image_selector).next().and_then(|img| {
        img.value()
            .attr("src")
            .or_else(|| img.value().attr("data-src"))
            .map(str::to_string)
    });

    let unavailable = document.select(&unavailable_selector).next().is_some();

    Ok(PageSnapshot {
        price_text,
        name,
        image_url,
        unavailable,
    })
}

/// Inspects the document and normalises the findings into an observation
pub fn observe_html(html: &str, rules: &ExtractionRules) -> Observation {
    match inspect_html(html, rules) {
        Ok(snapshot) => snapshot.into_observation(rules),
        Err(e) => Observation::failed(&e),
    }
}

impl PageSnapshot {
    /// `success` is set only when a positive price was found
    pub fn into_observation(self, rules: &ExtractionRules) -> Observation {
        let is_available = Some(!self.unavailable);

        let Some(text) = self.price_text else {
            let error = ExtractionError::PriceNotFound(rules.price_selector().to_string());
            return Observation {
                name: self.name,
                image_url: self.image_url,
                is_available,
                ..Observation::failed(&error)
            };
        };

        let price = normalize_price(&text);
        debug!("Normalised price text '{}' to {}", text, price);

        if price <= 0.0 {
            let error = ExtractionError::UnparseablePrice(text);
            return Observation {
                price: Some(0.0),
                name: self.name,
                image_url: self.image_url,
                is_available,
                ..Observation::failed(&error)
            };
        }

        Observation {
            success: true,
            price: Some(price),
            name: self.name,
            image_url: self.image_url,
            is_available,
            ..Default::default()
        }
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(selector).map_err(|e| ExtractionError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

// Price nodes are sometimes empty tags carrying the value in an attribute
fn price_text(element: ElementRef<'_>) -> Option<String> {
    let text = element_text(element);
    if !text.is_empty() {
        return Some(text);
    }
    element
        .value()
        .attr("data-price")
        .or_else(|| element.value().attr("content"))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
