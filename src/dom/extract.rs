use crate::errors::{BrowserError, Result};
use crate::types::{ExtractedElement, PageSummary};
use scraper::{Html, Selector};

/// Text, inner markup and attributes of every element matching `selector`.
pub fn extract_matching(html: &str, selector: &str) -> Result<Vec<ExtractedElement>> {
    let selector = Selector::parse(selector)
        .map_err(|e| BrowserError::InvalidAction(format!("Invalid selector '{}': {}", selector, e)))?;
    let document = Html::parse_document(html);

    Ok(document
        .select(&selector)
        .map(|el| ExtractedElement {
            text: el.text().collect::<String>().trim().to_string(),
            html: el.inner_html(),
            attributes: el
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
        .collect())
}

/// Title, URL and the first `limit` characters of the body text.
pub fn page_summary(html: &str, url: &str, title: &str, limit: usize) -> PageSummary {
    let document = Html::parse_document(html);
    let text = Selector::parse("body")
        .ok()
        .and_then(|body| document.select(&body).next())
        .map(|body| {
            body.text()
                .flat_map(str::split_whitespace)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    PageSummary {
        title: title.to_string(),
        url: url.to_string(),
        text: text.chars().take(limit).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head><title>Shop</title></head><body>
          <h1>Catalogue</h1>
          <ul>
            <li class="item" data-sku="A1"><b>Kettle</b> 20 EUR</li>
            <li class="item" data-sku="B2"> Toaster </li>
          </ul>
        </body></html>
    "#;

    #[test]
    fn extracts_every_match_with_attributes() {
        let items = extract_matching(PAGE, "li.item").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "Kettle 20 EUR");
        assert_eq!(items[0].html, "<b>Kettle</b> 20 EUR");
        assert_eq!(items[0].attributes.get("data-sku").map(String::as_str), Some("A1"));
        assert_eq!(items[0].attributes.get("class").map(String::as_str), Some("item"));
        assert_eq!(items[1].text, "Toaster");
    }

    #[test]
    fn no_matches_is_empty_not_error() {
        assert!(extract_matching(PAGE, "table tr").unwrap().is_empty());
    }

    #[test]
    fn bad_selector_is_a_validation_error() {
        let err = extract_matching(PAGE, "li[[").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn summary_truncates_body_text() {
        let summary = page_summary(PAGE, "https://shop.test/", "Shop", 9);
        assert_eq!(summary.title, "Shop");
        assert_eq!(summary.url, "https://shop.test/");
        assert_eq!(summary.text, "Catalogue");
    }
}
