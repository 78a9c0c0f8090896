//! Result normalization
//!
//! Converts the four provider-specific search payload shapes (general,
//! finance, news, events) into the single `UnifiedSearchResult` schema.
//! Parsing is permissive: a field that is absent or of an unexpected type
//! is treated as "not provided", never as a failure.

use crate::models::{
    ForumAnswer, ForumThread, MarketQuote, OrganicResult, PriceDirection, PriceMovement,
    UnifiedSearchResult,
};
use serde_json::Value;
use std::collections::BTreeMap;

/// Which parser to run, selected by substring match on the tool name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    General,
    Finance,
    News,
    Event,
}

impl SearchKind {
    pub fn from_tool_name(name: &str) -> Self {
        let lowered = name.to_lowercase();
        if lowered.contains("finance") {
            SearchKind::Finance
        } else if lowered.contains("news") {
            SearchKind::News
        } else if lowered.contains("event") {
            SearchKind::Event
        } else {
            SearchKind::General
        }
    }
}

/// Normalize a raw provider payload. Infallible by design: the worst case
/// is a result with every field `None`.
pub fn normalize(kind: SearchKind, raw: &Value) -> UnifiedSearchResult {
    match kind {
        SearchKind::General => parse_general(raw),
        SearchKind::Finance => parse_finance(raw),
        // Event payloads share the news schema.
        SearchKind::News | SearchKind::Event => parse_news(raw),
    }
}

//
// ================= Field helpers =================
//

fn get_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn get_i64(value: &Value, key: &str) -> Option<i64> {
    value.get(key).and_then(Value::as_i64)
}

fn get_f64(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(Value::as_f64)
}

fn get_str_list(value: &Value, key: &str) -> Option<Vec<String>> {
    let items = value.get(key)?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
    )
}

/// Source fields arrive either as a plain string or as `{ "name": ... }`.
fn get_source(value: &Value) -> Option<String> {
    match value.get("source") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(obj)) => obj
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

//
// ================= General search =================
//

fn parse_general(raw: &Value) -> UnifiedSearchResult {
    let organic_results = raw.get("organic_results").and_then(Value::as_array).map(
        |entries| {
            entries
                .iter()
                .filter(|e| e.is_object())
                .map(parse_organic_entry)
                .collect::<Vec<_>>()
        },
    );

    let discussions_and_forums = raw
        .get("discussions_and_forums")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter(|e| e.is_object())
                .map(parse_forum_entry)
                .collect::<Vec<_>>()
        });

    // Only presence is retained; the overview content itself is dropped.
    let ai_overview = if raw.get("ai_overview").map_or(false, Value::is_object) {
        Some(true)
    } else {
        None
    };

    UnifiedSearchResult {
        ai_overview,
        organic_results,
        discussions_and_forums,
        markets: None,
    }
}

fn parse_organic_entry(entry: &Value) -> OrganicResult {
    OrganicResult {
        title: get_str(entry, "title"),
        link: get_str(entry, "link"),
        displayed_link: get_str(entry, "displayed_link"),
        snippet: get_str(entry, "snippet"),
        source: get_source(entry),
        date: get_str(entry, "date"),
        favicon: get_str(entry, "favicon"),
        position: get_i64(entry, "position"),
        redirect_link: get_str(entry, "redirect_link"),
    }
}

fn parse_forum_entry(entry: &Value) -> ForumThread {
    let answers = entry
        .get("answers")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|a| a.is_object())
                .map(|a| ForumAnswer {
                    link: get_str(a, "link"),
                    snippet: get_str(a, "snippet"),
                    extensions: get_str_list(a, "extensions"),
                })
                .collect()
        })
        .unwrap_or_default();

    ForumThread {
        title: get_str(entry, "title"),
        link: get_str(entry, "link"),
        source: get_source(entry),
        date: get_str(entry, "date"),
        extensions: get_str_list(entry, "extensions").unwrap_or_default(),
        answers,
    }
}

//
// ================= Finance search =================
//

/// Recognized market-region keys. Anything else under `markets` is
/// non-market metadata and is ignored.
const MARKET_REGIONS: &[&str] = &["asia", "crypto", "currencies", "europe", "futures", "us"];

/// Synthetic region for the provider's "discover more" section.
const FEATURED_REGION: &str = "featured";

fn parse_finance(raw: &Value) -> UnifiedSearchResult {
    let mut markets: BTreeMap<String, Vec<MarketQuote>> = BTreeMap::new();

    if let Some(regions) = raw.get("markets").and_then(Value::as_object) {
        for region in MARKET_REGIONS {
            if let Some(entries) = regions.get(*region).and_then(Value::as_array) {
                let quotes: Vec<MarketQuote> = entries
                    .iter()
                    .filter(|e| e.is_object())
                    .map(parse_market_entry)
                    .collect();
                if !quotes.is_empty() {
                    markets.insert((*region).to_string(), quotes);
                }
            }
        }
    }

    if let Some(sections) = raw.get("discover_more").and_then(Value::as_array) {
        let mut featured = Vec::new();
        for section in sections {
            if let Some(items) = section.get("items").and_then(Value::as_array) {
                featured.extend(
                    items
                        .iter()
                        .filter(|e| e.is_object())
                        .map(parse_market_entry),
                );
            }
        }
        if !featured.is_empty() {
            markets.insert(FEATURED_REGION.to_string(), featured);
        }
    }

    UnifiedSearchResult {
        ai_overview: None,
        organic_results: None,
        discussions_and_forums: None,
        markets: if markets.is_empty() {
            None
        } else {
            Some(markets)
        },
    }
}

fn parse_market_entry(entry: &Value) -> MarketQuote {
    MarketQuote {
        name: get_str(entry, "name"),
        link: get_str(entry, "link"),
        stock: get_str(entry, "stock"),
        price: parse_price(entry),
        price_movement: parse_price_movement(entry.get("price_movement")),
    }
}

/// Price resolution order: a pre-extracted numeric field wins; otherwise a
/// string price is stripped of thousands separators and currency symbols.
/// Neither yielding a number means the price is simply absent.
fn parse_price(entry: &Value) -> Option<f64> {
    if let Some(price) = get_f64(entry, "extracted_price") {
        return Some(price);
    }
    match entry.get("price") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse().ok()
        }
        _ => None,
    }
}

fn parse_price_movement(raw: Option<&Value>) -> Option<PriceMovement> {
    let raw = raw?;
    if !raw.is_object() {
        return None;
    }

    let movement = match raw.get("movement").and_then(Value::as_str) {
        Some("Up") => Some(PriceDirection::Up),
        Some("Down") => Some(PriceDirection::Down),
        Some("Neutral") => Some(PriceDirection::Neutral),
        _ => None,
    };

    Some(PriceMovement {
        movement,
        percentage: get_f64(raw, "percentage"),
        value: get_f64(raw, "value"),
    })
}

//
// ================= News / event search =================
//

fn parse_news(raw: &Value) -> UnifiedSearchResult {
    // News and event payloads are structurally identical; only the key
    // under which the entries arrive differs.
    let entries = raw
        .get("news_results")
        .or_else(|| raw.get("events_results"))
        .and_then(Value::as_array);

    let organic_results = entries.map(|items| {
        items
            .iter()
            .filter(|e| e.is_object())
            .map(|entry| OrganicResult {
                title: get_str(entry, "title"),
                link: get_str(entry, "link"),
                // Not provided by this source.
                displayed_link: None,
                snippet: get_str(entry, "snippet"),
                source: get_source(entry),
                date: get_str(entry, "date"),
                favicon: get_str(entry, "favicon"),
                position: get_i64(entry, "position"),
                redirect_link: None,
            })
            .collect::<Vec<_>>()
    });

    UnifiedSearchResult {
        ai_overview: None,
        organic_results,
        discussions_and_forums: None,
        markets: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_selection_is_case_insensitive() {
        assert_eq!(
            SearchKind::from_tool_name("COMPOSIO_SEARCH_FINANCE_SEARCH"),
            SearchKind::Finance
        );
        assert_eq!(
            SearchKind::from_tool_name("COMPOSIO_SEARCH_NEWS_SEARCH"),
            SearchKind::News
        );
        assert_eq!(
            SearchKind::from_tool_name("COMPOSIO_SEARCH_EVENT_SEARCH"),
            SearchKind::Event
        );
        assert_eq!(
            SearchKind::from_tool_name("COMPOSIO_SEARCH_SEARCH"),
            SearchKind::General
        );
    }

    #[test]
    fn test_general_preserves_order_and_position() {
        let raw = json!({
            "organic_results": [
                {"title": "First", "link": "https://a", "position": 1,
                 "snippet": "s1", "source": "A", "date": "Jan 1"},
                {"title": "Second", "link": "https://b", "position": 2,
                 "displayed_link": "b.com"}
            ],
            "discussions_and_forums": [
                {"title": "Thread", "link": "https://f", "source": "Reddit",
                 "extensions": ["12 answers"],
                 "answers": [{"link": "https://f/1", "snippet": "answer"}]}
            ],
            "ai_overview": {"text_blocks": []}
        });

        let result = parse_general(&raw);
        assert_eq!(result.ai_overview, Some(true));
        assert!(result.markets.is_none());

        let organic = result.organic_results.unwrap();
        assert_eq!(organic.len(), 2);
        assert_eq!(organic[0].title.as_deref(), Some("First"));
        assert_eq!(organic[0].position, Some(1));
        assert_eq!(organic[1].displayed_link.as_deref(), Some("b.com"));

        let forums = result.discussions_and_forums.unwrap();
        assert_eq!(forums.len(), 1);
        assert_eq!(forums[0].extensions, vec!["12 answers".to_string()]);
        assert_eq!(forums[0].answers.len(), 1);
    }

    #[test]
    fn test_general_without_overview_leaves_flag_unset() {
        let result = parse_general(&json!({"organic_results": []}));
        assert_eq!(result.ai_overview, None);
        assert_eq!(result.organic_results.unwrap().len(), 0);
    }

    #[test]
    fn test_finance_region_whitelist() {
        let raw = json!({
            "markets": {
                "us": [{"name": "Dow Jones", "stock": ".DJI:INDEXDJX", "price": 42000.5}],
                "asia": [{"name": "Nikkei 225", "price": "38,200.11"}],
                "search_metadata": {"id": "abc123"},
                "top_news": {"title": "ignored"}
            }
        });

        let result = parse_finance(&raw);
        let markets = result.markets.unwrap();
        assert!(markets.contains_key("us"));
        assert!(markets.contains_key("asia"));
        assert!(!markets.contains_key("search_metadata"));
        assert!(!markets.contains_key("top_news"));
    }

    #[test]
    fn test_finance_price_idempotence() {
        // A numeric price and its "$"-prefixed, comma-separated string
        // form must normalize identically.
        let numeric = json!({"markets": {"us": [{"name": "S&P 500", "price": 5123.45}]}});
        let formatted = json!({"markets": {"us": [{"name": "S&P 500", "price": "$5,123.45"}]}});

        let a = parse_finance(&numeric);
        let b = parse_finance(&formatted);
        assert_eq!(a, b);
        assert_eq!(a.markets.unwrap()["us"][0].price, Some(5123.45));
    }

    #[test]
    fn test_finance_prefers_extracted_price() {
        let raw = json!({
            "markets": {"crypto": [{"name": "BTC / USD", "extracted_price": 64210.0, "price": "64,210.00"}]}
        });
        let result = parse_finance(&raw);
        assert_eq!(result.markets.unwrap()["crypto"][0].price, Some(64210.0));
    }

    #[test]
    fn test_finance_unparseable_price_is_absent() {
        let raw = json!({"markets": {"us": [{"name": "Broken", "price": "n/a"}]}});
        let result = parse_finance(&raw);
        assert_eq!(result.markets.unwrap()["us"][0].price, None);
    }

    #[test]
    fn test_finance_skips_malformed_entries() {
        let raw = json!({"markets": {"us": [{"name": "Ok"}, "not-a-record", 42]}});
        let result = parse_finance(&raw);
        assert_eq!(result.markets.unwrap()["us"].len(), 1);
    }

    #[test]
    fn test_finance_discover_more_flattens_to_featured() {
        let raw = json!({
            "markets": {"us": [{"name": "Dow", "price": 42000.0}]},
            "discover_more": [
                {"title": "Interested in", "items": [
                    {"name": "Apple Inc", "stock": "AAPL:NASDAQ", "price": "$211.30",
                     "price_movement": {"movement": "Up", "percentage": 1.2, "value": 2.5}}
                ]},
                {"title": "Also", "items": [{"name": "Tesla", "price": 240.1}]}
            ]
        });

        let result = parse_finance(&raw);
        let markets = result.markets.unwrap();
        let featured = &markets["featured"];
        assert_eq!(featured.len(), 2);
        assert_eq!(featured[0].price, Some(211.30));
        let movement = featured[0].price_movement.as_ref().unwrap();
        assert_eq!(movement.movement, Some(PriceDirection::Up));
        assert_eq!(movement.percentage, Some(1.2));
    }

    #[test]
    fn test_finance_never_populates_organic_paths() {
        let raw = json!({"markets": {"us": [{"name": "Dow"}]}});
        let result = parse_finance(&raw);
        assert!(result.organic_results.is_none());
        assert!(result.discussions_and_forums.is_none());
        assert!(result.ai_overview.is_none());
    }

    #[test]
    fn test_news_maps_entries_without_displayed_link() {
        let raw = json!({
            "news_results": [
                {"position": 1, "title": "AI milestone", "link": "https://n",
                 "snippet": "snip", "source": {"name": "Reuters"}, "date": "2 hours ago"}
            ]
        });

        let result = parse_news(&raw);
        let organic = result.organic_results.unwrap();
        assert_eq!(organic[0].title.as_deref(), Some("AI milestone"));
        assert_eq!(organic[0].source.as_deref(), Some("Reuters"));
        assert_eq!(organic[0].displayed_link, None);
        assert!(result.markets.is_none());
        assert!(result.discussions_and_forums.is_none());
    }

    #[test]
    fn test_event_payload_uses_news_mapping() {
        let raw = json!({
            "events_results": [
                {"title": "Jazz festival", "link": "https://e", "date": "Sat, Jun 7"}
            ]
        });
        let result = normalize(SearchKind::Event, &raw);
        let organic = result.organic_results.unwrap();
        assert_eq!(organic[0].title.as_deref(), Some("Jazz festival"));
    }

    #[test]
    fn test_mistyped_fields_become_absent() {
        let raw = json!({
            "news_results": [{"title": 42, "position": "first", "link": null}]
        });
        let result = parse_news(&raw);
        let organic = result.organic_results.unwrap();
        assert_eq!(organic[0].title, None);
        assert_eq!(organic[0].position, None);
        assert_eq!(organic[0].link, None);
    }

    #[test]
    fn test_empty_payload_yields_empty_shape() {
        for kind in [
            SearchKind::General,
            SearchKind::Finance,
            SearchKind::News,
            SearchKind::Event,
        ] {
            let result = normalize(kind, &json!({}));
            assert_eq!(result, UnifiedSearchResult::empty());
        }
    }
}
