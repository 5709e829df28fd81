//! Web scraping tools.
//!
//! Stateless helpers that fetch a page and pull links, images, tables,
//! metadata, regex matches or CSS selections out of its HTML. Extraction is
//! synchronous and never fails: bad input yields empty results, and bad
//! patterns or selectors yield an error entry in the result list. Fetch
//! failures are returned as text so the model can read them.
//!
//! [`WebScrapingTools::register_tools`] exposes all of them as agent tools.

use std::collections::BTreeMap;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::base_tool::{parse_args, ToolError};
use crate::agent::Agent;

/// Default page fetch timeout in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Attributes whose value is a whitespace-separated list.
const MULTI_VALUED_ATTRIBUTES: &[&str] = &[
    "class",
    "rel",
    "rev",
    "headers",
    "accesskey",
    "accept-charset",
    "dropzone",
];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

static LINK: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static IMAGE: Lazy<Selector> = Lazy::new(|| selector("img"));
static TABLE: Lazy<Selector> = Lazy::new(|| selector("table"));
static ROW: Lazy<Selector> = Lazy::new(|| selector("tr"));
static CELL: Lazy<Selector> = Lazy::new(|| selector("td, th"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static META: Lazy<Selector> = Lazy::new(|| selector("meta"));
static HEADINGS: Lazy<Vec<(String, Selector)>> = Lazy::new(|| {
    (1..=6)
        .map(|level| {
            let tag = format!("h{}", level);
            let sel = selector(&tag);
            (tag, sel)
        })
        .collect()
});

// ---------------------------------------------------------------------------
// Extracted data
// ---------------------------------------------------------------------------

/// A hyperlink found in a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub text: String,
    pub url: String,
}

/// An image found in a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub alt: String,
    pub src: String,
}

/// Rows of cell texts.
pub type Table = Vec<Vec<String>>;

/// Page title, meta tags and headings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    /// `"h1"`..`"h6"` to heading texts; levels without headings are absent.
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,
}

/// An attribute value; list-valued attributes such as `class` are split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Single(String),
    List(Vec<String>),
}

/// One result of [`select_elements`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectedElement {
    Element {
        tag: String,
        text: String,
        attributes: BTreeMap<String, AttributeValue>,
    },
    Error {
        error: String,
    },
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Concatenate the stripped text nodes under `element`.
fn stripped_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Make `reference` absolute against `base_url`.
///
/// References already starting with `http://` or `https://` and calls
/// without a base are returned unchanged, as are references that cannot be
/// joined.
fn resolve_url(base_url: Option<&str>, reference: &str) -> String {
    let base = match base_url {
        Some(base) if !base.is_empty() => base,
        _ => return reference.to_string(),
    };
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return reference.to_string();
    }

    match Url::parse(base).and_then(|base| base.join(reference)) {
        Ok(joined) => joined.to_string(),
        Err(e) => {
            log::debug!("Could not join '{}' onto '{}': {}", reference, base, e);
            reference.to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Fetch a page and return its body.
///
/// Transport errors, timeouts and non-2xx statuses come back as
/// `"Error fetching {url}: {error}"` instead of failing.
pub async fn fetch_webpage(url: &str, timeout_secs: u64) -> String {
    let fetch = async {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        let response = client.get(url).send().await?.error_for_status()?;
        Ok::<_, reqwest::Error>(response.text().await?)
    };

    match fetch.await {
        Ok(body) => body,
        Err(e) => {
            log::warn!("Fetching {} failed: {}", url, e);
            format!("Error fetching {}: {}", url, e)
        }
    }
}

/// Readable text of a page, without `script` and `style` content.
///
/// Lines are stripped and split on double spaces; the non-empty pieces are
/// joined with single spaces.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut raw = String::new();
    for node in document.tree.root().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map_or(false, |el| matches!(el.name(), "script" | "style"))
        });
        if !hidden {
            raw.push_str(text);
        }
    }

    raw.lines()
        .flat_map(|line| line.trim().split("  "))
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Every `<a href>` in document order.
pub fn find_links(html: &str, base_url: Option<&str>) -> Vec<Link> {
    let document = Html::parse_document(html);
    document
        .select(&LINK)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            Some(Link {
                text: stripped_text(&a),
                url: resolve_url(base_url, href),
            })
        })
        .collect()
}

/// Every `<img>` in document order; missing `src`/`alt` become empty.
pub fn find_images(html: &str, base_url: Option<&str>) -> Vec<Image> {
    let document = Html::parse_document(html);
    document
        .select(&IMAGE)
        .map(|img| {
            let src = img.value().attr("src").unwrap_or_default();
            Image {
                alt: img.value().attr("alt").unwrap_or_default().to_string(),
                src: resolve_url(base_url, src),
            }
        })
        .collect()
}

/// Every `<table>` as rows of stripped `td`/`th` texts.
///
/// Rows and cells are collected from all descendants, so a nested table's
/// rows also appear in its parent.
pub fn extract_tables(html: &str) -> Vec<Table> {
    let document = Html::parse_document(html);
    document
        .select(&TABLE)
        .map(|table| {
            table
                .select(&ROW)
                .map(|row| row.select(&CELL).map(|cell| stripped_text(&cell)).collect())
                .collect()
        })
        .collect()
}

/// Title, meta tags and h1-h6 headings.
///
/// A meta tag is keyed by its `name`, or its `property` when `name` is
/// missing or empty; tags with neither are skipped.
pub fn extract_metadata(html: &str) -> Metadata {
    let document = Html::parse_document(html);
    let mut metadata = Metadata {
        title: document.select(&TITLE).next().map(|t| stripped_text(&t)),
        ..Default::default()
    };

    for meta in document.select(&META) {
        let el = meta.value();
        let key = el
            .attr("name")
            .filter(|v| !v.is_empty())
            .or_else(|| el.attr("property").filter(|v| !v.is_empty()));
        if let Some(key) = key {
            metadata.meta.insert(
                key.to_string(),
                el.attr("content").unwrap_or_default().to_string(),
            );
        }
    }

    for (tag, sel) in HEADINGS.iter() {
        let texts: Vec<String> = document.select(sel).map(|h| stripped_text(&h)).collect();
        if !texts.is_empty() {
            metadata.headers.insert(tag.clone(), texts);
        }
    }

    metadata
}

/// All non-overlapping matches of `pattern` in the raw HTML.
///
/// Without capture groups each entry is the whole match; with one group it
/// is that group; with several it is the groups as a JSON array string.
/// Groups that did not participate are empty strings. An invalid pattern
/// yields a single `"Invalid regex pattern: ..."` entry.
pub fn find_by_pattern(html: &str, pattern: &str) -> Vec<String> {
    let re = match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => return vec![format!("Invalid regex pattern: {}", e)],
    };

    let group_count = re.captures_len() - 1;
    match group_count {
        0 => re.find_iter(html).map(|m| m.as_str().to_string()).collect(),
        1 => re
            .captures_iter(html)
            .map(|caps| caps.get(1).map_or("", |m| m.as_str()).to_string())
            .collect(),
        _ => re
            .captures_iter(html)
            .map(|caps| {
                let groups: Vec<&str> = (1..=group_count)
                    .map(|i| caps.get(i).map_or("", |m| m.as_str()))
                    .collect();
                Value::from(groups).to_string()
            })
            .collect(),
    }
}

/// Elements matching a CSS selector, with stripped text and attributes.
///
/// An invalid selector yields a single error entry.
pub fn select_elements(html: &str, css_selector: &str) -> Vec<SelectedElement> {
    let sel = match Selector::parse(css_selector) {
        Ok(sel) => sel,
        Err(e) => {
            return vec![SelectedElement::Error {
                error: e.to_string(),
            }]
        }
    };

    let document = Html::parse_document(html);
    document
        .select(&sel)
        .map(|element| {
            let attributes = element
                .value()
                .attrs()
                .map(|(name, value)| {
                    let value = if MULTI_VALUED_ATTRIBUTES.contains(&name) {
                        AttributeValue::List(value.split_whitespace().map(str::to_string).collect())
                    } else {
                        AttributeValue::Single(value.to_string())
                    };
                    (name.to_string(), value)
                })
                .collect();

            SelectedElement::Element {
                tag: element.value().name().to_string(),
                text: stripped_text(&element),
                attributes,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tool registration
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct FetchArgs {
    url: String,
    #[serde(default = "default_timeout")]
    timeout: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

#[derive(Deserialize)]
struct HtmlArgs {
    html: String,
}

#[derive(Deserialize)]
struct HtmlWithBaseArgs {
    html: String,
    #[serde(default)]
    base_url: Option<String>,
}

#[derive(Deserialize)]
struct PatternArgs {
    html: String,
    pattern: String,
}

#[derive(Deserialize)]
struct SelectorArgs {
    html: String,
    selector: String,
}

fn to_value<T: Serialize>(data: T) -> Result<Value, ToolError> {
    serde_json::to_value(data).map_err(|e| ToolError::Execution(e.to_string()))
}

fn html_schema(extra: Value, required: &[&str]) -> Value {
    let mut properties = serde_json::json!({
        "html": {"type": "string", "description": "HTML content"}
    });
    if let (Some(props), Value::Object(extra)) = (properties.as_object_mut(), extra) {
        props.extend(extra);
    }
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Registers the scraping helpers on an agent.
pub struct WebScrapingTools;

impl WebScrapingTools {
    /// Names of the tools registered by [`WebScrapingTools::register_tools`].
    pub const TOOL_NAMES: [&'static str; 8] = [
        "fetch_webpage",
        "extract_text",
        "find_links",
        "find_images",
        "extract_tables",
        "extract_metadata",
        "find_by_pattern",
        "select_elements",
    ];

    /// Register all scraping tools on `agent`.
    pub fn register_tools<D: Send + Sync + 'static>(agent: &mut Agent<D>) {
        agent.tool(
            "fetch_webpage",
            "Fetch the HTML content of a webpage",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "The URL to fetch"},
                    "timeout": {
                        "type": "integer",
                        "description": "Request timeout in seconds",
                        "default": DEFAULT_FETCH_TIMEOUT_SECS
                    }
                },
                "required": ["url"]
            }),
            |_ctx, args| async move {
                let args: FetchArgs = parse_args(args)?;
                Ok(Value::String(fetch_webpage(&args.url, args.timeout).await))
            },
        );

        agent.tool(
            "extract_text",
            "Extract readable text from HTML",
            html_schema(serde_json::json!({}), &["html"]),
            |_ctx, args| async move {
                let args: HtmlArgs = parse_args(args)?;
                Ok(Value::String(extract_text(&args.html)))
            },
        );

        let base_url_prop = serde_json::json!({
            "base_url": {"type": "string", "description": "Base URL for relative references"}
        });

        agent.tool(
            "find_links",
            "Extract all links from HTML",
            html_schema(base_url_prop.clone(), &["html"]),
            |_ctx, args| async move {
                let args: HtmlWithBaseArgs = parse_args(args)?;
                to_value(find_links(&args.html, args.base_url.as_deref()))
            },
        );

        agent.tool(
            "find_images",
            "Extract all images from HTML",
            html_schema(base_url_prop, &["html"]),
            |_ctx, args| async move {
                let args: HtmlWithBaseArgs = parse_args(args)?;
                to_value(find_images(&args.html, args.base_url.as_deref()))
            },
        );

        agent.tool(
            "extract_tables",
            "Extract all tables from HTML as rows of cells",
            html_schema(serde_json::json!({}), &["html"]),
            |_ctx, args| async move {
                let args: HtmlArgs = parse_args(args)?;
                to_value(extract_tables(&args.html))
            },
        );

        agent.tool(
            "extract_metadata",
            "Extract metadata from HTML (title, meta tags, headings)",
            html_schema(serde_json::json!({}), &["html"]),
            |_ctx, args| async move {
                let args: HtmlArgs = parse_args(args)?;
                to_value(extract_metadata(&args.html))
            },
        );

        agent.tool(
            "find_by_pattern",
            "Find content using a regex pattern",
            html_schema(
                serde_json::json!({
                    "pattern": {"type": "string", "description": "Regex pattern to search for"}
                }),
                &["html", "pattern"],
            ),
            |_ctx, args| async move {
                let args: PatternArgs = parse_args(args)?;
                to_value(find_by_pattern(&args.html, &args.pattern))
            },
        );

        agent.tool(
            "select_elements",
            "Select elements using a CSS selector",
            html_schema(
                serde_json::json!({
                    "selector": {"type": "string", "description": "CSS selector"}
                }),
                &["html", "selector"],
            ),
            |_ctx, args| async move {
                let args: SelectorArgs = parse_args(args)?;
                to_value(select_elements(&args.html, &args.selector))
            },
        );

        log::debug!("Registered {} web scraping tools", Self::TOOL_NAMES.len());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::llms::base_llm::testing::ScriptedLLM;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_extract_text_drops_scripts() {
        assert_eq!(
            extract_text("<script>x</script><p>Hello  World</p>"),
            "Hello World"
        );
    }

    #[test]
    fn test_extract_text_joins_lines() {
        let html = "<html><head><style>p{}</style><title>T</title></head>\
                    <body><h1> Head </h1>\n<p>line one\n   line two</p></body></html>";
        assert_eq!(extract_text(html), "T Head line one line two");
    }

    #[test]
    fn test_find_links_resolves_relative() {
        let links = find_links("<a href=\"/x\">go</a>", Some("http://example.com"));
        assert_eq!(
            links,
            vec![Link {
                text: "go".to_string(),
                url: "http://example.com/x".to_string()
            }]
        );
    }

    #[test]
    fn test_find_links_without_base_and_absolute() {
        let html = "<a href=\"rel\"> a <b>b</b> </a><a>no href</a><a href=\"https://x.org\">x</a>";
        let links = find_links(html, None);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].text, "ab");
        assert_eq!(links[0].url, "rel");

        let links = find_links(html, Some("http://example.com/dir/page"));
        assert_eq!(links[0].url, "http://example.com/dir/rel");
        assert_eq!(links[1].url, "https://x.org");
    }

    #[test]
    fn test_find_images() {
        let html = "<img src=\"a.png\" alt=\"A\"><img>";
        let images = find_images(html, Some("http://example.com/"));
        assert_eq!(images[0].src, "http://example.com/a.png");
        assert_eq!(images[0].alt, "A");
        assert_eq!(images[1].alt, "");

        let images = find_images(html, None);
        assert_eq!(images[1].src, "");
    }

    #[test]
    fn test_extract_tables() {
        let html = "<table><tr><th> Name </th><th>Age</th></tr>\
                    <tr><td>Ada</td><td>36</td></tr></table><table></table>";
        let tables = extract_tables(html);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0], vec![vec!["Name", "Age"], vec!["Ada", "36"]]);
        assert!(tables[1].is_empty());
    }

    #[test]
    fn test_extract_metadata() {
        let meta = extract_metadata("<title>T</title><meta name=\"desc\" content=\"d\">");
        assert_eq!(meta.title.as_deref(), Some("T"));
        assert_eq!(meta.meta.len(), 1);
        assert_eq!(meta.meta["desc"], "d");
        assert!(meta.headers.is_empty());
    }

    #[test]
    fn test_extract_metadata_property_and_headings() {
        let html = "<meta property=\"og:title\" content=\"OG\">\
                    <meta name=\"\" property=\"og:type\">\
                    <meta charset=\"utf-8\">\
                    <h1>One</h1><h2>Two</h2><h2> Three </h2>";
        let meta = extract_metadata(html);
        assert!(meta.title.is_none());
        assert_eq!(meta.meta["og:title"], "OG");
        assert_eq!(meta.meta["og:type"], "");
        assert_eq!(meta.meta.len(), 2);
        assert_eq!(meta.headers["h2"], vec!["Two", "Three"]);
        assert!(!meta.headers.contains_key("h3"));

        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("title").is_none());
    }

    #[test]
    fn test_find_by_pattern_groups() {
        let html = "id=1; id=22; name=a:b";
        assert_eq!(find_by_pattern(html, r"id=\d+"), vec!["id=1", "id=22"]);
        assert_eq!(find_by_pattern(html, r"id=(\d+)"), vec!["1", "22"]);
        assert_eq!(
            find_by_pattern(html, r"(\w+)=(\w+):(\w+)"),
            vec![r#"["name","a","b"]"#]
        );
        assert!(find_by_pattern(html, "zzz").is_empty());
    }

    #[test]
    fn test_find_by_pattern_invalid() {
        let result = find_by_pattern("<p>", "(unclosed");
        assert_eq!(result.len(), 1);
        assert!(result[0].starts_with("Invalid regex pattern:"));
    }

    #[test]
    fn test_select_elements() {
        let html = "<div id=\"main\" class=\"a  b\"><span rel=\"x\">Hi <i>there</i></span></div>";
        let found = select_elements(html, "div#main");
        assert_eq!(found.len(), 1);
        match &found[0] {
            SelectedElement::Element {
                tag,
                text,
                attributes,
            } => {
                assert_eq!(tag, "div");
                assert_eq!(text, "Hithere");
                assert_eq!(
                    attributes["class"],
                    AttributeValue::List(vec!["a".to_string(), "b".to_string()])
                );
                assert_eq!(attributes["id"], AttributeValue::Single("main".to_string()));
            }
            other => panic!("unexpected {:?}", other),
        }

        let json = serde_json::to_value(&found).unwrap();
        assert_eq!(json[0]["attributes"]["class"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_select_elements_invalid_selector() {
        let found = select_elements("<p>", "p[");
        assert_eq!(found.len(), 1);
        assert!(matches!(found[0], SelectedElement::Error { .. }));
        let json = serde_json::to_value(&found).unwrap();
        assert!(json[0]["error"].is_string());
    }

    #[tokio::test]
    async fn test_fetch_webpage_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>hi</p>"))
            .mount(&server)
            .await;

        let body = fetch_webpage(&format!("{}/page", server.uri()), 5).await;
        assert_eq!(body, "<p>hi</p>");
    }

    #[tokio::test]
    async fn test_fetch_webpage_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/missing", server.uri());
        let body = fetch_webpage(&url, 5).await;
        assert!(body.starts_with(&format!("Error fetching {}:", url)));
        assert!(body.contains("404"));
    }

    #[tokio::test]
    async fn test_fetch_webpage_unreachable() {
        let url = "http://127.0.0.1:1/";
        let body = fetch_webpage(url, 5).await;
        assert!(body.contains(url));
        assert!(body.starts_with("Error fetching"));
    }

    #[tokio::test]
    async fn test_register_tools() {
        let mut agent: Agent<()> = Agent::new(Arc::new(ScriptedLLM::new(vec![])), "scraper");
        WebScrapingTools::register_tools(&mut agent);
        assert_eq!(agent.tool_names(), WebScrapingTools::TOOL_NAMES.to_vec());

        let schemas = agent.tool_schemas();
        assert_eq!(
            schemas[6]["function"]["parameters"]["required"],
            serde_json::json!(["html", "pattern"])
        );

        let links = agent
            .call_tool(
                "find_links",
                (),
                serde_json::json!({
                    "html": "<a href=\"/x\">go</a>",
                    "base_url": "http://example.com"
                }),
            )
            .await
            .unwrap();
        assert_eq!(
            links,
            serde_json::json!([{"text": "go", "url": "http://example.com/x"}])
        );

        let text = agent
            .call_tool("extract_text", (), serde_json::json!({"html": "<p>a</p>"}))
            .await
            .unwrap();
        assert_eq!(text, Value::String("a".to_string()));

        assert!(agent
            .call_tool("extract_text", (), serde_json::json!({}))
            .await
            .is_err());
    }
}
