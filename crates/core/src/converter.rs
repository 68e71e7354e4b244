//! Builder markup converter.
//!
//! Rewrites arbitrary template HTML into markup the page-builder widget can
//! edit: every editable element is tagged with a `builder-element` attribute,
//! body content is wrapped in a single `PageElement` container, and image
//! sources are rebased onto the template file route.
//!
//! Conversion is idempotent. Elements that already carry a builder attribute
//! are never re-tagged, an existing `PageElement` suppresses wrapping, and
//! image sources already under the file route are left alone.

use std::sync::LazyLock;

use html5ever::{LocalName, Namespace, QualName};
use kuchikiki::traits::*;
use kuchikiki::{Attribute, ElementData, ExpandedName, NodeDataRef, NodeRef};
use regex::Regex;

use crate::error::CoreError;
use crate::template::FILE_ROUTE_PREFIX;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Attribute read by the page builder to identify editable regions.
pub const BUILDER_ATTR: &str = "builder-element";

/// Class added to `<body>`.
pub const LAYOUT_CLASS: &str = "builderjs-layout";

/// Class added to headings and paragraphs.
pub const CONTENT_CLASS: &str = "builder-content";

/// Inline style of the generated page container.
pub const PAGE_STYLE: &str = "padding: 20px;";

/// Stand-in for the template id when converting markup that has no row yet.
pub const TEMPLATE_ID_PLACEHOLDER: &str = "__TEMPLATE_ID__";

/// Maximum accepted template size for [`validate_template`] (1 MiB).
pub const MAX_TEMPLATE_BYTES: usize = 1024 * 1024;

/// Leaf `<div>`s with shorter normalized text than this become text elements.
const TEXT_DIV_MAX_CHARS: usize = 200;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Inline declarations removed from every `style` attribute.
static STYLE_DENYLIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:min-)?height\s*:\s*100vh\s*(?:!\s*important)?\s*$").expect("valid regex")
});

// ---------------------------------------------------------------------------
// Element types
// ---------------------------------------------------------------------------

/// Element kinds understood by the page builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderElement {
    Page,
    Text,
    Block,
    Link,
    Image,
    List,
    Button,
}

impl BuilderElement {
    /// Attribute value written for this kind. Images use an explicit empty
    /// value so the builder treats them as inline media.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Page => "PageElement",
            Self::Text => "TextElement",
            Self::Block => "BlockElement",
            Self::Link => "LinkElement",
            Self::Image => "",
            Self::List => "ListElement",
            Self::Button => "ButtonElement",
        }
    }

    /// Static tag mapping. `input` only maps for `type="button"` and
    /// `type="submit"`.
    pub fn for_tag(tag: &str, input_type: Option<&str>) -> Option<Self> {
        match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "p" | "span" | "li" => Some(Self::Text),
            "div" | "section" | "article" | "header" | "footer" | "main" | "aside" | "nav" => {
                Some(Self::Block)
            }
            "a" => Some(Self::Link),
            "img" => Some(Self::Image),
            "ul" | "ol" => Some(Self::List),
            "button" => Some(Self::Button),
            "input" => match input_type.map(str::to_ascii_lowercase).as_deref() {
                Some("button") | Some("submit") => Some(Self::Button),
                _ => None,
            },
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Convert template HTML to builder markup.
///
/// `template_id` and `entry_dir` drive image rebasing: a relative
/// `assets/a.png` in template `42` whose entry file lives in `sub/` becomes
/// `/api/template/42/sub/assets/a.png`. Without an id the
/// [`TEMPLATE_ID_PLACEHOLDER`] is used instead.
pub fn convert_html(
    html: &str,
    template_id: Option<DbId>,
    entry_dir: &str,
) -> Result<String, CoreError> {
    let document = kuchikiki::parse_html().one(html);
    let elements: Vec<NodeDataRef<ElementData>> = document.descendants().elements().collect();

    mark_body(&elements);
    strip_denylisted_styles(&elements);
    mark_content_elements(&elements);
    ensure_page_element(&document, &elements);
    apply_element_types(&elements);
    apply_link_buttons(&elements);
    rewrite_images(&elements, template_id, entry_dir);

    let mut out = Vec::with_capacity(html.len() + html.len() / 4);
    document.serialize(&mut out)?;
    String::from_utf8(out).map_err(|e| CoreError::Internal(format!("Non UTF-8 output: {e}")))
}

/// Collect every applicable problem with a template document.
pub fn validate_template(html: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if html.trim().is_empty() || html.contains('\0') {
        errors.push("Invalid HTML detected".to_string());
    }
    if html.len() > MAX_TEMPLATE_BYTES {
        errors.push("Template is too large (max 1MB)".to_string());
    }

    errors
}

// ---------------------------------------------------------------------------
// Passes
// ---------------------------------------------------------------------------

fn mark_body(elements: &[NodeDataRef<ElementData>]) {
    if let Some(body) = elements.iter().find(|el| tag(el) == "body") {
        add_class(body, LAYOUT_CLASS);
    }
}

fn strip_denylisted_styles(elements: &[NodeDataRef<ElementData>]) {
    for el in elements {
        let mut attrs = el.attributes.borrow_mut();
        let Some(style) = attrs.get("style") else {
            continue;
        };

        let kept: Vec<&str> = style
            .split(';')
            .filter(|decl| !STYLE_DENYLIST_RE.is_match(decl))
            .collect();
        if kept.len() == style.split(';').count() {
            continue;
        }

        let rewritten = kept.join(";").trim().to_string();
        if rewritten.trim_matches(|c: char| c == ';' || c.is_whitespace()).is_empty() {
            attrs.remove("style");
        } else {
            attrs.insert("style", rewritten);
        }
    }
}

fn mark_content_elements(elements: &[NodeDataRef<ElementData>]) {
    for el in elements {
        if matches!(tag(el), "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6") {
            add_class(el, CONTENT_CLASS);
        }
    }
}

/// Move the element children of `<body>` into a new page container unless a
/// page container already exists anywhere in the document.
fn ensure_page_element(document: &NodeRef, elements: &[NodeDataRef<ElementData>]) {
    let page_exists = elements
        .iter()
        .any(|el| builder_attr(el).as_deref() == Some(BuilderElement::Page.as_str()));
    if page_exists {
        return;
    }
    let Ok(body) = document.select_first("body") else {
        return;
    };

    let page = NodeRef::new_element(
        QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from("div")),
        [
            plain_attr(BUILDER_ATTR, BuilderElement::Page.as_str()),
            plain_attr("style", PAGE_STYLE),
        ],
    );

    let children: Vec<NodeRef> = body
        .as_node()
        .children()
        .filter(|child| child.as_element().is_some())
        .collect();
    for child in children {
        child.detach();
        page.append(child);
    }
    body.as_node().append(page);
}

fn apply_element_types(elements: &[NodeDataRef<ElementData>]) {
    for el in elements {
        if el.attributes.borrow().contains(BUILDER_ATTR) {
            continue;
        }
        let kind = if tag(el) == "div" && is_leaf_text_div(el) {
            Some(BuilderElement::Text)
        } else {
            let input_type = el.attributes.borrow().get("type").map(str::to_string);
            BuilderElement::for_tag(tag(el), input_type.as_deref())
        };
        if let Some(kind) = kind {
            set_builder_attr(el, kind);
        }
    }
}

/// Anchors styled as buttons are buttons for the builder, whatever they were
/// tagged as before.
fn apply_link_buttons(elements: &[NodeDataRef<ElementData>]) {
    for el in elements.iter().filter(|el| tag(el) == "a") {
        let is_button = el
            .attributes
            .borrow()
            .get("class")
            .is_some_and(|class| class.contains("btn") || class.contains("button"));
        if is_button {
            set_builder_attr(el, BuilderElement::Button);
        }
    }
}

fn rewrite_images(elements: &[NodeDataRef<ElementData>], template_id: Option<DbId>, entry_dir: &str) {
    for el in elements.iter().filter(|el| tag(el) == "img") {
        set_builder_attr(el, BuilderElement::Image);

        let mut attrs = el.attributes.borrow_mut();
        if !attrs.contains("alt") {
            attrs.insert("alt", String::new());
        }
        let rebased = attrs
            .get("src")
            .and_then(|src| rebase_asset_path(src, template_id, entry_dir));
        if let Some(src) = rebased {
            attrs.insert("src", src);
        }
    }
}

// ---------------------------------------------------------------------------
// Asset paths
// ---------------------------------------------------------------------------

/// Rebase a template-relative asset reference onto the file route.
///
/// Returns `None` when the reference must be left untouched: external URLs
/// (`http://`, `https://`, protocol-relative), inline `data:` URIs, empty
/// values, and references already under the file route. A leading `/` is
/// taken as relative to the extraction root rather than the entry directory.
/// `..` segments never climb above the extraction root.
pub fn rebase_asset_path(src: &str, template_id: Option<DbId>, entry_dir: &str) -> Option<String> {
    let trimmed = src.trim();
    let lower = trimmed.to_ascii_lowercase();
    if trimmed.is_empty()
        || lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("//")
        || lower.starts_with("data:")
        || trimmed.starts_with(&format!("{FILE_ROUTE_PREFIX}/"))
    {
        return None;
    }

    let (path, suffix) = match trimmed.find(['?', '#']) {
        Some(i) => trimmed.split_at(i),
        None => (trimmed, ""),
    };
    let path = path.replace('\\', "/");

    let mut segments: Vec<&str> = Vec::new();
    if !path.starts_with('/') {
        segments.extend(entry_dir.split('/').filter(|s| !s.is_empty() && *s != "."));
    }
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let id = template_id.map_or_else(|| TEMPLATE_ID_PLACEHOLDER.to_string(), |id| id.to_string());
    Some(format!("{FILE_ROUTE_PREFIX}/{id}/{}{suffix}", segments.join("/")))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn tag(el: &NodeDataRef<ElementData>) -> &str {
    &el.name.local
}

fn builder_attr(el: &NodeDataRef<ElementData>) -> Option<String> {
    el.attributes.borrow().get(BUILDER_ATTR).map(str::to_string)
}

fn set_builder_attr(el: &NodeDataRef<ElementData>, kind: BuilderElement) {
    el.attributes
        .borrow_mut()
        .insert(BUILDER_ATTR, kind.as_str().to_string());
}

fn add_class(el: &NodeDataRef<ElementData>, class: &str) {
    let mut attrs = el.attributes.borrow_mut();
    let current = attrs.get("class").unwrap_or_default();
    if current.split_whitespace().any(|c| c == class) {
        return;
    }
    let updated = format!("{current} {class}").trim().to_string();
    attrs.insert("class", updated);
}

/// A `<div>` without element children whose collapsed text is short.
fn is_leaf_text_div(el: &NodeDataRef<ElementData>) -> bool {
    let node = el.as_node();
    if node.children().any(|child| child.as_element().is_some()) {
        return false;
    }
    let text = node.text_contents();
    let normalized_len = text.split_whitespace().collect::<Vec<_>>().join(" ").chars().count();
    normalized_len > 0 && normalized_len < TEXT_DIV_MAX_CHARS
}

fn plain_attr(name: &str, value: &str) -> (ExpandedName, Attribute) {
    (
        ExpandedName::new(Namespace::from(""), LocalName::from(name)),
        Attribute {
            prefix: None,
            value: value.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(html: &str) -> NodeRef {
        kuchikiki::parse_html().one(html)
    }

    fn attr(doc: &NodeRef, selector: &str, name: &str) -> Option<String> {
        let el = doc.select_first(selector).ok()?;
        let attrs = el.attributes.borrow();
        attrs.get(name).map(str::to_string)
    }

    fn convert(html: &str) -> NodeRef {
        parse(&convert_html(html, Some(42), "").unwrap())
    }

    // -- body and content classes --

    #[test]
    fn body_gets_layout_class_once() {
        let doc = convert(r#"<html><body class="home"><p>Hi</p></body></html>"#);
        assert_eq!(attr(&doc, "body", "class").as_deref(), Some("home builderjs-layout"));
    }

    #[test]
    fn headings_and_paragraphs_get_content_class() {
        let doc = convert("<h2 class=\"title\">T</h2><p>Body</p>");
        assert_eq!(attr(&doc, "h2", "class").as_deref(), Some("title builder-content"));
        assert_eq!(attr(&doc, "p", "class").as_deref(), Some("builder-content"));
    }

    // -- page container --

    #[test]
    fn body_children_are_wrapped_in_page_element() {
        let doc = convert("<body><header>H</header><section><p>x</p></section></body>");
        let page = doc.select_first("body > div[builder-element=PageElement]").unwrap();
        assert_eq!(
            page.attributes.borrow().get("style"),
            Some(PAGE_STYLE)
        );
        let tags: Vec<String> = page
            .as_node()
            .children()
            .elements()
            .map(|el| el.name.local.to_string())
            .collect();
        assert_eq!(tags, vec!["header", "section"]);
    }

    #[test]
    fn existing_page_element_prevents_wrapping() {
        let html = r#"<body><main><div builder-element="PageElement"><p>x</p></div></main><footer>f</footer></body>"#;
        let doc = convert(html);
        assert_eq!(doc.select("[builder-element=PageElement]").unwrap().count(), 1);
        assert!(doc.select_first("body > footer").is_ok());
    }

    // -- element types --

    #[test]
    fn static_mapping_is_applied() {
        let doc = convert(
            r#"<nav><ul><li>One</li></ul></nav><span>s</span><a href="/x">link</a>
               <button>Go</button><input type="submit" value="Send"><input type="text">"#,
        );
        assert_eq!(attr(&doc, "nav", BUILDER_ATTR).as_deref(), Some("BlockElement"));
        assert_eq!(attr(&doc, "ul", BUILDER_ATTR).as_deref(), Some("ListElement"));
        assert_eq!(attr(&doc, "li", BUILDER_ATTR).as_deref(), Some("TextElement"));
        assert_eq!(attr(&doc, "span", BUILDER_ATTR).as_deref(), Some("TextElement"));
        assert_eq!(attr(&doc, "a", BUILDER_ATTR).as_deref(), Some("LinkElement"));
        assert_eq!(attr(&doc, "button", BUILDER_ATTR).as_deref(), Some("ButtonElement"));
        assert_eq!(
            attr(&doc, "input[type=submit]", BUILDER_ATTR).as_deref(),
            Some("ButtonElement")
        );
        assert_eq!(attr(&doc, "input[type=text]", BUILDER_ATTR), None);
    }

    #[test]
    fn existing_builder_attribute_is_kept() {
        let doc = convert(r#"<section builder-element="CustomElement">x</section>"#);
        assert_eq!(attr(&doc, "section", BUILDER_ATTR).as_deref(), Some("CustomElement"));
    }

    #[test]
    fn button_styled_anchor_becomes_button() {
        let doc = convert(
            r##"<a class="btn btn-primary" builder-element="LinkElement" href="#">Buy</a>"##,
        );
        assert_eq!(attr(&doc, "a", BUILDER_ATTR).as_deref(), Some("ButtonElement"));
    }

    #[test]
    fn short_leaf_div_becomes_text() {
        let doc = convert(r#"<div id="short">Hello there</div><div id="wrap"><p>x</p></div>"#);
        assert_eq!(attr(&doc, "#short", BUILDER_ATTR).as_deref(), Some("TextElement"));
        assert_eq!(attr(&doc, "#wrap", BUILDER_ATTR).as_deref(), Some("BlockElement"));
    }

    #[test]
    fn long_leaf_div_stays_block() {
        let long = "word ".repeat(60);
        let doc = convert(&format!(r#"<div id="long">{long}</div><div id="empty"></div>"#));
        assert_eq!(attr(&doc, "#long", BUILDER_ATTR).as_deref(), Some("BlockElement"));
        assert_eq!(attr(&doc, "#empty", BUILDER_ATTR).as_deref(), Some("BlockElement"));
    }

    // -- images --

    #[test]
    fn relative_image_is_rebased_under_entry_dir() {
        let html = convert_html(r#"<img src="assets/a.png">"#, Some(42), "sub").unwrap();
        let doc = parse(&html);
        assert_eq!(
            attr(&doc, "img", "src").as_deref(),
            Some("/api/template/42/sub/assets/a.png")
        );
        assert_eq!(attr(&doc, "img", BUILDER_ATTR).as_deref(), Some(""));
        assert_eq!(attr(&doc, "img", "alt").as_deref(), Some(""));
    }

    #[test]
    fn external_image_is_untouched() {
        let doc = convert(r#"<img src="https://x.com/a.png" alt="logo">"#);
        assert_eq!(attr(&doc, "img", "src").as_deref(), Some("https://x.com/a.png"));
        assert_eq!(attr(&doc, "img", "alt").as_deref(), Some("logo"));
    }

    #[test]
    fn image_marker_is_forced_empty() {
        let doc = convert(r#"<img builder-element="ImageElement" src="//cdn.x/a.png">"#);
        assert_eq!(attr(&doc, "img", BUILDER_ATTR).as_deref(), Some(""));
        assert_eq!(attr(&doc, "img", "src").as_deref(), Some("//cdn.x/a.png"));
    }

    #[test]
    fn unknown_template_uses_placeholder() {
        let html = convert_html(r#"<img src="./a.png">"#, None, "").unwrap();
        assert_eq!(
            attr(&parse(&html), "img", "src").as_deref(),
            Some("/api/template/__TEMPLATE_ID__/a.png")
        );
    }

    #[test]
    fn rebase_resolves_dot_segments_and_keeps_query() {
        assert_eq!(
            rebase_asset_path("../img/a.png?v=2", Some(5), "site/pages").as_deref(),
            Some("/api/template/5/site/img/a.png?v=2")
        );
        assert_eq!(
            rebase_asset_path("../../../../etc/passwd", Some(5), "site").as_deref(),
            Some("/api/template/5/etc/passwd")
        );
        assert_eq!(
            rebase_asset_path("/images/a.png", Some(5), "site").as_deref(),
            Some("/api/template/5/images/a.png")
        );
        assert_eq!(rebase_asset_path("data:image/png;base64,AA", Some(5), ""), None);
        assert_eq!(rebase_asset_path("/api/template/5/a.png", Some(5), ""), None);
    }

    // -- inline styles --

    #[test]
    fn denylisted_style_declarations_are_removed() {
        let doc = convert(
            r#"<section id="a" style="color: red; height: 100vh !important; margin: 0"></section>
               <section id="b" style="min-height:100vh;"></section>
               <section id="c" style="height: 50vh"></section>"#,
        );
        assert_eq!(attr(&doc, "#a", "style").as_deref(), Some("color: red; margin: 0"));
        assert_eq!(attr(&doc, "#b", "style"), None);
        assert_eq!(attr(&doc, "#c", "style").as_deref(), Some("height: 50vh"));
    }

    // -- idempotence --

    #[test]
    fn converting_twice_equals_converting_once() {
        let html = r##"<!DOCTYPE html><html><head><title>t</title></head>
            <body><div class="hero" style="height: 100vh; color: blue">
            <h1>Title</h1><p>Text</p><a class="button" href="#">Go</a>
            <img src="img/hero.jpg"></div><div>Short note</div></body></html>"##;
        let once = convert_html(html, Some(9), "site").unwrap();
        let twice = convert_html(&once, Some(9), "site").unwrap();
        assert_eq!(once, twice);
    }

    // -- validate_template --

    #[test]
    fn validate_accepts_regular_markup() {
        assert!(validate_template("<html><body><p>x</p></body></html>").is_empty());
    }

    #[test]
    fn validate_collects_every_error() {
        assert_eq!(validate_template("  "), vec!["Invalid HTML detected"]);

        let huge = format!("<p>{}</p>\0", "x".repeat(MAX_TEMPLATE_BYTES));
        let errors = validate_template(&huge);
        assert_eq!(errors.len(), 2);
        assert!(errors.contains(&"Template is too large (max 1MB)".to_string()));
    }
}
