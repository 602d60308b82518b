//! Render nodes and the food-item element builders.

use std::fmt::Write as _;

use foodfacts_shared::{ExternalFoodRecord, LocalFoodRecord};

use crate::surface::RenderSurface;

/// Style class carried by every food item container.
pub const FOOD_ITEM_CLASS: &str = "foodItem";

/// Elements that never have a closing tag.
pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// A toolkit-independent presentation node.
///
/// Nodes are built bottom-up and are immutable once built; attaching one to a
/// surface moves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderNode {
    tag: String,
    class: Option<String>,
    text: Option<String>,
    children: Vec<RenderNode>,
}

impl RenderNode {
    /// Build a node. `children` keep their order; empty text renders as nothing.
    pub fn build(
        tag: impl Into<String>,
        class: Option<&str>,
        text: Option<String>,
        children: Vec<RenderNode>,
    ) -> Self {
        let tag = tag.into();
        debug_assert!(!tag.is_empty(), "render node tag must be non-empty");

        Self {
            tag,
            class: class.map(str::to_string),
            text: text.filter(|t| !t.is_empty()),
            children,
        }
    }

    /// Childless node with optional text.
    pub fn leaf(tag: impl Into<String>, text: Option<String>) -> Self {
        Self::build(tag, None, text, Vec::new())
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    /// Text content, or `""` when none was set.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn children(&self) -> &[RenderNode] {
        &self.children
    }

    /// Serialize this node and its subtree as HTML into `out`.
    pub fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        if let Some(class) = &self.class {
            let _ = write!(out, " class=\"{}\"", escape_attr(class));
        }
        out.push('>');

        if VOID_ELEMENTS.contains(&self.tag.as_str()) {
            return;
        }

        if let Some(text) = &self.text {
            escape_text_into(out, text);
        }
        for child in &self.children {
            child.write_html(out);
        }

        let _ = write!(out, "</{}>", self.tag);
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }
}

// ---------------------------------------------------------------------------
// Food item builders
// ---------------------------------------------------------------------------

/// Build a food item: a `section.foodItem` holding the name heading, the type
/// and ethnicity paragraphs, then `extra` in the order given.
///
/// Every node is created through `surface`.
pub fn build_food_item<S>(
    surface: &S,
    local: &LocalFoodRecord,
    extra: Vec<RenderNode>,
) -> RenderNode
where
    S: RenderSurface + ?Sized,
{
    let mut children = Vec::with_capacity(3 + extra.len());
    children.push(leaf(surface, "h1", Some(local.name.clone())));
    children.push(leaf(surface, "p", Some(local.food_type.clone())));
    children.push(leaf(surface, "p", Some(local.ethnicity.clone())));
    children.extend(extra);

    surface.create_node("section", Some(FOOD_ITEM_CLASS), None, children)
}

/// The five enrichment paragraphs: ingredients, countries, energy, fat, sugars.
///
/// Absent values render blank, and so do nutriments equal to zero.
pub fn enrichment_nodes<S>(surface: &S, external: &ExternalFoodRecord) -> Vec<RenderNode>
where
    S: RenderSurface + ?Sized,
{
    vec![
        leaf(surface, "p", external.ingredients_text().map(str::to_string)),
        leaf(surface, "p", external.countries().map(str::to_string)),
        leaf(surface, "p", number_text(external.energy())),
        leaf(surface, "p", number_text(external.fat())),
        leaf(surface, "p", number_text(external.sugars())),
    ]
}

fn leaf<S>(surface: &S, tag: &str, text: Option<String>) -> RenderNode
where
    S: RenderSurface + ?Sized,
{
    surface.create_node(tag, None, text, Vec::new())
}

/// Shortest round-trip form (`200.0` prints as `200`, `10.5` as `10.5`).
/// Zero and NaN count as no value.
fn number_text(n: Option<f64>) -> Option<String> {
    n.filter(|v| *v != 0.0 && !v.is_nan()).map(|v| v.to_string())
}

// ---------------------------------------------------------------------------
// Escaping
// ---------------------------------------------------------------------------

pub(crate) fn escape_text_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

pub(crate) fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HtmlDocument;
    use foodfacts_shared::{Nutriments, Product};

    fn taco() -> LocalFoodRecord {
        LocalFoodRecord {
            name: "Taco".into(),
            food_type: "Main".into(),
            ethnicity: "Mexican".into(),
            barcode: "111".into(),
        }
    }

    fn texts(node: &RenderNode) -> Vec<&str> {
        node.children().iter().map(RenderNode::text).collect()
    }

    #[test]
    fn build_keeps_child_order_and_class() {
        let node = RenderNode::build(
            "div",
            Some("box"),
            Some("hi".into()),
            vec![
                RenderNode::leaf("p", Some("a".into())),
                RenderNode::leaf("p", Some("b".into())),
            ],
        );
        assert_eq!(node.tag(), "div");
        assert_eq!(node.class(), Some("box"));
        assert_eq!(node.text(), "hi");
        assert_eq!(texts(&node), vec!["a", "b"]);
    }

    #[test]
    fn absent_or_empty_text_renders_empty() {
        assert_eq!(RenderNode::leaf("p", None).text(), "");
        assert_eq!(RenderNode::leaf("p", Some(String::new())).to_html(), "<p></p>");
    }

    #[test]
    fn baseline_food_item_has_header_only() {
        let node = build_food_item(&HtmlDocument::default(), &taco(), Vec::new());
        assert_eq!(node.tag(), "section");
        assert_eq!(node.class(), Some(FOOD_ITEM_CLASS));
        assert_eq!(node.children()[0].tag(), "h1");
        assert_eq!(texts(&node), vec!["Taco", "Main", "Mexican"]);
    }

    #[test]
    fn enriched_food_item_appends_five_fields_in_order() {
        let external = ExternalFoodRecord {
            product: Some(Product {
                ingredients_text: Some("corn, beef".into()),
                countries: Some("Mexico".into()),
                nutriments: Some(Nutriments {
                    energy: Some(200.0),
                    fat: Some(10.0),
                    sugars: Some(1.0),
                }),
            }),
            ..Default::default()
        };

        let doc = HtmlDocument::default();
        let node = build_food_item(&doc, &taco(), enrichment_nodes(&doc, &external));
        assert_eq!(
            texts(&node),
            vec!["Taco", "Main", "Mexican", "corn, beef", "Mexico", "200", "10", "1"]
        );
    }

    #[test]
    fn missing_external_fields_render_blank() {
        let doc = HtmlDocument::default();
        let extra = enrichment_nodes(&doc, &ExternalFoodRecord::default());
        let node = build_food_item(&doc, &taco(), extra);
        assert_eq!(node.children().len(), 8);
        assert!(node.children()[3..].iter().all(|c| c.text().is_empty()));
    }

    #[test]
    fn html_is_escaped() {
        let node = RenderNode::build(
            "p",
            Some("a\"b"),
            Some("<b>fish & chips</b>".into()),
            Vec::new(),
        );
        assert_eq!(
            node.to_html(),
            "<p class=\"a&quot;b\">&lt;b&gt;fish &amp; chips&lt;/b&gt;</p>"
        );
    }

    #[test]
    fn fractional_numbers_keep_precision() {
        assert_eq!(number_text(Some(10.5)).as_deref(), Some("10.5"));
        assert_eq!(number_text(Some(2255.0)).as_deref(), Some("2255"));
        assert_eq!(number_text(None), None);
    }

    #[test]
    fn zero_nutriments_render_blank() {
        let external = ExternalFoodRecord {
            product: Some(Product {
                ingredients_text: Some("water".into()),
                countries: Some("France".into()),
                nutriments: Some(Nutriments {
                    energy: Some(0.0),
                    fat: Some(0.0),
                    sugars: Some(f64::NAN),
                }),
            }),
            ..Default::default()
        };

        let doc = HtmlDocument::default();
        let node = build_food_item(&doc, &taco(), enrichment_nodes(&doc, &external));
        assert_eq!(texts(&node)[3..], ["water", "France", "", "", ""]);
    }
}
