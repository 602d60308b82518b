//! In-memory HTML document surface.
//!
//! Containers are addressed by `#id` selectors. They are either declared up
//! front or discovered from a host HTML template, in which case the template
//! is re-serialized on output with attached nodes appended inside their
//! containers.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use foodfacts_shared::{FoodFactsError, Result};

use crate::node::{RenderNode, VOID_ELEMENTS, escape_attr, escape_text_into};
use crate::surface::{ContainerId, RenderSurface};

static ID_SELECTOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#([A-Za-z][A-Za-z0-9_:.\-]*)$").expect("valid regex"));

static WITH_ID: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[id]").expect("valid selector"));

#[derive(Debug, Clone)]
struct Container {
    id: String,
    children: Vec<RenderNode>,
}

/// A render surface that keeps attached nodes in memory and serializes to HTML.
#[derive(Debug, Clone, Default)]
pub struct HtmlDocument {
    containers: Vec<Container>,
    /// Host page source, if the document was created from a template.
    template: Option<String>,
}

impl HtmlDocument {
    /// Create a document with the given container ids (without the `#`).
    pub fn with_containers<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut doc = Self::default();
        for id in ids {
            doc.push_container(id.into());
        }
        doc
    }

    /// Parse a host page; every element carrying an `id` becomes a container.
    pub fn from_template(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        let mut doc = Self {
            containers: Vec::new(),
            template: Some(html.to_string()),
        };

        for el in parsed.select(&WITH_ID) {
            if let Some(id) = el.value().id() {
                doc.push_container(id.to_string());
            }
        }

        debug!(containers = doc.containers.len(), "parsed host template");
        doc
    }

    /// Read and parse a host page from disk.
    pub fn from_template_file(path: &Path) -> Result<Self> {
        let html = std::fs::read_to_string(path).map_err(|e| FoodFactsError::io(path, e))?;
        Ok(Self::from_template(&html))
    }

    /// Container ids in document order.
    pub fn container_ids(&self) -> impl Iterator<Item = &str> {
        self.containers.iter().map(|c| c.id.as_str())
    }

    /// Nodes attached so far to the container `selector` resolves to.
    pub fn container_children(&self, selector: &str) -> Result<&[RenderNode]> {
        let id = self.find_container(selector)?;
        Ok(&self.containers[id.0].children)
    }

    /// Serialize the whole page.
    pub fn to_html(&self, title: &str) -> String {
        match &self.template {
            Some(template) => self.render_template(template),
            None => self.render_standalone(title),
        }
    }

    fn push_container(&mut self, id: String) {
        if !self.containers.iter().any(|c| c.id == id) {
            self.containers.push(Container {
                id,
                children: Vec::new(),
            });
        }
    }

    fn render_standalone(&self, title: &str) -> String {
        let mut out =
            String::from("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>");
        escape_text_into(&mut out, title);
        out.push_str("</title>\n</head>\n<body>\n");

        for container in &self.containers {
            let _ = write!(out, "<div id=\"{}\">", escape_attr(&container.id));
            for node in &container.children {
                node.write_html(&mut out);
            }
            out.push_str("</div>\n");
        }

        out.push_str("</body>\n</html>\n");
        out
    }

    fn render_template(&self, template: &str) -> String {
        let parsed = Html::parse_document(template);
        let appended: HashMap<&str, &[RenderNode]> = self
            .containers
            .iter()
            .map(|c| (c.id.as_str(), c.children.as_slice()))
            .collect();

        let mut out = String::from("<!DOCTYPE html>\n");
        write_element(&mut out, parsed.root_element(), &appended);
        out.push('\n');
        out
    }
}

impl RenderSurface for HtmlDocument {
    fn find_container(&self, selector: &str) -> Result<ContainerId> {
        let id = ID_SELECTOR_RE
            .captures(selector.trim())
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .ok_or_else(|| FoodFactsError::container_not_found(selector))?;

        self.containers
            .iter()
            .position(|c| c.id == id)
            .map(ContainerId)
            .ok_or_else(|| FoodFactsError::container_not_found(selector))
    }

    fn attach(&mut self, container: ContainerId, node: RenderNode) {
        self.containers[container.0].children.push(node);
    }
}

/// Re-serialize a parsed element, appending attached nodes after the
/// container's original children.
fn write_element(out: &mut String, el: ElementRef<'_>, appended: &HashMap<&str, &[RenderNode]>) {
    let value = el.value();
    let name = value.name();

    out.push('<');
    out.push_str(name);
    for (key, val) in value.attrs() {
        let _ = write!(out, " {key}=\"{}\"", escape_attr(val));
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&name) {
        return;
    }

    let raw_text = matches!(name, "script" | "style");
    for child in el.children() {
        match child.value() {
            Node::Text(text) if raw_text => out.push_str(text),
            Node::Text(text) => escape_text_into(out, text),
            Node::Comment(comment) => {
                let _ = write!(out, "<!--{}-->", &**comment);
            }
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    write_element(out, child_el, appended);
                }
            }
            _ => {}
        }
    }

    if let Some(nodes) = value.id().and_then(|id| appended.get(id)) {
        for node in nodes.iter() {
            node.write_html(out);
        }
    }

    let _ = write!(out, "</{name}>");
}
