//! LexML structural parser
//!
//! Converts legal XML in the LexML schema into a stream of
//! [`RegulatoryUnit`]s, one per `Artigo`. Document metadata comes from
//! the `Identificacao[@URN]` attribute
//! (`urn:lex:br:{authority}:{kind}:{date};{number}`); structural
//! ancestors (TÍTULO, CAPÍTULO, SEÇÃO, SUBSEÇÃO) are captured as
//! context labels.
//!
//! LexML instances disagree on namespaces, so all element and attribute
//! matching is on local names only.

use chrono::NaiveDate;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};

use aerolex_common::types::{DocKind, DocumentMeta, RegulatoryUnit};
use aerolex_common::{AerolexError, Result};

use crate::temporal::TemporalExtractor;

/// Structural container elements whose labels become context entries,
/// outermost first.
const GROUPING_ELEMENTS: [&str; 4] = ["Titulo", "Capitulo", "Secao", "Subsecao"];

/// Parser for LexML XML documents.
pub struct LexmlParser {
    temporal: TemporalExtractor,
}

impl LexmlParser {
    pub fn new(temporal: TemporalExtractor) -> Self {
        Self { temporal }
    }

    /// Parse a LexML file from disk.
    pub fn parse_file(&self, path: &std::path::Path) -> Result<Vec<RegulatoryUnit>> {
        let xml = std::fs::read_to_string(path).map_err(|e| AerolexError::SourceIo {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        self.parse_str(&xml, &path.display().to_string())
    }

    /// Parse LexML content. `source` is recorded on every unit.
    pub fn parse_str(&self, xml: &str, source: &str) -> Result<Vec<RegulatoryUnit>> {
        let root = parse_tree(xml)?;
        let mut meta = extract_metadata(&root);
        meta.source = source.to_string();

        let mut units = Vec::new();
        collect_articles(&root, &mut Vec::new(), &mut |article, context| {
            match self.parse_article(article, context, &meta) {
                Some(unit) => units.push(unit),
                None => warn!(source, "Skipping article without usable text"),
            }
        });

        debug!(source, articles = units.len(), "Parsed LexML document");
        Ok(units)
    }

    fn parse_article(
        &self,
        article: &XmlNode,
        context: &[String],
        meta: &DocumentMeta,
    ) -> Option<RegulatoryUnit> {
        let rotulo = article
            .first_child("Rotulo")
            .map(|r| r.itertext())
            .unwrap_or_default();
        let rotulo = rotulo.trim().to_string();

        let title = article
            .first_child("TituloDispositivo")
            .map(|t| t.itertext().trim().to_string())
            .unwrap_or_default();

        // Caput and paragraphs, in document order, each labeled. The
        // rotulo of a part is its label, never repeated inside the body.
        let mut parts: Vec<(String, String)> = Vec::new();
        if let Some(caput) = article.find_first("Caput") {
            let text = caput.itertext_excluding("Rotulo").trim().to_string();
            if !text.is_empty() {
                parts.push(("Caput".to_string(), text));
            }
        }
        for paragrafo in article.find_all("Paragrafo") {
            let label = paragrafo
                .first_child("Rotulo")
                .map(|r| r.itertext().trim().to_string())
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| "Parágrafo".to_string());
            let text = paragrafo.itertext_excluding("Rotulo").trim().to_string();
            if !text.is_empty() {
                parts.push((label, text));
            }
        }

        if rotulo.is_empty() && parts.is_empty() {
            return None;
        }

        let body = parts
            .iter()
            .map(|(label, text)| format!("{label}: {text}"))
            .collect::<Vec<_>>()
            .join("\n\n");
        let text = if body.is_empty() {
            rotulo.clone()
        } else {
            format!("{rotulo}\n\n{body}")
        };

        let article_id = article
            .attr("id")
            .map(str::to_string)
            .unwrap_or_else(|| slugify(&rotulo));

        let temporal = self.temporal.extract(&text, meta.publication_date);

        Some(RegulatoryUnit {
            regulation_id: format!("{}-{}", meta.number, article_id),
            label: rotulo,
            title,
            context: context.to_vec(),
            text,
            temporal,
            document: meta.clone(),
        })
    }
}

/// Walk the tree, maintaining the chain of grouping labels, and invoke
/// `emit` for every `Artigo`.
fn collect_articles<F>(node: &XmlNode, context: &mut Vec<String>, emit: &mut F)
where
    F: FnMut(&XmlNode, &[String]),
{
    for child in node.element_children() {
        if child.name == "Artigo" {
            emit(child, context);
        } else if GROUPING_ELEMENTS.contains(&child.name.as_str()) {
            context.push(grouping_label(child));
            collect_articles(child, context, emit);
            context.pop();
        } else {
            collect_articles(child, context, emit);
        }
    }
}

/// Label of a grouping element: its Rotulo, with the NomeAgrupador
/// appended when present ("TÍTULO I - DISPOSIÇÕES GERAIS").
fn grouping_label(node: &XmlNode) -> String {
    let rotulo = node
        .first_child("Rotulo")
        .map(|r| r.itertext().trim().to_string())
        .unwrap_or_else(|| node.name.to_uppercase());
    match node.first_child("NomeAgrupador") {
        Some(nome) => {
            let nome = nome.itertext().trim().to_string();
            if nome.is_empty() {
                rotulo
            } else {
                format!("{rotulo} - {nome}")
            }
        },
        None => rotulo,
    }
}

/// Extract document metadata from the `Identificacao` URN and the
/// `Data` element.
fn extract_metadata(root: &XmlNode) -> DocumentMeta {
    let mut meta = DocumentMeta {
        number: "unknown".to_string(),
        ..DocumentMeta::default()
    };

    if let Some(ident) = root.find_first("Identificacao") {
        if let Some(urn) = ident.attr("URN") {
            meta.urn = Some(urn.to_string());
            apply_urn(&mut meta, urn);
        }
    }

    if meta.publication_date.is_none() {
        if let Some(data) = root.find_first("Data") {
            let text = data.itertext();
            let text = text.trim();
            match NaiveDate::parse_from_str(text, "%Y-%m-%d") {
                Ok(date) => meta.publication_date = Some(date),
                Err(_) => warn!(literal = text, "Unparseable Data element"),
            }
        }
    }

    if let Some(titulo) = root.find_first("NomePreferido") {
        let text = titulo.itertext().trim().to_string();
        if !text.is_empty() {
            meta.title = Some(text);
        }
    }

    meta
}

/// Fill metadata fields from `urn:lex:br:{authority}:{kind}:{date};{number}`.
fn apply_urn(meta: &mut DocumentMeta, urn: &str) {
    let parts: Vec<&str> = urn.split(':').collect();
    if parts.len() < 6 {
        warn!(urn, "URN has too few segments");
        return;
    }
    meta.authority = Some(parts[3].to_string());
    meta.kind = DocKind::parse(parts[4]);

    let mut date_and_number = parts[5].splitn(2, ';');
    if let Some(date) = date_and_number.next() {
        match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
            Ok(date) => meta.publication_date = Some(date),
            Err(_) => warn!(urn, "URN date segment is not a date"),
        }
    }
    if let Some(number) = date_and_number.next() {
        if !number.is_empty() {
            meta.number = number.to_string();
        }
    }
}

/// "Art. 3º" -> "art-3"
fn slugify(label: &str) -> String {
    let mut out = String::new();
    let mut last_dash = true;
    for ch in label.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    out.trim_end_matches('-').to_string()
}

// ============================================================================
// Minimal namespace-agnostic XML tree
// ============================================================================

/// An element with its attributes and ordered children. Names and
/// attribute keys are local names; prefixes are stripped.
#[derive(Debug, Clone)]
pub(crate) struct XmlNode {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlChild>,
}

#[derive(Debug, Clone)]
pub(crate) enum XmlChild {
    Element(XmlNode),
    Text(String),
}

impl XmlNode {
    fn new(name: String) -> Self {
        Self {
            name,
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn element_children(&self) -> impl Iterator<Item = &XmlNode> {
        self.children.iter().filter_map(|c| match c {
            XmlChild::Element(e) => Some(e),
            XmlChild::Text(_) => None,
        })
    }

    /// First direct child element with the given local name.
    pub fn first_child(&self, name: &str) -> Option<&XmlNode> {
        self.element_children().find(|e| e.name == name)
    }

    /// First descendant (depth-first) with the given local name.
    pub fn find_first(&self, name: &str) -> Option<&XmlNode> {
        for child in self.element_children() {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find_first(name) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants with the given local name, in document order.
    pub fn find_all(&self, name: &str) -> Vec<&XmlNode> {
        let mut out = Vec::new();
        for child in self.element_children() {
            if child.name == name {
                out.push(child);
            }
            out.extend(child.find_all(name));
        }
        out
    }

    /// All text content of the subtree, fragments joined by single
    /// spaces.
    pub fn itertext(&self) -> String {
        self.itertext_excluding("")
    }

    /// Like [`itertext`](Self::itertext) but skipping subtrees named
    /// `skip`.
    pub fn itertext_excluding(&self, skip: &str) -> String {
        let mut fragments = Vec::new();
        self.collect_text(skip, &mut fragments);
        fragments.join(" ")
    }

    fn collect_text(&self, skip: &str, out: &mut Vec<String>) {
        for child in &self.children {
            match child {
                XmlChild::Text(t) => out.push(t.clone()),
                XmlChild::Element(e) => {
                    if !skip.is_empty() && e.name == skip {
                        continue;
                    }
                    e.collect_text(skip, out);
                },
            }
        }
    }
}

fn local_name(raw: &[u8]) -> String {
    let raw = match raw.iter().rposition(|&b| b == b':') {
        Some(pos) => &raw[pos + 1..],
        None => raw,
    };
    String::from_utf8_lossy(raw).into_owned()
}

/// Parse an XML string into a tree rooted at a synthetic document node.
pub(crate) fn parse_tree(xml: &str) -> Result<XmlNode> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<XmlNode> = vec![XmlNode::new(String::new())];

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let mut node = XmlNode::new(local_name(start.name().as_ref()));
                for attr in start.attributes().flatten() {
                    let key = local_name(attr.key.as_ref());
                    let value = attr
                        .unescape_value()
                        .map_err(|e| AerolexError::Parse(format!("bad attribute value: {e}")))?
                        .into_owned();
                    node.attrs.push((key, value));
                }
                stack.push(node);
            },
            Ok(Event::Empty(start)) => {
                let mut node = XmlNode::new(local_name(start.name().as_ref()));
                for attr in start.attributes().flatten() {
                    let key = local_name(attr.key.as_ref());
                    let value = attr
                        .unescape_value()
                        .map_err(|e| AerolexError::Parse(format!("bad attribute value: {e}")))?
                        .into_owned();
                    node.attrs.push((key, value));
                }
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlChild::Element(node));
                }
            },
            Ok(Event::Text(text)) => {
                let text = text
                    .unescape()
                    .map_err(|e| AerolexError::Parse(format!("bad text content: {e}")))?;
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlChild::Text(trimmed.to_string()));
                    }
                }
            },
            Ok(Event::CData(data)) => {
                let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlChild::Text(trimmed.to_string()));
                    }
                }
            },
            Ok(Event::End(_)) => {
                if stack.len() > 1 {
                    // The root sentinel never pops, so both are present.
                    if let Some(node) = stack.pop() {
                        if let Some(parent) = stack.last_mut() {
                            parent.children.push(XmlChild::Element(node));
                        }
                    }
                }
            },
            Ok(Event::Eof) => break,
            Ok(_) => {},
            Err(e) => {
                return Err(AerolexError::Parse(format!(
                    "malformed XML at byte {}: {e}",
                    reader.buffer_position()
                )))
            },
        }
    }

    if stack.len() != 1 {
        return Err(AerolexError::Parse("unclosed XML elements".to_string()));
    }
    // Length was just checked.
    #[allow(clippy::unwrap_used)]
    Ok(stack.pop().unwrap())
}
