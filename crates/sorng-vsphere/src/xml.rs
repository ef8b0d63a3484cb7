//! Namespace-agnostic XML tree for vim25 responses.
//!
//! vCenter is not consistent about namespace prefixes (`soapenv:`, `soap:`,
//! none at all), so every lookup here compares local names only.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{VsphereError, VsphereResult};

/// Owned element node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    /// Qualified tag as written (`soapenv:Body`)
    pub name: String,
    /// Qualified attribute names with unescaped values
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// Strip a `prefix:` from a qualified name.
pub fn local_name(qualified: &str) -> &str {
    qualified.rsplit(':').next().unwrap_or(qualified)
}

impl XmlElement {
    /// Parse a document and return its root element.
    pub fn parse(xml: &str) -> VsphereResult<XmlElement> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => stack.push(start_element(e)?),
                Ok(Event::Empty(ref e)) => {
                    let el = start_element(e)?;
                    attach(&mut stack, &mut root, el)?;
                }
                Ok(Event::End(_)) => {
                    let el = stack
                        .pop()
                        .ok_or_else(|| VsphereError::malformed("unbalanced end tag"))?;
                    attach(&mut stack, &mut root, el)?;
                }
                Ok(Event::Text(ref t)) => {
                    let text = t
                        .unescape()
                        .map_err(|e| VsphereError::malformed(format!("bad text: {e}")))?;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::Text(text.into_owned()));
                    }
                }
                Ok(Event::CData(c)) => {
                    let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::Text(text));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(VsphereError::malformed(format!(
                        "XML error at position {}: {e}",
                        reader.buffer_position()
                    )))
                }
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(VsphereError::malformed("unexpected end of document"));
        }
        root.ok_or_else(|| VsphereError::malformed("document has no root element"))
    }

    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// Attribute value by local name (`type` matches `xsi:type`).
    ///
    /// An unprefixed attribute wins over a prefixed one with the same local
    /// name. Namespace declarations (`xmlns:*`) are never returned.
    pub fn attr(&self, name: &str) -> Option<&str> {
        let mut candidates = self.attributes.iter().filter(|(k, _)| !k.starts_with("xmlns"));
        candidates
            .clone()
            .find(|(k, _)| k == name)
            .or_else(|| candidates.find(|(k, _)| local_name(k) == name))
            .map(|(_, v)| v.as_str())
    }

    /// `xsi:type` with any prefix removed (`vim25:VirtualDisk` → `VirtualDisk`).
    pub fn xsi_type(&self) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == "xsi:type" || (k.ends_with(":type") && !k.starts_with("xmlns")))
            .map(|(_, v)| local_name(v))
    }

    /// Direct element children.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// Direct element children with the given local name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |e| e.local_name() == name)
    }

    /// Every descendant (not `self`) whose local name is `name`, depth first.
    pub fn elements_by_local_name(&self, name: &str) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        collect_named(self, name, &mut out);
        out
    }

    /// First descendant named `name` at most `max_depth` levels below `self`.
    ///
    /// Depth 1 means direct children only.
    pub fn first_child_by_local_name(&self, name: &str, max_depth: usize) -> Option<&XmlElement> {
        if max_depth == 0 {
            return None;
        }
        for child in self.elements() {
            if child.local_name() == name {
                return Some(child);
            }
            if let Some(found) = child.first_child_by_local_name(name, max_depth - 1) {
                return Some(found);
            }
        }
        None
    }

    /// Concatenated text of all descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        push_text(self, &mut out);
        out
    }

    /// Trimmed text of the first direct child named `name`, if non-empty.
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.first_child_by_local_name(name, 1)
            .map(|e| e.text().trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

fn start_element(e: &BytesStart<'_>) -> VsphereResult<XmlElement> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| VsphereError::malformed(format!("bad attribute: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let val = attr
            .unescape_value()
            .map_err(|e| VsphereError::malformed(format!("bad attribute value: {e}")))?;
        attributes.push((key, val.into_owned()));
    }
    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    el: XmlElement,
) -> VsphereResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(el));
        Ok(())
    } else if root.is_none() {
        *root = Some(el);
        Ok(())
    } else {
        Err(VsphereError::malformed("multiple root elements"))
    }
}

fn collect_named<'a>(el: &'a XmlElement, name: &str, out: &mut Vec<&'a XmlElement>) {
    for child in el.elements() {
        if child.local_name() == name {
            out.push(child);
        }
        collect_named(child, name, out);
    }
}

fn push_text(el: &XmlElement, out: &mut String) {
    for child in &el.children {
        match child {
            XmlNode::Text(t) => out.push_str(t),
            XmlNode::Element(e) => push_text(e, out),
        }
    }
}
