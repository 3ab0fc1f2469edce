// Minimal owned XML tree
// Used for XML-RPC envelopes and for the XML documents agents return inside strings

use nimbus_core::port::RpcError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;

/// One element with its attributes, direct text and child elements
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

fn codec_error(msg: impl std::fmt::Display) -> RpcError {
    RpcError::Codec(msg.to_string())
}

impl XmlNode {
    /// Parse a complete document and return its root element
    pub fn parse(input: &str) -> Result<XmlNode, RpcError> {
        let mut reader = Reader::from_str(input);
        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => stack.push(Self::open(&start)?),
                Ok(Event::Empty(start)) => {
                    let node = Self::open(&start)?;
                    Self::attach(&mut stack, &mut root, node)?;
                }
                Ok(Event::End(_)) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| codec_error("closing tag without opening tag"))?;
                    Self::attach(&mut stack, &mut root, node)?;
                }
                Ok(Event::Text(text)) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&text.unescape().map_err(codec_error)?);
                    }
                }
                Ok(Event::CData(data)) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Ok(Event::Eof) => break,
                // declarations, comments, processing instructions, doctype
                Ok(_) => {}
                Err(e) => {
                    return Err(codec_error(format!(
                        "invalid XML at byte {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
            }
        }

        if let Some(open) = stack.last() {
            return Err(codec_error(format!("unclosed element <{}>", open.name)));
        }
        root.ok_or_else(|| codec_error("document has no root element"))
    }

    fn open(start: &BytesStart<'_>) -> Result<XmlNode, RpcError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = BTreeMap::new();
        for attr in start.attributes() {
            let attr = attr.map_err(codec_error)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(codec_error)?.into_owned();
            attributes.insert(key, value);
        }
        Ok(XmlNode {
            name,
            attributes,
            ..Default::default()
        })
    }

    fn attach(
        stack: &mut [XmlNode],
        root: &mut Option<XmlNode>,
        node: XmlNode,
    ) -> Result<(), RpcError> {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None if root.is_some() => return Err(codec_error("multiple root elements")),
            None => *root = Some(node),
        }
        Ok(())
    }

    /// Element name without a namespace prefix (`ex:nil` -> `nil`)
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    fn is_named(&self, name: &str) -> bool {
        self.name == name || self.local_name() == name
    }

    /// Trimmed direct text
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn elements(&self) -> &[XmlNode] {
        &self.children
    }

    /// First child element called `name`
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.is_named(name))
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |c| c.is_named(name))
    }

    fn segments<'p>(&self, path: &'p str) -> Vec<&'p str> {
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() > 1 && self.is_named(segments[0]) {
            segments.remove(0);
        }
        segments
    }

    /// Follow a `/`-separated path of element names, taking the first
    /// match at every level
    pub fn find(&self, path: &str) -> Option<&XmlNode> {
        self.segments(path)
            .into_iter()
            .try_fold(self, |node, segment| node.child(segment))
    }

    /// Every element reachable through `path`
    pub fn find_all(&self, path: &str) -> Vec<&XmlNode> {
        self.segments(path)
            .into_iter()
            .fold(vec![self], |nodes, segment| {
                nodes
                    .into_iter()
                    .flat_map(|node| node.children.iter().filter(|c| c.is_named(segment)))
                    .collect()
            })
    }

    /// Trimmed text of the element at `path`, if present and non-empty
    pub fn text_at(&self, path: &str) -> Option<&str> {
        self.find(path).map(XmlNode::text).filter(|t| !t.is_empty())
    }

    /// Child elements without children of their own, name -> text
    pub fn leaf_map(&self) -> BTreeMap<String, String> {
        self.children
            .iter()
            .filter(|c| c.children.is_empty())
            .map(|c| (c.name.clone(), c.text().to_string()))
            .collect()
    }
}
