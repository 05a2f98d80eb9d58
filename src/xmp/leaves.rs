// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright © 2021 Adrian <adrian.eddy at gmail>

//! Flattens an XMP document into `(name, value)` pairs.
//!
//! Elements contribute their attributes, and an element whose only child is text
//! contributes `(element name, text)` without being descended into. Everything else
//! is walked in document order.

use std::io::*;
use quick_xml::events::{ Event, BytesStart };
use quick_xml::escape::unescape;
use quick_xml::Reader;

use super::Attributes;
use crate::util::invalid_data;

pub const MAX_DEPTH: usize = 256;
pub const MAX_NODES: usize = 500_000;

#[derive(Debug)]
enum Kind {
    Document,
    Element { name: String, attributes: Vec<(String, String)> },
    Text(String),
    Other, // comment, processing instruction, doctype
}

#[derive(Debug)]
struct Node {
    kind: Kind,
    children: Vec<usize>,
}

impl Node {
    fn name(&self) -> &str {
        match &self.kind {
            Kind::Document => "#document",
            Kind::Element { name, .. } => name,
            Kind::Text(_) => "#text",
            Kind::Other => "#other",
        }
    }
}

struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn add(&mut self, parent: usize, kind: Kind) -> Result<usize> {
        if self.nodes.len() >= MAX_NODES {
            return Err(invalid_data(format!("XML has more than {MAX_NODES} nodes")));
        }
        let id = self.nodes.len();
        self.nodes.push(Node { kind, children: Vec::new() });
        self.nodes[parent].children.push(id);
        Ok(id)
    }

    // Text, entity references and CDATA next to each other form one text node
    fn add_text(&mut self, parent: usize, text: &str) -> Result<()> {
        if parent == 0 {
            return Ok(()); // Outside of the root element
        }
        if let Some(&last) = self.nodes[parent].children.last() {
            if let Kind::Text(ref mut t) = self.nodes[last].kind {
                t.push_str(text);
                return Ok(());
            }
        }
        self.add(parent, Kind::Text(text.to_owned()))?;
        Ok(())
    }

    fn element(e: &BytesStart) -> Result<Kind> {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(invalid_data)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = String::from_utf8_lossy(&attr.value);
            attributes.push((key, unescape(&value).map_err(invalid_data)?.into_owned()));
        }
        Ok(Kind::Element { name, attributes })
    }

    fn parse(xml: &str) -> Result<Self> {
        let mut tree = Tree { nodes: vec![Node { kind: Kind::Document, children: Vec::new() }] };
        let mut reader = Reader::from_reader(xml.as_bytes());
        let mut buf = Vec::new();
        let mut stack = vec![0usize];

        loop {
            let parent = stack.last().copied().unwrap_or_default();
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    if stack.len() > MAX_DEPTH {
                        return Err(invalid_data(format!("XML is nested deeper than {MAX_DEPTH} levels")));
                    }
                    let id = tree.add(parent, Self::element(e)?)?;
                    stack.push(id);
                },
                Ok(Event::Empty(ref e)) => {
                    tree.add(parent, Self::element(e)?)?;
                },
                Ok(Event::End(_)) => {
                    if stack.len() < 2 {
                        return Err(invalid_data("Unexpected closing tag"));
                    }
                    stack.pop();
                },
                Ok(Event::Text(ref t)) => {
                    let raw = String::from_utf8_lossy(t);
                    tree.add_text(parent, &unescape(&raw).map_err(invalid_data)?)?;
                },
                Ok(Event::GeneralRef(ref r)) => {
                    let raw = format!("&{};", String::from_utf8_lossy(r));
                    tree.add_text(parent, &unescape(&raw).map_err(invalid_data)?)?;
                },
                Ok(Event::CData(ref t)) => {
                    tree.add_text(parent, &String::from_utf8_lossy(t))?;
                },
                Ok(Event::Comment(_)) | Ok(Event::PI(_)) | Ok(Event::DocType(_)) => {
                    if parent != 0 {
                        tree.add(parent, Kind::Other)?;
                    }
                },
                Ok(Event::Decl(_)) => { },
                Ok(Event::Eof) => break,
                Err(e) => return Err(invalid_data(format!("Error at position {}: {:?}", reader.buffer_position(), e))),
            }
            buf.clear();
        }
        if stack.len() != 1 {
            return Err(Error::new(ErrorKind::UnexpectedEof, "Unclosed XML element"));
        }
        if tree.nodes[0].children.is_empty() {
            return Err(Error::new(ErrorKind::UnexpectedEof, "XML has no root element"));
        }
        Ok(tree)
    }

    fn leaves(&self) -> Attributes {
        let mut list = Vec::new();
        let mut stack = vec![0usize];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if let Kind::Element { attributes, .. } = &node.kind {
                list.extend(attributes.iter().cloned());
            }
            if let [only] = node.children.as_slice() {
                if let Kind::Text(text) = &self.nodes[*only].kind {
                    list.push((node.name().to_owned(), text.clone()));
                    continue;
                }
            }
            stack.extend(node.children.iter().rev());
        }
        Attributes(list)
    }
}

pub fn leaves(xml: &str) -> Result<Attributes> {
    Ok(Tree::parse(xml)?.leaves())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(list: &Attributes) -> Vec<(&str, &str)> {
        list.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
    }

    #[test]
    fn attributes_and_text_leaves() {
        let xml = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/">
  <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
    <rdf:Description rdf:about="" xmlns:GPano="http://ns.google.com/photos/1.0/panorama/" GPano:FullPanoWidthPixels="4000">
      <GPano:PoseHeadingDegrees>12.5</GPano:PoseHeadingDegrees>
      <GPano:ProjectionType>equirectangular</GPano:ProjectionType>
    </rdf:Description>
  </rdf:RDF>
</x:xmpmeta>"#;
        let list = leaves(xml).unwrap();
        assert_eq!(pairs(&list), vec![
            ("xmlns:x", "adobe:ns:meta/"),
            ("xmlns:rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
            ("rdf:about", ""),
            ("xmlns:GPano", "http://ns.google.com/photos/1.0/panorama/"),
            ("GPano:FullPanoWidthPixels", "4000"),
            ("GPano:PoseHeadingDegrees", "12.5"),
            ("GPano:ProjectionType", "equirectangular"),
        ]);
    }

    #[test]
    fn element_with_attributes_and_text_emits_both() {
        let list = leaves(r#"<a><b id="1">text</b><c>x</c></a>"#).unwrap();
        assert_eq!(pairs(&list), vec![("id", "1"), ("b", "text"), ("c", "x")]);
    }

    #[test]
    fn single_text_child_is_not_descended() {
        // `a` has exactly one text child, so it collapses even though it's the root
        let list = leaves("<a>  </a>").unwrap();
        assert_eq!(pairs(&list), vec![("a", "  ")]);
    }

    #[test]
    fn mixed_content_recurses() {
        let list = leaves("<a>pre<b>in</b>post</a>").unwrap();
        assert_eq!(pairs(&list), vec![("b", "in")]);
    }

    #[test]
    fn entities_and_cdata_merge_into_one_text_node() {
        let list = leaves(r#"<a t="&lt;&amp;&gt;">x &amp; y<![CDATA[ <z> ]]></a>"#).unwrap();
        assert_eq!(pairs(&list), vec![("t", "<&>"), ("a", "x & y <z> ")]);
    }

    #[test]
    fn duplicates_are_kept_in_order() {
        let list = leaves("<a><k>1</k><k>2</k></a>").unwrap();
        assert_eq!(pairs(&list), vec![("k", "1"), ("k", "2")]);
        assert_eq!(list.get("k"), Some("1"));
    }

    #[test]
    fn comment_is_a_separate_child() {
        let list = leaves("<a><!-- c -->text</a>").unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn malformed_xml_fails() {
        assert!(leaves("<a><b></a>").is_err());
        assert!(leaves("<a><b>").is_err());
        assert!(leaves("").is_err());
        assert!(leaves(r#"<a x="1" x="2"/>"#).is_err());
    }

    #[test]
    fn depth_is_bounded() {
        let depth = MAX_DEPTH + 10;
        let xml = format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth));
        assert!(leaves(&xml).is_err());

        let depth = 100;
        let xml = format!("{}v{}", "<a>".repeat(depth), "</a>".repeat(depth));
        assert_eq!(pairs(&leaves(&xml).unwrap()), vec![("a", "v")]);
    }

    #[test]
    fn node_count_is_bounded() {
        let xml = format!("<a>{}</a>", "<b/>".repeat(MAX_NODES));
        assert!(leaves(&xml).is_err());
    }
}
