//! A small owned element tree on top of `quick_xml`'s namespace-aware reader.
//!
//! Infortisa responses are shallow and mostly optional, so it is simpler to load them into a tree and look fields up
//! by name than to drive the pull parser field by field.
use quick_xml::{
    events::{BytesStart, Event},
    name::ResolveResult,
    NsReader,
};

use crate::InfortisaApiError;

pub const XSI_NIL: &str = "nil";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub namespace: Option<String>,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Parses a complete document and returns its root element.
    pub fn parse(xml: &str) -> Result<XmlElement, InfortisaApiError> {
        let mut reader = NsReader::from_str(xml);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root = None;
        loop {
            let (ns, event) = reader.read_resolved_event()?;
            match event {
                Event::Start(e) => stack.push(element_from(ns, &e)),
                Event::Empty(e) => {
                    let element = element_from(ns, &e);
                    attach(&mut stack, &mut root, element)?;
                },
                Event::Text(t) => {
                    if let Some(current) = stack.last_mut() {
                        let text = t
                            .unescape()
                            .map(|c| c.into_owned())
                            .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                        current.text.push_str(&text);
                    }
                },
                Event::CData(c) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&c));
                    }
                },
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| InfortisaApiError::XmlError("Unexpected closing tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                },
                Event::Eof => break,
                _ => {},
            }
        }
        if !stack.is_empty() {
            return Err(InfortisaApiError::XmlError(format!("{} unclosed element(s) at end of document", stack.len())));
        }
        root.ok_or_else(|| InfortisaApiError::XmlError("Document has no root element".to_string()))
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn in_namespace(&self, namespace: &str) -> bool {
        self.namespace.as_deref() == Some(namespace)
    }

    /// Trimmed text content, or `None` if the element is empty or marked `xsi:nil="true"`.
    pub fn value(&self) -> Option<&str> {
        if self.is_nil() {
            return None;
        }
        let text = self.text.trim();
        (!text.is_empty()).then_some(text)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn is_nil(&self) -> bool {
        self.attribute(XSI_NIL).map(|v| v.trim().eq_ignore_ascii_case("true")).unwrap_or(false)
    }

    /// The first direct child with the given local name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.is_named(name))
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.is_named(name))
    }

    /// Convenience for `child(name).and_then(value)`, returned as an owned string.
    pub fn child_value(&self, name: &str) -> Option<String> {
        self.child(name).and_then(XmlElement::value).map(str::to_string)
    }

    /// Depth-first search through all descendants (not including `self`).
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        self.find_where(&|e| e.is_named(name))
    }

    /// Like [`Self::find`], but the element must also be bound to `namespace`.
    pub fn find_in_namespace(&self, namespace: &str, name: &str) -> Option<&XmlElement> {
        self.find_where(&|e| e.is_named(name) && e.in_namespace(namespace))
    }

    fn find_where(&self, pred: &dyn Fn(&XmlElement) -> bool) -> Option<&XmlElement> {
        for child in &self.children {
            if pred(child) {
                return Some(child);
            }
            if let Some(found) = child.find_where(pred) {
                return Some(found);
            }
        }
        None
    }
}

fn element_from(ns: ResolveResult, start: &BytesStart) -> XmlElement {
    let namespace = match ns {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        _ => None,
    };
    let attributes = start
        .attributes()
        .flatten()
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.local_name().as_ref()).into_owned();
            let value = a
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).into_owned());
            (key, value)
        })
        .collect();
    XmlElement {
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        namespace,
        attributes,
        text: String::new(),
        children: Vec::new(),
    }
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), InfortisaApiError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(InfortisaApiError::XmlError("Document has more than one root element".to_string())),
    }
    Ok(())
}
