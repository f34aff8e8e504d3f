use crate::android::chunk::{
    ChunkHeader, ChunkReader, RES_STRING_POOL_TYPE, RES_XML_CDATA_TYPE, RES_XML_END_ELEMENT_TYPE,
    RES_XML_END_NAMESPACE_TYPE, RES_XML_RESOURCE_MAP_TYPE, RES_XML_START_ELEMENT_TYPE,
    RES_XML_START_NAMESPACE_TYPE, RES_XML_TYPE,
};
use crate::android::dump::is_file_resource;
use crate::android::error::{ResError, ResErrorKind, ResResult};
use crate::android::string_pool::{StringPool, NO_STRING};
use crate::android::table::{EntryValue, ResourceId, ResourceTable};
use crate::android::value::{DecodedValue, ResValue};
use log::warn;
use quick_xml::escape::{minimal_escape, partial_escape};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Serialize;
use std::borrow::Cow;

pub const ANDROID_NAMESPACE_URI: &str = "http://schemas.android.com/apk/res/android";

/// Size of one `ResXMLTree_attribute`.
const ATTRIBUTE_SIZE: usize = 20;

/// One attribute of a start element, with its typed value decoded but not
/// resolved against any table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct XmlAttribute {
    pub namespace: Option<String>,
    pub name: String,
    pub raw_value: Option<String>,
    pub value: DecodedValue,
    /// Attribute resource id, from the document's resource map.
    pub resource_id: Option<ResourceId>,
}

/// A node of a compiled XML document, tagged with its source line.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum XmlNode {
    StartNamespace {
        line: u32,
        prefix: Option<String>,
        uri: String,
    },
    EndNamespace {
        line: u32,
        prefix: Option<String>,
        uri: String,
    },
    StartElement {
        line: u32,
        namespace: Option<String>,
        name: String,
        attributes: Vec<XmlAttribute>,
    },
    EndElement {
        line: u32,
        namespace: Option<String>,
        name: String,
    },
    Text {
        line: u32,
        text: String,
    },
    /// Character data carrying only a typed value.
    CData {
        line: u32,
        value: DecodedValue,
    },
}

impl XmlNode {
    pub fn line(&self) -> u32 {
        match self {
            XmlNode::StartNamespace { line, .. }
            | XmlNode::EndNamespace { line, .. }
            | XmlNode::StartElement { line, .. }
            | XmlNode::EndElement { line, .. }
            | XmlNode::Text { line, .. }
            | XmlNode::CData { line, .. } => *line,
        }
    }
}

/// Forward-only iterator over the nodes of a compiled XML document.
///
/// The string pool and resource map are read up front; nodes are decoded one
/// chunk at a time. Iteration ends after the first error.
pub struct XmlNodes<'a> {
    document: ChunkReader<'a>,
    cursor: ChunkReader<'a>,
    strings: StringPool,
    resource_map: Vec<u32>,
    done: bool,
}

impl<'a> XmlNodes<'a> {
    pub fn new(bytes: &'a [u8]) -> ResResult<Self> {
        let mut reader = ChunkReader::new(bytes);
        let header = reader.read_chunk_header()?;
        if header.chunk_type != RES_XML_TYPE {
            return Err(malformed!(
                header.offset,
                "expected binary XML chunk, found type 0x{:04x}",
                header.chunk_type
            ));
        }
        let document = ChunkReader::new(bytes).window(header.offset, header.end())?;
        let mut cursor = document.window(header.body_start(), header.end())?;

        let mut strings = None;
        let mut resource_map = Vec::new();
        while !cursor.is_empty() {
            let mut peek = cursor;
            let child = peek.read_chunk_header()?;
            match child.chunk_type {
                RES_STRING_POOL_TYPE if strings.is_none() => {
                    strings = Some(StringPool::parse(&document, &child)?);
                }
                RES_XML_RESOURCE_MAP_TYPE => {
                    let mut ids = document.bounded(&child)?;
                    resource_map.clear();
                    while ids.remaining() >= 4 {
                        resource_map.push(ids.read_u32()?);
                    }
                }
                _ => break,
            }
            cursor.seek(child.next_sibling())?;
        }

        let strings = strings.ok_or_else(|| {
            malformed!(header.body_start(), "binary XML has no string pool before its nodes")
        })?;
        Ok(XmlNodes {
            document,
            cursor,
            strings,
            resource_map,
            done: false,
        })
    }

    /// The document's string pool.
    pub fn strings(&self) -> &StringPool {
        &self.strings
    }

    pub fn resource_map(&self) -> &[u32] {
        &self.resource_map
    }

    fn read_node(&self, header: &ChunkHeader) -> ResResult<Option<XmlNode>> {
        let mut fields = self.document.header_fields(header)?;
        let line = fields.read_u32()?;
        let _comment = fields.read_u32()?;
        let mut body = self.document.bounded(header)?;
        let strings = &self.strings;

        let node = match header.chunk_type {
            RES_XML_START_NAMESPACE_TYPE | RES_XML_END_NAMESPACE_TYPE => {
                let prefix = strings.get_optional(body.read_u32()?)?.map(str::to_string);
                let uri = strings.get(body.read_u32()?)?.to_string();
                if header.chunk_type == RES_XML_START_NAMESPACE_TYPE {
                    XmlNode::StartNamespace { line, prefix, uri }
                } else {
                    XmlNode::EndNamespace { line, prefix, uri }
                }
            }
            RES_XML_START_ELEMENT_TYPE => {
                let namespace = strings.get_optional(body.read_u32()?)?.map(str::to_string);
                let name = strings.get(body.read_u32()?)?.to_string();
                let attribute_start = body.read_u16()? as usize;
                let attribute_size = body.read_u16()? as usize;
                let attribute_count = body.read_u16()? as usize;
                if attribute_count > 0 && attribute_size < ATTRIBUTE_SIZE {
                    return Err(malformed!(
                        header.body_start(),
                        "attribute size {} is below {}",
                        attribute_size,
                        ATTRIBUTE_SIZE
                    ));
                }

                let mut attributes = Vec::with_capacity(attribute_count.min(body.remaining() / ATTRIBUTE_SIZE));
                for i in 0..attribute_count {
                    let mut attr = body;
                    let attr_offset = header.body_start() + attribute_start + i * attribute_size;
                    attr.seek(attr_offset)?;
                    let ns_idx = attr.read_u32()?;
                    let name_idx = attr.read_u32()?;
                    let raw_idx = attr.read_u32()?;
                    let cell = attr.position();
                    let value = ResValue::read(&mut attr)?;
                    let lookup = || -> ResResult<XmlAttribute> {
                        Ok(XmlAttribute {
                            namespace: strings.get_optional(ns_idx)?.map(str::to_string),
                            name: strings.get(name_idx)?.to_string(),
                            raw_value: strings.get_optional(raw_idx)?.map(str::to_string),
                            value: value.decode(strings).map_err(|err| err.at(cell))?,
                            resource_id: self
                                .resource_map
                                .get(name_idx as usize)
                                .filter(|id| **id != 0)
                                .map(|id| ResourceId(*id)),
                        })
                    };
                    attributes.push(lookup().map_err(|err| err.at(attr_offset))?);
                }
                XmlNode::StartElement {
                    line,
                    namespace,
                    name,
                    attributes,
                }
            }
            RES_XML_END_ELEMENT_TYPE => XmlNode::EndElement {
                line,
                namespace: strings.get_optional(body.read_u32()?)?.map(str::to_string),
                name: strings.get(body.read_u32()?)?.to_string(),
            },
            RES_XML_CDATA_TYPE => {
                let data = body.read_u32()?;
                let value = ResValue::read(&mut body)?;
                if data != NO_STRING {
                    XmlNode::Text {
                        line,
                        text: strings.get(data)?.to_string(),
                    }
                } else {
                    XmlNode::CData {
                        line,
                        value: value.decode(strings)?,
                    }
                }
            }
            other => {
                warn!("[xml] skipping unknown chunk 0x{:04x} at 0x{:x}", other, header.offset);
                return Ok(None);
            }
        };
        Ok(Some(node))
    }

    fn next_node(&mut self) -> ResResult<Option<XmlNode>> {
        while !self.cursor.is_empty() {
            let header = self.cursor.read_chunk_header()?;
            self.cursor.seek(header.next_sibling())?;
            let node = self
                .read_node(&header)
                .map_err(|err| err.at(header.offset).in_chunk(header.chunk_type, header.offset))?;
            if node.is_some() {
                return Ok(node);
            }
        }
        Ok(None)
    }
}

impl<'a> Iterator for XmlNodes<'a> {
    type Item = ResResult<XmlNode>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_node() {
            Ok(Some(node)) => Some(Ok(node)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Output shaping for [`decode_with_options`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlOptions {
    /// Spaces per nesting level; 0 writes everything on one line.
    pub indent: usize,
    /// Emit the `<?xml ...?>` declaration.
    pub declaration: bool,
    /// How many reference-to-reference hops are followed.
    pub reference_depth: usize,
}

impl Default for XmlOptions {
    fn default() -> Self {
        XmlOptions {
            indent: 4,
            declaration: true,
            reference_depth: 1,
        }
    }
}

/// Rendered text plus the references that could not be resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlReport {
    pub text: String,
    pub unresolved: Vec<ResourceId>,
}

/// Decodes a compiled XML document to text, resolving references against
/// `table`.
pub fn decode(bytes: &[u8], table: &ResourceTable) -> ResResult<String> {
    decode_with_options(bytes, table, &XmlOptions::default())
}

pub fn decode_with_options(bytes: &[u8], table: &ResourceTable, options: &XmlOptions) -> ResResult<String> {
    decode_report(bytes, table, options).map(|report| report.text)
}

pub fn decode_report(bytes: &[u8], table: &ResourceTable, options: &XmlOptions) -> ResResult<XmlReport> {
    let mut resolver = Resolver {
        table,
        depth: options.reference_depth,
        unresolved: Vec::new(),
    };
    let roots = build_tree(XmlNodes::new(bytes)?, &mut resolver)?;

    let mut writer = if options.indent > 0 {
        Writer::new_with_indent(Vec::new(), b' ', options.indent)
    } else {
        Writer::new(Vec::new())
    };
    if options.declaration {
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    }
    for root in &roots {
        write_element_xml(root, &mut writer)?;
    }
    let mut text = String::from_utf8(writer.into_inner())
        .map_err(|err| ResError::new(ResErrorKind::Xml(err.to_string())))?;
    text.push('\n');
    Ok(XmlReport {
        text,
        unresolved: resolver.unresolved,
    })
}

struct NamespaceFrame {
    prefix: Option<String>,
    uri: String,
}

enum XmlChild {
    Element(XmlElement),
    Text(String),
}

struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlChild>,
}

fn resolve_prefix<'n>(namespaces: &'n [NamespaceFrame], uri: Option<&str>) -> Option<&'n str> {
    uri.and_then(|target| {
        namespaces
            .iter()
            .rev()
            .find(|frame| frame.uri == target)
            .and_then(|frame| frame.prefix.as_deref())
    })
}

fn qualified_name(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{local}"),
        _ => local.to_string(),
    }
}

fn build_tree(nodes: XmlNodes<'_>, resolver: &mut Resolver<'_>) -> ResResult<Vec<XmlElement>> {
    let mut namespaces: Vec<NamespaceFrame> = Vec::new();
    let mut pending: Vec<(String, String)> = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut roots = Vec::new();

    for node in nodes {
        match node? {
            XmlNode::StartNamespace { prefix, uri, .. } => {
                let decl = match prefix.as_deref() {
                    Some(p) if !p.is_empty() => format!("xmlns:{p}"),
                    _ => "xmlns".to_string(),
                };
                pending.push((decl, uri.clone()));
                namespaces.push(NamespaceFrame { prefix, uri });
            }
            XmlNode::EndNamespace { uri, .. } => {
                if let Some(pos) = namespaces.iter().rposition(|frame| frame.uri == uri) {
                    namespaces.remove(pos);
                }
            }
            XmlNode::StartElement {
                namespace,
                name,
                attributes,
                ..
            } => {
                let prefix = resolve_prefix(&namespaces, namespace.as_deref());
                let mut element = XmlElement {
                    name: qualified_name(prefix, &name),
                    attributes: std::mem::take(&mut pending),
                    children: Vec::new(),
                };
                for attr in &attributes {
                    let prefix = resolve_prefix(&namespaces, attr.namespace.as_deref());
                    element
                        .attributes
                        .push((qualified_name(prefix, &attr.name), resolver.attribute_text(attr)));
                }
                stack.push(element);
            }
            XmlNode::EndElement { line, name, .. } => {
                let element = stack.pop().ok_or_else(|| {
                    ResError::new(ResErrorKind::MalformedChunk(format!(
                        "end of element {name} on line {line} was never started"
                    )))
                })?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(XmlChild::Element(element)),
                    None => roots.push(element),
                }
            }
            XmlNode::Text { text, .. } => {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlChild::Text(text));
                }
            }
            XmlNode::CData { value, .. } => {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlChild::Text(resolver.value_text(&value)));
                }
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(ResError::new(ResErrorKind::MalformedChunk(format!(
            "element {} is never closed",
            open.name
        ))));
    }
    Ok(roots)
}

fn write_element_xml(element: &XmlElement, writer: &mut Writer<Vec<u8>>) -> ResResult<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        let value = attribute_escape(value);
        start.push_attribute((key.as_bytes(), value.as_bytes()));
    }
    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }
    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        match child {
            XmlChild::Element(child) => write_element_xml(child, writer)?,
            XmlChild::Text(text) => {
                writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(text.as_str()))))?
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

/// Escapes `&`, `<` and `"`; apostrophes are kept as written.
fn attribute_escape(value: &str) -> Cow<'_, str> {
    let escaped = minimal_escape(value);
    if escaped.contains('"') {
        Cow::Owned(escaped.replace('"', "&quot;"))
    } else {
        escaped
    }
}

/// Turns decoded values into attribute text, following references into the
/// table up to `depth` hops.
struct Resolver<'t> {
    table: &'t ResourceTable,
    depth: usize,
    unresolved: Vec<ResourceId>,
}

impl Resolver<'_> {
    fn attribute_text(&mut self, attr: &XmlAttribute) -> String {
        match &attr.value {
            DecodedValue::String(text) => attr.raw_value.clone().unwrap_or_else(|| text.clone()),
            other => self.value_text(other),
        }
    }

    fn value_text(&mut self, value: &DecodedValue) -> String {
        match value {
            DecodedValue::Reference(id) => self.reference_text(*id, self.depth, &mut Vec::new()),
            DecodedValue::DynamicReference(id) => {
                let id = self.table.remap_dynamic(*id);
                self.reference_text(id, self.depth, &mut Vec::new())
            }
            DecodedValue::Attribute(id) | DecodedValue::DynamicAttribute(id) => {
                match self.table.name_of(*id) {
                    Some(name) => format!("?{}/{}", name.type_name, name.name),
                    None => value.to_string(),
                }
            }
            other => other.to_string(),
        }
    }

    fn reference_text(&mut self, id: ResourceId, hops: usize, visited: &mut Vec<ResourceId>) -> String {
        if id.0 == 0 {
            return DecodedValue::Null.to_string();
        }
        if visited.contains(&id) {
            return self.placeholder(id);
        }
        let table = self.table;
        let (Some(entry), Some(name)) = (table.default_entry(id), table.name_of(id)) else {
            return self.placeholder(id);
        };
        visited.push(id);

        if is_file_resource(name, entry) {
            return name.resource_string();
        }
        let next = match &entry.value {
            EntryValue::Bag(_) => return name.resource_string(),
            EntryValue::Simple(DecodedValue::Reference(next)) => *next,
            EntryValue::Simple(DecodedValue::DynamicReference(next)) => table.remap_dynamic(*next),
            EntryValue::Simple(value) => return self.value_text(value),
        };
        if next.0 == 0 {
            DecodedValue::Null.to_string()
        } else if visited.contains(&next) {
            self.placeholder(next)
        } else if hops > 0 {
            self.reference_text(next, hops - 1, visited)
        } else {
            match table.name_of(next) {
                Some(target) => target.resource_string(),
                None => self.placeholder(next),
            }
        }
    }

    fn placeholder(&mut self, id: ResourceId) -> String {
        warn!("[xml] unresolved reference {}", id);
        if !self.unresolved.contains(&id) {
            self.unresolved.push(id);
        }
        format!("@unresolved/{id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::android::value::{TYPE_ATTRIBUTE, TYPE_DIMENSION, TYPE_INT_BOOLEAN, TYPE_INT_HEX, TYPE_REFERENCE};
    use crate::tests::builder::{XmlAttr, XmlBuilder};

    const ANDROID: Option<&str> = Some(ANDROID_NAMESPACE_URI);

    fn layout() -> Vec<u8> {
        let mut xml = XmlBuilder::new(&[("orientation", 0x0101_00c4), ("text", 0x0101_014f)]);
        xml.start_namespace("android", ANDROID_NAMESPACE_URI)
            .start_element(
                None,
                "LinearLayout",
                vec![XmlAttr::string(ANDROID, "orientation", "vertical")],
            )
            .start_element(
                None,
                "TextView",
                vec![
                    XmlAttr::typed(ANDROID, "textSize", TYPE_DIMENSION, (16 << 8) | 1),
                    XmlAttr::typed(ANDROID, "visible", TYPE_INT_BOOLEAN, 1),
                    XmlAttr::typed(ANDROID, "flags", TYPE_INT_HEX, 0x30),
                    XmlAttr::typed(ANDROID, "style", TYPE_ATTRIBUTE, 0x0101_0001),
                ],
            )
            .end_element(None, "TextView")
            .start_element(None, "Label", vec![])
            .text("Hello & bye")
            .end_element(None, "Label")
            .end_element(None, "LinearLayout")
            .end_namespace("android", ANDROID_NAMESPACE_URI);
        xml.to_bytes()
    }

    #[test]
    fn iterates_nodes_in_document_order() {
        let bytes = layout();
        let nodes: Vec<XmlNode> = XmlNodes::new(&bytes)
            .unwrap()
            .collect::<ResResult<_>>()
            .unwrap();
        assert_eq!(nodes.len(), 9);
        assert!(matches!(&nodes[0], XmlNode::StartNamespace { prefix: Some(p), .. } if p == "android"));
        assert!(matches!(&nodes[8], XmlNode::EndNamespace { .. }));
        assert_eq!(nodes.iter().map(XmlNode::line).collect::<Vec<_>>(), (1..=9).collect::<Vec<_>>());

        let XmlNode::StartElement { name, attributes, .. } = &nodes[1] else {
            panic!("expected a start element, got {:?}", nodes[1]);
        };
        assert_eq!(name, "LinearLayout");
        assert_eq!(attributes[0].name, "orientation");
        assert_eq!(attributes[0].raw_value.as_deref(), Some("vertical"));
        assert_eq!(attributes[0].resource_id, Some(ResourceId(0x0101_00c4)));
        assert!(matches!(&nodes[5], XmlNode::Text { text, .. } if text == "Hello & bye"));
    }

    #[test]
    fn renders_indented_xml() {
        let text = decode(&layout(), &ResourceTable::default()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "<?xml version=\"1.0\" encoding=\"utf-8\"?>");
        assert_eq!(
            lines[1],
            "<LinearLayout xmlns:android=\"http://schemas.android.com/apk/res/android\" android:orientation=\"vertical\">"
        );
        assert_eq!(
            lines[2],
            "    <TextView android:textSize=\"16dp\" android:visible=\"true\" android:flags=\"0x30\" android:style=\"?0x01010001\"/>"
        );
        assert_eq!(lines[3], "    <Label>Hello &amp; bye</Label>");
        assert_eq!(lines[4], "</LinearLayout>");
    }

    #[test]
    fn options_shape_output() {
        let options = XmlOptions {
            indent: 0,
            declaration: false,
            ..XmlOptions::default()
        };
        let text = decode_with_options(&layout(), &ResourceTable::default(), &options).unwrap();
        assert!(text.starts_with("<LinearLayout "));
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn missing_references_become_placeholders() {
        let mut xml = XmlBuilder::new(&[]);
        xml.start_element(
            None,
            "View",
            vec![
                XmlAttr::typed(None, "background", TYPE_REFERENCE, 0x7f02_0001),
                XmlAttr::typed(None, "empty", TYPE_REFERENCE, 0),
            ],
        )
        .end_element(None, "View");
        let report = decode_report(&xml.to_bytes(), &ResourceTable::default(), &XmlOptions::default()).unwrap();
        assert!(report.text.contains("background=\"@unresolved/0x7f020001\""));
        assert!(report.text.contains("empty=\"@null\""));
        assert_eq!(report.unresolved, vec![ResourceId(0x7f02_0001)]);
    }

    #[test]
    fn typed_cdata_is_kept() {
        let mut xml = XmlBuilder::new(&[]);
        xml.start_element(None, "integer", vec![])
            .typed_cdata(crate::android::value::TYPE_INT_DEC, 7)
            .end_element(None, "integer");
        let bytes = xml.to_bytes();
        let nodes: Vec<XmlNode> = XmlNodes::new(&bytes).unwrap().collect::<ResResult<_>>().unwrap();
        assert_eq!(
            nodes[1],
            XmlNode::CData {
                line: 2,
                value: DecodedValue::IntDec(7)
            }
        );
        let text = decode(&bytes, &ResourceTable::default()).unwrap();
        assert!(text.contains("<integer>7</integer>"));
    }

    #[test]
    fn escapes_only_what_xml_requires() {
        let mut xml = XmlBuilder::new(&[]);
        xml.start_element(None, "string", vec![XmlAttr::string(None, "msg", "Don't \"stop\" <now> & go")])
            .text("Don't \"stop\" <now> & go")
            .end_element(None, "string");
        let text = decode(&xml.to_bytes(), &ResourceTable::default()).unwrap();
        assert!(
            text.contains("msg=\"Don't &quot;stop&quot; &lt;now> &amp; go\""),
            "{text}"
        );
        assert!(text.contains(">Don't \"stop\" &lt;now&gt; &amp; go</string>"), "{text}");
    }

    #[test]
    fn unbalanced_elements_fail() {
        let mut xml = XmlBuilder::new(&[]);
        xml.start_element(None, "View", vec![]);
        let err = decode(&xml.to_bytes(), &ResourceTable::default()).unwrap_err();
        assert!(matches!(err.kind(), ResErrorKind::MalformedChunk(_)));
    }

    #[test]
    fn rejects_non_xml_chunks() {
        let table = crate::tests::builder::TableBuilder::new().to_bytes();
        assert!(XmlNodes::new(&table).is_err());
    }
}
