//! Flatten an XMLData payload into leaf-tag fields.

use crate::record::FieldMap;
use quick_xml::events::Event;
use quick_xml::Reader;

/// An element that has been opened but not yet closed.
struct OpenElement {
    name: String,
    has_children: bool,
    text: Option<String>,
}

/// Walk the element tree and record every leaf element (no child elements)
/// as `local-name -> text`.
///
/// Namespace prefixes are dropped. An element without text maps to `None`.
/// Repeated leaf names overwrite earlier values in document order.
///
/// The document must have exactly one root element. Anything other than
/// whitespace, comments, or processing instructions outside it is an error.
pub fn flatten(xml: &str) -> Result<FieldMap, String> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<OpenElement> = Vec::new();
    let mut fields = FieldMap::new();
    let mut root_closed = false;

    loop {
        match reader.read_event().map_err(|e| describe(&reader, e))? {
            Event::Start(e) => {
                let name = local_name(e.local_name().as_ref());
                match stack.last_mut() {
                    Some(parent) => parent.has_children = true,
                    None if root_closed => return Err(junk_after_root(&reader, &name)),
                    None => {}
                }
                stack.push(OpenElement {
                    name,
                    has_children: false,
                    text: None,
                });
            }
            Event::Empty(e) => {
                let name = local_name(e.local_name().as_ref());
                match stack.last_mut() {
                    Some(parent) => parent.has_children = true,
                    None if root_closed => return Err(junk_after_root(&reader, &name)),
                    None => root_closed = true,
                }
                fields.insert(name, None);
            }
            Event::Text(t) => {
                let Some(open) = stack.last_mut() else {
                    if t.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    return Err(format!(
                        "text outside the root element at byte {}",
                        reader.buffer_position()
                    ));
                };
                let text = t.unescape().map_err(|e| describe(&reader, e))?;
                open.text.get_or_insert_with(String::new).push_str(&text);
            }
            Event::CData(c) => {
                let Some(open) = stack.last_mut() else {
                    return Err(format!(
                        "CDATA outside the root element at byte {}",
                        reader.buffer_position()
                    ));
                };
                let text = String::from_utf8_lossy(&c);
                open.text.get_or_insert_with(String::new).push_str(&text);
            }
            Event::End(_) => {
                if let Some(open) = stack.pop() {
                    if !open.has_children {
                        fields.insert(open.name, open.text);
                    }
                }
                if stack.is_empty() {
                    root_closed = true;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(format!("unexpected end of document inside <{}>", open.name));
    }
    if !root_closed {
        return Err("document has no root element".to_string());
    }

    Ok(fields)
}

fn local_name(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn junk_after_root(reader: &Reader<&[u8]>, name: &str) -> String {
    format!(
        "element <{name}> after the root element at byte {}",
        reader.buffer_position()
    )
}

fn describe(reader: &Reader<&[u8]>, err: quick_xml::Error) -> String {
    format!("{err} at byte {}", reader.buffer_position())
}
