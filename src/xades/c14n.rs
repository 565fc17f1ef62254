//! Exclusive XML canonicalization (without comments).
//!
//! Covers what enveloped signatures over Facturae documents need: element
//! and attribute ordering, namespace rendering for visibly used prefixes,
//! text and attribute escaping, empty-element expansion, and the
//! enveloped-signature transform. Nodes outside the root element are
//! dropped; DTDs are not processed.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

use super::DSIG_NS;
use super::error::SigningError;

/// Which part of the document to canonicalize.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Target<'a> {
    /// The root element and everything below it.
    Document,
    /// The first element with this namespace URI and local name.
    Element { ns: &'a str, local: &'a str },
    /// The first element whose `Id` attribute equals the value.
    Id(&'a str),
}

/// Canonicalize the whole document.
pub fn canonicalize(xml: &str) -> Result<String, SigningError> {
    canonicalize_target(xml, Target::Document, false)
}

/// Canonicalize the whole document with every `ds:Signature` element
/// removed, as the enveloped-signature transform prescribes.
pub fn canonicalize_enveloped(xml: &str) -> Result<String, SigningError> {
    canonicalize_target(xml, Target::Document, true)
}

struct Frame {
    qname: String,
    declared: Vec<(String, String)>,
    /// Namespace declarations written on this element, when it is output.
    rendered: Option<Vec<(String, String)>>,
}

pub(crate) fn canonicalize_target(
    xml: &str,
    target: Target<'_>,
    exclude_signatures: bool,
) -> Result<String, SigningError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().expand_empty_elements = true;

    let mut out = String::with_capacity(xml.len());
    let mut stack: Vec<Frame> = Vec::new();
    let mut output_depth: Option<usize> = None;
    let mut skip_depth: Option<usize> = None;
    let mut done = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            SigningError::Xml(format!(
                "XML parse error at position {}: {e}",
                reader.buffer_position()
            ))
        })?;
        match event {
            Event::Start(ref e) => {
                let depth = stack.len();
                let qname = utf8(e.name().as_ref())?.to_string();
                let (declared, attrs) = split_attributes(e)?;
                stack.push(Frame {
                    qname,
                    declared,
                    rendered: None,
                });

                if done || skip_depth.is_some() {
                    continue;
                }
                let (prefix, local) = split_qname(&stack[depth].qname);
                let ns = lookup(&stack, prefix).unwrap_or("");

                if exclude_signatures && ns == DSIG_NS && local == "Signature" {
                    skip_depth = Some(depth);
                    continue;
                }
                if output_depth.is_none() {
                    let hit = match target {
                        Target::Document => depth == 0,
                        Target::Element { ns: t_ns, local: t_local } => {
                            ns == t_ns && local == t_local
                        }
                        Target::Id(id) => attrs.iter().any(|(k, v)| k == "Id" && v == id),
                    };
                    if hit {
                        output_depth = Some(depth);
                    }
                }
                if output_depth.is_some() {
                    write_start(&mut out, &mut stack, &attrs)?;
                }
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| SigningError::Xml("unbalanced end tag".into()))?;
                let depth = stack.len();
                if skip_depth == Some(depth) {
                    skip_depth = None;
                    continue;
                }
                if skip_depth.is_some() || done {
                    continue;
                }
                if output_depth.is_some() {
                    out.push_str("</");
                    out.push_str(&frame.qname);
                    out.push('>');
                }
                if output_depth == Some(depth) {
                    output_depth = None;
                    done = true;
                }
            }
            Event::Text(ref e) => {
                if emitting(output_depth, skip_depth, done) {
                    let raw = normalize_line_endings(utf8(e)?);
                    let text = unescape(&raw)
                        .map_err(|err| SigningError::Xml(format!("invalid text: {err}")))?;
                    escape_text(&mut out, &text);
                }
            }
            Event::CData(ref e) => {
                if emitting(output_depth, skip_depth, done) {
                    let raw = normalize_line_endings(utf8(e)?);
                    escape_text(&mut out, &raw);
                }
            }
            Event::PI(ref e) => {
                if emitting(output_depth, skip_depth, done) {
                    out.push_str("<?");
                    out.push_str(utf8(e)?);
                    out.push_str("?>");
                }
            }
            Event::Eof => break,
            // Declaration, comments, doctype: not part of the canonical form.
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(SigningError::Xml("unexpected end of document".into()));
    }
    if !done {
        return Err(SigningError::Xml(match target {
            Target::Document => "document has no root element".to_string(),
            Target::Element { local, .. } => format!("element {local} not found"),
            Target::Id(id) => format!("no element with Id {id:?}"),
        }));
    }
    Ok(out)
}

fn emitting(output_depth: Option<usize>, skip_depth: Option<usize>, done: bool) -> bool {
    output_depth.is_some() && skip_depth.is_none() && !done
}

/// Write the canonical start tag for the element on top of `stack`.
fn write_start(
    out: &mut String,
    stack: &mut [Frame],
    attrs: &[(String, String)],
) -> Result<(), SigningError> {
    let Some((current, ancestors)) = stack.split_last_mut() else {
        return Ok(());
    };
    let (elem_prefix, _) = split_qname(&current.qname);

    let mut used: Vec<&str> = vec![elem_prefix];
    for (name, _) in attrs {
        let (prefix, _) = split_qname(name);
        if !prefix.is_empty() && prefix != "xml" && !used.contains(&prefix) {
            used.push(prefix);
        }
    }

    let mut decls: Vec<(String, String)> = Vec::new();
    for prefix in used {
        let uri = lookup_in(ancestors, &current.declared, prefix);
        let already = rendered_in(ancestors, prefix);
        match (prefix, uri) {
            ("", uri) => {
                let uri = uri.unwrap_or("");
                if already.unwrap_or("") != uri {
                    decls.push((String::new(), uri.to_string()));
                }
            }
            (p, Some(uri)) => {
                if already != Some(uri) {
                    decls.push((p.to_string(), uri.to_string()));
                }
            }
            (p, None) => {
                return Err(SigningError::Xml(format!("unbound namespace prefix {p}")));
            }
        }
    }
    decls.sort();

    let mut sorted_attrs: Vec<(String, &str, &str)> = Vec::with_capacity(attrs.len());
    for (name, value) in attrs {
        let (prefix, local) = split_qname(name);
        let ns = if prefix.is_empty() {
            ""
        } else if prefix == "xml" {
            "http://www.w3.org/XML/1998/namespace"
        } else {
            lookup_in(ancestors, &current.declared, prefix).unwrap_or("")
        };
        sorted_attrs.push((format!("{ns}\u{0}{local}"), name.as_str(), value.as_str()));
    }
    sorted_attrs.sort_by(|a, b| a.0.cmp(&b.0));

    out.push('<');
    out.push_str(&current.qname);
    for (prefix, uri) in &decls {
        if prefix.is_empty() {
            out.push_str(" xmlns=\"");
        } else {
            out.push_str(" xmlns:");
            out.push_str(prefix);
            out.push_str("=\"");
        }
        escape_attr(out, uri);
        out.push('"');
    }
    for (_, name, value) in &sorted_attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_attr(out, value);
        out.push('"');
    }
    out.push('>');

    current.rendered = Some(decls);
    Ok(())
}

/// Split attributes into namespace declarations and ordinary attributes,
/// both with normalized, unescaped values.
#[allow(clippy::type_complexity)]
fn split_attributes(
    e: &BytesStart<'_>,
) -> Result<(Vec<(String, String)>, Vec<(String, String)>), SigningError> {
    let mut declared = Vec::new();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| SigningError::Xml(format!("invalid attribute: {err}")))?;
        let key = utf8(attr.key.as_ref())?.to_string();
        let raw = normalize_attribute(utf8(&attr.value)?);
        let value = unescape(&raw)
            .map_err(|err| SigningError::Xml(format!("invalid attribute value: {err}")))?
            .into_owned();
        if key == "xmlns" {
            declared.push((String::new(), value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declared.push((prefix.to_string(), value));
        } else {
            attrs.push((key, value));
        }
    }
    Ok((declared, attrs))
}

fn split_qname(qname: &str) -> (&str, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => ("", qname),
    }
}

fn lookup<'a>(stack: &'a [Frame], prefix: &str) -> Option<&'a str> {
    stack.iter().rev().find_map(|frame| {
        frame
            .declared
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    })
}

fn lookup_in<'a>(
    ancestors: &'a [Frame],
    declared: &'a [(String, String)],
    prefix: &str,
) -> Option<&'a str> {
    declared
        .iter()
        .find(|(p, _)| p == prefix)
        .map(|(_, uri)| uri.as_str())
        .or_else(|| lookup(ancestors, prefix))
}

fn rendered_in<'a>(ancestors: &'a [Frame], prefix: &str) -> Option<&'a str> {
    ancestors.iter().rev().find_map(|frame| {
        frame
            .rendered
            .as_ref()?
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    })
}

fn utf8(bytes: &[u8]) -> Result<&str, SigningError> {
    std::str::from_utf8(bytes).map_err(|e| SigningError::Xml(format!("invalid UTF-8: {e}")))
}

fn normalize_line_endings(s: &str) -> Cow<'_, str> {
    if s.contains('\r') {
        Cow::Owned(s.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(s)
    }
}

fn normalize_attribute(s: &str) -> String {
    normalize_line_endings(s)
        .chars()
        .map(|c| if matches!(c, '\t' | '\n') { ' ' } else { c })
        .collect()
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
}

fn escape_attr(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
}
