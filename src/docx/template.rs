//! WordprocessingML part templating.
//!
//! A part is read into a flat stream of markup events and `w:t` text runs.
//! Tags are located on the concatenated run text, moved into the run where
//! they start, and folded into a tree of values and sections. Rendering walks
//! that tree and writes the markup back out, duplicating or dropping the
//! event ranges enclosed by sections.

use std::fmt::Display;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde_json::Value;

use super::lexer::{self, TagKind};
use super::{PackageError, RenderError, TagIssue, TagIssueKind};

const TEXT_ELEMENT: &str = "w:t";
const BREAK_ELEMENT: &str = "w:br";
const SPACE_ATTRIBUTE: &str = "xml:space";

enum Item {
    Markup(Event<'static>),
    /// Unescaped content of one `w:t` element and the element path it sits at.
    Text { text: String, path: Vec<String> },
}

enum Token {
    Markup(Event<'static>),
    Text(String),
    Tag { content: String, path: Vec<String> },
}

#[derive(Debug)]
enum Node {
    Markup(Event<'static>),
    Text(String),
    Value(String),
    Section {
        name: String,
        inverted: bool,
        body: Vec<Node>,
    },
}

struct Frame {
    name: String,
    inverted: bool,
    path: Vec<String>,
    body: Vec<Node>,
}

/// A parsed, tag-checked part ready to be rendered any number of times.
#[derive(Debug)]
pub struct PartTemplate {
    part: String,
    nodes: Vec<Node>,
    tag_count: usize,
}

impl PartTemplate {
    /// Parse a part, collecting every tag problem instead of stopping at the first.
    pub fn parse(part: &str, xml: &str) -> Result<Self, RenderError> {
        let items = read_items(part, xml)?;
        let (tokens, mut issues) = tokenize(items);
        let tag_count = tokens
            .iter()
            .filter(|token| matches!(token, Token::Tag { .. }))
            .count();
        let nodes = build_tree(tokens, &mut issues);

        if !issues.is_empty() {
            return Err(RenderError::Template(
                issues.into_iter().map(|issue| issue.in_part(part)).collect(),
            ));
        }

        Ok(Self {
            part: part.to_string(),
            nodes,
            tag_count,
        })
    }

    /// Whether the part contains any tag at all; untagged parts can be copied as-is.
    pub fn has_tags(&self) -> bool {
        self.tag_count > 0
    }

    /// Write the part with every tag substituted from `data`.
    pub fn render(&self, data: &Value) -> Result<Vec<u8>, PackageError> {
        let mut writer = Writer::new(Vec::new());
        let mut scopes = vec![data];
        self.write_nodes(&mut writer, &self.nodes, &mut scopes)?;
        Ok(writer.into_inner())
    }

    fn write_nodes<'d>(
        &self,
        writer: &mut Writer<Vec<u8>>,
        nodes: &[Node],
        scopes: &mut Vec<&'d Value>,
    ) -> Result<(), PackageError> {
        for node in nodes {
            match node {
                Node::Markup(event) => self.emit(writer, event.clone())?,
                Node::Text(text) => self.emit(writer, Event::Text(BytesText::new(text)))?,
                Node::Value(name) => {
                    let text = lookup(scopes, name).map(value_to_text).unwrap_or_default();
                    self.write_text_with_breaks(writer, &text)?;
                }
                Node::Section {
                    name,
                    inverted,
                    body,
                } => {
                    let value = lookup(scopes, name);
                    if *inverted {
                        if !is_truthy(value) {
                            self.write_nodes(writer, body, scopes)?;
                        }
                        continue;
                    }
                    match value {
                        Some(Value::Array(elements)) => {
                            for element in elements {
                                scopes.push(element);
                                self.write_nodes(writer, body, scopes)?;
                                scopes.pop();
                            }
                        }
                        Some(value) if is_truthy(Some(value)) => {
                            scopes.push(value);
                            self.write_nodes(writer, body, scopes)?;
                            scopes.pop();
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    /// Newlines become `<w:br/>` inside the current run.
    fn write_text_with_breaks(
        &self,
        writer: &mut Writer<Vec<u8>>,
        text: &str,
    ) -> Result<(), PackageError> {
        for (index, line) in text.split('\n').enumerate() {
            if index > 0 {
                self.emit(writer, Event::End(BytesEnd::new(TEXT_ELEMENT)))?;
                self.emit(writer, Event::Empty(BytesStart::new(BREAK_ELEMENT)))?;
                let text_start = BytesStart::new(TEXT_ELEMENT)
                    .with_attributes([(SPACE_ATTRIBUTE, "preserve")]);
                self.emit(writer, Event::Start(text_start))?;
            }
            let line = line.strip_suffix('\r').unwrap_or(line);
            if !line.is_empty() {
                self.emit(writer, Event::Text(BytesText::new(line)))?;
            }
        }
        Ok(())
    }

    fn emit(&self, writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), PackageError> {
        writer
            .write_event(event)
            .map_err(|err| xml_error(&self.part, err))
    }
}

fn xml_error(part: &str, err: impl Display) -> PackageError {
    PackageError::Xml {
        part: part.to_string(),
        message: err.to_string(),
    }
}

fn read_items(part: &str, xml: &str) -> Result<Vec<Item>, PackageError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text_start = false;
    reader.config_mut().trim_text_end = false;

    let mut items = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut run_text: Option<String> = None;

    loop {
        match reader.read_event().map_err(|err| xml_error(part, err))? {
            Event::Start(start) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                if name == TEXT_ELEMENT {
                    items.push(Item::Markup(Event::Start(preserve_space(&start))));
                    run_text = Some(String::new());
                } else {
                    items.push(Item::Markup(Event::Start(start.into_owned())));
                }
                path.push(name);
            }
            Event::End(end) => {
                if end.name().as_ref() == TEXT_ELEMENT.as_bytes() {
                    if let Some(text) = run_text.take() {
                        items.push(Item::Text {
                            text,
                            path: path.clone(),
                        });
                    }
                }
                path.pop();
                items.push(Item::Markup(Event::End(end.into_owned())));
            }
            Event::Text(text) if run_text.is_some() => {
                let unescaped = text.unescape().map_err(|err| xml_error(part, err))?;
                if let Some(buffer) = run_text.as_mut() {
                    buffer.push_str(&unescaped);
                }
            }
            Event::CData(data) if run_text.is_some() => {
                if let Some(buffer) = run_text.as_mut() {
                    buffer.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            other => items.push(Item::Markup(other.into_owned())),
        }
    }

    Ok(items)
}

fn preserve_space(start: &BytesStart<'_>) -> BytesStart<'static> {
    let mut element = BytesStart::new(TEXT_ELEMENT);
    for attribute in start.attributes().flatten() {
        if attribute.key.as_ref() != SPACE_ATTRIBUTE.as_bytes() {
            element.push_attribute(attribute);
        }
    }
    element.push_attribute((SPACE_ATTRIBUTE, "preserve"));
    element
}

/// Split run text around tags; a tag spanning several runs lands whole in its first run.
fn tokenize(items: Vec<Item>) -> (Vec<Token>, Vec<TagIssue>) {
    let mut full = String::new();
    let mut ranges = Vec::new();
    for item in &items {
        if let Item::Text { text, .. } = item {
            let start = full.len();
            full.push_str(text);
            ranges.push((start, full.len()));
        }
    }

    let scan = lexer::scan(&full);
    let spans = scan.tags;
    let mut tokens = Vec::with_capacity(items.len() + spans.len());
    let mut ranges = ranges.into_iter();
    let mut next = 0;

    for item in items {
        let path = match item {
            Item::Markup(event) => {
                tokens.push(Token::Markup(event));
                continue;
            }
            Item::Text { path, .. } => path,
        };
        let Some((run_start, run_end)) = ranges.next() else {
            break;
        };

        let mut pos = run_start;
        while pos < run_end {
            match spans.get(next) {
                Some(span) if span.start < run_end && span.end > pos => {
                    if span.start >= pos {
                        if span.start > pos {
                            tokens.push(Token::Text(full[pos..span.start].to_string()));
                        }
                        tokens.push(Token::Tag {
                            content: span.content.clone(),
                            path: path.clone(),
                        });
                    }
                    pos = span.end.min(run_end);
                    if span.end <= run_end {
                        next += 1;
                    }
                }
                _ => {
                    tokens.push(Token::Text(full[pos..run_end].to_string()));
                    pos = run_end;
                }
            }
        }
    }

    (tokens, scan.issues)
}

fn build_tree(tokens: Vec<Token>, issues: &mut Vec<TagIssue>) -> Vec<Node> {
    let mut root = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();

    for token in tokens {
        let node = match token {
            Token::Markup(event) => Node::Markup(event),
            Token::Text(text) => Node::Text(text),
            Token::Tag { content, path } => match lexer::classify(&content) {
                Err(issue) => {
                    issues.push(issue);
                    continue;
                }
                Ok(TagKind::Value(name)) => Node::Value(name),
                Ok(TagKind::SectionOpen { name, inverted }) => {
                    stack.push(Frame {
                        name,
                        inverted,
                        path,
                        body: Vec::new(),
                    });
                    continue;
                }
                Ok(TagKind::SectionClose(name)) => {
                    let Some(frame) = stack.pop() else {
                        issues.push(TagIssue::new(
                            TagIssueKind::UnopenedLoop,
                            format!("/{name}"),
                            format!("The loop with tag \"{name}\" is unopened"),
                        ));
                        continue;
                    };
                    if frame.name != name {
                        issues.push(TagIssue::new(
                            TagIssueKind::MismatchedLoop,
                            format!("/{name}"),
                            format!(
                                "The loop with tag \"{}\" is closed by the tag \"{name}\"",
                                frame.name
                            ),
                        ));
                    } else if frame.path != path {
                        issues.push(TagIssue::new(
                            TagIssueKind::MisalignedLoop,
                            format!("#{name}"),
                            format!(
                                "The loop with tag \"{name}\" must open and close at the same level of the document (for example in two paragraphs, or inside the same table cell)"
                            ),
                        ));
                    }
                    Node::Section {
                        name: frame.name,
                        inverted: frame.inverted,
                        body: frame.body,
                    }
                }
            },
        };

        match stack.last_mut() {
            Some(frame) => frame.body.push(node),
            None => root.push(node),
        }
    }

    // Report outermost first.
    for frame in stack {
        let marker = if frame.inverted { '^' } else { '#' };
        issues.push(TagIssue::new(
            TagIssueKind::UnclosedLoop,
            format!("{marker}{}", frame.name),
            format!("The loop with tag \"{}\" is unclosed", frame.name),
        ));
    }

    root
}

fn lookup<'d>(scopes: &[&'d Value], name: &str) -> Option<&'d Value> {
    if name == "." {
        return scopes.last().copied();
    }
    scopes.iter().rev().find_map(|scope| resolve(scope, name))
}

fn resolve<'d>(scope: &'d Value, name: &str) -> Option<&'d Value> {
    let object = scope.as_object()?;
    if let Some(value) = object.get(name) {
        return Some(value);
    }
    if !name.contains('.') {
        return None;
    }
    let mut current = scope;
    for segment in name.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(elements)) => !elements.is_empty(),
        Some(Value::Object(_)) => true,
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
