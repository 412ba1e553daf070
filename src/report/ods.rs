//! Minimal OpenDocument spreadsheet editing.
//!
//! An `.ods` file is a zip archive; the sheets live in `content.xml`. The
//! document is held in memory as an element tree so cells can be written
//! in place without disturbing styles, column definitions or the chart
//! objects that reference the sheets. Every other archive member is carried
//! over byte for byte.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const CONTENT: &str = "content.xml";
const MIMETYPE: &str = "mimetype";

const BODY: &str = "office:body";
const SPREADSHEET: &str = "office:spreadsheet";
const TABLE: &str = "table:table";
const TABLE_NAME: &str = "table:name";
const COLUMN: &str = "table:table-column";
const ROW: &str = "table:table-row";
const CELL: &str = "table:table-cell";
const COVERED_CELL: &str = "table:covered-table-cell";
const PARAGRAPH: &str = "text:p";
const ROWS_REPEATED: &str = "table:number-rows-repeated";
const COLUMNS_REPEATED: &str = "table:number-columns-repeated";
const ROW_CONTAINERS: [&str; 3] = [
    "table:table-header-rows",
    "table:table-rows",
    "table:table-row-group",
];

/// Attributes describing a cell's current value; dropped before a new value is set.
const VALUE_ATTRIBUTES: [&str; 9] = [
    "office:value-type",
    "office:value",
    "office:string-value",
    "office:date-value",
    "office:time-value",
    "office:boolean-value",
    "office:currency",
    "calcext:value-type",
    "table:formula",
];

/// A value to place in a cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Int(i64),
    Float(f64),
}

#[derive(Debug, Clone)]
enum Node {
    Element(Element),
    Text(String),
    Other(Event<'static>),
}

#[derive(Debug, Clone)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    fn from_start(start: &BytesStart) -> Result<Self, String> {
        let name = String::from_utf8(start.name().as_ref().to_vec()).map_err(|e| e.to_string())?;
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| e.to_string())?;
            let key = String::from_utf8(attr.key.as_ref().to_vec()).map_err(|e| e.to_string())?;
            let value = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
            attrs.push((key, value));
        }
        Ok(Self {
            name,
            attrs,
            children: Vec::new(),
        })
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((key.to_string(), value)),
        }
    }

    fn remove_attr(&mut self, key: &str) {
        self.attrs.retain(|(k, _)| k != key);
    }

    /// Span of a row or cell element, from its repeat attribute.
    fn repeat(&self, key: &str) -> usize {
        self.attr(key)
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(1)
    }

    fn set_repeat(&mut self, key: &str, count: usize) {
        if count > 1 {
            self.set_attr(key, count.to_string());
        } else {
            self.remove_attr(key);
        }
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|n| match n {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|n| match n {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    fn write_value(&mut self, value: &CellValue) {
        self.attrs
            .retain(|(k, _)| !VALUE_ATTRIBUTES.contains(&k.as_str()));
        self.children
            .retain(|n| !matches!(n, Node::Element(e) if e.name == PARAGRAPH));

        let display = match value {
            CellValue::Text(text) => {
                self.set_attr("office:value-type", "string");
                text.clone()
            }
            CellValue::Int(number) => {
                self.set_attr("office:value-type", "float");
                self.set_attr("office:value", number.to_string());
                number.to_string()
            }
            CellValue::Float(number) => {
                self.set_attr("office:value-type", "float");
                self.set_attr("office:value", number.to_string());
                number.to_string()
            }
        };

        let mut paragraph = Element::new(PARAGRAPH);
        paragraph.children.push(Node::Text(display));
        self.children.insert(0, Node::Element(paragraph));
    }
}

/// An `.ods` document loaded in memory.
pub struct OdsDocument {
    path: PathBuf,
    members: Vec<Member>,
    prolog: Vec<Node>,
    root: Element,
}

struct Member {
    name: String,
    data: Vec<u8>,
    is_dir: bool,
    stored: bool,
}

impl OdsDocument {
    /// Loads the archive at `path` and parses its `content.xml`.
    pub fn open(path: &Path) -> Result<Self, String> {
        let file = File::open(path).map_err(|e| e.to_string())?;
        let mut archive = ZipArchive::new(file).map_err(|e| e.to_string())?;

        let mut members = Vec::with_capacity(archive.len());
        let mut content = None;
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| e.to_string())?;
            let mut data = Vec::new();
            entry.read_to_end(&mut data).map_err(|e| e.to_string())?;
            let name = entry.name().to_string();
            if name == CONTENT {
                content = Some(data.clone());
            }
            members.push(Member {
                is_dir: entry.is_dir(),
                stored: entry.compression() == CompressionMethod::Stored,
                name,
                data,
            });
        }

        let content = content.ok_or_else(|| format!("{} not found in archive", CONTENT))?;
        let (prolog, root) = parse_xml(&content)?;

        let doc = Self {
            path: path.to_path_buf(),
            members,
            prolog,
            root,
        };
        if doc.spreadsheet().is_none() {
            return Err("document has no spreadsheet body".to_string());
        }

        debug!(path = %path.display(), sheets = ?doc.sheet_names(), "Spreadsheet opened");
        Ok(doc)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.spreadsheet()
            .map(|s| {
                s.children
                    .iter()
                    .filter_map(|n| match n {
                        Node::Element(e) if e.name == TABLE => e.attr(TABLE_NAME).map(str::to_string),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_sheet(&self, name: &str) -> bool {
        self.sheet_names().iter().any(|s| s == name)
    }

    /// Writes `value` at zero-based (`row`, `col`) of sheet `sheet`, growing the sheet if needed.
    pub fn set_cell(&mut self, sheet: &str, row: usize, col: usize, value: &CellValue) -> Result<(), String> {
        let table = self
            .table_mut(sheet)
            .ok_or_else(|| format!("no sheet named '{}'", sheet))?;
        let row_element = slot(&mut table.children, row, ROW, ROWS_REPEATED, &ROW_CONTAINERS);
        let cell = slot(&mut row_element.children, col, CELL, COLUMNS_REPEATED, &[]);
        cell.write_value(value);
        Ok(())
    }

    /// Appends an empty sheet of `rows` × `cols` after the existing ones.
    pub fn add_sheet(&mut self, name: &str, rows: usize, cols: usize) -> Result<(), String> {
        if self.has_sheet(name) {
            return Err(format!("sheet '{}' already exists", name));
        }

        let mut table = Element::new(TABLE);
        table.set_attr(TABLE_NAME, name);

        let mut column = Element::new(COLUMN);
        column.set_repeat(COLUMNS_REPEATED, cols.max(1));
        table.children.push(Node::Element(column));

        let mut cell = Element::new(CELL);
        cell.set_repeat(COLUMNS_REPEATED, cols.max(1));
        let mut row = Element::new(ROW);
        row.set_repeat(ROWS_REPEATED, rows.max(1));
        row.children.push(Node::Element(cell));
        table.children.push(Node::Element(row));

        let spreadsheet = self
            .spreadsheet_mut()
            .ok_or_else(|| "document has no spreadsheet body".to_string())?;
        let after_last_table = spreadsheet
            .children
            .iter()
            .rposition(|n| matches!(n, Node::Element(e) if e.name == TABLE))
            .map_or(0, |i| i + 1);
        spreadsheet
            .children
            .insert(after_last_table, Node::Element(table));

        Ok(())
    }

    /// Reads back the text of a cell, `None` if the cell does not exist or is empty.
    pub fn cell_text(&self, sheet: &str, row: usize, col: usize) -> Option<String> {
        let table = self.table(sheet)?;
        let row = find_slot(&table.children, row, ROW, ROWS_REPEATED, &ROW_CONTAINERS)?;
        let cell = find_slot(&row.children, col, CELL, COLUMNS_REPEATED, &[])?;
        let paragraph = cell.child(PARAGRAPH)?;
        let text: String = paragraph
            .children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        (!text.is_empty()).then_some(text)
    }

    /// Value type recorded on a cell (`string`, `float`, ...).
    pub fn cell_type(&self, sheet: &str, row: usize, col: usize) -> Option<String> {
        let table = self.table(sheet)?;
        let row = find_slot(&table.children, row, ROW, ROWS_REPEATED, &ROW_CONTAINERS)?;
        let cell = find_slot(&row.children, col, CELL, COLUMNS_REPEATED, &[])?;
        cell.attr("office:value-type").map(str::to_string)
    }

    /// Writes the archive back to the path it was opened from.
    pub fn save(&self) -> Result<(), String> {
        let content = write_xml(&self.prolog, &self.root)?;

        let file = File::create(&self.path).map_err(|e| e.to_string())?;
        let mut zip = ZipWriter::new(file);
        let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);

        // The mimetype member has to come first and uncompressed.
        let mimetype = self.members.iter().find(|m| m.name == MIMETYPE);
        if let Some(member) = mimetype {
            zip.start_file(MIMETYPE, stored).map_err(|e| e.to_string())?;
            zip.write_all(&member.data).map_err(|e| e.to_string())?;
        }

        for member in self.members.iter().filter(|m| m.name != MIMETYPE) {
            if member.is_dir {
                zip.add_directory(member.name.as_str(), stored)
                    .map_err(|e| e.to_string())?;
                continue;
            }
            let options = if member.stored { stored } else { deflated };
            zip.start_file(member.name.as_str(), options)
                .map_err(|e| e.to_string())?;
            let data = if member.name == CONTENT {
                &content
            } else {
                &member.data
            };
            zip.write_all(data).map_err(|e| e.to_string())?;
        }

        zip.finish().map_err(|e| e.to_string())?;
        debug!(path = %self.path.display(), "Spreadsheet saved");
        Ok(())
    }

    fn spreadsheet(&self) -> Option<&Element> {
        self.root.child(BODY)?.child(SPREADSHEET)
    }

    fn spreadsheet_mut(&mut self) -> Option<&mut Element> {
        self.root.child_mut(BODY)?.child_mut(SPREADSHEET)
    }

    fn table(&self, name: &str) -> Option<&Element> {
        self.spreadsheet()?.children.iter().find_map(|n| match n {
            Node::Element(e) if e.name == TABLE && e.attr(TABLE_NAME) == Some(name) => Some(e),
            _ => None,
        })
    }

    fn table_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.spreadsheet_mut()?.children.iter_mut().find_map(|n| match n {
            Node::Element(e) if e.name == TABLE && e.attr(TABLE_NAME) == Some(name) => Some(e),
            _ => None,
        })
    }
}

/// Finds the element covering logical `index` among `children`, looking into
/// `containers` as well. Returns the child path and the offset of `index`
/// inside the element's repeat span.
fn locate(
    children: &[Node],
    index: usize,
    name: &str,
    repeat_key: &str,
    containers: &[&str],
    seen: &mut usize,
) -> Option<(Vec<usize>, usize)> {
    for (i, node) in children.iter().enumerate() {
        let Node::Element(e) = node else { continue };
        if e.name == name || (name == CELL && e.name == COVERED_CELL) {
            let span = e.repeat(repeat_key);
            if index < *seen + span {
                return Some((vec![i], index - *seen));
            }
            *seen += span;
        } else if containers.contains(&e.name.as_str()) {
            if let Some((mut path, offset)) = locate(&e.children, index, name, repeat_key, containers, seen) {
                path.insert(0, i);
                return Some((path, offset));
            }
        }
    }
    None
}

fn find_slot<'a>(
    children: &'a [Node],
    index: usize,
    name: &str,
    repeat_key: &str,
    containers: &[&str],
) -> Option<&'a Element> {
    let (path, _) = locate(children, index, name, repeat_key, containers, &mut 0)?;
    let mut current = children;
    let mut found = None;
    for i in path {
        let Node::Element(e) = current.get(i)? else { return None };
        current = e.children.as_slice();
        found = Some(e);
    }
    found
}

/// Returns the element at logical `index`, splitting a repeated element so
/// the slot stands alone, or appending filler elements when `index` lies
/// past the end.
fn slot<'a>(
    children: &'a mut Vec<Node>,
    index: usize,
    name: &str,
    repeat_key: &str,
    containers: &[&str],
) -> &'a mut Element {
    let mut seen = 0;
    let (siblings, position) = match locate(children, index, name, repeat_key, containers, &mut seen) {
        Some((path, offset)) => {
            let (last, parents) = path.split_last().map(|(l, p)| (*l, p.to_vec())).unwrap_or((0, Vec::new()));
            let mut siblings = children;
            for i in parents {
                siblings = match &mut siblings[i] {
                    Node::Element(e) => &mut e.children,
                    _ => unreachable!("locate only descends into elements"),
                };
            }
            let position = split_repeated(siblings, last, offset, repeat_key);
            (siblings, position)
        }
        None => {
            // `seen` now holds the logical length of the sequence.
            let insert_at = children
                .iter()
                .rposition(|n| {
                    matches!(n, Node::Element(e) if e.name == name || containers.contains(&e.name.as_str()))
                })
                .map_or(children.len(), |i| i + 1);
            let mut position = insert_at;
            if index > seen {
                let mut filler = Element::new(name);
                filler.set_repeat(repeat_key, index - seen);
                children.insert(position, Node::Element(filler));
                position += 1;
            }
            children.insert(position, Node::Element(Element::new(name)));
            (children, position)
        }
    };

    match &mut siblings[position] {
        Node::Element(e) => e,
        _ => unreachable!("slot always points at an element"),
    }
}

/// Splits the repeated element at `at` into up to three runs so that the
/// element at `offset` inside its span stands alone. Returns its new index.
fn split_repeated(siblings: &mut Vec<Node>, at: usize, offset: usize, repeat_key: &str) -> usize {
    let Node::Element(original) = &siblings[at] else { return at };
    let span = original.repeat(repeat_key);
    if span == 1 {
        return at;
    }

    let mut before = original.clone();
    let mut single = original.clone();
    let mut after = original.clone();
    before.set_repeat(repeat_key, offset);
    single.set_repeat(repeat_key, 1);
    after.set_repeat(repeat_key, span - offset - 1);

    let mut replacement = Vec::with_capacity(3);
    if offset > 0 {
        replacement.push(Node::Element(before));
    }
    replacement.push(Node::Element(single));
    if span - offset - 1 > 0 {
        replacement.push(Node::Element(after));
    }
    siblings.splice(at..=at, replacement);

    at + usize::from(offset > 0)
}

fn parse_xml(bytes: &[u8]) -> Result<(Vec<Node>, Element), String> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut prolog = Vec::new();
    let mut root = None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| format!("{} at byte {}: {}", CONTENT, reader.buffer_position(), e))?;
        let node = match event {
            Event::Eof => break,
            Event::Start(start) => {
                stack.push(Element::from_start(&start)?);
                None
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| format!("{}: unbalanced end tag", CONTENT))?;
                Some(Node::Element(element))
            }
            Event::Empty(start) => Some(Node::Element(Element::from_start(&start)?)),
            Event::Text(text) => Some(Node::Text(text.unescape().map_err(|e| e.to_string())?.into_owned())),
            other => Some(Node::Other(other.into_owned())),
        };
        buf.clear();
        let Some(node) = node else { continue };

        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => match node {
                Node::Element(element) if root.is_none() => root = Some(element),
                other if root.is_none() => prolog.push(other),
                _ => {}
            },
        }
    }

    if !stack.is_empty() {
        return Err(format!("{}: unclosed element '{}'", CONTENT, stack[stack.len() - 1].name));
    }
    let root = root.ok_or_else(|| format!("{}: no root element", CONTENT))?;
    Ok((prolog, root))
}

fn write_xml(prolog: &[Node], root: &Element) -> Result<Vec<u8>, String> {
    let mut writer = Writer::new(Vec::new());
    for node in prolog {
        write_node(&mut writer, node)?;
    }
    write_element(&mut writer, root)?;
    Ok(writer.into_inner())
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<(), String> {
    match node {
        Node::Element(element) => write_element(writer, element),
        Node::Text(text) => writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(|e| e.to_string()),
        Node::Other(event) => writer.write_event(event.clone()).map_err(|e| e.to_string()),
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), String> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attrs {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| e.to_string());
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| e.to_string())?;
    for child in &element.children {
        write_node(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(|e| e.to_string())
}
