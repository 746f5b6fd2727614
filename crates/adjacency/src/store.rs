use std::fs;
use std::path::{Path, PathBuf};

use adjacency_common::{AdjacencyRecord, LayerResult};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("result document is not well-formed: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("bad attribute in result document: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("result document violates schema: {0}")]
    Schema(String),
    #[error("failed to replace result document: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// One persisted layer entry: a name and its adjacency records
#[derive(Debug, Clone, PartialEq)]
pub struct LayerEntry {
    pub name: String,
    pub records: LayerResult,
}

/// The in-memory form of the persisted result document.
///
/// Entries are ordered (newly reserved layers append at the end) and unique
/// by layer name. Uniqueness is enforced by [`ResultDocument::reserve`] and
/// [`ResultDocument::upsert`]; callers never edit entries positionally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultDocument {
    entries: Vec<LayerEntry>,
}

impl ResultDocument {
    pub fn entries(&self) -> &[LayerEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&LayerEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove any existing entry for each name, then append an empty
    /// placeholder at the end of the document
    pub fn reserve<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            let name = name.as_ref();
            self.entries.retain(|entry| entry.name != name);
            self.entries.push(LayerEntry {
                name: name.to_string(),
                records: Vec::new(),
            });
        }
    }

    /// Replace the records of `name` in place, or append if absent
    pub fn upsert(&mut self, name: &str, records: LayerResult) {
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.records = records,
            None => self.entries.push(LayerEntry {
                name: name.to_string(),
                records,
            }),
        }
    }

    /// Parse a persisted result document.
    ///
    /// The schema is a `data` root holding `layer` elements (each with a
    /// `name` attribute) which hold `area` elements with `cell1`, `cell2`,
    /// `index1`, `index2` and `adjacency` children. Anything else, including
    /// a duplicated layer name, is a schema error.
    pub fn from_xml(content: &str) -> Result<Self, StoreError> {
        let mut reader = Reader::from_str(content);
        reader.trim_text(true);

        let mut doc = ResultDocument::default();
        let mut current_layer: Option<LayerEntry> = None;
        let mut current_record: Option<RecordBuilder> = None;
        let mut current_field: Option<Field> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.name().as_ref() {
                    b"data" => {}
                    b"layer" => {
                        current_layer = Some(LayerEntry {
                            name: layer_name(&e)?,
                            records: Vec::new(),
                        });
                    }
                    b"area" => current_record = Some(RecordBuilder::default()),
                    tag => match Field::from_tag(tag) {
                        Some(field) => current_field = Some(field),
                        None => {
                            return Err(StoreError::Schema(format!(
                                "unexpected element <{}>",
                                String::from_utf8_lossy(tag)
                            )));
                        }
                    },
                },
                Event::Empty(e) => match e.name().as_ref() {
                    b"data" => {}
                    b"layer" => doc.push_entry(LayerEntry {
                        name: layer_name(&e)?,
                        records: Vec::new(),
                    })?,
                    tag => {
                        if Field::from_tag(tag).is_none() {
                            return Err(StoreError::Schema(format!(
                                "unexpected element <{}/>",
                                String::from_utf8_lossy(tag)
                            )));
                        }
                    }
                },
                Event::Text(t) => {
                    if let (Some(record), Some(field)) = (&mut current_record, current_field) {
                        record.set(field, &t.unescape()?)?;
                    }
                }
                Event::End(e) => match e.name().as_ref() {
                    b"area" => {
                        let record = current_record
                            .take()
                            .ok_or_else(|| StoreError::Schema("stray </area>".to_string()))?
                            .finish()?;
                        current_layer
                            .as_mut()
                            .ok_or_else(|| {
                                StoreError::Schema("<area> outside <layer>".to_string())
                            })?
                            .records
                            .push(record);
                    }
                    b"layer" => {
                        let entry = current_layer
                            .take()
                            .ok_or_else(|| StoreError::Schema("stray </layer>".to_string()))?;
                        doc.push_entry(entry)?;
                    }
                    _ => current_field = None,
                },
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(doc)
    }

    fn push_entry(&mut self, entry: LayerEntry) -> Result<(), StoreError> {
        if self.get(&entry.name).is_some() {
            return Err(StoreError::Schema(format!(
                "duplicate layer entry: {}",
                entry.name
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Serialize the whole document to the persisted schema
    pub fn write_into<W: std::io::Write>(&self, sink: W) -> Result<(), StoreError> {
        let mut writer = Writer::new(sink);
        writer.write_event(Event::Start(BytesStart::new("data")))?;
        for entry in &self.entries {
            let mut layer = BytesStart::new("layer");
            layer.push_attribute(("name", entry.name.as_str()));
            writer.write_event(Event::Start(layer))?;
            for record in &entry.records {
                writer.write_event(Event::Start(BytesStart::new("area")))?;
                write_field(&mut writer, "cell1", &record.cell1)?;
                write_field(&mut writer, "cell2", &record.cell2)?;
                write_field(&mut writer, "index1", &record.index1.to_string())?;
                write_field(&mut writer, "index2", &record.index2.to_string())?;
                write_field(&mut writer, "adjacency", &record.adjacency.to_string())?;
                writer.write_event(Event::End(BytesEnd::new("area")))?;
            }
            writer.write_event(Event::End(BytesEnd::new("layer")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("data")))?;
        Ok(())
    }

    pub fn to_xml(&self) -> Result<String, StoreError> {
        let mut out = Vec::new();
        self.write_into(&mut out)?;
        String::from_utf8(out).map_err(|e| StoreError::Schema(e.to_string()))
    }
}

fn layer_name(e: &BytesStart<'_>) -> Result<String, StoreError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"name" {
            return Ok(attr.unescape_value()?.into_owned());
        }
    }
    Err(StoreError::Schema(
        "layer entry missing name attribute".to_string(),
    ))
}

fn write_field<W: std::io::Write>(
    writer: &mut Writer<W>,
    tag: &str,
    text: &str,
) -> Result<(), StoreError> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Cell1,
    Cell2,
    Index1,
    Index2,
    Adjacency,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"cell1" => Some(Field::Cell1),
            b"cell2" => Some(Field::Cell2),
            b"index1" => Some(Field::Index1),
            b"index2" => Some(Field::Index2),
            b"adjacency" => Some(Field::Adjacency),
            _ => None,
        }
    }
}

#[derive(Default)]
struct RecordBuilder {
    cell1: Option<String>,
    cell2: Option<String>,
    index1: Option<u32>,
    index2: Option<u32>,
    adjacency: Option<f64>,
}

impl RecordBuilder {
    fn set(&mut self, field: Field, text: &str) -> Result<(), StoreError> {
        match field {
            Field::Cell1 => self.cell1 = Some(text.to_string()),
            Field::Cell2 => self.cell2 = Some(text.to_string()),
            Field::Index1 => self.index1 = Some(parse_number(field, text)?),
            Field::Index2 => self.index2 = Some(parse_number(field, text)?),
            Field::Adjacency => {
                self.adjacency = Some(
                    text.parse::<f64>()
                        .map_err(|_| bad_number("adjacency", text))?,
                )
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<AdjacencyRecord, StoreError> {
        let missing = |field: &str| StoreError::Schema(format!("area entry missing <{field}>"));
        Ok(AdjacencyRecord {
            cell1: self.cell1.ok_or_else(|| missing("cell1"))?,
            cell2: self.cell2.ok_or_else(|| missing("cell2"))?,
            index1: self.index1.ok_or_else(|| missing("index1"))?,
            index2: self.index2.ok_or_else(|| missing("index2"))?,
            adjacency: self.adjacency.ok_or_else(|| missing("adjacency"))?,
        })
    }
}

fn parse_number(field: Field, text: &str) -> Result<u32, StoreError> {
    let name = match field {
        Field::Index1 => "index1",
        Field::Index2 => "index2",
        _ => "number",
    };
    text.parse::<u32>().map_err(|_| bad_number(name, text))
}

fn bad_number(field: &str, text: &str) -> StoreError {
    StoreError::Schema(format!("bad numeric value for <{field}>: {text:?}"))
}

/// Durable, upsert-by-layer-name store for the result document.
///
/// Every mutation rewrites the whole document through a temporary file in
/// the target directory followed by an atomic rename, so an interruption
/// leaves either the previous revision or the fully-written new one on
/// disk, never a partial write.
pub struct ResultStore {
    path: PathBuf,
    doc: ResultDocument,
}

impl ResultStore {
    /// Load the document at `path`, or create and persist an empty one
    pub fn open_or_create<P: Into<PathBuf>>(path: P) -> Result<Self, StoreError> {
        let path = path.into();
        let mut store = Self {
            path,
            doc: ResultDocument::default(),
        };
        if store.path.exists() {
            let content = fs::read_to_string(&store.path)?;
            store.doc = ResultDocument::from_xml(&content)?;
        } else {
            store.persist()?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &ResultDocument {
        &self.doc
    }

    /// Reserve placeholders for the layers about to be (re)processed and
    /// persist immediately, before any computation starts
    pub fn reserve<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), StoreError> {
        self.doc.reserve(names);
        self.persist()
    }

    /// Replace the entry for `layer` and rewrite the document durably
    pub fn commit(&mut self, layer: &str, records: LayerResult) -> Result<(), StoreError> {
        self.doc.upsert(layer, records);
        self.persist()
    }

    fn persist(&self) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        self.doc.write_into(&mut tmp)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;
        Ok(())
    }
}
