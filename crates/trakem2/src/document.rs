use std::collections::HashMap;
use std::fs;
use std::path::Path;

use geo_types::{Coord, coord};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::boundary::{AreaBoundary, scale_rect};
use crate::{Result, Trakem2Error};

/// One section of the stack. Addressed externally by `name`, the title of
/// the layer's first image patch; `id` is the internal element oid that
/// area lists reference.
#[derive(Debug, Clone)]
struct Trakem2Layer {
    id: String,
    name: Option<String>,
}

/// The outlines one area list draws on one layer
#[derive(Debug, Clone)]
struct LayerAreas {
    layer_id: String,
    outlines: Vec<Vec<Coord<f64>>>,
}

/// A named area list: an anatomical label plus its per-layer outlines
#[derive(Debug, Clone)]
struct AreaList {
    name: String,
    transform: [f64; 6],
    areas: Vec<LayerAreas>,
}

const IDENTITY: [f64; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// A read-only parsed view of a TrakEM2 project file.
///
/// Each worker opens its own document; nothing here is shared or mutated
/// after parsing.
#[derive(Debug, Clone)]
pub struct Trakem2Document {
    layers: Vec<Trakem2Layer>,
    area_lists: Vec<AreaList>,
}

impl Trakem2Document {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_xml(&content)
    }

    pub fn from_xml(content: &str) -> Result<Self> {
        let mut reader = Reader::from_str(content);
        reader.trim_text(true);

        let mut layers: Vec<Trakem2Layer> = Vec::new();
        let mut area_lists: Vec<AreaList> = Vec::new();
        let mut in_layer = false;
        let mut current_list: Option<AreaList> = None;
        let mut current_area: Option<LayerAreas> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.name().as_ref() {
                    b"t2_layer" => {
                        layers.push(Trakem2Layer {
                            id: require_attr(&e, "oid")?,
                            name: None,
                        });
                        in_layer = true;
                    }
                    b"t2_patch" => assign_patch_title(&e, in_layer, &mut layers)?,
                    b"t2_area_list" => {
                        current_list = Some(AreaList {
                            name: require_attr(&e, "title")?,
                            transform: parse_transform(attr(&e, "transform")?)?,
                            areas: Vec::new(),
                        });
                    }
                    b"t2_area" => {
                        current_area = Some(LayerAreas {
                            layer_id: require_attr(&e, "layer_id")?,
                            outlines: Vec::new(),
                        });
                    }
                    b"t2_path" => push_path(&e, &mut current_area)?,
                    _ => {}
                },
                // Leaf elements are usually self-closed in TrakEM2 output
                Event::Empty(e) => match e.name().as_ref() {
                    b"t2_patch" => assign_patch_title(&e, in_layer, &mut layers)?,
                    b"t2_path" => push_path(&e, &mut current_area)?,
                    _ => {}
                },
                Event::End(e) => match e.name().as_ref() {
                    b"t2_layer" => in_layer = false,
                    b"t2_area" => {
                        if let (Some(area), Some(list)) = (current_area.take(), &mut current_list)
                        {
                            list.areas.push(area);
                        }
                    }
                    b"t2_area_list" => {
                        if let Some(list) = current_list.take() {
                            area_lists.push(list);
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(Self { layers, area_lists })
    }

    /// Layer names in document order (layers without an image patch title
    /// cannot be addressed and are omitted)
    pub fn layer_names(&self) -> Vec<String> {
        self.layers
            .iter()
            .filter_map(|layer| layer.name.clone())
            .collect()
    }

    /// Number of area lists in the project
    pub fn area_list_count(&self) -> usize {
        self.area_lists.len()
    }

    /// Boundaries in `layer` with area at least `area_threshold`, carrying
    /// bounding boxes scaled by `bbox_scale`.
    ///
    /// Outline points are mapped through the owning area list's affine
    /// transform. Indices number every outline of a given name within the
    /// layer, counted before thresholding, so an outline keeps its index
    /// when the threshold changes.
    pub fn boundaries_in_layer(
        &self,
        layer: &str,
        area_threshold: f64,
        bbox_scale: f64,
    ) -> Result<Vec<AreaBoundary>> {
        let layer_id = &self
            .layers
            .iter()
            .find(|l| l.name.as_deref() == Some(layer))
            .ok_or_else(|| Trakem2Error::UnknownLayer(layer.to_string()))?
            .id;

        let mut indices: HashMap<&str, u32> = HashMap::new();
        let mut boundaries = Vec::new();
        for list in &self.area_lists {
            for area in list.areas.iter().filter(|a| &a.layer_id == layer_id) {
                for outline in &area.outlines {
                    let index = indices.entry(list.name.as_str()).or_insert(0);
                    let current = *index;
                    *index += 1;

                    let mapped: Vec<Coord<f64>> = outline
                        .iter()
                        .map(|p| apply_transform(&list.transform, p))
                        .collect();
                    let Some(mut boundary) =
                        AreaBoundary::from_outline(list.name.clone(), current, mapped)
                    else {
                        continue;
                    };
                    if boundary.area() < area_threshold {
                        continue;
                    }
                    boundary.bbox = scale_rect(&boundary.bbox, bbox_scale);
                    boundaries.push(boundary);
                }
            }
        }
        Ok(boundaries)
    }
}

fn assign_patch_title(
    e: &BytesStart<'_>,
    in_layer: bool,
    layers: &mut [Trakem2Layer],
) -> Result<()> {
    if !in_layer {
        return Ok(());
    }
    if let Some(layer) = layers.last_mut() {
        if layer.name.is_none() {
            layer.name = attr(e, "title")?;
        }
    }
    Ok(())
}

fn push_path(e: &BytesStart<'_>, current_area: &mut Option<LayerAreas>) -> Result<()> {
    let Some(area) = current_area else {
        // Paths outside an area (e.g. profiles) are not area-list boundaries
        return Ok(());
    };
    let d = require_attr(e, "d")?;
    area.outlines.push(parse_path_points(&d)?);
    Ok(())
}

fn attr(e: &BytesStart<'_>, key: &str) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn require_attr(e: &BytesStart<'_>, key: &str) -> Result<String> {
    attr(e, key)?.ok_or_else(|| Trakem2Error::MissingAttribute {
        element: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
        attribute: key.to_string(),
    })
}

/// Parse an optional `matrix(a,b,c,d,e,f)` affine transform attribute
fn parse_transform(value: Option<String>) -> Result<[f64; 6]> {
    let Some(value) = value else {
        return Ok(IDENTITY);
    };
    let inner = value
        .trim()
        .strip_prefix("matrix(")
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| Trakem2Error::BadTransform(value.clone()))?;
    let terms: Vec<f64> = inner
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| Trakem2Error::BadTransform(value.clone()))?;
    let terms: [f64; 6] = terms
        .try_into()
        .map_err(|_| Trakem2Error::BadTransform(value.clone()))?;
    Ok(terms)
}

fn apply_transform(m: &[f64; 6], p: &Coord<f64>) -> Coord<f64> {
    coord! {
        x: m[0] * p.x + m[2] * p.y + m[4],
        y: m[1] * p.x + m[3] * p.y + m[5],
    }
}

/// Decode the point list of an SVG-style path (`M x y L x y ... z`).
///
/// Only the coordinates matter for adjacency; command letters are skipped
/// and the closing `z` is implicit in how outlines are used.
fn parse_path_points(d: &str) -> Result<Vec<Coord<f64>>> {
    let mut points = Vec::new();
    let mut pending: Option<f64> = None;
    for token in d
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
    {
        if token.chars().all(|c| c.is_ascii_alphabetic()) {
            if pending.is_some() {
                return Err(Trakem2Error::BadPath(d.to_string()));
            }
            continue;
        }
        let value: f64 = token
            .parse()
            .map_err(|_| Trakem2Error::BadPath(d.to_string()))?;
        match pending.take() {
            None => pending = Some(value),
            Some(x) => points.push(coord! { x: x, y: value }),
        }
    }
    if pending.is_some() {
        return Err(Trakem2Error::BadPath(d.to_string()));
    }
    Ok(points)
}
