//! The flat per-face output table and its CSV / JSON writers.

use std::io::Write;
use std::path::Path;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::geometry::coords::{BBox, LandmarkSet};
use crate::identity::domain::identity_grouper::{identity_label, IdentityGrouper};
use crate::prediction::domain::detection::POSE_DOF;
use crate::prediction::domain::predictors::ModelInfo;
use crate::shared::constants::{
    AU_COLUMNS, EMOTION_COLUMNS, FACEBOX_COLUMNS, FACEPOSE_COLUMNS, IDENTITY_WIDTH, NUM_LANDMARKS,
};
use crate::shared::video_metadata::VideoMetadata;

/// One face instance (or the sentinel for a frame without faces).
#[derive(Clone, Debug, PartialEq)]
pub struct ResultRow<S> {
    pub face_box: BBox<S>,
    pub face_score: f64,
    pub landmarks: LandmarkSet<S>,
    pub pose: [f64; POSE_DOF],
    pub action_units: [f32; AU_COLUMNS.len()],
    pub emotions: [f32; EMOTION_COLUMNS.len()],
    pub identity_embedding: Vec<f32>,
    pub input: String,
    pub frame: usize,
    pub frame_height: u32,
    pub frame_width: u32,
    pub approx_time: Option<String>,
    pub identity: Option<String>,
}

/// A single output cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Cell<'a> {
    Number(f64),
    Text(Option<&'a str>),
}

impl<S> ResultRow<S> {
    /// Moves the row into another coordinate space with already-transformed
    /// spatial values.
    pub fn reproject<T>(self, face_box: BBox<T>, landmarks: LandmarkSet<T>) -> ResultRow<T> {
        ResultRow {
            face_box,
            face_score: self.face_score,
            landmarks,
            pose: self.pose,
            action_units: self.action_units,
            emotions: self.emotions,
            identity_embedding: self.identity_embedding,
            input: self.input,
            frame: self.frame,
            frame_height: self.frame_height,
            frame_width: self.frame_width,
            approx_time: self.approx_time,
            identity: self.identity,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.face_box.is_nan()
    }

    /// Values in [`column_names`] order.
    pub fn cells(&self) -> Vec<Cell<'_>> {
        let mut cells = Vec::with_capacity(column_count());
        let b = &self.face_box;
        cells.extend([b.x, b.y, b.width, b.height, self.face_score].map(Cell::Number));
        cells.extend(self.landmarks.flatten_x_then_y().into_iter().map(Cell::Number));
        cells.extend(self.pose.iter().map(|v| Cell::Number(*v)));
        let floats = self
            .action_units
            .iter()
            .chain(self.emotions.iter())
            .chain(self.identity_embedding.iter());
        cells.extend(floats.map(|v| Cell::Number(*v as f64)));
        cells.push(Cell::Text(Some(&self.input)));
        cells.push(Cell::Number(self.frame as f64));
        cells.push(Cell::Number(self.frame_height as f64));
        cells.push(Cell::Number(self.frame_width as f64));
        cells.push(Cell::Text(self.approx_time.as_deref()));
        cells.push(Cell::Text(self.identity.as_deref()));
        cells
    }
}

/// The fixed, capability-independent column schema.
pub fn column_names() -> Vec<String> {
    let mut names: Vec<String> = FACEBOX_COLUMNS.iter().map(|s| s.to_string()).collect();
    names.extend((0..NUM_LANDMARKS).map(|i| format!("x_{i}")));
    names.extend((0..NUM_LANDMARKS).map(|i| format!("y_{i}")));
    names.extend(FACEPOSE_COLUMNS.iter().map(|s| s.to_string()));
    names.extend(AU_COLUMNS.iter().map(|s| s.to_string()));
    names.extend(EMOTION_COLUMNS.iter().map(|s| s.to_string()));
    names.extend((1..=IDENTITY_WIDTH).map(|i| format!("Identity_{i}")));
    names.extend(
        ["input", "frame", "FrameHeight", "FrameWidth", "approx_time", "Identity"]
            .iter()
            .map(|s| s.to_string()),
    );
    names
}

pub fn column_count() -> usize {
    FACEBOX_COLUMNS.len()
        + 2 * NUM_LANDMARKS
        + FACEPOSE_COLUMNS.len()
        + AU_COLUMNS.len()
        + EMOTION_COLUMNS.len()
        + IDENTITY_WIDTH
        + 6
}

impl<S> Serialize for ResultRow<S> {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        let names = column_names();
        let cells = self.cells();
        let mut map = serializer.serialize_map(Some(names.len()))?;
        for (name, cell) in names.iter().zip(cells) {
            match cell {
                Cell::Number(v) => map.serialize_entry(name, &v)?,
                Cell::Text(t) => map.serialize_entry(name, &t)?,
            }
        }
        map.end()
    }
}

/// Rows in input-frame order, then detection order within a frame.
///
/// `S` is the coordinate space of the spatial columns; only a
/// `ResultTable<ImageSpace>` leaves the analyzer.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultTable<S> {
    rows: Vec<ResultRow<S>>,
    model_info: ModelInfo,
}

impl<S> ResultTable<S> {
    pub fn new(model_info: ModelInfo) -> Self {
        Self {
            rows: Vec::new(),
            model_info,
        }
    }

    pub fn from_rows(rows: Vec<ResultRow<S>>, model_info: ModelInfo) -> Self {
        Self { rows, model_info }
    }

    pub fn push(&mut self, row: ResultRow<S>) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[ResultRow<S>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<ResultRow<S>> {
        self.rows
    }

    pub fn model_info(&self) -> &ModelInfo {
        &self.model_info
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends tables in order. Provenance comes from the first table.
    pub fn concat(tables: impl IntoIterator<Item = ResultTable<S>>) -> Self {
        let mut iter = tables.into_iter();
        let Some(mut out) = iter.next() else {
            return Self::new(ModelInfo::default());
        };
        for table in iter {
            out.rows.extend(table.rows);
        }
        out
    }

    /// Numeric values of one column, `None` for unknown or text columns.
    pub fn numeric_column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = column_names().iter().position(|n| n == name)?;
        self.rows
            .iter()
            .map(|row| match row.cells()[idx] {
                Cell::Number(v) => Some(v),
                Cell::Text(_) => None,
            })
            .collect()
    }

    pub fn frames(&self) -> Vec<usize> {
        self.rows.iter().map(|r| r.frame).collect()
    }

    /// Fills `approx_time` from each row's native frame index.
    pub fn set_approx_times(&mut self, metadata: &VideoMetadata) {
        for row in &mut self.rows {
            row.approx_time = Some(metadata.approx_time(row.frame));
        }
    }

    /// Labels each row with its identity cluster; rows without a usable
    /// embedding stay unlabelled.
    pub fn assign_identities(&mut self, grouper: &dyn IdentityGrouper) {
        let embeddings: Vec<Option<Vec<f32>>> = self
            .rows
            .iter()
            .map(|r| {
                let usable = r.identity_embedding.iter().all(|v| v.is_finite());
                usable.then(|| r.identity_embedding.clone())
            })
            .collect();
        for (row, label) in self.rows.iter_mut().zip(grouper.group(&embeddings)) {
            row.identity = label.map(identity_label);
        }
    }

    /// Header plus one record per row; NaN is written as `NaN`, absent
    /// text as an empty field.
    pub fn write_csv_to(&self, out: impl Write) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(column_names())?;
        for row in &self.rows {
            writer.write_record(row.cells().into_iter().map(cell_text))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let file = std::fs::File::create(path)?;
        self.write_csv_to(std::io::BufWriter::new(file))?;
        Ok(())
    }

    /// Array of objects keyed by column name, NaN as `null`.
    pub fn write_json(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        serde_json::to_writer(&mut writer, &self.rows)?;
        writer.flush()?;
        Ok(())
    }
}

fn cell_text(cell: Cell<'_>) -> String {
    match cell {
        Cell::Number(v) if v.is_nan() => "NaN".to_string(),
        Cell::Number(v) => v.to_string(),
        Cell::Text(t) => t.unwrap_or_default().to_string(),
    }
}
