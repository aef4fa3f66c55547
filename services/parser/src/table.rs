//! The canonical, analysis-ready table and read-only row selections over it.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use serde::Serialize;

use crate::error::NormalizeError;
use crate::schema::{FieldKind, ANO_REFER, SCHEMA};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum ColumnData {
    Numeric(Vec<f64>),
    Text(Vec<String>),
    Year(Vec<Option<i32>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::Year(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cell_text(&self, row: usize) -> String {
        match self {
            ColumnData::Numeric(v) => v[row].to_string(),
            ColumnData::Text(v) => v[row].clone(),
            ColumnData::Year(v) => v[row].map(|y| y.to_string()).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    #[serde(flatten)]
    pub data: ColumnData,
}

/// Immutable once built. Canonical columns come first, in `SCHEMA` order,
/// followed by any passthrough columns from the source.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CanonicalTable {
    columns: Vec<Column>,
    rows: usize,
}

impl CanonicalTable {
    pub(crate) fn from_columns(columns: Vec<Column>, rows: usize) -> Self {
        debug_assert!(columns.iter().all(|c| c.data.len() == rows));
        Self { columns, rows }
    }

    /// Zero rows, every canonical column present. Stands in for "no data".
    pub fn empty() -> Self {
        let columns = SCHEMA
            .iter()
            .map(|field| Column {
                name: field.name.to_string(),
                data: match field.kind {
                    FieldKind::Numeric => ColumnData::Numeric(Vec::new()),
                    FieldKind::Categorical => ColumnData::Text(Vec::new()),
                    FieldKind::Year => ColumnData::Year(Vec::new()),
                },
            })
            .collect();
        Self { columns, rows: 0 }
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn numeric(&self, name: &str) -> Option<&[f64]> {
        match self.column(name).map(|c| &c.data) {
            Some(ColumnData::Numeric(v)) => Some(v),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&[String]> {
        match self.column(name).map(|c| &c.data) {
            Some(ColumnData::Text(v)) => Some(v),
            _ => None,
        }
    }

    pub fn years(&self) -> Option<&[Option<i32>]> {
        match self.column(ANO_REFER).map(|c| &c.data) {
            Some(ColumnData::Year(v)) => Some(v),
            _ => None,
        }
    }

    pub fn all(&self) -> Selection<'_> {
        Selection {
            table: self,
            rows: (0..self.rows).collect(),
        }
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        (index < self.rows).then_some(Row { table: self, index })
    }

    /// Write the table as comma-delimited UTF-8 with a header row.
    /// Missing years are written as empty cells.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), NormalizeError> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(self.column_names())?;
        for row in 0..self.rows {
            out.write_record(self.columns.iter().map(|c| c.data.cell_text(row)))?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, NormalizeError> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(buf)
    }
}

/// One row of a table, read through canonical field names.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a CanonicalTable,
    index: usize,
}

impl<'a> Row<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Numeric value, `0.0` for unknown or non-numeric columns.
    pub fn num(&self, field: &str) -> f64 {
        self.table.numeric(field).map_or(0.0, |v| v[self.index])
    }

    /// Text value, `""` for unknown or non-text columns.
    pub fn text(&self, field: &str) -> &'a str {
        self.table.text(field).map_or("", |v| v[self.index].as_str())
    }

    pub fn year(&self) -> Option<i32> {
        self.table.years().and_then(|v| v[self.index])
    }
}

/// Read-only view over a subset of rows. Filtering never touches the
/// shared table, so a cached table can back any number of selections.
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    table: &'a CanonicalTable,
    rows: Vec<usize>,
}

impl<'a> Selection<'a> {
    pub fn table(&self) -> &'a CanonicalTable {
        self.table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'a>> + '_ {
        let table = self.table;
        self.rows.iter().map(move |&index| Row { table, index })
    }

    pub fn filter<F>(&self, mut predicate: F) -> Selection<'a>
    where
        F: FnMut(&Row<'a>) -> bool,
    {
        let table = self.table;
        Selection {
            table,
            rows: self
                .rows
                .iter()
                .copied()
                .filter(|&index| predicate(&Row { table, index }))
                .collect(),
        }
    }

    /// Rows whose text column equals `value` exactly. An unknown column
    /// selects nothing.
    pub fn where_eq(&self, field: &str, value: &str) -> Selection<'a> {
        match self.table.text(field) {
            Some(column) => Selection {
                table: self.table,
                rows: self.rows.iter().copied().filter(|&i| column[i] == value).collect(),
            },
            None => self.none(),
        }
    }

    pub fn where_in(&self, field: &str, values: &[String]) -> Selection<'a> {
        match self.table.text(field) {
            Some(column) => Selection {
                table: self.table,
                rows: self
                    .rows
                    .iter()
                    .copied()
                    .filter(|&i| values.iter().any(|v| *v == column[i]))
                    .collect(),
            },
            None => self.none(),
        }
    }

    /// Rows with a parsed fiscal year equal to `year`; rows without a
    /// usable year never match.
    pub fn where_year(&self, year: i32) -> Selection<'a> {
        self.filter(|row| row.year() == Some(year))
    }

    /// Sum of a numeric column, `0.0` over an empty selection or an
    /// unknown column.
    pub fn sum(&self, field: &str) -> f64 {
        match self.table.numeric(field) {
            Some(column) => self.rows.iter().map(|&i| column[i]).sum(),
            None => 0.0,
        }
    }

    pub fn values(&self, field: &str) -> Vec<f64> {
        match self.table.numeric(field) {
            Some(column) => self.rows.iter().map(|&i| column[i]).collect(),
            None => Vec::new(),
        }
    }

    /// Value of the first row, `0.0` when the selection is empty.
    pub fn first(&self, field: &str) -> f64 {
        self.rows().next().map_or(0.0, |row| row.num(field))
    }

    /// Sorted distinct values of a text column.
    pub fn distinct(&self, field: &str) -> Vec<String> {
        match self.table.text(field) {
            Some(column) => self
                .rows
                .iter()
                .map(|&i| column[i].as_str())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Sorted distinct fiscal years, ignoring rows without one.
    pub fn years(&self) -> Vec<i32> {
        self.rows()
            .filter_map(|row| row.year())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn group_by(&self, field: &str) -> BTreeMap<String, Selection<'a>> {
        let mut groups: BTreeMap<String, Selection<'a>> = BTreeMap::new();
        if let Some(column) = self.table.text(field) {
            for &i in &self.rows {
                groups
                    .entry(column[i].clone())
                    .or_insert_with(|| self.none())
                    .rows
                    .push(i);
            }
        }
        groups
    }

    /// Groups by fiscal year; rows without a usable year are left out.
    pub fn group_by_year(&self) -> BTreeMap<i32, Selection<'a>> {
        let mut groups: BTreeMap<i32, Selection<'a>> = BTreeMap::new();
        for row in self.rows() {
            if let Some(year) = row.year() {
                groups.entry(year).or_insert_with(|| self.none()).rows.push(row.index);
            }
        }
        groups
    }

    fn none(&self) -> Selection<'a> {
        Selection {
            table: self.table,
            rows: Vec::new(),
        }
    }
}
