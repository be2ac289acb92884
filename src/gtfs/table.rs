use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::gtfs::error::Error;

/// A single cell of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Text(String),
    Null,
}

impl Value {
    /// Textual form used to compare join keys, so that `12` and `"12"` match.
    pub fn key(&self) -> Option<String> {
        match self {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Null => Ok(()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

/// Inferred primitive type of a column.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
pub enum DataType {
    Integer,
    Float,
    Text,
    /// The column holds no value at all
    Unknown,
}

impl DataType {
    /// Infers the type of a column of already typed values.
    ///
    /// Integers mixed with nulls or floats widen to `Float`, any text makes the
    /// whole column `Text`.
    pub fn infer<'a, I>(values: I) -> DataType
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut seen_integer = false;
        let mut seen_float = false;
        let mut seen_null = false;
        for value in values {
            match value {
                Value::Text(_) => return DataType::Text,
                Value::Integer(_) => seen_integer = true,
                Value::Float(_) => seen_float = true,
                Value::Null => seen_null = true,
            }
        }
        match (seen_integer, seen_float, seen_null) {
            (false, false, _) => DataType::Unknown,
            (true, false, false) => DataType::Integer,
            _ => DataType::Float,
        }
    }

    /// Infers the type of a column of raw CSV cells.
    pub fn infer_text<'a, I>(cells: I) -> DataType
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut all_integer = true;
        let mut all_float = true;
        let mut any_empty = false;
        let mut any_value = false;
        for cell in cells {
            let cell = cell.trim();
            if cell.is_empty() {
                any_empty = true;
                continue;
            }
            any_value = true;
            if all_integer && cell.parse::<i64>().is_err() {
                // ids too wide for i64 would lose digits as floats
                if is_integer_literal(cell) {
                    return DataType::Text;
                }
                all_integer = false;
            }
            if all_float && cell.parse::<f64>().is_err() {
                all_float = false;
            }
            if !all_float {
                return DataType::Text;
            }
        }
        if !any_value {
            DataType::Unknown
        } else if all_integer && !any_empty {
            DataType::Integer
        } else {
            DataType::Float
        }
    }

    /// Converts a raw cell into a value of this type.
    ///
    /// Callers are expected to pass cells this type was inferred from, a cell
    /// that does not parse becomes text.
    pub fn parse_cell(self, cell: &str) -> Value {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }
        match self {
            DataType::Integer => trimmed
                .parse()
                .map(Value::Integer)
                .unwrap_or_else(|_| Value::Text(cell.to_owned())),
            DataType::Float => trimmed
                .parse()
                .map(Value::Float)
                .unwrap_or_else(|_| Value::Text(cell.to_owned())),
            DataType::Text => Value::Text(cell.to_owned()),
            DataType::Unknown => Value::Null,
        }
    }
}

fn is_integer_literal(cell: &str) -> bool {
    let digits = cell.strip_prefix(['+', '-']).unwrap_or(cell);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
}

/// An ordered set of named values, the "row as a dictionary" view of a table.
///
/// Inserting an existing name overwrites the value in place, new names are
/// appended, so column order follows first appearance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Record {
        Record::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn insert<S: Into<String>>(&mut self, name: S, value: Value) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Copies every field of `other` into this record.
    pub fn update(&mut self, other: &Record) {
        for (name, value) in other.iter() {
            self.insert(name, value.clone());
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (S, Value)>>(iter: T) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

/// Borrowed view of one table row.
#[derive(Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [Column],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .map(|i| &self.values[i])
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    pub fn to_record(&self) -> Record {
        self.columns
            .iter()
            .zip(self.values.iter())
            .map(|(col, v)| (col.name.clone(), v.clone()))
            .collect()
    }
}

/// In-memory table with named, typed columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Builds a table from typed rows, inferring the type of each column.
    /// Short rows are padded with nulls, long rows truncated.
    pub fn from_rows(names: Vec<String>, rows: Vec<Vec<Value>>) -> Table {
        let width = names.len();
        let rows: Vec<Vec<Value>> = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Null);
                row
            })
            .collect();
        let columns = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Column {
                data_type: DataType::infer(rows.iter().map(|row| &row[i])),
                name,
            })
            .collect();
        Table { columns, rows }
    }

    /// Builds a table from raw text cells, typing each column as a whole.
    pub fn from_text(names: Vec<String>, records: Vec<Vec<String>>) -> Table {
        let columns: Vec<Column> = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Column {
                data_type: DataType::infer_text(
                    records
                        .iter()
                        .map(|rec| rec.get(i).map(String::as_str).unwrap_or("")),
                ),
                name,
            })
            .collect();
        let rows = records
            .iter()
            .map(|rec| {
                columns
                    .iter()
                    .enumerate()
                    .map(|(i, col)| {
                        col.data_type
                            .parse_cell(rec.get(i).map(String::as_str).unwrap_or(""))
                    })
                    .collect()
            })
            .collect();
        Table { columns, rows }
    }

    /// Builds a table from records; columns are ordered by first appearance.
    pub fn from_records(records: Vec<Record>) -> Table {
        let mut names: Vec<String> = Vec::new();
        let mut known = HashSet::new();
        for record in &records {
            for key in record.keys() {
                if known.insert(key.to_owned()) {
                    names.push(key.to_owned());
                }
            }
        }
        let rows = records
            .iter()
            .map(|record| {
                names
                    .iter()
                    .map(|n| record.get(n).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Table::from_rows(names, rows)
    }

    /// Stacks tables on top of each other. Columns are the union of all
    /// columns in first appearance order; missing cells are null and types are
    /// inferred again over the combined rows.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut names: Vec<String> = Vec::new();
        for table in &tables {
            for col in &table.columns {
                if !names.contains(&col.name) {
                    names.push(col.name.clone());
                }
            }
        }
        let mut rows = Vec::with_capacity(tables.iter().map(Table::len).sum());
        for table in tables {
            let positions: Vec<Option<usize>> =
                names.iter().map(|n| table.column_index(n)).collect();
            for row in table.rows {
                rows.push(
                    positions
                        .iter()
                        .map(|pos| match pos {
                            Some(i) => row[*i].clone(),
                            None => Value::Null,
                        })
                        .collect(),
                );
            }
        }
        Table::from_rows(names, rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_type(&self, name: &str) -> Option<DataType> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.data_type)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn require_column(&self, name: &str) -> Result<usize, Error> {
        self.column_index(name)
            .ok_or_else(|| Error::MissingColumn(name.to_owned()))
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, name: &str) -> Option<Vec<&Value>> {
        let i = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[i]).collect())
    }

    /// Renames a column; returns false when `from` does not exist.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.columns.iter_mut().find(|c| c.name == from) {
            Some(col) => {
                col.name = to.to_owned();
                true
            }
            None => false,
        }
    }

    /// Moves the named columns, in the given order, before all others.
    /// Unknown names are ignored.
    pub fn move_to_front(&mut self, names: &[&str]) {
        let mut order: Vec<usize> = names.iter().filter_map(|n| self.column_index(n)).collect();
        let rest: Vec<usize> = (0..self.columns.len())
            .filter(|i| !order.contains(i))
            .collect();
        order.extend(rest);
        self.columns = order.iter().map(|&i| self.columns[i].clone()).collect();
        for row in self.rows.iter_mut() {
            *row = order.iter().map(|&i| row[i].clone()).collect();
        }
    }

    /// Sets `name` to `value` on every row, adding the column if needed.
    pub fn push_column(&mut self, name: &str, value: Value) {
        match self.column_index(name) {
            Some(i) => {
                for row in self.rows.iter_mut() {
                    row[i] = value.clone();
                }
            }
            None => {
                self.columns.push(Column {
                    name: name.to_owned(),
                    data_type: DataType::Unknown,
                });
                for row in self.rows.iter_mut() {
                    row.push(value.clone());
                }
            }
        }
        if let Some(i) = self.column_index(name) {
            self.columns[i].data_type = DataType::infer(self.rows.iter().map(|row| &row[i]));
        }
    }

    /// Rows whose `column` equals `value` (compared by key), in table order.
    /// Null selects the rows where the column is null.
    pub fn select_eq(&self, column: &str, value: &Value) -> Table {
        let key = value.key();
        let rows = match self.column_index(column) {
            Some(i) => self
                .rows
                .iter()
                .filter(|row| row[i].key() == key)
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Table {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Distinct values of a column in first appearance order.
    pub fn distinct(&self, column: &str) -> Vec<Value> {
        let mut seen = HashSet::new();
        let mut values = Vec::new();
        if let Some(i) = self.column_index(column) {
            for row in &self.rows {
                if seen.insert(row[i].key()) {
                    values.push(row[i].clone());
                }
            }
        }
        values
    }

    /// Positions of the rows for every non-null key of `column`, in row order.
    pub fn index_by(&self, column: &str) -> Result<HashMap<String, Vec<usize>>, Error> {
        let i = self.require_column(column)?;
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (pos, row) in self.rows.iter().enumerate() {
            if let Some(key) = row[i].key() {
                index.entry(key).or_default().push(pos);
            }
        }
        Ok(index)
    }

    /// Maps each key of `column` to the first row holding it. The key column
    /// itself is left out of the records.
    pub fn lookup_first(&self, column: &str) -> Result<HashMap<String, Record>, Error> {
        let i = self.require_column(column)?;
        let mut lookup = HashMap::new();
        for row in &self.rows {
            if let Some(key) = row[i].key() {
                lookup.entry(key).or_insert_with(|| {
                    self.columns
                        .iter()
                        .zip(row.iter())
                        .enumerate()
                        .filter(|(j, _)| *j != i)
                        .map(|(_, (col, v))| (col.name.clone(), v.clone()))
                        .collect::<Record>()
                });
            }
        }
        Ok(lookup)
    }

    /// Keeps the first row of every distinct key tuple, in order of first
    /// appearance. Rows with a null in any key column are dropped; the number
    /// of dropped rows is returned alongside the table.
    pub fn group_first(&self, keys: &[&str]) -> Result<(Table, usize), Error> {
        let positions = keys
            .iter()
            .map(|k| self.require_column(k))
            .collect::<Result<Vec<_>, _>>()?;
        let mut seen = HashSet::new();
        let mut rows = Vec::new();
        let mut skipped = 0;
        for row in &self.rows {
            let tuple: Option<Vec<String>> = positions.iter().map(|&i| row[i].key()).collect();
            match tuple {
                Some(tuple) => {
                    if seen.insert(tuple) {
                        rows.push(row.clone());
                    }
                }
                None => skipped += 1,
            }
        }
        let names = self.columns.iter().map(|c| c.name.clone()).collect();
        Ok((Table::from_rows(names, rows), skipped))
    }

    /// Left join on `on`, taking the first matching row of `right`. Rows
    /// without a match get nulls. Right columns whose name is already used on
    /// the left are suffixed with `suffix`.
    pub fn left_join_first(&self, right: &Table, on: &str, suffix: &str) -> Result<Table, Error> {
        let left_key = self.require_column(on)?;
        let lookup = right.lookup_first(on)?;
        let right_names: Vec<String> = right
            .columns
            .iter()
            .filter(|c| c.name != on)
            .map(|c| c.name.clone())
            .collect();
        let mut names: Vec<String> = self.columns.iter().map(|c| c.name.clone()).collect();
        for name in &right_names {
            if names.contains(name) {
                names.push(format!("{name}{suffix}"));
            } else {
                names.push(name.clone());
            }
        }
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let matched = row[left_key].key().and_then(|k| lookup.get(&k));
                let mut out = row.clone();
                out.extend(right_names.iter().map(|n| {
                    matched
                        .and_then(|rec| rec.get(n))
                        .cloned()
                        .unwrap_or(Value::Null)
                }));
                out
            })
            .collect();
        Ok(Table::from_rows(names, rows))
    }

    pub fn records(&self) -> Vec<Record> {
        self.iter().map(|row| row.to_record()).collect()
    }
}
