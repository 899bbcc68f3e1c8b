//! Record normalization: turns a [`RawTable`] into clean, uniquely keyed
//! documents.
//!
//! Column-wide decisions (which rule applies to each column, how untouched
//! columns are typed, whether the exclude column exists) are made once when
//! the document iterator is built. Rows are then converted lazily, one per
//! call to `next`, in source order.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::NormalizeConfig;
use crate::constants::UNKNOWN_SENTINEL;
use crate::domain::{CleanDocument, RawRecord, RawTable};
use crate::error::{IndexerError, Result};

static CURRENCY_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[$,]").expect("valid currency regex"));

/// Replacement for a missing cell.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FillValue {
    Number(f64),
    Text(String),
}

impl FillValue {
    fn to_json(&self) -> Value {
        match self {
            FillValue::Number(n) => number_value(*n),
            FillValue::Text(s) => Value::String(s.clone()),
        }
    }
}

/// Everything the normalizer needs to clean one table.
#[derive(Debug, Clone, PartialEq)]
pub struct CleaningRules {
    /// Per-column fill for missing cells
    pub fills: BTreeMap<String, FillValue>,
    /// Column holding values like `$1,234.50`
    pub currency_column: String,
    /// Column holding values like `12.5%`
    pub percent_column: String,
    /// Column dropped from every document, if present in the table
    pub exclude_column: Option<String>,
    /// Column whose value becomes the document id
    pub id_column: String,
}

impl CleaningRules {
    /// Rules for the employee sample export, with nothing excluded.
    pub fn employee_defaults() -> Self {
        NormalizeConfig::default().cleaning_rules(None)
    }

    pub fn excluding(mut self, column: Option<&str>) -> Self {
        self.exclude_column = column.map(|c| c.to_string());
        self
    }
}

/// Counters collected while documents are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub rows: usize,
    /// Missing cells replaced by a configured fill
    pub filled: usize,
    /// Present currency/percentage values that could not be parsed
    pub coerced_to_zero: usize,
    /// Missing cells with no configured fill, replaced by the sentinel
    pub unknown_filled: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Float,
    Text,
}

#[derive(Debug, Clone)]
enum ColumnRule {
    Currency,
    Percent,
    Fill(FillValue, ColumnKind),
    Typed(ColumnKind),
}

#[derive(Debug, Clone)]
struct ColumnPlan {
    index: usize,
    name: String,
    rule: ColumnRule,
}

pub struct RecordNormalizer {
    rules: CleaningRules,
}

impl RecordNormalizer {
    pub fn new(rules: CleaningRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &CleaningRules {
        &self.rules
    }

    /// Lazily convert every row of `table` into a [`CleanDocument`].
    ///
    /// Each item is `Err(MissingIdentifier)` when the identifier column is not
    /// part of the document (absent from the table, or excluded).
    pub fn documents<'a>(&self, table: &'a RawTable) -> Documents<'a> {
        let excluded = self
            .rules
            .exclude_column
            .as_deref()
            .filter(|c| table.has_column(c));

        match (&self.rules.exclude_column, excluded) {
            (Some(requested), None) => debug!(column = %requested, "Exclude column not present, nothing dropped"),
            (_, Some(column)) => debug!(column = %column, "Dropping column"),
            _ => {}
        }

        let plan = table
            .columns
            .iter()
            .enumerate()
            .filter(|(_, name)| Some(name.as_str()) != excluded)
            .map(|(index, name)| ColumnPlan {
                index,
                name: name.clone(),
                rule: self.rule_for(table, index, name),
            })
            .collect();

        Documents {
            rows: table.rows.iter(),
            plan,
            id_column: self.rules.id_column.clone(),
            stats: NormalizeStats::default(),
        }
    }

    fn rule_for(&self, table: &RawTable, index: usize, name: &str) -> ColumnRule {
        if name == self.rules.currency_column {
            ColumnRule::Currency
        } else if name == self.rules.percent_column {
            ColumnRule::Percent
        } else {
            let kind = infer_kind(table, index);
            match self.rules.fills.get(name) {
                Some(fill) => ColumnRule::Fill(fill.clone(), kind),
                None => ColumnRule::Typed(kind),
            }
        }
    }
}

/// Iterator over the documents of one table. See [`RecordNormalizer::documents`].
pub struct Documents<'a> {
    rows: std::slice::Iter<'a, RawRecord>,
    plan: Vec<ColumnPlan>,
    id_column: String,
    stats: NormalizeStats,
}

impl<'a> Documents<'a> {
    pub fn stats(&self) -> NormalizeStats {
        self.stats
    }

    /// Names of the columns that end up in each document.
    pub fn columns(&self) -> Vec<&str> {
        self.plan.iter().map(|p| p.name.as_str()).collect()
    }

    fn build(&mut self, row: &RawRecord) -> Result<CleanDocument> {
        self.stats.rows += 1;
        let mut body = Map::with_capacity(self.plan.len());

        for column in &self.plan {
            let cell = row.cells.get(column.index).and_then(|c| c.as_deref());
            let value = match (&column.rule, cell) {
                (ColumnRule::Currency, Some(text)) => coerce_or_zero(
                    &mut self.stats,
                    &column.name,
                    row.line,
                    text,
                    &CURRENCY_NOISE.replace_all(text, ""),
                ),
                (ColumnRule::Percent, Some(text)) => {
                    coerce_or_zero(&mut self.stats, &column.name, row.line, text, &text.replace('%', ""))
                }
                (ColumnRule::Currency | ColumnRule::Percent, None) => Value::from(0.0),
                (ColumnRule::Fill(_, kind) | ColumnRule::Typed(kind), Some(text)) => typed_value(text, *kind),
                (ColumnRule::Fill(fill, _), None) => {
                    self.stats.filled += 1;
                    fill.to_json()
                }
                (ColumnRule::Typed(_), None) => {
                    self.stats.unknown_filled += 1;
                    Value::String(UNKNOWN_SENTINEL.to_string())
                }
            };
            body.insert(column.name.clone(), value);
        }

        let id = match body.get(&self.id_column) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => {
                return Err(IndexerError::MissingIdentifier {
                    line: row.line,
                    column: self.id_column.clone(),
                })
            }
        };

        Ok(CleanDocument { id, body })
    }
}

impl<'a> Iterator for Documents<'a> {
    type Item = Result<CleanDocument>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(self.build(row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

/// Parse a stripped currency/percentage value as a float; anything else is 0.
fn coerce_or_zero(
    stats: &mut NormalizeStats,
    column: &str,
    line: usize,
    original: &str,
    stripped: &str,
) -> Value {
    match parse_number(stripped) {
        Some(n) => Value::from(n),
        None => {
            stats.coerced_to_zero += 1;
            debug!(column, line, value = original, "Unparseable numeric value, using 0");
            Value::from(0.0)
        }
    }
}

fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// JSON number for `n`, written as an integer when it has no fractional part.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

fn typed_value(text: &str, kind: ColumnKind) -> Value {
    match kind {
        ColumnKind::Integer => text
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        ColumnKind::Float => parse_number(text)
            .map(Value::from)
            .unwrap_or_else(|| Value::String(text.to_string())),
        ColumnKind::Text => Value::String(text.to_string()),
    }
}

/// Type a column from its present cells: integers, then floats, else text.
fn infer_kind(table: &RawTable, index: usize) -> ColumnKind {
    let mut present = table
        .rows
        .iter()
        .filter_map(|r| r.cells.get(index).and_then(|c| c.as_deref()))
        .peekable();

    if present.peek().is_none() {
        return ColumnKind::Text;
    }

    let mut kind = ColumnKind::Integer;
    for cell in present {
        if kind == ColumnKind::Integer && cell.trim().parse::<i64>().is_err() {
            kind = ColumnKind::Float;
        }
        if kind == ColumnKind::Float && parse_number(cell).is_none() {
            return ColumnKind::Text;
        }
    }
    kind
}
