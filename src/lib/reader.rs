use crate::record::Record;
use ahash::AHashMap as HashMap;
use anyhow::{anyhow, bail, Context, Result};
use csv::{ByteRecord, ReaderBuilder};
use itertools::Itertools;
use log::{debug, info};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordField {
    GroupId,
    Subject,
    Clicks,
    Impressions,
}

impl RecordField {
    pub fn all() -> [RecordField; 4] {
        [
            RecordField::GroupId,
            RecordField::Subject,
            RecordField::Clicks,
            RecordField::Impressions,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordField::GroupId => "group_id",
            RecordField::Subject => "subject",
            RecordField::Clicks => "clicks",
            RecordField::Impressions => "impressions",
        }
    }
}

impl FromStr for RecordField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "group_id" | "group" => Ok(RecordField::GroupId),
            "subject" | "subject_id" => Ok(RecordField::Subject),
            "clicks" | "click_count" => Ok(RecordField::Clicks),
            "impressions" | "impression_count" => Ok(RecordField::Impressions),
            _ => Err(anyhow!("Unknown field: {}", s)),
        }
    }
}

/// Column index of every field in the input
#[derive(Debug, Clone)]
pub struct FieldMapping {
    pub mapping: HashMap<RecordField, usize>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self {
            mapping: HashMap::new(),
        }
    }

    pub fn with_field(mut self, field: RecordField, idx: usize) -> Self {
        self.mapping.insert(field, idx);
        self
    }

    pub fn idx(&self, field: RecordField) -> Option<usize> {
        self.mapping.get(&field).copied()
    }

    /// Locate the fields in a header row, unknown columns are ignored.
    pub fn from_header(header: &ByteRecord) -> Result<Self> {
        let mut mapping = FieldMapping::new();
        for (idx, name) in header.iter().enumerate() {
            let name = std::str::from_utf8(name)?.trim();
            if let Ok(field) = name.parse::<RecordField>() {
                mapping = mapping.with_field(field, idx);
            }
        }
        for field in RecordField::all() {
            if mapping.idx(field).is_none() {
                return Err(anyhow!("Missing column in header: {}", field.as_str()));
            }
        }
        Ok(mapping)
    }
}

/// Aggregated counts of one subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectRecord {
    pub subject: String,
    pub record: Record,
}

/// All subjects of one group, ordered by subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordGroup {
    pub group_id: i64,
    pub subjects: Vec<SubjectRecord>,
}

impl RecordGroup {
    pub fn records(&self) -> Vec<Record> {
        self.subjects.iter().map(|s| s.record).collect()
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

/// Merges rows into per-(group, subject) records.
#[derive(Debug, Default)]
pub struct GroupAggregator {
    groups: HashMap<i64, HashMap<String, Record>>,
    rows: usize,
}

impl GroupAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, group_id: i64, subject: &str, record: Record) -> Result<()> {
        let entry = self
            .groups
            .entry(group_id)
            .or_default()
            .entry(subject.to_string())
            .or_insert(Record::ZERO);
        let Some(merged) = entry.checked_merge(&record) else {
            bail!(
                "Counts overflow when merging {} into {} for group {}, subject {}",
                record,
                entry,
                group_id,
                subject
            );
        };
        *entry = merged;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn build(self) -> Vec<RecordGroup> {
        self.groups
            .into_iter()
            .sorted_by_key(|(group_id, _)| *group_id)
            .map(|(group_id, subjects)| RecordGroup {
                group_id,
                subjects: subjects
                    .into_iter()
                    .sorted_by(|a, b| a.0.cmp(&b.0))
                    .map(|(subject, record)| SubjectRecord { subject, record })
                    .collect(),
            })
            .collect()
    }
}

/// Read delimited `group_id, subject, clicks, impressions` rows with a header
/// and merge repeated (group, subject) pairs.
pub fn read_groups<R: Read>(inner: R, delimiter: u8) -> Result<Vec<RecordGroup>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .comment(Some(b'#'))
        .from_reader(inner);
    let field_mapping = FieldMapping::from_header(reader.byte_headers()?)?;

    let mut aggregator = GroupAggregator::new();
    let mut row = ByteRecord::new();
    while reader.read_byte_record(&mut row)? {
        let line = row.position().map(|p| p.line()).unwrap_or_default();
        parse_row(&row, &field_mapping)
            .and_then(|(group_id, subject, record)| aggregator.push(group_id, subject, record))
            .with_context(|| format!("Invalid record on line {}", line))?;
    }
    let rows = aggregator.rows();
    let groups = aggregator.build();
    debug!("Merged {} rows into {} groups", rows, groups.len());
    Ok(groups)
}

pub fn read_groups_from_path(path: &Path, delimiter: u8) -> Result<Vec<RecordGroup>> {
    let file = File::open(path)
        .with_context(|| format!("Could not open records file: {}", path.display()))?;
    let groups = read_groups(file, delimiter)?;
    info!("Loaded {} groups from {}", groups.len(), path.display());
    Ok(groups)
}

fn parse_row<'r>(
    row: &'r ByteRecord,
    field_mapping: &FieldMapping,
) -> Result<(i64, &'r str, Record)> {
    let value = |field: RecordField| -> Result<&'r [u8]> {
        let idx = field_mapping
            .idx(field)
            .ok_or_else(|| anyhow!("No column mapping for {}", field.as_str()))?;
        row.get(idx)
            .ok_or_else(|| anyhow!("Missing value for {}", field.as_str()))
    };

    let group_id = atoi::atoi::<i64>(value(RecordField::GroupId)?)
        .ok_or_else(|| anyhow!("Could not parse group_id"))?;
    let subject = std::str::from_utf8(value(RecordField::Subject)?)?;
    let clicks = atoi::atoi::<i64>(value(RecordField::Clicks)?)
        .ok_or_else(|| anyhow!("Could not parse clicks"))?;
    let impressions = atoi::atoi::<i64>(value(RecordField::Impressions)?)
        .ok_or_else(|| anyhow!("Could not parse impressions"))?;

    Ok((group_id, subject, Record::from_signed(clicks, impressions)?))
}
