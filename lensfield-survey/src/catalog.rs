//! Strong-lens catalog loading.
//!
//! Reads a CSV export of a lens compilation: one header row naming the
//! columns, `#` comment lines anywhere, optionally quoted fields. Columns
//! are located by name, so exports with extra or reordered columns load
//! unchanged.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use lensfield_core::SkyPoint;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SurveyError};
use crate::sampler::ExclusionSet;

/// Header names of the columns the loader reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogColumns {
    /// Optional; rows are named `lens-<line>` when absent.
    pub name: String,
    pub ra: String,
    pub dec: String,
    pub redshift: String,
    pub grade: String,
}

impl Default for CatalogColumns {
    fn default() -> Self {
        Self {
            name: "name".to_string(),
            ra: "RA".to_string(),
            dec: "DEC".to_string(),
            redshift: "zlens".to_string(),
            grade: "grading".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LensRecord {
    pub name: String,
    pub position: SkyPoint,
    pub grade: String,
    /// Lens redshift; `None` when blank or not a number.
    pub redshift: Option<f64>,
}

struct ColumnIndices {
    name: Option<usize>,
    ra: usize,
    dec: usize,
    redshift: usize,
    grade: usize,
}

impl ColumnIndices {
    fn from_header(header: &[String], columns: &CatalogColumns, line: usize) -> Result<Self> {
        let col_map: HashMap<String, usize> = header
            .iter()
            .enumerate()
            .map(|(idx, col)| (col.trim().to_ascii_lowercase(), idx))
            .collect();
        let lookup = |name: &str| col_map.get(&name.trim().to_ascii_lowercase()).copied();
        let require = |name: &str| {
            lookup(name)
                .ok_or_else(|| SurveyError::catalog(line, format!("missing required column '{name}'")))
        };

        Ok(Self {
            name: lookup(&columns.name),
            ra: require(&columns.ra)?,
            dec: require(&columns.dec)?,
            redshift: require(&columns.redshift)?,
            grade: require(&columns.grade)?,
        })
    }
}

/// An ordered collection of lens records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LensCatalog {
    records: Vec<LensRecord>,
}

impl LensCatalog {
    pub fn new(records: Vec<LensRecord>) -> Self {
        Self { records }
    }

    pub fn from_path(path: impl AsRef<Path>, columns: &CatalogColumns) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let catalog = Self::from_reader(BufReader::new(file), columns)?;
        info!(path = %path.display(), lenses = catalog.len(), "loaded lens catalog");
        Ok(catalog)
    }

    pub fn from_reader<R: BufRead>(reader: R, columns: &CatalogColumns) -> Result<Self> {
        let mut indices = None;
        let mut records = Vec::new();

        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = n + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let fields = split_csv_line(trimmed).map_err(|msg| SurveyError::catalog(line_no, msg))?;
            match &indices {
                Some(idx) => records.push(parse_record(&fields, idx, line_no)?),
                None => indices = Some(ColumnIndices::from_header(&fields, columns, line_no)?),
            }
        }

        if indices.is_none() {
            return Err(SurveyError::catalog(0, "no header row"));
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[LensRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LensRecord> {
        self.records.iter()
    }

    /// Keeps records whose grade is one of `grades` (any grade when the
    /// list is empty) and, if asked, that carry a redshift.
    pub fn filter<S: AsRef<str>>(&self, grades: &[S], require_redshift: bool) -> Self {
        let records: Vec<_> = self
            .records
            .iter()
            .filter(|r| grades.is_empty() || grades.iter().any(|g| g.as_ref() == r.grade))
            .filter(|r| !require_redshift || r.redshift.is_some())
            .cloned()
            .collect();
        debug!(
            before = self.records.len(),
            after = records.len(),
            "filtered lens catalog"
        );
        Self { records }
    }

    /// `n` records drawn without replacement, in catalog order. Returns
    /// everything when `n` exceeds the catalog size.
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Self {
        let n = n.min(self.records.len());
        let mut picked = rand::seq::index::sample(rng, self.records.len(), n).into_vec();
        picked.sort_unstable();
        Self {
            records: picked.into_iter().map(|i| self.records[i].clone()).collect(),
        }
    }

    /// Consecutive chunks of `size` records; the last may be shorter.
    pub fn batches(&self, size: usize) -> std::slice::Chunks<'_, LensRecord> {
        self.records.chunks(size.max(1))
    }

    pub fn positions(&self) -> Vec<SkyPoint> {
        self.records.iter().map(|r| r.position).collect()
    }

    pub fn exclusion_set(&self) -> ExclusionSet {
        self.records.iter().map(|r| r.position).collect()
    }
}

impl<'a> IntoIterator for &'a LensCatalog {
    type Item = &'a LensRecord;
    type IntoIter = std::slice::Iter<'a, LensRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

fn parse_record(fields: &[String], idx: &ColumnIndices, line: usize) -> Result<LensRecord> {
    let field = |i: usize| fields.get(i).map(|s| s.trim()).unwrap_or("");
    let coordinate = |i: usize, label: &str| {
        field(i)
            .parse::<f64>()
            .map_err(|_| SurveyError::catalog(line, format!("bad {label} value '{}'", field(i))))
    };

    let ra = coordinate(idx.ra, "RA")?;
    let dec = coordinate(idx.dec, "Dec")?;
    let position = SkyPoint::new(ra, dec).map_err(|e| SurveyError::catalog(line, e.to_string()))?;

    let name = match idx.name.map(field) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("lens-{line}"),
    };

    Ok(LensRecord {
        name,
        position,
        grade: field(idx.grade).to_string(),
        redshift: lenient_number(field(idx.redshift)),
    })
}

/// Parses a number, treating anything unparsable or non-finite as missing.
fn lenient_number(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Splits one CSV line. Fields may be wrapped in double quotes, with `""`
/// standing for a literal quote inside them.
fn split_csv_line(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
            }
            (',', false) => fields.push(std::mem::take(&mut current)),
            (c, _) => current.push(c),
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(current);
    Ok(fields)
}
