//! Column Mapping - reconciles CSV headers with live table columns

use crate::error::{DbCliError, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Ordered CSV header → table column pairs. Target columns are unique; a
/// header only repeats when the CSV itself repeats it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping {
    pairs: Vec<(String, String)>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from explicit pairs, rejecting repeated headers or columns.
    pub fn from_pairs<I, H, C>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (H, C)>,
        H: Into<String>,
        C: Into<String>,
    {
        let mut mapping = Self::new();
        for (header, column) in pairs {
            mapping.insert(header, column)?;
        }
        Ok(mapping)
    }

    pub fn insert(&mut self, header: impl Into<String>, column: impl Into<String>) -> Result<()> {
        let (header, column) = (header.into(), column.into());
        if self.get(&header).is_some() {
            return Err(DbCliError::Validation(format!(
                "CSV column '{}' is mapped more than once",
                header
            )));
        }
        if self.columns().any(|c| c == column) {
            return Err(DbCliError::Validation(format!(
                "Table column '{}' is the target of more than one CSV column",
                column
            )));
        }
        self.pairs.push((header, column));
        Ok(())
    }

    /// Callers guarantee uniqueness.
    pub(crate) fn push_unchecked(&mut self, header: String, column: String) {
        self.pairs.push((header, column));
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, c)| c.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> + '_ {
        self.pairs.iter().map(|(h, _)| h.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> + '_ {
        self.pairs.iter().map(|(_, c)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Every target must be a live column and no target may repeat.
    pub fn validate(&self, live_columns: &[String]) -> Result<()> {
        let live: HashSet<&str> = live_columns.iter().map(String::as_str).collect();
        let missing: Vec<&str> = self.columns().filter(|c| !live.contains(c)).collect();
        if !missing.is_empty() {
            return Err(DbCliError::Validation(format!(
                "Mapped columns not found in table: {} (available: {})",
                missing.join(", "),
                live_columns.join(", ")
            )));
        }

        let repeated: Vec<&str> = self.columns().duplicates().collect();
        if !repeated.is_empty() {
            return Err(DbCliError::Validation(format!(
                "Table columns targeted more than once: {}",
                repeated.join(", ")
            )));
        }
        Ok(())
    }
}

/// A mapping plus the CSV headers it leaves out.
///
/// `sources[i]` is the CSV field position feeding `mapping.pairs()[i]`, so
/// repeated headers load from the occurrence they were matched on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingOutcome {
    pub mapping: ColumnMapping,
    pub sources: Vec<usize>,
    pub unmapped: Vec<String>,
}

impl MappingOutcome {
    pub fn is_partial(&self) -> bool {
        !self.unmapped.is_empty()
    }

    /// `(field position, target column)` in mapping order.
    pub fn targets(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.sources.iter().copied().zip(self.mapping.columns())
    }
}

pub struct ColumnMapper;

impl ColumnMapper {
    /// Exact name matches first, then case-insensitive matches against the
    /// columns still free (first in table order wins). A header that appears
    /// more than once maps at most once.
    pub fn auto_map(headers: &[String], table_columns: &[String]) -> MappingOutcome {
        let mut targets: Vec<Option<usize>> = vec![None; headers.len()];
        let mut taken = vec![false; table_columns.len()];
        let mut seen_headers = HashSet::new();
        let first_occurrence: Vec<bool> = headers.iter().map(|h| seen_headers.insert(h.as_str())).collect();

        for (h_idx, header) in headers.iter().enumerate() {
            if !first_occurrence[h_idx] {
                continue;
            }
            if let Some(c_idx) = table_columns.iter().position(|c| c == header) {
                if !taken[c_idx] {
                    taken[c_idx] = true;
                    targets[h_idx] = Some(c_idx);
                }
            }
        }

        for (h_idx, header) in headers.iter().enumerate() {
            if !first_occurrence[h_idx] || targets[h_idx].is_some() {
                continue;
            }
            let lower = header.to_lowercase();
            if let Some(c_idx) = (0..table_columns.len())
                .find(|&c_idx| !taken[c_idx] && table_columns[c_idx].to_lowercase() == lower)
            {
                taken[c_idx] = true;
                targets[h_idx] = Some(c_idx);
            }
        }

        let mut mapping = ColumnMapping::new();
        let mut sources = Vec::new();
        let mut unmapped = Vec::new();
        for (h_idx, (header, target)) in headers.iter().zip(targets).enumerate() {
            match target {
                Some(c_idx) => {
                    mapping.push_unchecked(header.clone(), table_columns[c_idx].clone());
                    sources.push(h_idx);
                }
                None => unmapped.push(header.clone()),
            }
        }
        MappingOutcome {
            mapping,
            sources,
            unmapped,
        }
    }

    /// Pair CSV field `i` with `columns[i]`, for tables generated from the
    /// file itself.
    pub fn positional(headers: &[String], columns: &[String]) -> MappingOutcome {
        let mut mapping = ColumnMapping::new();
        let mut sources = Vec::new();
        for (h_idx, (header, column)) in headers.iter().zip(columns).enumerate() {
            mapping.push_unchecked(header.clone(), column.clone());
            sources.push(h_idx);
        }
        let unmapped = headers.iter().skip(columns.len()).cloned().collect();
        MappingOutcome {
            mapping,
            sources,
            unmapped,
        }
    }

    /// Use a caller-supplied mapping; its headers must exist in the CSV.
    /// A repeated header loads from its first occurrence and the later ones
    /// are reported as unmapped.
    pub fn explicit(headers: &[String], mapping: &ColumnMapping) -> Result<MappingOutcome> {
        let mut sources = Vec::with_capacity(mapping.len());
        let mut unknown = Vec::new();
        for header in mapping.headers() {
            match headers.iter().position(|h| h == header) {
                Some(h_idx) => sources.push(h_idx),
                None => unknown.push(header),
            }
        }
        if !unknown.is_empty() {
            return Err(DbCliError::Validation(format!(
                "Mapped CSV columns not found in file: {}",
                unknown.join(", ")
            )));
        }

        let used: HashSet<usize> = sources.iter().copied().collect();
        let unmapped = headers
            .iter()
            .enumerate()
            .filter(|(h_idx, _)| !used.contains(h_idx))
            .map(|(_, h)| h)
            .unique()
            .cloned()
            .collect();
        Ok(MappingOutcome {
            mapping: mapping.clone(),
            sources,
            unmapped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn exact_matches_win_over_case_insensitive_ones() {
        let outcome = ColumnMapper::auto_map(&names(&["name", "NAME", "Email"]), &names(&["NAME", "name", "email"]));
        assert_eq!(
            outcome.mapping.pairs(),
            &[
                ("name".to_string(), "name".to_string()),
                ("NAME".to_string(), "NAME".to_string()),
                ("Email".to_string(), "email".to_string()),
            ]
        );
        assert!(!outcome.is_partial());
    }

    #[test]
    fn never_maps_two_headers_to_one_column() {
        let outcome = ColumnMapper::auto_map(&names(&["ID", "id", "Id", "extra"]), &names(&["id"]));
        assert_eq!(outcome.mapping.pairs(), &[("id".to_string(), "id".to_string())]);
        assert_eq!(outcome.unmapped, names(&["ID", "Id", "extra"]));
        let targets: Vec<&str> = outcome.mapping.columns().collect();
        assert_eq!(targets.iter().unique().count(), targets.len());
    }

    #[test]
    fn duplicate_headers_map_once() {
        let outcome = ColumnMapper::auto_map(&names(&["a", "a"]), &names(&["a", "A"]));
        assert_eq!(outcome.mapping.len(), 1);
        assert_eq!(outcome.sources, vec![0]);
        assert_eq!(outcome.unmapped, names(&["a"]));
    }

    #[test]
    fn explicit_mapping_requires_known_headers() {
        let mapping = ColumnMapping::from_pairs([("full name", "name")]).unwrap();
        let outcome = ColumnMapper::explicit(&names(&["full name", "age"]), &mapping).unwrap();
        assert_eq!(outcome.unmapped, names(&["age"]));
        assert_eq!(outcome.sources, vec![0]);

        let bad = ColumnMapping::from_pairs([("nope", "name")]).unwrap();
        assert!(matches!(
            ColumnMapper::explicit(&names(&["full name"]), &bad),
            Err(DbCliError::Validation(_))
        ));
    }

    #[test]
    fn explicit_mapping_reports_repeated_header() {
        let mapping = ColumnMapping::from_pairs([("phone", "phone")]).unwrap();
        let outcome = ColumnMapper::explicit(&names(&["phone", "name", "phone"]), &mapping).unwrap();
        assert_eq!(outcome.sources, vec![0]);
        assert_eq!(outcome.unmapped, names(&["name", "phone"]));
    }

    #[test]
    fn positional_mapping_keeps_every_occurrence() {
        let outcome = ColumnMapper::positional(&names(&["phone", "phone"]), &names(&["phone", "phone_2"]));
        assert!(!outcome.is_partial());
        assert_eq!(
            outcome.targets().collect::<Vec<_>>(),
            vec![(0, "phone"), (1, "phone_2")]
        );
    }

    #[test]
    fn rejects_repeated_targets_on_insert() {
        let err = ColumnMapping::from_pairs([("a", "x"), ("b", "x")]).unwrap_err();
        assert!(err.to_string().contains("'x'"));
    }

    #[test]
    fn validate_lists_missing_columns() {
        let mapping = ColumnMapping::from_pairs([("a", "x"), ("b", "y"), ("c", "z")]).unwrap();
        let err = mapping.validate(&names(&["x"])).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("y, z"), "{}", message);
        assert!(mapping.validate(&names(&["x", "y", "z"])).is_ok());
    }
}
