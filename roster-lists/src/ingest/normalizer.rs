//! Row normalizer: free-form column names to the contact schema
//!
//! Column names are matched after trimming and lower-casing against a
//! closed alias table. The first alias with a non-empty value wins.
//! Validation is all-or-nothing: one bad row rejects the whole upload.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use roster_common::db::NormalizedContact;

use super::parser::RawRecord;
use super::IngestError;

/// Canonical contact fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContactField {
    FirstName,
    Phone,
    Notes,
}

impl ContactField {
    /// Lower-cased column names accepted for each field, in priority order
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            ContactField::FirstName => &["firstname", "first name"],
            ContactField::Phone => &["phone", "phonenumber", "mobile"],
            ContactField::Notes => &["notes", "note"],
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self, ContactField::FirstName | ContactField::Phone)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ContactField::FirstName => "firstName",
            ContactField::Phone => "phone",
            ContactField::Notes => "notes",
        }
    }
}

impl fmt::Display for ContactField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Required fields a row failed to provide
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingFields {
    pub fields: BTreeSet<ContactField>,
}

/// Resolve one raw record against the alias table
pub fn normalize_record(record: &RawRecord) -> Result<NormalizedContact, MissingFields> {
    // Later duplicates of the same normalized key overwrite earlier ones
    let lookup: HashMap<String, &str> = record
        .fields()
        .iter()
        .map(|(column, value)| (column.trim().to_lowercase(), value.as_str()))
        .collect();

    let resolve = |field: ContactField| -> String {
        field
            .aliases()
            .iter()
            .filter_map(|alias| lookup.get(*alias))
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
            .unwrap_or_default()
            .to_string()
    };

    let first_name = resolve(ContactField::FirstName);
    let phone = resolve(ContactField::Phone);
    let notes = resolve(ContactField::Notes);

    let missing: BTreeSet<ContactField> = [
        (ContactField::FirstName, &first_name),
        (ContactField::Phone, &phone),
        (ContactField::Notes, &notes),
    ]
    .into_iter()
    .filter(|(field, value)| field.is_required() && value.is_empty())
    .map(|(field, _)| field)
    .collect();

    if missing.is_empty() {
        Ok(NormalizedContact {
            first_name,
            phone,
            notes,
        })
    } else {
        Err(MissingFields { fields: missing })
    }
}

/// Normalize every row, rejecting the batch if any row is invalid
pub fn normalize_rows(records: &[RawRecord]) -> Result<Vec<NormalizedContact>, IngestError> {
    if records.is_empty() {
        return Err(IngestError::EmptyFile);
    }

    let mut contacts = Vec::with_capacity(records.len());
    let mut invalid_rows = 0usize;
    let mut first_invalid: Option<(usize, MissingFields)> = None;

    for (index, record) in records.iter().enumerate() {
        match normalize_record(record) {
            Ok(contact) => contacts.push(contact),
            Err(missing) => {
                invalid_rows += 1;
                if first_invalid.is_none() {
                    first_invalid = Some((index + 1, missing));
                }
            }
        }
    }

    match first_invalid {
        None => Ok(contacts),
        Some((row, missing)) => Err(IngestError::MissingRequiredFields {
            invalid_rows,
            first_invalid_row: row,
            missing: missing.fields.into_iter().collect(),
        }),
    }
}
