use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};

use crate::contract::{SyncPolicy, ValidationError, ADDRESS_COLUMN, NOTE_COLUMN};

/// Networks extracted from one CSV object, in file order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressCollection {
    pub addresses: Vec<String>,
    pub rows_skipped: usize,
}

impl AddressCollection {
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Extracts one address per accepted row of a header-led CSV document.
///
/// Values are kept verbatim; nothing checks that they are well-formed
/// networks. A row is skipped when its `ipnet` cell is missing or empty, and
/// under [`SyncPolicy::Strict`] also when its `note` cell is.
pub fn extract_addresses(
    csv_text: &str,
    policy: SyncPolicy,
) -> Result<AddressCollection, ValidationError> {
    let csv_text = csv_text.trim_start_matches('\u{feff}');
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|error| ValidationError::new(format!("Malformed CSV header: {error}")))?
        .clone();
    let address_index = column_index(&headers, ADDRESS_COLUMN);
    let note_index = column_index(&headers, NOTE_COLUMN);

    let mut collection = AddressCollection::default();
    for (row_number, row) in reader.records().enumerate() {
        let row = row.map_err(|error| {
            ValidationError::new(format!("Malformed CSV row {}: {error}", row_number + 1))
        })?;

        let address = cell(&row, address_index);
        let note = cell(&row, note_index);
        match (address, note) {
            (Some(address), _) if !policy.requires_note() => {
                collection.addresses.push(address.to_string());
            }
            (Some(address), Some(_)) => collection.addresses.push(address.to_string()),
            _ => collection.rows_skipped += 1,
        }
    }

    Ok(collection)
}

fn column_index(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|header| header == name)
}

fn cell(row: &StringRecord, index: Option<usize>) -> Option<&str> {
    index
        .and_then(|index| row.get(index))
        .filter(|value| !value.is_empty())
}
