use crate::table::{Table, Value};

pub const CONTACT_NAME_COLUMN: &str = "sample_contact_name";

const NAME_SEPARATOR: &str = ",,";

/// Collapses a GEO contact name such as `"Doe,,Jane"` into `"DoeJ"`: the
/// leading part followed by the initial of the trailing part.
///
/// Anything that does not look like a separated name is returned unchanged.
pub fn normalize_contact_name(value: &Value) -> Value {
    let Some(text) = value.as_text() else {
        return value.clone();
    };
    if !text.contains(NAME_SEPARATOR) {
        return value.clone();
    }

    let leading = text
        .split(NAME_SEPARATOR)
        .next()
        .map(trim_name_part)
        .unwrap_or_default();
    let trailing = text
        .rsplit(NAME_SEPARATOR)
        .next()
        .map(trim_name_part)
        .unwrap_or_default();
    match trailing.chars().next() {
        Some(initial) if !leading.is_empty() => Value::Text(format!("{leading}{initial}")),
        _ => value.clone(),
    }
}

/// Normalizes every cell of the contact-name column, if the table has one.
///
/// Returns whether a column was found.
pub fn normalize_contact_column(table: &mut Table) -> bool {
    let Some(index) = table.column_index_ignore_case(CONTACT_NAME_COLUMN) else {
        return false;
    };
    for row in &mut table.rows {
        if let Some(cell) = row.get_mut(index) {
            *cell = normalize_contact_name(cell);
        }
    }
    true
}

fn trim_name_part(part: &str) -> &str {
    part.trim_matches(|ch: char| ch == ',' || ch.is_whitespace())
}
