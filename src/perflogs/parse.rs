use std::{fs, path::Path};

use regex::Regex;

use crate::{
    error::{Error, Result},
    frame::{Column, DType, Frame, Value},
};

/// Patterns that must each match at least one header field for a file to be a usable perflog.
pub const REQUIRED_FIELDS: [&str; 4] = [
    "job_completion_time",
    r"\w+_value$",
    r"\w+_unit$",
    "display_name",
];

/// Delimiter between perflog fields.
pub const DELIMITER: u8 = b'|';

/// Field contents read as missing values.
pub const NULL_TOKENS: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>",
    "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const DISPLAY_NAME: &str = "display_name";
const TEST_NAME: &str = "test_name";
const DICT_FIELDS: [&str; 2] = ["extra_resources", "env_vars"];
const SPACK_SPEC_DICT: &str = "spack_spec_dict";

/// Parses a ReFrame performance log into a [`Frame`].
///
/// The first line names the fields, every following non-empty line is one record. All fields are kept as text except
/// for the dictionary-valued ones, which are decoded and flattened:
///
/// - `display_name` is replaced by `test_name` followed by one column per test parameter,
/// - the keys of `extra_resources` and `env_vars` become columns,
/// - `spack_spec_dict` is flattened recursively, nested keys are prefixed with their parent column name.
///
/// Flattened columns are inserted where their source column was.
///
/// # Errors
///
/// Returns [`Error::MissingFields`] if the header lacks any of the [`REQUIRED_FIELDS`], and a parsing error if a
/// line has more fields than the header or a dictionary field cannot be decoded.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
///
/// use perflog_post::perflogs::read_perflog;
///
/// let frame = read_perflog(Path::new("perflogs/archer2/compute/SombreroBenchmark.log")).unwrap();
/// println!("{}", frame.to_table());
/// ```
pub fn read_perflog(path: &Path) -> Result<Frame> {
    log::debug!("reading perflog ({})...", path.display());
    let text = fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
    let mut frame = parse_records(path, &text)?;

    check_required_fields(path, &frame)?;

    expand_display_name(&mut frame)?;
    for field in DICT_FIELDS {
        if frame.contains(field) {
            flatten_dict_column(&mut frame, field, false)?;
        }
    }
    if frame.contains(SPACK_SPEC_DICT) {
        flatten_spack_spec_dict(&mut frame)?;
    }

    log::debug!(
        "read {} records with {} fields from {}",
        frame.len(),
        frame.columns().len(),
        path.display()
    );
    Ok(frame)
}

/// Splits delimited text into text columns named by the header line.
///
/// Lines shorter than the header are padded with nulls. Empty fields and the usual missing-value markers
/// ([`NULL_TOKENS`]) are read as nulls.
pub(crate) fn parse_records(path: &Path, text: &str) -> Result<Frame> {
    let malformed = |line: u64, reason: String| Error::MalformedLine {
        path: path.to_path_buf(),
        line: usize::try_from(line).unwrap_or(usize::MAX),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let names: Vec<String> = reader
        .headers()
        .map_err(|err| malformed(1, err.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return Ok(Frame::default());
    }

    let mut cells: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
    for record in reader.records() {
        let record = record.map_err(|err| {
            let line = err.position().map_or(0, csv::Position::line);
            malformed(line, err.to_string())
        })?;
        if record.len() > names.len() {
            let line = record.position().map_or(0, csv::Position::line);
            return Err(malformed(
                line,
                format!("expected {} fields, saw {}", names.len(), record.len()),
            ));
        }
        for (i, column) in cells.iter_mut().enumerate() {
            column.push(record.get(i).map_or(Value::Null, field_value));
        }
    }

    let mut frame = Frame::default();
    for (name, values) in names.into_iter().zip(cells) {
        frame
            .push(Column::new(name, DType::Str, values))
            .map_err(|err| malformed(1, err.to_string()))?;
    }
    Ok(frame)
}

fn field_value(field: &str) -> Value {
    if NULL_TOKENS.contains(&field) {
        Value::Null
    } else {
        Value::from_field(field)
    }
}

fn check_required_fields(path: &Path, frame: &Frame) -> Result<()> {
    let all_present = REQUIRED_FIELDS.iter().all(|pattern| {
        // Required field patterns are constants and always compile.
        Regex::new(&format!("^(?:{pattern})"))
            .map(|re| frame.column_names().any(|name| re.is_match(name)))
            .unwrap_or(false)
    });
    if all_present {
        Ok(())
    } else {
        Err(Error::MissingFields {
            path: path.to_path_buf(),
            required: REQUIRED_FIELDS.to_vec(),
        })
    }
}

/// Splits a display name into the test name and its `(parameter, value)` pairs.
///
/// The expected format is `<test_name>` followed by zero or more ` %<param>=<value>` suffixes.
///
/// # Errors
///
/// Returns [`Error::MalformedDisplayName`] if a suffix has no `=`.
///
/// # Examples
///
/// ```
/// use perflog_post::perflogs::parse_display_name;
///
/// let (test, params) = parse_display_name("TestName %param1=one %param2=two").unwrap();
/// assert_eq!(test, "TestName");
/// assert_eq!(params, vec![("param1".to_string(), "one".to_string()), ("param2".to_string(), "two".to_string())]);
///
/// let (_, params) = parse_display_name("TestName").unwrap();
/// assert!(params.is_empty());
/// ```
pub fn parse_display_name(display_name: &str) -> Result<(String, Vec<(String, String)>)> {
    let mut parts = display_name.split(" %");
    let test_name = parts.next().unwrap_or_default().to_string();
    let params = parts
        .map(|p| {
            p.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| Error::MalformedDisplayName(display_name.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((test_name, params))
}

fn expand_display_name(frame: &mut Frame) -> Result<()> {
    let Some(index) = frame.position(DISPLAY_NAME) else {
        return Ok(());
    };
    let Some(column) = frame.remove(DISPLAY_NAME) else {
        return Ok(());
    };

    let mut test_names = Vec::with_capacity(column.values.len());
    let mut rows = Vec::with_capacity(column.values.len());
    for value in &column.values {
        let (test_name, params) = match value {
            Value::Null => (String::new(), Vec::new()),
            other => parse_display_name(&other.to_string())?,
        };
        test_names.push(Value::from_field(&test_name));
        rows.push(
            params
                .into_iter()
                .map(|(k, v)| (k, Value::from_field(&v)))
                .collect::<Vec<_>>(),
        );
    }

    insert_key_columns(frame, index, DISPLAY_NAME, &rows, "")?;
    frame.insert(index, Column::new(TEST_NAME, DType::Str, test_names))?;
    Ok(())
}

/// Replaces a column of JSON objects by one column per key.
///
/// With `prefixed`, new columns are named `<column>_<key>`. Otherwise the bare key is used unless it collides with an
/// existing column, in which case the prefixed name is used instead.
fn flatten_dict_column(frame: &mut Frame, name: &str, prefixed: bool) -> Result<Vec<String>> {
    let Some(index) = frame.position(name) else {
        return Ok(Vec::new());
    };
    let Some(column) = frame.remove(name) else {
        return Ok(Vec::new());
    };

    let rows = column
        .values
        .iter()
        .map(|v| decode_dict(name, v))
        .collect::<Result<Vec<_>>>()?;
    let rows: Vec<Vec<(String, Value)>> = rows
        .into_iter()
        .map(|entries| {
            entries
                .into_iter()
                .map(|(k, v)| {
                    let value = if v.is_object() {
                        Value::Str(v.to_string())
                    } else {
                        Value::from_json(&v)
                    };
                    (k, value)
                })
                .collect()
        })
        .collect();

    let prefix = if prefixed { name } else { "" };
    insert_key_columns(frame, index, name, &rows, prefix)
}

/// Flattens `spack_spec_dict` until no column it produced holds only JSON objects.
fn flatten_spack_spec_dict(frame: &mut Frame) -> Result<()> {
    let mut pending = flatten_dict_column(frame, SPACK_SPEC_DICT, false)?;
    while let Some(name) = pending.pop() {
        let holds_dicts = frame.column(&name).is_some_and(|c| {
            c.values.iter().any(|v| !v.is_null())
                && c.values.iter().all(|v| match v {
                    Value::Null => true,
                    Value::Str(s) => matches!(
                        serde_json::from_str::<serde_json::Value>(s),
                        Ok(serde_json::Value::Object(_))
                    ),
                    _ => false,
                })
        });
        if holds_dicts {
            pending.extend(flatten_dict_column(frame, &name, true)?);
        }
    }
    Ok(())
}

fn decode_dict(column: &str, value: &Value) -> Result<Vec<(String, serde_json::Value)>> {
    let text = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Str(s) if s.trim().is_empty() || s.trim() == "None" => return Ok(Vec::new()),
        Value::Str(s) => s.as_str(),
        other => {
            return Err(Error::MalformedDict {
                column: column.to_string(),
                reason: format!("'{other}' is not a dictionary"),
            })
        }
    };
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Object(map)) => Ok(map.into_iter().collect()),
        Ok(serde_json::Value::Null) => Ok(Vec::new()),
        Ok(other) => Err(Error::MalformedDict {
            column: column.to_string(),
            reason: format!("'{other}' is not a dictionary"),
        }),
        Err(err) => Err(Error::MalformedDict {
            column: column.to_string(),
            reason: err.to_string(),
        }),
    }
}

/// Inserts one column per distinct key found across `rows`, starting at `index`.
///
/// Keys are ordered by first appearance. Returns the names of the inserted columns.
fn insert_key_columns(
    frame: &mut Frame,
    mut index: usize,
    source: &str,
    rows: &[Vec<(String, Value)>],
    prefix: &str,
) -> Result<Vec<String>> {
    let mut keys: Vec<&str> = Vec::new();
    for (key, _) in rows.iter().flatten() {
        if !keys.contains(&key.as_str()) {
            keys.push(key);
        }
    }

    let mut inserted = Vec::with_capacity(keys.len());
    for key in keys {
        let values = rows
            .iter()
            .map(|row| {
                row.iter()
                    .find(|(k, _)| k == key)
                    .map_or(Value::Null, |(_, v)| v.clone())
            })
            .collect();

        let name = if prefix.is_empty() {
            if frame.contains(key) {
                let renamed = format!("{source}_{key}");
                log::debug!("column '{key}' from '{source}' already exists, using '{renamed}'");
                renamed
            } else {
                key.to_string()
            }
        } else {
            format!("{prefix}_{key}")
        };

        frame.insert(index, Column::from_values(name.clone(), values))?;
        inserted.push(name);
        index += 1;
    }
    Ok(inserted)
}
