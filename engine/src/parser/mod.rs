//! CSV decoding and encoding for [`Table`]s.
//!
//! Loading auto-detects the byte encoding and the delimiter, keeps column
//! and row order exactly as read, and types each cell (integer, float,
//! string or null). Saving always writes comma-separated UTF-8.

use serde_json::{Number, Value};
use std::io::Write;

use crate::error::TableIoError;
use crate::models::{display_value, Row, Table};

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub table: Table,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> Result<String, TableIoError> {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => String::from_utf8_lossy(bytes).into_owned(),
        },
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        other => {
            let label = encoding_rs::Encoding::for_label(other.as_bytes())
                .ok_or_else(|| TableIoError::Encoding(format!("unknown encoding '{}'", other)))?;
            label.decode(bytes).0.into_owned()
        }
    };

    // A UTF-8 BOM would otherwise end up in the first header
    Ok(decoded.trim_start_matches('\u{feff}').to_string())
}

/// Detect the delimiter by counting occurrences in the header line.
///
/// Ties keep the earlier candidate; a line without any candidate is read
/// as comma-separated.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Type a raw CSV field: empty → null, then integer, then finite float,
/// otherwise the string itself, surrounding spaces included.
///
/// Numbers may carry surrounding spaces (`" 30"` is `30`).
pub fn parse_cell(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    let number = raw.trim();
    if let Ok(i) = number.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = number.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}

/// Parse CSV text with an explicit delimiter.
///
/// # Example
/// ```ignore
/// use tabflow::parse_csv;
///
/// let table = parse_csv("name;age\nAlice;30\nBob;25", ';').unwrap();
/// assert_eq!(table.columns(), ["name", "age"]);
/// assert_eq!(table.get(0, "age"), Some(&serde_json::json!(30)));
/// ```
pub fn parse_csv(content: &str, delimiter: char) -> Result<Table, TableIoError> {
    if content.trim().is_empty() {
        return Err(TableIoError::EmptyFile);
    }

    let delimiter_byte = u8::try_from(delimiter).map_err(|_| TableIoError::Delimiter(delimiter))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_byte)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(TableIoError::NoHeaders);
    }

    let mut rows: Vec<Row> = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        // Short rows are padded with null, extra fields are ignored
        let row: Row = (0..headers.len())
            .map(|i| record.get(i).map(parse_cell).unwrap_or(Value::Null))
            .collect();
        rows.push(row);
    }

    Ok(Table::new(headers, rows)?)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> Result<ParseResult, TableIoError> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);
    let table = parse_csv(&content, delimiter)?;

    Ok(ParseResult {
        table,
        encoding,
        delimiter,
    })
}

/// Write a table as comma-separated CSV with a header line.
pub fn write_csv<W: Write>(table: &Table, writer: W) -> Result<(), TableIoError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record(table.columns())?;
    for row in table.rows() {
        csv_writer.write_record(row.iter().map(display_value))?;
    }
    csv_writer.flush()?;

    Ok(())
}

/// Render a table as a CSV string.
pub fn table_to_csv(table: &Table) -> Result<String, TableIoError> {
    let mut buffer = Vec::new();
    write_csv(table, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| TableIoError::Encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_csv() {
        let table = parse_csv("name;age\nAlice;30\nBob;25", ';').unwrap();

        assert_eq!(table.columns(), ["name", "age"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "name"), Some(&json!("Alice")));
        assert_eq!(table.get(0, "age"), Some(&json!(30)));
        assert_eq!(table.get(1, "name"), Some(&json!("Bob")));
    }

    #[test]
    fn test_cell_typing() {
        assert_eq!(parse_cell(""), Value::Null);
        assert_eq!(parse_cell("42"), json!(42));
        assert_eq!(parse_cell("-7"), json!(-7));
        assert_eq!(parse_cell("2.5"), json!(2.5));
        assert_eq!(parse_cell("NaN"), json!("NaN"));
        assert_eq!(parse_cell("Acme Co"), json!("Acme Co"));
        assert_eq!(parse_cell(" 30 "), json!(30));
    }

    #[test]
    fn test_string_cells_keep_surrounding_spaces() {
        let table = parse_csv(" name , age \n  Alice , 30\n", ',').unwrap();
        assert_eq!(table.columns(), ["name", "age"]);
        assert_eq!(table.get(0, "name"), Some(&json!("  Alice ")));
        assert_eq!(table.get(0, "age"), Some(&json!(30)));
    }

    #[test]
    fn test_quoted_values() {
        let csv = "name,value\n\"Smith, John\",\"Hello World\"";
        let table = parse_csv(csv, ',').unwrap();

        assert_eq!(table.get(0, "name"), Some(&json!("Smith, John")));
        assert_eq!(table.get(0, "value"), Some(&json!("Hello World")));
    }

    #[test]
    fn test_empty_lines_skipped() {
        let table = parse_csv("a;b\n1;2\n\n3;4\n", ';').unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_missing_values() {
        let table = parse_csv("a;b;c\n1;;3\n4", ';').unwrap();

        assert_eq!(table.get(0, "b"), Some(&Value::Null));
        assert_eq!(table.get(0, "c"), Some(&json!(3)));
        assert_eq!(table.get(1, "c"), Some(&Value::Null));
    }

    #[test]
    fn test_extra_columns_ignored() {
        let table = parse_csv("a;b\n1;2;3;4", ';').unwrap();
        assert_eq!(table.width(), 2);
        assert_eq!(table.get(0, "b"), Some(&json!(2)));
    }

    #[test]
    fn test_empty_csv_error() {
        assert!(matches!(parse_csv("", ','), Err(TableIoError::EmptyFile)));
    }

    #[test]
    fn test_duplicate_headers_rejected() {
        assert!(matches!(parse_csv("a,a\n1,2", ','), Err(TableIoError::Table(_))));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_auto_parse() {
        let result = parse_bytes_auto(b"name;age\nAlice;30\nBob;25").unwrap();

        assert_eq!(result.delimiter, ';');
        assert_eq!(result.table.len(), 2);
        assert_eq!(result.table.columns(), ["name", "age"]);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_write_csv_renders_nulls_blank() {
        let table = Table::new(
            ["id", "name", "score"],
            vec![
                vec![json!(1), json!("Acme, Inc"), json!(2.5)],
                vec![json!(2), Value::Null, json!(10)],
            ],
        )
        .unwrap();

        let csv = table_to_csv(&table).unwrap();
        assert_eq!(csv, "id,name,score\n1,\"Acme, Inc\",2.5\n2,,10\n");
    }

    #[test]
    fn test_written_csv_reads_back() {
        let table = Table::new(
            ["g", "n"],
            vec![vec![json!("x"), json!(1)], vec![json!("y"), json!(3.5)]],
        )
        .unwrap();

        let csv = table_to_csv(&table).unwrap();
        assert_eq!(parse_csv(&csv, ',').unwrap(), table);
    }
}
