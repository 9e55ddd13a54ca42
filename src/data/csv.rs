//! Delimited-text reading and writing.
//!
//! Comma separated, double-quote quoting with `""` escapes, quoted newlines,
//! CRLF or LF line endings. Blank lines between records are skipped.

use std::io::{self, Write};

use super::DataError;

/// One parsed record and the 1-based line it started on.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub line: usize,
    pub fields: Vec<String>,
}

pub fn parse_records(text: &str) -> Result<Vec<RawRecord>, DataError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut at_field_start = true;
    let mut record_started = false;
    let mut line = 1usize;
    let mut record_line = 1usize;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push('\n');
                }
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if at_field_start => {
                in_quotes = true;
                at_field_start = false;
                record_started = true;
            }
            ',' => {
                fields.push(std::mem::take(&mut field));
                at_field_start = true;
                record_started = true;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                finish_record(&mut records, &mut fields, &mut field, record_started, record_line);
                at_field_start = true;
                record_started = false;
                line += 1;
                record_line = line;
            }
            _ => {
                field.push(c);
                at_field_start = false;
                record_started = true;
            }
        }
    }

    if in_quotes {
        return Err(DataError::UnterminatedQuote { line: record_line });
    }
    finish_record(&mut records, &mut fields, &mut field, record_started, record_line);
    Ok(records)
}

fn finish_record(
    records: &mut Vec<RawRecord>,
    fields: &mut Vec<String>,
    field: &mut String,
    started: bool,
    line: usize,
) {
    if !started && fields.is_empty() {
        // blank line
        return;
    }
    fields.push(std::mem::take(field));
    records.push(RawRecord {
        line,
        fields: std::mem::take(fields),
    });
}

/// Quote a field when it contains a delimiter, quote or line break.
pub fn escape_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn write_row<W: Write, S: AsRef<str>>(out: &mut W, fields: &[S]) -> io::Result<()> {
    let line = fields
        .iter()
        .map(|f| escape_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    writeln!(out, "{}", line)
}

/// Render a header and rows into an in-memory CSV string.
pub fn render<S: AsRef<str>>(header: &[S], rows: &[Vec<String>]) -> String {
    let mut buf: Vec<u8> = Vec::new();
    // writing into a Vec cannot fail
    let _ = write_row(&mut buf, header);
    for row in rows {
        let _ = write_row(&mut buf, row);
    }
    String::from_utf8(buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(records: &[RawRecord]) -> Vec<Vec<&str>> {
        records
            .iter()
            .map(|r| r.fields.iter().map(|s| s.as_str()).collect())
            .collect()
    }

    #[test]
    fn test_parses_plain_rows_and_skips_blank_lines() {
        let recs = parse_records("a,b\n1,2\n\n3,4\n").unwrap();
        assert_eq!(fields(&recs), vec![vec!["a", "b"], vec!["1", "2"], vec!["3", "4"]]);
        assert_eq!(recs[2].line, 4);
    }

    #[test]
    fn test_handles_quotes_escapes_and_embedded_newlines() {
        let recs = parse_records("name,note\r\n\"Fall, ward\",\"said \"\"ok\"\"\nlater\"\r\n").unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[1].fields[0], "Fall, ward");
        assert_eq!(recs[1].fields[1], "said \"ok\"\nlater");
    }

    #[test]
    fn test_keeps_trailing_empty_field() {
        let recs = parse_records("a,b,c\n1,,\n").unwrap();
        assert_eq!(recs[1].fields, vec!["1", "", ""]);
    }

    #[test]
    fn test_unterminated_quote_is_an_error() {
        let err = parse_records("a,b\n\"open,1\n").unwrap_err();
        assert!(matches!(err, DataError::UnterminatedQuote { line: 2 }));
    }

    #[test]
    fn test_strips_byte_order_mark() {
        let recs = parse_records("\u{feff}incident_id,impact\n1,2").unwrap();
        assert_eq!(recs[0].fields[0], "incident_id");
    }

    #[test]
    fn test_escape_only_when_needed() {
        assert_eq!(escape_field("Fall"), "Fall");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_render_then_parse_preserves_awkward_fields() {
        let rows = vec![vec!["1".to_string(), "Needle, stick \"injury\"".to_string()]];
        let text = render(&["Incident ID", "Incident Type"], &rows);
        let recs = parse_records(&text).unwrap();
        assert_eq!(recs[1].fields[1], "Needle, stick \"injury\"");
    }
}
