#![forbid(unsafe_code)]

//! Minimal RFC 4180 reader for the CSV city datasets.
//!
//! Comma-separated, first record is the header. Quoted fields may contain
//! commas, newlines, and doubled double-quotes. Records end at LF or CRLF.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CsvError {
    UnclosedQuote,
    /// A quote appeared in the middle of an unquoted field.
    StrayQuote,
    MissingHeader,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnclosedQuote => write!(f, "unclosed quoted field"),
            Self::StrayQuote => write!(f, "quote inside unquoted field"),
            Self::MissingHeader => write!(f, "missing header record"),
        }
    }
}

impl std::error::Error for CsvError {}

#[derive(Clone, Debug)]
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// One data record with header-keyed access.
#[derive(Clone, Copy, Debug)]
pub struct CsvRecord<'a> {
    headers: &'a [String],
    fields: &'a [String],
}

impl CsvTable {
    pub fn parse(input: &str) -> Result<Self, CsvError> {
        let mut records = parse_records(input)?;
        if records.is_empty() {
            return Err(CsvError::MissingHeader);
        }
        let headers = records.remove(0);
        Ok(Self {
            headers,
            rows: records,
        })
    }

    pub fn records(&self) -> impl Iterator<Item = CsvRecord<'_>> {
        self.rows.iter().map(|fields| CsvRecord {
            headers: &self.headers,
            fields,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<'a> CsvRecord<'a> {
    /// Raw field value by header name; `None` when the column is absent or
    /// the record is short.
    pub fn get(&self, name: &str) -> Option<&'a str> {
        let index = self.headers.iter().position(|h| h == name)?;
        self.fields.get(index).map(String::as_str)
    }

    /// Trimmed, non-empty field value.
    pub fn text(&self, name: &str) -> Option<&'a str> {
        let value = self.get(name)?.trim();
        if value.is_empty() { None } else { Some(value) }
    }
}

fn parse_records(input: &str) -> Result<Vec<Vec<String>>, CsvError> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    // Whether the current field was opened with a quote; quoting rules
    // differ for the rest of the field.
    let mut in_quotes = false;
    let mut field_started = false;

    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(ch),
            }
            continue;
        }
        match ch {
            '"' if !field_started && field.is_empty() => {
                in_quotes = true;
                field_started = true;
            }
            '"' => return Err(CsvError::StrayQuote),
            ',' => {
                record.push(std::mem::take(&mut field));
                field_started = false;
            }
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
                field_started = false;
            }
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
                field_started = false;
            }
            _ => {
                field.push(ch);
                field_started = true;
            }
        }
    }
    if in_quotes {
        return Err(CsvError::UnclosedQuote);
    }
    if field_started || !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    // A trailing newline leaves no dangling record; an empty final line is
    // not a record.
    records.retain(|r| !(r.len() == 1 && r[0].is_empty()));
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fields_and_header_lookup() {
        let table = CsvTable::parse("a,b,c\n1,2,3\n4,5,6\n").unwrap();
        assert_eq!(table.len(), 2);
        let first = table.records().next().unwrap();
        assert_eq!(first.get("a"), Some("1"));
        assert_eq!(first.get("c"), Some("3"));
        assert_eq!(first.get("missing"), None);
    }

    #[test]
    fn quoted_commas_and_escaped_quotes() {
        let table = CsvTable::parse("name,notes\n\"Oak, Red\",\"said \"\"tall\"\"\"\n").unwrap();
        let record = table.records().next().unwrap();
        assert_eq!(record.get("name"), Some("Oak, Red"));
        assert_eq!(record.get("notes"), Some("said \"tall\""));
    }

    #[test]
    fn embedded_newline_inside_quotes() {
        let table = CsvTable::parse("a,b\n\"line1\nline2\",x\n").unwrap();
        let record = table.records().next().unwrap();
        assert_eq!(record.get("a"), Some("line1\nline2"));
        assert_eq!(record.get("b"), Some("x"));
    }

    #[test]
    fn crlf_records_and_short_rows() {
        let table = CsvTable::parse("a,b,c\r\n1,2\r\n").unwrap();
        let record = table.records().next().unwrap();
        assert_eq!(record.get("b"), Some("2"));
        assert_eq!(record.get("c"), None);
    }

    #[test]
    fn empty_fields_are_preserved_and_text_filters_them() {
        let table = CsvTable::parse("a,b\n,  \n").unwrap();
        let record = table.records().next().unwrap();
        assert_eq!(record.get("a"), Some(""));
        assert_eq!(record.text("a"), None);
        assert_eq!(record.text("b"), None);
    }

    #[test]
    fn unclosed_quote_is_an_error() {
        assert_eq!(CsvTable::parse("a\n\"oops\n").unwrap_err(), CsvError::UnclosedQuote);
        assert_eq!(CsvTable::parse("a\nx\"y\n").unwrap_err(), CsvError::StrayQuote);
        assert_eq!(CsvTable::parse("").unwrap_err(), CsvError::MissingHeader);
    }
}
