//! Header extraction for untrusted delimited files.
//!
//! Only the header row is consumed client-side; the raw bytes pass through to
//! the service unchanged, so a full record parser is not needed here.

use crate::errors::ClientError;

/// Delimiters tried when sniffing, in preference order.
const CANDIDATE_DELIMITERS: [char; 3] = [',', ';', '\t'];

/// Extracts the ordered header names from the first row of a delimited file.
///
/// The delimiter is sniffed from the first line (comma, semicolon, or tab —
/// whichever splits it into the most fields). Double-quoted fields may contain
/// the delimiter and doubled quotes. Fails with `ClientError::Parse` when no
/// non-empty header row can be derived.
pub fn parse_headers(bytes: &[u8]) -> Result<Vec<String>, ClientError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| ClientError::Parse("file is not valid UTF-8 text".to_string()))?;

    let first_line = text
        .lines()
        .next()
        .filter(|line| !line.trim().is_empty())
        .ok_or_else(|| ClientError::Parse("file is empty, no header row found".to_string()))?;

    let delimiter = sniff_delimiter(first_line);
    let headers: Vec<String> = split_row(first_line, delimiter)
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(ClientError::Parse(
            "header row contains no column names".to_string(),
        ));
    }

    tracing::debug!(
        "Parsed {} header columns (delimiter {:?})",
        headers.len(),
        delimiter
    );
    Ok(headers)
}

/// Picks the candidate delimiter that yields the most fields on the header
/// line. Ties resolve to the earlier candidate, so a plain one-column file
/// sniffs as comma-delimited.
fn sniff_delimiter(line: &str) -> char {
    let mut best = CANDIDATE_DELIMITERS[0];
    let mut best_count = split_row(line, best).len();
    for &candidate in &CANDIDATE_DELIMITERS[1..] {
        let count = split_row(line, candidate).len();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

/// Splits one row on `delimiter`, honoring double-quoted fields. A doubled
/// quote inside a quoted field is an escaped quote.
fn split_row(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else if c == '"' {
            in_quotes = true;
        } else if c == delimiter {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_headers() {
        let headers = parse_headers(b"Addr,PostCode,Client,Status,Withdrawn\n1 Main St,AB1,X,live,").unwrap();
        assert_eq!(headers, vec!["Addr", "PostCode", "Client", "Status", "Withdrawn"]);
    }

    #[test]
    fn sniffs_semicolon_and_tab() {
        let headers = parse_headers(b"a;b;c\n1;2;3").unwrap();
        assert_eq!(headers, vec!["a", "b", "c"]);
        let headers = parse_headers(b"a\tb\tc\n").unwrap();
        assert_eq!(headers, vec!["a", "b", "c"]);
    }

    #[test]
    fn quoted_field_may_contain_delimiter() {
        let headers = parse_headers(b"\"Address, full\",Postcode\nx,y").unwrap();
        assert_eq!(headers, vec!["Address, full", "Postcode"]);
    }

    #[test]
    fn doubled_quote_is_escaped_quote() {
        let headers = parse_headers(b"\"He said \"\"hi\"\"\",b").unwrap();
        assert_eq!(headers, vec!["He said \"hi\"", "b"]);
    }

    #[test]
    fn empty_input_is_parse_error() {
        assert!(matches!(parse_headers(b""), Err(ClientError::Parse(_))));
        assert!(matches!(parse_headers(b"   \n"), Err(ClientError::Parse(_))));
    }

    #[test]
    fn all_blank_headers_rejected() {
        assert!(matches!(parse_headers(b" , , \nrow"), Err(ClientError::Parse(_))));
    }

    #[test]
    fn non_utf8_rejected() {
        assert!(matches!(parse_headers(&[0xff, 0xfe, 0x00]), Err(ClientError::Parse(_))));
    }
}
