// Delimited text sources (CSV, TRF, TXT)

use std::path::Path;

use encoding_rs::Encoding;

/// Read a delimited text file into a grid of cell text.
///
/// The file has no header row. The delimiter is sniffed from the first lines.
pub fn read_grid(path: &Path, fallback: &'static Encoding) -> Result<Vec<Vec<String>>, String> {
    let content = read_file_as_utf8(path, fallback)?;
    let delimiter = sniff_delimiter(&content);
    parse_grid(&content, delimiter)
}

/// Look up an encoding by its WHATWG label (`windows-874`, `tis-620`, ...).
pub fn resolve_encoding(label: &str) -> Result<&'static Encoding, String> {
    Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| format!("Unknown text encoding '{}'", label))
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
pub fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // Lines agreeing with line 1, weighted by field count
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8, decoding with `fallback` when the bytes are not UTF-8.
pub fn read_file_as_utf8(path: &Path, fallback: &'static Encoding) -> Result<String, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    Ok(decode_bytes(bytes, fallback))
}

/// UTF-8 (BOM stripped) if valid, otherwise `fallback`.
pub fn decode_bytes(bytes: Vec<u8>, fallback: &'static Encoding) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => match s.strip_prefix('\u{feff}') {
            Some(rest) => rest.to_string(),
            None => s,
        },
        Err(e) => {
            let bytes = e.into_bytes();
            log::debug!("text source is not UTF-8, decoding as {}", fallback.name());
            let (decoded, _, _) = fallback.decode(&bytes);
            decoded.into_owned()
        }
    }
}

/// Split delimited text into rows. Rows keep their own width.
pub fn parse_grid(content: &str, delimiter: u8) -> Result<Vec<Vec<String>>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut grid = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| format!("Failed to parse line {}: {}", row_idx + 1, e))?;
        grid.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_sniff_semicolon_delimiter() {
        let content = "A;1;x\nB;2;y\nC;3;z\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_sniff_comma_delimiter() {
        let content = "A,1,x\nB,2,y\n";
        assert_eq!(sniff_delimiter(content), b',');
    }

    #[test]
    fn test_sniff_pipe_delimiter() {
        let content = "001|ATM|100.00\n002|ATM|5.00\n";
        assert_eq!(sniff_delimiter(content), b'|');
    }

    #[test]
    fn test_sniff_ignores_commas_in_quoted_fields() {
        let content = "R1;\"1,250.00\";seq_num:1\nR2;\"3,000.00\";seq_num:2\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_sniff_single_column_defaults_to_comma() {
        assert_eq!(sniff_delimiter("abc\ndef\n"), b',');
        assert_eq!(sniff_delimiter(""), b',');
    }

    #[test]
    fn test_parse_grid_keeps_ragged_rows() {
        let grid = parse_grid("a,b,c\nd\n\"e,f\",g\n", b',').unwrap();
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[1], vec!["d"]);
        assert_eq!(grid[2], vec!["e,f", "g"]);
    }

    #[test]
    fn test_decode_strips_bom() {
        let fallback = resolve_encoding("windows-874").unwrap();
        let text = decode_bytes(b"\xef\xbb\xbfR1,x".to_vec(), fallback);
        assert_eq!(text, "R1,x");
    }

    #[test]
    fn test_decode_falls_back_to_thai() {
        let fallback = resolve_encoding("windows-874").unwrap();
        // "ก" in Windows-874
        let text = decode_bytes(vec![0xA1, b',', b'1'], fallback);
        assert_eq!(text, "\u{0E01},1");
    }

    #[test]
    fn test_unknown_encoding_label() {
        assert!(resolve_encoding("no-such-encoding").is_err());
        assert!(resolve_encoding(" UTF-8 ").is_ok());
    }

    #[test]
    fn test_read_grid_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("GLJV20251221_X-D251110.trf");
        fs::write(&path, "R1|OC|CH\nR2|OC|CH\n").unwrap();

        let fallback = resolve_encoding("windows-874").unwrap();
        let grid = read_grid(&path, fallback).unwrap();
        assert_eq!(grid, vec![vec!["R1", "OC", "CH"], vec!["R2", "OC", "CH"]]);
    }
}
