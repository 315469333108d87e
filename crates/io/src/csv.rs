// CSV decoding into a single cell grid

use impactlens_analysis::{AnalysisError, CellValue};

/// Decode raw bytes, trying UTF-8 first and falling back to Windows-1252
/// (what Excel writes when saving "CSV" on Windows). A UTF-8 BOM is stripped.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Pick the delimiter that splits the leading lines most consistently.
/// Candidates: tab, semicolon, comma, pipe. Defaults to comma.
///
/// Each candidate is scored on its most common field count (above one) over
/// the sample, so a one-cell title line above the header does not rule a
/// delimiter out.
pub fn sniff_delimiter(content: &str) -> u8 {
    let sample: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(10)
        .collect();

    let mut best = b',';
    let mut best_score = 0usize;

    for &delim in &[b'\t', b';', b',', b'|'] {
        let mut tally: Vec<(usize, usize)> = Vec::new();
        for line in &sample {
            let width = field_count(line, delim);
            if width <= 1 {
                continue;
            }
            match tally.iter_mut().find(|(w, _)| *w == width) {
                Some((_, n)) => *n += 1,
                None => tally.push((width, 1)),
            }
        }

        // Lines agreeing on the most common width, weighted by that width
        let Some(score) = tally.iter().map(|&(width, lines)| width * lines).max() else {
            continue;
        };
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

fn field_count(line: &str, delim: u8) -> usize {
    ::csv::ReaderBuilder::new()
        .delimiter(delim)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(|r| r.ok())
        .map(|r| r.len())
        .unwrap_or(1)
}

/// Parse CSV bytes into a row-major grid. Every field is kept as text;
/// the normalizer does its own lenient parsing.
///
/// Empty lines come back as empty rows so row indices match file lines,
/// which is what a configured header row refers to.
pub fn read_grid(bytes: &[u8]) -> Result<Vec<Vec<CellValue>>, AnalysisError> {
    let content = decode_text(bytes);
    let delimiter = sniff_delimiter(&content);
    log::debug!("csv delimiter sniffed as {:?}", delimiter as char);

    let mut reader = ::csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut grid: Vec<Vec<CellValue>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| {
            let line = e.position().map_or(grid.len() + 1, |p| p.line() as usize);
            AnalysisError::Parse(format!("CSV line {}: {}", line, e))
        })?;

        if let Some(pos) = record.position() {
            for _ in 0..empty_lines_at(content.as_bytes(), pos.byte() as usize) {
                grid.push(Vec::new());
            }
        }
        grid.push(record.iter().map(CellValue::from).collect());
    }
    Ok(grid)
}

/// Empty lines the reader skips before the record that starts reading at
/// `start`. The reader resumes right after the previous record's `\r` when
/// it ended in CRLF, so a leading `\n` there still belongs to that record.
fn empty_lines_at(content: &[u8], start: usize) -> usize {
    let run = content
        .get(start..)
        .unwrap_or(&[])
        .iter()
        .take_while(|&&b| b == b'\n' || b == b'\r');

    let mut lines = 0;
    let mut prev = start.checked_sub(1).and_then(|i| content.get(i)).copied();
    for &b in run {
        // "\r\n" is one terminator
        if !(b == b'\n' && prev == Some(b'\r')) {
            lines += 1;
        }
        prev = Some(b);
    }
    lines
}
