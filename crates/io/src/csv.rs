// CSV import sources, reference data and report export

use std::io::Read;
use std::path::Path;

use seatkeeper_recon::listing::{export_row, MissingTarget};
use seatkeeper_recon::{DistrictRegistry, Field, LegislatorRecord, ReconError, TabularSource};

/// Load an import/delete list. `.tsv` files are tab-separated; anything else
/// has its delimiter sniffed from the first lines.
pub fn load_source(path: &Path) -> Result<TabularSource, ReconError> {
    let content = read_file_as_utf8(path).map_err(|e| ReconError::Io(format!("{}: {e}", path.display())))?;
    let delimiter = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => sniff_delimiter(&content),
    };
    TabularSource::from_delimited_str(&content, delimiter)
}

/// Load the canonical district dataset. An unreadable file is a reference
/// data error, same as a malformed one.
pub fn load_registry(path: &Path) -> Result<DistrictRegistry, ReconError> {
    let content = read_file_as_utf8(path)
        .map_err(|e| ReconError::ReferenceData(format!("{}: {e}", path.display())))?;
    DistrictRegistry::from_csv_str(&content)
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// A candidate must split the header into more than one field. Candidates are scored by
/// lines matching the header's field count times that count; on equal scores the wider
/// split wins.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b',', b';', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;
    let mut best_width = 0usize;

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

        let target = counts[0];
        if target <= 1 {
            continue;
        }

        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;
        if score > best_score || (score == best_score && target > best_width) {
            best_score = score;
            best_width = target;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let mut file = std::fs::File::open(path).map_err(|e| e.to_string())?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| e.to_string())?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            // Spreadsheet exports of legislator lists are often Windows-1252
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

/// Write a missing-data listing with the target's export columns. Returns
/// the number of rows written.
pub fn export_listing(records: &[LegislatorRecord], target: MissingTarget, path: &Path) -> Result<usize, String> {
    export_records(records, target.export_columns(), path)
}

/// Write `records` as CSV with one column per field, header first.
pub fn export_records(records: &[LegislatorRecord], columns: &[Field], path: &Path) -> Result<usize, String> {
    let mut writer = csv::WriterBuilder::new().from_path(path).map_err(|e| e.to_string())?;

    let header: Vec<&str> = columns.iter().map(|f| f.key()).collect();
    writer.write_record(&header).map_err(|e| e.to_string())?;
    for record in records {
        writer.write_record(export_row(record, columns)).map_err(|e| e.to_string())?;
    }

    writer.flush().map_err(|e| e.to_string())?;
    Ok(records.len())
}

/// Write plain text lines (work lists, audit reports).
pub fn write_lines<I, S>(lines: I, path: &Path) -> Result<(), String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for line in lines {
        out.push_str(line.as_ref());
        out.push('\n');
    }
    std::fs::write(path, out).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use seatkeeper_recon::Level;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_sniff_ignores_semicolons_inside_contact_cells() {
        let content = "level,state,name,phones\nfed-upper,AL,A,555-0101;555-0102\n";
        assert_eq!(sniff_delimiter(content), b',');
    }

    #[test]
    fn test_sniff_tab_delimiter() {
        let content = "level\tstate\tname\nfed-upper\tAL\tA\n";
        assert_eq!(sniff_delimiter(content), b'\t');
    }

    #[test]
    fn test_sniff_pipe_delimiter() {
        let content = "level|state|name\nfed-upper|AL|A\n";
        assert_eq!(sniff_delimiter(content), b'|');
    }

    #[test]
    fn test_sniff_equal_scores_prefer_wider_split() {
        // comma: 3 lines x 2 fields, semicolon: 2 lines x 3 fields
        let content = "a;b,c;d\ne;f,g;h\ni,j;k\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_export_selection_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("selection.csv");
        let rec = LegislatorRecord::new(Level::FedUpper, "AK", "Lisa M");
        let written = export_records(&[rec], &[Field::State, Field::District, Field::Name], &path).unwrap();
        assert_eq!(written, 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "state,district,name\nAK,,Lisa M\n");
    }

    #[test]
    fn test_load_source_windows_1252() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("list.csv");
        let mut bytes = b"level,state,name\nfed-upper,NM,Jos".to_vec();
        bytes.push(0xE9); // é in Windows-1252
        bytes.extend_from_slice(b" Ortiz\n");
        fs::write(&path, bytes).unwrap();

        let source = load_source(&path).unwrap();
        assert_eq!(source.headers, ["level", "state", "name"]);
        assert_eq!(source.rows[0][2], "José Ortiz");
    }

    #[test]
    fn test_load_source_tsv_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("list.tsv");
        fs::write(&path, "level\tstate\nfed-upper\tAL\n").unwrap();
        let source = load_source(&path).unwrap();
        assert_eq!(source.rows[0], ["fed-upper", "AL"]);
    }

    #[test]
    fn test_missing_registry_is_reference_error() {
        let dir = tempdir().unwrap();
        let err = load_registry(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, ReconError::ReferenceData(_)));
    }

    #[test]
    fn test_export_audio_listing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audio.csv");
        let mut rec = LegislatorRecord::new(Level::StateLower, "VT", "Ann Bo").with_district("Addison-1");
        rec.title = "Representative".into();

        let written = export_listing(&[rec], MissingTarget::Audio, &path).unwrap();
        assert_eq!(written, 1);
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "level,state,district,title,name,pronunciation\nstate-lower,VT,Addison-1,Representative,Ann Bo,\n"
        );
    }

    #[test]
    fn test_write_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("work.txt");
        write_lines(["Senator A", "Senator B"], &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "Senator A\nSenator B\n");
    }
}
