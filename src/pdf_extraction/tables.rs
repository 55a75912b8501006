// Best-effort table side-channel
//
// Tables never feed sentence scoring; their rows are handed to the categorizer as
// supplementary section data. Every failure here is downgraded to a diagnostic.
use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::time::Duration;

use super::lopdf_helper::LoadedPdf;
use super::ocr_engine::CommandRunner;
use crate::config::TableTool;
use crate::types::{Diagnostic, Page, Table};

const TABLE_TIMEOUT: Duration = Duration::from_secs(120);
const MIN_TABLE_ROWS: usize = 3;

static COLUMN_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}|\t|\|").unwrap());
static CAMELOT_PAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"page-(\d+)").unwrap());

/// Run the configured table tool. `Auto` tries camelot, tabula, then the
/// built-in layout heuristic, stopping at the first that yields tables.
pub fn extract_tables(pdf: &LoadedPdf, pages: &[Page], tool: TableTool) -> (Vec<Table>, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();
    let attempts: &[TableTool] = match tool {
        TableTool::None => return (Vec::new(), diagnostics),
        TableTool::Camelot => &[TableTool::Camelot],
        TableTool::Tabula => &[TableTool::Tabula],
        TableTool::Auto => &[TableTool::Camelot, TableTool::Tabula, TableTool::Auto],
    };

    for attempt in attempts {
        let (name, result) = match attempt {
            TableTool::Camelot => ("camelot", run_camelot(pdf)),
            TableTool::Tabula => ("tabula", run_tabula(pdf)),
            _ => ("layout", Ok(detect_layout_tables(pages))),
        };
        match result {
            Ok(tables) if !tables.is_empty() => {
                tracing::info!("{} recovered {} tables", name, tables.len());
                return (tables, diagnostics);
            }
            Ok(_) => tracing::debug!("{} found no tables", name),
            Err(e) => {
                tracing::warn!("table extraction with {} failed: {:#}", name, e);
                diagnostics.push(Diagnostic::TableExtractionFailed {
                    tool: name.to_string(),
                    reason: format!("{:#}", e),
                });
            }
        }
    }
    (Vec::new(), diagnostics)
}

fn write_input(pdf: &LoadedPdf, dir: &Path) -> Result<String> {
    let input = dir.join("input.pdf");
    std::fs::write(&input, pdf.bytes())?;
    Ok(input.to_string_lossy().into_owned())
}

fn run_camelot(pdf: &LoadedPdf) -> Result<Vec<Table>> {
    let dir = tempfile::tempdir()?;
    let input = write_input(pdf, dir.path())?;
    let output = dir.path().join("tables.csv");
    let args = vec![
        "--format".to_string(),
        "csv".to_string(),
        "--output".to_string(),
        output.to_string_lossy().into_owned(),
        "stream".to_string(),
        input,
    ];
    CommandRunner::new(TABLE_TIMEOUT)?.run("camelot", &args)?;

    // camelot writes one file per table: tables-page-<n>-table-<m>.csv
    let mut files: Vec<_> = std::fs::read_dir(dir.path())?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().map_or(false, |ext| ext == "csv"))
        .collect();
    files.sort();

    let mut tables = Vec::new();
    for file in files {
        let name = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let page = CAMELOT_PAGE
            .captures(&name)
            .and_then(|c| c[1].parse::<usize>().ok())
            .map(|p| p.saturating_sub(1));
        let rows = parse_csv(&std::fs::read(&file)?)?;
        if !rows.is_empty() {
            tables.push(Table { page, rows });
        }
    }
    Ok(tables)
}

fn run_tabula(pdf: &LoadedPdf) -> Result<Vec<Table>> {
    let dir = tempfile::tempdir()?;
    let input = write_input(pdf, dir.path())?;
    let args = vec![
        "-f".to_string(),
        "CSV".to_string(),
        "-p".to_string(),
        "all".to_string(),
        input,
    ];
    let output = CommandRunner::new(TABLE_TIMEOUT)?.run("tabula", &args)?;
    let rows = parse_csv(&output.stdout)?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![Table { page: None, rows }])
}

fn parse_csv(data: &[u8]) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| anyhow!("malformed CSV: {}", e))?;
        let row: Vec<String> = record.iter().map(|cell| cell.trim().to_string()).collect();
        if row.iter().any(|cell| !cell.is_empty()) {
            rows.push(row);
        }
    }
    Ok(rows)
}

fn column_count(line: &str) -> usize {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return 0;
    }
    COLUMN_GAP.split(trimmed).filter(|c| !c.trim().is_empty()).count()
}

/// Runs of consecutive lines that split into the same number (≥ 2) of columns.
pub fn detect_layout_tables(pages: &[Page]) -> Vec<Table> {
    let mut tables = Vec::new();
    for page in pages {
        let lines: Vec<&str> = page.text.lines().collect();
        let mut run: Vec<&str> = Vec::new();
        let mut run_columns = 0;

        let flush = |run: &mut Vec<&str>, tables: &mut Vec<Table>| {
            if run.len() >= MIN_TABLE_ROWS {
                let rows = run
                    .iter()
                    .map(|line| {
                        COLUMN_GAP
                            .split(line.trim())
                            .map(|c| c.trim().to_string())
                            .filter(|c| !c.is_empty())
                            .collect::<Vec<String>>()
                    })
                    .collect();
                tables.push(Table { page: Some(page.index), rows });
            }
            run.clear();
        };

        for line in lines {
            let columns = column_count(line);
            if columns >= 2 && (run.is_empty() || columns == run_columns) {
                run_columns = columns;
                run.push(line);
            } else {
                flush(&mut run, &mut tables);
                if columns >= 2 {
                    run_columns = columns;
                    run.push(line);
                }
            }
        }
        flush(&mut run, &mut tables);
    }
    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExtractionMethod;

    fn page(text: &str) -> Page {
        Page::new(0, text.to_string(), ExtractionMethod::Native)
    }

    #[test]
    fn test_layout_heuristic_finds_aligned_rows() {
        let text = "Financial highlights\n\
                    Revenue      4.2     3.7\n\
                    EBITDA       1.1     0.9\n\
                    Net profit   0.6     0.4\n\
                    The board recommends a dividend.";
        let tables = detect_layout_tables(&[page(text)]);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows.len(), 3);
        assert_eq!(tables[0].rows[1], vec!["EBITDA", "1.1", "0.9"]);
    }

    #[test]
    fn test_prose_has_no_tables() {
        let text = "Revenue grew this year.\nMargins improved on lower costs.\nOutlook is stable.";
        assert!(detect_layout_tables(&[page(text)]).is_empty());
    }

    #[test]
    fn test_parse_csv_skips_blank_rows() {
        let rows = parse_csv(b"Revenue,4.2\n,\nEBIT,1.0\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["EBIT", "1.0"]);
    }
}
