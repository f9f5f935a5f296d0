//! Bulk content ingestion: pasted roster rows, roster CSV export, and
//! PDF text extraction for knowledge uploads.

use base64::Engine;

use conecta_store::fiscales::{FiscalRole, FiscalRow};

/// Column order of a pasted roster row.
pub const ROSTER_COLUMNS: usize = 6;

/// CSV header for roster export, matching the spreadsheet admins paste from.
pub const ROSTER_CSV_HEADER: [&str; ROSTER_COLUMNS] =
    ["Apellido y Nombre", "DNI", "Rol", "Escuela", "Mesa", "Telefono"];

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(String),

    #[error("PDF extraction failed: {0}")]
    PdfExtraction(String),

    /// The PDF decoded fine but yielded no text (scanned images, empty file).
    #[error("PDF contains no extractable text")]
    NoText,

    #[error("CSV write failed: {0}")]
    Csv(String),
}

/// One accepted roster row, ready to insert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterEntry {
    pub full_name: String,
    pub dni: String,
    pub role: FiscalRole,
    pub school: String,
    pub mesa: String,
    pub phone: String,
}

/// Parse pasted bulk text into roster entries.
///
/// One row per line. A line splits on TAB if it contains one, otherwise
/// on comma. A row is accepted iff it yields exactly six columns, all
/// non-empty after trimming, and the role column parses. Everything else
/// counts as skipped. Blank lines are ignored entirely.
pub fn parse_roster(data: &str) -> (Vec<RosterEntry>, usize) {
    let mut entries = Vec::new();
    let mut skipped = 0;

    for line in data.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let cells: Vec<&str> = if line.contains('\t') {
            line.split('\t').map(str::trim).collect()
        } else {
            line.split(',').map(str::trim).collect()
        };

        if cells.len() != ROSTER_COLUMNS || cells.iter().any(|c| c.is_empty()) {
            skipped += 1;
            continue;
        }

        let Ok(role) = cells[2].to_lowercase().parse::<FiscalRole>() else {
            skipped += 1;
            continue;
        };

        entries.push(RosterEntry {
            full_name: cells[0].to_string(),
            dni: cells[1].to_string(),
            role,
            school: cells[3].to_string(),
            mesa: cells[4].to_string(),
            phone: cells[5].to_string(),
        });
    }

    (entries, skipped)
}

/// Render the roster as RFC-4180 CSV with the export header.
pub fn roster_csv(fiscales: &[FiscalRow]) -> Result<String, IngestError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(ROSTER_CSV_HEADER)
        .map_err(|e| IngestError::Csv(e.to_string()))?;
    for fiscal in fiscales {
        writer
            .write_record([
                fiscal.full_name.as_str(),
                fiscal.dni.as_str(),
                &fiscal.role.to_string(),
                fiscal.school.as_str(),
                fiscal.mesa.as_str(),
                fiscal.phone.as_str(),
            ])
            .map_err(|e| IngestError::Csv(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| IngestError::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| IngestError::Csv(e.to_string()))
}

/// Decode a base64 PDF and extract its text.
pub fn extract_pdf_text(pdf_base64: &str) -> Result<String, IngestError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(pdf_base64.trim())
        .map_err(|e| IngestError::InvalidBase64(e.to_string()))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .map_err(|e| IngestError::PdfExtraction(e.to_string()))?;

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(IngestError::NoText);
    }
    Ok(text)
}
