//! Document ingestion: turns uploaded PDFs into the plain text the pipeline
//! consumes. Extraction runs on the blocking pool; `pdf-extract` is CPU-bound
//! and can panic on malformed files.

use axum::extract::Multipart;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::analysis::models::{AnalysisRequest, BuyerProfile};
use crate::errors::AppError;

/// Below this many non-whitespace characters a PDF is treated as a scan
/// without a text layer.
const MIN_TEXT_CHARS: usize = 50;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Extracts and normalises the text of one PDF. `label` names the document
/// in error messages ("disclosure", "inspection").
pub async fn extract_pdf_text(bytes: Bytes, label: &'static str) -> Result<String, AppError> {
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(AppError::Validation(format!(
            "The {label} upload is not a PDF file"
        )));
    }

    let size = bytes.len();
    let extracted = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| {
            warn!(document = label, error = %e, "PDF extraction task aborted");
            AppError::UnprocessableEntity(format!("The {label} PDF could not be read"))
        })?
        .map_err(|e| {
            warn!(document = label, error = %e, "PDF extraction failed");
            AppError::UnprocessableEntity(format!("The {label} PDF could not be read: {e}"))
        })?;

    let text = normalize_whitespace(&extracted);
    let meaningful = text.chars().filter(|c| !c.is_whitespace()).count();
    debug!(document = label, bytes = size, chars = meaningful, "Extracted PDF text");

    if meaningful < MIN_TEXT_CHARS {
        return Err(AppError::UnprocessableEntity(format!(
            "The {label} PDF contains no readable text. It may be a scanned image; \
            please upload a text-based PDF."
        )));
    }

    Ok(text)
}

/// Trims each line, collapses runs of spaces, and keeps at most one blank
/// line between paragraphs.
fn normalize_whitespace(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0;

    for line in raw.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            blank_run += 1;
            if blank_run == 1 && !out.is_empty() {
                out.push('\n');
            }
            continue;
        }
        blank_run = 0;
        out.push_str(&collapsed);
        out.push('\n');
    }

    out.trim_end().to_string()
}

/// Reads the upload form: two PDF files plus price, optional buyer profile
/// (JSON string) and optional address.
pub async fn read_upload_form(mut multipart: Multipart) -> Result<AnalysisRequest, AppError> {
    let mut disclosure: Option<Bytes> = None;
    let mut inspection: Option<Bytes> = None;
    let mut property_price: Option<f64> = None;
    let mut buyer_profile = BuyerProfile::default();
    let mut address: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "disclosure" => disclosure = Some(read_bytes(field).await?),
            "inspection" => inspection = Some(read_bytes(field).await?),
            "property_price" => {
                let raw = read_text(field).await?;
                let price = raw.trim().replace([',', '$'], "").parse::<f64>().map_err(|_| {
                    AppError::Validation(format!("property_price is not a number: {raw}"))
                })?;
                property_price = Some(price);
            }
            "buyer_profile" => {
                let raw = read_text(field).await?;
                if !raw.trim().is_empty() {
                    buyer_profile = serde_json::from_str(&raw).map_err(|e| {
                        AppError::Validation(format!("buyer_profile is not valid JSON: {e}"))
                    })?;
                }
            }
            "address" => {
                let raw = read_text(field).await?;
                address = Some(raw.trim().to_string()).filter(|a| !a.is_empty());
            }
            other => debug!(field = other, "Ignoring unknown upload field"),
        }
    }

    let disclosure =
        disclosure.ok_or_else(|| AppError::Validation("Missing 'disclosure' PDF".to_string()))?;
    let inspection =
        inspection.ok_or_else(|| AppError::Validation("Missing 'inspection' PDF".to_string()))?;
    let property_price = property_price
        .ok_or_else(|| AppError::Validation("Missing 'property_price'".to_string()))?;

    let (disclosure_text, inspection_text) = tokio::try_join!(
        extract_pdf_text(disclosure, "disclosure"),
        extract_pdf_text(inspection, "inspection"),
    )?;

    Ok(AnalysisRequest {
        disclosure_text,
        inspection_text,
        property_price,
        buyer_profile,
        address,
    })
}

async fn read_bytes(field: axum::extract::multipart::Field<'_>) -> Result<Bytes, AppError> {
    field
        .bytes()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read form field: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_spaces_and_blank_lines() {
        let raw = "  SELLER   DISCLOSURE   \n\n\n\nRoof:   no known  leaks\n   \nBasement: dry  ";
        assert_eq!(
            normalize_whitespace(raw),
            "SELLER DISCLOSURE\n\nRoof: no known leaks\n\nBasement: dry"
        );
    }

    #[test]
    fn test_normalize_empty_input() {
        assert_eq!(normalize_whitespace(" \n\t\n "), "");
    }

    #[tokio::test]
    async fn test_non_pdf_upload_is_rejected() {
        let result = extract_pdf_text(Bytes::from_static(b"hello, not a pdf"), "inspection").await;
        assert!(matches!(result, Err(AppError::Validation(msg)) if msg.contains("inspection")));
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_unprocessable() {
        let result = extract_pdf_text(Bytes::from_static(b"%PDF-1.7\ngarbage"), "disclosure").await;
        assert!(matches!(result, Err(AppError::UnprocessableEntity(_))));
    }
}
