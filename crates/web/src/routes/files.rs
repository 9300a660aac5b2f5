//! Order file downloads, proxied from the backend with the visitor's tokens.

use axum::{
    extract::{Path, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use copyhub_core::FileId;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// `Content-Disposition` value that saves the file under its own name.
fn attachment(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .filter(|c| *c != '"' && *c != '\\')
        .collect();
    let encoded: String = url::form_urlencoded::byte_serialize(file_name.as_bytes())
        .collect::<String>()
        .replace('+', "%20");
    format!("attachment; filename=\"{ascii}\"; filename*=UTF-8''{encoded}")
}

/// Stream an order file to its customer, agency or an admin.
#[instrument(skip(state, visitor), fields(file_id = %id))]
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<FileId>,
    RequireAuth(visitor): RequireAuth,
) -> Result<Response> {
    let file = state.api().download_file(&visitor.session, id).await?;

    let content_type = HeaderValue::from_str(&file.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&attachment(&file.file_name))
        .map_err(|e| AppError::Internal(format!("bad file name header: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CACHE_CONTROL, HeaderValue::from_static("private, no-store")),
        ],
        file.data,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_header() {
        assert_eq!(
            attachment("thesis.pdf"),
            "attachment; filename=\"thesis.pdf\"; filename*=UTF-8''thesis.pdf"
        );
        assert_eq!(
            attachment("my \"notes\".pdf"),
            "attachment; filename=\"my notes.pdf\"; filename*=UTF-8''my%20%22notes%22.pdf"
        );
        assert!(attachment("café.pdf").starts_with("attachment; filename=\"caf_.pdf\""));
    }
}
