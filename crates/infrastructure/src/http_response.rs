use rolewarden_core::{AppError, AppResult};

/// Passes successful responses through and turns every other status into
/// an `ExternalApi` error carrying the response body.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    action: &str,
) -> AppResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<response body unavailable>".to_owned());
    Err(AppError::ExternalApi(format!(
        "{action} failed with status {status}: {body}"
    )))
}

/// Maps a transport failure into an `ExternalApi` error.
pub(crate) fn transport_error(action: &str, error: reqwest::Error) -> AppError {
    AppError::ExternalApi(format!("{action} transport error: {error}"))
}
