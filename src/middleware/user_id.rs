use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";

const MAX_USER_ID_CHARS: usize = 128;

/// Caller identity taken from the `X-User-Id` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .unwrap_or_default();

        if value.is_empty() || value.chars().count() > MAX_USER_ID_CHARS {
            return Err(AppError::Unauthorized(
                "Missing or invalid X-User-Id header".to_string(),
            ));
        }

        Ok(UserId(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<UserId, AppError> {
        let (mut parts, _) = request.into_parts();
        UserId::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_reads_trimmed_header() {
        let request = Request::builder()
            .header(USER_ID_HEADER, "  user-123 ")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.unwrap().as_str(), "user-123");
    }

    #[tokio::test]
    async fn test_rejects_missing_blank_and_oversized() {
        let missing = Request::builder().body(()).unwrap();
        assert!(matches!(extract(missing).await, Err(AppError::Unauthorized(_))));

        let blank = Request::builder()
            .header(USER_ID_HEADER, "   ")
            .body(())
            .unwrap();
        assert!(extract(blank).await.is_err());

        let oversized = Request::builder()
            .header(USER_ID_HEADER, "u".repeat(129))
            .body(())
            .unwrap();
        assert!(extract(oversized).await.is_err());
    }
}
