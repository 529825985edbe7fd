use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use ruzma_core::error::AppError;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "X-User-ID";

/// Caller identity forwarded by the trusted frontend in `X-User-ID`.
///
/// Row-level ownership is enforced by scoping every query to this id.
#[derive(Debug, Clone, Copy)]
pub struct UserId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::AuthError(anyhow::anyhow!("Missing X-User-ID header")))?;

        let user_id = Uuid::parse_str(raw.trim()).map_err(|_| {
            AppError::AuthError(anyhow::anyhow!("X-User-ID header is not a valid UUID"))
        })?;

        Ok(UserId(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<UserId, AppError> {
        let mut builder = Request::builder().uri("/v1/subscription");
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        UserId::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_uuid_from_header() {
        let id = Uuid::new_v4();
        let UserId(extracted) = extract(Some(&id.to_string())).await.unwrap();
        assert_eq!(extracted, id);
    }

    #[tokio::test]
    async fn missing_header_is_auth_error() {
        assert!(matches!(extract(None).await, Err(AppError::AuthError(_))));
    }

    #[tokio::test]
    async fn malformed_header_is_auth_error() {
        assert!(matches!(
            extract(Some("user-42")).await,
            Err(AppError::AuthError(_))
        ));
    }
}
