use axum::{Extension, Json, extract::State, response::IntoResponse};

use parley_db::models::UserRow;
use parley_types::api::{Claims, UserResponse};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::messages::{parse_timestamp, parse_uuid};

/// Current user, without the password hash or OTP state.
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .get_user_by_id(&claims.sub.to_string())?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(user_to_response(user)))
}

/// Everyone except the caller, for picking a chat partner.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.db.list_users_except(&claims.sub.to_string())?;
    let users: Vec<UserResponse> = users.into_iter().map(user_to_response).collect();

    Ok(Json(users))
}

fn user_to_response(row: UserRow) -> UserResponse {
    let context = format!("user {}", row.id);
    UserResponse {
        id: parse_uuid(&row.id, "user id"),
        username: row.username,
        email: row.email,
        created_at: parse_timestamp(&row.created_at, &context),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AppStateInner;
    use axum::body::to_bytes;
    use parley_db::Database;
    use parley_mail::{Mailer, RecordingMailer};
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    fn test_state() -> AppState {
        Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            mailer: Mailer::Recording(RecordingMailer::new()),
            jwt_secret: "test-secret".into(),
            otp_ttl: Duration::from_secs(300),
        })
    }

    fn add_user(state: &AppState, username: &str, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        state
            .db
            .create_user(&id.to_string(), username, email, "hash", "123456", "2030-01-01T00:00:00Z")
            .unwrap();
        id
    }

    fn claims_for(user_id: Uuid, username: &str) -> Claims {
        Claims {
            sub: user_id,
            username: username.into(),
            exp: usize::MAX,
        }
    }

    #[tokio::test]
    async fn profile_omits_password_and_otp() {
        let state = test_state();
        let a = add_user(&state, "alice", "a@x.com");

        let resp = get_profile(State(state.clone()), Extension(claims_for(a, "alice")))
            .await
            .unwrap()
            .into_response();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(json["username"], "alice");
        assert_eq!(json["email"], "a@x.com");
        assert!(json.get("password").is_none());
        assert!(json.get("otp").is_none());
        assert!(json.get("otp_verified").is_none());
    }

    #[tokio::test]
    async fn profile_for_deleted_user_not_found() {
        let state = test_state();

        let result = get_profile(
            State(state.clone()),
            Extension(claims_for(Uuid::new_v4(), "ghost")),
        )
        .await;
        assert!(matches!(result, Err(ApiError::NotFound)));
    }

    #[tokio::test]
    async fn users_lists_everyone_but_the_caller() {
        let state = test_state();
        let a = add_user(&state, "alice", "a@x.com");
        let b = add_user(&state, "bob", "b@x.com");

        let resp = list_users(State(state.clone()), Extension(claims_for(a, "alice")))
            .await
            .unwrap()
            .into_response();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let users: Vec<UserResponse> = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, b);
    }
}
