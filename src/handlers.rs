use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};
use uuid::Uuid;

use crate::auth::{self, Claims};
use crate::bland::CallProvider;
use crate::bland_types::SendCallRequest;
use crate::consts::{BCRYPT_COST, DEFAULT_BALANCE, DEFAULT_PASSWORD, DEFAULT_RECORD_URL};
use crate::db::{self, NewUser, Store};
use crate::db_types::{Voice, ROLE_ADMIN, ROLE_USER};
use crate::error::ApiError;
use crate::tasks;
use crate::types::AppState;

#[derive(Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginBody>,
) -> Result<impl IntoResponse, ApiError> {
    if !body.email.contains('@') {
        return Err(ApiError::Validation("Invalid email".to_string()));
    }
    if body.password.len() < 6 {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    let user = db::find_user_by_email(&state.db_pool, &body.email)
        .await?
        .ok_or(ApiError::Unauthorized("Invalid credentials"))?;
    if !bcrypt::verify(&body.password, &user.password).unwrap_or(false) {
        return Err(ApiError::Unauthorized("Invalid credentials"));
    }

    let token = auth::sign_token(&user, &state.config.jwt_secret)?;
    Ok(Json(json!({
        "success": true,
        "token": token,
        "userId": user.id,
        "role": user.role,
    })))
}

#[derive(Deserialize)]
pub struct AddUserBody {
    pub name: String,
    pub email: String,
    pub password: String,
    pub balance: Option<i32>,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub from: Option<String>,
}

pub async fn add_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AddUserBody>,
) -> Result<impl IntoResponse, ApiError> {
    let role = body.role.unwrap_or_else(|| ROLE_USER.to_string());
    if role != ROLE_USER && role != ROLE_ADMIN {
        return Err(ApiError::Validation(format!("Invalid role: {role}")));
    }

    let password = hash_password(&body.password)?;
    let user = db::insert_user(
        &state.db_pool,
        NewUser {
            name: body.name,
            email: body.email,
            password,
            balance: body.balance.unwrap_or(DEFAULT_BALANCE),
            role,
            phone: body.phone,
            from_number: body.from,
        },
    )
    .await?;

    Ok(Json(json!({ "success": true, "userId": user.id })))
}

pub async fn get_users(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let users = db::list_users(&state.db_pool).await?;
    Ok(Json(users))
}

#[derive(Deserialize, Default)]
pub struct SendCallBody {
    pub phone: Option<String>,
    pub prompt: Option<String>,
    pub voice: Option<String>,
    pub temperature: Option<f64>,
    pub interruption_threshold: Option<f64>,
    pub background_audio: Option<String>,
}

pub struct PlacedCall {
    pub call_id: String,
    pub user_email: String,
}

/// Call lifecycle: check balance, dispatch to the provider, then settle.  The
/// provider is never invoked for an exhausted or missing user; the debit
/// happens only after the provider confirms, and its conditional update keeps
/// concurrent requests from spending the same credit twice.
pub async fn place_call<S, P>(
    store: &S,
    provider: &P,
    user_id: Uuid,
    body: SendCallBody,
) -> Result<PlacedCall, ApiError>
where
    S: Store + Sync,
    P: CallProvider + Sync,
{
    let user = store
        .find_user(user_id)
        .await?
        .ok_or(ApiError::InsufficientBalance)?;
    if user.balance <= 0 {
        return Err(ApiError::InsufficientBalance);
    }

    let phone = body
        .phone
        .or_else(|| user.phone.clone())
        .ok_or_else(|| ApiError::Validation("No phone number provided or on file".to_string()))?;

    let request = SendCallRequest::new(
        phone,
        user.from_number.clone(),
        body.prompt,
        body.voice,
        body.temperature,
        body.interruption_threshold,
        body.background_audio,
    );
    let response = provider.send_call(&request).await?;

    if !store.debit_balance(user.id).await? {
        // A concurrent request spent the last credit after our check.
        warn!(user_id=%user.id, "balance exhausted between check and debit");
        return Err(ApiError::InsufficientBalance);
    }

    let record_url = response.record_url.as_deref().unwrap_or(DEFAULT_RECORD_URL);
    store.insert_call(user.id, record_url).await?;

    Ok(PlacedCall {
        call_id: response.call_id,
        user_email: user.email,
    })
}

pub async fn send_call(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    body: Option<Json<SendCallBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body.unwrap_or_else(|| Json(SendCallBody::default()));

    let placed = place_call(&state.db_pool, &state.bland, claims.user_id, body).await?;

    tasks::send_email(
        state.mailer.clone(),
        state.config.email_user.clone(),
        placed.user_email,
        "Call Follow-up",
        "Thanks for your time on the call!",
    );

    Ok(Json(json!({ "success": true, "callId": placed.call_id })))
}

pub async fn analyze_call(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let analysis = state.bland.analyze_call(&call_id).await?;
    Ok(Json(analysis))
}

pub async fn get_call_logs(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let logs = state.bland.call_logs().await?;
    Ok(Json(logs))
}

pub async fn stop_call(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let data = state.bland.stop_call(&call_id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Call stopped",
        "data": data,
    })))
}

pub async fn get_transcript(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let transcript = state.bland.transcript().await?;
    Ok(Json(transcript))
}

pub async fn get_user_calls(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let calls = db::calls_for_user(&state.db_pool, user_id).await?;
    Ok(Json(calls))
}

pub async fn get_user_stats(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = db::find_user(&state.db_pool, user_id)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    let total_calls = db::count_calls_for_user(&state.db_pool, user_id).await?;

    // Assumes the default starting balance of 10.
    Ok(Json(json!({
        "name": user.name,
        "balance": user.balance,
        "totalCalls": total_calls,
        "totalUsedBalance": DEFAULT_BALANCE - user.balance,
    })))
}

/// Syncs the provider's voice list into the local catalog, then returns the
/// whole catalog, including names from earlier syncs.
pub async fn sync_voices<S, P>(store: &S, provider: &P) -> Result<Vec<Voice>, ApiError>
where
    S: Store + Sync,
    P: CallProvider + Sync,
{
    let voices = provider.voices().await?;
    for voice in &voices {
        store
            .upsert_voice(&voice.name, voice.description.as_deref())
            .await?;
    }
    store.list_voices().await
}

pub async fn get_voices(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let catalog = sync_voices(&state.db_pool, &state.bland).await?;
    Ok(Json(catalog))
}

pub async fn recording_url<S>(store: &S, call_id: Uuid) -> Result<String, ApiError>
where
    S: Store + Sync,
{
    let call = store
        .find_call(call_id)
        .await?
        .ok_or(ApiError::NotFound("Call not found"))?;
    Ok(call.record_url)
}

pub async fn download_recording(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let url = recording_url(&state.db_pool, call_id).await?;
    Ok(Redirect::temporary(&url))
}

#[derive(Deserialize, Default)]
pub struct ReportCallBody {
    pub reason: Option<String>,
}

pub async fn report_call(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<String>,
    body: Option<Json<ReportCallBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body.unwrap_or_else(|| Json(ReportCallBody::default()));
    let reason = body.reason.unwrap_or_else(|| "Unspecified".to_string());
    let data = state.bland.report_call(&call_id, reason).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Call reported successfully",
        "data": data,
    })))
}

#[derive(Deserialize)]
pub struct AdminAddUserBody {
    pub name: String,
    pub email: String,
    pub balance: Option<i32>,
    pub phone: Option<String>,
    pub from: Option<String>,
}

/// Admin provisioning uses a fixed placeholder password; there is no reset or
/// initial-setup flow to hand it to the new user.
pub async fn admin_add_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AdminAddUserBody>,
) -> Result<impl IntoResponse, ApiError> {
    if db::find_user_by_email(&state.db_pool, &body.email)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("User already exists"));
    }

    let password = hash_password(DEFAULT_PASSWORD)?;
    let user = db::insert_user(
        &state.db_pool,
        NewUser {
            name: body.name,
            email: body.email,
            password,
            balance: body.balance.unwrap_or(DEFAULT_BALANCE),
            role: ROLE_USER.to_string(),
            phone: body.phone,
            from_number: body.from,
        },
    )
    .await?;

    Ok(Json(json!({ "success": true, "userId": user.id })))
}

pub async fn get_admin_stats(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let total_users = db::count_users(&state.db_pool).await?;
    let total_calls = db::count_calls(&state.db_pool).await?;
    let total_used_balance = db::total_used_balance(&state.db_pool).await?;

    Ok(Json(json!({
        "totalUsers": total_users,
        "totalCalls": total_calls,
        "totalUsedBalance": total_used_balance,
    })))
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    bcrypt::hash(password, BCRYPT_COST).map_err(|e| {
        error!(error=%e, "failed to hash password");
        ApiError::Internal("Failed to process password")
    })
}
