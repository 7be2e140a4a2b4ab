use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method, StatusCode,
    },
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::access::{AccessError, OwnedEntity, OwnedRecords};
use crate::auth::{self, BearerToken, MaybeIdentity};
use crate::error::{AppError, AppResult};
use crate::models::{
    Credentials, LoginResponse, Project, ProjectInput, RecordIdResponse, SignupResponse, Skill,
    SkillInput, WhoamiResponse,
};
use crate::state::AppState;
use crate::validation::{decode_json, Validate};

/// An entity exposed as a REST collection.
pub trait Collection: OwnedEntity {
    type Input: Validate<Output = Self::Fields> + DeserializeOwned + Send + 'static;

    fn records(state: &AppState) -> &OwnedRecords<Self>;
}

impl Collection for Skill {
    type Input = SkillInput;

    fn records(state: &AppState) -> &OwnedRecords<Self> {
        &state.skills
    }
}

impl Collection for Project {
    type Input = ProjectInput;

    fn records(state: &AppState) -> &OwnedRecords<Self> {
        &state.projects
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    Router::new()
        .route("/health", get(health))
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/skills", get(list::<Skill>).post(create::<Skill>))
        .route(
            "/skills/:id",
            get(show::<Skill>).put(update::<Skill>).delete(remove::<Skill>),
        )
        .route("/projects", get(list::<Project>).post(create::<Project>))
        .route(
            "/projects/:id",
            get(show::<Project>).put(update::<Project>).delete(remove::<Project>),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn signup(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<SignupResponse>)> {
    let payload: Credentials = decode_json(&body).map_err(AccessError::from)?;
    let created = auth::signup(&state, &payload.username, &payload.password).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn login(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> AppResult<Json<LoginResponse>> {
    let payload: Credentials = decode_json(&body).map_err(AccessError::from)?;
    Ok(Json(auth::login(&state, &payload.username, &payload.password).await?))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> AppResult<StatusCode> {
    auth::logout(&state, &token).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn me(MaybeIdentity(caller): MaybeIdentity) -> AppResult<Json<WhoamiResponse>> {
    let caller = caller.ok_or(AppError::Access(AccessError::Unauthenticated))?;
    Ok(Json(WhoamiResponse {
        user_id: caller.user_id,
        username: caller.username,
    }))
}

async fn list<E: Collection>(
    State(state): State<Arc<AppState>>,
    MaybeIdentity(caller): MaybeIdentity,
) -> AppResult<Json<Vec<E>>> {
    Ok(Json(E::records(&state).list(caller.as_ref()).await?))
}

async fn show<E: Collection>(
    State(state): State<Arc<AppState>>,
    MaybeIdentity(caller): MaybeIdentity,
    Path(id): Path<String>,
) -> AppResult<Json<Option<E>>> {
    Ok(Json(E::records(&state).get(caller.as_ref(), &id).await?))
}

async fn create<E: Collection>(
    State(state): State<Arc<AppState>>,
    MaybeIdentity(caller): MaybeIdentity,
    body: Bytes,
) -> AppResult<(StatusCode, Json<RecordIdResponse>)> {
    // Anonymous callers are turned away before their body is even decoded.
    let caller = caller.ok_or(AccessError::Unauthenticated)?;
    let input: E::Input = decode_json(&body).map_err(AccessError::from)?;
    let fields = input.validate().map_err(AccessError::from)?;

    let id = E::records(&state).create(Some(&caller), fields).await?;
    Ok((StatusCode::CREATED, Json(RecordIdResponse { id })))
}

async fn update<E: Collection>(
    State(state): State<Arc<AppState>>,
    MaybeIdentity(caller): MaybeIdentity,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<Json<RecordIdResponse>> {
    let caller = caller.ok_or(AccessError::Unauthenticated)?;
    let input: E::Input = decode_json(&body).map_err(AccessError::from)?;
    let fields = input.validate().map_err(AccessError::from)?;

    let id = E::records(&state).update(Some(&caller), &id, fields).await?;
    Ok(Json(RecordIdResponse { id }))
}

async fn remove<E: Collection>(
    State(state): State<Arc<AppState>>,
    MaybeIdentity(caller): MaybeIdentity,
    Path(id): Path<String>,
) -> AppResult<Json<RecordIdResponse>> {
    let id = E::records(&state).delete(caller.as_ref(), &id).await?;
    Ok(Json(RecordIdResponse { id }))
}
