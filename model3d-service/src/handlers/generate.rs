use crate::models::{GenerateRequest, GenerateResponse};
use crate::startup::AppState;
use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
    Extension, Form, Json,
};
use serde::Deserialize;
use serde_json::Value;
use service_core::error::AppError;
use service_core::middleware::RequestId;
use tracing::Instrument;

/// Fields as they arrive on the wire, before coercion.
#[derive(Debug, Default, Deserialize)]
struct RawGenerateFields {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    memory_id: Option<String>,
    #[serde(default)]
    enable_pbr: Option<Value>,
}

impl RawGenerateFields {
    fn into_request(self) -> Result<GenerateRequest, AppError> {
        let enable_pbr = match self.enable_pbr {
            Some(value) => parse_flag(&value)?,
            None => false,
        };

        Ok(GenerateRequest {
            user_id: self.user_id,
            memory_id: self.memory_id.unwrap_or_default(),
            enable_pbr,
        })
    }
}

/// Accepts `true/false`, `1/0`, `yes/no` and `on/off`.
fn parse_flag(value: &Value) -> Result<bool, AppError> {
    let invalid = || AppError::BadRequest(anyhow::anyhow!("enable_pbr must be a boolean"));
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Null => Ok(false),
        Value::Number(n) => match n.as_u64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(invalid()),
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" | "" => Ok(false),
            _ => Err(invalid()),
        },
        _ => Err(invalid()),
    }
}

/// `POST /generate-3d` body: multipart form, urlencoded form or JSON.
#[derive(Debug)]
pub struct GenerateForm(pub GenerateRequest);

#[async_trait]
impl<S> FromRequest<S> for GenerateForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let fields = if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid multipart body: {}", e)))?;
            read_multipart(&mut multipart).await?
        } else if content_type.starts_with("application/json") {
            let Json(fields) = Json::<RawGenerateFields>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid JSON body: {}", e)))?;
            fields
        } else {
            let Form(fields) = Form::<RawGenerateFields>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid form body: {}", e)))?;
            fields
        };

        Ok(GenerateForm(fields.into_request()?))
    }
}

async fn read_multipart(multipart: &mut Multipart) -> Result<RawGenerateFields, AppError> {
    let mut fields = RawGenerateFields::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid multipart field: {}", e)))?;

        match name.as_str() {
            "user_id" => fields.user_id = Some(value),
            "memory_id" => fields.memory_id = Some(value),
            "enable_pbr" => fields.enable_pbr = Some(Value::String(value)),
            _ => {}
        }
    }

    Ok(fields)
}

/// Generate an STL for a memory's figurine image and store it.
pub async fn generate_3d(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    GenerateForm(request): GenerateForm,
) -> Result<Json<GenerateResponse>, AppError> {
    let request_id = request_id
        .map(|Extension(id)| id.0)
        .unwrap_or_else(|| "-".to_string());

    let span = tracing::info_span!(
        "generate_3d",
        request_id = %request_id,
        memory_id = %request.memory_id,
        provider = state.generation.provider_name(),
    );

    let response = state.generation.generate(request).instrument(span).await?;

    Ok(Json(response))
}
