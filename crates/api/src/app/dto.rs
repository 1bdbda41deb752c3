use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub file: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
