use crate::models::{plan_catalog, Plan};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ListPlansResponse {
    pub plans: Vec<Plan>,
}

pub async fn list_plans() -> Json<ListPlansResponse> {
    Json(ListPlansResponse {
        plans: plan_catalog(),
    })
}
