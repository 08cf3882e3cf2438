/// Contact form endpoints
///
/// - `POST   /api/contact` - Public submission (rate limited), 201
/// - `GET    /api/contact` - List submissions (admin; `status`, `page`, `limit`)
/// - `GET    /api/contact/:id` - One submission (admin)
/// - `PUT    /api/contact/:id/status` - Triage (admin)
/// - `DELETE /api/contact/:id` - Delete (admin)
///
/// New submissions are pushed to the `admin-dashboard` room as `new-contact`.

use crate::{
    app::AppState,
    error::{ApiError, ApiResponse, ApiResult, ValidatedJson},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use portal_shared::{
    models::{
        contact::{Contact, ContactStatus, CreateContact},
        Page, Pagination, DEFAULT_PAGE_SIZE,
    },
    realtime::{protocol::ADMIN_DASHBOARD_ROOM, ServerEvent},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct ContactRequest {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(max = 50, message = "Phone must be at most 50 characters"))]
    pub phone: Option<String>,

    #[validate(length(max = 255, message = "Company must be at most 255 characters"))]
    pub company: Option<String>,

    #[validate(length(max = 255, message = "Subject must be at most 255 characters"))]
    pub subject: Option<String>,

    #[validate(length(min = 1, max = 5000, message = "Message must be 1 to 5000 characters"))]
    pub message: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl From<ContactRequest> for CreateContact {
    fn from(req: ContactRequest) -> Self {
        CreateContact {
            name: req.name.trim().to_string(),
            email: req.email.trim().to_string(),
            phone: non_empty(req.phone),
            company: non_empty(req.company),
            subject: non_empty(req.subject),
            message: req.message.trim().to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListContactsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<ContactStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateContactStatusRequest {
    pub status: ContactStatus,
}

pub async fn submit_contact(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ContactRequest>,
) -> ApiResult<(StatusCode, ApiResponse<Contact>)> {
    let contact = Contact::create(&state.db, req.into()).await?;

    tracing::info!(contact_id = %contact.id, "Contact form submitted");

    match serde_json::to_value(&contact) {
        Ok(payload) => {
            state
                .hub
                .emit_to_room(ADMIN_DASHBOARD_ROOM, ServerEvent::NewContact(payload), None)
                .await;
        }
        Err(e) => tracing::warn!(error = %e, "Could not serialize contact for dashboard"),
    }

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(contact, "Thank you for your message. We'll get back to you soon."),
    ))
}

pub async fn list_contacts(
    State(state): State<AppState>,
    Query(query): Query<ListContactsQuery>,
) -> ApiResult<ApiResponse<Page<Contact>>> {
    let pagination = Pagination::new(
        query.page.unwrap_or(1),
        query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
    );

    let contacts = Contact::list(&state.db, query.status, pagination).await?;
    let total = Contact::count(&state.db, query.status).await?;

    Ok(ApiResponse::ok(Page::new(contacts, total, pagination)))
}

pub async fn get_contact(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<Contact>> {
    let contact = Contact::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Contact not found".to_string()))?;

    Ok(ApiResponse::ok(contact))
}

pub async fn update_contact_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateContactStatusRequest>,
) -> ApiResult<ApiResponse<Contact>> {
    let contact = Contact::update_status(&state.db, id, req.status)
        .await?
        .ok_or_else(|| ApiError::NotFound("Contact not found".to_string()))?;

    tracing::info!(contact_id = %id, status = contact.status.as_str(), "Contact status updated");

    Ok(ApiResponse::with_message(contact, "Contact status updated"))
}

pub async fn delete_contact(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    if !Contact::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Contact not found".to_string()));
    }

    tracing::info!(contact_id = %id, "Contact deleted");

    Ok(ApiResponse::with_message((), "Contact deleted"))
}
