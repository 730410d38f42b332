//! Image upload and download handlers.
//!
//! Uploaded bytes are stored content-addressed under the images
//! directory as `<sha256>.<ext>`; the block row only carries the URL of
//! the serving endpoint. Re-uploading identical bytes reuses the file,
//! so deleting an image block leaves the file behind for any other
//! block that references it.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::Multipart;
use sha2::{Digest, Sha256};

use crate::compose::insertion_key;
use crate::storage::{now_secs, NoteImageRow};
use crate::web::auth::require_user;
use crate::web::config::MAX_IMAGE_SIZE;
use crate::web::handlers::blocks::{can_edit_block, resolve_note_ref};
use crate::web::state::SharedState;
use crate::web::utils::{api_error, load_blocks, storage_error_response};

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

fn content_type_for(name: &str) -> &'static str {
    match name.rsplit('.').next() {
        Some("png") => "image/png",
        Some("jpg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Upload an image to a note. Multipart fields: `file` (required) and
/// `after_id` (optional insert anchor; default is append).
pub async fn upload_image_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(note_ref): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let mut file_data: Option<Vec<u8>> = None;
    let mut content_type: Option<String> = None;
    let mut after_id: Option<String> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                content_type = field.content_type().map(|ct| ct.to_string());
                match field.bytes().await {
                    Ok(bytes) => {
                        if bytes.len() as u64 > MAX_IMAGE_SIZE {
                            return api_error(
                                StatusCode::PAYLOAD_TOO_LARGE,
                                format!("image exceeds maximum size of {} bytes", MAX_IMAGE_SIZE),
                            );
                        }
                        file_data = Some(bytes.to_vec());
                    }
                    Err(e) => {
                        return api_error(StatusCode::BAD_REQUEST, format!("failed to read file: {e}"))
                    }
                }
            }
            "after_id" => {
                if let Ok(text) = field.text().await {
                    if !text.is_empty() {
                        after_id = Some(text);
                    }
                }
            }
            _ => {}
        }
    }

    let data = match file_data {
        Some(data) if !data.is_empty() => data,
        _ => return api_error(StatusCode::BAD_REQUEST, "missing file field"),
    };
    let ext = match content_type.as_deref().and_then(extension_for) {
        Some(ext) => ext,
        None => {
            return api_error(
                StatusCode::BAD_REQUEST,
                "unsupported image type (png, jpeg, gif, webp)",
            )
        }
    };

    let hash = hex::encode(Sha256::digest(&data));
    let filename = format!("{hash}.{ext}");

    let st = state.lock().await;
    let note = match resolve_note_ref(&st.storage, &user_id, &note_ref, true) {
        Ok(note) => note,
        Err(resp) => return resp,
    };

    let blocks = match load_blocks(&st.storage, &note.id) {
        Ok(blocks) => blocks,
        Err(e) => return storage_error_response(e),
    };
    let order_key = match insertion_key(&blocks, after_id.as_deref()) {
        Some(key) => key,
        None => return api_error(StatusCode::NOT_FOUND, "after_id names no block in this note"),
    };

    let path = st.storage.images_dir.join(&filename);
    if !path.exists() {
        if let Err(e) = std::fs::write(&path, &data) {
            crate::dlog!("image: failed to write {}: {}", path.display(), e);
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to store image");
        }
    }

    let now = now_secs();
    let row = NoteImageRow {
        id: uuid::Uuid::new_v4().to_string(),
        note_id: note.id.clone(),
        user_id: user_id.clone(),
        url: format!("/api/images/file/{filename}"),
        order_key,
        created_at: now,
    };
    if let Err(e) = st.storage.insert_note_image(&row) {
        return storage_error_response(e);
    }
    if let Err(e) = st.storage.touch_note(&note.id, now) {
        return storage_error_response(e);
    }

    crate::dlog!(
        "image: {} uploaded {} bytes to {}",
        crate::logging::user_id(&user_id),
        data.len(),
        crate::logging::note_id(&note.id)
    );
    (
        StatusCode::CREATED,
        axum::Json(serde_json::json!({
            "id": row.id,
            "note_id": row.note_id,
            "url": row.url,
            "order_key": row.order_key,
        })),
    )
        .into_response()
}

/// Serve an image file by its content-addressed name.
pub async fn serve_image_handler(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Response {
    // Content-addressed names only; anything else could escape the
    // images directory.
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.')
        && name.matches('.').count() == 1;
    if !valid {
        return api_error(StatusCode::BAD_REQUEST, "invalid image name");
    }

    let path = {
        let st = state.lock().await;
        st.storage.images_dir.join(&name)
    };
    match tokio::fs::read(&path).await {
        Ok(data) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type_for(&name).to_string()),
                (
                    header::CACHE_CONTROL,
                    // Content-addressed, so the bytes behind a name never change.
                    "public, max-age=31536000, immutable".to_string(),
                ),
            ],
            data,
        )
            .into_response(),
        Err(_) => api_error(StatusCode::NOT_FOUND, "no such image"),
    }
}

pub async fn delete_image_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(image_id): Path<String>,
) -> Response {
    let user_id = match require_user(&state, &headers).await {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let st = state.lock().await;
    let image = match st.storage.get_note_image(&image_id) {
        Ok(Some(image)) => image,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "no such image"),
        Err(e) => return storage_error_response(e),
    };
    let note = match st.storage.get_note(&image.note_id) {
        Ok(Some(note)) => note,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "no such note"),
        Err(e) => return storage_error_response(e),
    };
    if !can_edit_block(&user_id, &image.user_id, &note) {
        return api_error(StatusCode::FORBIDDEN, "only the author or note owner may delete");
    }

    match st.storage.delete_note_image(&image_id) {
        Ok(_) => axum::Json(serde_json::json!({ "ok": true })).into_response(),
        Err(e) => storage_error_response(e),
    }
}
