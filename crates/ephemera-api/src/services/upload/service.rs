//! Image upload service
//!
//! Reads the multipart form in a single pass. The `file` and `expires_in` fields may arrive
//! in either order: when the lifetime is already known the file streams straight into the
//! store, otherwise it is spooled to an anonymous temporary file until the lifetime
//! arrives. The body is never buffered in memory beyond the sniffing prefix.

use std::io;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use axum::extract::multipart::Field;
use axum::extract::Multipart;
use axum::http::StatusCode;
use bytes::{Bytes, BytesMut};
use ephemera_core::constants::SNIFF_LEN;
use ephemera_core::{encode, AppError};
use ephemera_processing::{ensure_image, parse_ttl, ValidationError, MAX_TTL_FIELD_LEN};
use ephemera_storage::ObjectReader;
use futures::StreamExt;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::StreamReader;

use crate::constants::{EXPIRES_IN_FIELD, FILE_FIELD};
use crate::error::HttpAppError;
use crate::state::AppState;

use super::types::UploadedImage;

/// The file part of the form, once its leading bytes have been checked.
enum FilePart {
    /// Already committed because the lifetime arrived first.
    Stored(UploadedImage),
    /// Waiting for the lifetime.
    Spooled(SpooledFile),
}

struct SpooledFile {
    file: tokio::fs::File,
    filename: String,
    content_type: &'static str,
}

/// Image upload service
pub struct ImageUploadService {
    state: Arc<AppState>,
}

impl ImageUploadService {
    pub fn new(state: &Arc<AppState>) -> Self {
        Self {
            state: state.clone(),
        }
    }

    /// Complete upload workflow: read form → validate → store.
    ///
    /// On any error nothing stays in the store.
    pub async fn upload(&self, mut multipart: Multipart) -> Result<UploadedImage, HttpAppError> {
        let mut ttl: Option<i64> = None;
        let mut file: Option<FilePart> = None;

        if let Err(e) = self.read_form(&mut multipart, &mut ttl, &mut file).await {
            if let Some(FilePart::Stored(image)) = &file {
                self.discard(&image.name).await;
            }
            return Err(e);
        }

        let ttl = ttl.ok_or(ValidationError::MissingField(EXPIRES_IN_FIELD))?;

        match file.ok_or(ValidationError::MissingField(FILE_FIELD))? {
            FilePart::Stored(image) => Ok(image),
            FilePart::Spooled(spooled) => {
                let SpooledFile {
                    file,
                    filename,
                    content_type,
                } = spooled;
                let no_client_error = AtomicU16::new(NO_BODY_ERROR);
                self.store(ttl, &filename, content_type, Box::pin(file), &no_client_error)
                    .await
            }
        }
    }

    async fn read_form(
        &self,
        multipart: &mut Multipart,
        ttl: &mut Option<i64>,
        file: &mut Option<FilePart>,
    ) -> Result<(), HttpAppError> {
        let ttl_limit = self.state.config.ttl_limit_secs;

        while let Some(mut field) = multipart.next_field().await? {
            let field_name = field.name().map(str::to_owned);

            match field_name.as_deref() {
                Some(EXPIRES_IN_FIELD) => {
                    if ttl.is_some() {
                        return Err(AppError::InvalidInput(format!(
                            "Multiple '{}' fields are not allowed",
                            EXPIRES_IN_FIELD
                        ))
                        .into());
                    }
                    let raw = read_ttl_field(&mut field).await?;
                    *ttl = Some(parse_ttl(&raw, ttl_limit)?);
                }
                Some(FILE_FIELD) => {
                    if file.is_some() {
                        return Err(AppError::InvalidInput(
                            "Multiple file fields are not allowed; send exactly one field named 'file'"
                                .to_string(),
                        )
                        .into());
                    }

                    let filename = field.file_name().unwrap_or_default().to_string();
                    let prefix = read_prefix(&mut field).await?;
                    let content_type = ensure_image(&prefix)?;

                    *file = Some(match *ttl {
                        Some(ttl) => {
                            let client_error = Arc::new(AtomicU16::new(NO_BODY_ERROR));
                            let reader = field_reader(prefix, field, client_error.clone());
                            FilePart::Stored(
                                self.store(ttl, &filename, content_type, reader, &client_error)
                                    .await?,
                            )
                        }
                        None => {
                            tracing::debug!(
                                filename = %filename,
                                "File arrived before expires_in, spooling to temporary file"
                            );
                            FilePart::Spooled(SpooledFile {
                                file: spool(prefix, field).await?,
                                filename,
                                content_type,
                            })
                        }
                    });
                }
                other => {
                    tracing::debug!(field = ?other, "Ignoring unknown multipart field");
                }
            }
        }

        Ok(())
    }

    async fn store(
        &self,
        ttl: i64,
        filename: &str,
        content_type: &'static str,
        reader: ObjectReader<'_>,
        client_error: &AtomicU16,
    ) -> Result<UploadedImage, HttpAppError> {
        let expiry = self.state.clock.now().saturating_add(ttl);
        let name = encode(expiry, filename);

        match self.state.store.put(&name, reader).await {
            Ok(size_bytes) => {
                tracing::info!(
                    name = %name,
                    size_bytes,
                    content_type,
                    expires_in = ttl,
                    expiry,
                    "Image stored"
                );
                Ok(UploadedImage {
                    name,
                    expires_in: ttl,
                })
            }
            Err(e) => match client_error.load(Ordering::SeqCst) {
                NO_BODY_ERROR => Err(e.into()),
                status => {
                    tracing::debug!(error = %e, name = %name, status, "Upload body failed mid-stream");
                    Err(body_error(status))
                }
            },
        }
    }

    async fn discard(&self, name: &str) {
        if let Err(e) = self.state.store.delete(name).await {
            tracing::error!(error = %e, name = %name, "Failed to remove image from rejected upload");
        }
    }
}

/// Marks that the file field's body has not failed.
const NO_BODY_ERROR: u16 = 0;

/// Error for a body that failed with `status` while streaming into the store.
fn body_error(status: u16) -> HttpAppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE.as_u16() {
        AppError::PayloadTooLarge("Upload exceeds the maximum request size".to_string()).into()
    } else {
        AppError::BadRequest("Upload body could not be read completely".to_string()).into()
    }
}

/// Read the `expires_in` value, refusing more than [`MAX_TTL_FIELD_LEN`] bytes.
async fn read_ttl_field(field: &mut Field<'_>) -> Result<String, HttpAppError> {
    let mut raw = BytesMut::new();
    while let Some(chunk) = field.chunk().await? {
        if raw.len() + chunk.len() > MAX_TTL_FIELD_LEN {
            return Err(ValidationError::TtlFieldTooLong {
                len: raw.len() + chunk.len(),
                max: MAX_TTL_FIELD_LEN,
            }
            .into());
        }
        raw.extend_from_slice(&chunk);
    }
    String::from_utf8(raw.to_vec()).map_err(|_| ValidationError::InvalidTtl.into())
}

/// Read at least [`SNIFF_LEN`] bytes of the field (fewer only at end of field).
async fn read_prefix(field: &mut Field<'_>) -> Result<Bytes, HttpAppError> {
    let mut prefix = BytesMut::new();
    while prefix.len() < SNIFF_LEN {
        match field.chunk().await? {
            Some(chunk) => prefix.extend_from_slice(&chunk),
            None => break,
        }
    }
    Ok(prefix.freeze())
}

/// The whole field as a reader: the already consumed prefix followed by the remainder.
/// Body errors record their status in `client_error` so they can be told apart from store
/// failures.
fn field_reader<'a>(
    prefix: Bytes,
    field: Field<'a>,
    client_error: Arc<AtomicU16>,
) -> ObjectReader<'a> {
    let rest = field.map(move |chunk| {
        chunk.map_err(|e| {
            client_error.store(e.status().as_u16(), Ordering::SeqCst);
            io::Error::other(e.body_text())
        })
    });
    let stream = futures::stream::iter([Ok::<Bytes, io::Error>(prefix)]).chain(rest);
    Box::pin(StreamReader::new(stream))
}

/// Copy the field into an unnamed temporary file and rewind it.
async fn spool(prefix: Bytes, mut field: Field<'_>) -> Result<tokio::fs::File, HttpAppError> {
    let std_file = tokio::task::spawn_blocking(tempfile::tempfile)
        .await
        .map_err(|e| AppError::from(anyhow::Error::new(e).context("Spool task failed")))?
        .map_err(|e| AppError::from(anyhow::Error::new(e).context("Failed to create spool file")))?;

    let mut file = tokio::fs::File::from_std(std_file);
    file.write_all(&prefix).await?;
    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    file.rewind().await?;

    Ok(file)
}
