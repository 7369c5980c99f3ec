use axum::http::StatusCode;
use axum_extra::extract::Multipart;
use axum_extra::extract::multipart::MultipartError;

use crate::application::error::HttpError;
use crate::application::forms::{ImageUpload, PostForm};

const SOURCE: &str = "infra::http::multipart::read_post_form";

/// Collect the post form fields. Unknown fields are ignored; a file input
/// left empty by the browser counts as no upload.
pub(super) async fn read_post_form(multipart: &mut Multipart) -> Result<PostForm, HttpError> {
    let mut form = PostForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return Err(multipart_error(&err)),
        };

        match field.name() {
            Some("text") => {
                form.text = field.text().await.map_err(|err| multipart_error(&err))?;
            }
            Some("group") => {
                form.group = field.text().await.map_err(|err| multipart_error(&err))?;
            }
            Some("image") => {
                let filename = field
                    .file_name()
                    .map(|value| value.to_string())
                    .unwrap_or_default();
                let bytes = field.bytes().await.map_err(|err| multipart_error(&err))?;
                if filename.trim().is_empty() && bytes.is_empty() {
                    continue;
                }
                form.image = Some(ImageUpload { filename, bytes });
            }
            _ => continue,
        }
    }

    Ok(form)
}

fn multipart_error(err: &MultipartError) -> HttpError {
    let status = err.status();
    let public_message = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "Uploaded file is too large"
    } else {
        "Invalid form submission"
    };
    HttpError::from_error(SOURCE, status, public_message, err)
}
