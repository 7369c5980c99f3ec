//! Raw form input and the typed commands it validates into.
//!
//! Handlers collect submitted fields into a `*Form`, call `validate`, and
//! either receive a command ready for a service or a [`FormErrors`] map to
//! re-render the form with.

use std::collections::BTreeMap;

use bytes::Bytes;
use imagesize::ImageType;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::entities::GroupRecord;
use crate::domain::error::DomainError;
use crate::domain::users::{validate_password, validate_username};

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE: &str = "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const EMPTY_FILE: &str = "The submitted file is empty.";

/// Field name to messages. `__all__` holds errors not tied to one field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<&'static str, Vec<String>>,
}

impl FormErrors {
    pub const NON_FIELD: &'static str = "__all__";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, field: &str) -> bool {
        !self.get(field).is_empty()
    }

    pub fn non_field(&self) -> &[String] {
        self.get(Self::NON_FIELD)
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, FormErrors> {
        if self.is_empty() { Ok(value()) } else { Err(self) }
    }
}

impl From<DomainError> for FormErrors {
    fn from(error: DomainError) -> Self {
        let mut errors = FormErrors::new();
        match error {
            DomainError::Validation { field, message } => errors.add(field, message),
            other => errors.add(FormErrors::NON_FIELD, other.to_string()),
        }
        errors
    }
}

/// A file submitted through a multipart form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Bytes,
}

/// An upload that was recognised as a raster image.
#[derive(Debug, Clone)]
pub struct ValidatedImage {
    pub filename: String,
    pub extension: &'static str,
    pub width: usize,
    pub height: usize,
    pub bytes: Bytes,
}

pub fn validate_image(upload: ImageUpload) -> Result<ValidatedImage, &'static str> {
    if upload.bytes.is_empty() {
        return Err(EMPTY_FILE);
    }

    let extension = match imagesize::image_type(&upload.bytes) {
        Ok(ImageType::Gif) => "gif",
        Ok(ImageType::Png) => "png",
        Ok(ImageType::Jpeg) => "jpg",
        Ok(ImageType::Webp) => "webp",
        Ok(ImageType::Bmp) => "bmp",
        _ => return Err(INVALID_IMAGE),
    };

    let size = imagesize::blob_size(&upload.bytes).map_err(|_| INVALID_IMAGE)?;
    if size.width == 0 || size.height == 0 {
        return Err(INVALID_IMAGE);
    }

    Ok(ValidatedImage {
        filename: upload.filename,
        extension,
        width: size.width,
        height: size.height,
        bytes: upload.bytes,
    })
}

/// Post create/edit submission as received.
#[derive(Debug, Clone, Default)]
pub struct PostForm {
    pub text: String,
    /// Group id as submitted; empty means "no group".
    pub group: String,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Clone)]
pub struct PostCommand {
    pub text: String,
    pub group_id: Option<Uuid>,
    pub image: Option<ValidatedImage>,
}

impl PostForm {
    /// Validate against the groups a post may be filed under.
    pub fn validate(self, groups: &[GroupRecord]) -> Result<PostCommand, FormErrors> {
        let mut errors = FormErrors::new();

        let text = self.text.trim().to_string();
        if text.is_empty() {
            errors.add("text", REQUIRED);
        }

        let group_raw = self.group.trim();
        let group_id = if group_raw.is_empty() {
            None
        } else {
            match Uuid::parse_str(group_raw)
                .ok()
                .filter(|id| groups.iter().any(|group| group.id == *id))
            {
                Some(id) => Some(id),
                None => {
                    errors.add("group", INVALID_CHOICE);
                    None
                }
            }
        };

        let image = match self.image.map(validate_image).transpose() {
            Ok(image) => image,
            Err(message) => {
                errors.add("image", message);
                None
            }
        };

        errors.finish(|| PostCommand {
            text,
            group_id,
            image,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommentForm {
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct CommentCommand {
    pub text: String,
}

impl CommentForm {
    pub fn validate(self) -> Result<CommentCommand, FormErrors> {
        let mut errors = FormErrors::new();
        let text = self.text.trim().to_string();
        if text.is_empty() {
            errors.add("text", REQUIRED);
        }
        errors.finish(|| CommentCommand { text })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignupForm {
    pub username: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Clone)]
pub struct SignupCommand {
    pub username: String,
    pub password: String,
}

impl SignupForm {
    pub fn validate(self) -> Result<SignupCommand, FormErrors> {
        let mut errors = FormErrors::new();

        let username = match validate_username(&self.username) {
            Ok(username) => username,
            Err(DomainError::Validation { message, .. }) => {
                errors.add("username", message);
                String::new()
            }
            Err(other) => {
                errors.add(FormErrors::NON_FIELD, other.to_string());
                String::new()
            }
        };

        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        } else if let Err(DomainError::Validation { message, .. }) =
            validate_password(&self.password1)
        {
            errors.add("password1", message);
        }

        if self.password2.is_empty() {
            errors.add("password2", REQUIRED);
        } else if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        }

        let password = self.password1;
        errors.finish(|| SignupCommand { username, password })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();
        if self.username.trim().is_empty() {
            errors.add("username", REQUIRED);
        }
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        errors.finish(|| ())
    }
}
