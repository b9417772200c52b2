use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Cursor};
use std::path::Path;

use actix_multipart::Multipart;
use actix_web::http::header::{self, HeaderMap};
use actix_web::web;
use futures::StreamExt;
use image::io::Reader as ImageReader;
use image::ImageFormat;
use uuid::Uuid;

use crate::error::Error;
use crate::models::Group;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const IMAGE_TOO_LARGE: &str = "The uploaded file is too large.";
pub const IMAGE_CONTRADICTION: &str = "Please either submit a file or check the clear checkbox, not both.";
pub const FIELD_TOO_LARGE: &str = "This value is too long.";
pub const BAD_CREDENTIALS: &str = "Please enter a correct username and password.";
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const INVALID_USERNAME: &str =
    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";
pub const RESERVED_USERNAME: &str = "This username is reserved.";
pub const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";

/// Key used for errors not tied to a single field.
pub const NON_FIELD_ERRORS: &str = "__all__";

const MAX_USERNAME_LEN: usize = 150;

/// Upper bound for a plain (non-file) form field.
pub const MAX_FIELD_BYTES: usize = 64 * 1024;

/// Usernames that would be shadowed by fixed routes.
const RESERVED_USERNAMES: &[&str] = &["404", "500", "about", "auth", "follow", "group", "media", "new"];

/// Submitted values and their errors, as handed to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormContext {
    pub data: BTreeMap<String, String>,
    pub errors: BTreeMap<String, Vec<String>>,
}

impl FormContext {
    pub fn with_value(mut self, field: &str, value: &str) -> FormContext {
        self.data.insert(field.to_string(), value.to_string());
        self
    }

    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors
            .entry(field.to_string())
            .or_insert_with(Vec::new)
            .push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub truncated: bool,
}

impl ImageUpload {
    /// Sniffs the format from the bytes and checks that the header decodes.
    /// The declared content type and file name are not trusted.
    pub fn detect(&self) -> Option<ImageFormat> {
        let reader = ImageReader::new(Cursor::new(&self.bytes))
            .with_guessed_format()
            .ok()?;
        let format = reader.format()?;
        reader.into_dimensions().ok()?;
        Some(format)
    }
}

/// An upload whose contents decoded as an image.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidImage {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

impl ValidImage {
    fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }

    /// Writes the file under `<media_root>/posts/` and returns the stored
    /// path relative to the media root.
    pub fn store(&self, media_root: &Path) -> io::Result<String> {
        let relative = format!("posts/{}.{}", Uuid::new_v4().simple(), self.extension());
        let target = media_root.join(&relative);
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&target, &self.bytes)?;
        Ok(relative)
    }
}

/// What an accepted post form does to the stored image.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageAction {
    Keep,
    Clear,
    Replace(ValidImage),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidPost {
    pub text: String,
    pub group_id: Option<i32>,
    pub image: ImageAction,
}

/// One part of a `multipart/form-data` body.
struct Part {
    name: String,
    filename: Option<String>,
    bytes: Vec<u8>,
    truncated: bool,
}

impl Part {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Reads every part of the body. File parts keep at most `file_limit` bytes
/// and plain fields at most `MAX_FIELD_BYTES`; the rest is drained and the
/// part flagged as truncated.
async fn read_parts(mut payload: Multipart, file_limit: usize) -> Result<Vec<Part>, Error> {
    let mut parts = Vec::new();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| Error::BadRequest(e.to_string()))?;

        let (name, filename) = {
            let disposition = field.content_disposition();
            (
                disposition.get_name().unwrap_or("").to_string(),
                disposition.get_filename().map(|f| f.to_string()),
            )
        };
        let limit = if filename.is_some() { file_limit } else { MAX_FIELD_BYTES };

        let mut bytes = Vec::new();
        let mut truncated = false;
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| Error::BadRequest(e.to_string()))?;
            if truncated || bytes.len() + chunk.len() > limit {
                truncated = true;
                continue;
            }
            bytes.extend_from_slice(&chunk);
        }

        parts.push(Part {
            name,
            filename,
            bytes,
            truncated,
        });
    }

    Ok(parts)
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

/// Raw fields of the post authoring form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostForm {
    pub text: Option<String>,
    pub group: Option<String>,
    pub image: Option<ImageUpload>,
    pub image_clear: bool,
    /// Plain fields whose value went over `MAX_FIELD_BYTES`.
    pub oversized: Vec<String>,
}

impl PostForm {
    /// Reads a `multipart/form-data` body. Unknown fields are skipped.
    pub async fn from_multipart(payload: Multipart, max_upload: usize) -> Result<PostForm, Error> {
        let mut form = PostForm::default();

        for part in read_parts(payload, max_upload).await? {
            if part.truncated && part.filename.is_none() {
                form.oversized.push(part.name.clone());
            }

            match part.name.as_str() {
                "text" => form.text = Some(part.text()),
                "group" => form.group = Some(part.text()),
                "image-clear" => form.image_clear = true,
                "image" => {
                    // browsers send an empty, nameless part when no file is picked
                    let filename = part.filename.unwrap_or_default();
                    if filename.is_empty() && part.bytes.is_empty() {
                        continue;
                    }
                    form.image = Some(ImageUpload {
                        filename,
                        bytes: part.bytes,
                        truncated: part.truncated,
                    });
                }
                _ => {}
            }
        }

        Ok(form)
    }

    pub fn validate(&self, groups: &[Group]) -> Result<ValidPost, FormContext> {
        let mut context = FormContext::default()
            .with_value("text", self.text.as_deref().unwrap_or(""))
            .with_value("group", self.group.as_deref().unwrap_or(""));

        for field in &self.oversized {
            context.add_error(field, FIELD_TOO_LARGE);
        }

        let text = self.text.as_deref().unwrap_or("").trim().to_string();
        if text.is_empty() {
            context.add_error("text", REQUIRED);
        }

        let group_id = match self.group.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse::<i32>() {
                Ok(id) if groups.iter().any(|g| g.id == id) => Some(id),
                _ => {
                    context.add_error("group", INVALID_CHOICE);
                    None
                }
            },
        };

        let image = match self.image {
            Some(_) if self.image_clear => {
                context.add_error("image", IMAGE_CONTRADICTION);
                ImageAction::Keep
            }
            Some(ref upload) if upload.truncated => {
                context.add_error("image", IMAGE_TOO_LARGE);
                ImageAction::Keep
            }
            Some(ref upload) => match upload.detect() {
                Some(format) => ImageAction::Replace(ValidImage {
                    format,
                    bytes: upload.bytes.clone(),
                }),
                None => {
                    context.add_error("image", INVALID_IMAGE);
                    ImageAction::Keep
                }
            },
            None if self.image_clear => ImageAction::Clear,
            None => ImageAction::Keep,
        };

        if !context.is_valid() {
            return Err(context);
        }

        Ok(ValidPost { text, group_id, image })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
    #[serde(skip)]
    pub oversized: bool,
}

impl CommentForm {
    /// Decodes an urlencoded or multipart body. Malformed urlencoded bodies
    /// read as an empty form.
    pub async fn from_payload(headers: &HeaderMap, mut payload: web::Payload) -> Result<CommentForm, Error> {
        if is_multipart(headers) {
            let mut form = CommentForm::default();
            for part in read_parts(Multipart::new(headers, payload), MAX_FIELD_BYTES).await? {
                if part.name == "text" {
                    form.oversized = part.truncated;
                    form.text = part.text();
                }
            }
            return Ok(form);
        }

        let mut body = Vec::new();
        let mut oversized = false;
        while let Some(chunk) = payload.next().await {
            let chunk = chunk.map_err(|e| Error::BadRequest(e.to_string()))?;
            if oversized || body.len() + chunk.len() > MAX_FIELD_BYTES {
                oversized = true;
                continue;
            }
            body.extend_from_slice(&chunk);
        }

        let mut form: CommentForm = serde_urlencoded::from_bytes(&body).unwrap_or_default();
        form.oversized = oversized;
        Ok(form)
    }

    pub fn validate(&self) -> Result<String, FormContext> {
        let mut context = FormContext::default().with_value("text", &self.text);
        let text = self.text.trim();
        if self.oversized {
            context.add_error("text", FIELD_TOO_LARGE);
        } else if text.is_empty() {
            context.add_error("text", REQUIRED);
        }

        if context.is_valid() {
            Ok(text.to_string())
        } else {
            Err(context)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: String,
}

impl LoginForm {
    /// Checks presence only; credentials are checked against the store.
    pub fn validate(&self) -> Result<(), FormContext> {
        let mut context = FormContext::default().with_value("username", &self.username);
        if self.username.trim().is_empty() {
            context.add_error("username", REQUIRED);
        }
        if self.password.is_empty() {
            context.add_error("password", REQUIRED);
        }
        if context.is_valid() {
            Ok(())
        } else {
            Err(context)
        }
    }

    pub fn rejected(&self) -> FormContext {
        let mut context = FormContext::default().with_value("username", &self.username);
        context.add_error(NON_FIELD_ERRORS, BAD_CREDENTIALS);
        context
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

fn valid_username(username: &str) -> bool {
    let len = username.chars().count();
    len > 0
        && len <= MAX_USERNAME_LEN
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
}

/// Format and reserved-name rules shared by signup and `blog-ctl`.
pub fn check_username(username: &str) -> Result<(), &'static str> {
    if username.is_empty() {
        Err(REQUIRED)
    } else if !valid_username(username) {
        Err(INVALID_USERNAME)
    } else if RESERVED_USERNAMES.contains(&username.to_lowercase().as_str()) {
        Err(RESERVED_USERNAME)
    } else {
        Ok(())
    }
}

impl SignupForm {
    /// Returns the cleaned username on success.
    pub fn validate(&self) -> Result<String, FormContext> {
        let username = self.username.trim().to_string();
        let mut context = FormContext::default().with_value("username", &username);

        if let Err(message) = check_username(&username) {
            context.add_error("username", message);
        }

        if self.password1.is_empty() {
            context.add_error("password1", REQUIRED);
        }
        if self.password2.is_empty() {
            context.add_error("password2", REQUIRED);
        } else if self.password1 != self.password2 {
            context.add_error("password2", PASSWORD_MISMATCH);
        }

        if context.is_valid() {
            Ok(username)
        } else {
            Err(context)
        }
    }

    pub fn taken(&self) -> FormContext {
        let mut context = FormContext::default().with_value("username", self.username.trim());
        context.add_error("username", USERNAME_TAKEN);
        context
    }
}
