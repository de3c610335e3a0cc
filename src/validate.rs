//! Structural validation of untrusted JSON into typed post records.
//!
//! Checks are shallow: a field passes when it is present and its JSON type
//! matches the declared kind. Fields are checked in declaration order and
//! the first failure is reported.

use std::fmt;

use serde_json::{Map, Value};

use crate::model::network::{Post, PostDraft, Timestamp};

/// The closed set of shapes an untrusted value can be validated against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    PostCreationRequest,
    FullPost,
}

impl Shape {
    pub fn name(self) -> &'static str {
        match self {
            Shape::PostCreationRequest => "post-creation-request",
            Shape::FullPost => "full-post",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Primitive JSON kinds a field can be declared as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Text,
    Number,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Text => f.write_str("string"),
            Kind::Number => f.write_str("number"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyErrorKind {
    /// The root value was not a JSON object. The key is the shape name.
    NotAnObject,
    MissingKey,
    WrongType { expected: Kind },
}

/// The first field that failed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyError {
    pub key: String,
    pub kind: PropertyErrorKind,
}

impl PropertyError {
    fn not_an_object(shape: Shape) -> Self {
        Self {
            key: shape.name().to_string(),
            kind: PropertyErrorKind::NotAnObject,
        }
    }

    fn missing_key(key: &str) -> Self {
        Self {
            key: key.to_string(),
            kind: PropertyErrorKind::MissingKey,
        }
    }

    fn wrong_type(key: &str, expected: Kind) -> Self {
        Self {
            key: key.to_string(),
            kind: PropertyErrorKind::WrongType { expected },
        }
    }
}

impl fmt::Display for PropertyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            PropertyErrorKind::NotAnObject => write!(f, "Expected to be object type"),
            PropertyErrorKind::MissingKey => {
                write!(f, "Expected object to have key '{}'", self.key)
            }
            PropertyErrorKind::WrongType { expected } => {
                write!(f, "Expected {} to be a {}", self.key, expected)
            }
        }
    }
}

impl std::error::Error for PropertyError {}

/// A typed value that can be extracted from an untrusted JSON object.
pub trait Validate: Sized {
    const SHAPE: Shape;

    /// Consumes the declared fields from `object`, in order.
    fn take_fields(object: &mut Map<String, Value>) -> Result<Self, PropertyError>;
}

/// Validates `value` against the shape of `T`.
///
/// Keys the shape does not declare are ignored.
pub fn validate<T: Validate>(value: Value) -> Result<T, PropertyError> {
    let Value::Object(mut object) = value else {
        return Err(PropertyError::not_an_object(T::SHAPE));
    };

    T::take_fields(&mut object)
}

impl Validate for PostDraft {
    const SHAPE: Shape = Shape::PostCreationRequest;

    fn take_fields(object: &mut Map<String, Value>) -> Result<Self, PropertyError> {
        Ok(PostDraft {
            slug: take_text(object, "slug")?,
            title: take_text(object, "title")?,
            description: take_text(object, "description")?,
            date_created: take_number(object, "dateCreated")?,
            date_modified: take_number(object, "dateModified")?,
            content: take_text(object, "content")?,
        })
    }
}

impl Validate for Post {
    const SHAPE: Shape = Shape::FullPost;

    fn take_fields(object: &mut Map<String, Value>) -> Result<Self, PropertyError> {
        let draft = PostDraft::take_fields(object)?;
        let id = take_text(object, "id")?;
        Ok(Post { draft, id })
    }
}

fn take_text(object: &mut Map<String, Value>, key: &str) -> Result<String, PropertyError> {
    match object.remove(key) {
        None => Err(PropertyError::missing_key(key)),
        Some(Value::String(text)) => Ok(text),
        Some(_) => Err(PropertyError::wrong_type(key, Kind::Text)),
    }
}

fn take_number(object: &mut Map<String, Value>, key: &str) -> Result<Timestamp, PropertyError> {
    match object.remove(key) {
        None => Err(PropertyError::missing_key(key)),
        Some(Value::Number(number)) => Ok(Timestamp::from(number)),
        Some(_) => Err(PropertyError::wrong_type(key, Kind::Number)),
    }
}
