//! Request payload validation against the entity schema.
//!
//! Runs before any store access so a rejected write never touches the database.

use crate::error::AppError;
use crate::model::{Column, EntitySchema, Stamp};
use crate::sql::BindValue;
use serde_json::{Map, Value};

pub struct RequestValidator;

/// Validated `(column, value)` pairs ready for the SQL builder.
pub type Assignments = Vec<(&'static Column, BindValue)>;

impl RequestValidator {
    /// Validate a create payload. All required fields must be present; defaults fill the rest.
    pub fn validate(
        schema: &'static EntitySchema,
        body: &Map<String, Value>,
    ) -> Result<Assignments, AppError> {
        check_keys(schema, body)?;
        let mut out = Vec::new();
        for column in schema.columns.iter().filter(|c| writable(c)) {
            match body.get(column.name) {
                Some(v) => out.push((column, convert(column, v)?)),
                None if column.required => {
                    return Err(AppError::validation(column.name, "is required"));
                }
                None => {
                    if let Some(d) = column.default {
                        out.push((column, BindValue::from_json(column, &d.to_json())?));
                    }
                }
            }
        }
        Ok(out)
    }

    /// Validate only the fields present in body (for PATCH). Required is not enforced for missing
    /// fields.
    pub fn validate_partial(
        schema: &'static EntitySchema,
        body: &Map<String, Value>,
    ) -> Result<Assignments, AppError> {
        check_keys(schema, body)?;
        let mut out = Vec::new();
        for column in schema.columns.iter().filter(|c| writable(c)) {
            if let Some(v) = body.get(column.name) {
                out.push((column, convert(column, v)?));
            }
        }
        Ok(out)
    }

    /// Request bodies must be JSON objects.
    pub fn parse_body(bytes: &[u8]) -> Result<Map<String, Value>, AppError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(AppError::BadRequest("request body must be a JSON object".into()));
        }
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(m)) => Ok(m),
            Ok(_) => Err(AppError::BadRequest("request body must be a JSON object".into())),
            Err(e) => Err(AppError::BadRequest(format!("unable to decode JSON: {}", e))),
        }
    }
}

/// Columns a client may set; stamps are filled in by the service.
fn writable(column: &Column) -> bool {
    !column.immutable && column.stamp.is_none()
}

fn check_keys(schema: &EntitySchema, body: &Map<String, Value>) -> Result<(), AppError> {
    for key in body.keys() {
        match schema.column(key) {
            None => return Err(AppError::validation(key.as_str(), "unknown field")),
            Some(c) if c.immutable => {
                return Err(AppError::validation(key.as_str(), "field is read-only"));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn convert(column: &'static Column, v: &Value) -> Result<BindValue, AppError> {
    let value = BindValue::from_json(column, v)?;
    if column.non_blank {
        if let BindValue::Text(s) = &value {
            if s.trim().is_empty() {
                return Err(AppError::validation(column.name, "must not be empty"));
            }
        }
    }
    Ok(value)
}

/// The updated-at column, if the schema declares one.
pub(crate) fn updated_stamp(schema: &EntitySchema) -> Option<&'static Column> {
    schema.stamped(Stamp::Updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entity, Todo};
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    fn names(a: &Assignments) -> Vec<&'static str> {
        a.iter().map(|(c, _)| c.name).collect()
    }

    #[test]
    fn create_fills_completed_default() {
        let body = obj(json!({"title": "First task"}));
        let a = RequestValidator::validate(Todo::schema(), &body).unwrap();
        assert_eq!(names(&a), ["completed", "title"]);
        assert_eq!(a[0].1, BindValue::Bool(false));
    }

    #[test]
    fn create_requires_title() {
        let body = obj(json!({"completed": true}));
        let err = RequestValidator::validate(Todo::schema(), &body).unwrap_err();
        assert_eq!(err.to_string(), "title: is required");
    }

    #[test]
    fn blank_or_null_title_rejected() {
        let blank = RequestValidator::validate(Todo::schema(), &obj(json!({"title": "   "})));
        assert_eq!(blank.unwrap_err().to_string(), "title: must not be empty");
        let null = RequestValidator::validate_partial(Todo::schema(), &obj(json!({"title": null})));
        assert_eq!(null.unwrap_err().to_string(), "title: must not be null");
    }

    #[test]
    fn wrong_type_names_field() {
        let body = obj(json!({"title": "x", "completed": "yes"}));
        let err = RequestValidator::validate(Todo::schema(), &body).unwrap_err();
        assert_eq!(err.to_string(), "completed: must be a boolean");
    }

    #[test]
    fn immutable_and_unknown_fields_rejected() {
        for body in [
            json!({"id": 3}),
            json!({"utc_created": "2024-01-01T00:00:00Z"}),
            json!({"owner": "me"}),
        ] {
            assert!(RequestValidator::validate_partial(Todo::schema(), &obj(body)).is_err());
        }
    }

    #[test]
    fn server_managed_stamp_is_ignored() {
        let a = RequestValidator::validate_partial(
            Todo::schema(),
            &obj(json!({"utc_updated": "2000-01-01T00:00:00Z", "completed": true})),
        )
        .unwrap();
        assert_eq!(names(&a), ["completed"]);
    }

    #[test]
    fn body_must_be_object() {
        assert!(RequestValidator::parse_body(b"").is_err());
        assert!(RequestValidator::parse_body(b"[1]").is_err());
        assert!(RequestValidator::parse_body(b"{oops").is_err());
        assert!(RequestValidator::parse_body(br#"{"title":"a"}"#).is_ok());
    }
}
