use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use serde_json::{json, Value};

use super::schema::{parse_timestamp, timestamp_string, FieldRule, Schema};
use super::Collection;
use crate::database::store::{Document, FieldError, StoreError};
use crate::filter::Condition;

pub const NAME: &str = "users";

pub const ROLES: &[&str] = &["user", "guide", "lead-guide", "admin"];

/// Fields a client may change through `updateMe`.
pub const SELF_EDITABLE: &[&str] = &["name", "email", "photo"];

/// Credential fields only the auth flows may write.
pub const CREDENTIAL_FIELDS: &[&str] = &["password", "passwordConfirm"];

static USERS: Lazy<Collection> = Lazy::new(|| {
    let schema = Schema::new(vec![
        FieldRule::string("name").required("Please tell us your name").trim(),
        FieldRule::string("email")
            .required("Please provide your email")
            .trim()
            .lowercase()
            .email("Please provide a valid email"),
        FieldRule::string("photo"),
        FieldRule::string("role").one_of(ROLES, None).default_value(|| json!("user")),
        FieldRule::string("password").required("Please provide a password").min_length(8, None),
        FieldRule::timestamp("passwordChangedAt"),
        FieldRule::string("passwordResetToken"),
        FieldRule::timestamp("passwordResetExpires"),
        FieldRule::boolean("active").default_value(|| json!(true)),
    ]);

    let mut users = Collection::new(NAME, schema);
    users.base_filter = vec![Condition::ne("active", false)];
    users.hidden_fields = &["password", "active", "passwordResetToken", "passwordResetExpires"];
    users.unique = &[&["email"]];
    users.write_protected = CREDENTIAL_FIELDS;
    users
});

pub fn collection() -> &'static Collection {
    &USERS
}

pub fn role(doc: &Document) -> &str {
    doc.get("role").and_then(Value::as_str).unwrap_or("user")
}

/// Validates a candidate user carrying a plaintext `password` and its
/// `passwordConfirm`, before the password is replaced by its hash.
pub fn check_credentials(candidate: &Document, is_new: bool) -> Result<(), StoreError> {
    let mut errors = match collection().schema.validate(&mut candidate.clone(), is_new) {
        Ok(()) => vec![],
        Err(StoreError::Validation(errors)) => errors,
        Err(other) => return Err(other),
    };

    match candidate.get("passwordConfirm").filter(|v| !v.is_null()) {
        None => errors.push(FieldError::new("passwordConfirm", "Please confirm your password")),
        Some(confirm) if candidate.get("password") != Some(confirm) => {
            errors.push(FieldError::new("passwordConfirm", "Passwords are not the same."))
        }
        Some(_) => {}
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(StoreError::Validation(errors))
    }
}

/// `passwordChangedAt` value for a credential change happening now.
///
/// Backdated one second so a token issued in the same second stays valid.
pub fn password_changed_now(skew_secs: i64) -> Value {
    Value::String(timestamp_string(Utc::now() - Duration::seconds(skew_secs)))
}

/// True when the stored credential changed after a token issued at `issued_at` (unix seconds).
pub fn changed_password_after(doc: &Document, issued_at: i64) -> bool {
    doc.get("passwordChangedAt")
        .and_then(parse_timestamp)
        .map(|changed| changed.timestamp() > issued_at)
        .unwrap_or(false)
}
