use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use sqlx::{Pool, Postgres};
use thiserror::Error;
use validator::ValidateEmail;

use crate::{
    constants::{EMAIL_MAX_LENGTH, PASSWORD_MIN_LENGTH, USERNAME_MAX_LENGTH, USERNAME_MIN_LENGTH},
    schema::Uuid,
};

static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+\z").unwrap());

/// Tables an id can be checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Tag,
    Ingredient,
    Recipe,
}

impl Entity {
    fn table(self) -> &'static str {
        match self {
            Entity::User => "users",
            Entity::Tag => "tags",
            Entity::Ingredient => "ingredients",
            Entity::Recipe => "recipes",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Entity::User => "User",
            Entity::Tag => "Tag",
            Entity::Ingredient => "Ingredient",
            Entity::Recipe => "Recipe",
        }
    }

    pub async fn exists(self, id: Uuid, pool: &Pool<Postgres>) -> Result<bool, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM {} WHERE id = $1",
            self.table()
        ))
        .bind(id)
        .fetch_one(pool)
        .await?;

        Ok(row.0 == 1)
    }
}

#[derive(Error, Debug)]
pub enum IdError {
    #[error("'{0}' must be a number.")]
    NotNumeric(String),

    #[error("{} with id={id} does not exist.", .entity.label())]
    NotFound { entity: Entity, id: Uuid },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Accepts a JSON integer or a string of decimal digits.
pub fn parse_id(value: &Value) -> Result<Uuid, IdError> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    };

    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(IdError::NotNumeric(raw));
    }

    raw.parse::<Uuid>().map_err(|_| IdError::NotNumeric(raw))
}

/// Parses an id and, when an entity is given, checks that exactly one row carries it.
pub async fn validate_id(
    value: &Value,
    entity: Option<Entity>,
    pool: &Pool<Postgres>,
) -> Result<Uuid, IdError> {
    let id = parse_id(value)?;

    if let Some(entity) = entity {
        if !entity.exists(id, pool).await? {
            return Err(IdError::NotFound { entity, id });
        }
    }

    Ok(id)
}

/// Returns the username lowercased.
pub fn validate_username(username: &str) -> Result<String, String> {
    let length = username.chars().count();
    if !(USERNAME_MIN_LENGTH..=USERNAME_MAX_LENGTH).contains(&length) {
        return Err(format!(
            "Username length must be between {USERNAME_MIN_LENGTH} and {USERNAME_MAX_LENGTH}."
        ));
    }
    if !USERNAME_REGEX.is_match(username) {
        return Err("Username may contain only letters, digits and @/./+/-/_.".to_owned());
    }

    Ok(username.to_lowercase())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        return Err(format!(
            "Password must be at least {PASSWORD_MIN_LENGTH} characters long."
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<String, String> {
    let email = email.trim();
    if email.chars().count() > EMAIL_MAX_LENGTH {
        return Err(format!("Ensure this field has no more than {EMAIL_MAX_LENGTH} characters."));
    }

    if !email.validate_email() {
        return Err("Enter a valid email address.".to_owned());
    }
    Ok(email.to_owned())
}

/// Normalizes `fff`, `#fff`, ` #a0b1c2` into `#fff` / `#a0b1c2`.
pub fn normalize_hex_color(color: &str) -> Result<String, String> {
    let value = color.trim_matches(|c| c == ' ' || c == '#');

    if value.len() != 3 && value.len() != 6 {
        return Err(format!("Value '{value}' is not a valid color."));
    }
    if !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("'{value}' is not hexadecimal."));
    }

    Ok(format!("#{value}"))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case("fff", "#fff")]
    #[case("#fff", "#fff")]
    #[case("  #A0b1C2", "#A0b1C2")]
    #[case("123456", "#123456")]
    fn hex_colors_normalize(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_hex_color(input).unwrap(), expected);
    }

    #[rstest]
    #[case("12345")]
    #[case("zzz")]
    #[case("")]
    #[case("#ff")]
    #[case("1234567")]
    #[case("ggg")]
    fn bad_hex_colors_are_rejected(#[case] input: &str) {
        assert!(normalize_hex_color(input).is_err());
    }

    #[test]
    fn username_is_lowercased() {
        assert_eq!(validate_username("Vasya.Pupkin").unwrap(), "vasya.pupkin");
        assert_eq!(validate_username("a+b@c-d_e").unwrap(), "a+b@c-d_e");
    }

    #[rstest]
    #[case("ab")]
    #[case("bad name")]
    #[case("semi;colon")]
    #[case("slash/")]
    fn bad_usernames_are_rejected(#[case] input: &str) {
        assert!(validate_username(input).is_err());
    }

    #[test]
    fn username_length_upper_bound() {
        assert!(validate_username(&"a".repeat(150)).is_ok());
        assert!(validate_username(&"a".repeat(151)).is_err());
    }

    #[test]
    fn unicode_word_characters_are_allowed() {
        assert_eq!(validate_username("Пользователь").unwrap(), "пользователь");
    }

    #[test]
    fn password_min_length() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }

    #[rstest]
    #[case("user@example.com", true)]
    #[case(" user@example.com ", true)]
    #[case("userexample.com", false)]
    #[case("@example.com", false)]
    #[case("user@", false)]
    #[case("us er@example.com", false)]
    #[case("user@@example.com", false)]
    #[case("user@example..com", false)]
    #[case("user@-example.com", false)]
    #[case("first.last+tag@mail.example.org", true)]
    fn emails(#[case] input: &str, #[case] valid: bool) {
        assert_eq!(validate_email(input).is_ok(), valid);
    }

    #[rstest]
    #[case(json!(12), Some(12))]
    #[case(json!("12"), Some(12))]
    #[case(json!("-1"), None)]
    #[case(json!(-1), None)]
    #[case(json!("1.5"), None)]
    #[case(json!(1.5), None)]
    #[case(json!("abc"), None)]
    #[case(json!(""), None)]
    #[case(json!(null), None)]
    #[case(json!(true), None)]
    fn ids(#[case] value: Value, #[case] expected: Option<Uuid>) {
        assert_eq!(parse_id(&value).ok(), expected);
    }

    #[test]
    fn missing_id_message_names_the_entity() {
        let error = IdError::NotFound {
            entity: Entity::Tag,
            id: 7,
        };
        assert_eq!(error.to_string(), "Tag with id=7 does not exist.");
    }
}
