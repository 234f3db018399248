use std::{collections::HashMap, str::FromStr};

use serde_json::Value;
use url::form_urlencoded;

use super::error::{ApiError, FieldErrors, NON_FIELD_ERRORS};
use crate::{
    constants::{NAME_MAX_LENGTH, RECIPE_NAME_MAX_LENGTH},
    media::{decode_data_uri, DecodedImage},
    schema::Uuid,
    validation::{parse_id, validate_email, validate_password, validate_username},
};

pub type FormData = HashMap<String, Value>;

const REQUIRED: &str = "This field is required.";

/// A JSON object body with typed accessors.
pub struct Form {
    inner: FormData,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn from_value(value: Value) -> Result<Self, ApiError> {
        match value {
            Value::Object(map) => Ok(Self::from_data(map.into_iter().collect())),
            _ => Err(ApiError::validation(
                NON_FIELD_ERRORS,
                "Invalid data. Expected a dictionary.",
            )),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.get(key).is_some_and(|v| !v.is_null())
    }

    pub fn get_raw(&self, key: &str) -> Option<&Value> {
        self.inner.get(key).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, key: &str) -> Result<String, String> {
        match self.get_raw(key) {
            Some(Value::String(v)) => Ok(v.to_owned()),
            Some(_) => Err("Not a valid string.".to_owned()),
            None => Err(REQUIRED.to_owned()),
        }
    }

    pub fn get_optional_str(&self, key: &str) -> Result<Option<String>, String> {
        match self.get_raw(key) {
            Some(_) => self.get_str(key).map(Some),
            None => Ok(None),
        }
    }

    /// Positive integer given either as a JSON number or a numeric string.
    pub fn get_positive(&self, key: &str) -> Result<i32, String> {
        match self.get_raw(key) {
            Some(value) => positive_integer(value),
            None => Err(REQUIRED.to_owned()),
        }
    }

    pub fn get_list(&self, key: &str) -> Result<Vec<Value>, String> {
        match self.get_raw(key) {
            Some(Value::Array(items)) => Ok(items.to_owned()),
            Some(other) => Err(format!("Expected a list of items but got '{other}'.")),
            None => Err(REQUIRED.to_owned()),
        }
    }
}

fn positive_integer(value: &Value) -> Result<i32, String> {
    match parse_id(value) {
        Ok(n) if n >= 1 => Ok(n),
        Ok(_) => Err("Ensure this value is greater than or equal to 1.".to_owned()),
        Err(_) => Err("A valid integer is required.".to_owned()),
    }
}

fn bounded(value: String, max: usize) -> Result<String, String> {
    if value.chars().count() > max {
        return Err(format!("Ensure this field has no more than {max} characters."));
    }
    Ok(value)
}

/// Payload of `POST /users`.
#[derive(Debug, Clone)]
pub struct UserForm {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl UserForm {
    pub fn parse(form: &Form) -> Result<Self, ApiError> {
        let mut errors = FieldErrors::new();

        let email = form
            .get_str("email")
            .and_then(|v| validate_email(&v))
            .map_err(|e| errors.add("email", e))
            .ok();
        let username = form
            .get_str("username")
            .and_then(|v| validate_username(&v))
            .map_err(|e| errors.add("username", e))
            .ok();
        let first_name = form
            .get_str("first_name")
            .and_then(|v| bounded(v, NAME_MAX_LENGTH))
            .map_err(|e| errors.add("first_name", e))
            .ok();
        let last_name = form
            .get_str("last_name")
            .and_then(|v| bounded(v, NAME_MAX_LENGTH))
            .map_err(|e| errors.add("last_name", e))
            .ok();
        let password = form
            .get_str("password")
            .and_then(|v| validate_password(&v).map(|_| v))
            .map_err(|e| errors.add("password", e))
            .ok();

        match (email, username, first_name, last_name, password) {
            (Some(email), Some(username), Some(first_name), Some(last_name), Some(password))
                if errors.is_empty() =>
            {
                Ok(Self {
                    email,
                    username,
                    first_name,
                    last_name,
                    password,
                })
            }
            _ => Err(ApiError::Validation(errors)),
        }
    }
}

/// Payload of `PATCH /users/{id}`; every field optional.
#[derive(Debug, Clone, Default)]
pub struct UserUpdateForm {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserUpdateForm {
    pub fn parse(form: &Form) -> Result<Self, ApiError> {
        let mut errors = FieldErrors::new();
        let mut result = Self::default();

        match form.get_optional_str("email") {
            Ok(Some(v)) => match validate_email(&v) {
                Ok(v) => result.email = Some(v),
                Err(e) => errors.add("email", e),
            },
            Ok(None) => {}
            Err(e) => errors.add("email", e),
        }
        for (key, slot) in [
            ("first_name", &mut result.first_name),
            ("last_name", &mut result.last_name),
        ] {
            match form
                .get_optional_str(key)
                .and_then(|v| v.map(|v| bounded(v, NAME_MAX_LENGTH)).transpose())
            {
                Ok(v) => *slot = v,
                Err(e) => errors.add(key, e),
            }
        }

        errors.into_result().map(|_| result)
    }
}

#[derive(Debug, Clone)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn parse(form: &Form) -> Result<Self, ApiError> {
        let mut errors = FieldErrors::new();
        let email = form.get_str("email").map_err(|e| errors.add("email", e)).ok();
        let password = form
            .get_str("password")
            .map_err(|e| errors.add("password", e))
            .ok();

        match (email, password) {
            (Some(email), Some(password)) => Ok(Self {
                email: email.trim().to_owned(),
                password,
            }),
            _ => Err(ApiError::Validation(errors)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SetPasswordForm {
    pub new_password: String,
    pub current_password: String,
}

impl SetPasswordForm {
    pub fn parse(form: &Form) -> Result<Self, ApiError> {
        let mut errors = FieldErrors::new();
        let new_password = form
            .get_str("new_password")
            .and_then(|v| validate_password(&v).map(|_| v))
            .map_err(|e| errors.add("new_password", e))
            .ok();
        let current_password = form
            .get_str("current_password")
            .map_err(|e| errors.add("current_password", e))
            .ok();

        match (new_password, current_password) {
            (Some(new_password), Some(current_password)) => Ok(Self {
                new_password,
                current_password,
            }),
            _ => Err(ApiError::Validation(errors)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Update,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientEntry {
    pub id: Uuid,
    pub amount: i32,
}

/// Structurally validated recipe payload. Existence checks against the
/// database happen afterwards in `actions::recipes::validate_recipe_refs`.
#[derive(Debug, Clone)]
pub struct RecipeForm {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub image: Option<DecodedImage>,
    pub tags: Option<Vec<Value>>,
    pub ingredients: Option<Vec<IngredientEntry>>,
}

impl RecipeForm {
    pub fn parse(form: &Form, mode: WriteMode) -> Result<Self, ApiError> {
        let mut errors = FieldErrors::new();
        let required = |key: &str| mode == WriteMode::Create || form.contains(key);

        let name = if required("name") {
            form.get_str("name")
                .map(|v| v.trim().to_lowercase())
                .and_then(|v| {
                    if v.is_empty() {
                        Err("This field may not be blank.".to_owned())
                    } else {
                        bounded(v, RECIPE_NAME_MAX_LENGTH)
                    }
                })
                .map_err(|e| errors.add("name", e))
                .ok()
        } else {
            None
        };

        let text = if required("text") {
            form.get_str("text")
                .and_then(|v| {
                    if v.trim().is_empty() {
                        Err("This field may not be blank.".to_owned())
                    } else {
                        Ok(v)
                    }
                })
                .map_err(|e| errors.add("text", e))
                .ok()
        } else {
            None
        };

        let cooking_time = if required("cooking_time") {
            form.get_positive("cooking_time")
                .map_err(|e| errors.add("cooking_time", e))
                .ok()
        } else {
            None
        };

        let image = if required("image") {
            form.get_str("image")
                .and_then(|v| decode_data_uri(&v))
                .map_err(|e| errors.add("image", e))
                .ok()
        } else {
            None
        };

        let tags = if required("tags") {
            match form.get_list("tags") {
                Ok(tags) if tags.is_empty() && mode == WriteMode::Create => {
                    errors.add("tags", "At least one tag is required.");
                    None
                }
                Ok(tags) => Some(tags),
                Err(e) => {
                    errors.add("tags", e);
                    None
                }
            }
        } else {
            None
        };

        let ingredients = if required("ingredients") {
            match form.get_list("ingredients") {
                Ok(items) if items.is_empty() && mode == WriteMode::Create => {
                    errors.add("ingredients", "At least one ingredient is required.");
                    None
                }
                Ok(items) => match parse_ingredients(&items) {
                    Ok(entries) => Some(entries),
                    Err(e) => {
                        errors.merge(e);
                        None
                    }
                },
                Err(e) => {
                    errors.add("ingredients", e);
                    None
                }
            }
        } else {
            None
        };

        errors.into_result().map(|_| Self {
            name,
            text,
            cooking_time,
            image,
            tags,
            ingredients,
        })
    }
}

fn parse_ingredients(items: &[Value]) -> Result<Vec<IngredientEntry>, FieldErrors> {
    let mut errors = FieldErrors::new();
    let mut entries: Vec<IngredientEntry> = Vec::with_capacity(items.len());

    for item in items {
        let Value::Object(item) = item else {
            errors.add("ingredients", "Each ingredient must be an object.");
            continue;
        };

        let id = match item.get("id").map(parse_id) {
            Some(Ok(id)) => id,
            Some(Err(e)) => {
                errors.add("ingredients", e.to_string());
                continue;
            }
            None => {
                errors.add("ingredients", "Each ingredient needs an id.");
                continue;
            }
        };

        if entries.iter().any(|entry| entry.id == id) {
            errors.add("ingredients", "Ingredients must not repeat.");
            continue;
        }

        let amount = match item.get("amount") {
            Some(value) => match positive_integer(value) {
                Ok(amount) => amount,
                Err(e) => {
                    errors.add("ingredients", format!("amount: {e}"));
                    continue;
                }
            },
            None => {
                errors.add("ingredients", "Each ingredient needs an amount.");
                continue;
            }
        };

        entries.push(IngredientEntry { id, amount });
    }

    if errors.is_empty() {
        Ok(entries)
    } else {
        Err(errors)
    }
}

/// Query-string parameters, keeping repeated keys.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    inner: Vec<(String, String)>,
}

impl QueryParams {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        Self { inner: pairs }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<String> {
        self.inner
            .iter()
            .filter(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.to_owned())
            .collect()
    }

    /// Empty values count as absent.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ApiError> {
        match self.get(key) {
            None | Some("") => Ok(None),
            Some("1" | "true" | "True") => Ok(Some(true)),
            Some("0" | "false" | "False") => Ok(Some(false)),
            Some(_) => Err(ApiError::validation(key, "Select a valid choice.")),
        }
    }

    pub fn get_number<T: FromStr>(&self, key: &str) -> Result<Option<T>, ApiError> {
        match self.get(key) {
            None | Some("") => Ok(None),
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| ApiError::validation(key, "Enter a number.")),
        }
    }

    /// Re-encodes the parameters with `key` set to `value`, replacing earlier occurrences.
    pub fn with(&self, key: &str, value: Option<String>) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.extend_pairs(self.inner.iter().filter(|(k, _)| k != key));
        if let Some(value) = value {
            query.append_pair(key, &value);
        }
        query.finish()
    }
}
