use sqlx::{Pool, Postgres};

use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::generate_jwt_session,
    },
    error::{is_unique_violation, ApiError, FieldErrors, NON_FIELD_ERRORS},
    form::{LoginForm, UserForm, UserUpdateForm},
    pagination::PageRequest,
    schema::{User, Uuid},
};

const EMAIL_TAKEN: &str = "A user with that email already exists.";
const USERNAME_TAKEN: &str = "A user with that username already exists.";
const INVALID_CREDENTIALS: &str = "Unable to log in with provided credentials.";

pub async fn get_user_by_id(user_id: Uuid, pool: &Pool<Postgres>) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_user_by_email(email: &str, pool: &Pool<Postgres>) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn list_users_by_ids(ids: &[Uuid], pool: &Pool<Postgres>) -> Result<Vec<User>, ApiError> {
    let rows: Vec<User> = sqlx::query_as("SELECT * FROM users WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Looks for other accounts already using the email or username.
async fn find_conflicts(
    email: Option<&str>,
    username: Option<&str>,
    except: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<FieldErrors, ApiError> {
    let mut errors = FieldErrors::new();

    if let Some(email) = email {
        let taken: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND id IS DISTINCT FROM $2)",
        )
        .bind(email)
        .bind(except)
        .fetch_one(pool)
        .await?;
        if taken.0 {
            errors.add("email", EMAIL_TAKEN);
        }
    }

    if let Some(username) = username {
        let taken: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 AND id IS DISTINCT FROM $2)",
        )
        .bind(username)
        .bind(except)
        .fetch_one(pool)
        .await?;
        if taken.0 {
            errors.add("username", USERNAME_TAKEN);
        }
    }

    Ok(errors)
}

fn conflict_error(error: sqlx::Error) -> ApiError {
    if is_unique_violation(&error) {
        return ApiError::validation(NON_FIELD_ERRORS, "A user with these credentials already exists.");
    }
    error.into()
}

/// Creates a user; the password in the form is hashed here.
pub async fn create_user(
    form: &UserForm,
    is_superuser: bool,
    pool: &Pool<Postgres>,
) -> Result<User, ApiError> {
    find_conflicts(Some(&form.email), Some(&form.username), None, pool)
        .await?
        .into_result()?;

    let password = hash_password(&form.password).map_err(ApiError::internal)?;

    let user: User = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password, is_superuser)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        ",
    )
    .bind(&form.email)
    .bind(&form.username)
    .bind(&form.first_name)
    .bind(&form.last_name)
    .bind(password)
    .bind(is_superuser)
    .fetch_one(pool)
    .await
    .map_err(conflict_error)?;

    log::info!("Registered user {} ({})", user.username, user.id);
    Ok(user)
}

pub async fn list_users(
    request: PageRequest,
    pool: &Pool<Postgres>,
) -> Result<(Vec<User>, i64), ApiError> {
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    request.check(total.0)?;

    let rows: Vec<User> =
        sqlx::query_as("SELECT * FROM users ORDER BY username, email LIMIT $1 OFFSET $2")
            .bind(request.page_size)
            .bind(request.offset())
            .fetch_all(pool)
            .await?;

    Ok((rows, total.0))
}

/// Authors the user is subscribed to, one page of them.
pub async fn list_subscriptions(
    user_id: Uuid,
    request: PageRequest,
    pool: &Pool<Postgres>,
) -> Result<(Vec<User>, i64), ApiError> {
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM subscriptions WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    request.check(total.0)?;

    let rows: Vec<User> = sqlx::query_as(
        "
        SELECT u.*
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY u.username, u.email
        LIMIT $2 OFFSET $3
        ",
    )
    .bind(user_id)
    .bind(request.page_size)
    .bind(request.offset())
    .fetch_all(pool)
    .await?;

    Ok((rows, total.0))
}

pub async fn update_user(
    user: &User,
    form: &UserUpdateForm,
    pool: &Pool<Postgres>,
) -> Result<User, ApiError> {
    find_conflicts(form.email.as_deref(), None, Some(user.id), pool)
        .await?
        .into_result()?;

    let updated: User = sqlx::query_as(
        "
        UPDATE users
        SET email = COALESCE($2, email),
            first_name = COALESCE($3, first_name),
            last_name = COALESCE($4, last_name)
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(user.id)
    .bind(form.email.as_deref())
    .bind(form.first_name.as_deref())
    .bind(form.last_name.as_deref())
    .fetch_one(pool)
    .await
    .map_err(conflict_error)?;

    Ok(updated)
}

/// Deletes the account. Recipes and relations go with it through the cascades.
pub async fn delete_user(user_id: Uuid, pool: &Pool<Postgres>) -> Result<bool, ApiError> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn set_password(
    user_id: Uuid,
    current_password: &str,
    new_password: &str,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let user = get_user_by_id(user_id, pool)
        .await?
        .ok_or(ApiError::InvalidToken)?;

    let valid = verify_password(current_password, &user.password).map_err(ApiError::internal)?;
    if !valid {
        return Err(ApiError::validation("current_password", "Invalid password."));
    }

    let password = hash_password(new_password).map_err(ApiError::internal)?;
    sqlx::query("UPDATE users SET password = $2 WHERE id = $1")
        .bind(user_id)
        .bind(password)
        .execute(pool)
        .await?;

    log::info!("User {} changed their password", user.id);
    Ok(())
}

/// Checks the credentials and issues a signed session token.
pub async fn login_user(
    form: &LoginForm,
    secret: &str,
    ttl: chrono::Duration,
    pool: &Pool<Postgres>,
) -> Result<String, ApiError> {
    let Some(user) = get_user_by_email(&form.email, pool).await? else {
        return Err(ApiError::validation(NON_FIELD_ERRORS, INVALID_CREDENTIALS));
    };

    // A hash that fails to parse is treated as a wrong password.
    let authenticated = verify_password(&form.password, &user.password).unwrap_or(false);
    if !authenticated {
        return Err(ApiError::validation(NON_FIELD_ERRORS, INVALID_CREDENTIALS));
    }

    generate_jwt_session(&user, secret, ttl)
}
