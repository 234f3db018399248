pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const USER_COUNT_PER_PAGE: i64 = 6;
pub const SUBSCRIPTION_RECIPES_LIMIT: i64 = 3;

pub const USERNAME_MIN_LENGTH: usize = 3;
pub const USERNAME_MAX_LENGTH: usize = 150;
pub const NAME_MAX_LENGTH: usize = 150;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const PASSWORD_MIN_LENGTH: usize = 6;
pub const RECIPE_NAME_MAX_LENGTH: usize = 200;

pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.pdf";
pub const RECIPE_IMAGE_DIR: &str = "recipes/images";

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

pub const MAX_BODY_SIZE: u64 = 10 * 1024 * 1024;
