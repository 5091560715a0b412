//! User records and the directories that own them.
//! Keep the public surface thin and split implementation across sub-modules.

mod user;
mod validation;
mod directory;
mod parquet;

pub use user::{User, UserId, NewUser, ValidationErrors, FieldError, PERMITTED_SIGNUP_FIELDS};
pub use validation::{normalize_email, validate_new_user, NAME_MAX_LEN, EMAIL_MAX_LEN, PASSWORD_MIN_LEN};
pub use directory::{UserDirectory, DirectoryError, MemoryUserDirectory};
pub use parquet::{ParquetUserDirectory, USERS_FILE};
