//! Parquet-backed user directory.
//!
//! All records live in a single `users.parquet` under the data folder. Every mutation
//! is a read-modify-write of the whole file, serialized by an in-process mutex and
//! published with a rename so readers never observe a half-written file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use polars::prelude::*;

use super::directory::{build_user, DirectoryError, UserDirectory};
use super::user::{NewUser, User, UserId};
use super::validation::normalize_email;

pub const USERS_FILE: &str = "users.parquet";

pub struct ParquetUserDirectory {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ParquetUserDirectory {
    /// Opens (or prepares) the directory under `data_dir`. An existing file must be readable.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create or access user data folder: {}", dir.display()))?;
        let path = dir.join(USERS_FILE);
        let existing = load_users(&path).with_context(|| format!("While reading {}", path.display()))?;
        tracing::info!(target: "users", path = %path.display(), users = existing.len(), "parquet user directory ready");
        Ok(Self { path, write_lock: Mutex::new(()) })
    }

    pub fn path(&self) -> &Path { &self.path }
}

impl UserDirectory for ParquetUserDirectory {
    fn find_by_id(&self, id: UserId) -> Result<Option<User>, DirectoryError> {
        let users = load_users(&self.path)?;
        Ok(users.into_iter().find(|u| u.id == id))
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        let email = normalize_email(email);
        let users = load_users(&self.path)?;
        Ok(users.into_iter().find(|u| u.email == email))
    }

    fn create(&self, candidate: NewUser) -> Result<User, DirectoryError> {
        let _guard = self.write_lock.lock();
        let mut users = load_users(&self.path)?;
        let next_id = UserId(users.iter().map(|u| u.id.0).max().unwrap_or(0) + 1);
        let user = build_user(&candidate, &users, next_id)?;
        users.push(user.clone());
        store_users(&self.path, &users)?;
        crate::tprintln!("users.create(parquet) id={} email={}", user.id, user.email);
        Ok(user)
    }
}

fn mk_schema_df() -> DataFrame {
    let ids: Series = Series::new("id".into(), Vec::<i64>::new());
    let names: Series = Series::new("name".into(), Vec::<String>::new());
    let emails: Series = Series::new("email".into(), Vec::<String>::new());
    let digests: Series = Series::new("password_digest".into(), Vec::<String>::new());
    let created: Series = Series::new("created_at".into(), Vec::<i64>::new());
    let updated: Series = Series::new("updated_at".into(), Vec::<i64>::new());
    DataFrame::new(vec![ids.into(), names.into(), emails.into(), digests.into(), created.into(), updated.into()]).unwrap()
}

fn read_users(path: &Path) -> Result<DataFrame> {
    if !path.exists() { return Ok(mk_schema_df()); }
    let file = std::fs::File::open(path)?;
    let df = ParquetReader::new(file).finish()?;
    Ok(df)
}

fn write_users(path: &Path, mut df: DataFrame) -> Result<()> {
    if let Some(dir) = path.parent() { std::fs::create_dir_all(dir)?; }
    let tmp = path.with_extension("parquet.tmp");
    {
        let mut f = std::fs::File::create(&tmp)?;
        ParquetWriter::new(&mut f).finish(&mut df)?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn str_at(df: &DataFrame, col: &str, i: usize) -> Result<String> {
    Ok(match df.column(col)?.get(i)? {
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        AnyValue::Null => return Err(anyhow!("null {} at row {}", col, i)),
        other => return Err(anyhow!("unexpected {} value at row {}: {:?}", col, i, other)),
    })
}

fn i64_at(df: &DataFrame, col: &str, i: usize) -> Result<i64> {
    df.column(col)?.i64()?.get(i).ok_or_else(|| anyhow!("null {} at row {}", col, i))
}

fn ts_at(df: &DataFrame, col: &str, i: usize) -> Result<DateTime<Utc>> {
    let ms = i64_at(df, col, i)?;
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("{} out of range at row {}: {}", col, i, ms))
}

fn load_users(path: &Path) -> Result<Vec<User>> {
    let df = read_users(path)?;
    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        out.push(User {
            id: UserId(i64_at(&df, "id", i)?),
            name: str_at(&df, "name", i)?,
            email: str_at(&df, "email", i)?,
            password_digest: str_at(&df, "password_digest", i)?,
            created_at: ts_at(&df, "created_at", i)?,
            updated_at: ts_at(&df, "updated_at", i)?,
        });
    }
    Ok(out)
}

fn store_users(path: &Path, users: &[User]) -> Result<()> {
    let df = DataFrame::new(vec![
        Series::new("id".into(), users.iter().map(|u| u.id.0).collect::<Vec<i64>>()).into(),
        Series::new("name".into(), users.iter().map(|u| u.name.clone()).collect::<Vec<String>>()).into(),
        Series::new("email".into(), users.iter().map(|u| u.email.clone()).collect::<Vec<String>>()).into(),
        Series::new("password_digest".into(), users.iter().map(|u| u.password_digest.clone()).collect::<Vec<String>>()).into(),
        Series::new("created_at".into(), users.iter().map(|u| u.created_at.timestamp_millis()).collect::<Vec<i64>>()).into(),
        Series::new("updated_at".into(), users.iter().map(|u| u.updated_at.timestamp_millis()).collect::<Vec<i64>>()).into(),
    ])?;
    write_users(path, df)
}

#[cfg(test)]
#[path = "parquet_tests.rs"]
mod parquet_tests;
