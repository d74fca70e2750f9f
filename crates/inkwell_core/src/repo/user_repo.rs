//! User repository contract and SQLite implementation.
//!
//! # Invariants
//! - Email is unique; a duplicate insert surfaces as [`RepoError::Conflict`].
//! - Password hashes only leave this module inside [`Credentials`].

use crate::clock::now_millis;
use crate::model::{new_id, Credentials, NewUser, Page, PageRequest, ProfilePatch, Role, User};
use crate::repo::{
    ensure_schema_ready, is_unique_violation, like_pattern, RepoError, RepoResult, SparseUpdate,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const USER_COLUMNS: &str = "id, email, name, avatar, bio, role, created_at, updated_at";

/// Repository interface for user accounts.
pub trait UserRepository {
    fn create_user(&self, user: &NewUser) -> RepoResult<User>;
    fn get_user(&self, id: &str) -> RepoResult<User>;
    /// Looks up login credentials by exact email.
    fn get_credentials_by_email(&self, email: &str) -> RepoResult<Credentials>;
    fn get_credentials(&self, id: &str) -> RepoResult<Credentials>;
    fn update_profile(&self, id: &str, patch: &ProfilePatch) -> RepoResult<()>;
    fn update_password(&self, id: &str, password_hash: &str) -> RepoResult<()>;
    fn update_role(&self, id: &str, role: Role) -> RepoResult<()>;
    /// Lists users newest first, optionally filtered by name/email substring.
    fn list_users(&self, query: Option<&str>, page: PageRequest) -> RepoResult<Page<User>>;
    fn delete_user(&self, id: &str) -> RepoResult<()>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }

    fn credentials_where(&self, column: &str, value: &str) -> RepoResult<Option<Credentials>> {
        let sql = format!("SELECT {USER_COLUMNS}, password FROM users WHERE {column} = ?1;");
        let found = self
            .conn
            .query_row(&sql, [value], |row| {
                Ok((parse_user_row(row), row.get::<_, String>("password")?))
            })
            .optional()?;
        match found {
            Some((user, password_hash)) => Ok(Some(Credentials {
                user: user?,
                password_hash,
            })),
            None => Ok(None),
        }
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &NewUser) -> RepoResult<User> {
        let id = new_id();
        let now = now_millis();
        self.conn
            .execute(
                "INSERT INTO users (id, email, name, password, role, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6);",
                params![
                    id,
                    user.email,
                    user.name,
                    user.password_hash,
                    user.role.as_str(),
                    now
                ],
            )
            .map_err(|err| {
                if is_unique_violation(&err) {
                    RepoError::Conflict(format!("email already registered: {}", user.email))
                } else {
                    RepoError::from(err)
                }
            })?;
        self.get_user(&id)
    }

    fn get_user(&self, id: &str) -> RepoResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1;");
        self.conn
            .query_row(&sql, [id], |row| Ok(parse_user_row(row)))
            .optional()?
            .ok_or_else(|| RepoError::not_found("user", id))?
    }

    fn get_credentials_by_email(&self, email: &str) -> RepoResult<Credentials> {
        self.credentials_where("email", email)?
            .ok_or_else(|| RepoError::not_found("user", email))
    }

    fn get_credentials(&self, id: &str) -> RepoResult<Credentials> {
        self.credentials_where("id", id)?
            .ok_or_else(|| RepoError::not_found("user", id))
    }

    fn update_profile(&self, id: &str, patch: &ProfilePatch) -> RepoResult<()> {
        let mut update = SparseUpdate::new();
        update
            .set_opt("name", patch.name.clone())
            .set_opt("avatar", patch.avatar.clone())
            .set_opt("bio", patch.bio.clone())
            .set("updated_at", now_millis());
        ensure_changed(update.execute(self.conn, "users", id)?, id)
    }

    fn update_password(&self, id: &str, password_hash: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users SET password = ?2, updated_at = ?3 WHERE id = ?1;",
            params![id, password_hash, now_millis()],
        )?;
        ensure_changed(changed, id)
    }

    fn update_role(&self, id: &str, role: Role) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users SET role = ?2, updated_at = ?3 WHERE id = ?1;",
            params![id, role.as_str(), now_millis()],
        )?;
        ensure_changed(changed, id)
    }

    fn list_users(&self, query: Option<&str>, page: PageRequest) -> RepoResult<Page<User>> {
        let mut where_sql = String::from(" WHERE 1 = 1");
        let mut binds: Vec<Value> = Vec::new();
        if let Some(query) = query.map(str::trim).filter(|query| !query.is_empty()) {
            where_sql.push_str(" AND (name LIKE ? ESCAPE '\\' OR email LIKE ? ESCAPE '\\')");
            let pattern = like_pattern(query);
            binds.push(Value::Text(pattern.clone()));
            binds.push(Value::Text(pattern));
        }

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM users{where_sql};"),
            params_from_iter(binds.iter()),
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users{where_sql}
             ORDER BY created_at DESC, id ASC LIMIT ? OFFSET ?;"
        );
        binds.push(Value::Integer(page.limit()));
        binds.push(Value::Integer(page.offset()));
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(Page::new(users, u64::try_from(total).unwrap_or_default(), page))
    }

    fn delete_user(&self, id: &str) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM users WHERE id = ?1;", [id])?;
        ensure_changed(changed, id)
    }
}

fn ensure_changed(changed: usize, id: &str) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::not_found("user", id));
    }
    Ok(())
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let role_text: String = row.get("role")?;
    let role = Role::parse(&role_text)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid user role `{role_text}`")))?;
    Ok(User {
        id: row.get("id")?,
        email: row.get("email")?,
        name: row.get("name")?,
        avatar: row.get("avatar")?,
        bio: row.get("bio")?,
        role,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
