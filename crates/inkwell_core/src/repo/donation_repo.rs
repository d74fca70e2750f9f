//! Donation QR code repository contract and SQLite implementation.

use crate::clock::now_millis;
use crate::model::{new_id, DonationQrCode, DonationQrCodePatch, NewDonationQrCode};
use crate::repo::{bool_to_int, ensure_schema_ready, RepoError, RepoResult, SparseUpdate};
use rusqlite::{params, Connection, OptionalExtension, Row};

const DONATION_COLUMNS: &str =
    "id, name, icon, qrcode_url, sort_order, enabled, created_at, updated_at";

pub trait DonationRepository {
    /// Enabled codes in display order.
    fn list_enabled(&self) -> RepoResult<Vec<DonationQrCode>>;
    fn list_all(&self) -> RepoResult<Vec<DonationQrCode>>;
    fn create(&self, code: &NewDonationQrCode) -> RepoResult<DonationQrCode>;
    fn update(&self, id: &str, patch: &DonationQrCodePatch) -> RepoResult<()>;
    fn delete(&self, id: &str) -> RepoResult<()>;
}

/// SQLite-backed donation QR code repository.
pub struct SqliteDonationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDonationRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }

    fn list_where(&self, where_sql: &str) -> RepoResult<Vec<DonationQrCode>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DONATION_COLUMNS} FROM donation_qrcodes{where_sql}
             ORDER BY sort_order ASC, created_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut codes = Vec::new();
        while let Some(row) = rows.next()? {
            codes.push(parse_donation_row(row)?);
        }
        Ok(codes)
    }

    fn get(&self, id: &str) -> RepoResult<DonationQrCode> {
        self.conn
            .query_row(
                &format!("SELECT {DONATION_COLUMNS} FROM donation_qrcodes WHERE id = ?1;"),
                [id],
                parse_donation_row,
            )
            .optional()?
            .ok_or_else(|| RepoError::not_found("donation_qrcode", id))
    }
}

impl DonationRepository for SqliteDonationRepository<'_> {
    fn list_enabled(&self) -> RepoResult<Vec<DonationQrCode>> {
        self.list_where(" WHERE enabled = 1")
    }

    fn list_all(&self) -> RepoResult<Vec<DonationQrCode>> {
        self.list_where("")
    }

    fn create(&self, code: &NewDonationQrCode) -> RepoResult<DonationQrCode> {
        let id = new_id();
        let now = now_millis();
        self.conn.execute(
            "INSERT INTO donation_qrcodes (
                id, name, icon, qrcode_url, sort_order, enabled, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7);",
            params![
                id,
                code.name,
                code.icon,
                code.qrcode_url,
                code.sort_order,
                bool_to_int(code.enabled),
                now
            ],
        )?;
        self.get(&id)
    }

    fn update(&self, id: &str, patch: &DonationQrCodePatch) -> RepoResult<()> {
        let mut update = SparseUpdate::new();
        update
            .set_opt("name", patch.name.clone())
            .set_opt("icon", patch.icon.clone())
            .set_opt("qrcode_url", patch.qrcode_url.clone())
            .set_opt("sort_order", patch.sort_order)
            .set_opt("enabled", patch.enabled.map(bool_to_int))
            .set("updated_at", now_millis());
        if update.execute(self.conn, "donation_qrcodes", id)? == 0 {
            return Err(RepoError::not_found("donation_qrcode", id));
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM donation_qrcodes WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found("donation_qrcode", id));
        }
        Ok(())
    }
}

fn parse_donation_row(row: &Row<'_>) -> rusqlite::Result<DonationQrCode> {
    let enabled: i64 = row.get("enabled")?;
    Ok(DonationQrCode {
        id: row.get("id")?,
        name: row.get("name")?,
        icon: row.get("icon")?,
        qrcode_url: row.get("qrcode_url")?,
        sort_order: row.get("sort_order")?,
        enabled: enabled != 0,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
