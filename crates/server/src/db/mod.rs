use anyhow::Result;
use sqlx::{
    sqlite::{SqlitePoolOptions, SqliteQueryResult},
    SqlitePool,
};
use std::path::Path;

mod models;

pub use models::*;

const USER_COLUMNS: &str =
    "SELECT id, email, password_hash, display_name, role, department, status, created_at, last_active FROM users";

const REQUEST_COLUMNS: &str = r#"
    SELECT r.id, r.requester_id, u.email AS requester_email, r.purpose,
           r.vcpus, r.memory_mb, r.storage_gb, r.duration_days,
           r.course, r.status, r.response, r.created_at
    FROM vm_requests r
    LEFT JOIN users u ON u.id = r.requester_id
"#;

const VM_COLUMNS: &str = r#"
    SELECT id, name, owner_id, status, os, vcpus, memory_mb, storage_gb,
           address, course, created_at, updated_at
    FROM vms
"#;

const VM_TYPE_COLUMNS: &str = "SELECT id, name, os_family, iso_path, description FROM vm_types";

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(path: &str) -> Result<Self> {
        // Ensure the directory exists
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", path);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Private in-memory database. A single connection, since every
    /// connection to `:memory:` opens its own empty database.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                display_name TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'student',
                department TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                last_active DATETIME
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vm_requests (
                id TEXT PRIMARY KEY,
                requester_id TEXT NOT NULL REFERENCES users(id),
                purpose TEXT NOT NULL,
                vcpus INTEGER NOT NULL,
                memory_mb INTEGER NOT NULL,
                storage_gb INTEGER NOT NULL,
                duration_days INTEGER NOT NULL,
                course TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                response TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                decided_at DATETIME
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vms (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                owner_id TEXT NOT NULL REFERENCES users(id),
                status TEXT NOT NULL DEFAULT 'creating',
                os TEXT NOT NULL,
                vcpus INTEGER NOT NULL,
                memory_mb INTEGER NOT NULL,
                storage_gb INTEGER NOT NULL,
                address TEXT,
                course TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vm_types (
                id TEXT PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                os_family TEXT NOT NULL,
                iso_path TEXT,
                description TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Database migrations completed");
        Ok(())
    }

    // User operations
    /// Insert a user. Returns `false` if the email is already taken.
    pub async fn create_user(&self, user: &User) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO users (id, email, password_hash, display_name, role, department, status) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.display_name)
        .bind(&user.role)
        .bind(&user.department)
        .bind(&user.status)
        .execute(&self.pool)
        .await;
        inserted_unless_duplicate(result)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("{USER_COLUMNS} WHERE email = ?"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("{USER_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!("{USER_COLUMNS} ORDER BY created_at ASC, rowid ASC"))
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    pub async fn touch_last_active(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE users SET last_active = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Administrative update; the only statement that writes `role` or `status`.
    pub async fn update_user_admin(
        &self,
        id: &str,
        role: Option<&str>,
        status: Option<&str>,
        department: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                role = COALESCE(?, role),
                status = COALESCE(?, status),
                department = COALESCE(?, department)
            WHERE id = ?
            "#,
        )
        .bind(role)
        .bind(status)
        .bind(department)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_profile(
        &self,
        id: &str,
        display_name: Option<&str>,
        department: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET display_name = COALESCE(?, display_name), department = COALESCE(?, department) WHERE id = ?",
        )
        .bind(display_name)
        .bind(department)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // VM request operations
    pub async fn create_request(&self, request: &VmRequest) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO vm_requests
                (id, requester_id, purpose, vcpus, memory_mb, storage_gb, duration_days, course, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&request.id)
        .bind(&request.requester_id)
        .bind(&request.purpose)
        .bind(request.vcpus)
        .bind(request.memory_mb)
        .bind(request.storage_gb)
        .bind(request.duration_days)
        .bind(&request.course)
        .bind(&request.status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_request(&self, id: &str) -> Result<Option<VmRequest>> {
        let request = sqlx::query_as::<_, VmRequest>(&format!("{REQUEST_COLUMNS} WHERE r.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(request)
    }

    /// All requests, or only those of one requester.
    pub async fn list_requests(&self, requester_id: Option<&str>) -> Result<Vec<VmRequest>> {
        let requests = match requester_id {
            Some(requester_id) => {
                sqlx::query_as::<_, VmRequest>(&format!(
                    "{REQUEST_COLUMNS} WHERE r.requester_id = ? ORDER BY r.created_at DESC, r.rowid DESC"
                ))
                .bind(requester_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, VmRequest>(&format!(
                    "{REQUEST_COLUMNS} ORDER BY r.created_at DESC, r.rowid DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(requests)
    }

    /// Record a decision. Returns false if the request was no longer pending.
    pub async fn decide_request(&self, id: &str, status: &str, response: Option<&str>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE vm_requests
            SET status = ?, response = ?, decided_at = CURRENT_TIMESTAMP
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(status)
        .bind(response)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_request_response(&self, id: &str, response: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE vm_requests SET response = ? WHERE id = ?")
            .bind(response)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // VM operations
    pub async fn create_vm(&self, vm: &VirtualMachine) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO vms (id, name, owner_id, status, os, vcpus, memory_mb, storage_gb, address, course)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&vm.id)
        .bind(&vm.name)
        .bind(&vm.owner_id)
        .bind(&vm.status)
        .bind(&vm.os)
        .bind(vm.vcpus)
        .bind(vm.memory_mb)
        .bind(vm.storage_gb)
        .bind(&vm.address)
        .bind(&vm.course)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_vm(&self, id: &str) -> Result<Option<VirtualMachine>> {
        let vm = sqlx::query_as::<_, VirtualMachine>(&format!("{VM_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(vm)
    }

    /// All VMs, or only those of one owner.
    pub async fn list_vms(&self, owner_id: Option<&str>) -> Result<Vec<VirtualMachine>> {
        let vms = match owner_id {
            Some(owner_id) => {
                sqlx::query_as::<_, VirtualMachine>(&format!(
                    "{VM_COLUMNS} WHERE owner_id = ? ORDER BY created_at DESC, rowid DESC"
                ))
                .bind(owner_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, VirtualMachine>(&format!(
                    "{VM_COLUMNS} ORDER BY created_at DESC, rowid DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(vms)
    }

    pub async fn update_vm_status(&self, id: &str, status: &str, address: Option<&str>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE vms SET status = ?, address = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(status)
        .bind(address)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_vm(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM vms WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // VM type operations
    /// Insert a template. Returns `false` if the name is already taken.
    pub async fn create_vm_type(&self, vm_type: &VmType) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO vm_types (id, name, os_family, iso_path, description) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&vm_type.id)
        .bind(&vm_type.name)
        .bind(&vm_type.os_family)
        .bind(&vm_type.iso_path)
        .bind(&vm_type.description)
        .execute(&self.pool)
        .await;
        inserted_unless_duplicate(result)
    }

    pub async fn get_vm_type(&self, id: &str) -> Result<Option<VmType>> {
        let vm_type = sqlx::query_as::<_, VmType>(&format!("{VM_TYPE_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(vm_type)
    }

    pub async fn get_vm_type_by_name(&self, name: &str) -> Result<Option<VmType>> {
        let vm_type = sqlx::query_as::<_, VmType>(&format!("{VM_TYPE_COLUMNS} WHERE name = ?"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(vm_type)
    }

    pub async fn list_vm_types(&self) -> Result<Vec<VmType>> {
        let vm_types = sqlx::query_as::<_, VmType>(&format!("{VM_TYPE_COLUMNS} ORDER BY name ASC"))
            .fetch_all(&self.pool)
            .await?;
        Ok(vm_types)
    }

    pub async fn delete_vm_type(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM vm_types WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn inserted_unless_duplicate(result: sqlx::Result<SqliteQueryResult>) -> Result<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(false),
        Err(e) => Err(e.into()),
    }
}
