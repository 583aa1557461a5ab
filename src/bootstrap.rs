//! Local pgvector bootstrap via docker

use tokio::process::Command;
use tracing::{info, instrument};

use crate::error::{BrigadeError, Result};

/// Settings for the local pgvector container.
///
/// Defaults match the development database the crate's knowledge stores
/// expect at `postgresql://ai:ai@localhost:5532/ai`.
#[derive(Debug, Clone)]
pub struct PgVectorBootstrap {
    pub container_name: String,
    pub image: String,
    pub host_port: u16,
    pub volume: String,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl Default for PgVectorBootstrap {
    fn default() -> Self {
        Self {
            container_name: "brigade-pgvector".to_string(),
            image: "agnohq/pgvector:16".to_string(),
            host_port: 5532,
            volume: "pgvolume".to_string(),
            database: "ai".to_string(),
            user: "ai".to_string(),
            password: "ai".to_string(),
        }
    }
}

impl PgVectorBootstrap {
    /// Connection URL for the bootstrapped database.
    pub fn db_url(&self) -> String {
        format!(
            "postgresql://{}:{}@localhost:{}/{}",
            self.user, self.password, self.host_port, self.database
        )
    }

    fn run_args(&self) -> Vec<String> {
        vec![
            "run".into(),
            "-d".into(),
            "--name".into(),
            self.container_name.clone(),
            "-e".into(),
            format!("POSTGRES_DB={}", self.database),
            "-e".into(),
            format!("POSTGRES_USER={}", self.user),
            "-e".into(),
            format!("POSTGRES_PASSWORD={}", self.password),
            "-e".into(),
            "PGDATA=/var/lib/postgresql/data/pgdata".into(),
            "-v".into(),
            format!("{}:/var/lib/postgresql/data", self.volume),
            "-p".into(),
            format!("{}:5432", self.host_port),
            self.image.clone(),
        ]
    }

    /// Start the container; a container with this name must not already
    /// exist.
    #[instrument(skip(self), fields(container = %self.container_name))]
    pub async fn up(&self) -> Result<()> {
        let output = Command::new("docker")
            .args(self.run_args())
            .output()
            .await
            .map_err(|e| {
                BrigadeError::Infrastructure(format!("failed to invoke docker: {e}"))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BrigadeError::Infrastructure(format!(
                "docker run failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        info!(url = %self.db_url(), "pgvector container started");
        Ok(())
    }

    /// Stop and remove the container; the data volume is kept.
    #[instrument(skip(self), fields(container = %self.container_name))]
    pub async fn down(&self) -> Result<()> {
        for action in ["stop", "rm"] {
            let output = Command::new("docker")
                .args([action, &self.container_name])
                .output()
                .await
                .map_err(|e| {
                    BrigadeError::Infrastructure(format!("failed to invoke docker: {e}"))
                })?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(BrigadeError::Infrastructure(format!(
                    "docker {action} failed ({}): {}",
                    output.status,
                    stderr.trim()
                )));
            }
        }

        info!("pgvector container removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_db_url_matches_the_development_convention() {
        let bootstrap = PgVectorBootstrap::default();
        assert_eq!(bootstrap.db_url(), "postgresql://ai:ai@localhost:5532/ai");
    }

    #[test]
    fn run_args_wire_port_and_volume() {
        let bootstrap = PgVectorBootstrap::default();
        let args = bootstrap.run_args();
        assert!(args.contains(&"5532:5432".to_string()));
        assert!(args.contains(&"pgvolume:/var/lib/postgresql/data".to_string()));
        assert_eq!(args.last().unwrap(), "agnohq/pgvector:16");
    }
}
