//! Bundled seed data: the user directory and the initial norm set.
//!
//! # Invariants
//! - The embedded fixture passes the same validation as any stored norm.
//! - Seeding never overwrites a norm that already exists in the store.

use crate::identity::DirectoryIdentityProvider;
use crate::model::norm::Norm;
use crate::model::user::User;
use crate::repo::norm_repo::{NormRepository, RepoResult};
use log::info;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

const SEED_JSON: &str = include_str!("fixtures/seed.json");

/// Parsed fixture set.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureSet {
    pub users: Vec<User>,
    pub norms: Vec<Norm>,
}

impl FixtureSet {
    /// Identity provider over the fixture users.
    pub fn directory(&self) -> DirectoryIdentityProvider {
        DirectoryIdentityProvider::new(self.users.iter().cloned())
    }
}

/// Fixture decode failure.
#[derive(Debug)]
pub struct FixtureError(serde_json::Error);

impl Display for FixtureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid seed fixture: {}", self.0)
    }
}

impl Error for FixtureError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

/// Decodes the embedded fixture set.
pub fn load_fixtures() -> Result<FixtureSet, FixtureError> {
    serde_json::from_str(SEED_JSON).map_err(FixtureError)
}

/// Outcome of one seeding pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// Inserts every norm not yet present in `repo`.
pub fn seed_repository<R: NormRepository + ?Sized>(
    repo: &R,
    norms: &[Norm],
) -> RepoResult<SeedReport> {
    let mut report = SeedReport::default();
    for norm in norms {
        if repo.get_norm(&norm.id)?.is_some() {
            report.skipped += 1;
            continue;
        }
        repo.insert_norm(norm)?;
        report.inserted += 1;
    }

    info!(
        "event=store_seed module=fixtures status=ok inserted={} skipped={}",
        report.inserted, report.skipped
    );
    Ok(report)
}
