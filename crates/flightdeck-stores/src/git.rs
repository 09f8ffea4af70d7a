//! Git provenance attached to shared previews

use std::path::Path;

use git2::Repository;
use tracing::{debug, instrument};

use crate::error::Result;

/// Branch, commit and ref of the working tree a build came from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitProvenance {
    pub branch: Option<String>,
    pub commit_sha: Option<String>,
    pub git_ref: Option<String>,
}

impl GitProvenance {
    /// Read provenance from the repository enclosing `start_path`
    #[instrument(fields(start_path = %start_path.display()))]
    pub fn read(start_path: &Path) -> Result<Self> {
        let repo = Repository::discover(start_path)?;
        let head = repo.head()?;

        let branch = if head.is_branch() {
            head.shorthand().map(str::to_string)
        } else {
            None
        };
        let commit_sha = Some(head.peel_to_commit()?.id().to_string());
        let git_ref = head.name().filter(|name| *name != "HEAD").map(str::to_string);

        Ok(Self {
            branch,
            commit_sha,
            git_ref,
        })
    }

    /// Like `read`, but outside a repository (or with an unborn HEAD)
    /// yields empty provenance
    pub fn discover(start_path: &Path) -> Self {
        match Self::read(start_path) {
            Ok(provenance) => provenance,
            Err(e) => {
                debug!(error = %e, "no git provenance available");
                Self::default()
            }
        }
    }
}
