//! Deploy adapter — recursive copy of an application tree into the fixed
//! deployment root.
//!
//! Re-deploying overwrites in place (idempotent at the filesystem level);
//! files removed upstream are not pruned here, and there is no versioning
//! or rollback.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::DeployConfig;
use crate::error::GatewayError;
use crate::policy::Policy;

#[derive(Debug, Clone)]
pub struct DeployResult {
    pub app: String,
    pub path: PathBuf,
    pub files_copied: usize,
}

pub struct Deployer {
    policy: Arc<Policy>,
    root: PathBuf,
}

impl Deployer {
    pub fn new(policy: Arc<Policy>, config: &DeployConfig) -> Self {
        Self {
            policy,
            root: PathBuf::from(shellexpand::tilde(&config.root).to_string()),
        }
    }

    /// Copy `source` into `<root>/<app>`.
    ///
    /// The app name must be a single path component — it keys a directory
    /// under the deployment root and may not navigate out of it. The source
    /// path is policy-checked; the root itself is operator-configured and
    /// implicitly trusted.
    pub fn deploy(&self, app: &str, source: &Path) -> Result<DeployResult, GatewayError> {
        validate_app_name(app)?;
        let source = self.policy.check_path(source)?;

        if !source.exists() {
            return Err(GatewayError::NotFound(format!(
                "source not found: {}",
                source.display()
            )));
        }
        if !source.is_dir() {
            return Err(GatewayError::MalformedRequest(format!(
                "source is not a directory: {}",
                source.display()
            )));
        }

        let target = self.root.join(app);
        debug!(app, source = %source.display(), target = %target.display(), "deploying");

        let files_copied = copy_tree(&source, &target).map_err(|e| {
            GatewayError::Internal(format!(
                "deploy {} -> {}: {e}",
                source.display(),
                target.display()
            ))
        })?;

        info!(app, files_copied, "deployed application");
        Ok(DeployResult {
            app: app.to_string(),
            path: target,
            files_copied,
        })
    }
}

fn validate_app_name(app: &str) -> Result<(), GatewayError> {
    let mut components = Path::new(app).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(GatewayError::MalformedRequest(format!(
            "invalid application name: {app}"
        ))),
    }
}

/// Copy a directory tree, returning the number of files copied.
fn copy_tree(source: &Path, target: &Path) -> io::Result<usize> {
    fs::create_dir_all(target)?;

    let mut copied = 0;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let dest = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copied += copy_tree(&entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyConfig;
    use tempfile::TempDir;

    fn deployer(allowed: &Path, root: &Path) -> Deployer {
        let policy = Arc::new(Policy::from_config(&PolicyConfig {
            allowed_paths: vec![allowed.to_string_lossy().into_owned()],
            denied_paths: vec![],
            allowed_commands: vec![],
        }));
        Deployer::new(
            policy,
            &DeployConfig {
                root: root.to_string_lossy().into_owned(),
            },
        )
    }

    fn make_source(dir: &Path) -> PathBuf {
        let source = dir.join("myapp");
        fs::create_dir_all(source.join("static/css")).unwrap();
        fs::write(source.join("index.html"), "<html/>").unwrap();
        fs::write(source.join("static/app.js"), "void 0;").unwrap();
        fs::write(source.join("static/css/site.css"), "body {}").unwrap();
        source
    }

    #[test]
    fn test_copies_nested_tree() {
        let work = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let source = make_source(work.path());

        let result = deployer(work.path(), root.path())
            .deploy("myapp", &source)
            .unwrap();

        assert_eq!(result.files_copied, 3);
        assert_eq!(result.path, root.path().join("myapp"));
        assert!(root.path().join("myapp/static/css/site.css").exists());
        assert_eq!(
            fs::read_to_string(root.path().join("myapp/index.html")).unwrap(),
            "<html/>"
        );
    }

    #[test]
    fn test_redeploy_overwrites() {
        let work = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let source = make_source(work.path());
        let deployer = deployer(work.path(), root.path());

        deployer.deploy("myapp", &source).unwrap();
        fs::write(source.join("index.html"), "<html>v2</html>").unwrap();
        deployer.deploy("myapp", &source).unwrap();

        assert_eq!(
            fs::read_to_string(root.path().join("myapp/index.html")).unwrap(),
            "<html>v2</html>"
        );
    }

    #[test]
    fn test_app_name_must_be_single_component() {
        let work = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let source = make_source(work.path());
        let deployer = deployer(work.path(), root.path());

        for bad in ["../escape", "a/b", "..", ".", "", "/abs"] {
            let err = deployer.deploy(bad, &source).unwrap_err();
            assert!(
                matches!(err, GatewayError::MalformedRequest(_)),
                "expected rejection for {bad:?}"
            );
        }
    }

    #[test]
    fn test_source_is_policy_checked() {
        let work = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        let source = make_source(elsewhere.path());

        let err = deployer(work.path(), root.path())
            .deploy("myapp", &source)
            .unwrap_err();
        assert!(matches!(err, GatewayError::PolicyDenied(_)));
    }

    #[test]
    fn test_missing_source_is_not_found() {
        let work = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();

        let err = deployer(work.path(), root.path())
            .deploy("myapp", &work.path().join("absent"))
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }
}
