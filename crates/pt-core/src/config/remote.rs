//! Remote host description
//!
//! A remote is written `[user@]host:<pantheon dir>`.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Where and how to reach the remote side of an experiment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteHost {
    /// ssh/scp target, `[user@]host`
    pub addr: String,
    /// Externally reachable address of the remote host
    pub ip: String,
    /// Checkout of the experiment tree on the remote host
    pub pantheon_dir: PathBuf,
}

impl RemoteHost {
    /// Parse `[user@]host:<dir>`
    pub fn parse(remote: &str) -> Result<Self, ConfigError> {
        let (addr, dir) = remote.split_once(':').ok_or_else(|| {
            ConfigError::Invalid(format!(
                "remote must be [user@]host:<pantheon dir>, got '{}'",
                remote
            ))
        })?;
        if addr.is_empty() || dir.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "remote must be [user@]host:<pantheon dir>, got '{}'",
                remote
            )));
        }

        let ip = addr.rsplit('@').next().unwrap_or(addr).to_string();
        Ok(Self {
            addr: addr.to_string(),
            ip,
            pantheon_dir: PathBuf::from(dir),
        })
    }

    /// Prefix that runs a command on the remote host
    pub fn ssh_cmd(&self) -> Vec<String> {
        vec!["ssh".to_string(), self.addr.clone()]
    }

    /// Tunnel manager script on the remote host
    pub fn tunnel_manager(&self) -> PathBuf {
        self.pantheon_dir.join("test").join("tunnel_manager.py")
    }

    /// Scheme wrapper for `cc` on the remote host
    pub fn cc_src(&self, cc: &str) -> PathBuf {
        self.pantheon_dir.join("src").join(format!("{}.py", cc))
    }

    /// `scp` source argument for a remote path
    pub fn scp_source(&self, path: &Path) -> String {
        format!("{}:{}", self.addr, path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_user() {
        let remote = RemoteHost::parse("alice@10.0.0.5:~/pantheon").unwrap();
        assert_eq!(remote.addr, "alice@10.0.0.5");
        assert_eq!(remote.ip, "10.0.0.5");
        assert_eq!(remote.ssh_cmd(), vec!["ssh", "alice@10.0.0.5"]);
        assert_eq!(
            remote.tunnel_manager(),
            PathBuf::from("~/pantheon/test/tunnel_manager.py")
        );
        assert_eq!(remote.cc_src("bbr"), PathBuf::from("~/pantheon/src/bbr.py"));
    }

    #[test]
    fn test_parse_without_user() {
        let remote = RemoteHost::parse("lab-box:/opt/pantheon").unwrap();
        assert_eq!(remote.ip, "lab-box");
        assert_eq!(
            remote.scp_source(Path::new("/tmp/x.log")),
            "lab-box:/tmp/x.log"
        );
    }

    #[test]
    fn test_parse_rejects_missing_dir() {
        assert!(RemoteHost::parse("lab-box").is_err());
        assert!(RemoteHost::parse("lab-box:").is_err());
    }
}
