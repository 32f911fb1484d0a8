//! Flow records and log naming
//!
//! All flows of an experiment are planned up front; each gets a fresh
//! token so its four raw log paths never collide with another run.

use std::path::{Path, PathBuf};

use pt_protocol::TunnelId;
use uuid::Uuid;

use crate::types::Link;

/// Naming scheme for every log file an experiment produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogNames {
    cc: String,
    run_id: u32,
}

impl LogNames {
    pub fn new(cc: impl Into<String>, run_id: u32) -> Self {
        Self {
            cc: cc.into(),
            run_id,
        }
    }

    /// Base name of a link's logs, e.g. `cubic_datalink_run1`
    pub fn link_name(&self, link: Link) -> String {
        format!("{}_{}_run{}", self.cc, link, self.run_id)
    }

    /// Final unified log of a link
    pub fn final_log(&self, data_dir: &Path, link: Link) -> PathBuf {
        data_dir.join(format!("{}.log", self.link_name(link)))
    }

    /// Link shaper's own log of a link
    pub fn link_shaper_log(&self, data_dir: &Path, link: Link) -> PathBuf {
        data_dir.join(format!("{}_mm_{}_run{}.log", self.cc, link, self.run_id))
    }

    /// Start/end/offset summary
    pub fn stats_log(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(format!("{}_stats_run{}.log", self.cc, self.run_id))
    }

    /// Raw per-flow log, `suffix` being `ingress`, `egress` or `merged`
    pub fn flow_log(
        &self,
        tmp_dir: &Path,
        link: Link,
        tunnel: TunnelId,
        uid: &Uuid,
        suffix: &str,
    ) -> PathBuf {
        tmp_dir.join(format!(
            "{}_flow{}_uid{}.log.{}",
            self.link_name(link),
            tunnel,
            uid,
            suffix
        ))
    }
}

/// The four raw logs written by one tunnel pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowLogs {
    pub datalink_ingress: PathBuf,
    pub datalink_egress: PathBuf,
    pub acklink_ingress: PathBuf,
    pub acklink_egress: PathBuf,
}

impl FlowLogs {
    pub fn ingress(&self, link: Link) -> &Path {
        match link {
            Link::Datalink => &self.datalink_ingress,
            Link::Acklink => &self.acklink_ingress,
        }
    }

    pub fn egress(&self, link: Link) -> &Path {
        match link {
            Link::Datalink => &self.datalink_egress,
            Link::Acklink => &self.acklink_egress,
        }
    }
}

/// One sender/receiver pair running inside one tunnel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flow {
    pub tunnel: TunnelId,
    pub uid: Uuid,
    pub logs: FlowLogs,
}

impl Flow {
    /// Build a flow with the given token
    pub fn new(tunnel: TunnelId, uid: Uuid, names: &LogNames, tmp_dir: &Path) -> Self {
        let log = |link: Link, suffix: &str| names.flow_log(tmp_dir, link, tunnel, &uid, suffix);
        let logs = FlowLogs {
            datalink_ingress: log(Link::Datalink, "ingress"),
            datalink_egress: log(Link::Datalink, "egress"),
            acklink_ingress: log(Link::Acklink, "ingress"),
            acklink_egress: log(Link::Acklink, "egress"),
        };
        Self { tunnel, uid, logs }
    }

    /// Plan `count` flows numbered from tunnel 1, each with a fresh token
    pub fn plan_all(count: u32, names: &LogNames, tmp_dir: &Path) -> Vec<Flow> {
        (0..count as usize)
            .map(|i| Flow::new(TunnelId::from_index(i), Uuid::new_v4(), names, tmp_dir))
            .collect()
    }
}
