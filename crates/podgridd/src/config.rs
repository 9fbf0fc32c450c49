//! Scenario file parser.
//!
//! A scenario TOML describes everything a simulation run needs: the
//! cluster's nodes (with labels, taints, and optional failure ticks),
//! the workloads and their pod templates, autoscaler bindings, and the
//! scripted metric series each workload reports over time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use podgrid_state::{
    AffinityMode, AffinityRule, PodSpec, Resources, Taint, TaintEffect, Toleration,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub autoscaler: AutoscalerConfig,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub workloads: Vec<WorkloadConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// How many ticks to run.
    pub ticks: u64,
    /// Simulated seconds per tick.
    pub tick_secs: u64,
    /// Seconds without a heartbeat before a node is marked NotReady.
    pub heartbeat_timeout_secs: u64,
    /// Simulated epoch at tick zero.
    pub start_epoch: u64,
    /// Persist state under this directory; in-memory when unset.
    pub data_dir: Option<PathBuf>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ticks: 60,
            tick_secs: 5,
            heartbeat_timeout_secs: 30,
            start_epoch: 0,
            data_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub topology_key: Option<String>,
    pub balance_weight: Option<f64>,
    pub spread_weight: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoscalerConfig {
    pub dead_band_low: Option<f64>,
    pub dead_band_high: Option<f64>,
    pub scale_up_window_secs: Option<u64>,
    pub scale_down_window_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: String,
    pub cpu_millis: u64,
    pub memory_bytes: u64,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub taints: Vec<TaintConfig>,
    /// Stop heartbeating from this tick onward.
    pub fail_at_tick: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaintConfig {
    pub key: String,
    pub value: String,
    /// "no_schedule" or "no_execute".
    pub effect: String,
}

impl TaintConfig {
    pub fn to_taint(&self) -> anyhow::Result<Taint> {
        let effect = match self.effect.as_str() {
            "no_schedule" => TaintEffect::NoSchedule,
            "no_execute" => TaintEffect::NoExecute,
            other => bail!("unknown taint effect: {other}"),
        };
        Ok(Taint {
            key: self.key.clone(),
            value: self.value.clone(),
            effect,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    pub id: String,
    /// Initial desired replica count.
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    pub template: TemplateConfig,
    /// Autoscaler binding; the workload stays at `replicas` when unset.
    pub hpa: Option<HpaConfig>,
    /// One utilization sample per tick; the last entry repeats. An
    /// entry without a value models a metrics outage for that tick.
    #[serde(default)]
    pub metrics: Vec<MetricSample>,
}

fn default_replicas() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HpaConfig {
    /// Target utilization per replica, in the metric series' unit.
    pub target: f64,
    #[serde(default = "default_min_replicas")]
    pub min_replicas: u32,
    #[serde(default = "default_max_replicas")]
    pub max_replicas: u32,
}

fn default_min_replicas() -> u32 {
    1
}

fn default_max_replicas() -> u32 {
    10
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricSample {
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub cpu_millis: u64,
    pub memory_bytes: u64,
    /// Limits default to the request (Guaranteed QoS).
    pub limit_cpu_millis: Option<u64>,
    pub limit_memory_bytes: Option<u64>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub node_selector: HashMap<String, String>,
    #[serde(default)]
    pub tolerations: Vec<TolerationConfig>,
    #[serde(default)]
    pub affinity: Vec<AffinityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TolerationConfig {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffinityConfig {
    pub topology_key: String,
    #[serde(default)]
    pub match_labels: HashMap<String, String>,
    /// "required" or "preferred".
    pub mode: String,
    #[serde(default)]
    pub weight: u32,
}

impl TemplateConfig {
    pub fn to_pod_spec(&self) -> anyhow::Result<PodSpec> {
        let request = Resources::new(self.cpu_millis, self.memory_bytes);
        let limit = Resources::new(
            self.limit_cpu_millis.unwrap_or(self.cpu_millis),
            self.limit_memory_bytes.unwrap_or(self.memory_bytes),
        );

        let mut affinity = Vec::with_capacity(self.affinity.len());
        for rule in &self.affinity {
            let mode = match rule.mode.as_str() {
                "required" => AffinityMode::Required,
                "preferred" => AffinityMode::Preferred,
                other => bail!("unknown affinity mode: {other}"),
            };
            affinity.push(AffinityRule {
                topology_key: rule.topology_key.clone(),
                match_labels: rule.match_labels.clone(),
                mode,
                weight: rule.weight,
            });
        }

        Ok(PodSpec {
            request,
            limit,
            labels: self.labels.clone(),
            node_selector: self.node_selector.clone(),
            tolerations: self
                .tolerations
                .iter()
                .map(|t| Toleration {
                    key: t.key.clone(),
                    value: t.value.clone(),
                })
                .collect(),
            affinity,
        })
    }
}

impl ScenarioConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: ScenarioConfig = toml::from_str(content).context("parsing scenario")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for node in &self.nodes {
            if node.cpu_millis == 0 || node.memory_bytes == 0 {
                bail!("node {} has zero capacity", node.id);
            }
        }
        for workload in &self.workloads {
            if let Some(hpa) = &workload.hpa {
                if hpa.target <= 0.0 {
                    bail!("workload {} has non-positive hpa target", workload.id);
                }
                if hpa.min_replicas > hpa.max_replicas {
                    bail!("workload {} has min_replicas > max_replicas", workload.id);
                }
            }
        }
        Ok(())
    }
}
