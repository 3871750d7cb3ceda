use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize)]
pub struct ExamsConfig {
    pub sandbox: SandboxConfig,
    pub runners: RunnersConfig,
    pub worker: WorkerConfig,
    pub locks: LocksConfig,
    pub participations: ParticipationsConfig,
}

#[derive(Debug, Deserialize)]
pub struct SandboxConfig {
    pub url: Url,
    /// Hard timeout for a single sandbox run, in seconds.
    pub request_timeout: u64,
    pub c_language_id: String,
    pub c_link_args: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RunnersConfig {
    pub node_path: String,
    pub js_runner_script: String,
    pub python_path: String,
    pub python_runner_script: String,
    /// Hard timeout for a whole batch run, in seconds.
    pub timeout: u64,
}

#[derive(Debug, Deserialize)]
pub struct WorkerConfig {
    pub concurrency: usize,
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts, in seconds.
    pub retry_base_delay: u64,
}

#[derive(Debug, Deserialize)]
pub struct LocksConfig {
    /// Seconds without a heartbeat after which a held lock expires.
    pub heartbeat_timeout: u64,
}

#[derive(Debug, Deserialize)]
pub struct ParticipationsConfig {
    /// Seconds granted past the time limit before mutations are rejected.
    pub time_limit_grace: u64,
}
