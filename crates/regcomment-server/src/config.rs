use std::net::SocketAddr;

use clap::Parser;
use regcomment_core::paths::normalize_prefix;
use regcomment_core::policy::{DEFAULT_MAX_ATTACHMENT_COUNT, DEFAULT_MAX_SIZE};
use regcomment_core::AttachmentPolicy;

#[derive(Debug, Clone, Parser)]
#[command(name = "regcomment-server", about = "Comment attachment slot server")]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "REGCOMMENT_BIND", default_value = "0.0.0.0")]
    pub bind: String,

    /// Port to listen on
    #[arg(long, env = "REGCOMMENT_PORT", default_value = "8000")]
    pub port: u16,

    /// Application prefix all comment routes live under
    #[arg(long, env = "REGCOMMENT_PREFIX", default_value = "/")]
    pub prefix: String,

    /// Externally reachable base URL, used when building local upload URLs.
    /// Defaults to `http://<bind>:<port>`.
    #[arg(long, env = "REGCOMMENT_PUBLIC_URL")]
    pub public_url: Option<String>,

    /// Largest accepted attachment, in bytes
    #[arg(long, env = "REGCOMMENT_ATTACHMENT_MAX_SIZE", default_value_t = DEFAULT_MAX_SIZE)]
    pub attachment_max_size: u64,

    /// Comma-separated list of accepted file extensions
    #[arg(long, env = "REGCOMMENT_VALID_EXTENSIONS")]
    pub valid_extensions: Option<String>,

    /// Most documents one submission may carry, the comment itself included
    #[arg(long, env = "REGCOMMENT_MAX_ATTACHMENT_COUNT", default_value_t = DEFAULT_MAX_ATTACHMENT_COUNT)]
    pub max_attachment_count: usize,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        Ok(SocketAddr::new(self.bind.parse()?, self.port))
    }

    pub fn prefix(&self) -> String {
        normalize_prefix(&self.prefix)
    }

    pub fn public_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.bind, self.port),
        }
    }

    pub fn policy(&self) -> AttachmentPolicy {
        let mut policy = AttachmentPolicy {
            max_size: self.attachment_max_size,
            max_attachment_count: self.max_attachment_count,
            ..Default::default()
        };
        if let Some(list) = &self.valid_extensions {
            policy.valid_extensions = AttachmentPolicy::parse_extensions(list);
        }
        policy
    }
}
