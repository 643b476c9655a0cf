use std::path::PathBuf;

use clap::Args;
use regcomment_core::SectionTarget;
use regcomment_store::StoreConfig;

#[derive(Debug, Clone, Args)]
pub struct ClientConfig {
    /// Comment server URL, including any path prefix
    #[arg(long, env = "REGCOMMENT_SERVER_URL", default_value = "http://127.0.0.1:8000/")]
    pub server_url: String,

    /// Document being commented on
    #[arg(long, env = "REGCOMMENT_DOC_ID")]
    pub doc_id: String,

    /// Where drafts are kept (defaults to $XDG_DATA_HOME/regcomment)
    #[arg(long, env = "REGCOMMENT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

impl ClientConfig {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            local_data_dir: self
                .data_dir
                .as_ref()
                .map(|dir| dir.to_string_lossy().into_owned()),
            ..Default::default()
        }
    }
}

/// Which section a command acts on.
#[derive(Debug, Clone, Args)]
pub struct SectionArgs {
    /// Section id, e.g. `2024-1-a`
    #[arg(long)]
    pub section: String,

    /// Table-of-contents id of the enclosing section (defaults to the section id)
    #[arg(long)]
    pub toc_id: Option<String>,

    /// Display label (defaults to the section id)
    #[arg(long)]
    pub label: Option<String>,
}

impl SectionArgs {
    pub fn target(&self) -> SectionTarget {
        SectionTarget::new(
            &self.section,
            self.toc_id.as_deref().unwrap_or(&self.section),
            self.label.as_deref().unwrap_or(&self.section),
        )
    }
}
