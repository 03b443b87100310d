//! Remotes from the repository-local git configuration.

use std::path::Path;

use gix::config::{File, Source};
use serde::{Deserialize, Serialize};

use crate::error::{MetaError, Result};

/// A configured remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remote {
    pub name: String,
    pub url: Option<String>,
}

/// Read `<git_dir>/config` and list its remotes in file order.
///
/// Only the local file is read; remotes from global or system
/// configuration and from `include` directives are not reported.
pub fn read_remotes(git_dir: &Path) -> Result<Vec<Remote>> {
    let config = File::from_path_no_includes(git_dir.join("config"), Source::Local)
        .map_err(|e| MetaError::Repository(format!("unable to read git config: {e}")))?;
    Ok(remotes_in(&config))
}

/// `[remote "<name>"]` sections and their `url` keys.
///
/// A remote declared in several sections is reported once, at its first
/// position; a later `url` overrides an earlier one.
pub fn remotes_in(config: &File<'_>) -> Vec<Remote> {
    let mut remotes: Vec<Remote> = Vec::new();
    let Some(sections) = config.sections_by_name("remote") else {
        return remotes;
    };

    for section in sections {
        let Some(name) = section.header().subsection_name() else {
            continue;
        };
        let name = name.to_string();
        let url = section.value("url").map(|url| url.to_string());

        match remotes.iter_mut().find(|remote| remote.name == name) {
            Some(existing) => {
                if url.is_some() {
                    existing.url = url;
                }
            }
            None => remotes.push(Remote { name, url }),
        }
    }

    remotes
}
