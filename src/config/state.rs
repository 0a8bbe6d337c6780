// Application state module
// Configuration plus the directories requests are served from

use super::types::Config;
use crate::fs::FileRoot;

/// State shared by every connection
pub struct AppState {
    pub config: Config,
    /// Files listed, downloaded, uploaded and deleted
    pub root: FileRoot,
    /// Page assets under `/css/`, `/js/` and `/images/`
    pub assets: FileRoot,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            root: FileRoot::new(&config.files.root),
            assets: FileRoot::new(&config.files.assets_dir),
            config,
        }
    }
}
