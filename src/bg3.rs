use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

pub const GAME_NAME: &str = "Baldur's Gate 3";
const STEAM_APP_ID: &str = "1086940";

#[derive(Debug, Clone)]
pub struct GamePaths {
    pub larian_dir: PathBuf,
    #[allow(dead_code)]
    pub profiles_dir: PathBuf,
    pub modsettings_path: PathBuf,
}

pub fn detect_paths(larian_dir_override: Option<&Path>) -> Result<GamePaths> {
    let larian_dir = match larian_dir_override {
        Some(path) => path.to_path_buf(),
        None => find_larian_dir().context("locate BG3 Larian data directory")?,
    };

    if !looks_like_larian_dir(&larian_dir) {
        bail!(
            "invalid Larian data dir: expected PlayerProfiles/ in {}",
            larian_dir.display()
        );
    }

    Ok(paths_in(larian_dir))
}

pub fn paths_in(larian_dir: PathBuf) -> GamePaths {
    let profiles_dir = larian_dir.join("PlayerProfiles");
    let modsettings_path = profiles_dir.join("Public").join("modsettings.lsx");
    GamePaths {
        larian_dir,
        profiles_dir,
        modsettings_path,
    }
}

fn find_larian_dir() -> Option<PathBuf> {
    let home = dirs_home()?;
    let native = home
        .join(".local/share/Larian Studios")
        .join(GAME_NAME);
    if native.exists() {
        return Some(native);
    }

    let proton = home
        .join(".local/share/Steam/steamapps/compatdata")
        .join(STEAM_APP_ID)
        .join("pfx/drive_c/users/steamuser/AppData/Local/Larian Studios")
        .join(GAME_NAME);
    if proton.exists() {
        return Some(proton);
    }

    None
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

pub fn looks_like_larian_dir(path: &Path) -> bool {
    path.join("PlayerProfiles").is_dir()
}
