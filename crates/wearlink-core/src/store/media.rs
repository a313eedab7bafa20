// ── Watch-side media and app lists ──

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::persist;
use crate::error::CoreError;
use crate::model::AppItem;
use crate::stream::CacheStream;

type Items = Arc<Vec<Arc<AppItem>>>;

pub struct MediaStore {
    players: watch::Sender<Items>,
    apps: watch::Sender<Items>,
}

impl Default for MediaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaStore {
    pub fn new() -> Self {
        Self {
            players: watch::channel(Arc::new(Vec::new())).0,
            apps: watch::channel(Arc::new(Vec::new())).0,
        }
    }

    /// Returns `true` if the list changed.
    pub fn set_music_players(&self, players: Vec<AppItem>) -> bool {
        set_items(&self.players, players)
    }

    pub fn music_players(&self) -> Items {
        self.players.borrow().clone()
    }

    pub fn subscribe_music_players(&self) -> CacheStream<AppItem> {
        CacheStream::new(self.players.subscribe())
    }

    pub fn set_apps(&self, apps: Vec<AppItem>) -> bool {
        set_items(&self.apps, apps)
    }

    pub fn apps(&self) -> Items {
        self.apps.borrow().clone()
    }

    pub fn subscribe_apps(&self) -> CacheStream<AppItem> {
        CacheStream::new(self.apps.subscribe())
    }

    pub async fn save(&self, path: &Path) -> Result<(), CoreError> {
        let file = MediaFile {
            players: self.music_players().iter().map(|a| (**a).clone()).collect(),
            apps: self.apps().iter().map(|a| (**a).clone()).collect(),
        };
        persist::write_json(path, &file).await
    }

    pub async fn load(&self, path: &Path) -> Result<bool, CoreError> {
        let Some(file) = persist::read_json::<MediaFile>(path).await? else {
            return Ok(false);
        };
        self.set_music_players(file.players);
        self.set_apps(file.apps);
        Ok(true)
    }
}

fn set_items(tx: &watch::Sender<Items>, items: Vec<AppItem>) -> bool {
    tx.send_if_modified(|cur| {
        let same = cur.len() == items.len() && cur.iter().zip(&items).all(|(a, b)| **a == *b);
        if !same {
            *cur = Arc::new(items.into_iter().map(Arc::new).collect());
        }
        !same
    })
}

#[derive(Serialize, Deserialize)]
struct MediaFile {
    #[serde(default)]
    players: Vec<AppItem>,
    #[serde(default)]
    apps: Vec<AppItem>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn spotify() -> AppItem {
        AppItem::new("com.spotify.music", "MainActivity").with_label("Spotify")
    }

    #[tokio::test]
    async fn identical_lists_do_not_notify() {
        let store = MediaStore::new();
        let mut rx = store.subscribe_music_players();
        assert!(store.set_music_players(vec![spotify()]));
        assert_eq!(rx.changed().await.unwrap().len(), 1);

        assert!(!store.set_music_players(vec![spotify()]));
        let pending = tokio::time::timeout(std::time::Duration::from_millis(20), rx.changed()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn lists_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("media.json");

        let store = MediaStore::new();
        store.set_apps(vec![spotify(), AppItem::new("org.maps", "Launch")]);
        store.save(&path).await.unwrap();

        let restored = MediaStore::new();
        assert!(restored.load(&path).await.unwrap());
        assert_eq!(restored.apps().len(), 2);
        assert!(restored.music_players().is_empty());
    }
}
