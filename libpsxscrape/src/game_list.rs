use crate::errors::PsxError;
use crate::fetch::PageSource;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use url::Url;

pub const DEFAULT_GAME_LIST_URL: &str =
    "https://raw.githubusercontent.com/tutw/SuperPSX-PS4-GameList/refs/heads/main/ps4_games_list.json";
pub const DEFAULT_GAME_LIST_FILE: &str = "ps4_games_list.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameListEntry {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameList {
    #[serde(default)]
    pub games: Vec<GameListEntry>,
}

#[derive(Debug, Clone)]
pub enum GameListSource {
    File(PathBuf),
    Remote(Url),
}

impl GameList {
    pub fn from_json(json: &str) -> Result<Self, PsxError> {
        serde_json::from_str(json).map_err(|e| {
            tracing::error!("Game list is not valid json\nError : {}", e);
            PsxError::InvalidGameList(e.to_string())
        })
    }

    /// Keeps at most `max` entries. `None` keeps the whole list.
    pub fn truncate(&mut self, max: Option<usize>) {
        if let Some(max) = max {
            self.games.truncate(max);
        }
    }
}

#[tracing::instrument(skip(source))]
pub async fn load_game_list(
    list_source: &GameListSource,
    source: &dyn PageSource,
) -> Result<GameList, PsxError> {
    let json = match list_source {
        GameListSource::File(path) => {
            if !path.exists() {
                tracing::error!("Game list file {} does not exist", path.display());
                return Err(PsxError::GameListNotFound(path.display().to_string()));
            }
            match fs::read_to_string(path).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("Error reading file {}\nError : {}", path.display(), e);
                    return Err(PsxError::FileOperationError {
                        file_name: path.display().to_string(),
                        message: format!("{} | {}", e, e.kind()),
                    });
                }
            }
        }
        GameListSource::Remote(url) => source.fetch(url).await?,
    };
    let list = GameList::from_json(&json)?;
    tracing::info!("Loaded {} games", list.games.len());
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use futures::FutureExt;

    struct OnePage(String);

    impl PageSource for OnePage {
        fn fetch<'a>(&'a self, _url: &'a Url) -> BoxFuture<'a, Result<String, PsxError>> {
            let body = self.0.clone();
            async move { Ok(body) }.boxed()
        }
    }

    struct Offline;

    impl PageSource for Offline {
        fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<String, PsxError>> {
            async move { Err(PsxError::NetworkError(url.to_string())) }.boxed()
        }
    }

    #[test]
    fn test_parse_and_truncate() {
        let mut list = GameList::from_json(
            r#"{"games": [
                {"name": "A", "url": "http://site/a"},
                {"name": "B", "url": "http://site/b"},
                {"name": "C", "url": "http://site/c"}
            ]}"#,
        )
        .unwrap();
        list.truncate(Some(2));
        assert_eq!(list.games.len(), 2);
        assert_eq!(list.games[1].name, "B");
        list.truncate(None);
        assert_eq!(list.games.len(), 2);
    }

    #[test]
    fn test_missing_games_key_is_empty_list() {
        let list = GameList::from_json("{}").unwrap();
        assert!(list.games.is_empty());
    }

    #[test]
    fn test_garbage_is_invalid_list() {
        assert!(matches!(
            GameList::from_json("<html></html>"),
            Err(PsxError::InvalidGameList(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_fatal() {
        let path = std::env::temp_dir().join("psxscrape_no_such_list.json");
        let _ = std::fs::remove_file(&path);
        let res = load_game_list(&GameListSource::File(path), &Offline).await;
        assert!(matches!(res, Err(PsxError::GameListNotFound(_))));
    }

    #[tokio::test]
    async fn test_remote_list() {
        let source = OnePage(r#"{"games": [{"name": "A", "url": "http://site/a"}]}"#.into());
        let url = Url::parse(DEFAULT_GAME_LIST_URL).unwrap();
        let list = load_game_list(&GameListSource::Remote(url), &source)
            .await
            .unwrap();
        assert_eq!(list.games[0].url, "http://site/a");
    }

    #[tokio::test]
    async fn test_remote_failure_is_fatal() {
        let url = Url::parse(DEFAULT_GAME_LIST_URL).unwrap();
        let res = load_game_list(&GameListSource::Remote(url), &Offline).await;
        assert!(matches!(res, Err(PsxError::NetworkError(_))));
    }
}
