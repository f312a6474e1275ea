use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, instrument};

use crate::error::{RegistryError, Result};

pub const GENRE_LIST_URL: &str = "https://everynoise.com/everynoise1d.cgi?scope=all";

static NOTE_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.note").expect("static selector must parse"));

/// Extracts genre names from the one-dimensional genre list. Each genre
/// sits in the cell after the one holding its `a.note` playlist link.
pub fn parse_genres(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut genres = Vec::new();

    for link in document.select(&NOTE_LINK) {
        let cell = match link.parent().and_then(ElementRef::wrap) {
            Some(cell) => cell,
            None => continue,
        };
        let next_cell = cell.next_siblings().find_map(ElementRef::wrap);
        let genre = match next_cell {
            Some(next) => next.text().collect::<String>().trim().to_lowercase(),
            None => continue,
        };
        if genre.is_empty() {
            continue;
        }
        if seen.insert(genre.clone()) {
            genres.push(genre);
        }
    }
    genres
}

#[instrument(skip(client))]
pub async fn fetch_genres(client: &reqwest::Client, url: &str) -> Result<Vec<String>> {
    let resp = client
        .get(url)
        .timeout(Duration::from_secs(60))
        .send()
        .await?;
    if !resp.status().is_success() {
        return Err(RegistryError::Api {
            message: format!("Genre list request failed: {}", resp.status()),
        });
    }
    let body = resp.text().await?;
    let genres = parse_genres(&body);
    info!("Found {} genres", genres.len());
    Ok(genres)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body><table>
          <tr valign=top>
            <td class=note>1</td>
            <td class=note><a href="https://open.spotify.com/playlist/1" class=note title="See this playlist">&#x260A;</a></td>
            <td class=note><a href="everynoise1d.cgi?root=pop">Pop</a></td>
          </tr>
          <tr valign=top>
            <td class=note>2</td>
            <td class=note><a href="https://open.spotify.com/playlist/2" class=note>&#x260A;</a></td>
            <td class=note>  Dance Pop </td>
          </tr>
          <tr valign=top>
            <td class=note>3</td>
            <td class=note><a href="https://open.spotify.com/playlist/3" class=note>&#x260A;</a></td>
            <td class=note>pop</td>
          </tr>
          <tr>
            <td><a href="/about">about</a></td>
          </tr>
        </table></body></html>
    "#;

    #[test]
    fn test_parse_genres() {
        assert_eq!(parse_genres(PAGE), vec!["pop".to_string(), "dance pop".to_string()]);
    }

    #[test]
    fn test_parse_genres_without_notes() {
        assert!(parse_genres("<html><body><p>maintenance</p></body></html>").is_empty());
    }
}
