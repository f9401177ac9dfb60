//! Albums and pictures decoding

use common::{InterpalsError, InterpalsResult};

use super::markup::{self, Element};
use super::{absolute_url, fragment, query_param};
use crate::models::{Album, Picture};

/// Host serving full-size photos
pub const PHOTO_HOST: &str = "https://ipstatic.net/photos/";

const THUMB_SEGMENT: &str = "/180x180/";
const ALBUM_NOT_FOUND: &str = "album not found";

/// Album headers of the albums page of `uid`
pub fn albums(html: &str, uid: u64) -> InterpalsResult<Vec<Album>> {
    markup::find_all(html, "div.editAlbumBox")
        .iter()
        .map(|element| album(element, uid))
        .collect()
}

fn album(element: &Element<'_>, uid: u64) -> InterpalsResult<Album> {
    let aid = element
        .find("a.albEditThumb")
        .and_then(|link| link.attr("href"))
        .and_then(|href| query_param(&href, "aid"))
        .filter(|aid| !aid.is_empty())
        .ok_or_else(|| InterpalsError::parse("aid", fragment(element.outer_html())))?;

    // "12 photos | Created Jan 2020 | Updated Mar 2021"
    let stats = element
        .find("div.albumStats")
        .map(|e| e.clean_text())
        .unwrap_or_default();
    let mut parts = stats.split('|').map(str::trim);

    let picture_count = parts
        .next()
        .and_then(|count| count.split_whitespace().next())
        .and_then(|count| count.parse().ok());
    let mut after_label = || {
        parts
            .next()
            .and_then(|part| part.split_once(char::is_whitespace))
            .map(|(_, value)| value.trim().to_string())
    };
    let created = after_label();
    let updated = after_label();

    Ok(Album {
        aid,
        uid,
        name: element.find("h3").map(|e| e.clean_text()).unwrap_or_default(),
        picture_count,
        created,
        updated,
        thumbnails: element
            .find_all("a.thumb")
            .iter()
            .filter_map(|link| link.find("img").and_then(|img| img.attr("src")))
            .map(|src| absolute_url(&src))
            .collect(),
    })
}

/// Pictures of an album page
pub fn pictures(html: &str) -> InterpalsResult<Vec<Picture>> {
    markup::find_all(html, "div.albThumb")
        .iter()
        .map(|element| -> InterpalsResult<Picture> {
            let thumbnail = element
                .find("img")
                .and_then(|img| img.attr("src"))
                .filter(|src| src.contains(THUMB_SEGMENT))
                .ok_or_else(|| InterpalsError::parse("src", fragment(element.outer_html())))?;
            Ok(picture(&thumbnail))
        })
        .collect()
}

/// Full-size URL derived from the path after the `180x180` segment
fn picture(thumbnail: &str) -> Picture {
    let path = thumbnail
        .split_once(THUMB_SEGMENT)
        .map(|(_, path)| path)
        .unwrap_or_default();

    Picture {
        src: format!("{PHOTO_HOST}{path}"),
        thumbnail: absolute_url(thumbnail),
    }
}

/// Whether an album page reports the album as missing
pub fn is_album_missing(html: &str) -> bool {
    html.to_ascii_lowercase().contains(ALBUM_NOT_FOUND)
}
