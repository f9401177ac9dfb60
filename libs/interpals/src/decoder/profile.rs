//! Profile page decoding

use common::{InterpalsError, InterpalsResult};

use super::markup::{self, Element};
use super::{absolute_url, fragment};
use crate::models::{Profile, ProfileSection, Sex};

/// Decode the profile page of `username`
///
/// The page does not repeat the username in a stable place, so the caller
/// supplies it. The `uid` is mandatory.
pub fn profile(html: &str, username: &str) -> InterpalsResult<Profile> {
    let uid = uid(html)?;
    let profile_box = markup::find(html, ".profileBox");

    let (name, age) = profile_box
        .as_ref()
        .map(name_and_age)
        .unwrap_or_default();
    let (joined, updated) = profile_box
        .as_ref()
        .map(joined_and_updated)
        .unwrap_or_default();
    let (city, city_code, country, country_code) = location(html);
    let (online, last_seen) = online_status(html);

    Ok(Profile {
        username: username.to_string(),
        uid,
        name,
        age,
        sex: profile_box.as_ref().and_then(sex),
        city,
        city_code,
        country,
        country_code,
        online,
        last_seen,
        joined,
        updated,
        status: markup::find(html, "span#prStatMsgTxt")
            .map(|e| e.clean_text())
            .filter(|s| !s.is_empty()),
        avatar: avatar(html),
        sections: sections(html),
    })
}

/// Numeric user id of a profile page
pub fn uid(html: &str) -> InterpalsResult<u64> {
    let raw = markup::find(html, "a.profReportLink")
        .and_then(|link| link.attr("user-id"))
        .or_else(|| markup::find(html, "div.hidden-uid").map(|e| e.clean_text()));

    raw.and_then(|value| value.trim().parse().ok())
        .ok_or_else(|| InterpalsError::parse("uid", fragment(html)))
}

/// Sex from the name of the first image of the profile box (`female_sm.png`)
fn sex(profile_box: &Element<'_>) -> Option<Sex> {
    let src = profile_box.find("img")?.attr("src")?;
    let file = src.rsplit('/').next()?.to_ascii_lowercase();

    if file.starts_with("female") {
        Some(Sex::Female)
    } else if file.starts_with("male") {
        Some(Sex::Male)
    } else {
        None
    }
}

fn lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Second text line of the profile box: `Name, 27 y.o.`, `Name` or `27 y.o.`
fn name_and_age(profile_box: &Element<'_>) -> (Option<String>, Option<u32>) {
    let Some(line) = lines(&profile_box.text()).into_iter().nth(1) else {
        return (None, None);
    };
    let line = line.replace("y.o.", "");
    let line = line.trim();

    match line.rsplit_once(", ") {
        Some((name, age)) => (Some(name.trim().to_string()), age.trim().parse().ok()),
        None => match line.parse() {
            Ok(age) => (None, Some(age)),
            Err(_) => ((!line.is_empty()).then(|| line.to_string()), None),
        },
    }
}

/// `Joined:` / `Updated:` values of the first paragraph of the profile box
fn joined_and_updated(profile_box: &Element<'_>) -> (Option<String>, Option<String>) {
    let Some(paragraph) = profile_box.find("p") else {
        return (None, None);
    };
    let lines = lines(&paragraph.text());
    let value = |index: usize| {
        lines.get(index).map(|v| {
            v.trim_end_matches(|c: char| !c.is_alphanumeric())
                .to_string()
        })
    };

    (value(1), value(3))
}

type Location = (Option<String>, Option<String>, Option<String>, Option<String>);

/// City and country links of the location line; the first link is the continent
fn location(html: &str) -> Location {
    let Some(line) = markup::find(html, ".profLocation") else {
        return (None, None, None, None);
    };
    let links = line.find_all("a");

    let city = links.get(1);
    let country = links.get(2);

    let text = |link: Option<&Element<'_>>| {
        link.map(|l| l.clean_text()).filter(|t| !t.is_empty())
    };

    let city_code = city
        .and_then(|l| l.attr("href"))
        .and_then(|href| href.rsplit('=').next().map(str::to_string))
        .filter(|code| !code.is_empty());

    let country_code = country.and_then(|l| l.attr("href")).and_then(|href| {
        let chars: Vec<char> = href.chars().collect();
        (chars.len() >= 2).then(|| chars[chars.len() - 2..].iter().collect())
    });

    (text(city), city_code, text(country), country_code)
}

/// `Online now`, or `Last seen …` when offline
fn online_status(html: &str) -> (bool, Option<String>) {
    let Some(status) = markup::find(html, ".profOnlineStatus") else {
        return (false, None);
    };
    let text = status.clean_text();

    if text.eq_ignore_ascii_case("online now") {
        return (true, None);
    }

    let last = text.split_whitespace().skip(1).collect::<Vec<_>>().join(" ");
    (false, (!last.is_empty()).then_some(last))
}

fn avatar(html: &str) -> Option<String> {
    markup::find(html, "a.mainPhoto")
        .or_else(|| markup::find(html, "a.mpImgLink"))
        .and_then(|link| link.find("img"))
        .and_then(|img| img.attr("src"))
        .map(|src| absolute_url(&src))
}

fn sections(html: &str) -> Vec<ProfileSection> {
    let Some(data_box) = markup::find(html, ".profDataBox") else {
        return Vec::new();
    };

    data_box
        .find_all("h2")
        .iter()
        .zip(data_box.find_all("div.profDataBoxText"))
        .map(|(title, text)| ProfileSection {
            title: title.clean_text(),
            text: text.text().trim().to_string(),
        })
        .collect()
}
