//! Filename guessing capability
//!
//! The pipeline treats guessing as a black box behind [`GuessMetadata`].
//! [`ReleaseNameGuesser`] is the bundled heuristic implementation used by
//! the CLI; tests substitute their own.

use regex::Regex;
use serde_json::{Map, Value};
use std::path::Path;

use crate::config::VIDEO_EXTENSIONS;
use crate::error::GuessError;

/// Options passed with every guess
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GuessOptions {
    /// Log the intermediate guess
    pub verbose: bool,
    /// Force the guessed `type` (e.g. `"movie"`)
    pub media_type: Option<String>,
    /// Restrict output to JSON-compatible values
    pub json: bool,
    /// Treat the input as a bare name rather than a path
    pub name_only: bool,
}

impl GuessOptions {
    /// Options used by base-data extraction over a whole catalog
    pub fn batch() -> Self {
        Self {
            verbose: false,
            media_type: Some("movie".to_string()),
            json: true,
            name_only: true,
        }
    }
}

/// Structured guess: a JSON object with keys such as `title`, `year`,
/// `cd`, `format`, `screen_size`, `video_codec`, `release_group`, `type`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Guess(Map<String, Value>);

impl Guess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value; only objects are accepted
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Raw value for `key`, with JSON `null` treated as unset
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn title(&self) -> Option<&str> {
        self.get("title").and_then(Value::as_str)
    }

    /// Year as an integer; numeric strings are accepted
    pub fn year(&self) -> Option<i32> {
        match self.get("year")? {
            Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// The guessed `type` (`"movie"`, `"episode"`, ...)
    pub fn media_type(&self) -> Option<&str> {
        self.get("type").and_then(Value::as_str)
    }

    pub fn is_movie(&self) -> bool {
        self.media_type() == Some("movie")
    }
}

/// Infers structured metadata from an unstructured file name
pub trait GuessMetadata {
    fn guess(&self, input: &str, options: &GuessOptions) -> Result<Guess, GuessError>;
}

impl<G: GuessMetadata + ?Sized> GuessMetadata for &G {
    fn guess(&self, input: &str, options: &GuessOptions) -> Result<Guess, GuessError> {
        (**self).guess(input, options)
    }
}

/// Regex heuristics for scene/P2P style release names
/// (`The.Matrix.1999.1080p.BluRay.x264-GROUP`)
#[derive(Debug)]
pub struct ReleaseNameGuesser {
    brackets: Regex,
    dotted_codec: Regex,
    group: Regex,
    year: Regex,
    screen_size: Regex,
    cd: Regex,
    episode: Regex,
    other_tag: Regex,
}

impl ReleaseNameGuesser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            brackets: Regex::new(r"[\[\](){}]")?,
            dotted_codec: Regex::new(r"(?i)\bh\.(26[45])\b")?,
            group: Regex::new(
                r"(?i)(?:x26[45]|h26[45]|hevc|avc|xvid|divx|\d{3,4}p|blu-?ray|bdrip|brrip|web-?dl|webrip|web|hdtv|dvdrip|aac|ac3|dts|flac)-([a-z0-9]+)$",
            )?,
            year: Regex::new(r"^(19\d{2}|20\d{2})$")?,
            screen_size: Regex::new(r"(?i)^(\d{3,4}[pi]|4k)$")?,
            cd: Regex::new(r"(?i)^cd(\d{1,2})$")?,
            episode: Regex::new(r"(?i)^(?:s(\d{1,2})e(\d{1,3})|(\d{1,2})x(\d{2,3}))$")?,
            other_tag: Regex::new(
                r"(?i)^(?:aac|ac3|eac3|dts|dd5|ddp5|atmos|truehd|flac|mp3|proper|repack|extended|unrated|remastered|internal|limited|multi|subbed|dubbed|10bit|8bit|hdr|hdr10|remux|imax)$",
            )?,
        })
    }

    fn name_part<'a>(&self, input: &'a str, options: &GuessOptions) -> &'a str {
        if options.name_only {
            return input;
        }

        let name = Path::new(input)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(input);
        match name.rfind('.') {
            Some(idx)
                if VIDEO_EXTENSIONS
                    .iter()
                    .any(|ext| ext.eq_ignore_ascii_case(&name[idx..])) =>
            {
                &name[..idx]
            }
            _ => name,
        }
    }

    fn format_of(token: &str) -> Option<&'static str> {
        match token.to_lowercase().as_str() {
            "bluray" | "blu-ray" | "bdrip" | "brrip" | "bdremux" => Some("BluRay"),
            "web-dl" | "webdl" | "webrip" | "web" => Some("WEB-DL"),
            "hdtv" => Some("HDTV"),
            "dvdrip" | "dvd" | "dvdscr" => Some("DVD"),
            "hdrip" => Some("HDRip"),
            "cam" | "hdcam" => Some("Cam"),
            _ => None,
        }
    }

    fn codec_of(token: &str) -> Option<&'static str> {
        match token.to_lowercase().as_str() {
            "x264" | "h264" | "avc" => Some("h264"),
            "x265" | "h265" | "hevc" => Some("h265"),
            "xvid" => Some("XviD"),
            "divx" => Some("DivX"),
            _ => None,
        }
    }
}

impl GuessMetadata for ReleaseNameGuesser {
    fn guess(&self, input: &str, options: &GuessOptions) -> Result<Guess, GuessError> {
        let name = self.name_part(input, options).trim();
        if name.is_empty() {
            return Err(GuessError::EmptyInput);
        }

        let mut guess = Guess::new();
        let cleaned = self.brackets.replace_all(name, " ");
        let mut cleaned = self.dotted_codec.replace_all(&cleaned, "h$1").into_owned();

        if let Some(caps) = self.group.captures(&cleaned) {
            let whole = caps.get(0).map(|m| m.range());
            if let (Some(group), Some(range)) = (caps.get(1), whole) {
                guess.insert("release_group", group.as_str());
                let dash = range.start + (range.len() - group.as_str().len() - 1);
                cleaned.truncate(dash);
            }
        }

        let tokens: Vec<&str> = cleaned
            .split(|c: char| c == '.' || c == '_' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .collect();

        let mut title_end = None;
        let mut is_episode = false;
        for (i, token) in tokens.iter().enumerate() {
            let mut is_tag = true;
            if self.year.is_match(token) {
                // a leading year is part of the title ("2001.A.Space.Odyssey")
                if i == 0 && tokens.len() > 1 {
                    is_tag = false;
                } else if let Ok(year) = token.parse::<i32>() {
                    guess.insert("year", year);
                }
            } else if self.screen_size.is_match(token) {
                let size = if token.eq_ignore_ascii_case("4k") {
                    "2160p".to_string()
                } else {
                    token.to_lowercase()
                };
                guess.insert("screen_size", size);
            } else if let Some(caps) = self.cd.captures(token) {
                if let Some(n) = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) {
                    guess.insert("cd", n);
                }
            } else if let Some(caps) = self.episode.captures(token) {
                is_episode = true;
                let season = caps.get(1).or_else(|| caps.get(3));
                let episode = caps.get(2).or_else(|| caps.get(4));
                if let Some(n) = season.and_then(|m| m.as_str().parse::<u32>().ok()) {
                    guess.insert("season", n);
                }
                if let Some(n) = episode.and_then(|m| m.as_str().parse::<u32>().ok()) {
                    guess.insert("episode", n);
                }
            } else if let Some(format) = Self::format_of(token) {
                guess.insert("format", format);
            } else if let Some(codec) = Self::codec_of(token) {
                guess.insert("video_codec", codec);
            } else if !self.other_tag.is_match(token) {
                is_tag = false;
            }

            if is_tag && title_end.is_none() {
                title_end = Some(i);
            }
        }

        let title = tokens[..title_end.unwrap_or(tokens.len())]
            .iter()
            .copied()
            .filter(|t| *t != "-")
            .collect::<Vec<_>>()
            .join(" ");
        let title = title.trim_matches(|c: char| c == '-' || c.is_whitespace());
        if !title.is_empty() {
            guess.insert("title", title);
        }

        let media_type = match &options.media_type {
            Some(forced) => forced.clone(),
            None if is_episode => "episode".to_string(),
            None => "movie".to_string(),
        };
        guess.insert("type", media_type);

        if options.verbose {
            log::debug!("Guess for {:?}: {:?}", input, guess);
        }
        Ok(guess)
    }
}
