use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a digest is fetched, cached and delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Text,
    Image,
}

impl ContentKind {
    pub const ALL: [ContentKind; 2] = [ContentKind::Text, ContentKind::Image];

    pub fn extension(self) -> &'static str {
        match self {
            ContentKind::Text => "txt",
            ContentKind::Image => "jpeg",
        }
    }

    /// Value of the `encoding` query parameter sent to the news API.
    pub fn encoding(self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Image => "image-proxy",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Image => "image",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(ContentKind::Text),
            "image" => Ok(ContentKind::Image),
            other => Err(format!("unknown news type '{other}', use 'text' or 'image'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_and_encoding() {
        assert_eq!(ContentKind::Text.extension(), "txt");
        assert_eq!(ContentKind::Image.extension(), "jpeg");
        assert_eq!(ContentKind::Text.encoding(), "text");
        assert_eq!(ContentKind::Image.encoding(), "image-proxy");
    }

    #[test]
    fn test_parse() {
        assert_eq!("Text".parse::<ContentKind>().unwrap(), ContentKind::Text);
        assert_eq!(" image ".parse::<ContentKind>().unwrap(), ContentKind::Image);
        assert!("gif".parse::<ContentKind>().is_err());
    }
}
