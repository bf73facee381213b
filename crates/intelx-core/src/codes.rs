//! Integer code tables defined by the remote search protocol.
//!
//! Every table is a closed enum with an `Unknown` arm. Serialization goes
//! through the raw integer, so codes introduced by the service after this
//! client was built survive a decode/encode cycle unchanged.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

macro_rules! protocol_code {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "i64", into = "i64")]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
            /// Code not recognized by this client, carried through as-is
            Unknown(i64),
        }

        impl $name {
            /// Raw protocol value.
            #[must_use]
            pub const fn code(self) -> i64 {
                match self {
                    $( Self::$variant => $value, )+
                    Self::Unknown(value) => value,
                }
            }

            /// Whether this client knows the code.
            #[must_use]
            pub const fn is_known(self) -> bool {
                !matches!(self, Self::Unknown(_))
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                match value {
                    $( $value => Self::$variant, )+
                    other => Self::Unknown(other),
                }
            }
        }

        impl From<$name> for i64 {
            fn from(code: $name) -> Self {
                code.code()
            }
        }
    };
}

protocol_code! {
    /// Status reported by the service for a search initiation or poll.
    pub enum SearchStatus {
        /// Batch delivered, more results may follow
        Success = 0,
        /// Search exhausted
        NoMoreResults = 1,
        /// Nothing matched
        NotFound = 2,
        /// Search still running, poll again
        KeepTrying = 3,
    }
}

impl SearchStatus {
    /// Whether the remote search is finished after this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::NoMoreResults | Self::NotFound)
    }
}

protocol_code! {
    /// Media type of a stored item.
    pub enum MediaType {
        Invalid = 0,
        Paste = 1,
        PasteUser = 2,
        Forum = 3,
        ForumBoard = 4,
        ForumThread = 5,
        ForumPost = 6,
        ForumUser = 7,
        Screenshot = 8,
        Html = 9,
        Tweet = 13,
        Url = 14,
        Pdf = 15,
        Word = 16,
        Excel = 17,
        PowerPoint = 18,
        Picture = 19,
        Audio = 20,
        Video = 21,
        Container = 22,
        HtmlFile = 23,
        TextFile = 24,
        Ebook = 25,
    }
}

impl MediaType {
    /// Human readable label, as shown by the service.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Invalid => "Invalid",
            Self::Paste => "Paste",
            Self::PasteUser => "Paste User",
            Self::Forum => "Forum",
            Self::ForumBoard => "Forum Board",
            Self::ForumThread => "Forum Thread",
            Self::ForumPost => "Forum Post",
            Self::ForumUser => "Forum User",
            Self::Screenshot => "Screenshot",
            Self::Html => "HTML",
            Self::Tweet => "Tweet",
            Self::Url => "URL",
            Self::Pdf => "PDF",
            Self::Word => "Word",
            Self::Excel => "Excel",
            Self::PowerPoint => "PowerPoint",
            Self::Picture => "Picture",
            Self::Audio => "Audio",
            Self::Video => "Video",
            Self::Container => "Container",
            Self::HtmlFile => "HTML File",
            Self::TextFile => "Text File",
            Self::Ebook => "Ebook",
            Self::Unknown(_) => "Unknown",
        }
    }
}

impl Default for MediaType {
    fn default() -> Self {
        Self::Invalid
    }
}

protocol_code! {
    /// Content type of a stored item.
    pub enum ContentType {
        Binary = 0,
        PlainText = 1,
        Picture = 2,
        Video = 3,
        Audio = 4,
        Document = 5,
        Executable = 6,
        Container = 7,
        User = 1001,
        Leak = 1002,
        Url = 1004,
        Forum = 1005,
    }
}

impl ContentType {
    /// Human readable label, as shown by the service.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Binary => "Binary/Unspecified",
            Self::PlainText => "Plain Text",
            Self::Picture => "Picture",
            Self::Video => "Video",
            Self::Audio => "Audio",
            Self::Document => "Document",
            Self::Executable => "Executable",
            Self::Container => "Container",
            Self::User => "User",
            Self::Leak => "Leak",
            Self::Url => "URL",
            Self::Forum => "Forum",
            Self::Unknown(_) => "Unknown",
        }
    }
}

impl Default for ContentType {
    fn default() -> Self {
        Self::Binary
    }
}

protocol_code! {
    /// Result ordering requested at search initiation.
    pub enum SortOrder {
        NoSort = 0,
        ScoreAsc = 1,
        ScoreDesc = 2,
        DateAsc = 3,
        DateDesc = 4,
    }
}

protocol_code! {
    /// Rendering format for file view calls.
    pub enum FileFormat {
        Text = 0,
        Hex = 1,
        Auto = 2,
        Picture = 3,
        NotSupported = 4,
        HtmlInline = 5,
        PdfText = 6,
        HtmlText = 7,
        WordText = 8,
        ExcelText = 9,
        PowerPointText = 10,
        EbookText = 11,
        TreeViewHtml = 12,
        TreeViewJson = 13,
    }
}

protocol_code! {
    /// Selector family a phonebook search resolves.
    pub enum PhonebookTarget {
        All = 0,
        Domains = 1,
        Emails = 2,
        Urls = 3,
    }
}

impl FromStr for PhonebookTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "domains" => Ok(Self::Domains),
            "emails" => Ok(Self::Emails),
            "urls" => Ok(Self::Urls),
            other => Err(ConfigError::InvalidValue {
                field: "phonebook target".to_string(),
                reason: format!("expected all, domains, emails or urls, got '{other}'"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(SearchStatus::from(3), SearchStatus::KeepTrying);
        assert_eq!(MediaType::from(24), MediaType::TextFile);
        assert_eq!(ContentType::from(1002), ContentType::Leak);
        assert_eq!(FileFormat::TreeViewJson.code(), 13);
        assert_eq!(SortOrder::DateDesc.code(), 4);
    }

    #[test]
    fn test_unknown_codes_pass_through() {
        let media = MediaType::from(11);
        assert_eq!(media, MediaType::Unknown(11));
        assert!(!media.is_known());
        assert_eq!(media.code(), 11);

        let status: SearchStatus = serde_json::from_str("7").expect("decode status");
        assert_eq!(status, SearchStatus::Unknown(7));
        assert_eq!(serde_json::to_string(&status).expect("encode status"), "7");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(SearchStatus::NoMoreResults.is_terminal());
        assert!(SearchStatus::NotFound.is_terminal());
        assert!(!SearchStatus::Success.is_terminal());
        assert!(!SearchStatus::KeepTrying.is_terminal());
        assert!(!SearchStatus::Unknown(9).is_terminal());
    }

    #[test]
    fn test_labels() {
        assert_eq!(MediaType::PasteUser.label(), "Paste User");
        assert_eq!(ContentType::Binary.label(), "Binary/Unspecified");
        assert_eq!(ContentType::Unknown(1003).label(), "Unknown");
    }

    #[test]
    fn test_phonebook_target_parse() {
        assert_eq!("emails".parse::<PhonebookTarget>().ok(), Some(PhonebookTarget::Emails));
        assert_eq!(" ALL ".parse::<PhonebookTarget>().ok(), Some(PhonebookTarget::All));
        assert!("phones".parse::<PhonebookTarget>().is_err());
    }
}
