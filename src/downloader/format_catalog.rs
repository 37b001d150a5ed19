// FormatCatalogParser - turns `yt-dlp --list-formats` text into stream descriptors
//
// Only lines that start with a numeric format id are considered; headers,
// separators and blank lines are skipped silently. Source order is preserved.

use regex::Regex;

use super::models::{StreamDescriptor, StreamKind};

lazy_static::lazy_static! {
    static ref FORMAT_LINE_RE: Regex = Regex::new(r"^\d+\s+").unwrap();
    static ref QUALITY_RE: Regex = Regex::new(r"(\d+x\d+|\d+p)").unwrap();
}

/// id, container, resolution and at least one note word
const MIN_FIELDS: usize = 4;

pub struct FormatCatalogParser;

impl FormatCatalogParser {
    /// Parse a whole listing. Never fails; an empty result means "no formats".
    pub fn parse(listing: &str) -> Vec<StreamDescriptor> {
        listing.lines().filter_map(Self::parse_line).collect()
    }

    /// Parse one line, `None` for anything that is not a format row
    pub fn parse_line(line: &str) -> Option<StreamDescriptor> {
        if !FORMAT_LINE_RE.is_match(line) {
            return None;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < MIN_FIELDS {
            return None;
        }

        let id = parts[0].to_string();
        let container = parts[1].to_string();
        let resolution = parts[2].to_string();
        let note = parts[MIN_FIELDS - 1..].join(" ");

        // yt-dlp prints "audio only" across the resolution and note columns
        let kind = StreamKind::classify(&format!("{} {}", resolution, note));
        let quality = Self::extract_quality(&resolution, &note);

        Some(StreamDescriptor {
            id,
            container,
            resolution_tag: resolution,
            quality_tag: quality,
            note,
            has_video: kind != StreamKind::AudioOnly,
            has_audio: kind != StreamKind::VideoOnly,
        })
    }

    /// First `WxH` / `Np` token in the resolution, then in the note,
    /// else the resolution unchanged.
    pub fn extract_quality(resolution: &str, note: &str) -> String {
        QUALITY_RE
            .find(resolution)
            .or_else(|| QUALITY_RE.find(note))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| resolution.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
[youtube] Extracting URL: https://www.youtube.com/watch?v=abc
[info] Available formats for abc:
ID  EXT   RESOLUTION FPS |   FILESIZE   TBR PROTO | VCODEC  ACODEC
---------------------------------------------------------------
139 m4a   audio only     |    1.20MiB   49k https | audio only mp4a.40.5
140 m4a   audio only     |    3.19MiB  129k https | audio only mp4a.40.2
251 webm  audio only     |    3.30MiB  133k https | audio only opus
160 mp4   256x144     30 |    1.71MiB   69k https | avc1.4d400c video only
137 mp4   1920x1080   30 |   60.70MiB 2457k https | avc1.640028 video only
18  mp4   640x360     30 |   ~9.20MiB  372k https | avc1.42001E mp4a.40.2
22  mp4   1280x720    30 |  ~20.00MiB  810k https | avc1.64001F mp4a.40.2

";

    #[test]
    fn parses_only_format_rows() {
        let catalog = FormatCatalogParser::parse(LISTING);
        let ids: Vec<&str> = catalog.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["139", "140", "251", "160", "137", "18", "22"]);
    }

    #[test]
    fn classification_is_mutually_exclusive() {
        for d in FormatCatalogParser::parse(LISTING) {
            let flags = [d.is_video_only(), d.is_audio_only(), d.has_video && d.has_audio];
            assert_eq!(flags.iter().filter(|f| **f).count(), 1, "{:?}", d);
            assert!(d.has_video || d.has_audio);
        }
    }

    #[test]
    fn combined_stream_line() {
        let d = FormatCatalogParser::parse_line("22  mp4  1280x720  medium").unwrap();
        assert_eq!(d.id, "22");
        assert_eq!(d.container, "mp4");
        assert_eq!(d.resolution_tag, "1280x720");
        assert_eq!(d.quality_tag, "1280x720");
        assert_eq!(d.note, "medium");
        assert!(d.has_video && d.has_audio);
    }

    #[test]
    fn audio_only_across_columns() {
        let d = FormatCatalogParser::parse_line("140 m4a audio only").unwrap();
        assert!(d.is_audio_only());
        assert_eq!(d.quality_tag, "audio");
    }

    #[test]
    fn quality_falls_back_to_note_then_resolution() {
        assert_eq!(FormatCatalogParser::extract_quality("unknown", "720p60 hd"), "720p");
        assert_eq!(FormatCatalogParser::extract_quality("audio", "only tiny"), "audio");
        assert_eq!(FormatCatalogParser::extract_quality("1920x1080", "1080p"), "1920x1080");
    }

    #[test]
    fn short_and_non_numeric_lines_are_skipped() {
        assert!(FormatCatalogParser::parse_line("22 mp4 1280x720").is_none());
        assert!(FormatCatalogParser::parse_line("sb0 mhtml 48x27 storyboard").is_none());
        assert!(FormatCatalogParser::parse_line(" 22 mp4 1280x720 medium").is_none());
        assert!(FormatCatalogParser::parse("").is_empty());
    }

    #[test]
    fn parsing_is_idempotent() {
        assert_eq!(FormatCatalogParser::parse(LISTING), FormatCatalogParser::parse(LISTING));
    }
}
