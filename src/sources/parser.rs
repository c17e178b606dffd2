//! Listing parser for Mod Archive pages
//!
//! The source is an HTML-like feed with no stable schema, so extraction is
//! deliberately defensive: rows are located by the download anchor they
//! carry, and a row whose remaining fields cannot be parsed is skipped and
//! counted instead of aborting the whole fetch. Both the newer `<li>` rows
//! and the legacy table rows are handled. Parsing is a pure function over
//! the response body, decoupled from the network call.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static LI_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<li\b[^>]*>(.*?)</li>").unwrap());
static TR_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").unwrap());
static DOWNLOAD_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"downloads\.php\?moduleid=(\d+)(?:#([^"'\s<>]+))?"#).unwrap());
static TITLE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*href="[^"]*module\.php\?\d+[^"]*"[^>]*>(.*?)</a>"#).unwrap()
});
static ARTIST_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*href="[^"]*member\.php\?\d+[^"]*"[^>]*>(.*?)</a>"#).unwrap()
});
static FORMAT_EXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.([a-z0-9]{2,4})$").unwrap());
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// One module row extracted from a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawModuleEntry {
    pub id: u32,
    pub filename: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub format: Option<String>,
}

/// Outcome of parsing one listing page
#[derive(Debug, Default)]
pub struct Listing {
    /// Parsed rows, in page order, duplicates collapsed
    pub entries: Vec<RawModuleEntry>,
    /// Rows that looked like module rows but could not be parsed
    pub skipped: usize,
}

/// Parse a listing page into module entries.
///
/// Tries `<li>` rows first and falls back to table rows when none of the
/// list items yields a module, mirroring the two page generations the
/// source has served over time.
pub fn parse_listing(html: &str) -> Listing {
    let mut listing = parse_rows(html, &LI_ROW);
    if listing.entries.is_empty() {
        let fallback = parse_rows(html, &TR_ROW);
        if !fallback.entries.is_empty() || fallback.skipped > listing.skipped {
            listing = fallback;
        }
    }
    listing
}

fn parse_rows(html: &str, row_pattern: &Regex) -> Listing {
    let mut entries = Vec::new();
    let mut skipped = 0;
    let mut seen: HashSet<u32> = HashSet::new();

    for row in row_pattern.captures_iter(html) {
        let body = &row[1];
        if !body.contains("downloads.php") {
            // Navigation / layout rows, not module rows
            continue;
        }
        match parse_row(body) {
            Some(entry) => {
                if seen.insert(entry.id) {
                    entries.push(entry);
                }
            }
            None => skipped += 1,
        }
    }

    Listing { entries, skipped }
}

/// Parse a single row body. Returns `None` when the row carries a download
/// anchor but its fields are unusable.
fn parse_row(body: &str) -> Option<RawModuleEntry> {
    let download = DOWNLOAD_LINK.captures(body)?;
    let id: u32 = download[1].parse().ok()?;

    // Filename travels in the fragment of the download link, e.g.
    // downloads.php?moduleid=212618#wishes.xm
    let filename = download
        .get(2)
        .map(|m| m.as_str().trim().to_string())
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| format!("module_{id}.mod"));

    let format = FORMAT_EXT
        .captures(&filename.to_ascii_lowercase())
        .map(|c| c[1].to_string());

    let title = TITLE_LINK
        .captures(body)
        .map(|c| strip_markup(&c[1]))
        .filter(|t| !t.is_empty());
    let artist = ARTIST_LINK
        .captures(body)
        .map(|c| strip_markup(&c[1]))
        .filter(|a| !a.is_empty());

    Some(RawModuleEntry {
        id,
        filename,
        title,
        artist,
        format,
    })
}

fn strip_markup(text: &str) -> String {
    TAG.replace_all(text, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LI_PAGE: &str = r#"
        <ul>
          <li><a href="/index.php">Home</a></li>
          <li>
            <a href="https://api.modarchive.org/downloads.php?moduleid=212618#wishes.xm">download</a>
            <a href="https://modarchive.org/module.php?212618">Wishes</a>
            by <a href="https://modarchive.org/member.php?6969">nobody</a>
          </li>
          <li>
            <a href="downloads.php?moduleid=100001#tune.s3m">dl</a>
            <a href="module.php?100001">A <b>Great</b> Tune</a>
          </li>
          <li>
            <a href="downloads.php?moduleid=#broken.it">broken row</a>
          </li>
        </ul>
    "#;

    const TABLE_PAGE: &str = r#"
        <table>
          <tr><th>Module</th><th>Artist</th></tr>
          <tr>
            <td><a href="downloads.php?moduleid=55555#old.mod">old.mod</a></td>
            <td><a href="member.php?42">tracker42</a></td>
          </tr>
        </table>
    "#;

    #[test]
    fn parses_list_item_rows() {
        let listing = parse_listing(LI_PAGE);
        assert_eq!(listing.entries.len(), 2);
        assert_eq!(listing.skipped, 1);

        let first = &listing.entries[0];
        assert_eq!(first.id, 212618);
        assert_eq!(first.filename, "wishes.xm");
        assert_eq!(first.format.as_deref(), Some("xm"));
        assert_eq!(first.title.as_deref(), Some("Wishes"));
        assert_eq!(first.artist.as_deref(), Some("nobody"));
    }

    #[test]
    fn nested_markup_is_stripped_from_titles() {
        let listing = parse_listing(LI_PAGE);
        let second = &listing.entries[1];
        assert_eq!(second.title.as_deref(), Some("A Great Tune"));
        assert_eq!(second.artist, None);
    }

    #[test]
    fn falls_back_to_table_rows() {
        let listing = parse_listing(TABLE_PAGE);
        assert_eq!(listing.entries.len(), 1);
        let entry = &listing.entries[0];
        assert_eq!(entry.id, 55555);
        assert_eq!(entry.filename, "old.mod");
        assert_eq!(entry.format.as_deref(), Some("mod"));
        assert_eq!(entry.artist.as_deref(), Some("tracker42"));
    }

    #[test]
    fn missing_fragment_falls_back_to_synthetic_filename() {
        let html = r#"<li><a href="downloads.php?moduleid=777">get it</a></li>"#;
        let listing = parse_listing(html);
        assert_eq!(listing.entries.len(), 1);
        assert_eq!(listing.entries[0].filename, "module_777.mod");
        assert_eq!(listing.entries[0].format.as_deref(), Some("mod"));
    }

    #[test]
    fn duplicate_ids_within_one_page_collapse() {
        let html = r#"
            <li><a href="downloads.php?moduleid=9#a.xm">a</a></li>
            <li><a href="downloads.php?moduleid=9#a.xm">a again</a></li>
        "#;
        let listing = parse_listing(html);
        assert_eq!(listing.entries.len(), 1);
    }

    #[test]
    fn oversized_id_counts_as_skipped() {
        let html = r#"<li><a href="downloads.php?moduleid=99999999999#x.mod">x</a></li>"#;
        let listing = parse_listing(html);
        assert!(listing.entries.is_empty());
        assert_eq!(listing.skipped, 1);
    }

    #[test]
    fn empty_page_yields_no_rows() {
        let listing = parse_listing("<html><body>maintenance</body></html>");
        assert!(listing.entries.is_empty());
        assert_eq!(listing.skipped, 0);
    }
}
