//! Markup extraction for the EZTV listing and show pages.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::{ListingEntry, SourceError};
use crate::record::ExternalId;

static IMDB_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://(?:www\.)?imdb\.com/title/tt([0-9]+)").expect("valid imdb regex")
});

/// Find the first IMDb title link in a detail page.
///
/// No match is not an error; the page just doesn't name an identifier.
pub fn extract_external_id(text: &str) -> Option<ExternalId> {
    let digits = IMDB_LINK.captures(text)?.get(1)?.as_str();
    ExternalId::parse(digits).ok()
}

fn selector(s: &str) -> Result<Selector, SourceError> {
    Selector::parse(s).map_err(|e| SourceError::Parse(format!("selector '{}': {:?}", s, e)))
}

/// Parse listing rows (`<tr name="hover">`) into entries.
///
/// Relative show links are joined onto `base_url`. Rows missing a link or a
/// status cell are skipped.
pub fn parse_listing(html: &str, base_url: &str, kind: &str) -> Result<Vec<ListingEntry>, SourceError> {
    let document = Html::parse_document(html);
    let row_sel = selector(r#"tr[name="hover"]"#)?;
    let link_sel = selector("td.forum_thread_post a")?;
    let status_sel = selector("td.forum_thread_post font")?;

    let base = base_url.trim_end_matches('/');
    let mut entries = Vec::new();

    for row in document.select(&row_sel) {
        let Some(link) = row.select(&link_sel).next() else {
            debug!("Listing row without a show link, skipping");
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(status) = row.select(&status_sel).next() else {
            debug!(href = href, "Listing row without a status, skipping");
            continue;
        };

        let key = if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            format!("{}/{}", base, href.trim_start_matches('/'))
        };

        entries.push(ListingEntry {
            key,
            title: element_text(&link),
            status: element_text(&status),
            kind: kind.to_string(),
        });
    }

    Ok(entries)
}

fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body><table>
            <tr><td class="forum_thread_header">Show name</td><td>Status</td></tr>
            <tr name="hover">
                <td class="forum_thread_post"><a href="/shows/2583/breaking-bad/" class="thread_link">Breaking Bad</a></td>
                <td class="forum_thread_post"><font class="ended">Ended</font></td>
            </tr>
            <tr name="hover">
                <td class="forum_thread_post"><a href="/shows/575979/10-things-to-know-about/" class="thread_link">10 Things to Know About</a></td>
                <td class="forum_thread_post"><font class="airing"> Airing: Monday </font></td>
            </tr>
            <tr name="hover">
                <td class="forum_thread_post">No link here</td>
            </tr>
        </table></body></html>
    "#;

    #[test]
    fn test_parse_listing() {
        let entries = parse_listing(LISTING, "https://eztvx.to/", "tv").unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].key, "https://eztvx.to/shows/2583/breaking-bad/");
        assert_eq!(entries[0].title, "Breaking Bad");
        assert_eq!(entries[0].status, "Ended");
        assert_eq!(entries[0].kind, "tv");

        assert_eq!(
            entries[1].key,
            "https://eztvx.to/shows/575979/10-things-to-know-about/"
        );
        assert_eq!(entries[1].status, "Airing: Monday");
    }

    #[test]
    fn test_parse_listing_empty_page() {
        let entries = parse_listing("<html></html>", "https://eztvx.to", "tv").unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_extract_external_id() {
        let page = r#"<a href="https://www.imdb.com/title/tt0903747/" target="_blank">IMDb</a>"#;
        assert_eq!(
            extract_external_id(page).unwrap().as_str(),
            "tt0903747"
        );
    }

    #[test]
    fn test_extract_external_id_first_match_wins() {
        let page = "http://imdb.com/title/tt4574334/ then https://www.imdb.com/title/tt0944947/";
        assert_eq!(extract_external_id(page).unwrap().as_str(), "tt4574334");
    }

    #[test]
    fn test_extract_external_id_absent() {
        assert!(extract_external_id("<p>no identifier on this page</p>").is_none());
    }
}
